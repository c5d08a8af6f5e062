//! Shorthands for putting resolved trees together by hand
//!
//! Trees normally come out of a resolver. These build the same shapes directly, for the samples
//! of the `jcodegen` binary and for tests. Expressions get the type resolution would give them,
//! and literals their constant value, but nothing gets constant-folded.

use super::*;
use crate::binding::{BindingTable, ClassData, FieldData, LocalData, MethodData};
use crate::jvm::{
    BaseType, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
};
use std::cell::Cell;

/// Registers bindings and builds the nodes referring to them
pub struct TreeBuilder<'t> {
    pub bindings: &'t BindingTable,

    /// Flow id of the next local of the current method
    next_flow_id: Cell<usize>,
}

impl<'t> TreeBuilder<'t> {
    pub fn new(bindings: &'t BindingTable) -> TreeBuilder<'t> {
        TreeBuilder {
            bindings,
            next_flow_id: Cell::new(0),
        }
    }

    /// Public top-level class extending `java/lang/Object`
    pub fn class(&self, name: &str) -> ClassId {
        self.bindings.add_class(ClassData {
            name: name.to_string(),
            superclass: Some(self.bindings.java.object),
            enclosing: None,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        })
    }

    pub fn nested_class(&self, name: &str, enclosing: ClassId) -> ClassId {
        self.bindings.add_class(ClassData {
            name: name.to_string(),
            superclass: Some(self.bindings.java.object),
            enclosing: Some(enclosing),
            access_flags: ClassAccessFlags::SUPER,
        })
    }

    pub fn field(
        &self,
        class: ClassId,
        name: &str,
        descriptor: TypeRef,
        access_flags: FieldAccessFlags,
    ) -> FieldId {
        self.bindings.add_field(FieldData {
            class,
            name: name.to_string(),
            descriptor,
            access_flags,
        })
    }

    pub fn method(
        &self,
        class: ClassId,
        name: &str,
        parameters: Vec<TypeRef>,
        return_type: Option<TypeRef>,
        access_flags: MethodAccessFlags,
    ) -> MethodId {
        self.bindings.add_method(MethodData {
            class,
            name: name.to_string(),
            descriptor: MethodDescriptor {
                parameters,
                return_type,
            },
            access_flags,
        })
    }

    /// Start numbering the locals of another method
    pub fn start_method(&self) {
        self.next_flow_id.set(0);
    }

    pub fn argument(&self, name: &str, descriptor: TypeRef) -> LocalId {
        self.new_local(name, descriptor, false, true)
    }

    pub fn local(&self, name: &str, descriptor: TypeRef) -> LocalId {
        self.new_local(name, descriptor, false, false)
    }

    pub fn final_local(&self, name: &str, descriptor: TypeRef) -> LocalId {
        self.new_local(name, descriptor, true, false)
    }

    fn new_local(&self, name: &str, descriptor: TypeRef, is_final: bool, is_argument: bool) -> LocalId {
        let flow_id = self.next_flow_id.get();
        self.next_flow_id.set(flow_id + 1);
        self.bindings.add_local(LocalData {
            name: name.to_string(),
            descriptor,
            is_final,
            flow_id,
            is_argument,
        })
    }

    pub fn declaration(
        &self,
        method: MethodId,
        arguments: Vec<LocalId>,
        statements: Vec<Statement>,
    ) -> MethodDeclaration {
        MethodDeclaration {
            method,
            arguments,
            body: Some(Block::new(statements)),
            problems: vec![],
            span: Span::default(),
        }
    }

    pub fn read(&self, local: LocalId) -> Expression {
        let ty = self.bindings.local(local).descriptor;
        Expression::new(ExpressionKind::Name(Binding::Local(local)), Some(ty), Span::default())
    }

    pub fn assign_local(&self, local: LocalId, value: Expression) -> Expression {
        assign(self.read(local), value)
    }

    /// Field read, through `receiver` or (if `None`) by simple name
    pub fn field_ref(&self, receiver: Option<Expression>, field: FieldId) -> Expression {
        let ty = self.bindings.field(field).descriptor;
        let kind = match receiver {
            Some(receiver) => ExpressionKind::FieldAccess {
                receiver: Box::new(receiver),
                field: Binding::Field(field),
            },
            None => ExpressionKind::Name(Binding::Field(field)),
        };
        Expression::new(kind, Some(ty), Span::default())
    }

    pub fn call(&self, receiver: Receiver, method: MethodId, arguments: Vec<Expression>) -> Expression {
        let ty = self.bindings.method(method).descriptor.return_type;
        Expression::new(
            ExpressionKind::MessageSend {
                receiver,
                method: Binding::Method(method),
                arguments,
            },
            ty,
            Span::default(),
        )
    }

    pub fn new_object(&self, constructor: MethodId, arguments: Vec<Expression>) -> Expression {
        let class = self.bindings.method(constructor).class;
        Expression::new(
            ExpressionKind::Allocation {
                constructor: Binding::Method(constructor),
                arguments,
            },
            Some(FieldType::object(class)),
            Span::default(),
        )
    }

    pub fn string(&self, value: &str) -> Expression {
        Expression::new(ExpressionKind::Literal, Some(self.string_type()), Span::default())
            .with_constant(ConstantValue::String(value.to_string()))
    }

    pub fn null(&self) -> Expression {
        let ty = FieldType::object(self.bindings.java.object);
        Expression::new(ExpressionKind::Null, Some(ty), Span::default())
    }

    pub fn this(&self, class: ClassId) -> Expression {
        Expression::new(ExpressionKind::This, Some(FieldType::object(class)), Span::default())
    }

    /// String `+`
    pub fn concat(&self, left: Expression, right: Expression) -> Expression {
        let string = self.string_type();
        Expression::new(
            ExpressionKind::Binary {
                operator: BinaryOperator::Add,
                left: Box::new(left),
                right: Box::new(right),
                operand_type: string,
                states: BranchStates::default(),
            },
            Some(string),
            Span::default(),
        )
    }

    /// `+=` and friends (string `+=` included)
    pub fn compound(&self, target: Expression, operator: BinaryOperator, value: Expression) -> Expression {
        let target_type = target.ty.unwrap_or(FieldType::int());
        let operand_type = if target_type == self.string_type() {
            target_type
        } else if operator.is_shift() {
            promote_unary(&target_type)
        } else {
            promote(&target_type, &value.ty.unwrap_or(FieldType::int()))
        };
        Expression::new(
            ExpressionKind::CompoundAssignment {
                target: Box::new(target),
                operator,
                value: Box::new(value),
                operand_type,
            },
            Some(target_type),
            Span::default(),
        )
    }

    fn string_type(&self) -> TypeRef {
        FieldType::object(self.bindings.java.string)
    }
}

pub fn int(value: i32) -> Expression {
    Expression::new(ExpressionKind::Literal, Some(FieldType::int()), Span::default())
        .with_constant(ConstantValue::Int(value))
}

pub fn long(value: i64) -> Expression {
    Expression::new(ExpressionKind::Literal, Some(FieldType::long()), Span::default())
        .with_constant(ConstantValue::Long(value))
}

pub fn double(value: f64) -> Expression {
    Expression::new(ExpressionKind::Literal, Some(FieldType::double()), Span::default())
        .with_constant(ConstantValue::Double(value))
}

pub fn boolean(value: bool) -> Expression {
    Expression::new(ExpressionKind::Literal, Some(FieldType::boolean()), Span::default())
        .with_constant(ConstantValue::Boolean(value))
}

/// Binary numeric promotion (references are left as they are)
pub fn promote(left: &TypeRef, right: &TypeRef) -> TypeRef {
    match (left.computational(), right.computational()) {
        (Some(BaseType::Double), Some(_)) | (Some(_), Some(BaseType::Double)) => FieldType::double(),
        (Some(BaseType::Float), Some(_)) | (Some(_), Some(BaseType::Float)) => FieldType::float(),
        (Some(BaseType::Long), Some(_)) | (Some(_), Some(BaseType::Long)) => FieldType::long(),
        (Some(_), Some(_)) => FieldType::int(),
        _ => *left,
    }
}

/// Unary numeric promotion
pub fn promote_unary(ty: &TypeRef) -> TypeRef {
    match ty.computational() {
        Some(base) => FieldType::Base(base),
        None => *ty,
    }
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let left_type = left.ty.unwrap_or(FieldType::int());
    let right_type = right.ty.unwrap_or(FieldType::int());
    let both_boolean = left_type == FieldType::boolean() && right_type == FieldType::boolean();
    let (operand_type, ty) = match operator {
        BinaryOperator::AndAnd | BinaryOperator::OrOr => (FieldType::boolean(), FieldType::boolean()),
        BinaryOperator::Eq | BinaryOperator::Ne if both_boolean => {
            (FieldType::boolean(), FieldType::boolean())
        }
        _ if operator.is_comparison() => (promote(&left_type, &right_type), FieldType::boolean()),
        _ if operator.is_shift() => {
            let promoted = promote_unary(&left_type);
            (promoted, promoted)
        }
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor if both_boolean => {
            (FieldType::boolean(), FieldType::boolean())
        }
        _ => {
            let promoted = promote(&left_type, &right_type);
            (promoted, promoted)
        }
    };
    Expression::new(
        ExpressionKind::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            operand_type,
            states: BranchStates::default(),
        },
        Some(ty),
        Span::default(),
    )
}

pub fn not(operand: Expression) -> Expression {
    Expression::new(
        ExpressionKind::Unary {
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
        },
        Some(FieldType::boolean()),
        Span::default(),
    )
}

pub fn negate(operand: Expression) -> Expression {
    let ty = operand.ty.map(|ty| promote_unary(&ty));
    Expression::new(
        ExpressionKind::Unary {
            operator: UnaryOperator::Minus,
            operand: Box::new(operand),
        },
        ty,
        Span::default(),
    )
}

pub fn conditional(condition: Expression, if_true: Expression, if_false: Expression) -> Expression {
    let ty = match (&if_true.ty, &if_false.ty) {
        (Some(left), Some(right)) if left == right => Some(*left),
        (Some(left), Some(right)) => Some(promote(left, right)),
        (ty, _) => *ty,
    };
    Expression::new(
        ExpressionKind::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            states: BranchStates::default(),
        },
        ty,
        Span::default(),
    )
}

pub fn assign(target: Expression, value: Expression) -> Expression {
    let ty = target.ty;
    Expression::new(
        ExpressionKind::Assignment {
            target: Box::new(target),
            value: Box::new(value),
        },
        ty,
        Span::default(),
    )
}

pub fn increment(target: Expression, kind: IncrementKind) -> Expression {
    let ty = target.ty;
    Expression::new(
        ExpressionKind::Increment {
            target: Box::new(target),
            kind,
        },
        ty,
        Span::default(),
    )
}

pub fn cast(operand: Expression, to: TypeRef) -> Expression {
    Expression::new(ExpressionKind::Cast(Box::new(operand)), Some(to), Span::default())
}

pub fn new_array(element: TypeRef, length: Expression) -> Expression {
    Expression::new(
        ExpressionKind::ArrayAllocation {
            dimensions: vec![length],
            initializer: None,
        },
        Some(FieldType::array(element)),
        Span::default(),
    )
}

pub fn array_element(array: Expression, index: Expression) -> Expression {
    let ty = match &array.ty {
        Some(FieldType::Ref(array_type)) => array_type.element_type(),
        _ => None,
    };
    Expression::new(
        ExpressionKind::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
        },
        ty,
        Span::default(),
    )
}

impl Expression {
    pub fn at_line(mut self, line: u32) -> Expression {
        self.span.line = line;
        self
    }
}

impl Statement {
    /// Same statement, on a given source line
    pub fn at_line(mut self, line: u32) -> Statement {
        self.span.line = line;
        self
    }
}

fn statement(kind: StatementKind) -> Statement {
    Statement::new(kind, Span::default())
}

pub fn declare(local: LocalId, initializer: Option<Expression>) -> Statement {
    statement(StatementKind::LocalDeclaration { local, initializer })
}

pub fn expression(expression: Expression) -> Statement {
    statement(StatementKind::Expression(expression))
}

pub fn block(statements: Vec<Statement>) -> Statement {
    statement(StatementKind::Block(Block::new(statements)))
}

pub fn if_(condition: Expression, then_branch: Statement, else_branch: Option<Statement>) -> Statement {
    statement(StatementKind::If {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
        states: BranchStates::default(),
    })
}

pub fn while_(condition: Expression, body: Statement) -> Statement {
    statement(StatementKind::While {
        condition,
        body: Box::new(body),
        states: LoopStates::default(),
    })
}

pub fn do_while(body: Statement, condition: Expression) -> Statement {
    statement(StatementKind::DoWhile {
        body: Box::new(body),
        condition,
        states: LoopStates::default(),
    })
}

pub fn for_(
    initializers: Vec<Statement>,
    condition: Option<Expression>,
    updates: Vec<Expression>,
    body: Statement,
) -> Statement {
    statement(StatementKind::For {
        initializers,
        condition,
        updates,
        body: Box::new(body),
        states: LoopStates::default(),
    })
}

pub fn labeled(label: &str, body: Statement) -> Statement {
    statement(StatementKind::Labeled {
        label: label.to_string(),
        body: Box::new(body),
        merged_state: StateCell::default(),
    })
}

pub fn break_(label: Option<&str>) -> Statement {
    statement(StatementKind::Break(label.map(str::to_string)))
}

pub fn continue_(label: Option<&str>) -> Statement {
    statement(StatementKind::Continue(label.map(str::to_string)))
}

pub fn return_(value: Option<Expression>) -> Statement {
    statement(StatementKind::Return(value))
}

pub fn throw(exception: Expression) -> Statement {
    statement(StatementKind::Throw(exception))
}

pub fn switch(selector: Expression, cases: Vec<SwitchCase>) -> Statement {
    statement(StatementKind::Switch {
        selector,
        cases,
        states: SwitchStates::default(),
    })
}

pub fn case(keys: Vec<i32>, is_default: bool, statements: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        keys,
        is_default,
        statements,
        span: Span::default(),
    }
}

pub fn try_(body: Vec<Statement>, catches: Vec<CatchClause>, finally: Option<Vec<Statement>>) -> Statement {
    statement(StatementKind::Try {
        body: Block::new(body),
        catches,
        finally: finally.map(Block::new),
        states: TryStates::default(),
    })
}

pub fn catch(local: LocalId, class: ClassId, body: Vec<Statement>) -> CatchClause {
    CatchClause {
        local,
        class,
        body: Block::new(body),
        span: Span::default(),
    }
}

pub fn super_call(constructor: MethodId, arguments: Vec<Expression>) -> Statement {
    statement(StatementKind::ConstructorCall {
        is_super: true,
        constructor: Binding::Method(constructor),
        arguments,
    })
}

pub fn type_declaration(
    class: ClassId,
    fields: Vec<FieldDeclaration>,
    methods: Vec<MethodDeclaration>,
    member_types: Vec<TypeDeclaration>,
) -> TypeDeclaration {
    TypeDeclaration {
        class,
        fields,
        methods,
        member_types,
        span: Span::default(),
    }
}

pub fn field_declaration(field: FieldId, initializer: Option<Expression>) -> FieldDeclaration {
    FieldDeclaration {
        field,
        initializer,
        span: Span::default(),
    }
}
