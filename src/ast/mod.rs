//! Resolved syntax trees
//!
//! Trees come out of the resolver fully typed: every name carries its `Binding`, every expression
//! its type and (when it has one) its constant value. After that the shape never changes. The only
//! mutation is in the `Cell`s that flow analysis fills (reachability bits and recorded state
//! indices) for code generation to read back.

pub mod builder;
mod constant;
mod operators;

pub use constant::*;
pub use operators::*;

use crate::binding::{Binding, ClassId, FieldId, LocalId, MethodId, TypeRef};
use crate::flow::StateIndex;
use bitflags::bitflags;
use std::cell::Cell;

/// Location of a node in its source file
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Span {
    /// Character offset of the first character
    pub start: u32,

    /// Character offset past the last character
    pub end: u32,

    /// 1-based line of `start`
    pub line: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32) -> Span {
        Span { start, end, line }
    }
}

bitflags! {
    /// Facts about a node, cached on it by resolution or flow analysis
    pub struct NodeBits: u16 {
        /// Control can reach the statement (cleared by flow analysis when it cannot)
        const IS_REACHABLE = 1 << 0;

        /// The value of the expression is immediately returned from the method, with no
        /// `finally` block in between
        const IS_RETURNED_VALUE = 1 << 1;

        /// The `then` branch of an `if` cannot complete normally
        const THEN_EXIT = 1 << 2;

        /// The `else` branch of an `if` cannot complete normally
        const ELSE_EXIT = 1 << 3;

        /// Assignment of a variable to itself
        const HAS_NO_EFFECT = 1 << 4;

        /// The `finally` block of a `try` cannot complete normally
        const FINALLY_EXITS = 1 << 5;
    }
}

/// Index into the flow state recorder, set once flow analysis has gone through a node
pub type StateCell = Cell<Option<StateIndex>>;

/// States recorded at the branches of an `if`, `?:`, `&&`, or `||`
///
/// For `&&` and `||`, `then` is the state on entry to the right operand and `otherwise` is unused.
#[derive(Default, Debug)]
pub struct BranchStates {
    pub then: StateCell,
    pub otherwise: StateCell,
    pub merged: StateCell,
}

#[derive(Default, Debug)]
pub struct LoopStates {
    /// Entry to the loop body
    pub body: StateCell,

    /// After the loop
    pub merged: StateCell,
}

#[derive(Default, Debug)]
pub struct SwitchStates {
    /// After the selector has been evaluated (entry to every case)
    pub pre_switch: StateCell,
    pub merged: StateCell,
}

#[derive(Default, Debug)]
pub struct TryStates {
    /// Entry to the `try` block (also entry to every `catch` and to the `finally`)
    pub pre_try: StateCell,
    pub merged: StateCell,
}

#[derive(Debug)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,

    /// `None` for calls to `void` methods
    pub ty: Option<TypeRef>,

    /// Value of compile-time constant expressions
    pub constant: Option<ConstantValue>,

    pub bits: Cell<NodeBits>,
}

#[derive(Debug)]
pub enum ExpressionKind {
    /// Literal (the value is in `Expression::constant`)
    Literal,

    Null,
    This,

    /// Simple name: a local, or a field of `this` or of the enclosing class
    Name(Binding),

    FieldAccess {
        receiver: Box<Expression>,
        field: Binding,
    },

    ArrayAccess {
        array: Box<Expression>,
        index: Box<Expression>,
    },

    ArrayLength(Box<Expression>),

    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },

    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,

        /// Type both operands are promoted to before the operation
        operand_type: TypeRef,

        states: BranchStates,
    },

    Conditional {
        condition: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
        states: BranchStates,
    },

    /// Simple assignment (`target` is a `Name`, `FieldAccess`, or `ArrayAccess`)
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },

    CompoundAssignment {
        target: Box<Expression>,
        operator: BinaryOperator,
        value: Box<Expression>,

        /// Type the operation is carried out in
        operand_type: TypeRef,
    },

    Increment {
        target: Box<Expression>,
        kind: IncrementKind,
    },

    /// Conversion to the type of the expression
    Cast(Box<Expression>),

    InstanceOf {
        operand: Box<Expression>,
        class: TypeRef,
    },

    /// `new C(...)` (the class is the type of the expression)
    Allocation {
        constructor: Binding,
        arguments: Vec<Expression>,
    },

    /// `new T[a][b][]` or `new T[] { ... }` (the array type is the type of the expression)
    ArrayAllocation {
        dimensions: Vec<Expression>,
        initializer: Option<Vec<Expression>>,
    },

    MessageSend {
        receiver: Receiver,
        method: Binding,
        arguments: Vec<Expression>,
    },
}

#[derive(Debug)]
pub enum Receiver {
    /// No explicit receiver: `this` for instance methods, nothing for static ones
    Implicit,

    /// `super.m(...)`
    Super,

    Expression(Box<Expression>),
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: Option<TypeRef>, span: Span) -> Expression {
        Expression {
            kind,
            span,
            ty,
            constant: None,
            bits: Cell::new(NodeBits::empty()),
        }
    }

    pub fn with_constant(mut self, value: ConstantValue) -> Expression {
        self.constant = Some(value);
        self
    }

    /// Value of a constant `boolean` expression
    pub fn constant_bool(&self) -> Option<bool> {
        self.constant.as_ref().and_then(ConstantValue::as_bool)
    }

    pub fn has_bits(&self, bits: NodeBits) -> bool {
        self.bits.get().contains(bits)
    }

    pub fn set_bits(&self, bits: NodeBits, value: bool) {
        let mut current = self.bits.get();
        current.set(bits, value);
        self.bits.set(current);
    }
}

#[derive(Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
    pub bits: Cell<NodeBits>,
}

#[derive(Debug)]
pub enum StatementKind {
    Empty,

    LocalDeclaration {
        local: LocalId,
        initializer: Option<Expression>,
    },

    Expression(Expression),
    Block(Block),

    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        states: BranchStates,
    },

    While {
        condition: Expression,
        body: Box<Statement>,
        states: LoopStates,
    },

    DoWhile {
        body: Box<Statement>,
        condition: Expression,
        states: LoopStates,
    },

    For {
        initializers: Vec<Statement>,

        /// Missing condition means `true`
        condition: Option<Expression>,

        updates: Vec<Expression>,
        body: Box<Statement>,
        states: LoopStates,
    },

    Labeled {
        label: String,
        body: Box<Statement>,
        merged_state: StateCell,
    },

    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expression>),
    Throw(Expression),

    Switch {
        selector: Expression,
        cases: Vec<SwitchCase>,
        states: SwitchStates,
    },

    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        states: TryStates,
    },

    /// `super(...)` or `this(...)` at the start of a constructor
    ConstructorCall {
        is_super: bool,
        constructor: Binding,
        arguments: Vec<Expression>,
    },
}

#[derive(Debug, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// Group of `case` labels (and possibly `default`) followed by statements
///
/// Control falls through from the statements of one group to the next.
#[derive(Debug)]
pub struct SwitchCase {
    pub keys: Vec<i32>,
    pub is_default: bool,
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug)]
pub struct CatchClause {
    /// Local holding the caught exception
    pub local: LocalId,

    /// Exception class caught
    pub class: ClassId,

    pub body: Block,
    pub span: Span,
}

impl Statement {
    /// New statement, assumed reachable until flow analysis says otherwise
    pub fn new(kind: StatementKind, span: Span) -> Statement {
        Statement {
            kind,
            span,
            bits: Cell::new(NodeBits::IS_REACHABLE),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.has_bits(NodeBits::IS_REACHABLE)
    }

    pub fn has_bits(&self, bits: NodeBits) -> bool {
        self.bits.get().contains(bits)
    }

    pub fn set_bits(&self, bits: NodeBits, value: bool) {
        let mut current = self.bits.get();
        current.set(bits, value);
        self.bits.set(current);
    }
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Block {
        Block { statements }
    }
}

/// Top-level types of one source file
#[derive(Debug, Default)]
pub struct CompilationUnit {
    pub types: Vec<TypeDeclaration>,
}

#[derive(Debug)]
pub struct TypeDeclaration {
    pub class: ClassId,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<MethodDeclaration>,
    pub member_types: Vec<TypeDeclaration>,
    pub span: Span,
}

#[derive(Debug)]
pub struct FieldDeclaration {
    pub field: FieldId,
    pub initializer: Option<Expression>,
    pub span: Span,
}

#[derive(Debug)]
pub struct MethodDeclaration {
    pub method: MethodId,

    /// Locals bound to the parameters, in order
    pub arguments: Vec<LocalId>,

    /// `None` for `abstract` and `native` methods
    pub body: Option<Block>,

    /// Problems found while resolving the method (if any, it gets no real code)
    pub problems: Vec<String>,

    pub span: Span,
}

impl MethodDeclaration {
    pub fn has_errors(&self) -> bool {
        !self.problems.is_empty()
    }
}
