use super::method::Dispatch;
use super::{CodeBuilderExts, Error, MethodGenerator};
use crate::ast::{
    BinaryOperator, BranchStates, ConstantValue, Expression, ExpressionKind, IncrementKind,
    NodeBits, Receiver, Span, UnaryOperator,
};
use crate::binding::{AccessorKind, Binding, FieldId, LocalId, Member, TypeRef};
use crate::jvm::{BaseType, BranchInstruction, FieldType, Instruction, MemberAccess, RefType, ShiftType};
use crate::util::Width;

/// Variable an assignment, compound assignment, or increment stores into
enum Place<'a> {
    Local(LocalId),
    Field {
        field: FieldId,
        receiver: FieldReceiver<'a>,

        /// Private field of another class in the same nest
        through_accessor: bool,
    },
    Array {
        array: &'a Expression,
        index: &'a Expression,
    },
}

enum FieldReceiver<'a> {
    /// Implicit `this`
    This,

    Expression(&'a Expression),

    /// Static field, possibly named through an expression evaluated for its side effects only
    Static(Option<&'a Expression>),
}

impl<'a> Place<'a> {
    /// Does storing leave the stored value on the stack? (Write accessors return it.)
    fn store_leaves_value(&self) -> bool {
        matches!(
            self,
            Place::Field {
                through_accessor: true,
                ..
            }
        )
    }
}

impl<'a, 'p> MethodGenerator<'a, 'p> {
    /// Generate an expression, leaving its value on the stack only if `value_required`
    pub(super) fn generate_expression(
        &mut self,
        expression: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        if let Some(constant) = &expression.constant {
            if value_required {
                self.code
                    .const_value(constant, self.settings.string_chunk_length)?;
            }
            return Ok(());
        }
        if Self::is_boolean_operation(expression) {
            return self.generate_boolean_value(expression, value_required);
        }

        let span = expression.span;
        match &expression.kind {
            ExpressionKind::Literal => Err(Error::malformed(span, "literal without a value")),

            ExpressionKind::Null => {
                if value_required {
                    self.code.push_instruction(Instruction::AConstNull)?;
                }
                Ok(())
            }

            ExpressionKind::This => {
                if value_required {
                    self.code.push_instruction(Instruction::ALoad(0))?;
                }
                Ok(())
            }

            ExpressionKind::Name(Binding::Local(local)) => {
                if value_required {
                    let slot = self.local_slot(*local, span)?;
                    let ty = Self::value_type(expression)?;
                    self.code.get_local(slot, &ty)?;
                }
                Ok(())
            }

            ExpressionKind::Name(Binding::Field(field)) => {
                let place = self.field_place(*field, None);
                self.read_place(&place, expression, value_required)
            }

            ExpressionKind::Name(binding) => Err(Self::not_a_variable(binding, span)),

            ExpressionKind::FieldAccess { receiver, field } => {
                let field = Self::field_binding(field, span)?;
                let place = self.field_place(field, Some(receiver));
                self.read_place(&place, expression, value_required)
            }

            ExpressionKind::ArrayAccess { array, index } => {
                let place = Place::Array { array, index };
                self.read_place(&place, expression, value_required)
            }

            ExpressionKind::ArrayLength(array) => {
                self.generate_expression(array, true)?;
                self.code.push_instruction(Instruction::ArrayLength)?;
                if !value_required {
                    self.code.pop_value(1)?;
                }
                Ok(())
            }

            ExpressionKind::Unary { operator, operand } => {
                self.generate_unary(expression, *operator, operand, value_required)
            }

            ExpressionKind::Binary {
                operator: BinaryOperator::Add,
                ..
            } if self.is_string(&expression.ty) => {
                self.generate_string_concatenation(expression, value_required)
            }

            ExpressionKind::Binary {
                operator,
                left,
                right,
                operand_type,
                ..
            } => self.generate_arithmetic(*operator, left, right, operand_type, span, value_required),

            ExpressionKind::Conditional {
                condition,
                if_true,
                if_false,
                states,
            } => self.generate_conditional(
                expression,
                condition,
                if_true,
                if_false,
                states,
                value_required,
            ),

            ExpressionKind::Assignment { target, value } => {
                self.generate_assignment(expression, target, value, value_required)
            }

            ExpressionKind::CompoundAssignment {
                target,
                operator,
                value,
                operand_type,
            } => self.generate_compound_assignment(
                target,
                *operator,
                value,
                operand_type,
                value_required,
            ),

            ExpressionKind::Increment { target, kind } => {
                self.generate_increment(target, *kind, value_required)
            }

            ExpressionKind::Cast(operand) => self.generate_cast(expression, operand, value_required),

            ExpressionKind::InstanceOf { operand, class } => {
                self.generate_expression(operand, true)?;
                let class = self.class_constant(class)?;
                self.code.push_instruction(Instruction::InstanceOf(class))?;
                if !value_required {
                    self.code.pop_value(1)?;
                }
                Ok(())
            }

            ExpressionKind::Allocation {
                constructor,
                arguments,
            } => self.generate_allocation(expression, constructor, arguments, value_required),

            ExpressionKind::ArrayAllocation {
                dimensions,
                initializer,
            } => self.generate_array_allocation(
                expression,
                dimensions,
                initializer.as_deref(),
                value_required,
            ),

            ExpressionKind::MessageSend {
                receiver,
                method,
                arguments,
            } => self.generate_message_send(expression, receiver, method, arguments, value_required),
        }
    }

    /// Expressions generated through the optimized boolean path
    pub(super) fn is_boolean_operation(expression: &Expression) -> bool {
        match &expression.kind {
            ExpressionKind::Unary {
                operator: UnaryOperator::Not,
                ..
            } => true,
            ExpressionKind::Binary {
                operator,
                operand_type,
                ..
            } => {
                operator.is_comparison()
                    || matches!(operator, BinaryOperator::AndAnd | BinaryOperator::OrOr)
                    || (matches!(
                        operator,
                        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor
                    ) && *operand_type == FieldType::boolean())
            }
            ExpressionKind::Conditional { .. } => expression.ty == Some(FieldType::boolean()),
            _ => false,
        }
    }

    pub(super) fn value_type(expression: &Expression) -> Result<TypeRef, Error> {
        expression
            .ty
            .ok_or_else(|| Error::malformed(expression.span, "void expression used as a value"))
    }

    fn is_string(&self, ty: &Option<TypeRef>) -> bool {
        *ty == Some(FieldType::object(self.bindings.java.string))
    }

    fn field_binding(binding: &Binding, span: Span) -> Result<FieldId, Error> {
        match binding {
            Binding::Field(field) => Ok(*field),
            other => Err(Self::not_a_variable(other, span)),
        }
    }

    fn not_a_variable(binding: &Binding, span: Span) -> Error {
        match binding {
            Binding::Problem(reason) => Error::ProblemBinding {
                span,
                reason: reason.to_string(),
            },
            other => Error::malformed(span, format!("expected a variable, found {:?}", other)),
        }
    }

    fn field_place(&self, field: FieldId, receiver: Option<&'a Expression>) -> Place<'a> {
        let data = self.bindings.field(field);
        let receiver = if data.access_flags.is_static() {
            FieldReceiver::Static(receiver)
        } else {
            match receiver {
                Some(receiver) => FieldReceiver::Expression(receiver),
                None => FieldReceiver::This,
            }
        };
        Place::Field {
            field,
            receiver,
            through_accessor: self
                .bindings
                .requires_accessor(Member::Field(field), self.class),
        }
    }

    fn place_of(&self, target: &'a Expression) -> Result<Place<'a>, Error> {
        match &target.kind {
            ExpressionKind::Name(Binding::Local(local)) => Ok(Place::Local(*local)),
            ExpressionKind::Name(Binding::Field(field)) => Ok(self.field_place(*field, None)),
            ExpressionKind::Name(binding) => Err(Self::not_a_variable(binding, target.span)),
            ExpressionKind::FieldAccess { receiver, field } => {
                let field = Self::field_binding(field, target.span)?;
                Ok(self.field_place(field, Some(receiver)))
            }
            ExpressionKind::ArrayAccess { array, index } => Ok(Place::Array { array, index }),
            _ => Err(Error::malformed(target.span, "assignment to a non-variable")),
        }
    }

    /// Push whatever a place needs below its value (receiver, or array and index), returning
    /// how many slots that is
    fn load_place_operands(&mut self, place: &Place<'a>) -> Result<usize, Error> {
        match place {
            Place::Local(_) => Ok(0),
            Place::Field { receiver, .. } => match receiver {
                FieldReceiver::This => {
                    self.code.push_instruction(Instruction::ALoad(0))?;
                    Ok(1)
                }
                FieldReceiver::Expression(receiver) => {
                    self.generate_expression(receiver, true)?;
                    Ok(1)
                }
                FieldReceiver::Static(receiver) => {
                    if let Some(receiver) = receiver {
                        self.generate_expression(receiver, false)?;
                    }
                    Ok(0)
                }
            },
            Place::Array { array, index } => {
                self.generate_expression(array, true)?;
                self.generate_expression(index, true)?;
                Ok(2)
            }
        }
    }

    fn dup_place_operands(&mut self, slots: usize) -> Result<(), Error> {
        match slots {
            0 => Ok(()),
            1 => Ok(self.code.push_instruction(Instruction::Dup)?),
            _ => Ok(self.code.push_instruction(Instruction::Dup2)?),
        }
    }

    /// Read a place whose operands are on the stack
    fn load_place(&mut self, place: &Place<'a>, ty: &TypeRef, span: Span) -> Result<(), Error> {
        match place {
            Place::Local(local) => {
                let slot = self.local_slot(*local, span)?;
                self.code.get_local(slot, ty)?;
            }
            Place::Field {
                field,
                through_accessor,
                ..
            } => {
                let accessor = if *through_accessor {
                    self.accessor_for(Member::Field(*field), AccessorKind::FieldRead, span)
                } else {
                    None
                };
                match accessor {
                    Some(accessor) => self.invoke(accessor, Dispatch::Normal)?,
                    None => {
                        let field_ref = self.field_ref(*field)?;
                        if self.bindings.field(*field).access_flags.is_static() {
                            self.code.push_instruction(Instruction::GetStatic(field_ref))?;
                        } else {
                            self.code.push_instruction(Instruction::GetField(field_ref))?;
                        }
                    }
                }
            }
            Place::Array { .. } => self.code.array_load(ty)?,
        }
        Ok(())
    }

    /// Store the value on top of the stack into a place whose operands are just below it
    ///
    /// Returns whether the value is still on the stack afterwards.
    fn store_place(&mut self, place: &Place<'a>, ty: &TypeRef, span: Span) -> Result<bool, Error> {
        match place {
            Place::Local(local) => {
                let slot = self.local_slot(*local, span)?;
                self.code.set_local(slot, ty)?;
                if self.settings.local_variables {
                    self.code.open_local_range(slot);
                }
            }
            Place::Field {
                field,
                through_accessor,
                ..
            } => {
                let accessor = if *through_accessor {
                    self.accessor_for(Member::Field(*field), AccessorKind::FieldWrite, span)
                } else {
                    None
                };
                match accessor {
                    Some(accessor) => {
                        self.invoke(accessor, Dispatch::Normal)?;
                        return Ok(true);
                    }
                    None => {
                        let field_ref = self.field_ref(*field)?;
                        if self.bindings.field(*field).access_flags.is_static() {
                            self.code.push_instruction(Instruction::PutStatic(field_ref))?;
                        } else {
                            self.code.push_instruction(Instruction::PutField(field_ref))?;
                        }
                    }
                }
            }
            Place::Array { .. } => self.code.array_store(ty)?,
        }
        Ok(false)
    }

    fn read_place(
        &mut self,
        place: &Place<'a>,
        expression: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        if !value_required {
            match place {
                Place::Local(_)
                | Place::Field {
                    receiver: FieldReceiver::This,
                    ..
                } => return Ok(()),
                Place::Field {
                    receiver: FieldReceiver::Static(receiver),
                    ..
                } => {
                    if let Some(receiver) = receiver {
                        self.generate_expression(receiver, false)?;
                    }
                    return Ok(());
                }
                _ => (),
            }
        }
        let ty = Self::value_type(expression)?;
        self.load_place_operands(place)?;
        self.load_place(place, &ty, expression.span)?;
        if !value_required {
            self.code.pop_value(ty.width())?;
        }
        Ok(())
    }

    fn generate_assignment(
        &mut self,
        expression: &'a Expression,
        target: &'a Expression,
        value: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        if expression.has_bits(NodeBits::HAS_NO_EFFECT) && !value_required {
            return Ok(());
        }
        let ty = Self::value_type(target)?;
        let place = self.place_of(target)?;
        let under = self.load_place_operands(&place)?;
        self.generate_expression(value, true)?;
        self.convert(value, &ty)?;

        let leaves_value = place.store_leaves_value();
        if value_required && !leaves_value {
            self.code.dup_value(ty.width(), under)?;
        }
        self.store_place(&place, &ty, expression.span)?;
        if leaves_value && !value_required {
            self.code.pop_value(ty.width())?;
        }
        Ok(())
    }

    fn generate_compound_assignment(
        &mut self,
        target: &'a Expression,
        operator: BinaryOperator,
        value: &'a Expression,
        operand_type: &TypeRef,
        value_required: bool,
    ) -> Result<(), Error> {
        let ty = Self::value_type(target)?;
        let place = self.place_of(target)?;
        let under = self.load_place_operands(&place)?;
        self.dup_place_operands(under)?;
        self.load_place(&place, &ty, target.span)?;

        if operator == BinaryOperator::Add && self.is_string(&Some(*operand_type)) {
            // new StringBuilder(String.valueOf(current)).append(value).toString()
            let java = &self.bindings.java;
            self.invoke(java.string_value_of, Dispatch::Normal)?;
            let builder = self.class_constant(&FieldType::object(java.string_builder))?;
            self.code.push_instruction(Instruction::New(builder))?;
            self.code.push_instruction(Instruction::DupX1)?;
            self.code.push_instruction(Instruction::Swap)?;
            self.invoke(java.string_builder_init_string, Dispatch::Special)?;
            self.generate_expression(value, true)?;
            let append = java.append_for(&Self::value_type(value)?);
            self.invoke(append, Dispatch::Normal)?;
            self.invoke(java.string_builder_to_string, Dispatch::Normal)?;
        } else {
            self.code.convert(&ty, operand_type)?;
            self.generate_expression(value, true)?;
            if operator.is_shift() {
                self.convert(value, &FieldType::int())?;
            } else {
                self.convert(value, operand_type)?;
            }
            self.arithmetic(operator, operand_type, target.span)?;
            self.code.convert(operand_type, &ty)?;
        }

        let leaves_value = place.store_leaves_value();
        if value_required && !leaves_value {
            self.code.dup_value(ty.width(), under)?;
        }
        self.store_place(&place, &ty, target.span)?;
        if leaves_value && !value_required {
            self.code.pop_value(ty.width())?;
        }
        Ok(())
    }

    fn generate_increment(
        &mut self,
        target: &'a Expression,
        kind: IncrementKind,
        value_required: bool,
    ) -> Result<(), Error> {
        let ty = Self::value_type(target)?;
        let place = self.place_of(target)?;

        // `int` locals are incremented in place
        if let (Place::Local(local), FieldType::Base(BaseType::Int)) = (&place, &ty) {
            let slot = self.local_slot(*local, target.span)?;
            if value_required && !kind.is_prefix() {
                self.code.get_local(slot, &ty)?;
            }
            self.code
                .push_instruction(Instruction::IInc(slot, kind.delta()))?;
            if value_required && kind.is_prefix() {
                self.code.get_local(slot, &ty)?;
            }
            return Ok(());
        }

        let computational = ty
            .computational()
            .ok_or_else(|| Error::malformed(target.span, "increment of a reference"))?;
        let width = ty.width();
        let under = self.load_place_operands(&place)?;
        self.dup_place_operands(under)?;
        self.load_place(&place, &ty, target.span)?;
        if value_required && !kind.is_prefix() {
            self.code.dup_value(width, under)?;
        }

        let operand_type = FieldType::Base(computational);
        match computational {
            BaseType::Long => self.code.const_long(1)?,
            BaseType::Float => self.code.const_float(1.0)?,
            BaseType::Double => self.code.const_double(1.0)?,
            _ => self.code.const_int(1)?,
        }
        let operator = if kind.delta() > 0 {
            BinaryOperator::Add
        } else {
            BinaryOperator::Sub
        };
        self.arithmetic(operator, &operand_type, target.span)?;
        self.code.convert(&operand_type, &ty)?;

        let leaves_value = place.store_leaves_value();
        let keep_new_value = value_required && kind.is_prefix();
        if keep_new_value && !leaves_value {
            self.code.dup_value(width, under)?;
        }
        self.store_place(&place, &ty, target.span)?;
        if leaves_value && !keep_new_value {
            self.code.pop_value(width)?;
        }
        Ok(())
    }

    fn generate_unary(
        &mut self,
        expression: &'a Expression,
        operator: UnaryOperator,
        operand: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        if !value_required {
            return self.generate_expression(operand, false);
        }
        let ty = Self::value_type(expression)?;
        self.generate_expression(operand, true)?;
        self.convert(operand, &ty)?;
        let computational = ty.computational();
        match operator {
            UnaryOperator::Plus => (),
            UnaryOperator::Minus => {
                let negate = match computational {
                    Some(BaseType::Long) => Instruction::LNeg,
                    Some(BaseType::Float) => Instruction::FNeg,
                    Some(BaseType::Double) => Instruction::DNeg,
                    Some(_) => Instruction::INeg,
                    None => return Err(Error::malformed(expression.span, "negated reference")),
                };
                self.code.push_instruction(negate)?;
            }
            UnaryOperator::Complement => match computational {
                Some(BaseType::Long) => {
                    self.code.const_long(-1)?;
                    self.code.push_instruction(Instruction::LXor)?;
                }
                Some(BaseType::Int) => {
                    self.code.const_int(-1)?;
                    self.code.push_instruction(Instruction::IXor)?;
                }
                _ => {
                    return Err(Error::malformed(
                        expression.span,
                        "complement of a non-integral value",
                    ))
                }
            },
            UnaryOperator::Not => return self.generate_boolean_value(expression, true),
        }
        Ok(())
    }

    fn generate_arithmetic(
        &mut self,
        operator: BinaryOperator,
        left: &'a Expression,
        right: &'a Expression,
        operand_type: &TypeRef,
        span: Span,
        value_required: bool,
    ) -> Result<(), Error> {
        // Integer division can still throw, so it is kept even when unused
        let may_throw = matches!(operator, BinaryOperator::Div | BinaryOperator::Rem)
            && matches!(
                operand_type.computational(),
                Some(BaseType::Int | BaseType::Long)
            );
        if !value_required && !may_throw {
            self.generate_expression(left, false)?;
            return self.generate_expression(right, false);
        }

        self.generate_expression(left, true)?;
        self.convert(left, operand_type)?;
        self.generate_expression(right, true)?;
        if operator.is_shift() {
            self.convert(right, &FieldType::int())?;
        } else {
            self.convert(right, operand_type)?;
        }
        self.arithmetic(operator, operand_type, span)?;
        if !value_required {
            self.code.pop_value(operand_type.width())?;
        }
        Ok(())
    }

    /// Apply a binary operator to the two operands on the stack
    pub(super) fn arithmetic(
        &mut self,
        operator: BinaryOperator,
        operand_type: &TypeRef,
        span: Span,
    ) -> Result<(), Error> {
        use BaseType::{Double, Float, Int, Long};
        use Instruction::*;

        let computational = operand_type.computational().ok_or_else(|| {
            Error::malformed(span, format!("operator {} applied to references", operator))
        })?;
        let insn = match (operator, computational) {
            (BinaryOperator::Add, Int) => IAdd,
            (BinaryOperator::Add, Long) => LAdd,
            (BinaryOperator::Add, Float) => FAdd,
            (BinaryOperator::Add, Double) => DAdd,
            (BinaryOperator::Sub, Int) => ISub,
            (BinaryOperator::Sub, Long) => LSub,
            (BinaryOperator::Sub, Float) => FSub,
            (BinaryOperator::Sub, Double) => DSub,
            (BinaryOperator::Mul, Int) => IMul,
            (BinaryOperator::Mul, Long) => LMul,
            (BinaryOperator::Mul, Float) => FMul,
            (BinaryOperator::Mul, Double) => DMul,
            (BinaryOperator::Div, Int) => IDiv,
            (BinaryOperator::Div, Long) => LDiv,
            (BinaryOperator::Div, Float) => FDiv,
            (BinaryOperator::Div, Double) => DDiv,
            (BinaryOperator::Rem, Int) => IRem,
            (BinaryOperator::Rem, Long) => LRem,
            (BinaryOperator::Rem, Float) => FRem,
            (BinaryOperator::Rem, Double) => DRem,
            (BinaryOperator::Shl, Int) => ISh(ShiftType::Left),
            (BinaryOperator::Shl, Long) => LSh(ShiftType::Left),
            (BinaryOperator::Shr, Int) => ISh(ShiftType::ArithmeticRight),
            (BinaryOperator::Shr, Long) => LSh(ShiftType::ArithmeticRight),
            (BinaryOperator::UShr, Int) => ISh(ShiftType::LogicalRight),
            (BinaryOperator::UShr, Long) => LSh(ShiftType::LogicalRight),
            (BinaryOperator::And, Int) => IAnd,
            (BinaryOperator::And, Long) => LAnd,
            (BinaryOperator::Or, Int) => IOr,
            (BinaryOperator::Or, Long) => LOr,
            (BinaryOperator::Xor, Int) => IXor,
            (BinaryOperator::Xor, Long) => LXor,
            (operator, computational) => {
                return Err(Error::malformed(
                    span,
                    format!("operator {} applied to {:?}", operator, computational),
                ))
            }
        };
        self.code.push_instruction(insn)?;
        Ok(())
    }

    /// `a + b + c` on strings, as a single `StringBuilder`
    fn generate_string_concatenation(
        &mut self,
        expression: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        let mut operands = vec![];
        self.collect_concatenated(expression, &mut operands);

        let java = &self.bindings.java;
        let builder = self.class_constant(&FieldType::object(java.string_builder))?;
        self.code.push_instruction(Instruction::New(builder))?;
        self.code.push_instruction(Instruction::Dup)?;
        self.invoke(java.string_builder_init, Dispatch::Special)?;
        for operand in operands {
            if let Some(ConstantValue::String(string)) = &operand.constant {
                if string.is_empty() {
                    continue;
                }
            }
            self.generate_expression(operand, true)?;
            let append = java.append_for(&Self::value_type(operand)?);
            self.invoke(append, Dispatch::Normal)?;
        }
        self.invoke(java.string_builder_to_string, Dispatch::Normal)?;
        if !value_required {
            self.code.pop_value(1)?;
        }
        Ok(())
    }

    fn collect_concatenated(&self, expression: &'a Expression, operands: &mut Vec<&'a Expression>) {
        match &expression.kind {
            ExpressionKind::Binary {
                operator: BinaryOperator::Add,
                left,
                right,
                ..
            } if expression.constant.is_none() && self.is_string(&expression.ty) => {
                self.collect_concatenated(left, operands);
                self.collect_concatenated(right, operands);
            }
            _ => operands.push(expression),
        }
    }

    fn generate_conditional(
        &mut self,
        expression: &'a Expression,
        condition: &'a Expression,
        if_true: &'a Expression,
        if_false: &'a Expression,
        states: &BranchStates,
        value_required: bool,
    ) -> Result<(), Error> {
        let ty = expression.ty;
        let arm = |generator: &mut Self, arm: &'a Expression| -> Result<(), Error> {
            generator.generate_expression(arm, value_required)?;
            if let (true, Some(ty)) = (value_required, &ty) {
                generator.convert(arm, ty)?;
            }
            Ok(())
        };

        match condition.constant_bool() {
            Some(true) => return arm(self, if_true),
            Some(false) => return arm(self, if_false),
            None => (),
        }

        let else_label = self.code.fresh_label();
        let end_label = self.code.fresh_label();
        self.generate_optimized_boolean(condition, None, Some(else_label), true)?;
        self.sync_locals(states.then.get());
        arm(self, if_true)?;
        if self.code.is_alive() {
            self.code.push_branch(BranchInstruction::Goto(end_label))?;
        }
        self.place_if_reachable(else_label)?;
        self.sync_locals(states.otherwise.get());
        arm(self, if_false)?;
        self.place_if_reachable(end_label)?;
        self.sync_locals(states.merged.get());
        Ok(())
    }

    fn generate_cast(
        &mut self,
        expression: &'a Expression,
        operand: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        let to = Self::value_type(expression)?;
        let from = Self::value_type(operand)?;
        if !to.is_reference() {
            self.generate_expression(operand, value_required)?;
            if value_required {
                self.code.convert(&from, &to)?;
            }
            return Ok(());
        }

        self.generate_expression(operand, true)?;
        let statically_known = match (&from, &to) {
            _ if matches!(operand.kind, ExpressionKind::Null) => true,
            (FieldType::Ref(RefType::Object(sub)), FieldType::Ref(RefType::Object(sup))) => {
                self.bindings.is_subclass(*sub, *sup)
            }
            (from, to) => from == to,
        };
        if !statically_known {
            let class = self.class_constant(&to)?;
            self.code.push_instruction(Instruction::CheckCast(class))?;
        }
        if !value_required {
            self.code.pop_value(1)?;
        }
        Ok(())
    }

    fn generate_arguments(
        &mut self,
        arguments: &'a [Expression],
        parameters: &[TypeRef],
        span: Span,
    ) -> Result<(), Error> {
        if arguments.len() != parameters.len() {
            return Err(Error::malformed(
                span,
                format!(
                    "{} arguments passed for {} parameters",
                    arguments.len(),
                    parameters.len()
                ),
            ));
        }
        for (argument, parameter) in arguments.iter().zip(parameters) {
            self.generate_expression(argument, true)?;
            self.convert(argument, parameter)?;
        }
        Ok(())
    }

    fn generate_allocation(
        &mut self,
        expression: &'a Expression,
        constructor: &Binding,
        arguments: &'a [Expression],
        value_required: bool,
    ) -> Result<(), Error> {
        let constructor = Self::method_binding(constructor, expression.span)?;
        let parameters = &self.bindings.method(constructor).descriptor.parameters;
        let accessor = self.accessor_for(
            Member::Method(constructor),
            AccessorKind::ConstructorCall,
            expression.span,
        );
        match accessor {
            Some(accessor) => {
                self.generate_arguments(arguments, parameters, expression.span)?;
                self.invoke(accessor, Dispatch::Normal)?;
            }
            None => {
                let class = self.class_constant(&Self::value_type(expression)?)?;
                self.code.push_instruction(Instruction::New(class))?;
                self.code.push_instruction(Instruction::Dup)?;
                self.generate_arguments(arguments, parameters, expression.span)?;
                self.invoke(constructor, Dispatch::Special)?;
            }
        }
        if !value_required {
            self.code.pop_value(1)?;
        }
        Ok(())
    }

    /// Generate a constructor call on `this` (`super(...)` or `this(...)`)
    pub(super) fn generate_constructor_call(
        &mut self,
        constructor: &Binding,
        arguments: &'a [Expression],
        span: Span,
    ) -> Result<(), Error> {
        let constructor = Self::method_binding(constructor, span)?;
        if self
            .bindings
            .requires_accessor(Member::Method(constructor), self.class)
        {
            // Constructor accessors are factories: they can't initialize an existing object
            return Err(Error::ProblemBinding {
                span,
                reason: format!(
                    "private constructor of {} is not reachable from a nested class",
                    self.bindings
                        .class(self.bindings.method(constructor).class)
                        .name
                ),
            });
        }
        let parameters = &self.bindings.method(constructor).descriptor.parameters;
        self.code.push_instruction(Instruction::ALoad(0))?;
        self.generate_arguments(arguments, parameters, span)?;
        self.invoke(constructor, Dispatch::Special)
    }

    fn generate_array_allocation(
        &mut self,
        expression: &'a Expression,
        dimensions: &'a [Expression],
        initializer: Option<&'a [Expression]>,
        value_required: bool,
    ) -> Result<(), Error> {
        let ty = Self::value_type(expression)?;
        let element = match &ty {
            FieldType::Ref(array) => array.element_type(),
            FieldType::Base(_) => None,
        }
        .ok_or_else(|| Error::malformed(expression.span, "array allocation of a non-array"))?;

        match initializer {
            Some(elements) => {
                self.code.const_int(elements.len() as i32)?;
                self.new_array(&element)?;
                for (idx, value) in elements.iter().enumerate() {
                    // New arrays are already full of default values
                    if Self::is_default_value(value) {
                        continue;
                    }
                    self.code.push_instruction(Instruction::Dup)?;
                    self.code.const_int(idx as i32)?;
                    self.generate_expression(value, true)?;
                    self.convert(value, &element)?;
                    self.code.array_store(&element)?;
                }
            }
            None => {
                for dimension in dimensions {
                    self.generate_expression(dimension, true)?;
                    self.convert(dimension, &FieldType::int())?;
                }
                if dimensions.len() == 1 {
                    self.new_array(&element)?;
                } else {
                    let class = self.class_constant(&ty)?;
                    let count = u8::try_from(dimensions.len()).map_err(|_| {
                        Error::malformed(expression.span, "more than 255 array dimensions")
                    })?;
                    self.code
                        .push_instruction(Instruction::MultiANewArray(class, count))?;
                }
            }
        }
        if !value_required {
            self.code.pop_value(1)?;
        }
        Ok(())
    }

    /// One-dimensional array of `element`s, whose length is on the stack
    fn new_array(&mut self, element: &TypeRef) -> Result<(), Error> {
        match element {
            FieldType::Base(base) => self.code.push_instruction(Instruction::NewArray(*base))?,
            FieldType::Ref(_) => {
                let class = self.class_constant(element)?;
                self.code.push_instruction(Instruction::ANewArray(class))?;
            }
        }
        Ok(())
    }

    fn is_default_value(value: &Expression) -> bool {
        match &value.constant {
            Some(ConstantValue::Boolean(boolean)) => !boolean,
            Some(ConstantValue::String(_)) => false,
            Some(constant) => constant.is_zero(),
            None => matches!(value.kind, ExpressionKind::Null),
        }
    }

    fn generate_message_send(
        &mut self,
        expression: &'a Expression,
        receiver: &'a Receiver,
        method: &Binding,
        arguments: &'a [Expression],
        value_required: bool,
    ) -> Result<(), Error> {
        let span = expression.span;
        let method = Self::method_binding(method, span)?;
        let data = self.bindings.method(method);
        let is_static = data.is_static();

        let accessor = match receiver {
            Receiver::Super => None,
            _ => self.accessor_for(Member::Method(method), AccessorKind::MethodCall, span),
        };
        match receiver {
            Receiver::Implicit if !is_static => {
                self.code.push_instruction(Instruction::ALoad(0))?
            }
            Receiver::Implicit => (),
            Receiver::Super => self.code.push_instruction(Instruction::ALoad(0))?,
            Receiver::Expression(receiver) => self.generate_expression(receiver, !is_static)?,
        }
        self.generate_arguments(arguments, &data.descriptor.parameters, span)?;

        match accessor {
            Some(accessor) => self.invoke(accessor, Dispatch::Normal)?,
            None => {
                let special = matches!(receiver, Receiver::Super)
                    || (data.access_flags.is_private() && data.class == self.class);
                let dispatch = if special {
                    Dispatch::Special
                } else {
                    Dispatch::Normal
                };
                self.invoke(method, dispatch)?;
            }
        }

        match (&data.descriptor.return_type, value_required) {
            (Some(return_type), false) => self.code.pop_value(return_type.width())?,
            (None, true) => {
                return Err(Error::malformed(span, "void method call used as a value"))
            }
            _ => (),
        }
        Ok(())
    }
}
