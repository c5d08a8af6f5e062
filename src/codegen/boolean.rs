//! Boolean expressions as control flow
//!
//! Conditions are generated as jumps rather than as `0`/`1` values wherever possible: `if (a && b)`
//! becomes two conditional branches, with no value ever pushed. Only when a boolean really is
//! needed as a value (stored, passed, returned) is it materialized from the jumps.

use super::{CodeBuilderExts, Error, MethodGenerator};
use crate::ast::{BinaryOperator, BranchStates, Expression, ExpressionKind, NodeBits, UnaryOperator};
use crate::binding::TypeRef;
use crate::jvm::{
    BaseType, BranchInstruction, CompareMode, EqComparison, FieldType, Instruction, Label,
    OrdComparison,
};

/// Where a condition jumps
#[derive(Copy, Clone, Debug)]
struct Jump {
    label: Label,

    /// Jump when the condition evaluates to this (fall through otherwise)
    when: bool,
}

impl Jump {
    fn negated(self) -> Jump {
        Jump {
            label: self.label,
            when: !self.when,
        }
    }
}

impl<'a, 'p> MethodGenerator<'a, 'p> {
    /// Generate a boolean operation as an `int` value of `0` or `1`
    pub(super) fn generate_boolean_value(
        &mut self,
        expression: &'a Expression,
        value_required: bool,
    ) -> Result<(), Error> {
        if !value_required {
            return self.generate_optimized_boolean(expression, None, None, false);
        }

        let false_label = self.code.fresh_label();
        self.generate_optimized_boolean(expression, None, Some(false_label), true)?;
        if self.code.is_alive() {
            self.code.const_int(1)?;
            if !self.code.is_label_referenced(false_label) {
                return Ok(());
            }
            if expression.has_bits(NodeBits::IS_RETURNED_VALUE) {
                let return_type = self.return_type.unwrap_or(FieldType::boolean());
                self.code.return_value(Some(&return_type))?;
            } else {
                let end_label = self.code.fresh_label();
                self.code.push_branch(BranchInstruction::Goto(end_label))?;
                self.code.place_label(false_label)?;
                self.code.const_int(0)?;
                self.code.place_label(end_label)?;
                return Ok(());
            }
        }
        self.place_if_reachable(false_label)?;
        if self.code.is_alive() {
            self.code.const_int(0)?;
        }
        Ok(())
    }

    /// Generate a condition as a jump to `true_label` when it holds, or to `false_label` when
    /// it doesn't
    ///
    /// With only one label, the other outcome falls through. With neither, the condition is
    /// only evaluated for its side effects. When `value_required` is false, jumps that only
    /// carry the result (as opposed to short-circuiting) are left out.
    pub(super) fn generate_optimized_boolean(
        &mut self,
        expression: &'a Expression,
        true_label: Option<Label>,
        false_label: Option<Label>,
        value_required: bool,
    ) -> Result<(), Error> {
        match (true_label, false_label) {
            (Some(label), None) => {
                self.generate_jump(expression, Jump { label, when: true }, value_required)
            }
            (None, Some(label)) => {
                self.generate_jump(expression, Jump { label, when: false }, value_required)
            }
            (Some(true_label), Some(false_label)) => {
                self.generate_jump(
                    expression,
                    Jump {
                        label: true_label,
                        when: true,
                    },
                    value_required,
                )?;
                if value_required && self.code.is_alive() {
                    self.code.push_branch(BranchInstruction::Goto(false_label))?;
                }
                Ok(())
            }
            (None, None) => {
                let label = self.code.fresh_label();
                self.generate_jump(expression, Jump { label, when: false }, value_required)?;
                self.place_if_reachable(label)
            }
        }
    }

    fn generate_jump(
        &mut self,
        expression: &'a Expression,
        jump: Jump,
        value_required: bool,
    ) -> Result<(), Error> {
        if let Some(constant) = expression.constant_bool() {
            return self.jump_if_constant(constant, jump, value_required);
        }

        match &expression.kind {
            ExpressionKind::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => self.generate_jump(operand, jump.negated(), value_required),

            ExpressionKind::Binary {
                operator: operator @ (BinaryOperator::AndAnd | BinaryOperator::OrOr),
                left,
                right,
                states,
                ..
            } => self.generate_short_circuit(
                *operator == BinaryOperator::AndAnd,
                left,
                right,
                states,
                jump,
                value_required,
            ),

            ExpressionKind::Binary {
                operator,
                left,
                right,
                operand_type,
                ..
            } if operator.is_comparison() => {
                self.generate_comparison(expression, *operator, left, right, operand_type, jump, value_required)
            }

            ExpressionKind::Binary {
                operator:
                    operator @ (BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor),
                left,
                right,
                operand_type,
                ..
            } if *operand_type == FieldType::boolean() => {
                self.generate_logical(*operator, left, right, jump, value_required)
            }

            ExpressionKind::Conditional {
                condition,
                if_true,
                if_false,
                states,
            } => self.generate_conditional_jump(
                condition,
                if_true,
                if_false,
                states,
                jump,
                value_required,
            ),

            _ => {
                if !value_required {
                    return self.generate_expression(expression, false);
                }
                self.generate_expression(expression, true)?;
                self.jump_on_int(jump)
            }
        }
    }

    /// Jump (or not) on a condition known in advance
    fn jump_if_constant(&mut self, constant: bool, jump: Jump, value_required: bool) -> Result<(), Error> {
        if value_required && constant == jump.when && self.code.is_alive() {
            self.code.push_branch(BranchInstruction::Goto(jump.label))?;
        }
        Ok(())
    }

    /// Jump on the `int` (`0` or `1`) on top of the stack
    fn jump_on_int(&mut self, jump: Jump) -> Result<(), Error> {
        let comparison = if jump.when {
            OrdComparison::NE
        } else {
            OrdComparison::EQ
        };
        self.code
            .push_branch(BranchInstruction::If(comparison, jump.label))?;
        Ok(())
    }

    /// `&&` (`is_and`) or `||`
    fn generate_short_circuit(
        &mut self,
        is_and: bool,
        left: &'a Expression,
        right: &'a Expression,
        states: &BranchStates,
        jump: Jump,
        value_required: bool,
    ) -> Result<(), Error> {
        // Value of the left operand which skips the right one
        let decisive = !is_and;

        match left.constant_bool() {
            Some(constant) if constant == decisive => {
                return self.jump_if_constant(decisive, jump, value_required)
            }
            Some(_) => {
                self.sync_locals(states.then.get());
                return self.generate_jump(right, jump, value_required);
            }
            None => (),
        }
        match right.constant_bool() {
            Some(constant) if constant == decisive => {
                self.generate_expression(left, false)?;
                return self.jump_if_constant(decisive, jump, value_required);
            }
            Some(_) => return self.generate_jump(left, jump, value_required),
            None => (),
        }

        if jump.when == decisive {
            self.generate_jump(left, jump, true)?;
            self.sync_locals(states.then.get());
            self.generate_jump(right, jump, value_required)
        } else {
            let skip = self.code.fresh_label();
            self.generate_jump(
                left,
                Jump {
                    label: skip,
                    when: decisive,
                },
                true,
            )?;
            self.sync_locals(states.then.get());
            self.generate_jump(right, jump, value_required)?;
            self.place_if_reachable(skip)
        }
    }

    /// Non-short-circuit `&`, `|`, or `^` on booleans
    fn generate_logical(
        &mut self,
        operator: BinaryOperator,
        left: &'a Expression,
        right: &'a Expression,
        jump: Jump,
        value_required: bool,
    ) -> Result<(), Error> {
        let constant_side = match (left.constant_bool(), right.constant_bool()) {
            (Some(constant), _) => Some((constant, right)),
            (_, Some(constant)) => Some((constant, left)),
            _ => None,
        };
        if let Some((constant, other)) = constant_side {
            return match operator {
                BinaryOperator::Xor if constant => {
                    self.generate_jump(other, jump.negated(), value_required)
                }
                BinaryOperator::Xor => self.generate_jump(other, jump, value_required),
                _ => {
                    // `x & false` is false and `x | true` is true, but `x` still runs
                    let decisive = operator == BinaryOperator::Or;
                    if constant == decisive {
                        self.generate_expression(other, false)?;
                        self.jump_if_constant(decisive, jump, value_required)
                    } else {
                        self.generate_jump(other, jump, value_required)
                    }
                }
            };
        }

        if !value_required {
            self.generate_expression(left, false)?;
            return self.generate_expression(right, false);
        }
        self.generate_expression(left, true)?;
        self.generate_expression(right, true)?;
        let insn = match operator {
            BinaryOperator::And => Instruction::IAnd,
            BinaryOperator::Or => Instruction::IOr,
            _ => Instruction::IXor,
        };
        self.code.push_instruction(insn)?;
        self.jump_on_int(jump)
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_comparison(
        &mut self,
        expression: &'a Expression,
        operator: BinaryOperator,
        left: &'a Expression,
        right: &'a Expression,
        operand_type: &TypeRef,
        jump: Jump,
        value_required: bool,
    ) -> Result<(), Error> {
        if !value_required {
            self.generate_expression(left, false)?;
            return self.generate_expression(right, false);
        }
        let comparison = operator.comparison().ok_or_else(|| {
            Error::malformed(expression.span, format!("{} is not a comparison", operator))
        })?;
        let comparison = if jump.when { comparison } else { !comparison };

        let is_zero = |operand: &Expression| operand.constant.as_ref().map_or(false, |c| c.is_zero());
        match operand_type.computational() {
            Some(BaseType::Int) => {
                if is_zero(right) {
                    self.generate_expression(left, true)?;
                    self.convert(left, operand_type)?;
                    self.code
                        .push_branch(BranchInstruction::If(comparison, jump.label))?;
                } else if is_zero(left) {
                    self.generate_expression(right, true)?;
                    self.convert(right, operand_type)?;
                    self.code
                        .push_branch(BranchInstruction::If(comparison.flip(), jump.label))?;
                } else {
                    self.generate_operands(left, right, operand_type)?;
                    self.code
                        .push_branch(BranchInstruction::IfICmp(comparison, jump.label))?;
                }
            }
            Some(wide_or_floating) => {
                self.generate_operands(left, right, operand_type)?;
                // NaN must make `<` and `<=` false, as well as `>` and `>=`
                let mode = match operator {
                    BinaryOperator::Lt | BinaryOperator::Le => CompareMode::G,
                    _ => CompareMode::L,
                };
                let compare = match wide_or_floating {
                    BaseType::Long => Instruction::LCmp,
                    BaseType::Float => Instruction::FCmp(mode),
                    _ => Instruction::DCmp(mode),
                };
                self.code.push_instruction(compare)?;
                self.code
                    .push_branch(BranchInstruction::If(comparison, jump.label))?;
            }
            None => {
                let equality = match comparison {
                    OrdComparison::EQ => EqComparison::EQ,
                    OrdComparison::NE => EqComparison::NE,
                    _ => {
                        return Err(Error::malformed(
                            expression.span,
                            format!("references compared with {}", operator),
                        ))
                    }
                };
                let is_null = |operand: &Expression| matches!(operand.kind, ExpressionKind::Null);
                if is_null(right) {
                    self.generate_expression(left, true)?;
                    self.code
                        .push_branch(BranchInstruction::IfNull(equality, jump.label))?;
                } else if is_null(left) {
                    self.generate_expression(right, true)?;
                    self.code
                        .push_branch(BranchInstruction::IfNull(equality, jump.label))?;
                } else {
                    self.generate_expression(left, true)?;
                    self.generate_expression(right, true)?;
                    self.code
                        .push_branch(BranchInstruction::IfACmp(equality, jump.label))?;
                }
            }
        }
        Ok(())
    }

    /// Both operands, promoted to `operand_type`
    fn generate_operands(
        &mut self,
        left: &'a Expression,
        right: &'a Expression,
        operand_type: &TypeRef,
    ) -> Result<(), Error> {
        self.generate_expression(left, true)?;
        self.convert(left, operand_type)?;
        self.generate_expression(right, true)?;
        self.convert(right, operand_type)
    }

    /// `c ? a : b` where `a` and `b` are booleans
    fn generate_conditional_jump(
        &mut self,
        condition: &'a Expression,
        if_true: &'a Expression,
        if_false: &'a Expression,
        states: &BranchStates,
        jump: Jump,
        value_required: bool,
    ) -> Result<(), Error> {
        match condition.constant_bool() {
            Some(true) => return self.generate_jump(if_true, jump, value_required),
            Some(false) => return self.generate_jump(if_false, jump, value_required),
            None => (),
        }

        let else_label = self.code.fresh_label();
        let end_label = self.code.fresh_label();
        self.generate_jump(
            condition,
            Jump {
                label: else_label,
                when: false,
            },
            true,
        )?;
        self.sync_locals(states.then.get());
        self.generate_jump(if_true, jump, value_required)?;
        if self.code.is_alive() {
            self.code.push_branch(BranchInstruction::Goto(end_label))?;
        }
        self.place_if_reachable(else_label)?;
        self.sync_locals(states.otherwise.get());
        self.generate_jump(if_false, jump, value_required)?;
        self.place_if_reachable(end_label)?;
        self.sync_locals(states.merged.get());
        Ok(())
    }
}
