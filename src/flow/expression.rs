use super::*;
use crate::ast::{BinaryOperator, Expression, ExpressionKind, NodeBits, Receiver, UnaryOperator};
use crate::binding::{Binding, LocalId};

impl<'a, 'd> FlowAnalyzer<'a, 'd> {
    /// Analyse an expression whose outcome is not branched on
    pub(super) fn value(&mut self, expression: &'a Expression, inits: Inits) -> Inits {
        self.analyse_expression(expression, inits)
            .into_unconditional()
    }

    /// Analyse an expression used as a condition
    ///
    /// Constant conditions make the ruled out outcome fake reachable.
    pub(super) fn condition(&mut self, expression: &'a Expression, inits: Inits) -> FlowState {
        let state = self.analyse_expression(expression, inits);
        match expression.constant_bool() {
            Some(true) => {
                let when_true = state.when_true();
                let mut when_false = state.when_false();
                when_false.mark_unreachable();
                FlowState::conditional(when_true, when_false)
            }
            Some(false) => {
                let mut when_true = state.when_true();
                when_true.mark_unreachable();
                FlowState::conditional(when_true, state.when_false())
            }
            None => state,
        }
    }

    pub(super) fn analyse_expression(
        &mut self,
        expression: &'a Expression,
        inits: Inits,
    ) -> FlowState {
        let inits = match &expression.kind {
            ExpressionKind::Literal | ExpressionKind::Null | ExpressionKind::This => inits,

            ExpressionKind::Name(binding) => {
                let mut inits = inits;
                if let Binding::Local(local) = binding {
                    self.check_read(*local, expression.span, &mut inits);
                }
                inits
            }

            ExpressionKind::FieldAccess { receiver, .. } => self.value(receiver, inits),

            ExpressionKind::ArrayAccess { array, index } => {
                let inits = self.value(array, inits);
                self.value(index, inits)
            }

            ExpressionKind::ArrayLength(array) => self.value(array, inits),

            ExpressionKind::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => return self.condition(operand, inits).negate(),

            ExpressionKind::Unary { operand, .. } => self.value(operand, inits),

            ExpressionKind::Binary {
                operator: operator @ (BinaryOperator::AndAnd | BinaryOperator::OrOr),
                left,
                right,
                states,
                ..
            } => {
                let left = self.condition(left, inits);
                let is_and = *operator == BinaryOperator::AndAnd;

                // The right operand only runs if the left one did not decide the outcome
                let right_entry = if is_and {
                    left.when_true()
                } else {
                    left.when_false()
                };
                states.then.set(Some(self.record(&right_entry)));
                let right = self.condition(right, right_entry);

                let result = if is_and {
                    FlowState::conditional(
                        right.when_true(),
                        left.when_false().merge(&right.when_false()),
                    )
                } else {
                    FlowState::conditional(
                        left.when_true().merge(&right.when_true()),
                        right.when_false(),
                    )
                };
                states.merged.set(Some(self.record(&result.unconditional())));
                return result;
            }

            ExpressionKind::Binary { left, right, .. } => {
                let inits = self.value(left, inits);
                self.value(right, inits)
            }

            ExpressionKind::Conditional {
                condition,
                if_true,
                if_false,
                states,
            } => {
                let condition = self.condition(condition, inits);

                let true_entry = condition.when_true();
                states.then.set(Some(self.record(&true_entry)));
                let true_exit = self.analyse_expression(if_true, true_entry);

                let false_entry = condition.when_false();
                states.otherwise.set(Some(self.record(&false_entry)));
                let false_exit = self.analyse_expression(if_false, false_entry);

                let result = if expression.ty == Some(crate::jvm::FieldType::boolean()) {
                    true_exit.merge(&false_exit)
                } else {
                    FlowState::Unconditional(
                        true_exit
                            .unconditional()
                            .merge(&false_exit.unconditional()),
                    )
                };
                states.merged.set(Some(self.record(&result.unconditional())));
                return result;
            }

            ExpressionKind::Assignment { target, value } => {
                let inits = self.target_operands(target, inits);
                let mut inits = self.value(value, inits);
                if Self::same_variable(target, value) {
                    expression.set_bits(NodeBits::HAS_NO_EFFECT, true);
                    self.report(
                        Diagnostic::new(ProblemKind::AssignmentHasNoEffect, expression.span)
                            .with_context(self.variable_name(target)),
                    );
                }
                self.assign(target, &mut inits);
                inits
            }

            ExpressionKind::CompoundAssignment { target, value, .. } => {
                let mut inits = self.target_operands(target, inits);
                self.read_target(target, &mut inits);
                let mut inits = self.value(value, inits);
                self.assign(target, &mut inits);
                inits
            }

            ExpressionKind::Increment { target, .. } => {
                let mut inits = self.target_operands(target, inits);
                self.read_target(target, &mut inits);
                self.assign(target, &mut inits);
                inits
            }

            ExpressionKind::Cast(operand) | ExpressionKind::InstanceOf { operand, .. } => {
                self.value(operand, inits)
            }

            ExpressionKind::Allocation { arguments, .. } => self.values(arguments, inits),

            ExpressionKind::ArrayAllocation {
                dimensions,
                initializer,
            } => {
                let inits = self.values(dimensions, inits);
                match initializer {
                    Some(elements) => self.values(elements, inits),
                    None => inits,
                }
            }

            ExpressionKind::MessageSend {
                receiver,
                arguments,
                ..
            } => {
                let inits = match receiver {
                    Receiver::Expression(receiver) => self.value(receiver, inits),
                    Receiver::Implicit | Receiver::Super => inits,
                };
                self.values(arguments, inits)
            }
        };
        FlowState::Unconditional(inits)
    }

    pub(super) fn values(&mut self, expressions: &'a [Expression], mut inits: Inits) -> Inits {
        for expression in expressions {
            inits = self.value(expression, inits);
        }
        inits
    }

    /// Sub-expressions evaluated before an assignment to `target` (receiver, array, index)
    fn target_operands(&mut self, target: &'a Expression, inits: Inits) -> Inits {
        match &target.kind {
            ExpressionKind::FieldAccess { receiver, .. } => self.value(receiver, inits),
            ExpressionKind::ArrayAccess { array, index } => {
                let inits = self.value(array, inits);
                self.value(index, inits)
            }
            _ => inits,
        }
    }

    /// The current value of `target` is read (compound assignment, `++`, `--`)
    fn read_target(&mut self, target: &'a Expression, inits: &mut Inits) {
        if let ExpressionKind::Name(Binding::Local(local)) = &target.kind {
            self.check_read(*local, target.span, inits);
        }
    }

    fn assign(&mut self, target: &'a Expression, inits: &mut Inits) {
        if let ExpressionKind::Name(Binding::Local(local)) = &target.kind {
            self.assign_local(*local, target.span, inits);
        }
    }

    fn check_read(&mut self, local: LocalId, span: Span, inits: &mut Inits) {
        let flow_id = self.bindings.local(local).flow_id;
        if !inits.is_definitely_assigned(flow_id) {
            self.report_local(ProblemKind::UninitializedLocal, span, local);

            // Only complain once per path
            inits.mark_assigned(flow_id);
        }
    }

    pub(super) fn assign_local(&mut self, local: LocalId, span: Span, inits: &mut Inits) {
        let data = self.bindings.local(local);
        if data.is_final && inits.is_reachable() {
            if inits.is_potentially_assigned(data.flow_id) {
                self.report_local(ProblemKind::FinalLocalAlreadyAssigned, span, local);
            } else if let Some(outer_loop) = self.contexts.iter_mut().rev().find(|ctx| ctx.is_loop()) {
                if data.flow_id < outer_loop.first_inner_local {
                    outer_loop.deferred_final_checks.push((local, span));
                }
            }
        }
        inits.mark_assigned(data.flow_id);
    }

    /// Is this `x = x` (same local, or same field of `this`)?
    fn same_variable(target: &Expression, value: &Expression) -> bool {
        match (&target.kind, &value.kind) {
            (ExpressionKind::Name(left), ExpressionKind::Name(right)) => {
                left == right && !matches!(left, Binding::Problem(_))
            }
            _ => false,
        }
    }

    fn variable_name(&self, target: &Expression) -> String {
        match &target.kind {
            ExpressionKind::Name(Binding::Local(local)) => self.bindings.local(*local).name.clone(),
            ExpressionKind::Name(Binding::Field(field)) => self.bindings.field(*field).name.clone(),
            _ => String::new(),
        }
    }
}
