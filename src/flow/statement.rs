use super::context::ContextKind;
use super::*;
use crate::ast::{Block, NodeBits, StatementKind};

/// How loudly unreachable statements of the current block were already complained about
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Complaint {
    None,
    FakeReachable,
    Unreachable,
}

impl<'a, 'd> FlowAnalyzer<'a, 'd> {
    /// Analyse a sequence of statements
    ///
    /// The first statement control cannot get to is reported (once per block). Statements after a
    /// dead end are not analysed further, statements which are merely fake reachable are.
    pub(super) fn analyse_statements(
        &mut self,
        statements: &'a [Statement],
        mut inits: Inits,
    ) -> Inits {
        let mut complaint = if inits.is_reachable() {
            Complaint::None
        } else {
            Complaint::FakeReachable
        };
        for statement in statements {
            complaint = self.complain_if_unreachable(statement, &inits, complaint);
            if complaint < Complaint::Unreachable {
                inits = self.analyse_statement(statement, inits);
            }
        }
        inits
    }

    fn complain_if_unreachable(
        &mut self,
        statement: &Statement,
        inits: &Inits,
        previous: Complaint,
    ) -> Complaint {
        match inits.reachability() {
            Reachability::Reachable => previous,
            Reachability::DeadEnd => {
                statement.set_bits(NodeBits::IS_REACHABLE, false);
                if previous < Complaint::Unreachable {
                    self.report(Diagnostic::new(ProblemKind::UnreachableCode, statement.span));
                }
                Complaint::Unreachable
            }
            Reachability::Unreachable => {
                statement.set_bits(NodeBits::IS_REACHABLE, false);
                if previous < Complaint::FakeReachable {
                    self.report(Diagnostic::new(ProblemKind::DeadCode, statement.span));
                }
                previous.max(Complaint::FakeReachable)
            }
        }
    }

    /// Analyse the branch or body of a compound statement
    ///
    /// The complaint about it being unreachable is only made if the compound statement itself was
    /// reachable (otherwise the compound statement was already complained about).
    fn analyse_nested(
        &mut self,
        statement: &'a Statement,
        inits: Inits,
        parent_reachable: bool,
    ) -> Inits {
        if parent_reachable {
            if self.complain_if_unreachable(statement, &inits, Complaint::None)
                == Complaint::Unreachable
            {
                return inits;
            }
        } else if !inits.is_reachable() {
            statement.set_bits(NodeBits::IS_REACHABLE, false);
        }
        self.analyse_statement(statement, inits)
    }

    fn analyse_block(&mut self, block: &'a Block, inits: Inits) -> Inits {
        self.analyse_statements(&block.statements, inits)
    }

    pub(super) fn analyse_statement(&mut self, statement: &'a Statement, inits: Inits) -> Inits {
        let reachable = inits.is_reachable();
        match &statement.kind {
            StatementKind::Empty => inits,

            StatementKind::LocalDeclaration { local, initializer } => {
                let flow_id = self.bindings.local(*local).flow_id;
                self.note_declared(flow_id);
                let mut inits = inits;
                inits.mark_unassigned(flow_id);
                if let Some(initializer) = initializer {
                    inits = self.value(initializer, inits);
                    inits.mark_assigned(flow_id);
                }
                inits
            }

            StatementKind::Expression(expression) => self.value(expression, inits),

            StatementKind::Block(block) => self.analyse_block(block, inits),

            StatementKind::If {
                condition,
                then_branch,
                else_branch,
                states,
            } => {
                let condition = self.condition(condition, inits);

                let then_entry = condition.when_true();
                states.then.set(Some(self.record(&then_entry)));
                let then_exit = self.analyse_nested(then_branch, then_entry, reachable);

                let else_entry = condition.when_false();
                states.otherwise.set(Some(self.record(&else_entry)));
                let else_exit = match else_branch {
                    Some(else_branch) => self.analyse_nested(else_branch, else_entry, reachable),
                    None => else_entry,
                };

                statement.set_bits(NodeBits::THEN_EXIT, !then_exit.is_reachable());
                statement.set_bits(
                    NodeBits::ELSE_EXIT,
                    else_branch.is_some() && !else_exit.is_reachable(),
                );
                let merged = then_exit.merge(&else_exit);
                states.merged.set(Some(self.record(&merged)));
                merged
            }

            StatementKind::While {
                condition,
                body,
                states,
            } => {
                self.push_context(ContextKind::Loop);
                let condition_state = self.condition(condition, inits);
                let body_entry = if condition.constant_bool() == Some(false) {
                    Inits::dead_end()
                } else {
                    condition_state.when_true()
                };
                states.body.set(Some(self.record(&body_entry)));
                let body_exit = self.analyse_nested(body, body_entry, reachable);
                let mut context = self.pop_context();

                let back_edge = body_exit.merge(&context.continues());
                self.check_deferred_finals(
                    std::mem::take(&mut context.deferred_final_checks),
                    &back_edge,
                );
                let exit = if condition.constant_bool() == Some(true) {
                    context.breaks()
                } else {
                    condition_state.when_false().merge(&context.breaks())
                };
                states.merged.set(Some(self.record(&exit)));
                exit
            }

            StatementKind::DoWhile {
                body,
                condition,
                states,
            } => {
                self.push_context(ContextKind::Loop);
                states.body.set(Some(self.record(&inits)));
                let body_exit = self.analyse_nested(body, inits, reachable);
                let condition_entry = body_exit.merge(&self.current_context_continues());
                let condition_state = self.condition(condition, condition_entry);
                let mut context = self.pop_context();

                self.check_deferred_finals(
                    std::mem::take(&mut context.deferred_final_checks),
                    &condition_state.when_true(),
                );
                let exit = if condition.constant_bool() == Some(true) {
                    context.breaks()
                } else {
                    condition_state.when_false().merge(&context.breaks())
                };
                states.merged.set(Some(self.record(&exit)));
                exit
            }

            StatementKind::For {
                initializers,
                condition,
                updates,
                body,
                states,
            } => {
                let mut inits = inits;
                for initializer in initializers {
                    inits = self.analyse_statement(initializer, inits);
                }

                self.push_context(ContextKind::Loop);
                let (condition_state, constant) = match condition {
                    Some(condition) => (self.condition(condition, inits), condition.constant_bool()),
                    None => (FlowState::conditional(inits, Inits::dead_end()), Some(true)),
                };
                let body_entry = if constant == Some(false) {
                    Inits::dead_end()
                } else {
                    condition_state.when_true()
                };
                states.body.set(Some(self.record(&body_entry)));
                let body_exit = self.analyse_nested(body, body_entry, reachable);
                let mut back_edge = body_exit.merge(&self.current_context_continues());
                for update in updates {
                    back_edge = self.value(update, back_edge);
                }
                let mut context = self.pop_context();

                self.check_deferred_finals(
                    std::mem::take(&mut context.deferred_final_checks),
                    &back_edge,
                );
                let exit = if constant == Some(true) {
                    context.breaks()
                } else {
                    condition_state.when_false().merge(&context.breaks())
                };
                states.merged.set(Some(self.record(&exit)));
                exit
            }

            StatementKind::Labeled {
                label,
                body,
                merged_state,
            } => {
                self.push_context(ContextKind::Labeled(label.as_str()));
                let body_exit = self.analyse_statement(body, inits);
                let context = self.pop_context();
                let exit = body_exit.merge(&context.breaks());
                merged_state.set(Some(self.record(&exit)));
                exit
            }

            StatementKind::Break(label) => {
                if let Some(idx) = self.break_target(label.as_deref()) {
                    self.contexts[idx].record_break(&inits);
                }
                Inits::dead_end()
            }

            StatementKind::Continue(label) => {
                if let Some(idx) = self.continue_target(label.as_deref()) {
                    self.contexts[idx].record_continue(&inits);
                }
                Inits::dead_end()
            }

            StatementKind::Return(value) => {
                if let Some(value) = value {
                    let crosses_finally = self
                        .contexts
                        .iter()
                        .any(|context| context.kind == ContextKind::TryFinally);
                    if !crosses_finally && value.ty == self.return_type {
                        value.set_bits(NodeBits::IS_RETURNED_VALUE, true);
                    }
                    self.value(value, inits);
                }
                Inits::dead_end()
            }

            StatementKind::Throw(exception) => {
                self.value(exception, inits);
                Inits::dead_end()
            }

            StatementKind::Switch {
                selector,
                cases,
                states,
            } => {
                let inits = self.value(selector, inits);
                states.pre_switch.set(Some(self.record(&inits)));

                self.push_context(ContextKind::Switch);
                let mut fall_through = Inits::dead_end();
                let mut has_default = false;
                for case in cases {
                    has_default |= case.is_default;
                    let case_entry = inits.merge(&fall_through);
                    fall_through = self.analyse_statements(&case.statements, case_entry);
                }
                let context = self.pop_context();

                let mut exit = fall_through.merge(&context.breaks());
                if !has_default {
                    exit = exit.merge(&inits);
                }
                states.merged.set(Some(self.record(&exit)));
                exit
            }

            StatementKind::Try {
                body,
                catches,
                finally,
                states,
            } => {
                states.pre_try.set(Some(self.record(&inits)));
                if finally.is_some() {
                    self.push_context(ContextKind::TryFinally);
                }

                let try_exit = self.analyse_block(body, inits.clone());
                let mut merged = try_exit.clone();
                for catch in catches {
                    // The exception may come from anywhere in the `try` block
                    let mut catch_entry = inits.clone();
                    catch_entry.add_potential_assignments(&try_exit);
                    let flow_id = self.bindings.local(catch.local).flow_id;
                    self.note_declared(flow_id);
                    catch_entry.mark_assigned(flow_id);
                    let catch_exit = self.analyse_block(&catch.body, catch_entry);
                    merged = merged.merge(&catch_exit);
                }

                if let Some(finally) = finally {
                    self.pop_context();
                    let mut finally_entry = inits;
                    finally_entry.add_potential_assignments(&merged);
                    let finally_exit = self.analyse_block(finally, finally_entry);
                    statement.set_bits(NodeBits::FINALLY_EXITS, !finally_exit.is_reachable());
                    merged.add_assignments(&finally_exit);
                }
                states.merged.set(Some(self.record(&merged)));
                merged
            }

            StatementKind::ConstructorCall { arguments, .. } => self.values(arguments, inits),
        }
    }

    fn push_context(&mut self, kind: ContextKind<'a>) {
        self.contexts
            .push(FlowContext::new(kind, self.declared_locals));
    }

    fn pop_context(&mut self) -> FlowContext<'a> {
        match self.contexts.pop() {
            Some(context) => context,
            None => FlowContext::new(ContextKind::Switch, self.declared_locals),
        }
    }

    fn current_context_continues(&self) -> Inits {
        self.contexts
            .last()
            .map_or_else(Inits::dead_end, FlowContext::continues)
    }

    /// Index of the context a `break` jumps to the end of
    fn break_target(&self, label: Option<&str>) -> Option<usize> {
        match label {
            Some(label) => self
                .contexts
                .iter()
                .rposition(|context| context.kind == ContextKind::Labeled(label)),
            None => self
                .contexts
                .iter()
                .rposition(FlowContext::is_breakable),
        }
    }

    /// Index of the loop a `continue` jumps to the next iteration of
    fn continue_target(&self, label: Option<&str>) -> Option<usize> {
        match label {
            Some(label) => {
                let labeled = self
                    .contexts
                    .iter()
                    .rposition(|context| context.kind == ContextKind::Labeled(label))?;
                let looping = labeled + 1;
                match self.contexts.get(looping) {
                    Some(context) if context.is_loop() => Some(looping),
                    _ => None,
                }
            }
            None => self.contexts.iter().rposition(FlowContext::is_loop),
        }
    }

    /// Report assignments to outer `final` locals made in a loop body which may run again
    ///
    /// Checks which cannot be decided yet move to the next enclosing loop.
    fn check_deferred_finals(
        &mut self,
        checks: Vec<(crate::binding::LocalId, Span)>,
        back_edge: &Inits,
    ) {
        for (local, span) in checks {
            let flow_id = self.bindings.local(local).flow_id;
            if back_edge.is_reachable() && back_edge.is_potentially_assigned(flow_id) {
                self.report_local(ProblemKind::FinalLocalAlreadyAssigned, span, local);
            } else if let Some(outer_loop) = self.contexts.iter_mut().rev().find(|ctx| ctx.is_loop()) {
                if flow_id < outer_loop.first_inner_local {
                    outer_loop.deferred_final_checks.push((local, span));
                }
            }
        }
    }
}
