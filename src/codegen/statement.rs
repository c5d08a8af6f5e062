use super::method::{BreakableKind, JumpTarget};
use super::{CodeBuilderExts, Error, MethodGenerator};
use crate::ast::{Block, CatchClause, Expression, LoopStates, Span, Statement, StatementKind};
use crate::ast::{StateCell, SwitchCase, SwitchStates, TryStates};
use crate::jvm::{BranchInstruction, FieldType, HandlerId, Instruction, Label};
use crate::util::Width;

impl<'a, 'p> MethodGenerator<'a, 'p> {
    pub(super) fn generate_statements(&mut self, statements: &'a [Statement]) -> Result<(), Error> {
        for statement in statements {
            self.generate_statement(statement)?;
        }
        Ok(())
    }

    pub(super) fn generate_statement(&mut self, statement: &'a Statement) -> Result<(), Error> {
        if !statement.is_reachable() || !self.code.is_alive() {
            // The slot still gets reserved, so later uses (also dead) can find it
            if let StatementKind::LocalDeclaration { local, .. } = &statement.kind {
                self.declare_local(*local)?;
            }
            return Ok(());
        }
        if self.settings.line_numbers
            && !matches!(statement.kind, StatementKind::Block(_) | StatementKind::Empty)
        {
            self.code.line_number(statement.span.line);
        }

        match &statement.kind {
            StatementKind::Empty => Ok(()),

            StatementKind::LocalDeclaration { local, initializer } => {
                let slot = self.declare_local(*local)?;
                if let Some(initializer) = initializer {
                    let ty = self.bindings.local(*local).descriptor;
                    self.generate_expression(initializer, true)?;
                    self.convert(initializer, &ty)?;
                    self.code.set_local(slot, &ty)?;
                    if self.settings.local_variables {
                        self.code.open_local_range(slot);
                    }
                }
                Ok(())
            }

            StatementKind::Expression(expression) => self.generate_expression(expression, false),

            StatementKind::Block(block) => self.generate_block(block),

            StatementKind::If {
                condition,
                then_branch,
                else_branch,
                states,
            } => {
                match condition.constant_bool() {
                    Some(true) => {
                        self.sync_locals(states.then.get());
                        self.generate_statement(then_branch)?;
                    }
                    Some(false) => {
                        if let Some(else_branch) = else_branch {
                            self.sync_locals(states.otherwise.get());
                            self.generate_statement(else_branch)?;
                        }
                    }
                    None => {
                        let else_label = self.code.fresh_label();
                        self.generate_optimized_boolean(condition, None, Some(else_label), true)?;
                        self.sync_locals(states.then.get());
                        self.generate_statement(then_branch)?;
                        match else_branch {
                            Some(else_branch) => {
                                let end_label = self.code.fresh_label();
                                if self.code.is_alive() {
                                    self.code.push_branch(BranchInstruction::Goto(end_label))?;
                                }
                                self.place_if_reachable(else_label)?;
                                self.sync_locals(states.otherwise.get());
                                self.generate_statement(else_branch)?;
                                self.place_if_reachable(end_label)?;
                            }
                            None => self.place_if_reachable(else_label)?,
                        }
                    }
                }
                self.sync_locals(states.merged.get());
                Ok(())
            }

            StatementKind::While {
                condition,
                body,
                states,
            } => self.generate_loop(&[], Some(condition), &[], body, states, false),

            StatementKind::DoWhile {
                body,
                condition,
                states,
            } => self.generate_loop(&[], Some(condition), &[], body, states, true),

            StatementKind::For {
                initializers,
                condition,
                updates,
                body,
                states,
            } => {
                let scope = self.enter_scope();
                self.generate_loop(initializers, condition.as_ref(), updates, body, states, false)?;
                self.exit_scope(scope);
                Ok(())
            }

            StatementKind::Labeled {
                label,
                body,
                merged_state,
            } => self.generate_labeled(label, body, merged_state),

            StatementKind::Break(label) => {
                let (index, target) = self.break_target(label.as_deref(), statement.span)?;
                self.jump_out(index + 1, target)
            }

            StatementKind::Continue(label) => {
                let (index, target) = self.continue_target(label.as_deref(), statement.span)?;
                self.jump_out(index + 1, target)
            }

            StatementKind::Return(value) => self.generate_return(value.as_ref(), statement.span),

            StatementKind::Throw(exception) => {
                self.generate_expression(exception, true)?;
                self.code.push_branch(BranchInstruction::AThrow)?;
                Ok(())
            }

            StatementKind::Switch {
                selector,
                cases,
                states,
            } => self.generate_switch(selector, cases, states),

            StatementKind::Try {
                body,
                catches,
                finally,
                states,
            } => self.generate_try(body, catches, finally.as_ref(), states),

            StatementKind::ConstructorCall {
                constructor,
                arguments,
                ..
            } => self.generate_constructor_call(constructor, arguments, statement.span),
        }
    }

    pub(super) fn generate_block(&mut self, block: &'a Block) -> Result<(), Error> {
        let scope = self.enter_scope();
        self.generate_statements(&block.statements)?;
        self.exit_scope(scope);
        Ok(())
    }

    /// Any loop, laid out with the condition after the body
    ///
    /// ```text
    ///     <initializers>
    ///     goto cond          (unless the condition is missing or `true`, or for `do`)
    /// body:
    ///     <body>
    /// continue:
    ///     <updates>
    /// cond:
    ///     if <condition> goto body
    /// break:
    /// ```
    fn generate_loop(
        &mut self,
        initializers: &'a [Statement],
        condition: Option<&'a Expression>,
        updates: &'a [Expression],
        body: &'a Statement,
        states: &LoopStates,
        body_first: bool,
    ) -> Result<(), Error> {
        self.generate_statements(initializers)?;

        let constant = match condition {
            Some(condition) => condition.constant_bool(),
            None => Some(true),
        };
        if constant == Some(false) && !body_first {
            self.sync_locals(states.merged.get());
            return Ok(());
        }

        let body_label = self.code.fresh_label();
        let continue_label = self.code.fresh_label();
        let condition_label = self.code.fresh_label();
        let break_label = self.code.fresh_label();

        let tests_condition = constant.is_none();
        if tests_condition && !body_first {
            self.code
                .push_branch(BranchInstruction::Goto(condition_label))?;
        }
        self.code.place_label(body_label)?;
        self.sync_locals(states.body.get());

        self.jump_targets.push(JumpTarget::Breakable {
            kind: BreakableKind::Loop,
            break_label,
            continue_label: Some(continue_label),
        });
        self.generate_statement(body)?;
        self.jump_targets.pop();

        self.place_if_reachable(continue_label)?;
        if self.code.is_alive() {
            for update in updates {
                self.generate_expression(update, false)?;
            }
        }
        match (condition, constant) {
            (Some(condition), None) => {
                self.place_if_reachable(condition_label)?;
                if self.code.is_alive() {
                    self.generate_optimized_boolean(condition, Some(body_label), None, true)?;
                }
            }
            (_, Some(true)) => {
                if self.code.is_alive() {
                    self.code.push_branch(BranchInstruction::Goto(body_label))?;
                }
            }
            _ => (),
        }

        self.place_if_reachable(break_label)?;
        self.sync_locals(states.merged.get());
        Ok(())
    }

    fn generate_labeled(
        &mut self,
        label: &'a str,
        body: &'a Statement,
        merged_state: &StateCell,
    ) -> Result<(), Error> {
        let break_label = self.code.fresh_label();
        self.jump_targets.push(JumpTarget::Breakable {
            kind: BreakableKind::Labeled(label),
            break_label,
            continue_label: None,
        });
        self.generate_statement(body)?;
        self.jump_targets.pop();
        self.place_if_reachable(break_label)?;
        self.sync_locals(merged_state.get());
        Ok(())
    }

    /// Index of the construct a `break` leaves, and where it jumps to
    fn break_target(&self, label: Option<&str>, span: Span) -> Result<(usize, Label), Error> {
        for (index, target) in self.jump_targets.iter().enumerate().rev() {
            if let JumpTarget::Breakable {
                kind, break_label, ..
            } = target
            {
                let matches = match (label, kind) {
                    (None, BreakableKind::Loop | BreakableKind::Switch) => true,
                    (Some(name), BreakableKind::Labeled(labeled)) => name == *labeled,
                    _ => false,
                };
                if matches {
                    return Ok((index, *break_label));
                }
            }
        }
        Err(Error::malformed(
            span,
            format!("break outside of a target ({:?})", label),
        ))
    }

    /// Index of the loop a `continue` restarts, and where it jumps to
    fn continue_target(&self, label: Option<&str>, span: Span) -> Result<(usize, Label), Error> {
        let loop_index = match label {
            None => self.jump_targets.iter().rposition(|target| {
                matches!(
                    target,
                    JumpTarget::Breakable {
                        kind: BreakableKind::Loop,
                        ..
                    }
                )
            }),

            // The loop is the body of the labeled statement
            Some(name) => self
                .jump_targets
                .iter()
                .rposition(|target| {
                    matches!(
                        target,
                        JumpTarget::Breakable { kind: BreakableKind::Labeled(labeled), .. }
                            if *labeled == name
                    )
                })
                .map(|index| index + 1),
        };
        match loop_index.and_then(|index| Some((index, self.jump_targets.get(index)?))) {
            Some((
                index,
                JumpTarget::Breakable {
                    continue_label: Some(continue_label),
                    ..
                },
            )) => Ok((index, *continue_label)),
            _ => Err(Error::malformed(
                span,
                format!("continue outside of a loop ({:?})", label),
            )),
        }
    }

    /// Jump to a label outside the constructs above `floor`, running their `finally` blocks
    fn jump_out(&mut self, floor: usize, label: Label) -> Result<(), Error> {
        self.exit_try_contexts(floor)?;
        if self.code.is_alive() {
            self.code.push_branch(BranchInstruction::Goto(label))?;
        }
        self.reenter_try_contexts(floor);
        Ok(())
    }

    /// Leave every `try` above `floor`, innermost first: stop protecting code with its handlers
    /// and inline its `finally` block
    fn exit_try_contexts(&mut self, floor: usize) -> Result<(), Error> {
        let mut index = self.jump_targets.len();
        while index > floor {
            index -= 1;
            let (finally, handlers) = match &self.jump_targets[index] {
                JumpTarget::Try {
                    finally,
                    open_handlers,
                } => (*finally, open_handlers.clone()),
                JumpTarget::Breakable { .. } => continue,
            };
            for handler in handlers {
                self.code.close_exception_range(handler);
            }
            if let (Some(finally), true) = (finally, self.code.is_alive()) {
                // Jumps out of the `finally` itself resolve against what encloses the `try`
                let inner = self.jump_targets.split_off(index);
                self.generate_block(finally)?;
                self.jump_targets.extend(inner);
            }
        }
        Ok(())
    }

    /// Protect code with the handlers of every `try` above `floor` again
    fn reenter_try_contexts(&mut self, floor: usize) {
        for target in &self.jump_targets[floor..] {
            if let JumpTarget::Try { open_handlers, .. } = target {
                for handler in open_handlers {
                    self.code.open_exception_range(*handler);
                }
            }
        }
    }

    fn generate_return(&mut self, value: Option<&'a Expression>, span: Span) -> Result<(), Error> {
        let value = match value {
            None => {
                self.exit_try_contexts(0)?;
                if self.code.is_alive() {
                    self.code.return_value::<crate::binding::ClassId>(None)?;
                }
                self.reenter_try_contexts(0);
                return Ok(());
            }
            Some(value) => value,
        };
        let return_type = self
            .return_type
            .ok_or_else(|| Error::malformed(span, "value returned from a void method"))?;
        self.generate_expression(value, true)?;
        self.convert(value, &return_type)?;

        let crosses_finally = self.jump_targets.iter().any(|target| {
            matches!(
                target,
                JumpTarget::Try {
                    finally: Some(_),
                    ..
                }
            )
        });
        if crosses_finally {
            // The value waits in a local while `finally` blocks run
            let scope = self.enter_scope();
            let slot = self.code.allocate_local(return_type.width(), None)?;
            self.code.set_local(slot, &return_type)?;
            self.exit_try_contexts(0)?;
            if self.code.is_alive() {
                self.code.get_local(slot, &return_type)?;
                self.code.return_value(Some(&return_type))?;
            }
            self.exit_scope(scope);
        } else {
            self.exit_try_contexts(0)?;
            // A returned boolean may already have been returned from inside its own code
            if self.code.is_alive() {
                self.code.return_value(Some(&return_type))?;
            }
        }
        self.reenter_try_contexts(0);
        Ok(())
    }

    fn generate_switch(
        &mut self,
        selector: &'a Expression,
        cases: &'a [SwitchCase],
        states: &SwitchStates,
    ) -> Result<(), Error> {
        self.generate_expression(selector, true)?;
        self.convert(selector, &FieldType::int())?;

        let break_label = self.code.fresh_label();
        let case_labels: Vec<Label> = cases.iter().map(|_| self.code.fresh_label()).collect();
        let default_label = cases
            .iter()
            .position(|case| case.is_default)
            .map_or(break_label, |index| case_labels[index]);
        let keyed: Vec<(i32, Label)> = cases
            .iter()
            .zip(&case_labels)
            .flat_map(|(case, label)| case.keys.iter().map(move |key| (*key, *label)))
            .collect();

        if keyed.is_empty() {
            self.code.pop_value(1)?;
            self.code
                .push_branch(BranchInstruction::Goto(default_label))?;
        } else {
            self.code.switch(default_label, &keyed)?;
        }

        // Every case shares the scope of the switch block
        let scope = self.enter_scope();
        self.jump_targets.push(JumpTarget::Breakable {
            kind: BreakableKind::Switch,
            break_label,
            continue_label: None,
        });
        for (case, label) in cases.iter().zip(case_labels) {
            let falls_in = self.code.is_alive();
            self.place_if_reachable(label)?;
            if !falls_in {
                self.sync_locals(states.pre_switch.get());
            }
            if self.settings.line_numbers {
                self.code.line_number(case.span.line);
            }
            self.generate_statements(&case.statements)?;
        }
        self.jump_targets.pop();
        self.exit_scope(scope);

        self.place_if_reachable(break_label)?;
        self.sync_locals(states.merged.get());
        Ok(())
    }

    /// `try`/`catch`/`finally`, with the `finally` block inlined on every way out
    ///
    /// ```text
    ///     <body>                 (covered by every handler)
    ///     <finally>
    ///     goto end
    /// catch_n:
    ///     astore e
    ///     <catch body>           (covered by the any-handler)
    ///     <finally>
    ///     goto end
    /// any:
    ///     astore t
    ///     <finally>
    ///     aload t
    ///     athrow
    /// end:
    /// ```
    fn generate_try(
        &mut self,
        body: &'a Block,
        catches: &'a [CatchClause],
        finally: Option<&'a Block>,
        states: &TryStates,
    ) -> Result<(), Error> {
        let end_label = self.code.fresh_label();

        let mut catch_handlers: Vec<(HandlerId, Label)> = Vec::with_capacity(catches.len());
        for clause in catches {
            let label = self.code.fresh_label();
            let class = self.class_constant(&FieldType::object(clause.class))?;
            let handler = self.code.new_exception_handler(label, Some(class));
            catch_handlers.push((handler, label));
        }
        let any_handler: Option<(HandlerId, Label)> = finally.map(|_| {
            let label = self.code.fresh_label();
            (self.code.new_exception_handler(label, None), label)
        });

        let body_handlers: Vec<HandlerId> = catch_handlers
            .iter()
            .chain(&any_handler)
            .map(|(handler, _)| *handler)
            .collect();
        for handler in &body_handlers {
            self.code.open_exception_range(*handler);
        }
        let body_start = self.code.position();
        self.jump_targets.push(JumpTarget::Try {
            finally,
            open_handlers: body_handlers.clone(),
        });
        self.generate_block(body)?;
        self.jump_targets.pop();
        for handler in &body_handlers {
            self.code.close_exception_range(*handler);
        }
        let body_is_empty = self.code.position() == body_start;
        self.leave_try_normally(finally, end_label)?;

        // Nothing to catch from an empty body
        if !body_is_empty {
            let catch_body_handlers: Vec<HandlerId> =
                any_handler.iter().map(|(handler, _)| *handler).collect();
            for (clause, (_, label)) in catches.iter().zip(&catch_handlers) {
                self.code.place_exception_handler(*label)?;
                self.sync_locals(states.pre_try.get());
                for handler in &catch_body_handlers {
                    self.code.open_exception_range(*handler);
                }
                self.generate_catch(clause, finally, &catch_body_handlers)?;
                for handler in &catch_body_handlers {
                    self.code.close_exception_range(*handler);
                }
                self.leave_try_normally(finally, end_label)?;
            }
            for (handler, _) in &catch_handlers {
                self.code.commit_exception_handler(*handler);
            }

            if let (Some((handler, label)), Some(finally)) = (any_handler, finally) {
                self.code.commit_exception_handler(handler);
                self.code.place_exception_handler(label)?;
                self.sync_locals(states.pre_try.get());
                let scope = self.enter_scope();
                let slot = self.code.allocate_local(1, None)?;
                self.code.push_instruction(Instruction::AStore(slot))?;
                self.generate_block(finally)?;
                if self.code.is_alive() {
                    self.code.push_instruction(Instruction::ALoad(slot))?;
                    self.code.push_branch(BranchInstruction::AThrow)?;
                }
                self.exit_scope(scope);
            }
        }

        self.place_if_reachable(end_label)?;
        self.sync_locals(states.merged.get());
        Ok(())
    }

    /// Run the `finally` block (if any) and jump past the whole `try`
    fn leave_try_normally(&mut self, finally: Option<&'a Block>, end_label: Label) -> Result<(), Error> {
        if let (Some(finally), true) = (finally, self.code.is_alive()) {
            self.generate_block(finally)?;
        }
        if self.code.is_alive() {
            self.code.push_branch(BranchInstruction::Goto(end_label))?;
        }
        Ok(())
    }

    fn generate_catch(
        &mut self,
        clause: &'a CatchClause,
        finally: Option<&'a Block>,
        handlers: &[HandlerId],
    ) -> Result<(), Error> {
        let scope = self.enter_scope();
        let slot = self.declare_local(clause.local)?;
        self.code.push_instruction(Instruction::AStore(slot))?;
        if self.settings.local_variables {
            self.code.open_local_range(slot);
        }
        self.jump_targets.push(JumpTarget::Try {
            finally,
            open_handlers: handlers.to_vec(),
        });
        self.generate_block(&clause.body)?;
        self.jump_targets.pop();
        self.exit_scope(scope);
        Ok(())
    }
}
