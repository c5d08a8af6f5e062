use super::label::{LabelData, PatchSite};
use super::locals::{LocalDebugInfo, Locals};
use super::switch::{choose_kind, sorted_order, switch_padding, SwitchKind};
use super::*;
use crate::jvm::{
    patch_i16, patch_i32, BranchInstruction, ClassConstantIndex, ConstantIndex, ConstantsPool,
    Error, FieldType, Instruction, MethodDescriptor, ParseDescriptor, Serialize,
    SerializableInstruction, StackEffect,
};
use crate::util::Width;
use std::collections::HashMap;
use std::convert::TryFrom;

/*

Jumps and their offsets
=======================

Branch offsets are relative to the start of the jumping instruction. Forward jumps are written
with a zero placeholder and queued on their label; placing the label patches every queued site.

Narrow mode (the default) writes 16-bit offsets. When an offset does not fit, the builder fails
with `Error::WideJumpRequired` and the caller is expected to throw away everything and generate
the method again with `wide_jumps` turned on. In wide mode:

    goto L            =>    goto_w L

    if<cond> L        =>    if<!cond> +8
                            goto_w L

Restarting is much simpler than rewriting code in place (no instruction ever moves, so switch
padding and already patched offsets stay valid) and oversized methods are rare.

Small peephole optimizations
============================

  - goto-next: placing `L` right after a `goto L` removes the `goto`

  - chaining: a `goto M` emitted right where some label `K` is placed makes every jump to `K` go
    to `M` directly

*/

/// Builder for the code of one method body
///
/// Tracks the operand stack depth as instructions get pushed, allocates local variable slots, and
/// resolves labels. The builder is used for a single attempt at generating one method: if
/// anything goes wrong, it is dropped.
pub struct CodeBuilder<'p> {
    /// Constant pool of the enclosing class
    constants: &'p mut ConstantsPool,

    /// Serialized instructions so far
    code: Vec<u8>,

    /// Label table (indexed by `Label`)
    labels: Vec<LabelData>,

    /// Current operand stack depth (in slots)
    stack_depth: u16,

    /// Largest operand stack depth seen so far
    max_stack: u16,

    /// Can the last instruction fall through to whatever comes next?
    alive: bool,

    /// Use 32-bit jump offsets everywhere
    wide_jumps: bool,

    /// Code can't grow past this many bytes
    max_code_length: usize,

    locals: Locals,

    /// Labels placed at the current end of the code
    labels_at_end: Vec<Label>,

    /// Unconditional jump which is the last thing in the code
    trailing_goto: Option<TrailingGoto>,

    handlers: Vec<ExceptionHandler>,

    /// Order of handlers in the exception table
    handler_order: Vec<HandlerId>,

    line_numbers: Vec<LineNumber>,

    /// Stack slots of fields and methods referenced in the pool, as `(arguments, returns)`
    member_slots: HashMap<ConstantIndex, (u16, u16)>,
}

struct TrailingGoto {
    position: usize,
    target: Label,
    was_alive: bool,
    labels_before: Vec<Label>,
}

struct ExceptionHandler {
    handler: Label,
    catch_type: Option<ClassConstantIndex>,

    /// Protected ranges (the last one may still be open)
    ranges: Vec<(usize, Option<usize>)>,
}

/// Handle on an exception handler under construction
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct HandlerId(usize);

impl<'p> CodeBuilder<'p> {
    pub fn new(
        constants: &'p mut ConstantsPool,
        wide_jumps: bool,
        max_code_length: usize,
    ) -> CodeBuilder<'p> {
        CodeBuilder {
            constants,
            code: vec![],
            labels: vec![],
            stack_depth: 0,
            max_stack: 0,
            alive: true,
            wide_jumps,
            max_code_length,
            locals: Locals::new(),
            labels_at_end: vec![],
            trailing_goto: None,
            handlers: vec![],
            handler_order: vec![],
            line_numbers: vec![],
            member_slots: HashMap::new(),
        }
    }

    pub fn constants(&mut self) -> &mut ConstantsPool {
        self.constants
    }

    /// Current position in the code
    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn stack_depth(&self) -> u16 {
        self.stack_depth
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Can control reach the current position (by falling through or through a placed label)?
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn wide_jumps(&self) -> bool {
        self.wide_jumps
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(LabelData::default());
        label
    }

    /// Does any jump (placed or pending) target the label?
    ///
    /// Labels nothing jumps to only need placing if control falls into them.
    pub fn is_label_referenced(&self, label: Label) -> bool {
        self.labels[label.index()].is_referenced()
    }

    /// Follow label forwarding (see branch chaining)
    fn resolve(&self, mut label: Label) -> Label {
        for _ in 0..self.labels.len() {
            match self.labels[label.index()].forward_to {
                Some(next) => label = next,
                None => break,
            }
        }
        label
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.code.extend_from_slice(bytes);
        self.labels_at_end.clear();
        self.trailing_goto = None;
        if self.code.len() > self.max_code_length {
            Err(Error::MethodCodeOverflow {
                length: self.code.len(),
                limit: self.max_code_length,
            })
        } else {
            Ok(())
        }
    }

    fn adjust_stack(
        &mut self,
        effect: StackEffect,
        describe: impl FnOnce() -> String,
    ) -> Result<(), Error> {
        if effect.pops > self.stack_depth {
            return Err(Error::StackUnderflow {
                instruction: describe(),
                depth: self.stack_depth,
            });
        }
        let depth = (self.stack_depth - effect.pops) as usize + effect.pushes as usize;
        self.stack_depth = u16::try_from(depth)
            .map_err(|_| Error::MethodCodeMaxStackOverflow(depth))?;
        self.max_stack = self.max_stack.max(self.stack_depth);
        Ok(())
    }

    /// Slot counts for a field or method reference, read from its descriptor in the pool
    fn member_slots(&mut self, member: ConstantIndex) -> Result<(u16, u16), Error> {
        if let Some(slots) = self.member_slots.get(&member) {
            return Ok(*slots);
        }
        let descriptor = self.constants.member_descriptor(member).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("constant {} is not a member reference", member.0),
            )
        })?;
        let slots = if descriptor.starts_with('(') {
            let method = MethodDescriptor::<String>::parse(descriptor)?;
            (
                method.parameter_length(false) as u16,
                method.return_length() as u16,
            )
        } else {
            let field = FieldType::<String>::parse(descriptor)?;
            (0, field.width() as u16)
        };
        self.member_slots.insert(member, slots);
        Ok(slots)
    }

    /// Push a non-branching instruction
    pub fn push_instruction(&mut self, insn: SerializableInstruction) -> Result<(), Error> {
        let (arguments, returns) = match &insn {
            Instruction::GetStatic(member)
            | Instruction::PutStatic(member)
            | Instruction::GetField(member)
            | Instruction::PutField(member)
            | Instruction::Invoke(_, member) => self.member_slots(*member)?,
            _ => (0, 0),
        };
        let effect = insn.stack_effect(|_| returns, |_| (arguments, returns));
        self.adjust_stack(effect, || format!("{:?}", insn))?;

        let mut bytes = Vec::with_capacity(insn.width());
        insn.serialize(&mut bytes)?;
        self.write_bytes(&bytes)
    }

    /// Push a branching instruction
    ///
    /// Everything except conditional branches leaves the builder dead until a label is placed.
    pub fn push_branch(&mut self, insn: BranchInstruction<Label>) -> Result<(), Error> {
        self.adjust_stack(
            StackEffect {
                pops: insn.stack_pops(),
                pushes: 0,
            },
            || format!("{:?}", insn),
        )?;

        match &insn {
            BranchInstruction::If(_, target)
            | BranchInstruction::IfICmp(_, target)
            | BranchInstruction::IfACmp(_, target)
            | BranchInstruction::IfNull(_, target) => {
                if self.wide_jumps {
                    let skip = insn.negated().and_then(|negated| negated.jump_opcode());
                    if let Some(opcode) = skip {
                        // Skip over the 5 bytes of the `goto_w`
                        self.write_bytes(&[opcode, 0, 8])?;
                    }
                    self.emit_jump(0xc8, *target, true)?;
                } else if let Some(opcode) = insn.jump_opcode() {
                    self.emit_jump(opcode, *target, false)?;
                }
            }
            BranchInstruction::Goto(target) | BranchInstruction::GotoW(target) => {
                let target = self.resolve(*target);
                let was_alive = self.alive;
                let labels_before = self.labels_at_end.clone();
                self.chain_labels_at_end(target)?;
                let position = self.code.len();
                let wide = self.wide_jumps || matches!(insn, BranchInstruction::GotoW(_));
                self.emit_jump(if wide { 0xc8 } else { 0xa7 }, target, wide)?;
                self.trailing_goto = Some(TrailingGoto {
                    position,
                    target,
                    was_alive,
                    labels_before,
                });
                self.alive = false;
            }
            BranchInstruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                let instruction = self.code.len();
                let padding = switch_padding(instruction);
                // `targets` is never empty, and `low + len - 1` overflows when `high` is `i32::MAX`
                let high = *low + (targets.len() as i32 - 1);
                let mut bytes = vec![0xaa];
                bytes.resize(1 + padding + 4, 0);
                low.serialize(&mut bytes)?;
                high.serialize(&mut bytes)?;
                bytes.resize(bytes.len() + 4 * targets.len(), 0);
                self.write_bytes(&bytes)?;

                let operands = instruction + 1 + padding;
                self.add_site(*default, instruction, operands, true)?;
                for (idx, target) in targets.iter().enumerate() {
                    self.add_site(*target, instruction, operands + 12 + 4 * idx, true)?;
                }
                self.alive = false;
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                let instruction = self.code.len();
                let padding = switch_padding(instruction);
                let mut bytes = vec![0xab];
                bytes.resize(1 + padding + 4, 0);
                (targets.len() as i32).serialize(&mut bytes)?;
                for (key, _) in targets {
                    key.serialize(&mut bytes)?;
                    0i32.serialize(&mut bytes)?;
                }
                self.write_bytes(&bytes)?;

                let operands = instruction + 1 + padding;
                self.add_site(*default, instruction, operands, true)?;
                for (idx, (_, target)) in targets.iter().enumerate() {
                    self.add_site(*target, instruction, operands + 12 + 8 * idx, true)?;
                }
                self.alive = false;
            }
            _ => {
                if let Some(opcode) = insn.terminal_opcode() {
                    self.write_bytes(&[opcode])?;
                }
                self.alive = false;
            }
        }
        Ok(())
    }

    /// Dispatch on the `int` at the top of the stack
    ///
    /// `cases` may come in any order, but keys must be distinct. A table is used when keys are
    /// dense enough, otherwise a lookup.
    pub fn switch(&mut self, default: Label, cases: &[(i32, Label)]) -> Result<(), Error> {
        let keys: Vec<i32> = cases.iter().map(|(key, _)| *key).collect();
        let sorted: Vec<(i32, Label)> = sorted_order(&keys)
            .into_iter()
            .map(|idx| cases[idx])
            .collect();
        let sorted_keys: Vec<i32> = sorted.iter().map(|(key, _)| *key).collect();

        let insn = match choose_kind(&sorted_keys) {
            SwitchKind::Table { low, high } => {
                let mut targets = Vec::with_capacity((i64::from(high) - i64::from(low) + 1) as usize);
                let mut next_case = sorted.iter().peekable();
                for key in low..=high {
                    match next_case.next_if(|(case_key, _)| *case_key == key) {
                        Some((_, target)) => targets.push(*target),
                        None => targets.push(default),
                    }
                }
                BranchInstruction::TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            SwitchKind::Lookup => BranchInstruction::LookupSwitch {
                default,
                targets: sorted,
            },
        };
        log::trace!("switch over {} keys: {:?}", keys.len(), insn);
        self.push_branch(insn)
    }

    /// Write a jump instruction with a placeholder operand and register it on its label
    fn emit_jump(&mut self, opcode: u8, target: Label, wide: bool) -> Result<(), Error> {
        let instruction = self.code.len();
        if wide {
            self.write_bytes(&[opcode, 0, 0, 0, 0])?;
        } else {
            self.write_bytes(&[opcode, 0, 0])?;
        }
        self.add_site(target, instruction, instruction + 1, wide)
    }

    fn add_site(
        &mut self,
        target: Label,
        instruction: usize,
        operand: usize,
        wide: bool,
    ) -> Result<(), Error> {
        let target = self.resolve(target);
        let site = PatchSite {
            instruction,
            operand,
            wide,
        };
        let depth = self.stack_depth;
        let data = &mut self.labels[target.index()];
        match data.stack_depth {
            Some(expected) if expected != depth => {
                return Err(Error::InconsistentStackDepth {
                    label: target,
                    expected,
                    found: depth,
                })
            }
            Some(_) => (),
            None => data.stack_depth = Some(depth),
        }
        match data.position {
            Some(position) => {
                Self::patch(&mut self.code, site, position)?;
                data.resolved.push(site);
            }
            None => data.pending.push(site),
        }
        Ok(())
    }

    fn patch(code: &mut [u8], site: PatchSite, target: usize) -> Result<(), Error> {
        let offset = target as isize - site.instruction as isize;
        if site.wide {
            patch_i32(code, site.operand, offset as i32);
        } else {
            let narrow = i16::try_from(offset).map_err(|_| Error::WideJumpRequired { offset })?;
            patch_i16(code, site.operand, narrow);
        }
        Ok(())
    }

    /// Make jumps to labels placed at the current position go to `target` instead
    fn chain_labels_at_end(&mut self, target: Label) -> Result<(), Error> {
        for label in std::mem::take(&mut self.labels_at_end) {
            if label == target || self.labels[label.index()].forward_to.is_some() {
                continue;
            }
            let sites = std::mem::take(&mut self.labels[label.index()].resolved);
            let depth = self.labels[label.index()].stack_depth;
            self.labels[label.index()].forward_to = Some(target);
            log::trace!("chaining {:?} to {:?} ({} jumps)", label, target, sites.len());

            let target_data = &mut self.labels[target.index()];
            if target_data.stack_depth.is_none() {
                target_data.stack_depth = depth;
            }
            for site in sites {
                match target_data.position {
                    Some(position) => {
                        Self::patch(&mut self.code, site, position)?;
                        target_data.resolved.push(site);
                    }
                    None => target_data.pending.push(site),
                }
            }
        }
        Ok(())
    }

    /// Place a label at the current position
    ///
    /// If code can fall through to here, its stack depth must match that of any jump to the label.
    pub fn place_label(&mut self, label: Label) -> Result<(), Error> {
        if self.labels[label.index()].position.is_some() {
            return Err(Error::DuplicateLabel(label));
        }

        // `goto label; label:` is a no-op
        if let Some(goto) = self.trailing_goto.take() {
            if goto.target == label {
                log::trace!("removing jump to next instruction at {}", goto.position);
                self.code.truncate(goto.position);
                self.labels[label.index()]
                    .pending
                    .retain(|site| site.instruction != goto.position);
                self.alive = goto.was_alive;
                self.labels_at_end = goto.labels_before;
                self.clamp_positions(goto.position);
            }
        }

        let here = self.code.len();
        let data = &mut self.labels[label.index()];
        match data.stack_depth {
            Some(expected) => {
                if self.alive && expected != self.stack_depth {
                    return Err(Error::InconsistentStackDepth {
                        label,
                        expected,
                        found: self.stack_depth,
                    });
                }
                self.stack_depth = expected;
            }
            None => data.stack_depth = Some(self.stack_depth),
        }
        self.max_stack = self.max_stack.max(self.stack_depth);
        for site in std::mem::take(&mut data.pending) {
            Self::patch(&mut self.code, site, here)?;
            data.resolved.push(site);
        }
        data.position = Some(here);
        self.alive = true;
        self.labels_at_end.push(label);
        Ok(())
    }

    /// Place the entry point of an exception handler (the exception is the only thing on the stack)
    pub fn place_exception_handler(&mut self, label: Label) -> Result<(), Error> {
        let data = &mut self.labels[label.index()];
        if data.stack_depth.is_none() {
            data.stack_depth = Some(1);
        }
        self.alive = false;
        self.place_label(label)
    }

    /// Pull positions recorded in side tables back inside the code (after it got truncated)
    fn clamp_positions(&mut self, length: usize) {
        for line_number in &mut self.line_numbers {
            line_number.start = line_number.start.min(length);
        }
        // Several entries now starting at the same spot: the last one wins
        let mut deduped: Vec<LineNumber> = Vec::with_capacity(self.line_numbers.len());
        for line_number in self.line_numbers.drain(..) {
            match deduped.last_mut() {
                Some(last) if last.start == line_number.start => *last = line_number,
                _ => deduped.push(line_number),
            }
        }
        self.line_numbers = deduped;

        for handler in &mut self.handlers {
            for (start, end) in &mut handler.ranges {
                *start = (*start).min(length);
                if let Some(end) = end.as_mut() {
                    *end = (*end).min(length);
                }
            }
        }
        self.locals.clamp(length);
    }

    /// Record that code from here on comes from `line` (0 is an unknown line, and ignored)
    pub fn line_number(&mut self, line: u32) {
        if line == 0 {
            return;
        }
        let start = self.code.len();
        match self.line_numbers.last_mut() {
            Some(last) if last.start == start => last.line = line,
            Some(last) if last.line == line => (),
            _ => self.line_numbers.push(LineNumber { start, line }),
        }
    }

    /// Register a new exception handler (with no protected ranges yet)
    pub fn new_exception_handler(
        &mut self,
        handler: Label,
        catch_type: Option<ClassConstantIndex>,
    ) -> HandlerId {
        self.handlers.push(ExceptionHandler {
            handler,
            catch_type,
            ranges: vec![],
        });
        HandlerId(self.handlers.len() - 1)
    }

    /// Start protecting code from the current position onwards
    pub fn open_exception_range(&mut self, id: HandlerId) {
        let here = self.code.len();
        let ranges = &mut self.handlers[id.0].ranges;
        if !matches!(ranges.last(), Some((_, None))) {
            ranges.push((here, None));
        }
    }

    /// Stop protecting code at the current position
    pub fn close_exception_range(&mut self, id: HandlerId) {
        let here = self.code.len();
        if let Some((_, end @ None)) = self.handlers[id.0].ranges.last_mut() {
            *end = Some(here);
        }
    }

    /// Add the handler's ranges to the exception table, after those committed before
    ///
    /// Handlers of an inner `try` must be committed before those of an enclosing one.
    pub fn commit_exception_handler(&mut self, id: HandlerId) {
        self.close_exception_range(id);
        self.handler_order.push(id);
    }

    /// Reserve slots for a local variable
    pub fn allocate_local(
        &mut self,
        width: usize,
        debug: Option<LocalDebugInfo>,
    ) -> Result<u16, Error> {
        self.locals.allocate(width, debug)
    }

    /// First unallocated local slot
    pub fn locals_mark(&self) -> usize {
        self.locals.mark()
    }

    /// Free every local allocated since `mark` was taken
    pub fn release_locals(&mut self, mark: usize) {
        self.locals.release(mark, self.code.len())
    }

    pub fn open_local_range(&mut self, slot: u16) {
        self.locals.open_range(slot, self.code.len())
    }

    pub fn close_local_range(&mut self, slot: u16) {
        self.locals.close_range(slot, self.code.len())
    }

    /// Check every label is accounted for and package up the method body
    pub fn build(self) -> Result<MethodCode, Error> {
        for (idx, data) in self.labels.iter().enumerate() {
            if !data.pending.is_empty() {
                return Err(Error::UnplacedLabel(Label(idx as u32)));
            }
        }

        let mut exception_table = vec![];
        for id in &self.handler_order {
            let handler = &self.handlers[id.0];
            let handler_position = self.labels[handler.handler.index()]
                .position
                .ok_or(Error::UnplacedLabel(handler.handler))?;
            for (start, end) in &handler.ranges {
                let end = end.unwrap_or(self.code.len());
                if *start < end {
                    exception_table.push(ExceptionTableEntry {
                        start: *start,
                        end,
                        handler: handler_position,
                        catch_type: handler.catch_type,
                    });
                }
            }
        }

        let length = self.code.len();
        let (max_locals, local_variables) = self.locals.finish(length);
        let max_locals = u16::try_from(max_locals)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(max_locals))?;

        let mut line_numbers = self.line_numbers;
        line_numbers.retain(|line_number| line_number.start < length);

        Ok(MethodCode {
            code: self.code,
            max_stack: self.max_stack,
            max_locals,
            exception_table,
            line_numbers,
            local_variables,
        })
    }
}
