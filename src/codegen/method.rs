use super::{CodeBuilderExts, Error, Settings};
use crate::ast::{Block, FieldDeclaration, MethodDeclaration, Span, Statement, StatementKind};
use crate::binding::{
    AccessorKind, Binding, BindingTable, ClassId, FieldId, LocalId, Member, MethodId, TypeRef,
};
use crate::diagnostics::{Diagnostic, ProblemKind};
use crate::flow::{StateIndex, StateRecorder};
use crate::jvm::{
    ClassConstantIndex, CodeBuilder, ConstantIndex, ConstantsPool, FieldType, HandlerId,
    Instruction, InvokeType, Label, LocalDebugInfo, MemberAccess, MethodCode,
};
use crate::util::Width;
use std::collections::HashMap;

/// Most argument slots (including `this`) a method can take
const MAX_ARGUMENT_SLOTS: usize = 255;

/// How an invoked method is dispatched
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum Dispatch {
    /// Static, virtual or interface, according to the method
    Normal,

    /// `invokespecial` (constructors, `super.m()`, private methods)
    Special,
}

/// Construct that `break`, `continue`, or `return` can jump out of
pub(super) enum JumpTarget<'a> {
    Breakable {
        kind: BreakableKind<'a>,
        break_label: Label,

        /// Only for loops
        continue_label: Option<Label>,
    },

    /// `try` statement whose handlers must not cover code jumping out of it
    Try {
        finally: Option<&'a Block>,

        /// Handlers whose protected range is currently open
        open_handlers: Vec<HandlerId>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum BreakableKind<'a> {
    Loop,
    Switch,
    Labeled(&'a str),
}

/// Context for generating the code of one method
///
/// A generator is used for a single attempt at the method: if the attempt fails, the generator is
/// dropped along with the diagnostics it collected.
pub struct MethodGenerator<'a, 'p> {
    pub(super) code: CodeBuilder<'p>,
    pub(super) bindings: &'a BindingTable,
    pub(super) settings: &'a Settings,
    recorder: &'a StateRecorder,

    /// Diagnostics found during this attempt
    pub(super) diagnostics: Vec<Diagnostic>,

    /// Class whose method is being generated
    pub(super) class: ClassId,

    /// `None` for `void`
    pub(super) return_type: Option<TypeRef>,

    local_slots: HashMap<LocalId, u16>,

    /// Locals declared in the enclosing blocks (excluding arguments), innermost last
    scope_locals: Vec<LocalId>,

    /// Enclosing constructs, innermost last
    pub(super) jump_targets: Vec<JumpTarget<'a>>,
}

impl<'a, 'p> MethodGenerator<'a, 'p> {
    pub fn new(
        constants: &'p mut ConstantsPool,
        bindings: &'a BindingTable,
        settings: &'a Settings,
        recorder: &'a StateRecorder,
        method: MethodId,
        wide_jumps: bool,
    ) -> MethodGenerator<'a, 'p> {
        let data = bindings.method(method);
        MethodGenerator {
            code: CodeBuilder::new(constants, wide_jumps, settings.max_code_length),
            bindings,
            settings,
            recorder,
            diagnostics: vec![],
            class: data.class,
            return_type: data.descriptor.return_type,
            local_slots: HashMap::new(),
            scope_locals: vec![],
            jump_targets: vec![],
        }
    }

    /// Generate the body of a method
    ///
    /// For constructors, `field_initializers` are the instance field initializers, stored into
    /// the new object right after the superclass constructor returns.
    pub fn generate_method(
        mut self,
        declaration: &'a MethodDeclaration,
        field_initializers: &[&'a FieldDeclaration],
    ) -> Result<(MethodCode, Vec<Diagnostic>), Error> {
        let method = self.bindings.method(declaration.method);
        let slots = method.descriptor.parameter_length(!method.is_static());
        if slots > MAX_ARGUMENT_SLOTS {
            return Err(crate::jvm::Error::TooManyArguments { slots }.into());
        }
        log::trace!(
            "generating {}{} (wide jumps: {})",
            method.name,
            self.bindings.method_descriptor(declaration.method),
            self.code.wide_jumps()
        );

        self.declare_arguments(declaration)?;
        let statements: &'a [Statement] = match &declaration.body {
            Some(body) => &body.statements,
            None => &[],
        };

        if method.is_constructor() {
            let rest = self.generate_constructor_prologue(statements, field_initializers)?;
            self.generate_statements(rest)?;
        } else {
            self.generate_statements(statements)?;
        }

        if self.code.is_alive() {
            if self.return_type.is_some() {
                return Err(Error::malformed(
                    declaration.span,
                    format!("end of non-void method {} is reachable", method.name),
                ));
            }
            self.code.return_value::<ClassId>(None)?;
        }
        let code = self.code.build()?;
        Ok((code, self.diagnostics))
    }

    /// Generate `<clinit>` from the static field initializers
    pub fn generate_static_initializer(
        mut self,
        fields: &[&'a FieldDeclaration],
    ) -> Result<(MethodCode, Vec<Diagnostic>), Error> {
        self.generate_field_initializers(fields)?;
        if self.code.is_alive() {
            self.code.return_value::<ClassId>(None)?;
        }
        let code = self.code.build()?;
        Ok((code, self.diagnostics))
    }

    /// Allocate `this` and the arguments (all visible for the whole method)
    fn declare_arguments(&mut self, declaration: &MethodDeclaration) -> Result<(), Error> {
        let method = self.bindings.method(declaration.method);
        if !method.is_static() {
            let debug = self.debug_info("this", &FieldType::object(self.class));
            let slot = self.code.allocate_local(1, debug)?;
            self.code.open_local_range(slot);
        }
        for argument in &declaration.arguments {
            let data = self.bindings.local(*argument);
            let debug = self.debug_info(&data.name, &data.descriptor);
            let slot = self.code.allocate_local(data.descriptor.width(), debug)?;
            self.code.open_local_range(slot);
            self.local_slots.insert(*argument, slot);
        }
        Ok(())
    }

    /// Superclass (or delegated) constructor call, then field initializers
    ///
    /// Returns the statements left to generate.
    fn generate_constructor_prologue(
        &mut self,
        statements: &'a [Statement],
        field_initializers: &[&'a FieldDeclaration],
    ) -> Result<&'a [Statement], Error> {
        let (delegates, rest) = match statements.split_first() {
            Some((call, rest)) => match &call.kind {
                StatementKind::ConstructorCall { is_super, .. } => {
                    self.generate_statement(call)?;
                    (!*is_super, rest)
                }
                _ => {
                    self.generate_implicit_super_call()?;
                    (false, statements)
                }
            },
            None => {
                self.generate_implicit_super_call()?;
                (false, statements)
            }
        };
        if !delegates {
            self.generate_field_initializers(field_initializers)?;
        }
        Ok(rest)
    }

    /// `super()` with no arguments
    fn generate_implicit_super_call(&mut self) -> Result<(), Error> {
        let superclass = match self.bindings.class(self.class).superclass {
            Some(superclass) => superclass,
            None => return Ok(()),
        };
        let name = &self.bindings.class(superclass).name;
        let init = self
            .code
            .constants()
            .get_method_ref(name, "<init>", "()V", false)?;
        self.code.push_instruction(Instruction::ALoad(0))?;
        self.code
            .push_instruction(Instruction::Invoke(InvokeType::Special, init))?;
        Ok(())
    }

    fn generate_field_initializers(
        &mut self,
        fields: &[&'a FieldDeclaration],
    ) -> Result<(), Error> {
        for declaration in fields {
            let initializer = match &declaration.initializer {
                Some(initializer) => initializer,
                None => continue,
            };
            if self.settings.line_numbers {
                self.code.line_number(declaration.span.line);
            }
            let field = self.bindings.field(declaration.field);
            let is_static = field.access_flags.is_static();
            if !is_static {
                self.code.push_instruction(Instruction::ALoad(0))?;
            }
            self.generate_expression(initializer, true)?;
            self.convert(initializer, &field.descriptor)?;
            let field_ref = self.field_ref(declaration.field)?;
            if is_static {
                self.code.push_instruction(Instruction::PutStatic(field_ref))?;
            } else {
                self.code.push_instruction(Instruction::PutField(field_ref))?;
            }
        }
        Ok(())
    }

    pub(super) fn debug_info(&self, name: &str, descriptor: &TypeRef) -> Option<LocalDebugInfo> {
        if self.settings.local_variables {
            Some(LocalDebugInfo {
                name: name.to_string(),
                descriptor: self.bindings.type_descriptor(descriptor),
            })
        } else {
            None
        }
    }

    /// Allocate the slot of a source-level local declared in the current scope
    pub(super) fn declare_local(&mut self, local: LocalId) -> Result<u16, Error> {
        let data = self.bindings.local(local);
        let debug = self.debug_info(&data.name, &data.descriptor);
        let slot = self.code.allocate_local(data.descriptor.width(), debug)?;
        self.local_slots.insert(local, slot);
        self.scope_locals.push(local);
        Ok(slot)
    }

    pub(super) fn local_slot(&self, local: LocalId, span: Span) -> Result<u16, Error> {
        match self.local_slots.get(&local) {
            Some(slot) => Ok(*slot),
            None => Err(Error::malformed(
                span,
                format!("local {} used out of scope", self.bindings.local(local).name),
            )),
        }
    }

    /// Start of a lexical scope, to hand back to `exit_scope`
    pub(super) fn enter_scope(&self) -> (usize, usize) {
        (self.code.locals_mark(), self.scope_locals.len())
    }

    /// Free the slots of every local declared since the scope was entered
    pub(super) fn exit_scope(&mut self, (mark, declared): (usize, usize)) {
        for local in self.scope_locals.drain(declared..) {
            self.local_slots.remove(&local);
        }
        self.code.release_locals(mark);
    }

    /// Make the visible locals match the recorded state at this point
    ///
    /// Locals definitely assigned become visible, others stop being visible. Unreachable states
    /// leave things as they are.
    pub(super) fn sync_locals(&mut self, state: Option<StateIndex>) {
        if !self.settings.local_variables {
            return;
        }
        let recorder = self.recorder;
        let assigned = match state.and_then(|index| recorder.definitely_assigned(index)) {
            Some(assigned) => assigned,
            None => return,
        };
        for local in &self.scope_locals {
            if let Some(slot) = self.local_slots.get(local) {
                if assigned.contains(self.bindings.local(*local).flow_id) {
                    self.code.open_local_range(*slot);
                } else {
                    self.code.close_local_range(*slot);
                }
            }
        }
    }

    /// Place a label if anything can get to it
    pub(super) fn place_if_reachable(&mut self, label: Label) -> Result<(), Error> {
        if self.code.is_alive() || self.code.is_label_referenced(label) {
            self.code.place_label(label)?;
        }
        Ok(())
    }

    /// Convert the value of `expression` (on the stack) to type `to`
    pub(super) fn convert(
        &mut self,
        expression: &crate::ast::Expression,
        to: &TypeRef,
    ) -> Result<(), Error> {
        match &expression.ty {
            Some(from) => Ok(self.code.convert(from, to)?),
            None => Err(Error::malformed(
                expression.span,
                "void expression used as a value",
            )),
        }
    }

    /// Resolve a binding to a method, or explain why it can't be
    pub(super) fn method_binding(binding: &Binding, span: Span) -> Result<MethodId, Error> {
        match binding {
            Binding::Method(method) => Ok(*method),
            Binding::Problem(reason) => Err(Error::ProblemBinding {
                span,
                reason: reason.to_string(),
            }),
            other => Err(Error::malformed(
                span,
                format!("expected a method binding, found {:?}", other),
            )),
        }
    }

    pub(super) fn field_ref(&mut self, field: FieldId) -> Result<ConstantIndex, Error> {
        let data = self.bindings.field(field);
        let class = &self.bindings.class(data.class).name;
        let descriptor = self.bindings.type_descriptor(&data.descriptor);
        Ok(self
            .code
            .constants()
            .get_field_ref(class, &data.name, &descriptor)?)
    }

    pub(super) fn class_constant(&mut self, ty: &TypeRef) -> Result<ClassConstantIndex, Error> {
        let name = self.bindings.class_constant_name(ty);
        Ok(self.code.constants().get_class(&name)?)
    }

    /// Invoke a method whose arguments (and receiver, if any) are on the stack
    pub(super) fn invoke(&mut self, method: MethodId, dispatch: Dispatch) -> Result<(), Error> {
        let data = self.bindings.method(method);
        let class = self.bindings.class(data.class);
        let slots = data.descriptor.parameter_length(!data.is_static());
        if slots > MAX_ARGUMENT_SLOTS {
            return Err(crate::jvm::Error::TooManyArguments { slots }.into());
        }
        let descriptor = self.bindings.method_descriptor(method);
        let is_interface = class.is_interface();
        let method_ref =
            self.code
                .constants()
                .get_method_ref(&class.name, &data.name, &descriptor, is_interface)?;
        let invoke_type = if data.is_static() {
            InvokeType::Static
        } else if dispatch == Dispatch::Special {
            InvokeType::Special
        } else if is_interface {
            InvokeType::Interface(slots as u8)
        } else {
            InvokeType::Virtual
        };
        self.code
            .push_instruction(Instruction::Invoke(invoke_type, method_ref))?;
        Ok(())
    }

    /// Accessor to go through for `member`, if the current class can't reach it directly
    pub(super) fn accessor_for(
        &mut self,
        member: Member,
        kind: AccessorKind,
        span: Span,
    ) -> Option<MethodId> {
        if !self.bindings.requires_accessor(member, self.class) {
            return None;
        }
        let accessor = self.bindings.synthetic_accessor(member, kind);
        let name = match member {
            Member::Field(field) => self.bindings.field(field).name.clone(),
            Member::Method(method) => self.bindings.method(method).name.clone(),
        };
        self.diagnostics.push(
            Diagnostic::new(ProblemKind::SyntheticAccessEmulation, span)
                .with_context(name)
                .with_context(self.bindings.method(accessor).name.clone()),
        );
        Some(accessor)
    }
}

/// Body standing in for a method which could not be generated: it throws `problem_class` with
/// the given message
pub fn problem_stub(
    constants: &mut ConstantsPool,
    bindings: &BindingTable,
    settings: &Settings,
    method: MethodId,
    message: &str,
) -> Result<MethodCode, Error> {
    let data = bindings.method(method);
    let mut code = CodeBuilder::new(constants, false, settings.max_code_length);

    // Arguments still occupy their slots
    let slots = data.descriptor.parameter_length(!data.is_static());
    if slots > 0 {
        code.allocate_local(slots, None)?;
    }
    code.throw_problem(&settings.problem_class, message)?;
    Ok(code.build()?)
}
