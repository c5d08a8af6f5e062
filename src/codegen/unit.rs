use super::errors::Severity;
use super::method::problem_stub;
use super::{CodeBuilderExts, Error, MethodGenerator, Settings};
use crate::ast::{CompilationUnit, FieldDeclaration, MethodDeclaration, Span, TypeDeclaration};
use crate::binding::{
    AccessorKind, BindingTable, ClassId, Member, MethodData, MethodId, SyntheticAccessor,
};
use crate::diagnostics::{self, Diagnostic, DiagnosticSink, Diagnostics};
use crate::flow::{FlowAnalyzer, MethodFlow, StateRecorder};
use crate::jvm::{
    CodeBuilder, ConstantsPool, Instruction, InvokeType, MemberAccess, MethodAccessFlags,
    MethodCode, MethodDescriptor,
};
use crate::util::Width;

/// Code generated for one method
#[derive(Debug)]
pub struct CompiledMethod {
    pub method: MethodId,

    /// `None` for methods without a body (`abstract` or `native`)
    pub code: Option<MethodCode>,

    /// The code only throws: the method could not be generated
    pub is_stub: bool,
}

/// Everything generated for one class, sharing one constant pool
pub struct ClassOutput {
    pub class: ClassId,
    pub constants: ConstantsPool,
    pub methods: Vec<CompiledMethod>,
}

impl ClassOutput {
    pub fn method(&self, method: MethodId) -> Option<&CompiledMethod> {
        self.methods.iter().find(|compiled| compiled.method == method)
    }
}

/// Result of compiling a compilation unit
pub struct UnitOutput {
    /// Classes of the unit (nested ones included), empty if the unit failed
    pub classes: Vec<ClassOutput>,

    pub diagnostics: Diagnostics,

    /// Generation hit an error it could not contain to a method: nothing was produced
    pub failed: bool,
}

impl UnitOutput {
    pub fn class(&self, class: ClassId) -> Option<&ClassOutput> {
        self.classes.iter().find(|output| output.class == class)
    }
}

/// Drives flow analysis and code generation over compilation units
pub struct Compiler<'a> {
    bindings: &'a BindingTable,
    settings: &'a Settings,
}

impl<'a> Compiler<'a> {
    pub fn new(bindings: &'a BindingTable, settings: &'a Settings) -> Compiler<'a> {
        Compiler { bindings, settings }
    }

    /// Compile units, then generate the synthetic accessors they asked for
    ///
    /// Accessor bodies land in the output of the class declaring them, which must be one of the
    /// units compiled here.
    pub fn compile(&self, units: &[CompilationUnit]) -> Vec<UnitOutput> {
        let mut outputs: Vec<UnitOutput> = units.iter().map(|unit| self.compile_unit(unit)).collect();

        for accessor in self.bindings.accessors() {
            let class = self.bindings.method(accessor.method).class;
            let output = outputs
                .iter_mut()
                .filter(|output| !output.failed)
                .flat_map(|output| output.classes.iter_mut())
                .find(|output| output.class == class);
            let output = match output {
                Some(output) => output,
                None => {
                    log::warn!(
                        "no output for {} to hold accessor {}",
                        self.bindings.class(class).name,
                        self.bindings.method(accessor.method).name
                    );
                    continue;
                }
            };
            if output.method(accessor.method).is_some() {
                continue;
            }
            match accessor_body(&mut output.constants, self.bindings, self.settings, accessor) {
                Ok(code) => output.methods.push(CompiledMethod {
                    method: accessor.method,
                    code: Some(code),
                    is_stub: false,
                }),
                Err(err) => log::warn!(
                    "failed to generate accessor {}: {}",
                    self.bindings.method(accessor.method).name,
                    err
                ),
            }
        }
        outputs
    }

    /// Compile every class of a unit
    ///
    /// Methods which can't be generated become stubs. Errors which can't be pinned on a single
    /// method abandon the whole unit.
    pub fn compile_unit(&self, unit: &CompilationUnit) -> UnitOutput {
        let mut types = vec![];
        collect_types(&unit.types, &mut types);

        let mut output = UnitOutput {
            classes: Vec::with_capacity(types.len()),
            diagnostics: Diagnostics::new(),
            failed: false,
        };
        for declaration in types {
            match self.compile_type(declaration, &mut output.diagnostics) {
                Ok(class) => output.classes.push(class),
                Err(err) => {
                    log::error!(
                        "abandoning unit while generating {}: {}",
                        self.bindings.class(declaration.class).name,
                        err
                    );
                    output.diagnostics.report(
                        Diagnostic::new(err.problem_kind(), err.span().unwrap_or(declaration.span))
                            .with_context(err.to_string()),
                    );
                    output.classes.clear();
                    output.failed = true;
                    break;
                }
            }
        }
        output
    }

    fn compile_type(
        &self,
        declaration: &TypeDeclaration,
        diagnostics: &mut Diagnostics,
    ) -> Result<ClassOutput, Error> {
        let class = declaration.class;
        log::debug!("generating class {}", self.bindings.class(class).name);

        let mut constants = ConstantsPool::new();
        let (static_fields, instance_fields): (Vec<&FieldDeclaration>, Vec<&FieldDeclaration>) =
            declaration
                .fields
                .iter()
                .filter(|field| field.initializer.is_some())
                .partition(|field| self.bindings.field(field.field).access_flags.is_static());

        let mut methods = Vec::with_capacity(declaration.methods.len() + 1);
        for method in &declaration.methods {
            methods.push(self.compile_method(&mut constants, method, &instance_fields, diagnostics)?);
        }

        if !static_fields.is_empty() {
            let clinit = self.bindings.add_method(MethodData {
                class,
                name: String::from("<clinit>"),
                descriptor: MethodDescriptor {
                    parameters: vec![],
                    return_type: None,
                },
                access_flags: MethodAccessFlags::STATIC,
            });
            methods.push(self.compile_static_initializer(
                &mut constants,
                clinit,
                &static_fields,
                declaration.span,
                diagnostics,
            )?);
        }

        Ok(ClassOutput {
            class,
            constants,
            methods,
        })
    }

    fn compile_method(
        &self,
        constants: &mut ConstantsPool,
        declaration: &MethodDeclaration,
        field_initializers: &[&FieldDeclaration],
        diagnostics: &mut Diagnostics,
    ) -> Result<CompiledMethod, Error> {
        if declaration.body.is_none() {
            return Ok(CompiledMethod {
                method: declaration.method,
                code: None,
                is_stub: false,
            });
        }

        let mut found = Diagnostics::new();
        let flow = FlowAnalyzer::new(self.bindings, &mut found)
            .analyse_method(declaration, field_initializers);
        if let Some(message) = problem_message(&flow, &found, &declaration.problems) {
            found.drain_into(diagnostics);
            log::debug!(
                "{} has errors, generating a stub",
                self.bindings.method(declaration.method).name
            );
            return self.stub(constants, declaration.method, &message);
        }
        found.drain_into(diagnostics);

        self.generate(
            constants,
            declaration.method,
            declaration.span,
            &flow.recorder,
            diagnostics,
            |generator| generator.generate_method(declaration, field_initializers),
        )
    }

    fn compile_static_initializer(
        &self,
        constants: &mut ConstantsPool,
        clinit: MethodId,
        fields: &[&FieldDeclaration],
        span: Span,
        diagnostics: &mut Diagnostics,
    ) -> Result<CompiledMethod, Error> {
        let mut found = Diagnostics::new();
        let flow = FlowAnalyzer::new(self.bindings, &mut found).analyse_static_initializers(fields);
        if let Some(message) = problem_message(&flow, &found, &[]) {
            found.drain_into(diagnostics);
            return self.stub(constants, clinit, &message);
        }
        found.drain_into(diagnostics);

        self.generate(
            constants,
            clinit,
            span,
            &flow.recorder,
            diagnostics,
            |generator| generator.generate_static_initializer(fields),
        )
    }

    /// Generate a method, retrying with wide jumps if a jump turns out not to fit, and falling
    /// back to a stub if the method can't be generated at all
    fn generate<'g>(
        &'g self,
        constants: &mut ConstantsPool,
        method: MethodId,
        span: Span,
        recorder: &'g StateRecorder,
        diagnostics: &mut Diagnostics,
        attempt: impl for<'p> Fn(
            MethodGenerator<'g, 'p>,
        ) -> Result<(MethodCode, Vec<Diagnostic>), Error>,
    ) -> Result<CompiledMethod, Error> {
        let name = &self.bindings.method(method).name;
        let mut wide_jumps = self.settings.force_wide_jumps;
        loop {
            let generator = MethodGenerator::new(
                constants,
                self.bindings,
                self.settings,
                recorder,
                method,
                wide_jumps,
            );
            let err = match attempt(generator) {
                Ok((code, found)) => {
                    for diagnostic in found {
                        diagnostics.report(diagnostic);
                    }
                    return Ok(CompiledMethod {
                        method,
                        code: Some(code),
                        is_stub: false,
                    });
                }
                Err(err) => err,
            };

            match err.severity() {
                Severity::RestartWide if !wide_jumps => {
                    log::warn!("{}: {}, generating it again with wide jumps", name, err);
                    wide_jumps = true;
                }
                Severity::AbortMethod => {
                    log::warn!("{}: {}, replacing it with a stub", name, err);
                    diagnostics.report(
                        Diagnostic::new(err.problem_kind(), err.span().unwrap_or(span))
                            .with_context(name.clone())
                            .with_context(err.to_string()),
                    );
                    return self.stub(constants, method, &err.to_string());
                }
                _ => return Err(err),
            }
        }
    }

    fn stub(
        &self,
        constants: &mut ConstantsPool,
        method: MethodId,
        message: &str,
    ) -> Result<CompiledMethod, Error> {
        let code = problem_stub(constants, self.bindings, self.settings, method, message)?;
        Ok(CompiledMethod {
            method,
            code: Some(code),
            is_stub: true,
        })
    }
}

/// Types of a unit, each followed by its member types
fn collect_types<'u>(types: &'u [TypeDeclaration], collected: &mut Vec<&'u TypeDeclaration>) {
    for declaration in types {
        collected.push(declaration);
        collect_types(&declaration.member_types, collected);
    }
}

/// Message of the stub replacing a method, if it has errors
fn problem_message(flow: &MethodFlow, found: &Diagnostics, problems: &[String]) -> Option<String> {
    let mut messages: Vec<String> = problems.to_vec();
    messages.extend(
        found
            .iter()
            .filter(|diagnostic| diagnostic.severity() == diagnostics::Severity::Error)
            .map(|diagnostic| diagnostic.to_string()),
    );
    if messages.is_empty() && !flow.has_errors {
        return None;
    }
    let plural = if messages.len() > 1 { "s" } else { "" };
    Some(format!(
        "Unresolved compilation problem{}: \n\t{}\n",
        plural,
        messages.join("\n\t")
    ))
}

/// Body of a synthetic accessor: forward the parameters to the member and return the result
pub fn accessor_body(
    constants: &mut ConstantsPool,
    bindings: &BindingTable,
    settings: &Settings,
    accessor: &SyntheticAccessor,
) -> Result<MethodCode, Error> {
    let descriptor = &bindings.method(accessor.method).descriptor;
    let mut code = CodeBuilder::new(constants, false, settings.max_code_length);

    match (accessor.kind, accessor.target) {
        (AccessorKind::ConstructorCall, Member::Method(constructor)) => {
            let data = bindings.method(constructor);
            let class = bindings.class_constant_name(&crate::jvm::FieldType::object(data.class));
            let class = code.constants().get_class(&class)?;
            let init = method_ref(&mut code, bindings, constructor)?;
            code.push_instruction(Instruction::New(class))?;
            code.push_instruction(Instruction::Dup)?;
            load_parameters(&mut code, &descriptor.parameters)?;
            code.push_instruction(Instruction::Invoke(InvokeType::Special, init))?;
        }
        (AccessorKind::MethodCall, Member::Method(method)) => {
            let data = bindings.method(method);
            let target = method_ref(&mut code, bindings, method)?;
            load_parameters(&mut code, &descriptor.parameters)?;
            let invoke_type = if data.is_static() {
                InvokeType::Static
            } else {
                InvokeType::Special
            };
            code.push_instruction(Instruction::Invoke(invoke_type, target))?;
        }
        (kind @ (AccessorKind::FieldRead | AccessorKind::FieldWrite), Member::Field(field)) => {
            let data = bindings.field(field);
            let owner = &bindings.class(data.class).name;
            let field_descriptor = bindings.type_descriptor(&data.descriptor);
            let field_ref = code
                .constants()
                .get_field_ref(owner, &data.name, &field_descriptor)?;
            let is_static = data.access_flags.is_static();
            load_parameters(&mut code, &descriptor.parameters)?;
            let insn = match (kind, is_static) {
                (AccessorKind::FieldRead, true) => Instruction::GetStatic(field_ref),
                (AccessorKind::FieldRead, false) => Instruction::GetField(field_ref),
                (_, true) => {
                    code.dup_value(data.descriptor.width(), 0)?;
                    Instruction::PutStatic(field_ref)
                }
                (_, false) => {
                    code.dup_value(data.descriptor.width(), 1)?;
                    Instruction::PutField(field_ref)
                }
            };
            code.push_instruction(insn)?;
        }
        (kind, target) => {
            return Err(Error::malformed(
                Span::default(),
                format!("{:?} accessor for {:?}", kind, target),
            ))
        }
    }
    code.return_value(descriptor.return_type.as_ref())?;
    Ok(code.build()?)
}

fn method_ref(
    code: &mut CodeBuilder<'_>,
    bindings: &BindingTable,
    method: MethodId,
) -> Result<crate::jvm::ConstantIndex, Error> {
    let data = bindings.method(method);
    let class = bindings.class(data.class);
    let descriptor = bindings.method_descriptor(method);
    Ok(code
        .constants()
        .get_method_ref(&class.name, &data.name, &descriptor, class.is_interface())?)
}

/// Load every parameter of a static method, in order
fn load_parameters(
    code: &mut CodeBuilder<'_>,
    parameters: &[crate::binding::TypeRef],
) -> Result<(), Error> {
    for parameter in parameters {
        let slot = code.allocate_local(parameter.width(), None)?;
        code.get_local(slot, parameter)?;
    }
    Ok(())
}
