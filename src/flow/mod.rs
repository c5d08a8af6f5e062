//! Definite assignment and reachability analysis
//!
//! Analysis runs over one method at a time, before code generation of that method. It threads a
//! flow state through the tree in evaluation order, reports problems to a diagnostic sink (never
//! stopping on them), clears the reachability bit of statements control cannot get to, and records
//! snapshots of the state at branch and join points for code generation to replay.

mod context;
mod expression;
mod recorder;
mod state;
mod statement;

pub use recorder::*;
pub use state::*;

use crate::ast::{FieldDeclaration, MethodDeclaration, Span, Statement, StatementKind};
use crate::binding::{BindingTable, TypeRef};
use crate::diagnostics::{Diagnostic, DiagnosticSink, ProblemKind, Severity};
use context::FlowContext;

/// Outcome of analysing one method (or initializer)
#[derive(Debug)]
pub struct MethodFlow {
    /// States recorded in the tree, for code generation
    pub recorder: StateRecorder,

    /// Can the body complete normally (in which case `void` methods need a final `return`)?
    pub can_complete_normally: bool,

    /// Did analysis report any error? (If so, the method gets no real code.)
    pub has_errors: bool,
}

pub struct FlowAnalyzer<'a, 'd> {
    bindings: &'a BindingTable,
    sink: &'d mut dyn DiagnosticSink,
    recorder: StateRecorder,

    /// Enclosing constructs `break`, `continue`, and `return` can exit
    contexts: Vec<FlowContext<'a>>,

    /// Return type of the method (`None` for `void`)
    return_type: Option<TypeRef>,

    /// Number of flow ids handed out to locals declared so far
    declared_locals: usize,

    errors: usize,
}

impl<'a, 'd> FlowAnalyzer<'a, 'd> {
    pub fn new(bindings: &'a BindingTable, sink: &'d mut dyn DiagnosticSink) -> Self {
        FlowAnalyzer {
            bindings,
            sink,
            recorder: StateRecorder::new(),
            contexts: vec![],
            return_type: None,
            declared_locals: 0,
            errors: 0,
        }
    }

    /// Analyse a method body
    ///
    /// For constructors, `field_initializers` are the instance field initializers: they run right
    /// after the superclass constructor call (and not at all if the constructor delegates to
    /// `this(...)`).
    pub fn analyse_method(
        mut self,
        declaration: &'a MethodDeclaration,
        field_initializers: &[&'a FieldDeclaration],
    ) -> MethodFlow {
        let method = self.bindings.method(declaration.method);
        self.return_type = method.descriptor.return_type;
        log::trace!("analysing flow of {}", method.name);

        let mut inits = Inits::initial();
        for argument in &declaration.arguments {
            let flow_id = self.bindings.local(*argument).flow_id;
            inits.mark_assigned(flow_id);
            self.note_declared(flow_id);
        }

        let statements: &'a [Statement] = match &declaration.body {
            Some(body) => &body.statements,
            None => return self.finish(&inits),
        };

        let exit = if method.is_constructor() {
            let (call, rest) = match statements.split_first() {
                Some((first, rest)) if matches!(first.kind, StatementKind::ConstructorCall { .. }) => {
                    (Some(first), rest)
                }
                _ => (None, statements),
            };
            let delegates = matches!(
                call.map(|call| &call.kind),
                Some(StatementKind::ConstructorCall {
                    is_super: false,
                    ..
                })
            );
            if let Some(call) = call {
                inits = self.analyse_statement(call, inits);
            }
            if !delegates {
                inits = self.analyse_field_initializers(field_initializers, inits);
            }
            self.analyse_statements(rest, inits)
        } else {
            self.analyse_statements(statements, inits)
        };

        if self.return_type.is_some() && exit.is_reachable() {
            self.report(
                Diagnostic::new(ProblemKind::MissingReturnValue, declaration.span)
                    .with_context(method.name.clone()),
            );
        }
        self.finish(&exit)
    }

    /// Analyse static field initializers, as the body of `<clinit>`
    pub fn analyse_static_initializers(mut self, fields: &[&'a FieldDeclaration]) -> MethodFlow {
        let exit = self.analyse_field_initializers(fields, Inits::initial());
        self.finish(&exit)
    }

    fn analyse_field_initializers(
        &mut self,
        fields: &[&'a FieldDeclaration],
        mut inits: Inits,
    ) -> Inits {
        for field in fields {
            if let Some(initializer) = &field.initializer {
                inits = self.value(initializer, inits);
            }
        }
        inits
    }

    fn finish(self, exit: &Inits) -> MethodFlow {
        MethodFlow {
            recorder: self.recorder,
            can_complete_normally: exit.is_reachable(),
            has_errors: self.errors > 0,
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity() == Severity::Error {
            self.errors += 1;
        }
        self.sink.report(diagnostic);
    }

    fn report_local(&mut self, kind: ProblemKind, span: Span, local: crate::binding::LocalId) {
        let name = self.bindings.local(local).name.clone();
        self.report(Diagnostic::new(kind, span).with_context(name));
    }

    fn note_declared(&mut self, flow_id: usize) {
        self.declared_locals = self.declared_locals.max(flow_id + 1);
    }

    fn record(&mut self, inits: &Inits) -> StateIndex {
        self.recorder.record(inits)
    }
}
