//! Findings reported by flow analysis and code generation
//!
//! Reporting never fails and never interrupts the caller: whoever finds a problem reports it and
//! keeps going with the most permissive assumption.

use crate::ast::Span;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ProblemKind {
    /// Local read before it is definitely assigned
    UninitializedLocal,

    /// `final` local assigned when it may already have been assigned
    FinalLocalAlreadyAssigned,

    /// Statement after a `return`, `throw`, `break`, `continue`, or infinite loop
    UnreachableCode,

    /// Statement only reachable through a branch that a constant condition rules out
    DeadCode,

    /// Variable assigned to itself
    AssignmentHasNoEffect,

    /// Body of a non-`void` method can complete normally
    MissingReturnValue,

    CodeTooLarge,
    ConstantPoolFull,
    TooManyArguments,
    TooManyLocals,
    StackTooDeep,

    /// Code generation reached a node whose resolution failed
    ProblemBindingReached,

    /// Access to a private member went through a synthetic accessor
    SyntheticAccessEmulation,

    /// The tree was inconsistent (eg. a binding of the wrong kind)
    InternalError,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl ProblemKind {
    pub fn severity(self) -> Severity {
        match self {
            ProblemKind::DeadCode | ProblemKind::AssignmentHasNoEffect => Severity::Warning,
            ProblemKind::SyntheticAccessEmulation => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ProblemKind::UninitializedLocal => "The local variable may not have been initialized",
            ProblemKind::FinalLocalAlreadyAssigned => {
                "The final local variable may already have been assigned"
            }
            ProblemKind::UnreachableCode => "Unreachable code",
            ProblemKind::DeadCode => "Dead code",
            ProblemKind::AssignmentHasNoEffect => "The assignment to variable has no effect",
            ProblemKind::MissingReturnValue => "This method must return a result",
            ProblemKind::CodeTooLarge => "The code of method is exceeding the 65535 bytes limit",
            ProblemKind::ConstantPoolFull => "Too many constants, the constant pool is full",
            ProblemKind::TooManyArguments => "Too many parameters",
            ProblemKind::TooManyLocals => "Too many local variables",
            ProblemKind::StackTooDeep => "The operand stack is exceeding the 65535 slots limit",
            ProblemKind::ProblemBindingReached => "Unresolved compilation problem",
            ProblemKind::SyntheticAccessEmulation => {
                "Access to enclosing member is emulated by a synthetic accessor method"
            }
            ProblemKind::InternalError => "Internal compiler error",
        };
        f.write_str(message)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub kind: ProblemKind,
    pub span: Span,

    /// Extra details (names of variables, members, limits exceeded...)
    pub context: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: ProblemKind, span: Span) -> Diagnostic {
        Diagnostic {
            kind,
            span,
            context: vec![],
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Diagnostic {
        self.context.push(context.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.span.line, self.kind)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context.join(", "))?;
        }
        Ok(())
    }
}

/// Destination for reported findings
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Sink which keeps everything, in order
#[derive(Default, Debug, Clone)]
pub struct Diagnostics {
    reported: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reported.iter()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.reported
            .iter()
            .any(|diagnostic| diagnostic.severity() == Severity::Error)
    }

    /// Diagnostics of one kind
    pub fn of_kind(&self, kind: ProblemKind) -> Vec<&Diagnostic> {
        self.reported
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .collect()
    }

    /// Forward everything collected to another sink
    pub fn drain_into(&mut self, sink: &mut impl DiagnosticSink) {
        for diagnostic in self.reported.drain(..) {
            sink.report(diagnostic);
        }
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::debug!("reported {}", diagnostic);
        self.reported.push(diagnostic);
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(Diagnostic::new(ProblemKind::DeadCode, Span::new(0, 4, 1)));
        assert!(!diagnostics.has_errors());
        diagnostics.report(
            Diagnostic::new(ProblemKind::UninitializedLocal, Span::new(9, 10, 2)).with_context("x"),
        );
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.of_kind(ProblemKind::UninitializedLocal).len(), 1);
        assert_eq!(
            diagnostics.iter().nth(1).map(ToString::to_string),
            Some("line 2: The local variable may not have been initialized (x)".to_string())
        );

        let mut forwarded: Vec<Diagnostic> = vec![];
        diagnostics.drain_into(&mut forwarded);
        assert!(diagnostics.is_empty());
        assert_eq!(forwarded.len(), 2);
    }
}
