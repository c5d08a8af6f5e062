use crate::ast::Span;
use crate::diagnostics::ProblemKind;
use crate::jvm;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    BytecodeGen(jvm::Error),

    /// Generation reached a node whose resolution failed
    ProblemBinding { span: Span, reason: String },

    /// The tree is not something resolution could have produced (eg. a `Name` bound to a method,
    /// or a `break` with no target)
    MalformedTree { span: Span, message: String },
}

/// How far out an error unwinds
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    /// Throw away the method and generate it again with wide jumps
    RestartWide,

    /// Replace the method with a stub, and carry on with the next one
    AbortMethod,

    /// Give up on the whole unit: nothing generated for it can be trusted
    AbortUnit,
}

impl Error {
    pub fn malformed(span: Span, message: impl Into<String>) -> Error {
        Error::MalformedTree {
            span,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Error::BytecodeGen(jvm::Error::WideJumpRequired { .. }) => Severity::RestartWide,
            Error::BytecodeGen(err) if err.is_capacity_failure() => Severity::AbortMethod,
            Error::BytecodeGen(_) => Severity::AbortUnit,
            Error::ProblemBinding { .. } => Severity::AbortMethod,
            Error::MalformedTree { .. } => Severity::AbortUnit,
        }
    }

    /// Kind of the diagnostic reporting this error
    pub fn problem_kind(&self) -> ProblemKind {
        match self {
            Error::BytecodeGen(err) => match err {
                jvm::Error::MethodCodeOverflow { .. } => ProblemKind::CodeTooLarge,
                jvm::Error::ConstantPoolOverflow { .. } | jvm::Error::Utf8ConstantTooLong { .. } => {
                    ProblemKind::ConstantPoolFull
                }
                jvm::Error::TooManyArguments { .. } => ProblemKind::TooManyArguments,
                jvm::Error::MethodCodeMaxLocalsOverflow(_) => ProblemKind::TooManyLocals,
                jvm::Error::MethodCodeMaxStackOverflow(_) => ProblemKind::StackTooDeep,
                _ => ProblemKind::InternalError,
            },
            Error::ProblemBinding { .. } => ProblemKind::ProblemBindingReached,
            Error::MalformedTree { .. } => ProblemKind::InternalError,
        }
    }

    /// Location to report the error at, when it is known
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::BytecodeGen(_) => None,
            Error::ProblemBinding { span, .. } | Error::MalformedTree { span, .. } => Some(*span),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BytecodeGen(err) => write!(f, "{}", err),
            Error::ProblemBinding { reason, .. } => write!(f, "{}", reason),
            Error::MalformedTree { message, .. } => write!(f, "malformed tree: {}", message),
        }
    }
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::BytecodeGen(err)
    }
}
