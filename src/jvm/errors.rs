use super::{Constant, Label};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow {
        constant: Constant,
        offset: usize,
    },

    /// A `Utf8` constant longer than what a single entry can hold
    Utf8ConstantTooLong {
        length: usize,
    },

    IoError(std::io::Error),

    /// Code array grew past the addressable (or configured) limit
    MethodCodeOverflow {
        length: usize,
        limit: usize,
    },
    MethodCodeMaxStackOverflow(usize),
    MethodCodeMaxLocalsOverflow(usize),

    /// Arguments (in slots, including the receiver) don't fit in a call
    TooManyArguments {
        slots: usize,
    },

    /// A jump offset does not fit in 16 bits and the method is being emitted in narrow mode
    ///
    /// This is not a real failure: it tells the driver to restart the method in wide mode.
    WideJumpRequired {
        offset: isize,
    },

    /// An instruction pops more than what is on the stack (indicates a bug)
    StackUnderflow {
        instruction: String,
        depth: u16,
    },

    /// Code jumping to a label leaves a different stack depth than code falling into it
    /// (indicates a bug)
    InconsistentStackDepth {
        label: Label,
        expected: u16,
        found: u16,
    },

    /// A label is placed twice (indicates a bug)
    DuplicateLabel(Label),

    /// A label was jumped to but never placed (indicates a bug)
    UnplacedLabel(Label),
}

impl Error {
    /// Capacity failures abandon the current method, but nothing else
    pub fn is_capacity_failure(&self) -> bool {
        matches!(
            self,
            Error::ConstantPoolOverflow { .. }
                | Error::Utf8ConstantTooLong { .. }
                | Error::MethodCodeOverflow { .. }
                | Error::MethodCodeMaxStackOverflow(_)
                | Error::MethodCodeMaxLocalsOverflow(_)
                | Error::TooManyArguments { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { offset, .. } => {
                write!(f, "constant pool is full ({} entries)", offset)
            }
            Error::Utf8ConstantTooLong { length } => {
                write!(f, "string constant of {} bytes is too long", length)
            }
            Error::IoError(err) => write!(f, "{}", err),
            Error::MethodCodeOverflow { length, limit } => write!(
                f,
                "code of method exceeds the {} bytes limit (reached {})",
                limit, length
            ),
            Error::MethodCodeMaxStackOverflow(depth) => {
                write!(f, "operand stack of depth {} is too deep", depth)
            }
            Error::MethodCodeMaxLocalsOverflow(slots) => {
                write!(f, "too many local variables ({} slots)", slots)
            }
            Error::TooManyArguments { slots } => {
                write!(f, "too many arguments ({} slots)", slots)
            }
            Error::WideJumpRequired { offset } => {
                write!(f, "jump offset {} needs a wide encoding", offset)
            }
            Error::StackUnderflow { instruction, depth } => {
                write!(f, "{} underflows a stack of depth {}", instruction, depth)
            }
            Error::InconsistentStackDepth {
                label,
                expected,
                found,
            } => write!(
                f,
                "{:?} is reached with stack depths {} and {}",
                label, expected, found
            ),
            Error::DuplicateLabel(label) => write!(f, "{:?} is placed twice", label),
            Error::UnplacedLabel(label) => write!(f, "{:?} is never placed", label),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
