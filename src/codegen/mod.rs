//! Bytecode generation from resolved, flow-analysed trees
//!
//! Each method is generated by its own [`MethodGenerator`] into a [`crate::jvm::CodeBuilder`].
//! Jumps start out with 16-bit offsets; if one doesn't fit, the generator gives up and the method
//! is generated again from scratch with 32-bit jumps. Methods which can't be generated at all (too
//! large, unresolved names, flow errors) are replaced with a stub that throws.
//!
//! [`Compiler`] drives all of this over compilation units.

mod boolean;
mod code_builder_exts;
mod errors;
mod expression;
mod method;
mod settings;
mod statement;
mod unit;

pub use code_builder_exts::*;
pub use errors::*;
pub use method::{problem_stub, MethodGenerator};
pub use settings::*;
pub use unit::*;
