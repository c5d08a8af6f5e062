mod access_flags;
mod binary_format;
mod bytecode;
mod code;
mod constants;
mod descriptors;
pub mod disassembler;
mod errors;

pub use access_flags::*;
pub use binary_format::*;
pub use bytecode::*;
pub use code::*;
pub use constants::*;
pub use descriptors::*;
pub use errors::*;
