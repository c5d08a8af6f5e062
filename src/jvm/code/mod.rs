mod code_builder;
mod label;
mod locals;
mod method_code;
mod switch;

pub use code_builder::*;
pub use label::Label;
pub use locals::{LocalDebugInfo, Locals};
pub use method_code::*;
pub use switch::*;
