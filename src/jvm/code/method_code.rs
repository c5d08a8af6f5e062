use crate::jvm::ClassConstantIndex;

/// Finished body of a method, ready to be handed to a class file writer
#[derive(Debug, Clone)]
pub struct MethodCode {
    /// Serialized instructions
    pub code: Vec<u8>,

    pub max_stack: u16,
    pub max_locals: u16,

    /// Entries in the order the JVM should try them
    pub exception_table: Vec<ExceptionTableEntry>,

    /// Sorted by code position
    pub line_numbers: Vec<LineNumber>,

    pub local_variables: Vec<LocalVariableRange>,
}

/// Protected range `[start, end)` of the code and its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start: usize,
    pub end: usize,
    pub handler: usize,

    /// `None` catches everything (used for `finally`)
    pub catch_type: Option<ClassConstantIndex>,
}

/// The code starting at `start` comes from source line `line`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start: usize,
    pub line: u32,
}

/// A named local is visible in slot `slot` over the code range `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableRange {
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
}
