/// Knobs for code generation
#[derive(Clone, Debug)]
pub struct Settings {
    /// Emit the table mapping code positions to source lines
    pub line_numbers: bool,

    /// Emit the table of visible ranges of source-level locals
    pub local_variables: bool,

    /// Start every method in wide mode (32-bit jump offsets) instead of only those which need it
    pub force_wide_jumps: bool,

    /// Largest acceptable method body, in bytes
    ///
    /// The class file format caps this at 65535. Methods going over are replaced with a stub.
    pub max_code_length: usize,

    /// Class of the exception thrown by stubs standing in for methods which could not be
    /// generated (must have a constructor taking a `String`)
    pub problem_class: String,

    /// Longest string literal (in modified UTF-8 bytes) loaded with a single `ldc`
    ///
    /// Longer literals get split into chunks and put back together with a `StringBuilder`.
    pub string_chunk_length: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            line_numbers: true,
            local_variables: true,
            force_wide_jumps: false,
            max_code_length: 65535,
            problem_class: String::from("java/lang/Error"),
            string_chunk_length: crate::jvm::MAX_UTF8_LENGTH,
        }
    }
}
