use crate::ast::ConstantValue;
use crate::jvm::{
    modified_utf8_length, BaseType, BranchInstruction, CodeBuilder, Error, FieldType, Instruction,
    InvokeType, SerializableInstruction,
};

/// Instruction families on top of the raw `CodeBuilder`
///
/// These pick the cheapest encoding and the type-appropriate opcode, nothing more: they know
/// nothing of bindings or of the syntax tree.
pub trait CodeBuilderExts {
    fn push(&mut self, insn: SerializableInstruction) -> Result<(), Error>;
    fn push_jump(&mut self, insn: BranchInstruction<crate::jvm::Label>) -> Result<(), Error>;
    fn pool(&mut self) -> &mut crate::jvm::ConstantsPool;

    /// Push an integer constant onto the stack
    fn const_int(&mut self, integer: i32) -> Result<(), Error> {
        let insn = match integer {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            -128..=127 => Instruction::BiPush(integer as i8),
            -32768..=32767 => Instruction::SiPush(integer as i16),
            _ => Instruction::Ldc(self.pool().get_integer(integer)?),
        };
        self.push(insn)
    }

    /// Push a long constant onto the stack
    ///
    /// Small values go through an `int` instruction and a conversion: `iconst_2 i2l` is shorter
    /// than `ldc2_w` and doesn't use up two constant pool slots.
    fn const_long(&mut self, long: i64) -> Result<(), Error> {
        let (insn, needs_int_to_long_conversion) = match long {
            -1 => (Instruction::IConstM1, true),
            0 => (Instruction::LConst0, false),
            1 => (Instruction::LConst1, false),
            2 => (Instruction::IConst2, true),
            3 => (Instruction::IConst3, true),
            4 => (Instruction::IConst4, true),
            5 => (Instruction::IConst5, true),
            -128..=127 => (Instruction::BiPush(long as i8), true),
            -32768..=32767 => (Instruction::SiPush(long as i16), true),
            _ => (Instruction::Ldc2(self.pool().get_long(long)?), false),
        };
        self.push(insn)?;
        if needs_int_to_long_conversion {
            self.push(Instruction::I2L)?;
        }
        Ok(())
    }

    /// Push a float constant onto the stack
    fn const_float(&mut self, float: f32) -> Result<(), Error> {
        let (insn, needs_int_to_float_conversion) = match float {
            f if f == -1.0 => (Instruction::IConstM1, true),
            f if f == 0.0 && f.is_sign_positive() => (Instruction::FConst0, false),
            f if f == 1.0 => (Instruction::FConst1, false),
            f if f == 2.0 => (Instruction::FConst2, false),
            f if f == 3.0 => (Instruction::IConst3, true),
            f if f == 4.0 => (Instruction::IConst4, true),
            f if f == 5.0 => (Instruction::IConst5, true),
            _ => (Instruction::Ldc(self.pool().get_float(float)?), false),
        };
        self.push(insn)?;
        if needs_int_to_float_conversion {
            self.push(Instruction::I2F)?;
        }
        Ok(())
    }

    /// Push a double constant onto the stack
    fn const_double(&mut self, double: f64) -> Result<(), Error> {
        let (insn, needs_int_to_double_conversion) = match double {
            f if f == -1.0 => (Instruction::IConstM1, true),
            f if f == 0.0 && f.is_sign_positive() => (Instruction::DConst0, false),
            f if f == 1.0 => (Instruction::DConst1, false),
            f if f == 2.0 => (Instruction::IConst2, true),
            f if f == 3.0 => (Instruction::IConst3, true),
            f if f == 4.0 => (Instruction::IConst4, true),
            f if f == 5.0 => (Instruction::IConst5, true),
            _ => (Instruction::Ldc2(self.pool().get_double(double)?), false),
        };
        self.push(insn)?;
        if needs_int_to_double_conversion {
            self.push(Instruction::I2D)?;
        }
        Ok(())
    }

    /// Push a string constant onto the stack
    ///
    /// Strings too long for one constant pool entry are loaded in chunks, concatenated at run time
    /// with a `StringBuilder`.
    fn const_string(&mut self, string: &str, chunk_length: usize) -> Result<(), Error> {
        if modified_utf8_length(string) <= chunk_length {
            let index = self.pool().get_string(string)?;
            return self.push(Instruction::Ldc(index));
        }

        let chunks = split_string(string, chunk_length);
        log::debug!(
            "splitting string constant of {} characters into {} chunks",
            string.chars().count(),
            chunks.len()
        );
        let builder = "java/lang/StringBuilder";
        let builder_class = self.pool().get_class(builder)?;
        let init = self
            .pool()
            .get_method_ref(builder, "<init>", "(Ljava/lang/String;)V", false)?;
        let append = self.pool().get_method_ref(
            builder,
            "append",
            "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            false,
        )?;
        let to_string =
            self.pool()
                .get_method_ref(builder, "toString", "()Ljava/lang/String;", false)?;

        self.push(Instruction::New(builder_class))?;
        self.push(Instruction::Dup)?;
        for (idx, chunk) in chunks.iter().enumerate() {
            let chunk = self.pool().get_string(chunk)?;
            self.push(Instruction::Ldc(chunk))?;
            if idx == 0 {
                self.push(Instruction::Invoke(InvokeType::Special, init))?;
            } else {
                self.push(Instruction::Invoke(InvokeType::Virtual, append))?;
            }
        }
        self.push(Instruction::Invoke(InvokeType::Virtual, to_string))
    }

    /// Push a compile-time constant onto the stack
    fn const_value(&mut self, value: &ConstantValue, chunk_length: usize) -> Result<(), Error> {
        match value {
            ConstantValue::Int(integer) => self.const_int(*integer),
            ConstantValue::Boolean(boolean) => self.const_int(i32::from(*boolean)),
            ConstantValue::Long(long) => self.const_long(*long),
            ConstantValue::Float(float) => self.const_float(*float),
            ConstantValue::Double(double) => self.const_double(*double),
            ConstantValue::String(string) => self.const_string(string, chunk_length),
        }
    }

    /// Push the zero value of a type (`null` for references)
    fn const_zero<C>(&mut self, field_type: &FieldType<C>) -> Result<(), Error> {
        let insn = match field_type.computational() {
            Some(BaseType::Long) => Instruction::LConst0,
            Some(BaseType::Float) => Instruction::FConst0,
            Some(BaseType::Double) => Instruction::DConst0,
            Some(_) => Instruction::IConst0,
            None => Instruction::AConstNull,
        };
        self.push(insn)
    }

    /// Get a local at a particular offset
    fn get_local<C>(&mut self, offset: u16, field_type: &FieldType<C>) -> Result<(), Error> {
        let insn = match field_type.computational() {
            Some(BaseType::Long) => Instruction::LLoad(offset),
            Some(BaseType::Float) => Instruction::FLoad(offset),
            Some(BaseType::Double) => Instruction::DLoad(offset),
            Some(_) => Instruction::ILoad(offset),
            None => Instruction::ALoad(offset),
        };
        self.push(insn)
    }

    /// Set a local at a particular offset
    fn set_local<C>(&mut self, offset: u16, field_type: &FieldType<C>) -> Result<(), Error> {
        let insn = match field_type.computational() {
            Some(BaseType::Long) => Instruction::LStore(offset),
            Some(BaseType::Float) => Instruction::FStore(offset),
            Some(BaseType::Double) => Instruction::DStore(offset),
            Some(_) => Instruction::IStore(offset),
            None => Instruction::AStore(offset),
        };
        self.push(insn)
    }

    /// Load an element of an array (array and index are on the stack)
    fn array_load<C>(&mut self, element: &FieldType<C>) -> Result<(), Error> {
        let insn = match element {
            FieldType::Base(BaseType::Int) => Instruction::IALoad,
            FieldType::Base(BaseType::Long) => Instruction::LALoad,
            FieldType::Base(BaseType::Float) => Instruction::FALoad,
            FieldType::Base(BaseType::Double) => Instruction::DALoad,
            FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BALoad,
            FieldType::Base(BaseType::Char) => Instruction::CALoad,
            FieldType::Base(BaseType::Short) => Instruction::SALoad,
            FieldType::Ref(_) => Instruction::AALoad,
        };
        self.push(insn)
    }

    /// Store an element of an array (array, index, and value are on the stack)
    fn array_store<C>(&mut self, element: &FieldType<C>) -> Result<(), Error> {
        let insn = match element {
            FieldType::Base(BaseType::Int) => Instruction::IAStore,
            FieldType::Base(BaseType::Long) => Instruction::LAStore,
            FieldType::Base(BaseType::Float) => Instruction::FAStore,
            FieldType::Base(BaseType::Double) => Instruction::DAStore,
            FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BAStore,
            FieldType::Base(BaseType::Char) => Instruction::CAStore,
            FieldType::Base(BaseType::Short) => Instruction::SAStore,
            FieldType::Ref(_) => Instruction::AAStore,
        };
        self.push(insn)
    }

    /// Pop the top of the stack, which is a value of `width` slots
    fn pop_value(&mut self, width: usize) -> Result<(), Error> {
        match width {
            0 => Ok(()),
            1 => self.push(Instruction::Pop),
            _ => self.push(Instruction::Pop2),
        }
    }

    /// Duplicate the value on top of the stack and tuck the copy under `under` more slots
    ///
    /// This is what `x = y` (with its value used) needs when the store also consumes a receiver or
    /// an array and index sitting below the value.
    fn dup_value(&mut self, width: usize, under: usize) -> Result<(), Error> {
        let insn = match (width, under) {
            (1, 0) => Instruction::Dup,
            (1, 1) => Instruction::DupX1,
            (1, _) => Instruction::DupX2,
            (_, 0) => Instruction::Dup2,
            (_, 1) => Instruction::Dup2X1,
            _ => Instruction::Dup2X2,
        };
        self.push(insn)
    }

    /// Return the value of the given type (`None` for `void`)
    fn return_value<C>(&mut self, return_type: Option<&FieldType<C>>) -> Result<(), Error> {
        let insn = match return_type.map(FieldType::computational) {
            None => BranchInstruction::Return,
            Some(Some(BaseType::Long)) => BranchInstruction::LReturn,
            Some(Some(BaseType::Float)) => BranchInstruction::FReturn,
            Some(Some(BaseType::Double)) => BranchInstruction::DReturn,
            Some(Some(_)) => BranchInstruction::IReturn,
            Some(None) => BranchInstruction::AReturn,
        };
        self.push_jump(insn)
    }

    /// Throw a new exception of class `class`, built from a message
    ///
    /// The class must have a constructor taking a single `String`.
    fn throw_problem(&mut self, class: &str, message: &str) -> Result<(), Error> {
        let class_index = self.pool().get_class(class)?;
        let init = self
            .pool()
            .get_method_ref(class, "<init>", "(Ljava/lang/String;)V", false)?;
        self.push(Instruction::New(class_index))?;
        self.push(Instruction::Dup)?;
        self.const_string(message, crate::jvm::MAX_UTF8_LENGTH)?;
        self.push(Instruction::Invoke(InvokeType::Special, init))?;
        self.push_jump(BranchInstruction::AThrow)
    }

    /// Convert the primitive value on top of the stack from one type to another
    ///
    /// Narrowing to `byte`, `char`, or `short` is included. References are left alone (casts
    /// between them are checked elsewhere).
    fn convert<C>(&mut self, from: &FieldType<C>, to: &FieldType<C>) -> Result<(), Error> {
        let (from, to) = match (from, to) {
            (FieldType::Base(from), FieldType::Base(to)) => (*from, *to),
            _ => return Ok(()),
        };
        let widened = match (from.computational(), to.computational()) {
            (BaseType::Int, BaseType::Long) => Some(Instruction::I2L),
            (BaseType::Int, BaseType::Float) => Some(Instruction::I2F),
            (BaseType::Int, BaseType::Double) => Some(Instruction::I2D),
            (BaseType::Long, BaseType::Int) => Some(Instruction::L2I),
            (BaseType::Long, BaseType::Float) => Some(Instruction::L2F),
            (BaseType::Long, BaseType::Double) => Some(Instruction::L2D),
            (BaseType::Float, BaseType::Int) => Some(Instruction::F2I),
            (BaseType::Float, BaseType::Long) => Some(Instruction::F2L),
            (BaseType::Float, BaseType::Double) => Some(Instruction::F2D),
            (BaseType::Double, BaseType::Int) => Some(Instruction::D2I),
            (BaseType::Double, BaseType::Long) => Some(Instruction::D2L),
            (BaseType::Double, BaseType::Float) => Some(Instruction::D2F),
            _ => None,
        };
        if let Some(insn) = widened {
            self.push(insn)?;
        }
        let narrowed = match (from, to) {
            (BaseType::Byte, BaseType::Short) => None,
            (from, to) if from == to => None,
            (_, BaseType::Byte) => Some(Instruction::I2B),
            (_, BaseType::Char) => Some(Instruction::I2C),
            (_, BaseType::Short) => Some(Instruction::I2S),
            _ => None,
        };
        if let Some(insn) = narrowed {
            self.push(insn)?;
        }
        Ok(())
    }
}

impl<'p> CodeBuilderExts for CodeBuilder<'p> {
    fn push(&mut self, insn: SerializableInstruction) -> Result<(), Error> {
        self.push_instruction(insn)
    }

    fn push_jump(&mut self, insn: BranchInstruction<crate::jvm::Label>) -> Result<(), Error> {
        self.push_branch(insn)
    }

    fn pool(&mut self) -> &mut crate::jvm::ConstantsPool {
        self.constants()
    }
}

/// Split a string into pieces whose modified UTF-8 encodings are at most `chunk_length` bytes
///
/// Pieces never split a character.
pub fn split_string(string: &str, chunk_length: usize) -> Vec<&str> {
    let mut chunks = vec![];
    let mut start = 0;
    let mut length = 0;
    for (idx, c) in string.char_indices() {
        let char_length = modified_utf8_length(c.encode_utf8(&mut [0; 4]));
        if length + char_length > chunk_length && idx > start {
            chunks.push(&string[start..idx]);
            start = idx;
            length = 0;
        }
        length += char_length;
    }
    if start < string.len() || chunks.is_empty() {
        chunks.push(&string[start..]);
    }
    chunks
}
