//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation to make it more convenient to construct bytecode:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches and also simplifies tasks like inverting a
//!     branch condition.
//!
//!   - Some instructions (like `jsr` or `invokedynamic`) are just omitted, since nothing here
//!     emits them
//!

use super::*;
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::TryFrom;
use std::io::Result;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<Class, Constant, Field, Method> {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers both `ldc` and `ldc_w`
    Ldc2(Constant),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(Field),
    PutStatic(Field),
    GetField(Field),
    PutField(Field),
    Invoke(InvokeType, Method),
    New(Class),
    NewArray(BaseType),
    ANewArray(Class),
    MultiANewArray(Class, u8),
    ArrayLength,
    CheckCast(Class),
    InstanceOf(Class),
}

/// Instruction whose operands are all constant pool indices
pub type SerializableInstruction =
    Instruction<ClassConstantIndex, ConstantIndex, ConstantIndex, ConstantIndex>;

/// Net effect of an instruction on the operand stack, in slots
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StackEffect {
    pub pops: u16,
    pub pushes: u16,
}

const fn effect(pops: u16, pushes: u16) -> StackEffect {
    StackEffect { pops, pushes }
}

impl<Class, Constant, Field, Method> Instruction<Class, Constant, Field, Method> {
    /// Stack slots popped and pushed by the instruction
    ///
    /// Fields and methods are opaque here, so the caller supplies the slot width of a field and
    /// the `(argument slots, return slots)` of a method (not counting the receiver).
    pub fn stack_effect(
        &self,
        field_width: impl FnOnce(&Field) -> u16,
        method_slots: impl FnOnce(&Method) -> (u16, u16),
    ) -> StackEffect {
        use Instruction::*;
        match self {
            Nop | IInc(_, _) => effect(0, 0),
            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
                effect(0, 1)
            }
            FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | Ldc(_) => effect(0, 1),
            LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) => effect(0, 2),
            ILoad(_) | FLoad(_) | ALoad(_) => effect(0, 1),
            LLoad(_) | DLoad(_) => effect(0, 2),
            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => effect(2, 1),
            LALoad | DALoad => effect(2, 2),
            IStore(_) | FStore(_) | AStore(_) => effect(1, 0),
            LStore(_) | DStore(_) => effect(2, 0),
            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => effect(3, 0),
            LAStore | DAStore => effect(4, 0),
            Pop => effect(1, 0),
            Pop2 => effect(2, 0),
            Dup => effect(1, 2),
            DupX1 => effect(2, 3),
            DupX2 => effect(3, 4),
            Dup2 => effect(2, 4),
            Dup2X1 => effect(3, 5),
            Dup2X2 => effect(4, 6),
            Swap => effect(2, 2),
            IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IRem | FRem => effect(2, 1),
            IAnd | IOr | IXor | ISh(_) => effect(2, 1),
            LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv | DDiv | LRem | DRem => effect(4, 2),
            LAnd | LOr | LXor => effect(4, 2),
            LSh(_) => effect(3, 2),
            INeg | FNeg => effect(1, 1),
            LNeg | DNeg => effect(2, 2),
            I2L | I2D | F2L | F2D => effect(1, 2),
            I2F | F2I | I2B | I2C | I2S => effect(1, 1),
            L2I | L2F | D2I | D2F => effect(2, 1),
            L2D | D2L => effect(2, 2),
            LCmp | DCmp(_) => effect(4, 1),
            FCmp(_) => effect(2, 1),
            GetStatic(field) => effect(0, field_width(field)),
            PutStatic(field) => effect(field_width(field), 0),
            GetField(field) => effect(1, field_width(field)),
            PutField(field) => effect(1 + field_width(field), 0),
            Invoke(typ, method) => {
                let (arguments, returns) = method_slots(method);
                let receiver = u16::from(*typ != InvokeType::Static);
                effect(arguments + receiver, returns)
            }
            New(_) => effect(0, 1),
            NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => effect(1, 1),
            MultiANewArray(_, dims) => effect(u16::from(*dims), 1),
        }
    }
}

impl Width for SerializableInstruction {
    fn width(&self) -> usize {
        use Instruction::*;
        match self {
            ILoad(0..=3) | LLoad(0..=3) | FLoad(0..=3) | DLoad(0..=3) | ALoad(0..=3) => 1,
            IStore(0..=3) | LStore(0..=3) | FStore(0..=3) | DStore(0..=3) | AStore(0..=3) => 1,

            BiPush(_)
            | ILoad(4..=255)
            | LLoad(4..=255)
            | FLoad(4..=255)
            | DLoad(4..=255)
            | ALoad(4..=255)
            | IStore(4..=255)
            | LStore(4..=255)
            | FStore(4..=255)
            | DStore(4..=255)
            | AStore(4..=255)
            | Ldc(ConstantIndex(0..=255))
            | NewArray(_) => 2,

            SiPush(_)
            | Ldc(_)
            | Ldc2(_) // always wide, unlike `ldc` vs. `ldc_w`
            | IInc(0..=255, -128..=127)
            | GetStatic(_)
            | PutStatic(_)
            | GetField(_)
            | PutField(_)
            | Invoke(InvokeType::Special, _)
            | Invoke(InvokeType::Static, _)
            | Invoke(InvokeType::Virtual, _)
            | New(_)
            | ANewArray(_)
            | CheckCast(_)
            | InstanceOf(_) => 3,

            ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) => 4,
            IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => 4,
            MultiANewArray(_, _) => 4,

            Invoke(InvokeType::Interface(_), _) => 5,

            IInc(_, _) => 6,

            _ => 1,
        }
    }
}

impl Serialize for SerializableInstruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (256-65535) use `wide iload` plus two byte operands
         */
        fn load_or_store<W: WriteBytesExt>(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            writer: &mut W,
        ) -> Result<()> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(writer),
                Ok(n) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                Err(_) => {
                    WIDE.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        fn with_index<W: WriteBytesExt>(opcode: u8, idx: u16, writer: &mut W) -> Result<()> {
            opcode.serialize(writer)?;
            idx.serialize(writer)
        }

        use Instruction::*;
        match self {
            ILoad(idx) => return load_or_store(*idx, 0x1a, 0x15, writer),
            LLoad(idx) => return load_or_store(*idx, 0x1e, 0x16, writer),
            FLoad(idx) => return load_or_store(*idx, 0x22, 0x17, writer),
            DLoad(idx) => return load_or_store(*idx, 0x26, 0x18, writer),
            ALoad(idx) => return load_or_store(*idx, 0x2a, 0x19, writer),
            IStore(idx) => return load_or_store(*idx, 0x3b, 0x36, writer),
            LStore(idx) => return load_or_store(*idx, 0x3f, 0x37, writer),
            FStore(idx) => return load_or_store(*idx, 0x43, 0x38, writer),
            DStore(idx) => return load_or_store(*idx, 0x47, 0x39, writer),
            AStore(idx) => return load_or_store(*idx, 0x4b, 0x3a, writer),
            BiPush(b) => {
                0x10u8.serialize(writer)?;
                return b.serialize(writer);
            }
            SiPush(s) => {
                0x11u8.serialize(writer)?;
                return s.serialize(writer);
            }
            Ldc(ConstantIndex(idx)) => {
                return match u8::try_from(*idx) {
                    Ok(b) => {
                        0x12u8.serialize(writer)?;
                        b.serialize(writer)
                    }
                    Err(_) => with_index(0x13, *idx, writer),
                }
            }
            Ldc2(ConstantIndex(idx)) => return with_index(0x14, *idx, writer),
            IInc(idx, diff) => {
                return match (u8::try_from(*idx), i8::try_from(*diff)) {
                    (Ok(b), Ok(d)) => {
                        0x84u8.serialize(writer)?;
                        b.serialize(writer)?;
                        d.serialize(writer)
                    }
                    _ => {
                        WIDE.serialize(writer)?;
                        0x84u8.serialize(writer)?;
                        idx.serialize(writer)?;
                        diff.serialize(writer)
                    }
                }
            }
            GetStatic(ConstantIndex(idx)) => return with_index(0xb2, *idx, writer),
            PutStatic(ConstantIndex(idx)) => return with_index(0xb3, *idx, writer),
            GetField(ConstantIndex(idx)) => return with_index(0xb4, *idx, writer),
            PutField(ConstantIndex(idx)) => return with_index(0xb5, *idx, writer),
            Invoke(InvokeType::Virtual, ConstantIndex(idx)) => {
                return with_index(0xb6, *idx, writer)
            }
            Invoke(InvokeType::Special, ConstantIndex(idx)) => {
                return with_index(0xb7, *idx, writer)
            }
            Invoke(InvokeType::Static, ConstantIndex(idx)) => {
                return with_index(0xb8, *idx, writer)
            }
            Invoke(InvokeType::Interface(count), ConstantIndex(idx)) => {
                with_index(0xb9, *idx, writer)?;
                count.serialize(writer)?;
                return 0u8.serialize(writer);
            }
            New(class) => return with_index(0xbb, ConstantIndex::from(*class).0, writer),
            NewArray(base_type) => {
                0xbcu8.serialize(writer)?;
                return array_type_code(*base_type).serialize(writer);
            }
            ANewArray(class) => return with_index(0xbd, ConstantIndex::from(*class).0, writer),
            CheckCast(class) => return with_index(0xc0, ConstantIndex::from(*class).0, writer),
            InstanceOf(class) => return with_index(0xc1, ConstantIndex::from(*class).0, writer),
            MultiANewArray(class, dims) => {
                with_index(0xc5, ConstantIndex::from(*class).0, writer)?;
                return dims.serialize(writer);
            }
            _ => (),
        }

        let opcode: u8 = match self {
            Nop => 0x00,
            AConstNull => 0x01,
            IConstM1 => 0x02,
            IConst0 => 0x03,
            IConst1 => 0x04,
            IConst2 => 0x05,
            IConst3 => 0x06,
            IConst4 => 0x07,
            IConst5 => 0x08,
            LConst0 => 0x09,
            LConst1 => 0x0a,
            FConst0 => 0x0b,
            FConst1 => 0x0c,
            FConst2 => 0x0d,
            DConst0 => 0x0e,
            DConst1 => 0x0f,
            IALoad => 0x2e,
            LALoad => 0x2f,
            FALoad => 0x30,
            DALoad => 0x31,
            AALoad => 0x32,
            BALoad => 0x33,
            CALoad => 0x34,
            SALoad => 0x35,
            IAStore => 0x4f,
            LAStore => 0x50,
            FAStore => 0x51,
            DAStore => 0x52,
            AAStore => 0x53,
            BAStore => 0x54,
            CAStore => 0x55,
            SAStore => 0x56,
            Pop => 0x57,
            Pop2 => 0x58,
            Dup => 0x59,
            DupX1 => 0x5a,
            DupX2 => 0x5b,
            Dup2 => 0x5c,
            Dup2X1 => 0x5d,
            Dup2X2 => 0x5e,
            Swap => 0x5f,
            IAdd => 0x60,
            LAdd => 0x61,
            FAdd => 0x62,
            DAdd => 0x63,
            ISub => 0x64,
            LSub => 0x65,
            FSub => 0x66,
            DSub => 0x67,
            IMul => 0x68,
            LMul => 0x69,
            FMul => 0x6a,
            DMul => 0x6b,
            IDiv => 0x6c,
            LDiv => 0x6d,
            FDiv => 0x6e,
            DDiv => 0x6f,
            IRem => 0x70,
            LRem => 0x71,
            FRem => 0x72,
            DRem => 0x73,
            INeg => 0x74,
            LNeg => 0x75,
            FNeg => 0x76,
            DNeg => 0x77,
            ISh(ShiftType::Left) => 0x78,
            LSh(ShiftType::Left) => 0x79,
            ISh(ShiftType::ArithmeticRight) => 0x7a,
            LSh(ShiftType::ArithmeticRight) => 0x7b,
            ISh(ShiftType::LogicalRight) => 0x7c,
            LSh(ShiftType::LogicalRight) => 0x7d,
            IAnd => 0x7e,
            LAnd => 0x7f,
            IOr => 0x80,
            LOr => 0x81,
            IXor => 0x82,
            LXor => 0x83,
            I2L => 0x85,
            I2F => 0x86,
            I2D => 0x87,
            L2I => 0x88,
            L2F => 0x89,
            L2D => 0x8a,
            F2I => 0x8b,
            F2L => 0x8c,
            F2D => 0x8d,
            D2I => 0x8e,
            D2L => 0x8f,
            D2F => 0x90,
            I2B => 0x91,
            I2C => 0x92,
            I2S => 0x93,
            LCmp => 0x94,
            FCmp(CompareMode::L) => 0x95,
            FCmp(CompareMode::G) => 0x96,
            DCmp(CompareMode::L) => 0x97,
            DCmp(CompareMode::G) => 0x98,
            ArrayLength => 0xbe,
            _ => unreachable!("instructions with operands are serialized above"),
        };
        opcode.serialize(writer)
    }
}

/// The `wide` prefix
pub const WIDE: u8 = 0xc4;

/// Operand of `newarray` for each primitive element type
pub const fn array_type_code(base_type: BaseType) -> u8 {
    match base_type {
        BaseType::Boolean => 4,
        BaseType::Char => 5,
        BaseType::Float => 6,
        BaseType::Double => 7,
        BaseType::Byte => 8,
        BaseType::Short => 9,
        BaseType::Int => 10,
        BaseType::Long => 11,
    }
}

/// Branching JVM bytecode instruction
///
/// Labels are abstract while code is being emitted (the emitter writes placeholder offsets and
/// patches them when the label is placed). Decoded code uses absolute code positions instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),
    GotoW(Lbl),
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl: Copy> BranchInstruction<Lbl> {
    /// Can execution continue with the next instruction?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(_, _)
                | BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::IfNull(_, _)
        )
    }

    /// Every label the instruction might jump to
    pub fn jump_targets(&self) -> Vec<Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::GotoW(lbl) => vec![*lbl],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().copied());
                ts
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().map(|(_, target)| *target));
                ts
            }
            _ => vec![],
        }
    }
}

impl<Lbl> BranchInstruction<Lbl> {
    /// Stack slots consumed by the instruction
    pub fn stack_pops(&self) -> u16 {
        match self {
            BranchInstruction::Goto(_) | BranchInstruction::GotoW(_) | BranchInstruction::Return => 0,
            BranchInstruction::If(_, _)
            | BranchInstruction::IfNull(_, _)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn
            | BranchInstruction::FReturn
            | BranchInstruction::AReturn
            | BranchInstruction::AThrow => 1,
            BranchInstruction::IfICmp(_, _)
            | BranchInstruction::IfACmp(_, _)
            | BranchInstruction::LReturn
            | BranchInstruction::DReturn => 2,
        }
    }

    /// Opcode of a conditional branch or `goto`
    pub fn jump_opcode(&self) -> Option<u8> {
        let opcode = match self {
            BranchInstruction::If(comp, _) => match comp {
                OrdComparison::EQ => 0x99,
                OrdComparison::NE => 0x9a,
                OrdComparison::LT => 0x9b,
                OrdComparison::GE => 0x9c,
                OrdComparison::GT => 0x9d,
                OrdComparison::LE => 0x9e,
            },
            BranchInstruction::IfICmp(comp, _) => match comp {
                OrdComparison::EQ => 0x9f,
                OrdComparison::NE => 0xa0,
                OrdComparison::LT => 0xa1,
                OrdComparison::GE => 0xa2,
                OrdComparison::GT => 0xa3,
                OrdComparison::LE => 0xa4,
            },
            BranchInstruction::IfACmp(EqComparison::EQ, _) => 0xa5,
            BranchInstruction::IfACmp(EqComparison::NE, _) => 0xa6,
            BranchInstruction::Goto(_) => 0xa7,
            BranchInstruction::IfNull(EqComparison::EQ, _) => 0xc6,
            BranchInstruction::IfNull(EqComparison::NE, _) => 0xc7,
            BranchInstruction::GotoW(_) => 0xc8,
            _ => return None,
        };
        Some(opcode)
    }

    /// Opcode of an instruction without jump targets
    pub fn terminal_opcode(&self) -> Option<u8> {
        let opcode = match self {
            BranchInstruction::IReturn => 0xac,
            BranchInstruction::LReturn => 0xad,
            BranchInstruction::FReturn => 0xae,
            BranchInstruction::DReturn => 0xaf,
            BranchInstruction::AReturn => 0xb0,
            BranchInstruction::Return => 0xb1,
            BranchInstruction::AThrow => 0xbf,
            _ => return None,
        };
        Some(opcode)
    }
}

impl<Lbl: Clone> BranchInstruction<Lbl> {
    /// Conditional branch testing the opposite condition, with the same target
    pub fn negated(&self) -> Option<BranchInstruction<Lbl>> {
        match self {
            BranchInstruction::If(op, lbl) => Some(BranchInstruction::If(!*op, lbl.clone())),
            BranchInstruction::IfICmp(op, lbl) => {
                Some(BranchInstruction::IfICmp(!*op, lbl.clone()))
            }
            BranchInstruction::IfACmp(op, lbl) => {
                Some(BranchInstruction::IfACmp(!*op, lbl.clone()))
            }
            BranchInstruction::IfNull(op, lbl) => {
                Some(BranchInstruction::IfNull(!*op, lbl.clone()))
            }
            _ => None,
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl OrdComparison {
    /// Comparison that holds when the operands are swapped (`a < b` iff `b > a`)
    pub const fn flip(self) -> OrdComparison {
        match self {
            OrdComparison::EQ => OrdComparison::EQ,
            OrdComparison::NE => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LE,
            OrdComparison::GT => OrdComparison::LT,
            OrdComparison::LE => OrdComparison::GE,
            OrdComparison::LT => OrdComparison::GT,
        }
    }
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

#[cfg(test)]
mod test {
    use super::*;

    fn bytes(insn: SerializableInstruction) -> Vec<u8> {
        let mut out = vec![];
        insn.serialize(&mut out).unwrap();
        assert_eq!(out.len(), insn.width(), "width of {:?}", insn);
        out
    }

    #[test]
    fn local_slot_encodings() {
        assert_eq!(bytes(Instruction::ILoad(2)), vec![0x1c]);
        assert_eq!(bytes(Instruction::ILoad(7)), vec![0x15, 7]);
        assert_eq!(bytes(Instruction::DStore(300)), vec![WIDE, 0x39, 0x01, 0x2c]);
        assert_eq!(bytes(Instruction::AStore(0)), vec![0x4b]);
    }

    #[test]
    fn iinc_goes_wide_for_large_increments() {
        assert_eq!(bytes(Instruction::IInc(1, 5)), vec![0x84, 1, 5]);
        assert_eq!(
            bytes(Instruction::IInc(1, 1000)),
            vec![WIDE, 0x84, 0, 1, 0x03, 0xe8]
        );
        assert_eq!(
            bytes(Instruction::IInc(256, -1)),
            vec![WIDE, 0x84, 1, 0, 0xff, 0xff]
        );
    }

    #[test]
    fn ldc_picks_short_index_form() {
        assert_eq!(bytes(Instruction::Ldc(ConstantIndex(4))), vec![0x12, 4]);
        assert_eq!(
            bytes(Instruction::Ldc(ConstantIndex(300))),
            vec![0x13, 0x01, 0x2c]
        );
    }

    #[test]
    fn invoke_stack_effects() {
        let insn: Instruction<(), (), (), (u16, u16)> =
            Instruction::Invoke(InvokeType::Virtual, (3, 2));
        assert_eq!(insn.stack_effect(|_| 0, |m| *m), effect(4, 2));
        let insn: Instruction<(), (), (), (u16, u16)> =
            Instruction::Invoke(InvokeType::Static, (3, 0));
        assert_eq!(insn.stack_effect(|_| 0, |m| *m), effect(3, 0));
    }

    #[test]
    fn negating_branches() {
        let branch = BranchInstruction::If(OrdComparison::LT, 7usize);
        assert_eq!(
            branch.negated(),
            Some(BranchInstruction::If(OrdComparison::GE, 7))
        );
        assert_eq!(BranchInstruction::Goto(3usize).negated(), None);
        assert_eq!(OrdComparison::LT.flip(), OrdComparison::GT);
    }
}
