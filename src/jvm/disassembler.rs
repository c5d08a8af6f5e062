//! Decode method bodies back into instructions
//!
//! This is the inverse of what `CodeBuilder` does, restricted to the instructions it emits. Branch
//! targets come out as absolute code positions. On top of decoding, `simulate_stack` re-derives
//! the operand stack depth at every reachable instruction, which is how emitted code gets checked.

use super::*;
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::io::{self, Error, ErrorKind, Result};

/// One decoded instruction
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    /// Position of the opcode
    pub position: usize,

    /// Number of bytes taken (including `wide` prefixes and switch padding)
    pub width: usize,

    pub instruction: DecodedInstruction,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecodedInstruction {
    Plain(SerializableInstruction),
    Branch(BranchInstruction<usize>),
}

fn invalid(position: usize, message: impl fmt::Display) -> Error {
    Error::new(
        ErrorKind::InvalidData,
        format!("at {}: {}", position, message),
    )
}

struct Reader<'a> {
    code: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    /// Run `read` on the bytes left, moving past whatever it consumed
    fn read<T>(&mut self, read: impl FnOnce(&mut &'a [u8]) -> io::Result<T>) -> Result<T> {
        let mut rest = self.code.get(self.position..).unwrap_or(&[]);
        let value = read(&mut rest).map_err(|_| invalid(self.position, "truncated instruction"))?;
        self.position = self.code.len() - rest.len();
        Ok(value)
    }

    fn u8(&mut self) -> Result<u8> {
        self.read(|rest| rest.read_u8())
    }

    fn i8(&mut self) -> Result<i8> {
        self.read(|rest| rest.read_i8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.read(|rest| rest.read_u16::<BigEndian>())
    }

    fn i16(&mut self) -> Result<i16> {
        self.read(|rest| rest.read_i16::<BigEndian>())
    }

    fn i32(&mut self) -> Result<i32> {
        self.read(|rest| rest.read_i32::<BigEndian>())
    }
}

fn target(start: usize, offset: isize) -> Result<usize> {
    usize::try_from(start as isize + offset).map_err(|_| invalid(start, "jump before the code"))
}

fn ord_comparison(n: u8) -> OrdComparison {
    match n {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

fn local_instruction(kind: u8, idx: u16) -> SerializableInstruction {
    match kind {
        0x15 => Instruction::ILoad(idx),
        0x16 => Instruction::LLoad(idx),
        0x17 => Instruction::FLoad(idx),
        0x18 => Instruction::DLoad(idx),
        0x19 => Instruction::ALoad(idx),
        0x36 => Instruction::IStore(idx),
        0x37 => Instruction::LStore(idx),
        0x38 => Instruction::FStore(idx),
        0x39 => Instruction::DStore(idx),
        _ => Instruction::AStore(idx),
    }
}

fn base_type(code: u8, position: usize) -> Result<BaseType> {
    Ok(match code {
        4 => BaseType::Boolean,
        5 => BaseType::Char,
        6 => BaseType::Float,
        7 => BaseType::Double,
        8 => BaseType::Byte,
        9 => BaseType::Short,
        10 => BaseType::Int,
        11 => BaseType::Long,
        other => return Err(invalid(position, format!("bad array type {}", other))),
    })
}

/// Opcodes without operands, in opcode order starting at `0x00`
const SIMPLE_LOW: [SerializableInstruction; 16] = [
    Instruction::Nop,
    Instruction::AConstNull,
    Instruction::IConstM1,
    Instruction::IConst0,
    Instruction::IConst1,
    Instruction::IConst2,
    Instruction::IConst3,
    Instruction::IConst4,
    Instruction::IConst5,
    Instruction::LConst0,
    Instruction::LConst1,
    Instruction::FConst0,
    Instruction::FConst1,
    Instruction::FConst2,
    Instruction::DConst0,
    Instruction::DConst1,
];

fn simple(opcode: u8) -> Option<SerializableInstruction> {
    use Instruction::*;
    let insn = match opcode {
        0x00..=0x0f => SIMPLE_LOW[opcode as usize].clone(),
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => ISh(ShiftType::Left),
        0x79 => LSh(ShiftType::Left),
        0x7a => ISh(ShiftType::ArithmeticRight),
        0x7b => LSh(ShiftType::ArithmeticRight),
        0x7c => ISh(ShiftType::LogicalRight),
        0x7d => LSh(ShiftType::LogicalRight),
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmp(CompareMode::L),
        0x96 => FCmp(CompareMode::G),
        0x97 => DCmp(CompareMode::L),
        0x98 => DCmp(CompareMode::G),
        0xbe => ArrayLength,
        _ => return None,
    };
    Some(insn)
}

fn decode_one(reader: &mut Reader<'_>) -> Result<DecodedInstruction> {
    use DecodedInstruction::{Branch, Plain};
    let start = reader.position;
    let opcode = reader.u8()?;

    if let Some(insn) = simple(opcode) {
        return Ok(Plain(insn));
    }

    let decoded = match opcode {
        0x10 => Plain(Instruction::BiPush(reader.i8()?)),
        0x11 => Plain(Instruction::SiPush(reader.i16()?)),
        0x12 => Plain(Instruction::Ldc(ConstantIndex(reader.u8()? as u16))),
        0x13 => Plain(Instruction::Ldc(ConstantIndex(reader.u16()?))),
        0x14 => Plain(Instruction::Ldc2(ConstantIndex(reader.u16()?))),
        0x15..=0x19 | 0x36..=0x3a => Plain(local_instruction(opcode, reader.u8()? as u16)),
        0x1a..=0x2d => {
            let n = opcode - 0x1a;
            Plain(local_instruction(0x15 + n / 4, (n % 4) as u16))
        }
        0x3b..=0x4e => {
            let n = opcode - 0x3b;
            Plain(local_instruction(0x36 + n / 4, (n % 4) as u16))
        }
        0x84 => {
            let idx = reader.u8()? as u16;
            Plain(Instruction::IInc(idx, reader.i8()? as i16))
        }
        0x99..=0x9e => {
            let offset = reader.i16()? as isize;
            Branch(BranchInstruction::If(
                ord_comparison(opcode - 0x99),
                target(start, offset)?,
            ))
        }
        0x9f..=0xa4 => {
            let offset = reader.i16()? as isize;
            Branch(BranchInstruction::IfICmp(
                ord_comparison(opcode - 0x9f),
                target(start, offset)?,
            ))
        }
        0xa5 | 0xa6 | 0xc6 | 0xc7 => {
            let offset = reader.i16()? as isize;
            let comparison = if opcode % 2 == 1 {
                EqComparison::EQ
            } else {
                EqComparison::NE
            };
            let to = target(start, offset)?;
            if opcode < 0xc6 {
                Branch(BranchInstruction::IfACmp(comparison, to))
            } else {
                Branch(BranchInstruction::IfNull(comparison, to))
            }
        }
        0xa7 => {
            let offset = reader.i16()? as isize;
            Branch(BranchInstruction::Goto(target(start, offset)?))
        }
        0xc8 => {
            let offset = reader.i32()? as isize;
            Branch(BranchInstruction::GotoW(target(start, offset)?))
        }
        0xaa | 0xab => {
            reader.position += switch_padding(start);
            let default = target(start, reader.i32()? as isize)?;
            if opcode == 0xaa {
                let low = reader.i32()?;
                let high = reader.i32()?;
                if high < low {
                    return Err(invalid(start, "empty tableswitch"));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(target(start, reader.i32()? as isize)?);
                }
                Branch(BranchInstruction::TableSwitch {
                    default,
                    low,
                    targets,
                })
            } else {
                let count = reader.i32()?;
                let mut targets = vec![];
                for _ in 0..count {
                    let key = reader.i32()?;
                    targets.push((key, target(start, reader.i32()? as isize)?));
                }
                Branch(BranchInstruction::LookupSwitch { default, targets })
            }
        }
        0xac => Branch(BranchInstruction::IReturn),
        0xad => Branch(BranchInstruction::LReturn),
        0xae => Branch(BranchInstruction::FReturn),
        0xaf => Branch(BranchInstruction::DReturn),
        0xb0 => Branch(BranchInstruction::AReturn),
        0xb1 => Branch(BranchInstruction::Return),
        0xbf => Branch(BranchInstruction::AThrow),
        0xb2 => Plain(Instruction::GetStatic(ConstantIndex(reader.u16()?))),
        0xb3 => Plain(Instruction::PutStatic(ConstantIndex(reader.u16()?))),
        0xb4 => Plain(Instruction::GetField(ConstantIndex(reader.u16()?))),
        0xb5 => Plain(Instruction::PutField(ConstantIndex(reader.u16()?))),
        0xb6 => Plain(Instruction::Invoke(InvokeType::Virtual, ConstantIndex(reader.u16()?))),
        0xb7 => Plain(Instruction::Invoke(InvokeType::Special, ConstantIndex(reader.u16()?))),
        0xb8 => Plain(Instruction::Invoke(InvokeType::Static, ConstantIndex(reader.u16()?))),
        0xb9 => {
            let idx = ConstantIndex(reader.u16()?);
            let count = reader.u8()?;
            let _zero = reader.u8()?;
            Plain(Instruction::Invoke(InvokeType::Interface(count), idx))
        }
        0xbb | 0xbd | 0xc0 | 0xc1 | 0xc5 => {
            let class = ClassConstantIndex::from_raw(ConstantIndex(reader.u16()?));
            Plain(match opcode {
                0xbb => Instruction::New(class),
                0xbd => Instruction::ANewArray(class),
                0xc0 => Instruction::CheckCast(class),
                0xc1 => Instruction::InstanceOf(class),
                _ => Instruction::MultiANewArray(class, reader.u8()?),
            })
        }
        0xbc => Plain(Instruction::NewArray(base_type(reader.u8()?, start)?)),
        WIDE => {
            let modified = reader.u8()?;
            let idx = reader.u16()?;
            match modified {
                0x15..=0x19 | 0x36..=0x3a => Plain(local_instruction(modified, idx)),
                0x84 => Plain(Instruction::IInc(idx, reader.i16()?)),
                other => {
                    return Err(invalid(start, format!("cannot widen opcode {:#04x}", other)))
                }
            }
        }
        other => return Err(invalid(start, format!("unknown opcode {:#04x}", other))),
    };
    Ok(decoded)
}

/// Decode a whole method body
pub fn decode(code: &[u8]) -> Result<Vec<Decoded>> {
    let mut reader = Reader { code, position: 0 };
    let mut decoded = vec![];
    while reader.position < code.len() {
        let position = reader.position;
        let instruction = decode_one(&mut reader)?;
        decoded.push(Decoded {
            position,
            width: reader.position - position,
            instruction,
        });
    }
    Ok(decoded)
}

fn member_slots(constants: &ConstantsPool, member: ConstantIndex) -> Result<(u16, u16)> {
    let descriptor = constants
        .member_descriptor(member)
        .ok_or_else(|| invalid(0, format!("constant {} is not a member", member.0)))?;
    if descriptor.starts_with('(') {
        let method = MethodDescriptor::<String>::parse(descriptor)?;
        Ok((
            method.parameter_length(false) as u16,
            method.return_length() as u16,
        ))
    } else {
        let field = FieldType::<String>::parse(descriptor)?;
        Ok((0, crate::util::Width::width(&field) as u16))
    }
}

/// Re-derive the stack depth at every reachable instruction, returning the largest depth seen
///
/// Fails if the stack underflows, if two paths reach an instruction with different depths, or if
/// a jump lands anywhere but on the start of an instruction.
pub fn simulate_stack(
    code: &[u8],
    exception_table: &[ExceptionTableEntry],
    constants: &ConstantsPool,
) -> Result<u16> {
    let decoded = decode(code)?;
    let index_of: BTreeMap<usize, usize> = decoded
        .iter()
        .enumerate()
        .map(|(idx, insn)| (insn.position, idx))
        .collect();

    let mut depths: Vec<Option<u16>> = vec![None; decoded.len()];
    let mut worklist: Vec<(usize, u16)> = vec![(0, 0)];
    worklist.extend(exception_table.iter().map(|entry| (entry.handler, 1)));
    let mut max_depth = 0;

    while let Some((position, depth)) = worklist.pop() {
        if position == code.len() && code.is_empty() {
            break;
        }
        let idx = *index_of
            .get(&position)
            .ok_or_else(|| invalid(position, "jump into the middle of an instruction"))?;
        match depths[idx] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                return Err(invalid(
                    position,
                    format!("reached with depths {} and {}", seen, depth),
                ))
            }
            None => depths[idx] = Some(depth),
        }
        max_depth = max_depth.max(depth);

        let insn = &decoded[idx];
        let next = insn.position + insn.width;
        match &insn.instruction {
            DecodedInstruction::Plain(plain) => {
                let (arguments, returns) = match plain {
                    Instruction::GetStatic(member)
                    | Instruction::PutStatic(member)
                    | Instruction::GetField(member)
                    | Instruction::PutField(member)
                    | Instruction::Invoke(_, member) => member_slots(constants, *member)?,
                    _ => (0, 0),
                };
                let effect = plain.stack_effect(|_| returns, |_| (arguments, returns));
                if effect.pops > depth {
                    return Err(invalid(position, "stack underflow"));
                }
                let after = depth - effect.pops + effect.pushes;
                max_depth = max_depth.max(after);
                if next >= code.len() {
                    return Err(invalid(position, "falls off the end of the code"));
                }
                worklist.push((next, after));
            }
            DecodedInstruction::Branch(branch) => {
                let pops = branch.stack_pops();
                if pops > depth {
                    return Err(invalid(position, "stack underflow"));
                }
                let after = depth - pops;
                for to in branch.jump_targets() {
                    worklist.push((to, after));
                }
                if branch.falls_through() {
                    worklist.push((next, after));
                }
            }
        }
    }
    Ok(max_depth)
}

/// Pretty-print a method body, resolving pool references where that helps
pub fn render(code: &[u8], constants: &ConstantsPool) -> Result<String> {
    use std::fmt::Write;
    let mut out = String::new();
    for insn in decode(code)? {
        let text = match &insn.instruction {
            DecodedInstruction::Plain(plain) => match plain {
                Instruction::GetStatic(member)
                | Instruction::PutStatic(member)
                | Instruction::GetField(member)
                | Instruction::PutField(member)
                | Instruction::Invoke(_, member) => format!(
                    "{:?} {}.{}:{}",
                    plain,
                    constants.member_class(*member).unwrap_or("?"),
                    constants.member_name(*member).unwrap_or("?"),
                    constants.member_descriptor(*member).unwrap_or("?"),
                ),
                Instruction::Ldc(constant) | Instruction::Ldc2(constant) => {
                    match constants.get(*constant) {
                        Some(Constant::String(_)) => format!(
                            "{:?} {:?}",
                            plain,
                            constants.string_value(*constant).unwrap_or("")
                        ),
                        Some(Constant::Integer(i)) => format!("{:?} {}", plain, i),
                        Some(Constant::Long(l)) => format!("{:?} {}L", plain, l),
                        Some(Constant::Float(f)) => format!("{:?} {}f", plain, f),
                        Some(Constant::Double(d)) => format!("{:?} {}d", plain, d),
                        _ => format!("{:?}", plain),
                    }
                }
                Instruction::New(class)
                | Instruction::ANewArray(class)
                | Instruction::CheckCast(class)
                | Instruction::InstanceOf(class)
                | Instruction::MultiANewArray(class, _) => format!(
                    "{:?} {}",
                    plain,
                    constants
                        .class_name(ConstantIndex::from(*class))
                        .unwrap_or("?")
                ),
                _ => format!("{:?}", plain),
            },
            DecodedInstruction::Branch(branch) => format!("{:?}", branch),
        };
        let _ = writeln!(out, "{:>6}: {}", insn.position, text);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_what_the_builder_writes() {
        let mut pool = ConstantsPool::new();
        let mut code = CodeBuilder::new(&mut pool, false, 65535);
        let end = code.fresh_label();
        code.push_instruction(Instruction::ILoad(300)).unwrap();
        code.push_instruction(Instruction::IConst5).unwrap();
        code.push_branch(BranchInstruction::IfICmp(OrdComparison::GT, end))
            .unwrap();
        code.push_instruction(Instruction::IInc(2, 1000)).unwrap();
        code.place_label(end).unwrap();
        code.push_branch(BranchInstruction::Return).unwrap();
        let method = code.build().unwrap();

        let decoded: Vec<DecodedInstruction> = decode(&method.code)
            .unwrap()
            .into_iter()
            .map(|d| d.instruction)
            .collect();
        assert_eq!(
            decoded,
            vec![
                DecodedInstruction::Plain(Instruction::ILoad(300)),
                DecodedInstruction::Plain(Instruction::IConst5),
                DecodedInstruction::Branch(BranchInstruction::IfICmp(OrdComparison::GT, 14)),
                DecodedInstruction::Plain(Instruction::IInc(2, 1000)),
                DecodedInstruction::Branch(BranchInstruction::Return),
            ]
        );
    }

    #[test]
    fn operands_are_signed_big_endian() {
        // sipush -2, goto -3
        let decoded = decode(&[0x11, 0xff, 0xfe, 0xa7, 0xff, 0xfd]).unwrap();
        assert_eq!(
            decoded[0].instruction,
            DecodedInstruction::Plain(Instruction::SiPush(-2))
        );
        assert_eq!(
            decoded[1].instruction,
            DecodedInstruction::Branch(BranchInstruction::Goto(0))
        );
        assert_eq!(decoded[1].width, 3);
    }

    #[test]
    fn truncated_operands_are_rejected() {
        assert!(decode(&[0x11, 0xff]).is_err());
        // tableswitch at 0 with padding and a default, but no bounds
        assert!(decode(&[0xaa, 0, 0, 0, 0, 0, 0, 8]).is_err());
    }

    #[test]
    fn simulation_catches_mismatched_depths() {
        let pool = ConstantsPool::new();
        // iconst_0, ifeq +4, iconst_1, iconst_0, return
        let code = vec![0x03, 0x99, 0x00, 0x04, 0x04, 0x03, 0xb1];
        assert!(simulate_stack(&code, &[], &pool).is_err());

        // iconst_0, ifeq +5, iconst_1, pop, return
        let code = vec![0x03, 0x99, 0x00, 0x05, 0x04, 0x57, 0xb1];
        assert_eq!(simulate_stack(&code, &[], &pool).unwrap(), 1);
    }
}
