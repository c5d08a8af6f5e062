use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside method bodies
///
/// Every multi-byte operand in JVM bytecode is big-endian, so implementations always go through
/// `BigEndian`.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

macro_rules! big_endian_serialize {
    ($($typ:ty => $write:ident),* $(,)?) => {
        $(
            impl Serialize for $typ {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }
        )*
    };
}

big_endian_serialize! {
    u16 => write_u16,
    u32 => write_u32,
    i16 => write_i16,
    i32 => write_i32,
}

/// Overwrite a 16-bit jump offset already written into a code buffer
pub fn patch_i16(code: &mut [u8], at: usize, value: i16) {
    BigEndian::write_i16(&mut code[at..at + 2], value)
}

/// Overwrite a 32-bit jump offset already written into a code buffer
pub fn patch_i32(code: &mut [u8], at: usize, value: i32) {
    BigEndian::write_i32(&mut code[at..at + 4], value)
}

/// Read back a 16-bit operand
pub fn read_i16(code: &[u8], at: usize) -> i16 {
    BigEndian::read_i16(&code[at..at + 2])
}

/// Read back a 32-bit operand
pub fn read_i32(code: &[u8], at: usize) -> i32 {
    BigEndian::read_i32(&code[at..at + 4])
}

/// Read back an unsigned 16-bit operand
pub fn read_u16(code: &[u8], at: usize) -> u16 {
    BigEndian::read_u16(&code[at..at + 2])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn patching_is_big_endian() {
        let mut code = vec![];
        0xa7u8.serialize(&mut code).unwrap();
        0i16.serialize(&mut code).unwrap();
        patch_i16(&mut code, 1, -3);
        assert_eq!(code, vec![0xa7, 0xff, 0xfd]);
        assert_eq!(read_i16(&code, 1), -3);

        let mut wide = vec![0xc8, 0, 0, 0, 0];
        patch_i32(&mut wide, 1, 70_000);
        assert_eq!(read_i32(&wide, 1), 70_000);
        assert_eq!(&wide[1..], &[0x00, 0x01, 0x11, 0x70]);
    }
}
