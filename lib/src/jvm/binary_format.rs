use super::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside unit images
///
/// The format follows the conventions of Java class files:
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///   - strings are a `u16` length followed by that many bytes of UTF-8
///
pub trait Serialize {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Inverse of [`Serialize`]
///
/// Reading can fail for reasons other than IO (bad tags, invalid names, etc.), so this produces a
/// full [`Error`].
pub trait Deserialize: Sized {
    /// Read construct from a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error>;
}

/// Fixed-width numbers are big-endian
macro_rules! numeric {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Serialize for $ty {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }

            impl Deserialize for $ty {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
                    Ok(reader.$read::<BigEndian>()?)
                }
            }
        )*
    };
}

numeric! {
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u8()?)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Deserialize for i8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_i8()?)
    }
}

impl Serialize for bool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (*self as u8).serialize(writer)
    }
}

/// Write out a `u16` length prefix
fn write_length<W: WriteBytesExt>(writer: &mut W, length: usize, what: &str) -> Result<()> {
    match u16::try_from(length) {
        Ok(length) => length.serialize(writer),
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} of length {} does not fit a u16 prefix", what, length),
        )),
    }
}

impl Serialize for str {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        write_length(writer, self.len(), "String")?;
        writer.write_all(self.as_bytes())
    }
}

impl Serialize for String {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.as_str().serialize(writer)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        write_length(writer, self.len(), "Sequence")?;
        self.iter().try_for_each(|elem| elem.serialize(writer))
    }
}

/// Presence is a `u8` tag (`0` or `1`)
impl<A: Serialize> Serialize for Option<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            None => 0u8.serialize(writer),
            Some(value) => {
                1u8.serialize(writer)?;
                value.serialize(writer)
            }
        }
    }
}

impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)?;
        self.1.serialize(writer)
    }
}

impl Deserialize for bool {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        match u8::deserialize(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Malformed(format!("Invalid boolean {}", other))),
        }
    }
}

impl Deserialize for String {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        let mut bytes = vec![0; len as usize];
        reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|err| Error::Malformed(format!("Invalid string: {}", err)))
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        (0..len).map(|_| A::deserialize(reader)).collect()
    }
}

impl<A: Deserialize> Deserialize for Option<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        match u8::deserialize(reader)? {
            0 => Ok(None),
            1 => Ok(Some(A::deserialize(reader)?)),
            other => Err(Error::Malformed(format!("Invalid option tag {}", other))),
        }
    }
}

impl<A: Deserialize, B: Deserialize> Deserialize for (A, B) {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok((A::deserialize(reader)?, B::deserialize(reader)?))
    }
}
