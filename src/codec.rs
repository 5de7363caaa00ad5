use std::{
    fmt::Debug,
    io::{self, Cursor, Error, ErrorKind, Read, Write},
    ops::{Deref, DerefMut},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use paste::paste;

pub use jdwp_instances_macros::{JdwpReadable, JdwpWritable};

use crate::protocol::virtual_machine::IDSizeInfo;

#[derive(Debug)]
pub struct JdwpWriter<W: Write> {
    write: W,
    pub(crate) id_sizes: IDSizeInfo,
}

impl<W: Write> JdwpWriter<W> {
    pub(crate) fn new(write: W, id_sizes: IDSizeInfo) -> Self {
        Self { write, id_sizes }
    }
}

impl<W: Write> Deref for JdwpWriter<W> {
    type Target = W;

    fn deref(&self) -> &Self::Target {
        &self.write
    }
}

impl<W: Write> DerefMut for JdwpWriter<W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.write
    }
}

#[derive(Debug)]
pub struct JdwpReader<R: Read> {
    read: R,
    pub(crate) id_sizes: IDSizeInfo,
}

impl<R: Read> JdwpReader<R> {
    pub(crate) fn new(read: R, id_sizes: IDSizeInfo) -> Self {
        Self { read, id_sizes }
    }
}

impl<R: Read> Deref for JdwpReader<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<R: Read> DerefMut for JdwpReader<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.read
    }
}

pub trait JdwpReadable: Sized {
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self>;
}

pub trait JdwpWritable {
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()>;
}

/// Encodes a value the way it would appear inside of a packet body, using the
/// given ID sizes.
///
/// Mostly useful for writing fake JDWP peers.
pub fn encode<T: JdwpWritable + ?Sized>(value: &T, id_sizes: IDSizeInfo) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    value.write(&mut JdwpWriter::new(&mut bytes, id_sizes))?;
    Ok(bytes)
}

/// The inverse of [encode].
///
/// Trailing bytes are not an error, JDWP replies are allowed to be extended
/// by newer protocol versions.
pub fn decode<T: JdwpReadable>(bytes: &[u8], id_sizes: IDSizeInfo) -> io::Result<T> {
    T::read(&mut JdwpReader::new(Cursor::new(bytes), id_sizes))
}

impl JdwpReadable for () {
    #[inline]
    fn read<R: Read>(_: &mut JdwpReader<R>) -> io::Result<Self> {
        Ok(())
    }
}

impl JdwpWritable for () {
    #[inline]
    fn write<W: Write>(&self, _: &mut JdwpWriter<W>) -> io::Result<()> {
        Ok(())
    }
}

impl JdwpReadable for bool {
    #[inline]
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        read.read_u8().map(|n| n != 0)
    }
}

impl JdwpWritable for bool {
    #[inline]
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        write.write_u8(u8::from(*self))
    }
}

// read/write + i8/u8 methods do not have the endianness generic, eh

impl JdwpReadable for u8 {
    #[inline]
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        read.read_u8()
    }
}

impl JdwpWritable for u8 {
    #[inline]
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        write.write_u8(*self)
    }
}

macro_rules! int_io {
    ($($types:ident),* $(,)?) => {
        $(
            impl JdwpReadable for $types {
                #[inline]
                fn read<R: Read>(reader: &mut JdwpReader<R>) -> io::Result<Self> {
                    paste! {
                        reader.[<read_ $types>]::<BigEndian>()
                    }
                }
            }

            impl JdwpWritable for $types {
                #[inline]
                fn write<W: Write>(&self, writer: &mut JdwpWriter<W>) -> io::Result<()> {
                    paste! {
                        writer.[<write_ $types>]::<BigEndian>(*self)
                    }
                }
            }
        )*
    };
}

int_io![i16, u16, i32, u32, i64, u64];

// JDWP strings are in the JVM "modified UTF-8", which is CESU-8 with the
// zero byte encoded as two bytes
impl JdwpReadable for String {
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        let mut bytes = vec![0; u32::read(read)? as usize];
        read.read_exact(&mut bytes)?;
        cesu8::from_java_cesu8(&bytes)
            .map(|s| s.into_owned())
            .map_err(|_| Error::from(ErrorKind::InvalidData))
    }
}

impl JdwpWritable for str {
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        let bytes = cesu8::to_java_cesu8(self);
        (bytes.len() as u32).write(write)?;
        write.write_all(&bytes)
    }
}

impl JdwpWritable for String {
    #[inline]
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        self.as_str().write(write)
    }
}

impl<T: JdwpReadable> JdwpReadable for Vec<T> {
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        let len = i32::read(read)?;
        let len = usize::try_from(len).map_err(|_| Error::from(ErrorKind::InvalidData))?;
        // the length comes from the wire, do not let it preallocate gigabytes
        let mut res = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            res.push(T::read(read)?);
        }
        Ok(res)
    }
}

// only writable to allow using slices as command arguments
impl<T: JdwpWritable> JdwpWritable for [T] {
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        (self.len() as u32).write(write)?;
        for item in self {
            item.write(write)?;
        }
        Ok(())
    }
}

impl<T: JdwpWritable> JdwpWritable for Vec<T> {
    #[inline]
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        self.as_slice().write(write)
    }
}

impl<A: JdwpReadable, B: JdwpReadable> JdwpReadable for (A, B) {
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        Ok((A::read(read)?, B::read(read)?))
    }
}

impl<A: JdwpWritable, B: JdwpWritable> JdwpWritable for (A, B) {
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        self.0.write(write)?;
        self.1.write(write)
    }
}
