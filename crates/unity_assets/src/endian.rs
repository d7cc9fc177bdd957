//! Byte-order aware primitive codec and stream wrappers.
//!
//! Unity files mix byte orders: assets file headers are always big endian while the
//! metadata and object data follow the endianness flag stored in the header. The
//! [`EndianReader`] and [`EndianWriter`] wrappers carry a mutable `big_endian` flag
//! and dispatch every typed read or write on it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Byte order used to encode a primitive
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,

    /// Most significant byte first
    Big,
}

macro_rules! codec_fns {
    ($(($read:ident, $write:ident, $ty:ty, $size:expr)),* $(,)?) => {
        $(
            #[doc = concat!("Decode a `", stringify!($ty), "` from the start of `buf`, if it is long enough.")]
            pub fn $read(self, buf: &[u8]) -> Option<$ty> {
                let buf = buf.get(..$size)?;
                Some(match self {
                    Endian::Big => BigEndian::$read(buf),
                    Endian::Little => LittleEndian::$read(buf),
                })
            }

            #[doc = concat!("Encode a `", stringify!($ty), "` into its byte representation.")]
            pub fn $write(self, value: $ty) -> [u8; $size] {
                let mut buf = [0u8; $size];
                match self {
                    Endian::Big => BigEndian::$write(&mut buf, value),
                    Endian::Little => LittleEndian::$write(&mut buf, value),
                }
                buf
            }
        )*
    };
}

impl Endian {
    /// Select the byte order from a big endian flag
    pub const fn from_big_endian(big_endian: bool) -> Self {
        if big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Whether this is [`Endian::Big`]
    pub const fn is_big(self) -> bool {
        matches!(self, Endian::Big)
    }

    codec_fns!(
        (read_u16, write_u16, u16, 2),
        (read_i16, write_i16, i16, 2),
        (read_u32, write_u32, u32, 4),
        (read_i32, write_i32, i32, 4),
        (read_u64, write_u64, u64, 8),
        (read_i64, write_i64, i64, 8),
        (read_f32, write_f32, f32, 4),
        (read_f64, write_f64, f64, 8),
    );
}

macro_rules! read_fns {
    ($(($name:ident, $ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` in the current byte order")]
            pub fn $name(&mut self) -> Result<$ty> {
                Ok(if self.big_endian {
                    self.inner.$name::<BigEndian>()?
                } else {
                    self.inner.$name::<LittleEndian>()?
                })
            }
        )*
    };
}

macro_rules! write_fns {
    ($(($name:ident, $ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Write a `", stringify!($ty), "` in the current byte order")]
            pub fn $name(&mut self, value: $ty) -> Result<()> {
                if self.big_endian {
                    self.inner.$name::<BigEndian>(value)?
                } else {
                    self.inner.$name::<LittleEndian>(value)?
                }
                Ok(())
            }
        )*
    };
}

/// A typed reader over a seekable byte stream
///
/// ```
/// # fn doit() -> unity_assets::error::Result<()> {
/// use std::io::Cursor;
/// use unity_assets::endian::EndianReader;
///
/// let mut reader = EndianReader::new(Cursor::new(vec![0x00, 0x00, 0x00, 0x2A, 0x07]), true);
/// assert_eq!(reader.read_u32()?, 42);
/// reader.set_big_endian(false);
/// assert_eq!(reader.read_u8()?, 7);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug)]
pub struct EndianReader<R> {
    inner: R,
    big_endian: bool,
}

impl<R> EndianReader<R> {
    /// Wrap a stream, decoding multi-byte values as big endian when `big_endian` is set
    pub fn new(inner: R, big_endian: bool) -> Self {
        EndianReader { inner, big_endian }
    }

    /// Whether values are currently decoded as big endian
    pub const fn big_endian(&self) -> bool {
        self.big_endian
    }

    /// Change the byte order for subsequent reads
    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    /// Get a reference to the wrapped stream
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Get a mutable reference to the wrapped stream
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap and return the inner stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> EndianReader<R> {
    read_fns!(
        (read_u16, u16),
        (read_i16, i16),
        (read_u32, u32),
        (read_i32, i32),
        (read_u64, u64),
        (read_i64, i64),
        (read_f32, f32),
        (read_f64, f64),
    );

    /// Current offset of the stream
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move the stream to an absolute offset
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    /// Read a single signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.inner.read_i8()?)
    }

    /// Read a one byte boolean, any non-zero value is `true`
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read exactly `len` bytes
    ///
    /// The buffer grows as data arrives so a corrupt length fails with an
    /// end-of-stream error instead of a huge allocation.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(buf)
    }

    /// Read a fixed size array of bytes
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Skip forward to the next multiple of `alignment`, which must be a power of two
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        let position = self.position()?;
        let aligned = (position + alignment - 1) & !(alignment - 1);
        if aligned != position {
            self.set_position(aligned)?;
        }
        Ok(())
    }

    /// Skip forward to the next 4 byte boundary
    pub fn align4(&mut self) -> Result<()> {
        self.align(4)
    }

    /// Read bytes prefixed by a one byte length
    pub fn read_count_bytes_u8(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u8()?;
        self.read_bytes(len as usize)
    }

    /// Read bytes prefixed by a two byte length
    pub fn read_count_bytes_u16(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u16()?;
        self.read_bytes(len as usize)
    }

    /// Read bytes prefixed by a signed four byte length
    pub fn read_count_bytes_i32(&mut self) -> Result<Vec<u8>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::InvalidLength(len as i64));
        }
        self.read_bytes(len as usize)
    }

    /// Read a UTF-8 string prefixed by a one byte length
    pub fn read_count_string_u8(&mut self) -> Result<String> {
        let bytes = self.read_count_bytes_u8()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a UTF-8 string prefixed by a two byte length
    pub fn read_count_string_u16(&mut self) -> Result<String> {
        let bytes = self.read_count_bytes_u16()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a UTF-8 string prefixed by a signed four byte length
    pub fn read_count_string_i32(&mut self) -> Result<String> {
        let bytes = self.read_count_bytes_i32()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read bytes up to and consuming a zero terminator
    pub fn read_null_terminated_bytes(&mut self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == b'\0' {
                break;
            }
            raw.push(byte);
        }
        Ok(raw)
    }

    /// Read a zero terminated UTF-8 string
    pub fn read_null_terminated(&mut self) -> Result<String> {
        let raw = self.read_null_terminated_bytes()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl<R: Read> Read for EndianReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for EndianReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// A typed writer over a seekable byte stream
///
/// ```
/// # fn doit() -> unity_assets::error::Result<()> {
/// use std::io::Cursor;
/// use unity_assets::endian::EndianWriter;
///
/// let mut writer = EndianWriter::new(Cursor::new(Vec::new()), false);
/// writer.write_u8(1)?;
/// writer.align4()?;
/// writer.write_u16(0x0102)?;
/// assert_eq!(writer.into_inner().into_inner(), vec![1, 0, 0, 0, 2, 1]);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug)]
pub struct EndianWriter<W> {
    inner: W,
    big_endian: bool,
}

impl<W> EndianWriter<W> {
    /// Wrap a stream, encoding multi-byte values as big endian when `big_endian` is set
    pub fn new(inner: W, big_endian: bool) -> Self {
        EndianWriter { inner, big_endian }
    }

    /// Whether values are currently encoded as big endian
    pub const fn big_endian(&self) -> bool {
        self.big_endian
    }

    /// Change the byte order for subsequent writes
    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    /// Get a reference to the wrapped stream
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Get a mutable reference to the wrapped stream
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap and return the inner stream
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> EndianWriter<W> {
    write_fns!(
        (write_u16, u16),
        (write_i16, i16),
        (write_u32, u32),
        (write_i32, i32),
        (write_u64, u64),
        (write_i64, i64),
        (write_f32, f32),
        (write_f64, f64),
    );

    /// Current offset of the stream
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move the stream to an absolute offset
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    /// Write a single signed byte
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.inner.write_i8(value)?)
    }

    /// Write a one byte boolean
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(bytes)?)
    }

    /// Write zero bytes until the position is a multiple of `alignment`
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        let position = self.position()?;
        let padding = (alignment - position % alignment) % alignment;
        if padding > 0 {
            io::copy(&mut io::repeat(0).take(padding), &mut self.inner)?;
        }
        Ok(())
    }

    /// Write zero bytes up to the next 4 byte boundary
    pub fn align4(&mut self) -> Result<()> {
        self.align(4)
    }

    /// Write bytes prefixed by a one byte length
    pub fn write_count_bytes_u8(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u8::try_from(bytes.len()).map_err(|_| Error::StringTooLong {
            length: bytes.len(),
            width: 1,
        })?;
        self.write_u8(len)?;
        self.write_bytes(bytes)
    }

    /// Write bytes prefixed by a two byte length
    pub fn write_count_bytes_u16(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::StringTooLong {
            length: bytes.len(),
            width: 2,
        })?;
        self.write_u16(len)?;
        self.write_bytes(bytes)
    }

    /// Write bytes prefixed by a signed four byte length
    pub fn write_count_bytes_i32(&mut self, bytes: &[u8]) -> Result<()> {
        let len = i32::try_from(bytes.len()).map_err(|_| Error::StringTooLong {
            length: bytes.len(),
            width: 4,
        })?;
        self.write_i32(len)?;
        self.write_bytes(bytes)
    }

    /// Write a string prefixed by a one byte length
    pub fn write_count_string_u8(&mut self, value: &str) -> Result<()> {
        self.write_count_bytes_u8(value.as_bytes())
    }

    /// Write a string prefixed by a two byte length
    pub fn write_count_string_u16(&mut self, value: &str) -> Result<()> {
        self.write_count_bytes_u16(value.as_bytes())
    }

    /// Write a string prefixed by a signed four byte length
    pub fn write_count_string_i32(&mut self, value: &str) -> Result<()> {
        self.write_count_bytes_i32(value.as_bytes())
    }

    /// Write a string followed by a zero terminator
    pub fn write_null_terminated(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())?;
        self.write_u8(0)
    }
}

impl<W: Write> Write for EndianWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for EndianWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
