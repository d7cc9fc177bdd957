//! Block compression and decompression handling.
//!
//! LZ4 and LZ4HC share one wire format and are decoded the same way. LZMA blocks
//! start with the five byte encoder properties and omit the uncompressed size that
//! the `.lzma` container would carry, so the adapters below add it back for
//! decoding and strip it after encoding.

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, MatchFinder, Mode, Stream};
use xz2::write::XzEncoder;

use crate::error::{Error, Result};
use crate::types::{BlockInfo, COMPRESSION_MASK};

/// Size of the LZMA properties preamble
pub const LZMA_PROPS_SIZE: usize = 5;

/// Uncompressed size of a chunk when packing with LZ4
pub const DEFAULT_CHUNK_SIZE: usize = 0x20000;

/// Effort used for LZ4HC
const LZ4HC_LEVEL: i32 = 9;

/// Position of the uncompressed size in the `.lzma` container
const LZMA_SIZE_FIELD: Range<u64> = LZMA_PROPS_SIZE as u64..LZMA_PROPS_SIZE as u64 + 8;

/// Identifies the codec of a block or of the metadata block
///
/// Choose the codec for packing via [`crate::pack::PackOptions`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompressionType {
    /// Stores the data as it is
    None = 0,

    /// A single LZMA stream
    Lzma = 1,

    /// LZ4 blocks
    #[default]
    Lz4 = 2,

    /// LZ4 blocks produced with the high compression encoder
    Lz4Hc = 3,
}

impl CompressionType {
    /// Codec selected by the low six bits of header or block flags
    pub fn from_flags(flags: u32) -> Result<Self> {
        Self::try_from(flags & COMPRESSION_MASK)
    }

    /// The tag stored in the flags
    pub const fn tag(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for CompressionType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lzma),
            2 => Ok(CompressionType::Lz4),
            3 => Ok(CompressionType::Lz4Hc),
            _ => Err(Error::UnsupportedCompression(value)),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionType::None => "none",
            CompressionType::Lzma => "lzma",
            CompressionType::Lz4 => "lz4",
            CompressionType::Lz4Hc => "lz4hc",
        })
    }
}

/// Compress a whole buffer
pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lzma => lzma_compress(data),
        CompressionType::Lz4 => lz4_compress(data, false),
        CompressionType::Lz4Hc => lz4_compress(data, true),
    }
}

/// Decompress a whole buffer that expands to `size` bytes
pub fn decompress(data: &[u8], size: usize, compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lzma => lzma_decompress(data, size),
        CompressionType::Lz4 | CompressionType::Lz4Hc => lz4_decompress(data, size),
    }
}

pub fn lz4_compress(data: &[u8], high_compression: bool) -> Result<Vec<u8>> {
    let mode = if high_compression {
        lz4::block::CompressionMode::HIGHCOMPRESSION(LZ4HC_LEVEL)
    } else {
        lz4::block::CompressionMode::DEFAULT
    };
    Ok(lz4::block::compress(data, Some(mode), false)?)
}

pub fn lz4_decompress(data: &[u8], size: usize) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let capacity = i32::try_from(size)
        .map_err(|_| Error::CustomError(format!("LZ4 block of {size} bytes is too large")))?;
    let decompressed = lz4::block::decompress(data, Some(capacity))?;
    if decompressed.len() != size {
        return Err(Error::DecompressedSizeMismatch {
            expected: size as u64,
            actual: decompressed.len() as u64,
        });
    }
    Ok(decompressed)
}

/// Encoder settings matching the engine's own LZMA blocks
fn lzma_options() -> Result<LzmaOptions> {
    let mut options = LzmaOptions::new_preset(6)?;
    options
        .dict_size(1 << 21)
        .literal_context_bits(3)
        .literal_position_bits(0)
        .position_bits(2)
        .mode(Mode::Normal)
        .match_finder(MatchFinder::BinaryTree4)
        .nice_len(32);
    Ok(options)
}

pub fn lzma_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzma_compress_to(&mut Cursor::new(data), &mut out)?;
    Ok(out)
}

/// Compress everything `reader` yields into `writer`, returning the bytes written
pub fn lzma_compress_to<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64> {
    let stream = Stream::new_lzma_encoder(&lzma_options()?)?;
    let mut encoder = XzEncoder::new_stream(SizeFieldStripper::new(writer), stream);
    io::copy(reader, &mut encoder)?;
    let stripper = encoder.finish()?;
    Ok(stripper.written)
}

pub fn lzma_decompress(data: &[u8], size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size);
    lzma_decompress_to(data, &mut out, size as u64)?;
    Ok(out)
}

/// Decompress an LZMA block of `size` bytes from `reader` into `writer`
pub fn lzma_decompress_to<R: Read, W: Write>(mut reader: R, writer: &mut W, size: u64) -> Result<()> {
    let mut preamble = vec![0u8; LZMA_PROPS_SIZE];
    reader.read_exact(&mut preamble)?;
    preamble.extend_from_slice(&size.to_le_bytes());

    let stream = Stream::new_lzma_decoder(u64::MAX)?;
    let decoder = XzDecoder::new_stream(Cursor::new(preamble).chain(reader), stream);

    // The stream may end with an end marker after `size` bytes, which is never read
    let copied = io::copy(&mut decoder.take(size), writer)?;
    if copied != size {
        return Err(Error::DecompressedSizeMismatch {
            expected: size,
            actual: copied,
        });
    }
    Ok(())
}

/// Decompress the block at the reader's position into `writer`
#[instrument(skip(reader, writer), err)]
pub fn decompress_block_to<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    block: &BlockInfo,
) -> Result<()> {
    let size = block.uncompressed_size as u64;
    let mut limited = reader.by_ref().take(block.compressed_size as u64);

    match block.compression()? {
        CompressionType::None => {
            let copied = io::copy(&mut limited, writer)?;
            if copied != size {
                return Err(Error::DecompressedSizeMismatch {
                    expected: size,
                    actual: copied,
                });
            }
        }
        CompressionType::Lzma => lzma_decompress_to(limited, writer, size)?,
        CompressionType::Lz4 | CompressionType::Lz4Hc => {
            let mut compressed = Vec::with_capacity(block.compressed_size as usize);
            limited.read_to_end(&mut compressed)?;
            if compressed.len() != block.compressed_size as usize {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            writer.write_all(&lz4_decompress(&compressed, size as usize)?)?;
        }
    }
    Ok(())
}

/// Split everything `reader` yields into LZ4HC compressed chunks of `chunk_size`
///
/// A chunk that grows when compressed is stored as it is with a block flag of zero.
#[instrument(skip(reader, writer), err)]
pub fn compress_chunks<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> Result<Vec<BlockInfo>> {
    let mut blocks = Vec::new();
    let mut chunk = vec![0u8; chunk_size];

    loop {
        let filled = fill_chunk(reader, &mut chunk)?;
        if filled == 0 {
            break;
        }
        let data = &chunk[..filled];
        let compressed = lz4_compress(data, true)?;

        let block = if compressed.len() > data.len() {
            writer.write_all(data)?;
            BlockInfo::stored(filled as u32)
        } else {
            writer.write_all(&compressed)?;
            BlockInfo {
                uncompressed_size: filled as u32,
                compressed_size: compressed.len() as u32,
                flags: CompressionType::Lz4Hc.tag() as u16,
            }
        };
        trace!(
            uncompressed = block.uncompressed_size,
            compressed = block.compressed_size,
            flags = block.flags,
            "packed chunk"
        );
        blocks.push(block);
    }

    Ok(blocks)
}

/// Read until `chunk` is full or the reader is exhausted
fn fill_chunk<R: Read>(reader: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < chunk.len() {
        match reader.read(&mut chunk[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Drops the uncompressed size field from the `.lzma` stream passing through
struct SizeFieldStripper<W> {
    inner: W,
    received: u64,
    written: u64,
}

impl<W: Write> SizeFieldStripper<W> {
    fn new(inner: W) -> Self {
        SizeFieldStripper {
            inner,
            received: 0,
            written: 0,
        }
    }
}

impl<W: Write> Write for SizeFieldStripper<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let start = self.received;
        let end = start + buf.len() as u64;
        let skip_start = (LZMA_SIZE_FIELD.start.clamp(start, end) - start) as usize;
        let skip_end = (LZMA_SIZE_FIELD.end.clamp(start, end) - start) as usize;

        self.inner.write_all(&buf[..skip_start])?;
        self.inner.write_all(&buf[skip_end..])?;

        self.received = end;
        self.written += (buf.len() - (skip_end - skip_start)) as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
