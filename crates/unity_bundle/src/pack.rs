//! Recompressing an uncompressed bundle
//!

use std::io::{self, Read, Seek, SeekFrom, Write};

use bon::Builder;
use tracing::{debug, instrument};

use crate::compression::{compress_chunks, lz4_compress, lzma_compress_to, CompressionType, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::read::BundleFile;
use crate::types::{
    BlockInfo, BundleHeader, BundleMetadata, BLOCKS_AND_DIRECTORY_COMBINED, BLOCK_INFO_AT_END,
    STREAMED_BLOCK,
};

/// Options for how a bundle should be packed
#[derive(Debug, Clone, Copy, Builder)]
pub struct PackOptions {
    /// Codec of the data blocks, the metadata block always uses LZ4HC
    #[builder(default)]
    pub compression: CompressionType,

    /// Store the metadata at the end of the bundle, defaults to the placement of
    /// the source bundle
    pub info_at_end: Option<bool>,

    /// Uncompressed size of each LZ4 chunk
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions::builder().build()
    }
}

impl<R: Read + Seek> BundleFile<R> {
    /// Write a compressed copy of this bundle
    ///
    /// The bundle must be stored uncompressed, see [`BundleFile::unpack`]. LZMA
    /// compresses the data as one block while LZ4 splits it into chunks. When the
    /// metadata goes in front of the data, the blocks are spilled to a temporary
    /// file until the metadata is known.
    ///
    /// ```no_run
    /// # fn doit(bundle: &mut unity_bundle::BundleFile<std::fs::File>) -> unity_bundle::error::Result<()> {
    /// use unity_bundle::{CompressionType, PackOptions};
    ///
    /// let options = PackOptions::builder().compression(CompressionType::Lzma).build();
    /// let output = std::fs::File::create("packed.bundle")?;
    /// bundle.pack(output, &options)?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, writer), err)]
    pub fn pack<W: Write + Seek>(&mut self, mut writer: W, options: &PackOptions) -> Result<W> {
        let metadata = self.plain_metadata()?.clone();
        let info_at_end = options
            .info_at_end
            .unwrap_or_else(|| self.header().is_info_at_end());

        let mut header = BundleHeader {
            size: 0,
            compressed_metadata_size: 0,
            decompressed_metadata_size: 0,
            flags: BLOCKS_AND_DIRECTORY_COMBINED
                | CompressionType::Lz4Hc.tag()
                | if info_at_end { BLOCK_INFO_AT_END } else { 0 },
            ..self.header().clone()
        };

        let start = writer.stream_position()?;
        header.write_aligned(&mut writer)?;
        let header_size = writer.stream_position()? - start;

        let data_len = metadata.data_len();
        let data_offset = self.header().data_offset();
        let reader = self.reader_mut();
        reader.seek(SeekFrom::Start(data_offset))?;
        let mut data = reader.by_ref().take(data_len);

        let mut spill = None;
        let blocks = if info_at_end {
            pack_data(&mut data, &mut writer, data_len, options)?
        } else {
            let mut file = tempfile::tempfile()?;
            let blocks = pack_data(&mut data, &mut file, data_len, options)?;
            spill = Some(file);
            blocks
        };

        let packed_len: u64 = blocks.iter().map(|block| block.uncompressed_size as u64).sum();
        if packed_len != data_len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        let packed = BundleMetadata {
            hash: [0; 16],
            blocks,
            directory: metadata.directory,
        };
        let info = packed.to_bytes(&header)?;
        let compressed_info = lz4_compress(&info, true)?;

        header.size = header_size + compressed_info.len() as u64 + packed.stored_data_len();
        header.compressed_metadata_size = compressed_info.len() as u32;
        header.decompressed_metadata_size = info.len() as u32;

        writer.write_all(&compressed_info)?;
        if let Some(mut file) = spill {
            file.seek(SeekFrom::Start(0))?;
            io::copy(&mut file, &mut writer)?;
        }

        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(start))?;
        header.write_aligned(&mut writer)?;
        writer.seek(SeekFrom::Start(end))?;

        debug!(
            compression = %options.compression,
            blocks = packed.blocks.len(),
            size = header.size,
            "packed bundle"
        );
        Ok(writer)
    }
}

fn pack_data<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    data_len: u64,
    options: &PackOptions,
) -> Result<Vec<BlockInfo>> {
    Ok(match options.compression {
        CompressionType::None => {
            let copied = io::copy(reader, writer)?;
            vec![BlockInfo::stored(block_size(copied)?)]
        }
        CompressionType::Lzma => {
            let uncompressed_size = block_size(data_len)?;
            let written = lzma_compress_to(reader, writer)?;
            vec![BlockInfo {
                uncompressed_size,
                compressed_size: block_size(written)?,
                flags: STREAMED_BLOCK | CompressionType::Lzma.tag() as u16,
            }]
        }
        CompressionType::Lz4 | CompressionType::Lz4Hc => {
            compress_chunks(reader, writer, options.chunk_size)?
        }
    })
}

fn block_size(len: u64) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::CustomError(format!("bundle data of {len} bytes does not fit in a single block"))
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};

    use super::block_size;

    #[test]
    fn single_blocks_are_limited_to_u32() -> Result<()> {
        assert_eq!(block_size(u32::MAX as u64)?, u32::MAX);
        assert!(matches!(
            block_size(u32::MAX as u64 + 1),
            Err(Error::CustomError(_))
        ));
        Ok(())
    }
}
