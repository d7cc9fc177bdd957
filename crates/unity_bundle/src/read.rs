//! Types for reading UnityFS bundles
//!

use std::fmt::{self, Debug};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, NullString};
use bon::Builder;
use tracing::{debug, instrument, trace};

use crate::compression::{decompress, decompress_block_to, CompressionType};
use crate::error::{EntryNotFoundError, Error, Result};
use crate::types::{
    BlockInfo, BundleHeader, BundleMetadata, DirectoryEntry, BLOCKS_AND_DIRECTORY_COMBINED,
    MIN_FORMAT_VERSION, SIGNATURE,
};

/// Block flags kept when a block is rewritten uncompressed
const UNPACKED_BLOCK_FLAGS: u16 = 0xC0;

/// Options for opening a bundle
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct BundleReadOptions {
    /// Decompress a compressed metadata block while opening instead of waiting
    /// for [`BundleFile::load_metadata`]
    #[builder(default)]
    pub decompress_metadata: bool,
}

/// How far a [`BundleFile`] has been read
///
/// Opening a bundle parses the header and then classifies the metadata block.
/// Plain metadata is decoded right away. Compressed metadata is only decoded when
/// the bundle was opened with [`BundleReadOptions::decompress_metadata`] or once
/// [`BundleFile::load_metadata`] is called, until then the bundle stays in
/// [`BundleState::CompressedMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    /// The header has been parsed
    HeaderRead,
    /// The metadata block is compressed and has not been decoded
    CompressedMetadata,
    /// The metadata block is stored as it is and has not been decoded
    PlainMetadata,
    /// The block list and directory are available
    Ready,
}

/// UnityFS bundle reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_bundle_contents(reader: impl Read + Seek) -> unity_bundle::error::Result<()> {
///     let mut bundle = unity_bundle::BundleFile::new(reader)?;
///     bundle.load_metadata()?;
///
///     for entry in bundle.entries() {
///         println!("{} ({} bytes)", entry.name, entry.size);
///     }
///
///     Ok(())
/// }
/// ```
pub struct BundleFile<R> {
    reader: R,
    header: BundleHeader,
    metadata: Option<BundleMetadata>,
    state: BundleState,
    stream_len: u64,
}

impl<R> Debug for BundleFile<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BundleFile")
            .field("header", &self.header)
            .field("state", &self.state)
            .field("entries", &self.len())
            .finish()
    }
}

impl<R> BundleFile<R> {
    pub fn header(&self) -> &BundleHeader {
        &self.header
    }

    pub fn state(&self) -> BundleState {
        self.state
    }

    /// The decoded block list and directory
    pub fn metadata(&self) -> Result<&BundleMetadata> {
        self.metadata.as_ref().ok_or(Error::MetadataNotLoaded)
    }

    /// Number of entries, zero until the metadata has been decoded
    pub fn len(&self) -> usize {
        self.metadata
            .as_ref()
            .map_or(0, |metadata| metadata.directory.len())
    }

    /// Whether this bundle contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Directory entries in stored order
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.metadata
            .iter()
            .flat_map(|metadata| metadata.directory.iter())
    }

    /// Get an entry by index
    pub fn entry(&self, index: usize) -> Result<&DirectoryEntry> {
        self.metadata()?
            .directory
            .get(index)
            .ok_or(Error::EntryNotFound(EntryNotFoundError::Index(index)))
    }

    /// Get the index of an entry by name, if it's present.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.entries().position(|entry| entry.name == name)
    }

    /// Absolute stream offset of an entry
    ///
    /// The entry has to lie within the data blob, and the blob within the stream.
    fn entry_start(&self, entry: &DirectoryEntry) -> Result<u64> {
        let out_of_bounds = || Error::EntryOutOfBounds(entry.name.clone());
        let end = entry.offset.checked_add(entry.size).ok_or_else(out_of_bounds)?;
        if end > self.metadata()?.data_len() {
            return Err(out_of_bounds());
        }
        let start = self
            .header
            .data_offset()
            .checked_add(entry.offset)
            .ok_or_else(out_of_bounds)?;
        match start.checked_add(entry.size) {
            Some(end) if end <= self.stream_len => Ok(start),
            _ => Err(out_of_bounds()),
        }
    }

    /// Search for an entry by name
    pub fn entry_by_name(&self, name: &str) -> Result<&DirectoryEntry> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::EntryNotFound(EntryNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.entry(index)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    pub(crate) fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// The metadata of a bundle whose data blocks are all stored uncompressed
    pub(crate) fn plain_metadata(&self) -> Result<&BundleMetadata> {
        let metadata = self.metadata()?;
        if metadata.is_data_compressed()? {
            return Err(Error::CompressedBundle);
        }
        Ok(metadata)
    }
}

impl<R: Read + Seek> BundleFile<R> {
    /// Read the header of a bundle starting at offset 0 of `reader`
    ///
    /// Plain metadata is decoded as well, compressed metadata is left for
    /// [`BundleFile::load_metadata`].
    pub fn new(reader: R) -> Result<BundleFile<R>> {
        Self::with_options(reader, BundleReadOptions::default())
    }

    /// Read a bundle with explicit options
    #[instrument(skip(reader), err)]
    pub fn with_options(mut reader: R, options: BundleReadOptions) -> Result<BundleFile<R>> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let signature = NullString::read_be(&mut reader)
            .map(|signature| signature.to_string())
            .unwrap_or_default();
        if signature != SIGNATURE {
            return Err(Error::InvalidBundle(signature));
        }

        reader.seek(SeekFrom::Start(0))?;
        let header = BundleHeader::read(&mut reader)?;
        if header.version < MIN_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(header.version));
        }
        if header.is_encrypted() {
            return Err(Error::EncryptedBundle);
        }

        let mut bundle = BundleFile {
            reader,
            header,
            metadata: None,
            state: BundleState::HeaderRead,
            stream_len,
        };
        bundle.advance(options.decompress_metadata)?;
        Ok(bundle)
    }

    /// Decode the metadata block, decompressing it if needed
    pub fn load_metadata(&mut self) -> Result<&BundleMetadata> {
        self.advance(true)?;
        self.metadata()
    }

    fn advance(&mut self, decompress_metadata: bool) -> Result<()> {
        loop {
            self.state = match self.state {
                BundleState::HeaderRead if self.header.compression()? == CompressionType::None => {
                    BundleState::PlainMetadata
                }
                BundleState::HeaderRead => BundleState::CompressedMetadata,
                BundleState::CompressedMetadata if !decompress_metadata => return Ok(()),
                BundleState::CompressedMetadata | BundleState::PlainMetadata => {
                    let metadata = self.read_metadata()?;
                    debug!(
                        blocks = metadata.blocks.len(),
                        entries = metadata.directory.len(),
                        "read bundle metadata"
                    );
                    self.metadata = Some(metadata);
                    BundleState::Ready
                }
                BundleState::Ready => return Ok(()),
            };
            trace!(state = ?self.state, "bundle state");
        }
    }

    fn read_metadata(&mut self) -> Result<BundleMetadata> {
        let compression = self.header.compression()?;
        let offset = self.header.metadata_offset();
        let stored_len = self.header.compressed_metadata_size as u64;
        if offset.checked_add(stored_len).map_or(true, |end| end > self.stream_len) {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut stored = vec![0u8; stored_len as usize];
        self.reader.read_exact(&mut stored)?;

        let data = decompress(
            &stored,
            self.header.decompressed_metadata_size as usize,
            compression,
        )?;
        BundleMetadata::read(&mut Cursor::new(data), &self.header)
    }

    /// Copy the bytes of an entry of an uncompressed bundle into `writer`
    pub(crate) fn copy_entry_data<W: Write>(
        &mut self,
        entry: &DirectoryEntry,
        writer: &mut W,
    ) -> Result<u64> {
        let start = self.entry_start(entry)?;
        self.reader.seek(SeekFrom::Start(start))?;
        let copied = io::copy(&mut self.reader.by_ref().take(entry.size), writer)?;
        Ok(copied)
    }

    /// Copy the bytes of an entry into `writer`
    ///
    /// Entries can only be read from bundles whose data is stored uncompressed,
    /// see [`BundleFile::unpack`].
    pub fn copy_entry<W: Write>(&mut self, index: usize, writer: &mut W) -> Result<u64> {
        self.plain_metadata()?;
        let entry = self.entry(index)?.clone();
        self.copy_entry_data(&entry, writer)
    }

    /// Raw bytes of an entry
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.copy_entry(index, &mut data)?;
        Ok(data)
    }

    /// Whether an entry looks like a serialized assets file
    pub fn is_assets_file(&mut self, index: usize) -> Result<bool> {
        self.plain_metadata()?;
        let entry = self.entry(index)?;
        let size = entry.size;
        let offset = self.entry_start(entry)?;
        Ok(unity_assets::is_assets_file(&mut self.reader, offset, size)?)
    }

    /// Write an equivalent bundle with every block decompressed
    ///
    /// The metadata is stored uncompressed right after the header and each block
    /// keeps its size, so directory offsets stay valid.
    #[instrument(skip(self, writer), err)]
    pub fn unpack<W: Write + Seek>(&mut self, mut writer: W) -> Result<W> {
        self.advance(true)?;
        let metadata = self.metadata()?.clone();

        let mut header = BundleHeader {
            size: 0,
            compressed_metadata_size: 0,
            decompressed_metadata_size: 0,
            flags: self.header.flags & BLOCKS_AND_DIRECTORY_COMBINED,
            ..self.header.clone()
        };
        let unpacked = BundleMetadata {
            hash: [0; 16],
            blocks: metadata
                .blocks
                .iter()
                .map(|block| BlockInfo {
                    uncompressed_size: block.uncompressed_size,
                    compressed_size: block.uncompressed_size,
                    flags: block.flags & UNPACKED_BLOCK_FLAGS,
                })
                .collect(),
            directory: metadata.directory.clone(),
        };

        let info = unpacked.to_bytes(&header)?;
        header.compressed_metadata_size = info.len() as u32;
        header.decompressed_metadata_size = info.len() as u32;
        header.size = header.data_offset() + unpacked.data_len();

        header.write_aligned(&mut writer)?;
        writer.write_all(&info)?;

        let mut position = self.header.data_offset();
        for (index, block) in metadata.blocks.iter().enumerate() {
            self.reader.seek(SeekFrom::Start(position))?;
            decompress_block_to(&mut self.reader, &mut writer, block)?;
            position += block.compressed_size as u64;
            trace!(
                index,
                flags = block.flags,
                size = block.uncompressed_size,
                "decompressed block"
            );
        }

        debug!(
            blocks = metadata.blocks.len(),
            size = header.size,
            "unpacked bundle"
        );
        Ok(writer)
    }
}
