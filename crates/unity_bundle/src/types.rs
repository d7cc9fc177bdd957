//! Base types for the structure of a UnityFS bundle.
//!
//! Everything in the container layer is big endian. The header is a `binrw`
//! structure, the metadata block is read through the header because whether it
//! carries a directory depends on the header flags.

use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinWrite, NullString};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use unity_assets::UnityVersion;

use crate::compression::CompressionType;
use crate::error::{Error, Result};

/// Signature of every bundle this crate reads
pub const SIGNATURE: &str = "UnityFS";

/// Oldest UnityFS format version with a block list
pub const MIN_FORMAT_VERSION: u32 = 6;

/// Header flags: codec of the metadata block
pub const COMPRESSION_MASK: u32 = 0x3F;

/// Header flags: the metadata block carries the directory after the block list
pub const BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;

/// Header flags: the metadata block is stored at the end of the file
pub const BLOCK_INFO_AT_END: u32 = 0x80;

/// Header flags: the data block starts at the next multiple of 16 (new archive flags only)
pub const BLOCK_INFO_NEEDS_PADDING: u32 = 0x200;

/// Header flags: encryption bit of engines before the new archive flags
pub const ENCRYPTION_OLD: u32 = 0x200;

/// Header flags: encryption bits of engines using the new archive flags
pub const ENCRYPTION_NEW: u32 = 0x1400;

/// Directory entry flags: the entry is a serialized assets file
pub const SERIALIZED_ENTRY: u32 = 0x04;

/// Block flags: the block belongs to a streamed bundle
pub const STREAMED_BLOCK: u16 = 0x40;

/// UnityFS header
///
/// The header is followed by zero padding up to a multiple of 16 from format 7 on,
/// see [`BundleHeader::header_size`].
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(big)]
pub struct BundleHeader {
    /// Always `UnityFS` for bundles this crate reads
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.clone()))]
    pub signature: String,

    /// Container format version
    pub version: u32,

    /// Oldest engine able to load the bundle, usually `5.x.x`
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.clone()))]
    pub min_engine_version: String,

    /// Engine that built the bundle
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.clone()))]
    pub engine_version: String,

    /// Size of the whole bundle
    pub size: u64,

    /// Size of the metadata block as stored
    pub compressed_metadata_size: u32,

    /// Size of the metadata block once decompressed
    pub decompressed_metadata_size: u32,

    pub flags: u32,
}

impl Default for BundleHeader {
    fn default() -> Self {
        Self {
            signature: SIGNATURE.to_string(),
            version: 7,
            min_engine_version: "5.x.x".to_string(),
            engine_version: "2019.4.3f1".to_string(),
            size: 0,
            compressed_metadata_size: 0,
            decompressed_metadata_size: 0,
            flags: BLOCKS_AND_DIRECTORY_COMBINED,
        }
    }
}

impl BundleHeader {
    /// Codec of the metadata block
    pub fn compression(&self) -> Result<CompressionType> {
        CompressionType::from_flags(self.flags)
    }

    pub const fn is_combined(&self) -> bool {
        self.flags & BLOCKS_AND_DIRECTORY_COMBINED != 0
    }

    pub const fn is_info_at_end(&self) -> bool {
        self.flags & BLOCK_INFO_AT_END != 0
    }

    /// Whether the engine that built the bundle uses the newer meaning of the
    /// `0x200` flag, which is 2020.3.34, 2021.3.2, 2022.1.1 and later
    pub fn uses_new_archive_flags(&self) -> bool {
        let Ok(version) = UnityVersion::parse(&self.engine_version) else {
            return false;
        };
        match version.major {
            ..=2019 => false,
            2020 => version.at_least(2020, 3, 34),
            2021 => version.at_least(2021, 3, 2),
            2022 => version.at_least(2022, 1, 1),
            _ => true,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        if self.uses_new_archive_flags() {
            self.flags & ENCRYPTION_NEW != 0
        } else {
            self.flags & ENCRYPTION_OLD != 0
        }
    }

    /// Whether padding to 16 bytes sits between the metadata and the data block
    pub fn needs_padding(&self) -> bool {
        self.uses_new_archive_flags() && self.flags & BLOCK_INFO_NEEDS_PADDING != 0
    }

    /// Encoded size of the header fields without alignment
    pub fn encoded_size(&self) -> u64 {
        let strings = self.signature.len() + self.min_engine_version.len() + self.engine_version.len();
        (strings + 3) as u64 + 4 + 8 + 4 + 4 + 4
    }

    /// Size of the header including its trailing alignment
    pub fn header_size(&self) -> u64 {
        let size = self.encoded_size();
        if self.version >= 7 {
            align16(size)
        } else {
            size
        }
    }

    /// Offset of the metadata block from the start of the bundle
    pub fn metadata_offset(&self) -> u64 {
        if self.is_info_at_end() {
            self.size.saturating_sub(self.compressed_metadata_size as u64)
        } else {
            self.header_size()
        }
    }

    /// Offset of the data block from the start of the bundle
    pub fn data_offset(&self) -> u64 {
        if self.is_info_at_end() {
            return self.header_size();
        }
        let offset = self.header_size() + self.compressed_metadata_size as u64;
        if self.needs_padding() {
            align16(offset)
        } else {
            offset
        }
    }

    /// Write the header followed by its alignment padding
    pub fn write_aligned<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.write(writer)?;
        let padding = self.header_size() - self.encoded_size();
        writer.write_all(&[0u8; 16][..padding as usize])?;
        Ok(())
    }
}

pub(crate) const fn align16(value: u64) -> u64 {
    (value + 15) & !15
}

/// One block of the data blob
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(big)]
pub struct BlockInfo {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    /// Low six bits select the codec
    pub flags: u16,
}

impl BlockInfo {
    /// A block stored without compression
    pub const fn stored(size: u32) -> Self {
        BlockInfo {
            uncompressed_size: size,
            compressed_size: size,
            flags: 0,
        }
    }

    pub fn compression(&self) -> Result<CompressionType> {
        CompressionType::from_flags(self.flags as u32)
    }
}

/// A named entry of the bundle
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(big)]
pub struct DirectoryEntry {
    /// Offset from the start of the decompressed data blob
    pub offset: u64,
    pub size: u64,
    pub flags: u32,
    #[br(map = |s: NullString| s.to_string())]
    #[bw(map = |s: &String| NullString::from(s.clone()))]
    pub name: String,
}

impl DirectoryEntry {
    /// Whether the entry is flagged as a serialized assets file
    pub const fn is_serialized(&self) -> bool {
        self.flags & SERIALIZED_ENTRY != 0
    }
}

/// The block list and directory of a bundle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BundleMetadata {
    pub hash: [u8; 16],
    pub blocks: Vec<BlockInfo>,
    pub directory: Vec<DirectoryEntry>,
}

impl BundleMetadata {
    /// Read a decompressed metadata block
    pub fn read<R: Read + Seek>(reader: &mut R, header: &BundleHeader) -> Result<Self> {
        let mut hash = [0u8; 16];
        reader.read_exact(&mut hash)?;

        let count = read_count(reader)?;
        let blocks = (0..count)
            .map(|_| BlockInfo::read(reader))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let directory = if header.is_combined() {
            let count = read_count(reader)?;
            (0..count)
                .map(|_| DirectoryEntry::read(reader))
                .collect::<binrw::BinResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        Ok(BundleMetadata {
            hash,
            blocks,
            directory,
        })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut W, header: &BundleHeader) -> Result<()> {
        writer.write_all(&self.hash)?;

        (self.blocks.len() as i32).write_be(writer)?;
        for block in &self.blocks {
            block.write(writer)?;
        }

        if header.is_combined() {
            (self.directory.len() as i32).write_be(writer)?;
            for entry in &self.directory {
                entry.write(writer)?;
            }
        }
        Ok(())
    }

    /// The encoded metadata block, before compression
    pub fn to_bytes(&self, header: &BundleHeader) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(Vec::new());
        self.write(&mut writer, header)?;
        Ok(writer.into_inner())
    }

    /// Size of the data blob once every block is decompressed
    pub fn data_len(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.uncompressed_size as u64)
            .sum()
    }

    /// Size of the data blob as stored
    pub fn stored_data_len(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.compressed_size as u64)
            .sum()
    }

    /// Whether any block of the data blob is compressed
    pub fn is_data_compressed(&self) -> Result<bool> {
        for block in &self.blocks {
            if block.compression()? != CompressionType::None {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn read_count<R: Read + Seek>(reader: &mut R) -> Result<i32> {
    let count = i32::read_be(reader)?;
    if count < 0 {
        return Err(Error::InvalidCount(count));
    }
    Ok(count)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use pretty_assertions::{assert_eq, assert_str_eq};

    use crate::error::{Error, Result};
    use crate::types::{BlockInfo, BundleHeader, BundleMetadata, DirectoryEntry};

    #[rustfmt::skip]
    const HEADER: [u8; 0x2F] = [
        b'U', b'n', b'i', b't', b'y', b'F', b'S', 0x00,
        0x00, 0x00, 0x00, 0x07,
        b'5', b'.', b'x', b'.', b'x', 0x00,
        b'2', b'0', b'1', b'9', b'.', b'4', b'.', b'3', b'f', b'1', 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x20,
        0x00, 0x00, 0x00, 0x40,
        0x00, 0x00,
    ];

    fn header_bytes() -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&[0x00, 0x43]);
        bytes
    }

    #[test]
    fn read_header() -> Result<()> {
        let header = BundleHeader::read(&mut Cursor::new(header_bytes()))?;

        let expected = BundleHeader {
            size: 0x100,
            compressed_metadata_size: 0x20,
            decompressed_metadata_size: 0x40,
            flags: 0x43,
            ..Default::default()
        };
        assert_eq!(header, expected);
        assert_eq!(header.encoded_size(), 0x31);
        assert_eq!(header.header_size(), 0x40);
        assert_eq!(header.metadata_offset(), 0x40);
        assert_eq!(header.data_offset(), 0x60);
        Ok(())
    }

    #[test]
    fn write_header_aligned() -> Result<()> {
        let header = BundleHeader {
            engine_version: "2019.4.3f10".to_string(),
            ..Default::default()
        };

        let mut writer = Cursor::new(Vec::new());
        header.write_aligned(&mut writer)?;
        let bytes = writer.into_inner();
        assert_eq!(header.encoded_size(), 0x32);
        assert_eq!(bytes.len(), 0x40);
        assert!(bytes[0x32..].iter().all(|byte| *byte == 0));
        Ok(())
    }

    #[test]
    fn info_at_end_offsets() {
        let header = BundleHeader {
            size: 0x400,
            compressed_metadata_size: 0x50,
            flags: 0xC3,
            ..Default::default()
        };
        assert_eq!(header.metadata_offset(), 0x3B0);
        assert_eq!(header.data_offset(), 0x40);
    }

    #[test]
    fn padding_flag_depends_on_engine() {
        let mut header = BundleHeader {
            compressed_metadata_size: 0x21,
            flags: 0x243,
            engine_version: "2021.3.1f1".to_string(),
            ..Default::default()
        };
        assert!(header.is_encrypted());
        assert_eq!(header.data_offset(), 0x61);

        header.engine_version = "2021.3.2f1".to_string();
        assert!(!header.is_encrypted());
        assert!(header.needs_padding());
        assert_eq!(header.data_offset(), 0x70);

        header.flags = 0x1043;
        assert!(header.is_encrypted());

        header.engine_version = "0.0.0".to_string();
        assert!(!header.uses_new_archive_flags());
    }

    #[test]
    fn metadata_round_trip() -> Result<()> {
        let header = BundleHeader::default();
        let metadata = BundleMetadata {
            hash: [0; 16],
            blocks: vec![BlockInfo {
                uncompressed_size: 0x10,
                compressed_size: 0x0C,
                flags: 0x03,
            }],
            directory: vec![DirectoryEntry {
                offset: 0,
                size: 0x10,
                flags: 4,
                name: "CAB-1".to_string(),
            }],
        };

        let bytes = metadata.to_bytes(&header)?;

        #[rustfmt::skip]
        let expected: Vec<u8> = [
            vec![0x00; 16],
            vec![0x00, 0x00, 0x00, 0x01],
            vec![0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x03],
            vec![0x00, 0x00, 0x00, 0x01],
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10],
            vec![0x00, 0x00, 0x00, 0x04],
            b"CAB-1\0".to_vec(),
        ]
        .concat();
        assert_str_eq!(format!("{:02X?}", bytes), format!("{:02X?}", expected));

        let read = BundleMetadata::read(&mut Cursor::new(bytes), &header)?;
        assert_eq!(read, metadata);
        assert_eq!(read.data_len(), 0x10);
        assert!(read.is_data_compressed()?);
        Ok(())
    }

    #[test]
    fn negative_counts_are_rejected() {
        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(&(-1i32).to_be_bytes());

        let result = BundleMetadata::read(&mut Cursor::new(bytes), &BundleHeader::default());
        assert!(matches!(result, Err(Error::InvalidCount(-1))));
    }
}
