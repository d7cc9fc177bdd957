//! Base types for the structure of an assets file.
//!
//! The fixed header is always big endian and is described with `binrw`. Everything
//! after it follows the endianness byte of the header and changes shape with the
//! format version, so the metadata structures read and write themselves through
//! [`EndianReader`] and [`EndianWriter`] with the version threaded through.

use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinWrite};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::endian::{EndianReader, EndianWriter};
use crate::error::{Error, Result};

/// Oldest format version that can be read
pub const MIN_FORMAT_VERSION: u32 = 9;

/// Class id of `MonoBehaviour`, whose type entries carry a script id
pub const MONO_BEHAVIOUR_CLASS_ID: i32 = 114;

/// Script index used by objects that are not scripted
pub const NO_SCRIPT_INDEX: u16 = 0xFFFF;

const BUILTIN_RESOURCE_SUFFIXES: &[&str] = &[
    "unity_builtin_extra",
    "unity default resources",
    "unity editor resources",
];

/// Assets file header
///
/// Format 22 moved the sizes and the data offset into a trailing block of 64 bit
/// fields, stored here as [`LargeHeader`].
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(big)]
pub struct AssetsFileHeader {
    /// Size of the metadata region
    pub metadata_size: u32,

    /// Size of the whole file
    pub file_size: u32,

    /// Serialized file format version
    pub version: u32,

    /// Offset of the first object from the start of the file
    pub data_offset: u32,

    /// Non-zero when the metadata and object data are big endian
    pub endianness: u8,

    pub reserved: [u8; 3],

    #[br(if(version >= 22))]
    pub large: Option<LargeHeader>,
}

/// Wide size fields used by format 22 and newer
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(big)]
pub struct LargeHeader {
    pub metadata_size: u32,
    pub file_size: u64,
    pub data_offset: u64,
    pub unknown: u64,
}

impl AssetsFileHeader {
    /// Encoded size of the header for its format version
    pub const fn header_size(&self) -> u64 {
        if self.version >= 22 {
            0x30
        } else {
            0x14
        }
    }

    pub const fn is_big_endian(&self) -> bool {
        self.endianness != 0
    }

    pub fn metadata_size(&self) -> u64 {
        match self.large {
            Some(large) => large.metadata_size as u64,
            None => self.metadata_size as u64,
        }
    }

    pub fn file_size(&self) -> u64 {
        match self.large {
            Some(large) => large.file_size,
            None => self.file_size as u64,
        }
    }

    pub fn data_offset(&self) -> u64 {
        match self.large {
            Some(large) => large.data_offset,
            None => self.data_offset as u64,
        }
    }

    /// Update the size fields, using the wide block when the format has one
    ///
    /// Fails when a size does not fit the 32 bit fields of the format.
    pub fn set_layout(&mut self, metadata_size: u64, file_size: u64, data_offset: u64) -> Result<()> {
        let version = self.version;
        let narrow = |field: &str, value: u64| {
            u32::try_from(value).map_err(|_| {
                Error::CustomError(format!(
                    "{field} of {value} bytes does not fit in a format {version} header"
                ))
            })
        };
        match self.large {
            Some(_) => {
                let metadata_size = narrow("metadata", metadata_size)?;
                self.large = Some(LargeHeader {
                    metadata_size,
                    file_size,
                    data_offset,
                    ..self.large.unwrap_or_default()
                });
            }
            None => {
                let metadata_size = narrow("metadata", metadata_size)?;
                let file_size = narrow("file", file_size)?;
                let data_offset = narrow("data offset", data_offset)?;
                self.metadata_size = metadata_size;
                self.file_size = file_size;
                self.data_offset = data_offset;
            }
        }
        Ok(())
    }
}

/// One flattened node of an embedded type tree
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TypeTreeNode {
    pub version: u16,
    /// Depth of the node, the root is level 0
    pub level: u8,
    /// Bit 0 marks arrays
    pub type_flags: u8,
    pub type_str_offset: u32,
    pub name_str_offset: u32,
    pub byte_size: i32,
    pub index: i32,
    /// Bit 0x4000 requests alignment after the field
    pub meta_flags: u32,
    /// Format 19 and newer only
    pub ref_type_hash: u64,
}

/// Embedded type tree of one type table entry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TypeTree {
    /// Nodes in depth-first order
    pub nodes: Vec<TypeTreeNode>,
    /// Zero terminated names referenced by node string offsets
    pub string_buffer: Vec<u8>,
}

impl TypeTree {
    /// Whether the version stores the tree as a node blob rather than recursively
    pub const fn uses_blob(version: u32) -> bool {
        version >= 12 || version == 10
    }

    pub fn read<R: Read + Seek>(reader: &mut EndianReader<R>, version: u32) -> Result<Self> {
        if TypeTree::uses_blob(version) {
            TypeTree::read_blob(reader, version)
        } else {
            let mut tree = TypeTree::default();
            tree.read_legacy_node(reader, 0)?;
            Ok(tree)
        }
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        if TypeTree::uses_blob(version) {
            self.write_blob(writer, version)
        } else {
            let mut index = 0;
            self.write_legacy_node(writer, &mut index)
        }
    }

    fn read_blob<R: Read + Seek>(reader: &mut EndianReader<R>, version: u32) -> Result<Self> {
        let node_count = read_count(reader)?;
        let string_size = read_count(reader)?;

        let mut nodes = Vec::new();
        for _ in 0..node_count {
            nodes.push(TypeTreeNode {
                version: reader.read_u16()?,
                level: reader.read_u8()?,
                type_flags: reader.read_u8()?,
                type_str_offset: reader.read_u32()?,
                name_str_offset: reader.read_u32()?,
                byte_size: reader.read_i32()?,
                index: reader.read_i32()?,
                meta_flags: reader.read_u32()?,
                ref_type_hash: if version >= 19 { reader.read_u64()? } else { 0 },
            });
        }
        let string_buffer = reader.read_bytes(string_size)?;

        Ok(TypeTree {
            nodes,
            string_buffer,
        })
    }

    fn write_blob<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        writer.write_i32(self.nodes.len() as i32)?;
        writer.write_i32(self.string_buffer.len() as i32)?;
        for node in &self.nodes {
            writer.write_u16(node.version)?;
            writer.write_u8(node.level)?;
            writer.write_u8(node.type_flags)?;
            writer.write_u32(node.type_str_offset)?;
            writer.write_u32(node.name_str_offset)?;
            writer.write_i32(node.byte_size)?;
            writer.write_i32(node.index)?;
            writer.write_u32(node.meta_flags)?;
            if version >= 19 {
                writer.write_u64(node.ref_type_hash)?;
            }
        }
        writer.write_bytes(&self.string_buffer)
    }

    /// Older formats nest nodes recursively with inline names; they are flattened
    /// here with the names moved into the local string buffer.
    fn read_legacy_node<R: Read + Seek>(
        &mut self,
        reader: &mut EndianReader<R>,
        level: u8,
    ) -> Result<()> {
        let type_str_offset = self.push_string(&reader.read_null_terminated_bytes()?);
        let name_str_offset = self.push_string(&reader.read_null_terminated_bytes()?);
        let byte_size = reader.read_i32()?;
        let index = reader.read_i32()?;
        let type_flags = reader.read_i32()?;
        let version = reader.read_i32()?;
        let meta_flags = reader.read_u32()?;

        self.nodes.push(TypeTreeNode {
            version: version as u16,
            level,
            type_flags: type_flags as u8,
            type_str_offset,
            name_str_offset,
            byte_size,
            index,
            meta_flags,
            ref_type_hash: 0,
        });

        let children = read_count(reader)?;
        for _ in 0..children {
            self.read_legacy_node(reader, level + 1)?;
        }
        Ok(())
    }

    fn write_legacy_node<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        index: &mut usize,
    ) -> Result<()> {
        let node = self.nodes.get(*index).ok_or_else(|| {
            Error::InvalidTypeTree("legacy type tree has no root node".to_string())
        })?;
        *index += 1;

        writer.write_bytes(&self.raw_string(node.type_str_offset))?;
        writer.write_u8(0)?;
        writer.write_bytes(&self.raw_string(node.name_str_offset))?;
        writer.write_u8(0)?;
        writer.write_i32(node.byte_size)?;
        writer.write_i32(node.index)?;
        writer.write_i32(node.type_flags as i32)?;
        writer.write_i32(node.version as i32)?;
        writer.write_u32(node.meta_flags)?;

        let children = self.nodes[*index..]
            .iter()
            .take_while(|child| child.level > node.level)
            .filter(|child| child.level == node.level + 1)
            .count();
        writer.write_i32(children as i32)?;
        for _ in 0..children {
            self.write_legacy_node(writer, index)?;
        }
        Ok(())
    }

    fn push_string(&mut self, value: &[u8]) -> u32 {
        let offset = self.string_buffer.len() as u32;
        self.string_buffer.extend_from_slice(value);
        self.string_buffer.push(0);
        offset
    }

    fn raw_string(&self, offset: u32) -> Vec<u8> {
        let tail = self.string_buffer.get(offset as usize..).unwrap_or_default();
        tail.iter().copied().take_while(|&b| b != 0).collect()
    }
}

/// Names identifying a managed reference type (format 21 and newer)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeReference {
    pub class_name: String,
    pub namespace: String,
    pub assembly_name: String,
}

/// One entry of the shared type table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped: bool,
    /// Index into the script table for scripted objects, `-1` otherwise
    pub script_type_index: i16,
    pub script_id: Option<[u8; 16]>,
    pub type_hash: [u8; 16],
    pub type_tree: Option<TypeTree>,
    /// Indices of referenced types, format 21 and newer
    pub type_dependencies: Vec<i32>,
    /// Set on reference type entries of format 21 and newer
    pub type_reference: Option<TypeReference>,
}

impl Default for SerializedType {
    fn default() -> Self {
        Self {
            class_id: Default::default(),
            is_stripped: Default::default(),
            script_type_index: -1,
            script_id: Default::default(),
            type_hash: Default::default(),
            type_tree: Default::default(),
            type_dependencies: Default::default(),
            type_reference: Default::default(),
        }
    }
}

impl SerializedType {
    /// A minimal entry without a type tree, used for classes added by a replacer
    pub fn synthesized(class_id: i32, script_index: u16, version: u32) -> Self {
        let needs_script_id = (version < 16 && class_id < 0)
            || (version >= 16 && class_id == MONO_BEHAVIOUR_CLASS_ID);
        SerializedType {
            class_id,
            script_type_index: script_index as i16,
            script_id: needs_script_id.then_some([0; 16]),
            ..Default::default()
        }
    }

    /// Script index as stored in the directory, [`NO_SCRIPT_INDEX`] for plain classes
    pub const fn script_index(&self) -> u16 {
        self.script_type_index as u16
    }

    pub fn read<R: Read + Seek>(
        reader: &mut EndianReader<R>,
        version: u32,
        has_type_tree: bool,
        is_ref_type: bool,
    ) -> Result<Self> {
        let class_id = reader.read_i32()?;
        let is_stripped = if version >= 16 {
            reader.read_bool()?
        } else {
            false
        };
        let script_type_index = if version >= 17 {
            reader.read_i16()?
        } else {
            -1
        };

        let mut script_id = None;
        let mut type_hash = [0; 16];
        if version >= 13 {
            if (is_ref_type && script_type_index >= 0)
                || (version < 16 && class_id < 0)
                || (version >= 16 && class_id == MONO_BEHAVIOUR_CLASS_ID)
            {
                script_id = Some(reader.read_array()?);
            }
            type_hash = reader.read_array()?;
        }

        let type_tree = if has_type_tree {
            Some(TypeTree::read(reader, version)?)
        } else {
            None
        };

        let mut type_dependencies = Vec::new();
        let mut type_reference = None;
        if version >= 21 {
            if is_ref_type {
                type_reference = Some(TypeReference {
                    class_name: reader.read_null_terminated()?,
                    namespace: reader.read_null_terminated()?,
                    assembly_name: reader.read_null_terminated()?,
                });
            } else {
                let count = read_count(reader)?;
                for _ in 0..count {
                    type_dependencies.push(reader.read_i32()?);
                }
            }
        }

        trace!(class_id, script_type_index, "read type entry");
        Ok(SerializedType {
            class_id,
            is_stripped,
            script_type_index,
            script_id,
            type_hash,
            type_tree,
            type_dependencies,
            type_reference,
        })
    }

    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        version: u32,
        has_type_tree: bool,
        is_ref_type: bool,
    ) -> Result<()> {
        writer.write_i32(self.class_id)?;
        if version >= 16 {
            writer.write_bool(self.is_stripped)?;
        }
        if version >= 17 {
            writer.write_i16(self.script_type_index)?;
        }
        if version >= 13 {
            if let Some(script_id) = &self.script_id {
                writer.write_bytes(script_id)?;
            }
            writer.write_bytes(&self.type_hash)?;
        }

        if has_type_tree {
            match &self.type_tree {
                Some(tree) => tree.write(writer, version)?,
                // An entry added without a schema still needs an empty blob
                None if TypeTree::uses_blob(version) => TypeTree::default().write(writer, version)?,
                None => {
                    return Err(Error::MissingTypeInfo {
                        class_id: self.class_id,
                        script_index: self.script_index(),
                    })
                }
            }
        }

        if version >= 21 {
            if is_ref_type {
                let reference = self.type_reference.clone().unwrap_or_default();
                writer.write_null_terminated(&reference.class_name)?;
                writer.write_null_terminated(&reference.namespace)?;
                writer.write_null_terminated(&reference.assembly_name)?;
            } else {
                writer.write_i32(self.type_dependencies.len() as i32)?;
                for dependency in &self.type_dependencies {
                    writer.write_i32(*dependency)?;
                }
            }
        }
        Ok(())
    }
}

/// Directory entry describing where one object's bytes live
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectInfo {
    pub path_id: i64,
    /// Offset relative to the header's data offset
    pub byte_start: u64,
    pub byte_size: u32,
    /// Class id before format 16, an index into the type table since
    pub type_id: i32,
    /// Format 15 and older
    pub class_id: u16,
    /// Format 10 and older
    pub is_destroyed: u16,
    /// Formats 11 to 16
    pub script_type_index: i16,
    /// Formats 15 and 16
    pub stripped: u8,
}

impl ObjectInfo {
    pub fn read<R: Read + Seek>(
        reader: &mut EndianReader<R>,
        version: u32,
        big_id_enabled: bool,
    ) -> Result<Self> {
        let path_id = if big_id_enabled {
            reader.read_i64()?
        } else if version < 14 {
            reader.read_i32()? as i64
        } else {
            reader.align4()?;
            reader.read_i64()?
        };
        let byte_start = if version >= 22 {
            reader.read_i64()? as u64
        } else {
            reader.read_u32()? as u64
        };
        let byte_size = reader.read_u32()?;
        let type_id = reader.read_i32()?;
        let class_id = if version < 16 { reader.read_u16()? } else { 0 };
        let is_destroyed = if version < 11 { reader.read_u16()? } else { 0 };
        let script_type_index = if (11..17).contains(&version) {
            reader.read_i16()?
        } else {
            -1
        };
        let stripped = if version == 15 || version == 16 {
            reader.read_u8()?
        } else {
            0
        };

        Ok(ObjectInfo {
            path_id,
            byte_start,
            byte_size,
            type_id,
            class_id,
            is_destroyed,
            script_type_index,
            stripped,
        })
    }

    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        version: u32,
        big_id_enabled: bool,
    ) -> Result<()> {
        if big_id_enabled {
            writer.write_i64(self.path_id)?;
        } else if version < 14 {
            writer.write_i32(self.path_id as i32)?;
        } else {
            writer.align4()?;
            writer.write_i64(self.path_id)?;
        }
        if version >= 22 {
            writer.write_i64(self.byte_start as i64)?;
        } else {
            writer.write_u32(self.byte_start as u32)?;
        }
        writer.write_u32(self.byte_size)?;
        writer.write_i32(self.type_id)?;
        if version < 16 {
            writer.write_u16(self.class_id)?;
        }
        if version < 11 {
            writer.write_u16(self.is_destroyed)?;
        }
        if (11..17).contains(&version) {
            writer.write_i16(self.script_type_index)?;
        }
        if version == 15 || version == 16 {
            writer.write_u8(self.stripped)?;
        }
        Ok(())
    }

    /// Encoded size of one entry, excluding alignment before the next one
    pub const fn encoded_size(version: u32, big_id_enabled: bool) -> u64 {
        let mut size = if big_id_enabled || version >= 14 { 8 } else { 4 };
        size += if version >= 22 { 8 } else { 4 };
        size += 8;
        if version < 16 {
            size += 2;
        }
        if version < 11 {
            size += 2;
        }
        if version >= 11 && version < 17 {
            size += 2;
        }
        if version == 15 || version == 16 {
            size += 1;
        }
        size
    }
}

/// Byte length of a directory of `count` entries, starting at an aligned offset
///
/// Entries of formats 15 and 16 are not a multiple of 4 bytes long, so every entry
/// but the last is followed by padding.
pub const fn directory_byte_len(version: u32, big_id_enabled: bool, count: u64) -> u64 {
    let size = ObjectInfo::encoded_size(version, big_id_enabled);
    if count == 0 {
        0
    } else if version >= 0x0F && version <= 0x10 {
        ((size + 3) >> 2 << 2) * (count - 1) + size
    } else {
        size * count
    }
}

/// Reference to an object in this or a dependent file
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssetPPtr {
    /// Zero for this file, otherwise one plus the dependency index
    pub file_id: i32,
    pub path_id: i64,
}

impl AssetPPtr {
    pub fn read<R: Read + Seek>(reader: &mut EndianReader<R>, version: u32) -> Result<Self> {
        let file_id = reader.read_i32()?;
        let path_id = if version < 14 {
            reader.read_i32()? as i64
        } else {
            reader.align4()?;
            reader.read_i64()?
        };
        Ok(AssetPPtr { file_id, path_id })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        writer.write_i32(self.file_id)?;
        if version < 14 {
            writer.write_i32(self.path_id as i32)
        } else {
            writer.align4()?;
            writer.write_i64(self.path_id)
        }
    }
}

/// An external file referenced by this one
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssetsFileDependency {
    pub buffered_path: String,
    pub guid: [u8; 16],
    pub kind: i32,
    /// Path with builtin resource files moved under `Resources/`
    pub asset_path: String,
    /// Path exactly as stored in the file
    pub original_asset_path: String,
}

impl AssetsFileDependency {
    /// A dependency on `asset_path`, normalizing builtin resource paths
    pub fn new(asset_path: impl Into<String>, guid: [u8; 16], kind: i32) -> Self {
        let original_asset_path = asset_path.into();
        AssetsFileDependency {
            buffered_path: String::new(),
            guid,
            kind,
            asset_path: normalize_asset_path(&original_asset_path),
            original_asset_path,
        }
    }

    pub fn read<R: Read + Seek>(reader: &mut EndianReader<R>, version: u32) -> Result<Self> {
        let buffered_path = if version >= 6 {
            reader.read_null_terminated()?
        } else {
            String::new()
        };
        let (guid, kind) = if version >= 5 {
            (reader.read_array()?, reader.read_i32()?)
        } else {
            ([0; 16], 0)
        };
        let original_asset_path = reader.read_null_terminated()?;

        Ok(AssetsFileDependency {
            buffered_path,
            guid,
            kind,
            asset_path: normalize_asset_path(&original_asset_path),
            original_asset_path,
        })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        if version >= 6 {
            writer.write_null_terminated(&self.buffered_path)?;
        }
        if version >= 5 {
            writer.write_bytes(&self.guid)?;
            writer.write_i32(self.kind)?;
        }
        writer.write_null_terminated(self.stored_asset_path())
    }

    /// The path to write back, undoing the `Resources/` prefix added on read
    pub fn stored_asset_path(&self) -> &str {
        let builtin = BUILTIN_RESOURCE_SUFFIXES
            .iter()
            .any(|suffix| self.asset_path.ends_with(suffix));
        if builtin && !self.original_asset_path.is_empty() {
            &self.original_asset_path
        } else {
            &self.asset_path
        }
    }
}

fn normalize_asset_path(path: &str) -> String {
    if BUILTIN_RESOURCE_SUFFIXES
        .iter()
        .any(|suffix| path.ends_with(suffix))
    {
        format!("Resources/{path}")
    } else {
        path.to_string()
    }
}

/// Everything between the header and the object data
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AssetsFileMetadata {
    pub unity_version: String,
    pub target_platform: u32,
    /// Implied for formats older than 13
    pub has_type_tree: bool,
    pub types: Vec<SerializedType>,
    /// Formats 7 to 13 can switch every path id to 64 bits
    pub big_id_enabled: i32,
    pub objects: Vec<ObjectInfo>,
    /// Formats 12 and newer
    pub preloads: Vec<AssetPPtr>,
    pub dependencies: Vec<AssetsFileDependency>,
    /// Formats 20 and newer
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
}

impl AssetsFileMetadata {
    /// Read the metadata that follows a header of the given format version
    pub fn read<R: Read + Seek>(reader: &mut EndianReader<R>, version: u32) -> Result<Self> {
        let mut metadata = AssetsFileMetadata {
            has_type_tree: true,
            ..Default::default()
        };

        if version >= 7 {
            metadata.unity_version = reader.read_null_terminated()?;
        }
        if version >= 8 {
            metadata.target_platform = reader.read_u32()?;
        }
        if version >= 13 {
            metadata.has_type_tree = reader.read_bool()?;
        }

        let type_count = read_count(reader)?;
        for _ in 0..type_count {
            metadata.types.push(SerializedType::read(
                reader,
                version,
                metadata.has_type_tree,
                false,
            )?);
        }

        if (7..14).contains(&version) {
            metadata.big_id_enabled = reader.read_i32()?;
        }

        let object_count = read_count(reader)?;
        let mut directory_start = reader.position()?;
        if version >= 14 && object_count > 0 {
            directory_start = (directory_start + 3) & !3;
        }
        for _ in 0..object_count {
            metadata.objects.push(ObjectInfo::read(
                reader,
                version,
                metadata.big_id_enabled != 0,
            )?);
        }
        let expected = directory_byte_len(version, metadata.big_id_enabled != 0, object_count as u64);
        let consumed = reader.position()? - directory_start;
        if consumed != expected {
            warn!(consumed, expected, "object directory length differs from its format");
        }

        if version > 0x0B {
            let count = read_count(reader)?;
            for _ in 0..count {
                metadata.preloads.push(AssetPPtr::read(reader, version)?);
            }
        }

        let count = read_count(reader)?;
        for _ in 0..count {
            metadata
                .dependencies
                .push(AssetsFileDependency::read(reader, version)?);
        }

        if version >= 20 {
            let count = read_count(reader)?;
            for _ in 0..count {
                metadata.ref_types.push(SerializedType::read(
                    reader,
                    version,
                    metadata.has_type_tree,
                    true,
                )?);
            }
        }

        if version >= 5 {
            metadata.user_information = reader.read_null_terminated()?;
        }

        Ok(metadata)
    }

    /// Write the fields up to and including the type table
    pub fn write_types<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        if version >= 7 {
            writer.write_null_terminated(&self.unity_version)?;
        }
        if version >= 8 {
            writer.write_u32(self.target_platform)?;
        }
        if version >= 13 {
            writer.write_bool(self.has_type_tree)?;
        }
        writer.write_i32(self.types.len() as i32)?;
        for serialized_type in &self.types {
            serialized_type.write(writer, version, self.has_type_tree, false)?;
        }
        if (7..14).contains(&version) {
            writer.write_i32(self.big_id_enabled)?;
        }
        Ok(())
    }

    /// Write the object count and the given directory entries
    pub fn write_objects<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        version: u32,
        objects: &[ObjectInfo],
    ) -> Result<()> {
        writer.write_i32(objects.len() as i32)?;
        for object in objects {
            object.write(writer, version, self.big_id_enabled != 0)?;
        }
        Ok(())
    }

    /// Write everything that follows the object directory
    pub fn write_externals<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        version: u32,
    ) -> Result<()> {
        if version > 0x0B {
            writer.write_i32(self.preloads.len() as i32)?;
            for preload in &self.preloads {
                preload.write(writer, version)?;
            }
        }

        writer.write_i32(self.dependencies.len() as i32)?;
        for dependency in &self.dependencies {
            dependency.write(writer, version)?;
        }

        if version >= 20 {
            writer.write_i32(self.ref_types.len() as i32)?;
            for ref_type in &self.ref_types {
                ref_type.write(writer, version, self.has_type_tree, true)?;
            }
        }

        if version >= 5 {
            writer.write_null_terminated(&self.user_information)?;
        }
        Ok(())
    }

    /// Write the whole metadata region
    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>, version: u32) -> Result<()> {
        self.write_types(writer, version)?;
        self.write_objects(writer, version, &self.objects)?;
        self.write_externals(writer, version)
    }
}

fn read_count<R: Read + Seek>(reader: &mut EndianReader<R>) -> Result<usize> {
    let count = reader.read_i32()?;
    if count < 0 {
        return Err(Error::InvalidLength(count as i64));
    }
    Ok(count as usize)
}
