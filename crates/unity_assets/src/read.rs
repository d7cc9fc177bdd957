//! Types for reading assets files
//!

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use binrw::BinRead;
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::endian::EndianReader;
use crate::error::{Error, ObjectNotFoundError, Result};
use crate::template::{ClassDatabase, TemplateField};
use crate::types::{
    AssetsFileHeader, AssetsFileMetadata, ObjectInfo, SerializedType, MIN_FORMAT_VERSION,
    NO_SCRIPT_INDEX,
};
use crate::value::AssetInstance;
use crate::version::UnityVersion;

/// Newest format version accepted, anything above is treated as garbage
const MAX_FORMAT_VERSION: u32 = 99;

/// Assets file reader
///
/// Objects are not decoded up front. The directory gives each object's byte range
/// and value trees are built on request with [`AssetsFile::instance`].
///
/// ```no_run
/// use std::fs::File;
///
/// fn list_objects(file: File) -> unity_assets::error::Result<()> {
///     let mut assets = unity_assets::AssetsFile::new(file)?;
///
///     for index in 0..assets.len() {
///         let object = *assets.by_index(index)?;
///         let class_id = assets.class_id_of(&object);
///         println!("{} class {} ({} bytes)", object.path_id, class_id, object.byte_size);
///     }
///
///     Ok(())
/// }
/// ```
pub struct AssetsFile<R> {
    reader: EndianReader<R>,
    pub(crate) header: AssetsFileHeader,
    pub(crate) metadata: AssetsFileMetadata,
    path_ids: IndexMap<i64, usize>,
    templates: HashMap<(i32, u16), Arc<TemplateField>>,
    stream_len: u64,
}

impl<R> Debug for AssetsFile<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AssetsFile")
            .field("header", &self.header)
            .field("unity_version", &self.metadata.unity_version)
            .field("objects", &self.metadata.objects.len())
            .finish()
    }
}

impl<R> AssetsFile<R> {
    pub fn header(&self) -> &AssetsFileHeader {
        &self.header
    }

    pub fn metadata(&self) -> &AssetsFileMetadata {
        &self.metadata
    }

    /// Format version of the file
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Engine version that wrote the file, if it can be parsed
    pub fn unity_version(&self) -> Option<UnityVersion> {
        self.metadata.unity_version.parse().ok()
    }

    /// Number of objects in the directory
    pub fn len(&self) -> usize {
        self.metadata.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Directory entries in file order
    pub fn objects(&self) -> impl Iterator<Item = &ObjectInfo> {
        self.metadata.objects.iter()
    }

    pub fn object_by_path_id(&self, path_id: i64) -> Option<&ObjectInfo> {
        self.path_ids
            .get(&path_id)
            .map(|&index| &self.metadata.objects[index])
    }

    pub fn by_index(&self, index: usize) -> Result<&ObjectInfo> {
        self.metadata
            .objects
            .get(index)
            .ok_or(Error::ObjectNotFound(ObjectNotFoundError::Index(index)))
    }

    /// Class id of an object, resolving the type table index of newer formats
    pub fn class_id_of(&self, object: &ObjectInfo) -> i32 {
        if self.header.version >= 16 {
            self.type_entry(object)
                .map(|entry| entry.class_id)
                .unwrap_or(object.type_id)
        } else {
            object.type_id
        }
    }

    /// Script index of an object, [`NO_SCRIPT_INDEX`] for unscripted objects
    pub fn script_index_of(&self, object: &ObjectInfo) -> u16 {
        let version = self.header.version;
        if version >= 16 {
            self.type_entry(object)
                .map(SerializedType::script_index)
                .unwrap_or(NO_SCRIPT_INDEX)
        } else if version >= 11 {
            object.script_type_index as u16
        } else {
            NO_SCRIPT_INDEX
        }
    }

    fn type_entry(&self, object: &ObjectInfo) -> Option<&SerializedType> {
        usize::try_from(object.type_id)
            .ok()
            .and_then(|index| self.metadata.types.get(index))
    }

    /// Unwrap and return the inner reader
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read + Seek> AssetsFile<R> {
    /// Read the header and metadata of an assets file starting at offset 0 of `reader`
    #[instrument(skip(reader), err)]
    pub fn new(reader: R) -> Result<AssetsFile<R>> {
        let mut reader = EndianReader::new(reader, true);
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.set_position(0)?;

        let header = AssetsFileHeader::read(&mut reader)?;
        if header.version > MAX_FORMAT_VERSION {
            return Err(Error::InvalidAssetsFile);
        }
        if header.version < MIN_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(header.version));
        }

        reader.set_big_endian(header.is_big_endian());
        let metadata = AssetsFileMetadata::read(&mut reader, header.version)?;

        let path_ids = metadata
            .objects
            .iter()
            .enumerate()
            .map(|(index, object)| (object.path_id, index))
            .collect();

        debug!(
            version = header.version,
            unity_version = metadata.unity_version,
            types = metadata.types.len(),
            objects = metadata.objects.len(),
            "read assets file metadata"
        );

        Ok(AssetsFile {
            reader,
            header,
            metadata,
            path_ids,
            templates: HashMap::new(),
            stream_len,
        })
    }

    /// Absolute offset of an object's data, checked against the stream length
    pub(crate) fn object_offset(&self, object: &ObjectInfo) -> Result<u64> {
        let end = self
            .header
            .data_offset()
            .checked_add(object.byte_start)
            .and_then(|start| Some((start, start.checked_add(object.byte_size as u64)?)));
        match end {
            Some((start, end)) if end <= self.stream_len => Ok(start),
            _ => Err(Error::ObjectOutOfBounds {
                path_id: object.path_id,
            }),
        }
    }

    /// Raw bytes of an object
    pub fn read_object(&mut self, path_id: i64) -> Result<Vec<u8>> {
        let object = *self
            .object_by_path_id(path_id)
            .ok_or(Error::ObjectNotFound(ObjectNotFoundError::PathId(path_id)))?;
        let offset = self.object_offset(&object)?;
        self.reader.set_position(offset)?;
        self.reader.read_bytes(object.byte_size as usize)
    }

    /// Template for a class and script index
    ///
    /// The embedded type tree is preferred, `database` is consulted for files that
    /// were built without type trees. Templates are cached per class and script index.
    pub fn template_for(
        &mut self,
        class_id: i32,
        script_index: u16,
        database: Option<&dyn ClassDatabase>,
    ) -> Result<Arc<TemplateField>> {
        if let Some(template) = self.templates.get(&(class_id, script_index)) {
            return Ok(Arc::clone(template));
        }

        let embedded = self.metadata.types.iter().find(|entry| {
            entry.class_id == class_id
                && (script_index == NO_SCRIPT_INDEX || entry.script_index() == script_index)
        });
        let template = self.build_template(embedded, class_id, script_index, database)?;
        self.templates
            .insert((class_id, script_index), Arc::clone(&template));
        Ok(template)
    }

    fn build_template(
        &self,
        embedded: Option<&SerializedType>,
        class_id: i32,
        script_index: u16,
        database: Option<&dyn ClassDatabase>,
    ) -> Result<Arc<TemplateField>> {
        let has_nodes = embedded
            .and_then(|entry| entry.type_tree.as_ref())
            .is_some_and(|tree| !tree.nodes.is_empty());
        if let (true, Some(entry)) = (has_nodes, embedded) {
            return Ok(Arc::new(TemplateField::from_type_tree(entry)?));
        }

        database
            .and_then(|database| database.template(class_id))
            .map(Arc::new)
            .ok_or(Error::MissingTypeInfo {
                class_id,
                script_index,
            })
    }

    /// Template of a specific object, using its exact type table entry when the
    /// format stores one
    pub fn template_for_object(
        &mut self,
        object: &ObjectInfo,
        database: Option<&dyn ClassDatabase>,
    ) -> Result<Arc<TemplateField>> {
        let class_id = self.class_id_of(object);
        let script_index = self.script_index_of(object);
        if self.header.version >= 16 {
            if let Some(template) = self.templates.get(&(class_id, script_index)) {
                return Ok(Arc::clone(template));
            }
            let template =
                self.build_template(self.type_entry(object), class_id, script_index, database)?;
            self.templates
                .insert((class_id, script_index), Arc::clone(&template));
            return Ok(template);
        }
        self.template_for(class_id, script_index, database)
    }

    /// Decode an object into a value tree
    #[instrument(skip(self, database), err)]
    pub fn instance(
        &mut self,
        path_id: i64,
        database: Option<&dyn ClassDatabase>,
    ) -> Result<AssetInstance> {
        let object = *self
            .object_by_path_id(path_id)
            .ok_or(Error::ObjectNotFound(ObjectNotFoundError::PathId(path_id)))?;
        let template = self.template_for_object(&object, database)?;
        let offset = self.object_offset(&object)?;

        self.reader.set_position(offset)?;
        let instance = AssetInstance::new(template, &mut self.reader)?;

        let consumed = self.reader.position()? - offset;
        if consumed != object.byte_size as u64 {
            warn!(
                path_id,
                consumed,
                byte_size = object.byte_size,
                "decoded object size differs from its directory entry"
            );
        }
        Ok(instance)
    }

    pub(crate) fn reader_mut(&mut self) -> &mut EndianReader<R> {
        &mut self.reader
    }
}

/// Smallest byte range that can hold an assets file header and a version string
const MIN_PROBE_LEN: u64 = 0x30;

/// Longest engine version string the probe accepts
const MAX_PROBE_VERSION_LEN: usize = 0xFF;

/// Check whether `length` bytes at `offset` look like a serialized assets file
///
/// This is a heuristic over the header and the engine version string that follows
/// it, not a full parse. Bundle signatures are rejected so a nested bundle is never
/// mistaken for an assets file.
pub fn is_assets_file<R: Read + Seek>(reader: &mut R, offset: u64, length: u64) -> Result<bool> {
    if length < MIN_PROBE_LEN {
        return Ok(false);
    }

    let mut reader = EndianReader::new(reader, true);
    reader.set_position(offset)?;
    let signature = reader.read_array::<5>()?;
    if signature.starts_with(b"Unity") || signature.starts_with(b"MZ") || signature.starts_with(b"FSB5") {
        return Ok(false);
    }

    reader.set_position(offset)?;
    if reader.read_u32()? < 8 {
        return Ok(false);
    }

    reader.set_position(offset + 0x08)?;
    let format = reader.read_i32()?;
    if format > MAX_FORMAT_VERSION as i32 {
        return Ok(false);
    }

    let version_start = if format >= 22 { 0x30 } else { 0x14 };
    let end = offset + length;
    reader.set_position(offset + version_start)?;

    let mut version = Vec::new();
    while reader.position()? < end {
        match reader.read_u8()? {
            0 => break,
            byte => version.push(byte),
        }
        if version.len() > MAX_PROBE_VERSION_LEN {
            return Ok(false);
        }
    }

    Ok(!version.is_empty()
        && version
            .iter()
            .all(|byte| byte.is_ascii_alphanumeric() || *byte == b'.'))
}
