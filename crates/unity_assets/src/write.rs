//! Writing assets files with pending edits applied
//!

use std::io::{self, Cursor, Read, Seek, Write};

use binrw::BinWrite;
use tracing::{debug, instrument, trace};

use crate::endian::EndianWriter;
use crate::error::{Error, Result};
use crate::read::AssetsFile;
use crate::replacer::{AssetsReplacer, ReplacerContent, ReplacerSet};
use crate::types::{ObjectInfo, SerializedType, NO_SCRIPT_INDEX};

/// Smallest offset at which object data may start
const MIN_DATA_OFFSET: u64 = 0x1000;

/// Bytes of the header not counted in the metadata size
const METADATA_SIZE_BIAS: u64 = 0x13;

/// Extra header bytes of format 22 and newer, also excluded from the metadata size
const LARGE_HEADER_BIAS: u64 = 0x1c;

enum ObjectSource<'a> {
    Original(ObjectInfo),
    Replacer(&'a ReplacerContent),
}

impl<R: Read + Seek> AssetsFile<R> {
    /// Write the file with `replacers` applied, starting at the writer's position
    ///
    /// Objects without a replacer are copied from this file. The directory of the
    /// new file is sorted by path id and its offsets are patched in once every
    /// object has been written.
    ///
    /// ```
    /// # fn doit(assets: &mut unity_assets::AssetsFile<std::fs::File>) -> unity_assets::error::Result<()> {
    /// use std::io::Cursor;
    /// use unity_assets::{AssetsReplacer, ReplacerSet};
    ///
    /// let mut replacers = ReplacerSet::new();
    /// replacers.insert(AssetsReplacer::remove(3));
    /// let written = assets.write(Cursor::new(Vec::new()), &replacers)?;
    /// assert!(!written.into_inner().is_empty());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, writer, replacers), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W, replacers: &ReplacerSet) -> Result<W> {
        let version = self.header.version;
        let mut header = self.header;
        let mut metadata = self.metadata.clone();

        for replacer in replacers.iter() {
            if let AssetsReplacer::Remove { path_id } = replacer {
                if self.object_by_path_id(*path_id).is_none() {
                    return Err(Error::ReplacerTargetNotFound(*path_id));
                }
            }
        }

        // Every class introduced by a replacer needs a type table entry
        for replacer in replacers.iter() {
            if let AssetsReplacer::AddOrModify {
                class_id,
                script_index,
                ..
            } = replacer
            {
                let known = metadata.types.iter().any(|entry| {
                    entry.class_id == *class_id && entry.script_index() == *script_index
                });
                if !known {
                    trace!(class_id, script_index, "synthesizing type table entry");
                    metadata.types.push(SerializedType::synthesized(
                        *class_id,
                        *script_index,
                        version,
                    ));
                }
            }
        }

        let mut plan: Vec<(ObjectInfo, ObjectSource)> = Vec::new();
        for object in &self.metadata.objects {
            if replacers.contains(object.path_id) {
                continue;
            }
            plan.push((*object, ObjectSource::Original(*object)));
        }
        for replacer in replacers.iter() {
            if let AssetsReplacer::AddOrModify {
                path_id,
                class_id,
                script_index,
                content,
            } = replacer
            {
                let existing = self
                    .object_by_path_id(*path_id)
                    .filter(|object| {
                        self.class_id_of(object) == *class_id
                            && self.script_index_of(object) == *script_index
                    })
                    .copied();
                let type_id = match existing {
                    Some(object) => object.type_id,
                    None => type_id_for(&metadata.types, version, *class_id, *script_index),
                };

                let object = ObjectInfo {
                    path_id: *path_id,
                    type_id,
                    class_id: *class_id as u16,
                    script_type_index: *script_index as i16,
                    ..Default::default()
                };
                plan.push((object, ObjectSource::Replacer(content)));
            }
        }
        plan.sort_by_key(|(object, _)| object.path_id);

        let mut writer = EndianWriter::new(writer, header.is_big_endian());
        let start = writer.position()?;

        header.write(&mut writer)?;
        metadata.write_types(&mut writer, version)?;

        let directory_position = writer.position()?;
        let mut objects: Vec<ObjectInfo> = plan.iter().map(|(object, _)| *object).collect();
        metadata.write_objects(&mut writer, version, &objects)?;
        metadata.write_externals(&mut writer, version)?;

        let metadata_end = writer.position()? - start;
        let mut metadata_size = metadata_end - METADATA_SIZE_BIAS;
        if version >= 22 {
            metadata_size -= LARGE_HEADER_BIAS;
        }

        let padding = if metadata_end < MIN_DATA_OFFSET {
            MIN_DATA_OFFSET - metadata_end
        } else if metadata_end % 16 == 0 {
            16
        } else {
            16 - metadata_end % 16
        };
        write_zeros(&mut writer, padding)?;
        let data_offset = metadata_end + padding;

        let last = plan.len().saturating_sub(1);
        for (index, (object, source)) in plan.iter().enumerate() {
            let object_start = writer.position()?;
            match source {
                ObjectSource::Replacer(content) => content.write(&mut writer)?,
                ObjectSource::Original(original) => self.copy_object(original, &mut writer)?,
            }
            let object_end = writer.position()?;

            let entry = &mut objects[index];
            entry.byte_start = object_start - start - data_offset;
            entry.byte_size = (object_end - object_start) as u32;
            trace!(
                path_id = object.path_id,
                byte_start = entry.byte_start,
                byte_size = entry.byte_size,
                "wrote object"
            );

            if index != last {
                let relative = object_end - start;
                write_zeros(&mut writer, (8 - relative % 8) % 8)?;
            }
        }

        let file_size = writer.position()? - start;
        header.set_layout(metadata_size, file_size, data_offset)?;

        writer.set_position(start)?;
        header.write(&mut writer)?;
        writer.set_position(directory_position)?;
        metadata.write_objects(&mut writer, version, &objects)?;
        writer.set_position(start + file_size)?;

        debug!(objects = objects.len(), file_size, "wrote assets file");
        Ok(writer.into_inner())
    }

    /// Write the file with `replacers` applied into a new buffer
    pub fn write_to_vec(&mut self, replacers: &ReplacerSet) -> Result<Vec<u8>> {
        Ok(self.write(Cursor::new(Vec::new()), replacers)?.into_inner())
    }

    fn copy_object<W: Write + Seek>(
        &mut self,
        object: &ObjectInfo,
        writer: &mut EndianWriter<W>,
    ) -> Result<()> {
        let offset = self.object_offset(object)?;
        let reader = self.reader_mut();
        reader.set_position(offset)?;

        let copied = io::copy(&mut reader.take(object.byte_size as u64), writer)?;
        if copied != object.byte_size as u64 {
            return Err(Error::ObjectOutOfBounds {
                path_id: object.path_id,
            });
        }
        Ok(())
    }
}

/// The value stored in a new directory entry's type field
///
/// Before format 16 it holds the class id itself, later formats store an index
/// into the type table.
fn type_id_for(types: &[SerializedType], version: u32, class_id: i32, script_index: u16) -> i32 {
    if version < 0x10 {
        return class_id;
    }
    types
        .iter()
        .position(|entry| {
            entry.class_id == class_id
                && (script_index == NO_SCRIPT_INDEX || entry.script_index() == script_index)
        })
        .map_or(-1, |index| index as i32)
}

fn write_zeros<W: Write>(writer: &mut W, count: u64) -> Result<()> {
    io::copy(&mut io::repeat(0).take(count), writer)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::type_id_for;
    use crate::types::{SerializedType, NO_SCRIPT_INDEX};

    #[test]
    fn type_ids_follow_version() {
        let types = vec![
            SerializedType::synthesized(1, NO_SCRIPT_INDEX, 17),
            SerializedType::synthesized(114, 0, 17),
            SerializedType::synthesized(114, 1, 17),
        ];

        assert_eq!(type_id_for(&types, 15, 114, 1), 114);
        assert_eq!(type_id_for(&types, 17, 1, NO_SCRIPT_INDEX), 0);
        assert_eq!(type_id_for(&types, 17, 114, 1), 2);
        assert_eq!(type_id_for(&types, 17, 114, NO_SCRIPT_INDEX), 1);
        assert_eq!(type_id_for(&types, 17, 28, NO_SCRIPT_INDEX), -1);
    }
}
