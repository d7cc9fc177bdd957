//! Writing a bundle with replacers applied
//!

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::read::BundleFile;
use crate::replacer::{BundleContent, BundleReplacer, BundleReplacerSet};
use crate::types::{
    BlockInfo, BundleHeader, BundleMetadata, DirectoryEntry, BLOCK_INFO_AT_END,
    BLOCK_INFO_NEEDS_PADDING, COMPRESSION_MASK, SERIALIZED_ENTRY, STREAMED_BLOCK,
};

/// Where the bytes of an output entry come from
enum EntrySource<'a> {
    Original(DirectoryEntry),
    Replacer(&'a BundleContent),
}

struct OutputEntry<'a> {
    name: String,
    flags: u32,
    source: EntrySource<'a>,
}

impl<R: Read + Seek> BundleFile<R> {
    /// Write this bundle with `replacers` applied
    ///
    /// The output is an uncompressed bundle with a single data block and the
    /// metadata right after the header. Entries keep their order, entries added by
    /// a replacer follow in the order the replacers were inserted. The source bundle
    /// must be stored uncompressed, see [`BundleFile::unpack`].
    ///
    /// ```no_run
    /// # fn doit(bundle: &mut unity_bundle::BundleFile<std::fs::File>) -> unity_bundle::error::Result<()> {
    /// use unity_bundle::{BundleReplacer, BundleReplacerSet};
    ///
    /// let replacers = BundleReplacerSet::from_iter([
    ///     BundleReplacer::rename("CAB-old", "CAB-new"),
    ///     BundleReplacer::add_or_modify("readme.txt", b"hello".to_vec()),
    /// ]);
    /// let output = std::fs::File::create("edited.bundle")?;
    /// bundle.write(output, &replacers)?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, writer, replacers), fields(replacers = replacers.len()), err)]
    pub fn write<W: Write + Seek>(
        &mut self,
        mut writer: W,
        replacers: &BundleReplacerSet,
    ) -> Result<W> {
        let metadata = self.plain_metadata()?.clone();
        let entries = plan_entries(&metadata.directory, replacers)?;

        let mut header = BundleHeader {
            size: 0,
            compressed_metadata_size: 0,
            decompressed_metadata_size: 0,
            flags: self.header().flags
                & !(BLOCK_INFO_AT_END | COMPRESSION_MASK | BLOCK_INFO_NEEDS_PADDING),
            ..self.header().clone()
        };

        let mut output = BundleMetadata {
            hash: [0; 16],
            blocks: vec![BlockInfo::default()],
            directory: entries
                .iter()
                .map(|entry| DirectoryEntry {
                    offset: 0,
                    size: 0,
                    flags: entry.flags,
                    name: entry.name.clone(),
                })
                .collect(),
        };

        let start = writer.stream_position()?;
        header.write_aligned(&mut writer)?;
        let metadata_start = writer.stream_position()?;
        writer.write_all(&output.to_bytes(&header)?)?;

        let data_start = writer.stream_position()?;
        for (entry, out) in entries.iter().zip(output.directory.iter_mut()) {
            let offset = writer.stream_position()?;
            match &entry.source {
                EntrySource::Original(original) => {
                    self.copy_entry_data(original, &mut writer)?;
                }
                EntrySource::Replacer(content) => content.write(&mut writer)?,
            }
            let end = writer.stream_position()?;
            out.offset = offset - data_start;
            out.size = end - offset;
            trace!(name = %out.name, offset = out.offset, size = out.size, "wrote entry");
        }
        let data_end = writer.stream_position()?;

        let data_len = data_end - data_start;
        let Ok(block_size) = u32::try_from(data_len) else {
            return Err(Error::CustomError(format!(
                "bundle data of {data_len} bytes does not fit in a single block"
            )));
        };
        output.blocks = vec![BlockInfo {
            uncompressed_size: block_size,
            compressed_size: block_size,
            flags: STREAMED_BLOCK,
        }];

        let info = output.to_bytes(&header)?;
        header.compressed_metadata_size = info.len() as u32;
        header.decompressed_metadata_size = info.len() as u32;
        header.size = data_end - start;

        writer.seek(SeekFrom::Start(metadata_start))?;
        writer.write_all(&info)?;
        writer.seek(SeekFrom::Start(start))?;
        header.write_aligned(&mut writer)?;
        writer.seek(SeekFrom::Start(data_end))?;

        debug!(
            entries = output.directory.len(),
            size = header.size,
            "wrote bundle"
        );
        Ok(writer)
    }

    /// Write this bundle with `replacers` applied into a new buffer
    pub fn write_to_vec(&mut self, replacers: &BundleReplacerSet) -> Result<Vec<u8>> {
        let writer = self.write(Cursor::new(Vec::new()), replacers)?;
        Ok(writer.into_inner())
    }
}

/// Resolve the replacers against the directory into the list of output entries
fn plan_entries<'a>(
    directory: &[DirectoryEntry],
    replacers: &'a BundleReplacerSet,
) -> Result<Vec<OutputEntry<'a>>> {
    for replacer in replacers.iter() {
        if let BundleReplacer::Remove { name } | BundleReplacer::Rename { original: name, .. } =
            replacer
        {
            if !directory.iter().any(|entry| &entry.name == name) {
                return Err(Error::ReplacerTargetNotFound(name.clone()));
            }
        }
    }

    let mut entries = Vec::with_capacity(directory.len());
    for original in directory {
        let entry = match replacers.get(&original.name) {
            None => OutputEntry {
                name: original.name.clone(),
                flags: original.flags,
                source: EntrySource::Original(original.clone()),
            },
            Some(BundleReplacer::Remove { .. }) => continue,
            Some(BundleReplacer::Rename { name, .. }) => OutputEntry {
                name: name.clone(),
                flags: original.flags,
                source: EntrySource::Original(original.clone()),
            },
            Some(BundleReplacer::AddOrModify { content, .. }) => OutputEntry {
                name: original.name.clone(),
                flags: original.flags,
                source: EntrySource::Replacer(content),
            },
        };
        entries.push(entry);
    }

    for replacer in replacers.iter() {
        let BundleReplacer::AddOrModify { name, content } = replacer else {
            continue;
        };
        if directory.iter().any(|entry| &entry.name == name) {
            continue;
        }
        entries.push(OutputEntry {
            name: name.clone(),
            flags: if content.is_serialized() { SERIALIZED_ENTRY } else { 0 },
            source: EntrySource::Replacer(content),
        });
    }

    Ok(entries)
}
