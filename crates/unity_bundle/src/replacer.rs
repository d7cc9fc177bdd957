//! Pending edits applied when a bundle is written
//!

use std::io::{Cursor, Seek, Write};

use indexmap::IndexMap;
use unity_assets::{AssetsFile, ReplacerSet};

use crate::error::Result;

/// New data for an added or modified entry
#[derive(Debug, Clone, PartialEq)]
pub enum BundleContent {
    /// Raw bytes written verbatim
    Bytes(Vec<u8>),
    /// A serialized assets file, rewritten with `replacers` applied while the
    /// bundle is written
    Assets {
        data: Vec<u8>,
        replacers: ReplacerSet,
    },
}

impl BundleContent {
    /// Whether the content is a serialized assets file
    pub const fn is_serialized(&self) -> bool {
        matches!(self, BundleContent::Assets { .. })
    }

    /// Write the content at the writer's position
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        match self {
            BundleContent::Bytes(bytes) => writer.write_all(bytes)?,
            BundleContent::Assets { data, replacers } => {
                let mut assets = AssetsFile::new(Cursor::new(data.as_slice()))?;
                assets.write(&mut *writer, replacers)?;
            }
        }
        Ok(())
    }
}

impl From<Vec<u8>> for BundleContent {
    fn from(value: Vec<u8>) -> Self {
        BundleContent::Bytes(value)
    }
}

/// An edit to one entry, identified by its original name
#[derive(Debug, Clone, PartialEq)]
pub enum BundleReplacer {
    /// Replace the entry's data, or add the entry if the name is new
    AddOrModify { name: String, content: BundleContent },
    /// Keep the entry's bytes under a new name
    Rename { original: String, name: String },
    /// Drop the entry
    Remove { name: String },
}

impl BundleReplacer {
    pub fn add_or_modify(name: impl Into<String>, content: impl Into<BundleContent>) -> Self {
        BundleReplacer::AddOrModify {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn rename(original: impl Into<String>, name: impl Into<String>) -> Self {
        BundleReplacer::Rename {
            original: original.into(),
            name: name.into(),
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        BundleReplacer::Remove { name: name.into() }
    }

    /// Name of the entry the replacer applies to
    pub fn original_name(&self) -> &str {
        match self {
            BundleReplacer::AddOrModify { name, .. } | BundleReplacer::Remove { name } => name,
            BundleReplacer::Rename { original, .. } => original,
        }
    }

    /// Name of the entry once the replacer has been applied
    pub fn entry_name(&self) -> &str {
        match self {
            BundleReplacer::AddOrModify { name, .. }
            | BundleReplacer::Rename { name, .. }
            | BundleReplacer::Remove { name } => name,
        }
    }
}

/// Replacers keyed by original entry name, a later replacer for the same entry wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleReplacerSet {
    replacers: IndexMap<String, BundleReplacer>,
}

impl BundleReplacerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replacer, returning the one it supersedes
    pub fn insert(&mut self, replacer: BundleReplacer) -> Option<BundleReplacer> {
        self.replacers
            .insert(replacer.original_name().to_string(), replacer)
    }

    pub fn get(&self, name: &str) -> Option<&BundleReplacer> {
        self.replacers.get(name)
    }

    pub fn len(&self) -> usize {
        self.replacers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacers.is_empty()
    }

    /// Replacers in the order their entries were first inserted
    pub fn iter(&self) -> impl Iterator<Item = &BundleReplacer> {
        self.replacers.values()
    }
}

impl FromIterator<BundleReplacer> for BundleReplacerSet {
    fn from_iter<T: IntoIterator<Item = BundleReplacer>>(iter: T) -> Self {
        let mut set = BundleReplacerSet::new();
        for replacer in iter {
            set.insert(replacer);
        }
        set
    }
}

#[cfg(test)]
mod test {
    use super::{BundleReplacer, BundleReplacerSet};

    #[test]
    fn later_replacers_win() {
        let mut set = BundleReplacerSet::new();
        set.insert(BundleReplacer::add_or_modify("CAB-a", vec![1]));
        set.insert(BundleReplacer::rename("CAB-b", "CAB-c"));
        let previous = set.insert(BundleReplacer::remove("CAB-a"));

        assert_eq!(previous, Some(BundleReplacer::add_or_modify("CAB-a", vec![1])));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("CAB-a"), Some(&BundleReplacer::remove("CAB-a")));
        assert_eq!(set.get("CAB-b").map(BundleReplacer::entry_name), Some("CAB-c"));
    }
}
