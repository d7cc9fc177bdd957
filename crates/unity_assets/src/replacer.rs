//! Pending edits applied when an assets file is written
//!

use std::io::{Seek, Write};

use indexmap::IndexMap;

use crate::endian::EndianWriter;
use crate::error::Result;
use crate::types::NO_SCRIPT_INDEX;
use crate::value::{AssetInstance, ValueField};

/// New data for an added or modified object
#[derive(Debug, Clone, PartialEq)]
pub enum ReplacerContent {
    /// Already encoded object bytes, written verbatim
    Bytes(Vec<u8>),
    /// A value tree, encoded in the file's byte order while writing
    Value(ValueField),
}

impl ReplacerContent {
    /// Write the content at the writer's position
    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>) -> Result<()> {
        match self {
            ReplacerContent::Bytes(bytes) => writer.write_bytes(bytes),
            ReplacerContent::Value(field) => field.write(writer),
        }
    }
}

impl From<Vec<u8>> for ReplacerContent {
    fn from(value: Vec<u8>) -> Self {
        ReplacerContent::Bytes(value)
    }
}

impl From<ValueField> for ReplacerContent {
    fn from(value: ValueField) -> Self {
        ReplacerContent::Value(value)
    }
}

impl From<AssetInstance> for ReplacerContent {
    fn from(value: AssetInstance) -> Self {
        ReplacerContent::Value(value.into_base_field())
    }
}

/// An edit to one object, identified by its path id
#[derive(Debug, Clone, PartialEq)]
pub enum AssetsReplacer {
    /// Replace the object's data, or add the object if the path id is new
    AddOrModify {
        path_id: i64,
        class_id: i32,
        /// [`NO_SCRIPT_INDEX`] for objects that are not scripted
        script_index: u16,
        content: ReplacerContent,
    },
    /// Drop the object from the file
    Remove { path_id: i64 },
}

impl AssetsReplacer {
    /// Add or replace an unscripted object
    pub fn add_or_modify(path_id: i64, class_id: i32, content: impl Into<ReplacerContent>) -> Self {
        AssetsReplacer::AddOrModify {
            path_id,
            class_id,
            script_index: NO_SCRIPT_INDEX,
            content: content.into(),
        }
    }

    pub fn remove(path_id: i64) -> Self {
        AssetsReplacer::Remove { path_id }
    }

    pub const fn path_id(&self) -> i64 {
        match self {
            AssetsReplacer::AddOrModify { path_id, .. } | AssetsReplacer::Remove { path_id } => {
                *path_id
            }
        }
    }
}

/// Replacers keyed by path id, a later replacer for the same object wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacerSet {
    replacers: IndexMap<i64, AssetsReplacer>,
}

impl ReplacerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replacer, returning the one it supersedes
    pub fn insert(&mut self, replacer: AssetsReplacer) -> Option<AssetsReplacer> {
        self.replacers.insert(replacer.path_id(), replacer)
    }

    pub fn get(&self, path_id: i64) -> Option<&AssetsReplacer> {
        self.replacers.get(&path_id)
    }

    pub fn contains(&self, path_id: i64) -> bool {
        self.replacers.contains_key(&path_id)
    }

    /// Drop the pending edit for an object
    pub fn remove(&mut self, path_id: i64) -> Option<AssetsReplacer> {
        self.replacers.shift_remove(&path_id)
    }

    pub fn len(&self) -> usize {
        self.replacers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacers.is_empty()
    }

    /// Replacers in the order their path ids were first inserted
    pub fn iter(&self) -> impl Iterator<Item = &AssetsReplacer> {
        self.replacers.values()
    }
}

impl FromIterator<AssetsReplacer> for ReplacerSet {
    fn from_iter<T: IntoIterator<Item = AssetsReplacer>>(iter: T) -> Self {
        let mut set = ReplacerSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<AssetsReplacer> for ReplacerSet {
    fn extend<T: IntoIterator<Item = AssetsReplacer>>(&mut self, iter: T) {
        for replacer in iter {
            self.insert(replacer);
        }
    }
}
