//! This library reads, edits and writes the serialized **assets** files of the *Unity* engine.
//!
//! # Assets File Format Documentation
//!
//! An assets file stores the objects of one scene or one bundle entry: game objects,
//! components, textures, scripts and so on. Each object is a flat byte blob whose layout
//! is described by a type tree, a schema either embedded in the file or supplied from a
//! class database.
//!
//! ## File Structure
//!
//! An assets file consists of a header, a metadata block and a data block.
//!
//! ### Header
//!
//! The header is always big-endian.
//!
//! | Offset (bytes) | Field          | Description                                               |
//! |----------------|----------------|-----------------------------------------------------------|
//! | 0x0000         | Metadata Size  | 4 bytes: Size of the metadata block                       |
//! | 0x0004         | File Size      | 4 bytes: Size of the whole file                           |
//! | 0x0008         | Format Version | 4 bytes: Serialized file format version                   |
//! | 0x000C         | Data Offset    | 4 bytes: Offset of the data block from the file start     |
//! | 0x0010         | Endianness     | 1 byte: `0` little-endian, `1` big-endian metadata & data |
//! | 0x0011         | Reserved       | 3 bytes                                                   |
//!
//! Format 22 and newer widen the sizes and follow with a second header:
//!
//! | Offset (bytes) | Field          | Description                                            |
//! |----------------|----------------|--------------------------------------------------------|
//! | 0x0014         | Metadata Size  | 4 bytes                                                |
//! | 0x0018         | File Size      | 8 bytes                                                |
//! | 0x0020         | Data Offset    | 8 bytes                                                |
//! | 0x0028         | Unknown        | 8 bytes                                                |
//!
//! ### Metadata
//!
//! The metadata block uses the byte order selected by the header. Most fields only exist
//! from a certain format version on.
//!
//! | Field              | Versions | Description                                                |
//! |--------------------|----------|------------------------------------------------------------|
//! | Unity Version      | 7+       | Null terminated engine version such as `2019.4.3f1`        |
//! | Target Platform    | 8+       | 4 bytes                                                    |
//! | Has Type Tree      | 13+      | 1 byte: whether type trees are embedded                    |
//! | Types              | all      | Count prefixed type table                                  |
//! | Big ID Enabled     | 7-13     | 4 bytes: path ids are 64 bit                               |
//! | Objects            | all      | Count prefixed object directory, aligned from 14 on        |
//! | Preloads           | 12+      | Count prefixed list of `(file id, path id)` pairs          |
//! | Externals          | all      | Count prefixed list of referenced files                    |
//! | Reference Types    | 20+      | Count prefixed type table for managed references           |
//! | User Information   | 5+       | Null terminated string                                     |
//!
//! Each object directory entry holds:
//!
//! | Field              | Versions | Description                                                |
//! |--------------------|----------|------------------------------------------------------------|
//! | Path ID            | all      | 4 bytes, 8 bytes when big ids are enabled or from 14 on    |
//! | Byte Start         | all      | 4 bytes, 8 bytes from 22 on; relative to the data offset   |
//! | Byte Size          | all      | 4 bytes                                                    |
//! | Type ID            | all      | 4 bytes: class id, or type table index from 16 on          |
//! | Class ID           | ..=15    | 2 bytes                                                    |
//! | Is Destroyed       | ..=10    | 2 bytes                                                    |
//! | Script Type Index  | 11..=16  | 2 bytes                                                    |
//! | Stripped           | 15..=16  | 1 byte                                                     |
//!
//! ### Data Block
//!
//! Objects are stored in path id order starting at the data offset, which is at least
//! `0x1000`. Objects are 8 byte aligned relative to the start of the file.
//!
//! ## Value Trees
//!
//! Objects are decoded into [`ValueField`] trees by walking a [`TemplateField`]. Strings
//! and arrays carry an `i32` count prefix and a node flagged for alignment pads the
//! stream to the next multiple of four once it has been read in full.
//!
//! ## Editing
//!
//! Edits are collected as [`AssetsReplacer`]s in a [`ReplacerSet`] and applied by
//! [`AssetsFile::write`], which produces a complete new file.
//!
//! ## Additional Information
//!
//! - **Supported formats**: 9 and newer
//! - **Endianness**: Big-endian header, metadata and data in the order the header selects
//!

pub mod dump;
pub mod endian;
pub mod error;
pub mod read;
pub mod replacer;
pub mod script;
pub mod strings;
pub mod template;
pub mod types;
pub mod value;
pub mod version;
pub mod write;

pub use endian::{Endian, EndianReader, EndianWriter};
pub use read::{is_assets_file, AssetsFile};
pub use replacer::{AssetsReplacer, ReplacerContent, ReplacerSet};
pub use template::{ClassDatabase, TemplateField, ValueType};
pub use value::{AssetInstance, Value, ValueField};
pub use version::UnityVersion;
