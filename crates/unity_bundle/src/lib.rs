//! This library reads, unpacks, packs and edits the **UnityFS** asset bundles of the *Unity* engine.
//!
//! # UnityFS Bundle Format Documentation
//!
//! A bundle concatenates the files it contains into one data blob that is split into
//! independently compressed blocks. A metadata block lists the blocks and names the
//! entries by their offset and size inside the decompressed blob.
//!
//! ## File Structure
//!
//! A bundle consists of a header, the metadata block and the data blocks. The metadata
//! block follows the header unless the header flags place it at the end of the file.
//!
//! ### Header
//!
//! Every field is big-endian. Strings are null terminated, so offsets after the signature
//! are given for the usual `5.x.x` minimum version.
//!
//! | Field                   | Description                                                 |
//! |-------------------------|-------------------------------------------------------------|
//! | Signature               | `UnityFS`                                                   |
//! | Format Version          | 4 bytes: 6 to 8 in practice                                 |
//! | Minimum Engine Version  | Null terminated, usually `5.x.x`                            |
//! | Engine Version          | Null terminated, for example `2019.4.3f1`                   |
//! | Size                    | 8 bytes: Size of the whole bundle                           |
//! | Compressed Info Size    | 4 bytes: Stored size of the metadata block                  |
//! | Decompressed Info Size  | 4 bytes: Size of the metadata block once decompressed       |
//! | Flags                   | 4 bytes: see below                                          |
//!
//! From format 7 on the header is padded with zeros to a multiple of 16.
//!
//! ### Header Flags
//!
//! | Bits     | Description                                                                  |
//! |----------|------------------------------------------------------------------------------|
//! | `0x3F`   | Codec of the metadata block                                                  |
//! | `0x40`   | The metadata block carries the directory after the block list                |
//! | `0x80`   | The metadata block is stored at the end of the file                          |
//! | `0x200`  | Newer engines: pad to 16 bytes before the data. Older engines: encrypted     |
//! | `0x1400` | Newer engines: encrypted                                                     |
//!
//! Newer engines are 2020.3.34, 2021.3.2, 2022.1.1 and everything after.
//!
//! ### Metadata Block
//!
//! | Field       | Description                                                      |
//! |-------------|------------------------------------------------------------------|
//! | Hash        | 16 bytes, written as zeros                                       |
//! | Block Count | 4 bytes: Number of block records                                 |
//! | Blocks      | `(uncompressed size: u32, compressed size: u32, flags: u16)`     |
//! | Entry Count | 4 bytes: Number of directory entries                             |
//! | Directory   | `(offset: u64, size: u64, flags: u32, name)`                     |
//!
//! Entry offsets are relative to the start of the decompressed data blob. Entry flag `0x4`
//! marks a serialized assets file. The low six bits of the block flags select the block's
//! codec and `0x40` marks a streamed block.
//!
//! ### Codecs
//!
//! | Tag | Codec                                                                      |
//! |-----|----------------------------------------------------------------------------|
//! | 0   | None                                                                       |
//! | 1   | LZMA: 5 bytes of encoder properties, then the raw stream                   |
//! | 2   | LZ4 block                                                                  |
//! | 3   | LZ4HC block, decoded like LZ4                                              |
//!
//! ## Additional Information
//!
//! - **Supported formats**: UnityFS 6 and newer
//! - **Endianness**: Big-endian for the header and the metadata block
//! - **Editing**: entries can only be read or replaced once the data blocks are stored
//!   uncompressed, see [`BundleFile::unpack`]
//!

pub mod compression;
pub mod detect;
pub mod error;
pub mod pack;
pub mod read;
pub mod replacer;
pub mod types;
pub mod write;

pub use compression::CompressionType;
pub use detect::{detect_file_type, FileType};
pub use pack::PackOptions;
pub use read::{BundleFile, BundleReadOptions, BundleState};
pub use replacer::{BundleContent, BundleReplacer, BundleReplacerSet};
pub use types::{BlockInfo, BundleHeader, BundleMetadata, DirectoryEntry};
