//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`xz2::stream::Error`]
    #[error(transparent)]
    LzmaError(#[from] xz2::stream::Error),

    /// Errors raised while rewriting a nested assets file
    #[error(transparent)]
    #[diagnostic(transparent)]
    AssetsError(#[from] unity_assets::error::Error),

    /// file is not a UnityFS bundle
    #[error("file is not a UnityFS bundle (signature {0:?})")]
    InvalidBundle(String),

    /// bundle format version {0} is not supported
    #[error("bundle format version {0} is not supported")]
    #[diagnostic(help("only UnityFS bundles of format 6 and newer can be read"))]
    UnsupportedVersion(u32),

    /// compression type {0} is not supported
    #[error("compression type {0} is not supported")]
    UnsupportedCompression(u32),

    /// the bundle is encrypted
    #[error("the bundle is encrypted")]
    EncryptedBundle,

    /// the bundle data is compressed
    #[error("the bundle data is compressed")]
    #[diagnostic(help("unpack the bundle first"))]
    CompressedBundle,

    /// the bundle metadata has not been decompressed
    #[error("the bundle metadata has not been decompressed")]
    #[diagnostic(help("call load_metadata or open the bundle with decompress_metadata set"))]
    MetadataNotLoaded,

    /// a count prefix of {0} is not valid
    #[error("a count prefix of {0} is not valid")]
    InvalidCount(i32),

    /// a block decompressed to the wrong number of bytes
    #[error("block decompressed to {actual} bytes, expected {expected}")]
    DecompressedSizeMismatch { expected: u64, actual: u64 },

    /// a directory entry points outside of the data block
    #[error("entry {0} lies outside of the data block")]
    EntryOutOfBounds(String),

    /// unable to find requested entry
    #[error("unable to find requested entry")]
    EntryNotFound(#[from] EntryNotFoundError),

    /// a replacer targets an entry that does not exist
    #[error("replacer targets entry {0} which does not exist in the bundle")]
    ReplacerTargetNotFound(String),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when an entry has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested entry")]
pub enum EntryNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
