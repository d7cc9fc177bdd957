//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::template::ValueType;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`serde_json::Error`]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// file is not a supported assets file
    #[error("file is not a supported assets file")]
    InvalidAssetsFile,

    /// assets file format version {0} is not supported
    #[error("assets file format version {0} is not supported")]
    #[diagnostic(help("only serialized file formats 9 and newer can be read"))]
    UnsupportedVersion(u32),

    /// a length prefix of {0} is not valid
    #[error("a length prefix of {0} is not valid")]
    InvalidLength(i64),

    /// string of {length} bytes does not fit a {width} byte length prefix
    #[error("string of {length} bytes does not fit a {width} byte length prefix")]
    StringTooLong { length: usize, width: u8 },

    /// array field declared a negative element count
    #[error("array field {field} declared a negative element count of {count}")]
    NegativeArrayCount { field: String, count: i32 },

    /// field has a value kind that cannot be decoded
    #[error("field {field} has a value kind that cannot be decoded: {kind:?}")]
    InvalidValueType { field: String, kind: ValueType },

    /// value does not match the kind declared by the template
    #[error("field {field} expects a value of kind {expected:?} but got {actual:?}")]
    ValueTypeMismatch {
        field: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// the field is not an array
    #[error("field {0} is not an array")]
    NotAnArray(String),

    /// the version string could not be parsed
    #[error("invalid unity version string {0:?}")]
    InvalidVersion(String),

    /// no type information is available for the object
    #[error("no type information for class {class_id} (script index {script_index})")]
    #[diagnostic(help("the file has no embedded type tree; supply a class database"))]
    MissingTypeInfo { class_id: i32, script_index: u16 },

    /// the type tree is malformed
    #[error("malformed type tree: {0}")]
    InvalidTypeTree(String),

    /// a directory entry points outside of the file
    #[error("object {path_id} lies outside of the data block")]
    ObjectOutOfBounds { path_id: i64 },

    /// unable to find the requested object
    #[error("unable to find requested object")]
    ObjectNotFound(#[from] ObjectNotFoundError),

    /// a replacer targets an object that does not exist
    #[error("replacer targets object {0} which does not exist in the file")]
    ReplacerTargetNotFound(i64),

    /// the dump could not be imported
    #[error(transparent)]
    #[diagnostic(transparent)]
    Import(#[from] crate::dump::ImportError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when an object has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested object")]
pub enum ObjectNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by path id {0}
    #[error("by path id {0}")]
    PathId(i64),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
