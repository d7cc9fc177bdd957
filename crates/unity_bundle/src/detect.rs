//! Guessing what kind of Unity file a byte source holds
//!
//! Detection is a heuristic over the first bytes of the source, not a parse.
//! Anything starting with one of the archive signatures counts as a bundle, this
//! includes the legacy `UnityWeb`/`UnityRaw` formats and executables or sound
//! banks that tools commonly find next to bundles.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Result;

/// Prefixes of files treated as bundles
const BUNDLE_PREFIXES: [&[u8]; 3] = [b"Unity", b"MZ", b"FSB5"];

/// Sources shorter than this are never classified
const MIN_DETECT_LEN: u64 = 0x20;

/// Assets format from which the version string follows the wide header
const WIDE_HEADER_FORMAT: i32 = 22;

/// Longest engine version string that is accepted
const MAX_VERSION_LEN: usize = 0xFF;

/// The kind of a Unity file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileType {
    /// An archive, see [`crate::BundleFile`]
    Bundle,
    /// A serialized assets file
    Assets,
    Unknown,
}

/// Classify the contents of `reader`
///
/// The reader is left at an unspecified position.
///
/// ```no_run
/// use unity_bundle::{detect_file_type, FileType};
///
/// let mut file = std::fs::File::open("level0")?;
/// if detect_file_type(&mut file)? == FileType::Assets {
///     println!("level0 is an assets file");
/// }
/// # Ok::<(), unity_bundle::error::Error>(())
/// ```
#[instrument(skip(reader), err)]
pub fn detect_file_type<R: Read + Seek>(reader: &mut R) -> Result<FileType> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < MIN_DETECT_LEN {
        return Ok(FileType::Unknown);
    }

    reader.seek(SeekFrom::Start(0))?;
    let mut prefix = [0u8; 5];
    reader.read_exact(&mut prefix)?;
    if BUNDLE_PREFIXES
        .iter()
        .any(|signature| prefix.starts_with(signature))
    {
        return Ok(FileType::Bundle);
    }

    reader.seek(SeekFrom::Start(8))?;
    let format = reader.read_i32::<BigEndian>()?;
    let version_offset = if format >= WIDE_HEADER_FORMAT { 0x30 } else { 0x14 };
    if version_offset >= len {
        return Ok(FileType::Unknown);
    }

    reader.seek(SeekFrom::Start(version_offset))?;
    let mut version = Vec::new();
    reader
        .by_ref()
        .take(MAX_VERSION_LEN as u64 + 1)
        .read_to_end(&mut version)?;
    if let Some(end) = version.iter().position(|&byte| byte == 0) {
        version.truncate(end);
    }

    let plausible = version.len() <= MAX_VERSION_LEN
        && version
            .iter()
            .all(|&byte| byte.is_ascii_alphanumeric() || byte == b'.');
    let file_type = if (0..0xFF).contains(&format) && plausible {
        FileType::Assets
    } else {
        FileType::Unknown
    };

    debug!(format, ?file_type, "detected file type");
    Ok(file_type)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::detect::{detect_file_type, FileType};
    use crate::error::Result;

    fn assets_header(format: i32, version: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 0x40];
        data[8..12].copy_from_slice(&format.to_be_bytes());
        let offset = if format >= 22 { 0x30 } else { 0x14 };
        data[offset..offset + version.len()].copy_from_slice(version);
        data
    }

    #[test]
    fn detect_bundles() -> Result<()> {
        for signature in [&b"UnityFS\0"[..], b"UnityWeb\0", b"MZ", b"FSB5"] {
            let mut data = signature.to_vec();
            data.resize(0x40, 0);
            assert_eq!(detect_file_type(&mut Cursor::new(data))?, FileType::Bundle);
        }
        Ok(())
    }

    #[test]
    fn detect_assets() -> Result<()> {
        let old = assets_header(17, b"2017.4.40f1\0");
        assert_eq!(detect_file_type(&mut Cursor::new(old))?, FileType::Assets);

        let wide = assets_header(22, b"2021.3.2f1\0");
        assert_eq!(detect_file_type(&mut Cursor::new(wide))?, FileType::Assets);
        Ok(())
    }

    #[test]
    fn detect_unknown() -> Result<()> {
        assert_eq!(
            detect_file_type(&mut Cursor::new(vec![0u8; 0x10]))?,
            FileType::Unknown
        );

        let garbage = assets_header(17, b"not a version!\0");
        assert_eq!(detect_file_type(&mut Cursor::new(garbage))?, FileType::Unknown);

        let format = assets_header(0x1FF, b"5.6.7f1\0");
        assert_eq!(detect_file_type(&mut Cursor::new(format))?, FileType::Unknown);
        Ok(())
    }
}
