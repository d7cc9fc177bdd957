//! Engine version strings such as `2019.4.3f1`

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A parsed engine version
///
/// Versions order by their numeric components first and then by release type, so
/// `2019.4.3a1 < 2019.4.3f1 < 2019.4.3p1`.
///
/// ```
/// use unity_assets::UnityVersion;
///
/// let version: UnityVersion = "2021.3.2f1".parse().unwrap();
/// assert_eq!(version.major, 2021);
/// assert!(version.at_least(2020, 3, 34));
/// assert_eq!(version.to_string(), "2021.3.2f1");
/// ```
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("{major}.{minor}.{patch}{release_type}{build}")]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub release_type: UnityVersionType,
    pub build: u32,
}

/// Release channel letter of a version string
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnityVersionType {
    #[display("a")]
    Alpha,
    #[display("b")]
    Beta,
    #[display("c")]
    China,
    #[display("f")]
    Final,
    #[display("p")]
    Patch,
    #[display("x")]
    Experimental,
}

impl UnityVersionType {
    /// Map a release letter, `None` for letters the engine never emits
    pub const fn from_char(value: char) -> Option<Self> {
        Some(match value {
            'a' => UnityVersionType::Alpha,
            'b' => UnityVersionType::Beta,
            'c' => UnityVersionType::China,
            'f' => UnityVersionType::Final,
            'p' => UnityVersionType::Patch,
            'x' => UnityVersionType::Experimental,
            _ => return None,
        })
    }
}

impl UnityVersion {
    pub const fn new(
        major: u32,
        minor: u32,
        patch: u32,
        release_type: UnityVersionType,
        build: u32,
    ) -> Self {
        UnityVersion {
            major,
            minor,
            patch,
            release_type,
            build,
        }
    }

    /// Parse a version string, returning an error for anything that is not
    /// `major.minor.patch<type><build>`
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(value.to_string());

        let mut parts = value.trim().splitn(3, '.');
        let major = parts.next().ok_or_else(invalid)?;
        let minor = parts.next().ok_or_else(invalid)?;
        let rest = parts.next().ok_or_else(invalid)?;

        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;

        let split = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (patch, tail) = rest.split_at(split);
        let patch = patch.parse().map_err(|_| invalid())?;

        let mut chars = tail.chars();
        let release_type = chars
            .next()
            .and_then(UnityVersionType::from_char)
            .ok_or_else(invalid)?;

        // Some builds carry trailing suffixes such as `f1c1`, only the leading digits count
        let build: String = chars.take_while(char::is_ascii_digit).collect();
        let build = build.parse().map_err(|_| invalid())?;

        Ok(UnityVersion::new(major, minor, patch, release_type, build))
    }

    /// Whether this version is `major.minor.patch` or newer, ignoring the release type
    pub fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UnityVersion::parse(s)
    }
}
