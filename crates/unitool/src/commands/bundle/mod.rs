pub mod extract;
pub mod info;
pub mod pack;
pub mod replace;
pub mod unpack;

use std::io::{Cursor, Read};
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tracing::info;
use unity_bundle::{BundleFile, BundleReadOptions};

use super::open_file;

#[derive(clap::Subcommand)]
pub enum BundleCommands {
    /// Show the header, blocks and entries of a bundle
    Info(info::InfoArgs),
    /// Write a copy of a bundle with every block decompressed
    Unpack(unpack::UnpackArgs),
    /// Write a compressed copy of a bundle
    Pack(pack::PackArgs),
    /// Extract the entries of a bundle into a directory
    Extract(extract::ExtractArgs),
    /// Add, replace, rename or remove entries
    Replace(replace::ReplaceArgs),
}

impl BundleCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            BundleCommands::Info(info) => info.handle(),
            BundleCommands::Unpack(unpack) => unpack.handle(),
            BundleCommands::Pack(pack) => pack.handle(),
            BundleCommands::Extract(extract) => extract.handle(),
            BundleCommands::Replace(replace) => replace.handle(),
        }
    }
}

/// Open a bundle in memory with its data blocks decompressed
pub(crate) fn open_unpacked(path: &Path) -> Result<BundleFile<Cursor<Vec<u8>>>> {
    let mut data = Vec::new();
    open_file(path)?.read_to_end(&mut data).into_diagnostic()?;

    let options = BundleReadOptions::builder().decompress_metadata(true).build();
    let mut bundle = BundleFile::with_options(Cursor::new(data), options)?;
    if !bundle.metadata()?.is_data_compressed()? {
        return Ok(bundle);
    }

    info!("unpacking {}", path.display());
    let unpacked = bundle.unpack(Cursor::new(Vec::new()))?;
    Ok(BundleFile::new(Cursor::new(unpacked.into_inner()))?)
}
