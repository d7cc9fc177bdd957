pub mod dump;
pub mod extract;
pub mod import;
pub mod info;
pub mod list;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use clap::ValueEnum;
use miette::Result;
use unity_assets::AssetsFile;

use super::open_file;

#[derive(clap::Subcommand)]
pub enum AssetsCommands {
    /// Show the header and metadata summary of an assets file
    Info(info::InfoArgs),
    /// List the objects of an assets file
    List(list::ListArgs),
    /// Dump an object's value tree
    Dump(dump::DumpArgs),
    /// Replace an object with the contents of a dump
    Import(import::ImportArgs),
    /// Extract raw object data into a directory
    Extract(extract::ExtractArgs),
}

impl AssetsCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            AssetsCommands::Info(info) => info.handle(),
            AssetsCommands::List(list) => list.handle(),
            AssetsCommands::Dump(dump) => dump.handle(),
            AssetsCommands::Import(import) => import.handle(),
            AssetsCommands::Extract(extract) => extract.handle(),
        }
    }
}

/// Dump file syntax
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    #[default]
    Text,
    Json,
}

pub(crate) fn open_assets(path: &Path) -> Result<AssetsFile<BufReader<File>>> {
    Ok(AssetsFile::new(BufReader::new(open_file(path)?))?)
}
