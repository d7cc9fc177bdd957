pub mod assets;
pub mod bundle;
pub mod detect;

use std::fs::File;
use std::path::Path;

use miette::{Context, IntoDiagnostic, Result};

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle UnityFS bundles
    Bundle {
        #[command(subcommand)]
        command: bundle::BundleCommands,
    },
    /// Handle serialized assets files
    Assets {
        #[command(subcommand)]
        command: assets::AssetsCommands,
    },
    /// Guess the kind of Unity files
    Detect(detect::DetectArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Bundle { command } => command.handle(),
            Commands::Assets { command } => command.handle(),
            Commands::Detect(detect) => detect.handle(),
        }
    }
}

pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))
}

pub(crate) fn create_file(path: &Path, overwrite: bool) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    }
    .into_diagnostic()
    .context(format!("creating {}", path.display()))
}
