use std::path::PathBuf;

use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;

use super::open_unpacked;
use crate::commands::create_file;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input bundle
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract the entry with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut bundle = open_unpacked(&self.file)?;

        let indices: Vec<usize> = match &self.name {
            Some(name) => vec![bundle
                .index_for_name(name)
                .ok_or(miette!("bundle has no entry named {name}"))?],
            None => (0..bundle.len()).collect(),
        };

        for index in indices {
            let name = bundle.entry(index)?.name.clone();
            let p = self.directory.join(&name);
            info!("writing {}", p.display());

            let mut out = create_file(&p, self.overwrite)?;
            bundle
                .copy_entry(index, &mut out)
                .context(format!("extracting {name}"))?;
        }
        Ok(())
    }
}
