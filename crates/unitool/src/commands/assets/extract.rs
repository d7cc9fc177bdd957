use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;

use super::open_assets;
use crate::commands::create_file;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input assets file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory, objects are written as `<path id>.<class id>.dat`
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract the object with this path id
    #[arg(short, long)]
    path_id: Option<i64>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut assets = open_assets(&self.file)?;

        let objects: Vec<(i64, i32)> = assets
            .objects()
            .filter(|object| self.path_id.map_or(true, |path_id| path_id == object.path_id))
            .map(|object| (object.path_id, assets.class_id_of(object)))
            .collect();

        for (path_id, class_id) in objects {
            let p = self.directory.join(format!("{path_id}.{class_id}.dat"));
            info!("writing {}", p.display());

            let data = assets
                .read_object(path_id)
                .context(format!("reading object {path_id}"))?;
            create_file(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()?;
        }
        Ok(())
    }
}
