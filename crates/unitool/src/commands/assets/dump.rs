use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use unity_assets::dump;

use super::{open_assets, DumpFormat};
use crate::commands::create_file;

#[derive(Args)]
pub struct DumpArgs {
    /// An input assets file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Path id of the object to dump
    #[arg(short, long)]
    path_id: i64,

    /// Dump syntax
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    format: DumpFormat,

    /// A target file, the dump is printed when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let mut assets = open_assets(&self.file)?;
        let instance = assets
            .instance(self.path_id, None)
            .context(format!("decoding object {}", self.path_id))?;

        let mut out: Box<dyn Write> = match &self.output {
            Some(path) => {
                info!("writing {}", path.display());
                Box::new(BufWriter::new(create_file(path, self.overwrite)?))
            }
            None => Box::new(std::io::stdout().lock()),
        };

        match self.format {
            DumpFormat::Text => dump::export_text(instance.base_field(), &mut out)?,
            DumpFormat::Json => dump::export_json(instance.base_field(), &mut out)?,
        }
        out.flush().into_diagnostic()?;
        Ok(())
    }
}
