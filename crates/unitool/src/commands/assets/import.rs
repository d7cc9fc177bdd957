use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;
use unity_assets::{dump, AssetsReplacer, ReplacerSet};

use super::{open_assets, DumpFormat};
use crate::commands::{create_file, open_file};

#[derive(Args)]
pub struct ImportArgs {
    /// An input assets file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Path id of the object to replace or add
    #[arg(short, long)]
    path_id: i64,

    /// Class id for an object that does not exist yet
    #[arg(short, long)]
    class_id: Option<i32>,

    /// A dump file
    #[arg(short, long, value_name = "FILE")]
    dump: PathBuf,

    /// Dump syntax
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    format: DumpFormat,

    /// A target assets file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ImportArgs {
    pub fn handle(&self) -> Result<()> {
        let mut assets = open_assets(&self.file)?;

        let (class_id, script_index) = match assets.object_by_path_id(self.path_id) {
            Some(object) => (assets.class_id_of(object), assets.script_index_of(object)),
            None => {
                let class_id = self.class_id.ok_or(miette!(
                    "object {} does not exist, pass --class-id to add it",
                    self.path_id
                ))?;
                (class_id, unity_assets::types::NO_SCRIPT_INDEX)
            }
        };

        let big_endian = assets.header().is_big_endian();
        let reader = BufReader::new(open_file(&self.dump)?);
        let data = match self.format {
            DumpFormat::Text => dump::import_text(reader, big_endian),
            DumpFormat::Json => dump::import_json(reader, big_endian),
        }
        .context(format!("importing {}", self.dump.display()))?;
        info!("importing {} bytes into object {}", data.len(), self.path_id);

        let mut replacers = ReplacerSet::new();
        replacers.insert(AssetsReplacer::AddOrModify {
            path_id: self.path_id,
            class_id,
            script_index,
            content: data.into(),
        });

        let out = BufWriter::new(create_file(&self.output, self.overwrite)?);
        let mut out = assets
            .write(out, &replacers)
            .context(format!("writing {}", self.output.display()))?;
        out.flush().into_diagnostic()?;
        Ok(())
    }
}
