use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use unity_bundle::{BundleFile, BundleReadOptions};

use crate::commands::{create_file, open_file};

#[derive(Args)]
pub struct UnpackArgs {
    /// An input bundle
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target bundle
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let options = BundleReadOptions::builder().decompress_metadata(true).build();
        let mut bundle = BundleFile::with_options(BufReader::new(open_file(&self.file)?), options)?;

        info!("unpacking {} into {}", self.file.display(), self.output.display());
        let out = BufWriter::new(create_file(&self.output, self.overwrite)?);
        let mut out = bundle
            .unpack(out)
            .context(format!("unpacking {}", self.file.display()))?;
        out.flush().into_diagnostic()?;
        Ok(())
    }
}
