use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use unity_bundle::compression::DEFAULT_CHUNK_SIZE;
use unity_bundle::{CompressionType, PackOptions};

use super::open_unpacked;
use crate::commands::create_file;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Codec {
    None,
    Lzma,
    #[default]
    Lz4,
}

impl From<Codec> for CompressionType {
    fn from(value: Codec) -> Self {
        match value {
            Codec::None => CompressionType::None,
            Codec::Lzma => CompressionType::Lzma,
            Codec::Lz4 => CompressionType::Lz4,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// An input bundle, compressed bundles are unpacked first
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target bundle
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Codec of the data blocks
    #[arg(short, long, value_enum, default_value_t = Codec::Lz4)]
    compression: Codec,

    /// Store the block list and directory at the end of the bundle
    #[arg(long)]
    info_at_end: Option<bool>,

    /// Uncompressed size of each LZ4 block
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let mut bundle = open_unpacked(&self.file)?;

        let options = PackOptions {
            compression: self.compression.into(),
            info_at_end: self.info_at_end,
            chunk_size: self.chunk_size,
        };
        info!(
            "packing {} into {} with {}",
            self.file.display(),
            self.output.display(),
            options.compression
        );

        let out = BufWriter::new(create_file(&self.output, self.overwrite)?);
        let mut out = bundle
            .pack(out, &options)
            .context(format!("packing {}", self.file.display()))?;
        out.flush().into_diagnostic()?;
        Ok(())
    }
}
