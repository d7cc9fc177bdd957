use std::io::BufReader;
use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use unity_bundle::{BundleFile, BundleReadOptions};

use crate::commands::open_file;

#[derive(Args)]
pub struct InfoArgs {
    /// An input bundle
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print the header and metadata as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let options = BundleReadOptions::builder().decompress_metadata(true).build();
        let mut bundle = BundleFile::with_options(BufReader::new(open_file(&self.file)?), options)?;
        let header = bundle.header().clone();
        let metadata = bundle.metadata()?.clone();

        if self.json {
            let value = serde_json::json!({
                "header": header,
                "metadata": metadata,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
            return Ok(());
        }

        println!("{} {}", "bundle".bold(), self.file.display());
        println!("  format:      {}", header.version);
        println!("  engine:      {} (min {})", header.engine_version, header.min_engine_version);
        println!("  size:        {}", header.size);
        println!("  metadata:    {} ({} bytes stored)", header.compression()?, header.compressed_metadata_size);
        println!("  info at end: {}", header.is_info_at_end());

        println!("{} {}", "blocks".bold(), metadata.blocks.len());
        for block in &metadata.blocks {
            println!(
                "  {:>10} -> {:>10} {}",
                block.compressed_size,
                block.uncompressed_size,
                block.compression()?
            );
        }

        let plain = !metadata.is_data_compressed()?;
        println!("{} {}", "entries".bold(), metadata.directory.len());
        for (index, entry) in metadata.directory.iter().enumerate() {
            let kind = if plain && bundle.is_assets_file(index)? {
                "assets".green().to_string()
            } else if entry.is_serialized() {
                "serialized".yellow().to_string()
            } else {
                "data".dimmed().to_string()
            };
            println!("  {:>10} {:>10} {} {}", entry.offset, entry.size, kind, entry.name);
        }

        if !plain {
            println!("{}", "data blocks are compressed, unpack to inspect entries".dimmed());
        }
        Ok(())
    }
}
