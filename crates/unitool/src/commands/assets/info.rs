use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;

use super::open_assets;

#[derive(Args)]
pub struct InfoArgs {
    /// An input assets file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print the header and metadata summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let assets = open_assets(&self.file)?;
        let header = assets.header();
        let metadata = assets.metadata();

        if self.json {
            let value = serde_json::json!({
                "header": header,
                "unity_version": metadata.unity_version,
                "target_platform": metadata.target_platform,
                "has_type_tree": metadata.has_type_tree,
                "types": metadata.types.iter().map(|entry| entry.class_id).collect::<Vec<_>>(),
                "objects": metadata.objects.len(),
                "preloads": metadata.preloads,
                "dependencies": metadata.dependencies,
                "user_information": metadata.user_information,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
            return Ok(());
        }

        println!("{} {}", "assets".bold(), self.file.display());
        println!("  format:      {}", header.version);
        println!("  engine:      {}", metadata.unity_version);
        println!("  platform:    {}", metadata.target_platform);
        println!("  big endian:  {}", header.is_big_endian());
        println!("  file size:   {}", header.file_size());
        println!("  data offset: {:#x}", header.data_offset());
        println!("  type tree:   {}", metadata.has_type_tree);
        println!("  types:       {}", metadata.types.len());
        println!("  objects:     {}", metadata.objects.len());

        println!("{} {}", "dependencies".bold(), metadata.dependencies.len());
        for dependency in &metadata.dependencies {
            println!("  {}", dependency.asset_path);
        }
        Ok(())
    }
}
