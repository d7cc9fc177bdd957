use std::io::BufReader;
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use unity_bundle::{detect_file_type, FileType};
use walkdir::WalkDir;

use super::open_file;

#[derive(Args)]
pub struct DetectArgs {
    /// Files or directories to inspect, directories are walked recursively
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Print one JSON object per file
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl DetectArgs {
    pub fn handle(&self) -> Result<()> {
        let files = self
            .paths
            .iter()
            .flat_map(|path| WalkDir::new(path).into_iter().filter_map(|e| e.ok()))
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        for file in files {
            let mut reader = BufReader::new(open_file(file.path())?);
            let file_type = detect_file_type(&mut reader)
                .context(format!("detecting {}", file.path().display()))?;

            if self.json {
                let value = serde_json::json!({
                    "path": file.path(),
                    "type": file_type,
                });
                println!("{}", serde_json::to_string(&value).into_diagnostic()?);
                continue;
            }

            let label = match file_type {
                FileType::Bundle => "bundle".cyan().to_string(),
                FileType::Assets => "assets".green().to_string(),
                FileType::Unknown => "unknown".dimmed().to_string(),
            };
            println!("{label:>8} {}", file.path().display());
        }
        Ok(())
    }
}
