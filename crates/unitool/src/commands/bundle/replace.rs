use std::io::{BufWriter, Cursor, Read, Write};
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;
use unity_assets::ReplacerSet;
use unity_bundle::{BundleContent, BundleReplacer, BundleReplacerSet};

use super::open_unpacked;
use crate::commands::{create_file, open_file};

#[derive(Args)]
pub struct ReplaceArgs {
    /// An input bundle
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target bundle
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Add or replace an entry with the contents of a file
    #[arg(long, value_name = "NAME=PATH", value_parser = parse_pair)]
    add: Vec<(String, String)>,

    /// Rename an entry
    #[arg(long, value_name = "OLD=NEW", value_parser = parse_pair)]
    rename: Vec<(String, String)>,

    /// Remove an entry
    #[arg(long, value_name = "NAME")]
    remove: Vec<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

fn parse_pair(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => {
            Ok((left.to_string(), right.to_string()))
        }
        _ => Err(format!("expected <a>=<b>, got {value}")),
    }
}

impl ReplaceArgs {
    fn content(&self, path: &str) -> Result<BundleContent> {
        let mut data = Vec::new();
        open_file(path.as_ref())?
            .read_to_end(&mut data)
            .into_diagnostic()?;

        let is_assets = unity_assets::is_assets_file(
            &mut Cursor::new(data.as_slice()),
            0,
            data.len() as u64,
        )?;
        Ok(if is_assets {
            BundleContent::Assets {
                data,
                replacers: ReplacerSet::new(),
            }
        } else {
            BundleContent::Bytes(data)
        })
    }

    pub fn handle(&self) -> Result<()> {
        let mut bundle = open_unpacked(&self.file)?;

        let mut replacers = BundleReplacerSet::new();
        for name in &self.remove {
            info!("removing {name}");
            replacers.insert(BundleReplacer::remove(name));
        }
        for (original, name) in &self.rename {
            info!("renaming {original} to {name}");
            replacers.insert(BundleReplacer::rename(original, name));
        }
        for (name, path) in &self.add {
            info!("adding {name} from {path}");
            let content = self.content(path).context(format!("reading {path}"))?;
            replacers.insert(BundleReplacer::add_or_modify(name, content));
        }

        let out = BufWriter::new(create_file(&self.output, self.overwrite)?);
        let mut out = bundle
            .write(out, &replacers)
            .context(format!("writing {}", self.output.display()))?;
        out.flush().into_diagnostic()?;
        Ok(())
    }
}
