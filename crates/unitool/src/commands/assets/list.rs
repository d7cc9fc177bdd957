use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;

use super::open_assets;

#[derive(Args)]
pub struct ListArgs {
    /// An input assets file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only list objects of this class id
    #[arg(short, long)]
    class_id: Option<i32>,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let assets = open_assets(&self.file)?;

        println!(
            "{}",
            ["path id", "class", "script", "start", "size"]
                .iter()
                .map(|title| format!("{title:>20}"))
                .join(" ")
                .bold()
        );

        for object in assets.objects() {
            let class_id = assets.class_id_of(object);
            if self.class_id.is_some_and(|filter| filter != class_id) {
                continue;
            }
            let script_index = assets.script_index_of(object);
            let row = [
                object.path_id.to_string(),
                class_id.to_string(),
                script_index.to_string(),
                object.byte_start.to_string(),
                object.byte_size.to_string(),
            ];
            println!("{}", row.iter().map(|cell| format!("{cell:>20}")).join(" "));
        }
        Ok(())
    }
}
