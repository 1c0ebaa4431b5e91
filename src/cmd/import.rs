//! Import command - apply a brokerage CSV export

use super::{print_batch, print_json, Context};
use anyhow::Context as _;
use clap::Args;
use invest_ledger::ingest::CsvImporter;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImportCommand {
    /// CSV file to import
    file: PathBuf,

    /// Owner of the imported transactions
    #[arg(short, long)]
    owner: String,

    /// Delete the file once every row has been attempted
    #[arg(long)]
    remove_after: bool,

    /// Output the batch summary as JSON
    #[arg(long)]
    json: bool,
}

impl ImportCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        if self.owner.trim().is_empty() {
            anyhow::bail!("--owner must not be empty");
        }
        let processor = ctx.processor()?;
        let file = File::open(&self.file)
            .with_context(|| format!("cannot open {}", self.file.display()))?;

        let importer = CsvImporter::new(&processor, &self.owner, &ctx.config.default_currency)
            .with_date_format(ctx.config.csv.date_format.clone());
        let summary = importer
            .import(BufReader::new(file))
            .with_context(|| format!("cannot import {}", self.file.display()))?;

        if self.json {
            print_json(&summary)?;
        } else {
            print_batch(&summary);
        }

        if self.remove_after {
            if summary.completed {
                fs::remove_file(&self.file)
                    .with_context(|| format!("cannot remove {}", self.file.display()))?;
                log::info!("removed {}", self.file.display());
            } else {
                log::warn!(
                    "kept {} because some rows failed to store",
                    self.file.display()
                );
            }
        }
        Ok(())
    }
}
