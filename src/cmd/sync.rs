//! Sync command - pull filled orders from a broker export

use super::{print_batch, print_json, Context};
use clap::Args;
use invest_ledger::ingest::{BrokerSync, JsonOrdersFile};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SyncCommand {
    /// JSON file of filled orders
    #[arg(long)]
    orders: PathBuf,

    /// Owner of the synced transactions
    #[arg(short, long)]
    owner: String,

    /// Connection name the checkpoint is stored under
    #[arg(long, default_value = "default")]
    connection: String,

    /// Output the sync report as JSON
    #[arg(long)]
    json: bool,
}

impl SyncCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let processor = ctx.processor()?;
        let client = JsonOrdersFile::new(&self.orders);
        let sync = BrokerSync::new(
            &processor,
            processor.log(),
            ctx.config.sync.clone(),
            &ctx.config.default_currency,
        );
        let report = sync.run(&client, &self.owner, &self.connection)?;

        if self.json {
            return print_json(&report);
        }
        println!("Connection: {}", report.connection);
        println!("Fetched:    {}", report.fetched);
        print_batch(&report.summary);
        match report.checkpoint {
            Some(at) => println!("Checkpoint: {}", at.to_rfc3339()),
            None => println!("Checkpoint: unchanged"),
        }
        Ok(())
    }
}
