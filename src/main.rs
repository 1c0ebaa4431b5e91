use anyhow::Context as _;
use clap::{Parser, Subcommand};
use invest_ledger::core::LedgerConfig;
use std::path::PathBuf;

mod cmd;

#[derive(Parser, Debug)]
#[command(
    name = "invest-ledger",
    version,
    about = "Event-sourced investment ledger with capital gains and dividend reports"
)]
struct Cli {
    /// Ledger file, created on first write
    #[arg(short, long, global = true, default_value = "ledger.json")]
    ledger: PathBuf,

    /// JSON config file overriding the defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import transactions from a brokerage CSV export
    Import(cmd::import::ImportCommand),
    /// Pull filled orders from a broker connection
    Sync(cmd::sync::SyncCommand),
    /// Create a manually tracked investment
    Create(cmd::create::CreateCommand),
    /// Record a market valuation for an investment
    Value(cmd::value::ValueCommand),
    /// Current positions of an owner
    Positions(cmd::positions::PositionsCommand),
    /// Raw event history
    Events(cmd::events::EventsCommand),
    /// Realized gains and losses for a tax year
    Gains(cmd::gains::GainsCommand),
    /// Qualified and non-qualified dividends for a tax year
    Dividends(cmd::dividends::DividendsCommand),
    /// Print the ledger JSON schema or the CSV import format
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    let ctx = cmd::Context {
        ledger: cli.ledger,
        config,
    };

    match cli.command {
        Command::Import(command) => command.exec(&ctx),
        Command::Sync(command) => command.exec(&ctx),
        Command::Create(command) => command.exec(&ctx),
        Command::Value(command) => command.exec(&ctx),
        Command::Positions(command) => command.exec(&ctx),
        Command::Events(command) => command.exec(&ctx),
        Command::Gains(command) => command.exec(&ctx),
        Command::Dividends(command) => command.exec(&ctx),
        Command::Schema(command) => command.exec(),
    }
}
