//! Events command - raw event history, per investment or per owner

use super::{format_amount, format_quantity, print_json, print_table, Context};
use clap::Args;
use invest_ledger::core::{read_owned_streams, EventLog, InvestmentId, LedgerEvent, RecordedEvent};
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct EventsCommand {
    /// Show a single investment stream (e.g. alice:AAPL:1)
    #[arg(short, long)]
    investment: Option<String>,

    /// Show every stream belonging to this owner
    #[arg(short, long)]
    owner: Option<String>,

    /// Only events after this sequence number (requires --investment)
    #[arg(long, requires = "investment")]
    after: Option<u64>,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

/// Row for the events table output
#[derive(Debug, Clone, Tabled)]
struct EventRow {
    #[tabled(rename = "#")]
    sequence: u64,
    #[tabled(rename = "Investment")]
    investment: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Fees")]
    fees: String,
    #[tabled(rename = "Key")]
    key: String,
}

impl From<&RecordedEvent> for EventRow {
    fn from(recorded: &RecordedEvent) -> Self {
        let dash = || "-".to_string();
        let mut row = EventRow {
            sequence: recorded.sequence,
            investment: recorded.investment_id.to_string(),
            date: recorded.event.date().format("%Y-%m-%d").to_string(),
            event_type: recorded.event.display_type().to_string(),
            quantity: dash(),
            price: dash(),
            amount: dash(),
            fees: dash(),
            key: String::new(),
        };
        match &recorded.event {
            LedgerEvent::InvestmentCreated(created) => {
                if let Some(qty) = created.initial_quantity {
                    row.quantity = format_quantity(qty);
                }
                row.amount = format_amount(created.initial_investment);
            }
            LedgerEvent::TransactionRecorded(tx) => {
                row.quantity = format_quantity(tx.quantity);
                row.price = format_amount(tx.unit_price);
                row.amount = format_amount(tx.amount);
                row.fees = format_amount(tx.fees);
                row.key = tx.transaction_id.clone();
            }
            LedgerEvent::ValuationUpdated(valuation) => {
                row.amount = format_amount(valuation.new_value);
            }
        }
        row
    }
}

impl EventsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let log = ctx.open_log()?;

        let events: Vec<RecordedEvent> = match (&self.investment, &self.owner) {
            (Some(id), _) => {
                let id = InvestmentId::new(id.as_str());
                log.read_from(&id, self.after.unwrap_or(0))?
            }
            (None, Some(owner)) => read_owned_streams(&log, owner)?
                .into_iter()
                .flatten()
                .collect(),
            (None, None) => {
                let mut all = Vec::new();
                for id in log.investment_ids()? {
                    all.extend(log.read_all(&id)?);
                }
                all
            }
        };

        if self.json {
            return print_json(&events);
        }
        if events.is_empty() {
            println!("No events found");
            return Ok(());
        }
        print_table(events.iter().map(EventRow::from).collect());
        Ok(())
    }
}
