//! Value command - record a market valuation

use super::{format_amount, format_optional, Context};
use chrono::{Local, NaiveDate};
use clap::Args;
use invest_ledger::core::InvestmentId;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct ValueCommand {
    /// Owner of the investment
    #[arg(short, long)]
    owner: String,

    /// Investment id (e.g. alice:VTI:1)
    #[arg(short, long)]
    investment: String,

    /// Current market value of the whole position
    #[arg(long)]
    value: Decimal,

    /// Valuation date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    notes: Option<String>,
}

impl ValueCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let processor = ctx.processor()?;
        let id = InvestmentId::new(self.investment.trim());
        processor.record_valuation(
            &self.owner,
            &id,
            self.value,
            self.date.unwrap_or_else(|| Local::now().date_naive()),
            self.notes.clone(),
        )?;

        let state = processor.state(&id)?;
        println!("{} valued at {} {}", id, format_amount(self.value), state.currency);
        println!("  unrealized gain {}", format_optional(state.unrealized_gain()));
        Ok(())
    }
}
