//! Gains command - realized capital gains and losses for a tax year

use super::{format_amount, format_quantity, format_signed, print_json, print_table, Context};
use clap::Args;
use invest_ledger::tax::{gains, GainLossLine, GainLossReport, TaxYear};
use std::io;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct GainsCommand {
    /// Owner to report on
    #[arg(short, long)]
    owner: String,

    /// Calendar tax year (e.g. 2024)
    #[arg(short, long)]
    year: i32,

    /// Output as JSON instead of formatted table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output sale lines as CSV
    #[arg(long)]
    csv: bool,
}

#[derive(Debug, Clone, Tabled, serde::Serialize)]
struct SaleRow {
    #[tabled(rename = "Sold")]
    sale_date: String,
    #[tabled(rename = "Acquired")]
    acquisition_date: String,
    #[tabled(rename = "Investment")]
    investment: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    gain: String,
    #[tabled(rename = "Days")]
    holding_days: i64,
    #[tabled(rename = "Term")]
    term: String,
}

impl From<&GainLossLine> for SaleRow {
    fn from(line: &GainLossLine) -> Self {
        SaleRow {
            sale_date: line.sale_date.format("%Y-%m-%d").to_string(),
            acquisition_date: line.acquisition_date.format("%Y-%m-%d").to_string(),
            investment: line.investment_id.to_string(),
            quantity: format_quantity(line.quantity),
            proceeds: format_amount(line.proceeds),
            cost_basis: format_amount(line.cost_basis),
            gain: format_signed(line.gain),
            holding_days: line.holding_days,
            term: line.period.display().to_string(),
        }
    }
}

impl GainsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let log = ctx.open_log()?;
        let report = gains::compute_for_year(&log, &self.owner, TaxYear(self.year))?;

        if self.json {
            return print_json(&report);
        }
        if self.csv {
            return write_csv(&report);
        }

        println!(
            "Capital gains for {} - tax year {}",
            report.owner,
            report.tax_year.display()
        );
        println!();
        if report.lines.is_empty() {
            println!("No sales in this tax year");
            return Ok(());
        }
        print_table(report.lines.iter().map(SaleRow::from).collect());
        println!();
        println!("Proceeds:           {}", format_amount(report.total_proceeds()));
        println!("Cost basis:         {}", format_amount(report.total_cost_basis()));
        println!(
            "Short-term:         {} gains, {} losses, net {}",
            format_amount(report.short_term_gains),
            format_amount(report.short_term_losses),
            format_signed(report.net_short_term())
        );
        println!(
            "Long-term:          {} gains, {} losses, net {}",
            format_amount(report.long_term_gains),
            format_amount(report.long_term_losses),
            format_signed(report.net_long_term())
        );
        println!("Net gain/loss:      {}", format_signed(report.net()));
        Ok(())
    }
}

fn write_csv(report: &GainLossReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    for line in &report.lines {
        wtr.serialize(SaleRow::from(line))?;
    }
    wtr.flush()?;
    Ok(())
}
