//! Dividends command - qualified and non-qualified dividend income for a tax year

use super::{format_amount, print_json, print_table, Context};
use clap::Args;
use invest_ledger::tax::{dividends, DividendLine, HoldingPeriodPolicy, TaxYear};
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct DividendsCommand {
    /// Owner to report on
    #[arg(short, long)]
    owner: String,

    /// Calendar tax year (e.g. 2024)
    #[arg(short, long)]
    year: i32,

    /// List every dividend payment instead of one row per investment
    #[arg(long)]
    detailed: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct InvestmentRow {
    #[tabled(rename = "Investment")]
    investment: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Payments")]
    payments: usize,
    #[tabled(rename = "Qualified")]
    qualified: String,
    #[tabled(rename = "Non-qualified")]
    non_qualified: String,
    #[tabled(rename = "Total")]
    total: String,
}

impl From<&DividendLine> for InvestmentRow {
    fn from(line: &DividendLine) -> Self {
        InvestmentRow {
            investment: line.investment_id.to_string(),
            name: line.name.clone(),
            payments: line.entries.len(),
            qualified: format_amount(line.qualified),
            non_qualified: format_amount(line.non_qualified),
            total: format_amount(line.total),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct PaymentRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Investment")]
    investment: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Qualified")]
    qualified: String,
}

impl DividendsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let log = ctx.open_log()?;
        let policy = HoldingPeriodPolicy::from(&ctx.config.dividends);
        let report = dividends::compute_for_year(&log, &self.owner, TaxYear(self.year), &policy)?;

        if self.json {
            return print_json(&report);
        }

        println!(
            "Dividends for {} - tax year {}",
            report.owner,
            report.tax_year.display()
        );
        println!();
        if report.lines.is_empty() {
            println!("No dividends in this tax year");
            return Ok(());
        }

        if self.detailed {
            let rows = report
                .lines
                .iter()
                .flat_map(|line| {
                    line.entries.iter().map(move |entry| PaymentRow {
                        date: entry.date.format("%Y-%m-%d").to_string(),
                        investment: line.investment_id.to_string(),
                        kind: entry.kind.display().to_string(),
                        amount: format_amount(entry.amount),
                        qualified: if entry.qualified { "yes" } else { "no" }.to_string(),
                    })
                })
                .collect();
            print_table::<PaymentRow>(rows);
        } else {
            print_table(report.lines.iter().map(InvestmentRow::from).collect());
        }

        println!();
        println!("Qualified:      {}", format_amount(report.qualified));
        println!("Non-qualified:  {}", format_amount(report.non_qualified));
        println!("Total:          {}", format_amount(report.total));
        Ok(())
    }
}
