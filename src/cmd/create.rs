//! Create command - open a manually tracked investment

use super::{format_amount, format_quantity, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use invest_ledger::core::{CreateInvestment, InvestmentKind};
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct CreateCommand {
    /// Owner of the investment
    #[arg(short, long)]
    owner: String,

    /// Ticker or short identifier (e.g. VTI, HOUSE)
    #[arg(short, long)]
    symbol: String,

    /// Display name, defaults to the symbol
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long, value_enum, default_value = "stock")]
    kind: KindArg,

    /// Currency, defaults to the configured default currency
    #[arg(long)]
    currency: Option<String>,

    #[arg(long)]
    institution: Option<String>,

    #[arg(long)]
    account: Option<String>,

    /// Amount initially invested
    #[arg(long, default_value = "0")]
    amount: Decimal,

    /// Units bought with the initial amount
    #[arg(long)]
    quantity: Option<Decimal>,

    /// Start date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Maturity or end date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Stock,
    Etf,
    MutualFund,
    Crypto,
    Bond,
    RealEstate,
    Other,
}

impl From<KindArg> for InvestmentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Stock => InvestmentKind::Stock,
            KindArg::Etf => InvestmentKind::Etf,
            KindArg::MutualFund => InvestmentKind::MutualFund,
            KindArg::Crypto => InvestmentKind::Crypto,
            KindArg::Bond => InvestmentKind::Bond,
            KindArg::RealEstate => InvestmentKind::RealEstate,
            KindArg::Other => InvestmentKind::Other,
        }
    }
}

impl CreateCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let processor = ctx.processor()?;
        let request = CreateInvestment {
            owner: self.owner.clone(),
            symbol: self.symbol.clone(),
            name: self.name.clone().unwrap_or_else(|| self.symbol.trim().to_uppercase()),
            kind: self.kind.into(),
            currency: self
                .currency
                .clone()
                .unwrap_or_else(|| ctx.config.default_currency.clone()),
            institution: self.institution.clone(),
            account_number: self.account.clone(),
            initial_investment: self.amount,
            initial_quantity: self.quantity,
            start_date: self.start.unwrap_or_else(|| Local::now().date_naive()),
            end_date: self.end,
            description: self.description.clone(),
        };
        let recorded = processor.create_investment(&request)?;

        let state = processor.state(&recorded.investment_id)?;
        println!("Created {}", recorded.investment_id);
        println!(
            "  {} {} invested, {} units",
            format_amount(request.initial_investment),
            state.currency,
            format_quantity(state.quantity)
        );
        Ok(())
    }
}
