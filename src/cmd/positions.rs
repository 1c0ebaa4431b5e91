//! Positions command - current state of every investment of an owner

use super::{
    format_amount, format_optional, format_quantity, format_signed, print_json, print_table,
    Context,
};
use clap::Args;
use invest_ledger::core::InvestmentState;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct PositionsCommand {
    /// Owner whose positions to show
    #[arg(short, long)]
    owner: String,

    /// Include fully sold positions
    #[arg(long)]
    all: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct PositionRow {
    #[tabled(rename = "Investment")]
    investment: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Avg Cost")]
    average_cost: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Value")]
    market_value: String,
    #[tabled(rename = "Unrealized")]
    unrealized: String,
    #[tabled(rename = "Realized")]
    realized: String,
    #[tabled(rename = "Dividends")]
    dividends: String,
    #[tabled(rename = "Ccy")]
    currency: String,
}

impl From<&InvestmentState> for PositionRow {
    fn from(state: &InvestmentState) -> Self {
        PositionRow {
            investment: state
                .investment_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            name: state.name.clone(),
            kind: state.kind.display().to_string(),
            status: if state.is_active() { "active" } else { "sold" }.to_string(),
            quantity: format_quantity(state.quantity),
            average_cost: format_amount(state.average_cost),
            cost_basis: format_amount(state.cost_basis()),
            market_value: format_optional(state.market_value),
            unrealized: state
                .unrealized_gain()
                .map(format_signed)
                .unwrap_or_else(|| "-".to_string()),
            realized: format_signed(state.realized_gain),
            dividends: format_amount(state.total_dividends),
            currency: state.currency.clone(),
        }
    }
}

impl PositionsCommand {
    pub fn exec(&self, ctx: &Context) -> anyhow::Result<()> {
        let processor = ctx.processor()?;
        let positions: Vec<InvestmentState> = processor
            .positions(&self.owner)?
            .into_iter()
            .filter(|p| self.all || p.is_active())
            .collect();

        if self.json {
            return print_json(&positions);
        }
        if positions.is_empty() {
            println!("No positions found for {}", self.owner);
            return Ok(());
        }
        print_table(positions.iter().map(PositionRow::from).collect());
        Ok(())
    }
}
