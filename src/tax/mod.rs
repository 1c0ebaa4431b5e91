pub mod dividends;
pub mod gains;
pub mod year;

pub use dividends::{
    DividendContext, DividendEntry, DividendLine, DividendReport, HoldingPeriodPolicy,
    QualificationPolicy,
};
pub use gains::{GainLossLine, GainLossReport, HoldingPeriod};
pub use year::TaxYear;
