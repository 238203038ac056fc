// Reports module - expense categories, monthly sales vs credits, deposit drill-down

pub mod categories;
pub mod deposits;
pub mod monthly;

pub use categories::{category_totals, CategoryReport, CategoryTotal};
pub use deposits::{deposit_drilldown, DepositDrilldown};
pub use monthly::{monthly_summary, MonthlySummary};
