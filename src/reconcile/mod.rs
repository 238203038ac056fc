// Reconciliation of sales against bank postings

pub mod cycle;
pub mod direct;

pub use cycle::{reconcile_range, CycleReport, CycleSettings, MethodKind};
pub use direct::{match_sales_to_credits, DirectMatchReport};
