//! Conciliador - bank statement import and sales reconciliation
//!
//! This library normalizes Portuguese bank and POS exports into typed
//! records, classifies expenses by rule, and reconciles recorded sales
//! against bank credits, including the cash-deposit-cycle model used for
//! cash that is banked in batches.

pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod importers;
pub mod reconcile;
pub mod reports;
pub mod utils;
