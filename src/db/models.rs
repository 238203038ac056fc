use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction of a bank movement, always agreeing with the amount's sign
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }

    /// Debit iff the amount is negative
    pub fn from_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" | "c" | "credito" => Ok(TransactionType::Credit),
            "debit" | "d" | "debito" => Ok(TransactionType::Debit),
            _ => Err(()),
        }
    }
}

/// One normalized bank statement line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: Option<i64>,
    pub transaction_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub source_file: String,
}

impl BankTransaction {
    /// Build a row, deriving the type from the amount's sign
    pub fn new(
        transaction_date: NaiveDate,
        value_date: Option<NaiveDate>,
        description: &str,
        amount: Decimal,
        source_file: &str,
    ) -> Self {
        Self {
            id: None,
            transaction_date,
            value_date,
            description: truncate_description(description),
            amount,
            transaction_type: TransactionType::from_amount(amount),
            source_file: source_file.to_string(),
        }
    }
}

pub const MAX_DESCRIPTION_CHARS: usize = 500;

fn truncate_description(raw: &str) -> String {
    raw.trim().chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// How a sales format identifies the same sale across re-imports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SaleKeyPolicy {
    /// One row per payment method per day
    DateAndMethod,
    /// Aggregate exports without a method: date, file and amount
    DateFileAmount,
}

impl SaleKeyPolicy {
    pub fn natural_key(
        &self,
        sale_date: NaiveDate,
        payment_method: Option<&str>,
        source_file: &str,
        amount: Decimal,
    ) -> String {
        match self {
            SaleKeyPolicy::DateAndMethod => format!(
                "{}|{}",
                sale_date,
                payment_method.unwrap_or("").trim().to_lowercase()
            ),
            SaleKeyPolicy::DateFileAmount => {
                format!("{}|{}|{}", sale_date, source_file, amount)
            }
        }
    }
}

/// One day/method sales total from a POS export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: Option<i64>,
    pub sale_date: NaiveDate,
    pub payment_method: Option<String>,
    pub amount: Decimal,
    pub source_file: String,
    pub natural_key: String,
}

/// Substring rule assigning a category to debit descriptions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRule {
    pub id: i64,
    pub pattern: String,
    pub category: String,
    /// Lower values win; rules without a priority rank after all that have one
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedClassification {
    pub id: Option<i64>,
    pub transaction_id: i64,
    pub category: String,
    pub rule_id: Option<i64>,
    pub applied_at: DateTime<Utc>,
}

/// Line from a card terminal (TPA) settlement statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalMovement {
    pub id: Option<i64>,
    pub movement_date: NaiveDate,
    pub terminal_id: String,
    pub amount: Decimal,
    pub debit_credit: Option<String>,
    pub fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub source_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_transaction_type_follows_sign() {
        assert_eq!(TransactionType::from_amount(dec!(-0.01)), TransactionType::Debit);
        assert_eq!(TransactionType::from_amount(dec!(0)), TransactionType::Credit);
        assert_eq!(TransactionType::from_amount(dec!(150)), TransactionType::Credit);
    }

    #[test]
    fn test_transaction_type_round_trip() {
        assert_eq!("debit".parse::<TransactionType>(), Ok(TransactionType::Debit));
        assert_eq!("C".parse::<TransactionType>(), Ok(TransactionType::Credit));
        assert!("other".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::Credit.as_str(), "credit");
    }

    #[test]
    fn test_bank_transaction_truncates_description() {
        let long = "x".repeat(600);
        let tx = BankTransaction::new(date(2025, 1, 5), None, &long, dec!(-10), "a.csv");
        assert_eq!(tx.description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(tx.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn test_sale_key_policies() {
        let d = date(2025, 1, 5);
        assert_eq!(
            SaleKeyPolicy::DateAndMethod.natural_key(d, Some(" Numerário "), "v.xlsx", dec!(10)),
            "2025-01-05|numerário"
        );
        assert_eq!(
            SaleKeyPolicy::DateFileAmount.natural_key(d, None, "v.xlsx", dec!(10.50)),
            "2025-01-05|v.xlsx|10.50"
        );
    }
}
