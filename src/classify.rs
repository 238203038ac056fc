//! Expense classification
//!
//! Debits are matched against substring rules. When several rules match, the
//! lowest explicit priority wins, then the longest (most specific) pattern,
//! then the oldest rule. Each debit gets at most one applied classification;
//! debits no rule matches stay unclassified until a rule is added.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::cmp::Reverse;
use tracing::{debug, info};

use crate::db::{self, ClassificationRule};

/// Rules seeded by `init`: (pattern, category, priority)
pub const DEFAULT_RULES: &[(&str, &str, Option<i32>)] = &[
    ("REPSOL", "Fuel", None),
    ("EDP", "Electricity", None),
    ("VNC", "Salaries", None),
    ("IVA", "VAT", None),
    ("IGFSS", "Segurança Social", None),
    ("INSTITUTO REGISTOS", "Serviços Notariado", None),
    ("COMPRA", "Compras", None),
    ("MANUT CONTA", "Man. Conta", None),
    ("PAG", "Fornecedores", None),
    ("SCALMATICA", "Sistema POS", None),
    ("DEB FACTURAS NETCAIXA", "Man. Conta", None),
    ("PROSEGUR", "Alarme", None),
    ("MEO", "Internet", None),
    ("Multi Imposto", "Impostos", None),
    ("TRF SDT", "Fornecedores", None),
    ("RENDA", "Renda", None),
    ("DISP CARTAO DEBITO", "Man. Conta", None),
    ("IMPOSTO", "Impostos", None),
    ("PAGAMENTO", "Pagamento", None),
];

/// Category label for debits without a classification
pub const UNCLASSIFIED: &str = "Unclassified";

/// Rules pre-sorted by precedence
pub struct RuleSet {
    rules: Vec<(String, ClassificationRule)>,
}

impl RuleSet {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        let mut rules: Vec<(String, ClassificationRule)> = rules
            .into_iter()
            .filter(|r| !r.pattern.trim().is_empty())
            .map(|r| (r.pattern.to_lowercase(), r))
            .collect();

        rules.sort_by_key(|(pattern, rule)| {
            (
                rule.priority.is_none(),
                rule.priority,
                Reverse(pattern.chars().count()),
                rule.id,
            )
        });

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in the order they are tried
    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter().map(|(_, rule)| rule)
    }

    /// Best rule whose pattern occurs in `description`, ignoring case
    pub fn select(&self, description: &str) -> Option<&ClassificationRule> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, rule)| rule)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyOutcome {
    pub examined: usize,
    pub classified: usize,
    pub unmatched: usize,
}

/// Classify every debit that has no classification yet.
///
/// Runs in one transaction. Already classified debits are never touched, so
/// a second run with no new debits classifies nothing.
pub fn classify_pending(conn: &mut Connection) -> Result<ClassifyOutcome> {
    let tx = conn.transaction()?;

    let debits = db::get_unclassified_debits(&tx).context("Failed to load pending debits")?;
    let rules = RuleSet::new(db::list_rules(&tx).context("Failed to load rules")?);

    let mut outcome = ClassifyOutcome {
        examined: debits.len(),
        ..Default::default()
    };

    for debit in &debits {
        let Some(id) = debit.id else { continue };
        match rules.select(&debit.description) {
            Some(rule) => {
                if db::insert_applied_classification(&tx, id, &rule.category, Some(rule.id))? {
                    outcome.classified += 1;
                }
            }
            None => {
                debug!("No rule for debit {}: {}", id, debit.description);
                outcome.unmatched += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        "Classified {} of {} pending debits ({} unmatched)",
        outcome.classified, outcome.examined, outcome.unmatched
    );
    Ok(outcome)
}

/// Drop applied classifications (all, or one category) so they are re-evaluated
pub fn clear_classifications(conn: &Connection, category: Option<&str>) -> Result<usize> {
    let cleared = db::delete_classifications(conn, category)?;
    info!("Cleared {} classifications", cleared);
    Ok(cleared)
}
