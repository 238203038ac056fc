//! User configuration (`config.toml`)
//!
//! Looked up at `<config_home>/conciliador/config.toml` unless a path is given
//! explicitly. A missing file yields the defaults; a malformed one is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; `~/.conciliador/data.db` when unset
    pub database: Option<PathBuf>,
    pub reconcile: ReconcileSection,
    pub import: ImportSection,
    /// Extra classification rules seeded by `init`
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    /// Bank credits whose description contains this are cash deposits
    pub deposit_marker: String,
    /// Bank credits whose description contains this are card settlements
    pub card_settlement_marker: String,
    pub cash_keywords: Vec<String>,
    pub card_keywords: Vec<String>,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            deposit_marker: "DEPOSITO".to_string(),
            card_settlement_marker: "TPA".to_string(),
            cash_keywords: vec![
                "numerario".to_string(),
                "dinheiro".to_string(),
                "cash".to_string(),
            ],
            card_keywords: vec![
                "multibanco".to_string(),
                "cartao".to_string(),
                "card".to_string(),
                "visa".to_string(),
                "mastercard".to_string(),
                "tpa".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    /// Only files starting with this prefix are picked up by sales folder imports
    pub sales_prefix: Option<String>,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            sales_prefix: Some("Vendas".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleEntry {
    pub pattern: String,
    pub category: String,
    pub priority: Option<i32>,
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    let config_home = dir_spec::config_home()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_home.join("conciliador").join("config.toml"))
}

/// Load config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Ok(p) => p,
            Err(_) => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<Config> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.reconcile.deposit_marker, "DEPOSITO");
        assert_eq!(cfg.reconcile.card_settlement_marker, "TPA");
        assert_eq!(cfg.import.sales_prefix.as_deref(), Some("Vendas"));
        assert!(cfg.rules.is_empty());
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = parse_config(
            r#"
            database = "/tmp/loja.db"

            [reconcile]
            deposit_marker = "DEP NUMERARIO"

            [[rules]]
            pattern = "GALP"
            category = "Fuel"
            priority = 1
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database, Some(PathBuf::from("/tmp/loja.db")));
        assert_eq!(cfg.reconcile.deposit_marker, "DEP NUMERARIO");
        assert_eq!(cfg.reconcile.card_settlement_marker, "TPA");
        assert_eq!(
            cfg.rules,
            vec![RuleEntry {
                pattern: "GALP".to_string(),
                category: "Fuel".to_string(),
                priority: Some(1),
            }]
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(cfg.reconcile.deposit_marker, "DEPOSITO");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "reconcile = [").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("parse"));
    }
}
