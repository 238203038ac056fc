//! Error handling for conciliador
//!
//! File-level import failures get a dedicated error type so they can be
//! rendered into a per-file status instead of aborting the batch. Everything
//! else propagates through anyhow with context chaining.

use thiserror::Error;

/// Reasons a single input file fails to import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("file could not be read: {0}")]
    Unreadable(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("no transaction table found")]
    HeaderNotFound,

    #[error("missing required columns ({0})")]
    MissingColumns(String),

    #[error("no valid rows after parsing")]
    NoValidRows,

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ImportError::MissingColumns("date, amount".to_string());
        assert_eq!(err.to_string(), "missing required columns (date, amount)");
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: anyhow::Result<()> = Err(anyhow::Error::new(ImportError::HeaderNotFound))
            .context("failed to import extrato.csv");
        match result {
            Err(e) => {
                assert!(e.to_string().contains("failed to import extrato.csv"));
                let debug_msg = format!("{:?}", e);
                assert!(debug_msg.contains("no transaction table found"));
                assert!(matches!(
                    e.downcast_ref::<ImportError>(),
                    Some(ImportError::HeaderNotFound)
                ));
            }
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_import_error_variants() {
        assert!(ImportError::NoValidRows.to_string().starts_with("no valid rows"));
        assert!(ImportError::Unreadable("x".into())
            .to_string()
            .starts_with("file could not be read"));
        let store = ImportError::Store("UNIQUE constraint failed".into());
        assert_eq!(store.to_string(), "store error: UNIQUE constraint failed");
        let io: ImportError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(io, ImportError::Io(_)));
    }
}
