// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::{Action, LedgerKey};

/// Failures of a reconciliation request. The ledger handed in is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("cannot {action} stock: no record for {key}")]
    NotFound { key: LedgerKey, action: Action },

    #[error("quantity for {key} must be at least 1")]
    InvalidQuantity { key: LedgerKey },
}

/// Non-fatal conditions reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("{rows} ledger rows share the key {key}; using the most recently updated one")]
    AmbiguousMatch { key: LedgerKey, rows: usize },

    #[error("no quantity could be read from {context:?}; using 1 (estimated)")]
    Parse { context: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt {table} row {row}: {reason}")]
    CorruptRow {
        table: &'static str,
        row: i64,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("{0} looks scanned / image-only; photograph the page instead")]
    Scanned(PathBuf),

    #[error("OCR command `{command}` could not be started: {source}")]
    OcrUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("unsupported document type: {0}")]
    Unsupported(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
