//! Output module for run reports and exported documents
//!
//! This module handles:
//! - Printing run summaries and per-source store statistics
//! - Formatting records as plain-text documents for retrieval
//! - Exporting those documents to a directory

pub mod document;
pub mod stats;

pub use document::{export_documents, format_document, ExportSummary};
pub use stats::{load_source_statistics, print_run_summary, print_source_statistics, SourceStatistics};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
