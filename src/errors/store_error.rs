//! Errors raised by the document stores and the journal

use thiserror::Error;
use super::ValuationError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid page {page}: pages start at 1")]
    InvalidPage {
        page: usize,
    },

    #[error("Invalid page size {page_size}: must be between 1 and {max}")]
    InvalidPageSize {
        page_size: usize,
        max: usize,
    },

    #[error("{collection} document not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("{collection} document already exists: {id}")]
    Duplicate {
        collection: &'static str,
        id: String,
    },

    #[error("Invalid {collection} document: {reason}")]
    InvalidDocument {
        collection: &'static str,
        reason: String,
    },

    #[error("Invalid limit {limit}: must be between 1 and {max}")]
    InvalidLimit {
        limit: usize,
        max: usize,
    },

    #[error("Rejected document: {0}")]
    Valuation(#[from] ValuationError),

    #[error("Journal IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
