//! Typed error taxonomy shared by every stage of the ESA pipeline.
//!
//! Library code returns `Result<T, EsaError>`; the CLI front end wraps that
//! in `anyhow::Error` at the process boundary so it can attach context as it
//! propagates up to `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EsaError {
    /// Decompression or XML framing failure on the corpus stream. Fatal for
    /// the ingest that produced it.
    #[error("source decode error: {0}")]
    SourceDecode(String),

    /// A single `<page>` could not be interpreted. Callers should log and
    /// skip rather than propagate this further, which is why the ingest
    /// loop never lets this variant escape `DocumentSource::next_document`.
    #[error("document parse error: {0}")]
    DocumentParse(String),

    /// Backing-store failure: open, insert, index creation, or scan.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Missing or inconsistent paths, or a filter-chain mismatch between
    /// build and query.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type EsaResult<T> = std::result::Result<T, EsaError>;
