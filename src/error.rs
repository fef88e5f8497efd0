//! Typed failures callers may want to match on.
//!
//! Everything else travels as `anyhow::Error` with path context attached.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to initialize memory directory {path}: {source}")]
    Initialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error(
        "unknown save kind '{0}', expected one of: \
         daily, discovery, preference, decision, solution, config"
    )]
    UnknownSaveKind(String),

    #[error("unknown index status '{0}'")]
    UnknownIndexStatus(String),

    #[error("vector retriever timed out after {0} ms")]
    RetrieverTimeout(u64),
}
