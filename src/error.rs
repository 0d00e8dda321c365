//! Fatal pipeline errors.
//!
//! Only the three conditions that abort a whole run live here: a document
//! that is not an archive, a store with nobody authenticated, and storage
//! becoming unavailable mid-run. Per-item failures never surface as an
//! `ImportError`; they are recorded in the progress/result error lists and
//! the run continues.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The document is not a parseable archive (wrong root element,
    /// malformed XML, not UTF-8).
    #[error("invalid archive: {0}")]
    Format(String),

    /// The store has no authenticated principal to import as.
    #[error("no authenticated principal")]
    NoPrincipal,

    /// Storage became unavailable; the run cannot continue.
    #[error(transparent)]
    Store(#[from] StoreError),
}
