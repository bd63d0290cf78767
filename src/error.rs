//! Error types for descriptor and transfer-block building.

use thiserror::Error;

/// Errors raised while building, finalizing or decoding a table.
#[derive(Debug, Error)]
pub enum Error {
    /// A record or string was added or modified after finalization.
    #[error("table is finalized and can no longer be modified")]
    LockedState,

    /// Finalization was requested a second time.
    #[error("table is already finalized")]
    AlreadyFinalized,

    /// Serialization was requested before finalization.
    #[error("table must be finalized first")]
    NotFinalized,

    /// A lookup by kind, index or handle found no match.
    #[error("not found: {0}")]
    NotFound(String),

    /// An object was attached to a collection it already belongs to.
    #[error("already attached: {0}")]
    DuplicateAttach(String),

    /// Raw bytes or a slot index do not fit the declared layout.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// The requested combination is not implemented.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// I/O error while writing a table listing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [Error].
pub type Result<T> = std::result::Result<T, Error>;
