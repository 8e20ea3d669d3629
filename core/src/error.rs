//! Error types for the **ots-core** crate.
//!
//! All high-level operations return [`crate::Result`], a convenient alias
//! for `core::result::Result<T, Error>`. Lower-level serialization errors
//! are wrapped rather than flattened, so callers can still match on the
//! precise cause when they need to.

use thiserror::Error;

use crate::ser;

/// Core crate error type. Variants line up with the taxonomy buckets
/// spec.md §7 defines: Deserialization, Value/Invariant, Verification,
/// IO/Network, and NotFound.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A structure failed to parse off the wire.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] ser::Error),

    /// An invariant was violated: mismatched merge, empty serialization,
    /// empty merkle input, out-of-range parameters.
    #[error("invalid value: {0}")]
    Value(String),

    /// An attestation's claim did not check out against an oracle.
    #[error("verification failed: {0}")]
    Verification(String),

    /// A network or I/O operation failed (timeout, non-200 status,
    /// oversized response, DNS failure).
    #[error("io error: {0}")]
    Io(String),

    /// A lookup that is allowed to miss (calendar 404, cache miss) came up
    /// empty. Distinguished from `Io`/`Verification` so callers can
    /// downgrade it to a retry instead of treating it as fatal.
    #[error("not found")]
    NotFound,
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
