//! Error taxonomy for the storage engine and codec (spec.md §7).

use thiserror::Error;

/// Errors surfaced by the slab allocator and item-operations layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Item footprint larger than the largest configured size class.
    #[error("object too large for any slab class")]
    Oversized,
    /// Slab full, no eviction policy configured (or eviction itself failed),
    /// a pool was exhausted, or a buffer hit its growth cap.
    #[error("out of memory")]
    Enomem,
    /// A CAS-guarded mutation was attempted against a stale or missing CAS.
    #[error("item exists with a different cas value")]
    Exists,
    /// The targeted item was not present (or was lazily expired).
    #[error("item not found")]
    NotFound,
    /// A conditional store (`add`/`replace`) failed its precondition.
    #[error("item not stored")]
    NotStored,
}

/// Outcome of a single parser step (spec.md §4.4.1). Distinct from
/// [`CoreError`] because `Unfin` is not an error at all — it's the expected
/// result of feeding a parser a short buffer — and `Empty` is used
/// internally to end a variadic key list without signalling a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The message is complete and was fully parsed.
    Ok,
    /// Not enough bytes yet; call again with the same request state once
    /// more bytes have arrived. `rpos` is left unchanged.
    Unfin,
    /// An expected token was absent at a permitted boundary (used to end a
    /// variadic key list); not a protocol error.
    Empty,
    /// Malformed framing or a non-numeric value in a numeric field.
    Invalid,
    /// A semantic violation distinct from framing (e.g. too many keys).
    Other(&'static str),
}

/// Errors from composing a request or response into a
/// [`crate::buffer::Buffer`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// The message would exceed the buffer's configured growth cap.
    #[error("response exceeds buffer growth cap")]
    Enomem,
    /// The flavor has no wire encoding for this command (e.g. a memcache
    /// ASCII `Cas` composed for the RESP flavor, which only has the 8 verbs
    /// in spec.md §4.4.2).
    #[error("{0}")]
    Unsupported(String),
}

impl From<CoreError> for ComposeError {
    fn from(_: CoreError) -> Self {
        ComposeError::Enomem
    }
}
