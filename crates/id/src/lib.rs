//! Short recipe identifiers.
//!
//! Every uploaded recipe and every generated technical card is keyed by a short, opaque
//! identifier. The identifier ends up inside file names (`images/<id>.jpg`,
//! `texts/<id>.txt`, `tech_card_<id>.xlsx`), so this crate owns both generation and the
//! validation of identifiers that arrive from outside (HTTP paths, request bodies, CLI flags).
//!
//! ## Generated form
//! - The first 8 characters of a random v4 UUID in simple (hex) form
//! - Example: `550e8400`
//!
//! ## Accepted form
//! Externally supplied identifiers do not have to look generated. Any value of 1 to
//! [`MAX_ID_LEN`] characters drawn from `A-Z`, `a-z`, `0-9`, `_` and `-` is accepted.
//! Everything else (path separators, dots, whitespace, non-ASCII) is rejected.
//!
//! Uniqueness is not enforced beyond the entropy of generation.

mod service;

pub use service::{RecipeId, GENERATED_ID_LEN, MAX_ID_LEN};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
