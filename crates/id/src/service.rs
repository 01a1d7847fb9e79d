//! Internal implementation of the recipe identifier.

use crate::{IdError, IdResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Length of a freshly generated identifier.
pub const GENERATED_ID_LEN: usize = 8;

/// Longest identifier accepted from outside.
pub const MAX_ID_LEN: usize = 64;

/// A validated recipe identifier.
///
/// Once constructed, the contained value is safe to use as a file-name component: it is
/// non-empty, bounded in length and contains only ASCII alphanumerics, `_` and `-`.
///
/// # Construction
/// - [`RecipeId::new`] generates a fresh identifier.
/// - [`RecipeId::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecipeId(String);

impl Default for RecipeId {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeId {
    /// Generates a new identifier from a random v4 UUID.
    ///
    /// The result is the first [`GENERATED_ID_LEN`] lowercase hex characters of the UUID.
    pub fn new() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..GENERATED_ID_LEN].to_string())
    }

    /// Validates an identifier supplied from outside.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is empty, longer than [`MAX_ID_LEN`], or
    /// contains anything other than ASCII alphanumerics, `_` and `-`.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_valid(input) {
            return Ok(Self(input.to_string()));
        }
        Err(IdError::InvalidInput(format!(
            "recipe id must be 1-{} characters of A-Z, a-z, 0-9, '_' or '-', got: '{}'",
            MAX_ID_LEN, input
        )))
    }

    /// Returns true if `input` would be accepted by [`RecipeId::parse`].
    pub fn is_valid(input: &str) -> bool {
        !input.is_empty()
            && input.len() <= MAX_ID_LEN
            && input
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `dir/<prefix><id><suffix>`.
    ///
    /// Because the identifier cannot contain separators or dots, the result always stays a
    /// direct child of `dir`.
    pub fn file_in(&self, dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
        dir.join(format!("{}{}{}", prefix, self.0, suffix))
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecipeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecipeId::parse(s)
    }
}

impl AsRef<str> for RecipeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecipeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecipeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecipeId::parse(&s).map_err(serde::de::Error::custom)
    }
}
