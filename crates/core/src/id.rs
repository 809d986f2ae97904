//! Check identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error produced when parsing a qualified check id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckIdError {
    /// No `:` separator between category and name
    #[error("check id '{0}' is missing the 'category:name' separator")]
    MissingSeparator(String),

    /// Category or name is empty
    #[error("check id '{0}' has an empty category or name")]
    EmptyPart(String),
}

/// Unique identifier for a check: a `(category, name)` pair.
///
/// The qualified form is `category:name`, e.g. `python:lint-format`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckId {
    category: String,
    name: String,
}

impl CheckId {
    /// Create a new CheckId.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Category part (e.g. `python`).
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Name part, without the category prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified `category:name` form.
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

impl FromStr for CheckId {
    type Err = CheckIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = s
            .split_once(':')
            .ok_or_else(|| CheckIdError::MissingSeparator(s.to_string()))?;

        if category.is_empty() || name.is_empty() {
            return Err(CheckIdError::EmptyPart(s.to_string()));
        }

        Ok(Self::new(category, name))
    }
}

impl TryFrom<String> for CheckId {
    type Error = CheckIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CheckId> for String {
    fn from(id: CheckId) -> Self {
        id.qualified()
    }
}
