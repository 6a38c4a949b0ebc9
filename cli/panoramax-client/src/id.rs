//! Panoramax identifiers.
//!
//! Sequences and pictures are identified by UUID-shaped tokens
//! (`8-4-4-4-12` groups of lowercase alphanumerics).
//! Any id that ends up in a request path or a search filter is checked here first,
//! so that no request is ever built from an unvalidated id.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static ID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]{8}-(?:[a-z0-9]{4}-){3}[a-z0-9]{12}$")
        .expect("id format is a valid regex")
});

/// Checks whether `id` has the shape of a Panoramax id.
pub fn is_valid_id(id: &str) -> bool {
    ID_FORMAT.is_match(id)
}

/// A validated sequence or picture id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Validate `id`, naming `field` in the error if it is rejected.
    pub fn parse(field: &'static str, id: impl AsRef<str>) -> Result<Self, ValidationError> {
        let id = id.as_ref();
        if !is_valid_id(id) {
            return Err(ValidationError::InvalidId {
                field,
                id: id.to_string(),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ResourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse("id", s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse("id", value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}
