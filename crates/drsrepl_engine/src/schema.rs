//! Schema search collaborator.

use drsrepl_protocol::AttributeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors reported by, or about the records of, a schema source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The search itself failed.
    #[error("schema search failed: {0}")]
    Search(String),

    /// No attribute with this display name.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A returned record is unusable.
    #[error("malformed schema entry {dn}: {reason}")]
    MalformedEntry {
        /// DN of the record.
        dn: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base object only.
    Base,
    /// Direct children of the base.
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// One search result record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Distinguished name.
    pub dn: String,
    /// Attribute values by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl SearchEntry {
    /// Creates an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// First value of `name`. Attribute names compare case-insensitively.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// Read access to the directory schema.
pub trait SchemaSource {
    /// DN of the schema naming context.
    fn schema_base_dn(&self) -> Result<String, SchemaError>;

    /// Searches below `base`, returning only `attrs` on each record.
    fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, SchemaError>;

    /// Resolves the numeric id of an attribute.
    fn attid_from_display_name(&self, name: &str) -> Result<AttributeId, SchemaError>;
}
