//! In-memory schema source.

use drsrepl_engine::{SchemaError, SchemaSource, SearchEntry, SearchScope, ATTRIBUTE_SCHEMA_FILTER};
use drsrepl_protocol::AttributeId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    /// LDAP display name.
    #[serde(rename = "lDAPDisplayName")]
    pub name: String,
    /// Numeric attribute id.
    #[serde(rename = "attributeId")]
    pub attid: u32,
    /// Raw `systemFlags`, absent when unset.
    #[serde(rename = "systemFlags", default, skip_serializing_if = "Option::is_none")]
    pub system_flags: Option<i64>,
    /// Raw `searchFlags`, absent when unset.
    #[serde(rename = "searchFlags", default, skip_serializing_if = "Option::is_none")]
    pub search_flags: Option<i64>,
}

impl SchemaAttribute {
    /// Creates a definition with no flags.
    pub fn new(name: impl Into<String>, attid: u32) -> Self {
        Self {
            name: name.into(),
            attid,
            system_flags: None,
            search_flags: None,
        }
    }

    /// Sets `systemFlags`.
    pub fn with_system_flags(mut self, flags: i64) -> Self {
        self.system_flags = Some(flags);
        self
    }

    /// Sets `searchFlags`.
    pub fn with_search_flags(mut self, flags: i64) -> Self {
        self.search_flags = Some(flags);
        self
    }

    fn to_entry(&self, base: &str, attrs: &[&str]) -> SearchEntry {
        let mut entry = SearchEntry::new(format!("CN={},{}", self.name, base));
        let wanted = |name: &str| attrs.iter().any(|a| a.eq_ignore_ascii_case(name));

        if wanted("lDAPDisplayName") {
            entry = entry.with_attribute("lDAPDisplayName", self.name.clone());
        }
        if let (true, Some(flags)) = (wanted("systemFlags"), self.system_flags) {
            entry = entry.with_attribute("systemFlags", flags.to_string());
        }
        if let (true, Some(flags)) = (wanted("searchFlags"), self.search_flags) {
            entry = entry.with_attribute("searchFlags", flags.to_string());
        }
        entry
    }
}

#[derive(Deserialize)]
struct SchemaDocument {
    base_dn: String,
    attributes: Vec<SchemaAttribute>,
}

/// A schema held in memory.
///
/// Answers only subtree searches for attribute definitions below its own
/// base DN; anything else is a search error.
#[derive(Debug)]
pub struct MemorySchema {
    base_dn: String,
    attributes: Vec<SchemaAttribute>,
    searches: Mutex<usize>,
    unavailable: bool,
}

impl MemorySchema {
    /// Creates an empty schema under `base_dn`.
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            attributes: Vec::new(),
            searches: Mutex::new(0),
            unavailable: false,
        }
    }

    /// Loads a schema from JSON of the form
    /// `{"base_dn": "...", "attributes": [{"lDAPDisplayName": ..., "attributeId": ...}]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        let mut schema = Self::new(doc.base_dn);
        schema.attributes = doc.attributes;
        Ok(schema)
    }

    /// Adds a definition.
    pub fn with_attribute(mut self, attribute: SchemaAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Makes every search fail.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Attribute definitions.
    pub fn attributes(&self) -> &[SchemaAttribute] {
        &self.attributes
    }

    /// Number of searches served.
    pub fn search_count(&self) -> usize {
        *self.searches.lock()
    }
}

impl SchemaSource for MemorySchema {
    fn schema_base_dn(&self) -> Result<String, SchemaError> {
        Ok(self.base_dn.clone())
    }

    fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, SchemaError> {
        *self.searches.lock() += 1;
        if self.unavailable {
            return Err(SchemaError::Search("schema partition unavailable".into()));
        }
        if !base.eq_ignore_ascii_case(&self.base_dn) {
            return Err(SchemaError::Search(format!("no such object: {base}")));
        }
        if scope != SearchScope::Subtree || filter != ATTRIBUTE_SCHEMA_FILTER {
            return Err(SchemaError::Search(format!("unsupported search {scope:?} {filter}")));
        }
        Ok(self
            .attributes
            .iter()
            .map(|a| a.to_entry(&self.base_dn, attrs))
            .collect())
    }

    fn attid_from_display_name(&self, name: &str) -> Result<AttributeId, SchemaError> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| AttributeId(a.attid))
            .ok_or_else(|| SchemaError::UnknownAttribute(name.to_string()))
    }
}
