//! Partial attribute set builder for read-only replicas.
//!
//! The set decides which attributes a restricted replica receives. An
//! attribute is left out when the server never sends it (not replicated
//! or constructed) or when it is filtered from read-only replicas.
//! Everything else is requested, and the ids go out sorted: servers skip
//! attributes of an unsorted set without reporting it.

use crate::error::DrsResult;
use crate::schema::{SchemaError, SchemaSource, SearchEntry, SearchScope};
use drsrepl_protocol::{PartialAttributeSet, SearchFlags, SystemFlags};
use tracing::{debug, trace};

/// Filter selecting attribute definitions.
pub const ATTRIBUTE_SCHEMA_FILTER: &str = "objectClass=attributeSchema";

/// Attributes read from each definition.
pub const PAS_SEARCH_ATTRIBUTES: [&str; 3] = ["lDAPDisplayName", "systemFlags", "searchFlags"];

/// Computes the partial attribute set for a restricted replica.
pub fn build_partial_attribute_set<S: SchemaSource + ?Sized>(
    schema: &S,
) -> DrsResult<PartialAttributeSet> {
    let base = schema.schema_base_dn()?;
    let entries = schema.search(
        &base,
        SearchScope::Subtree,
        ATTRIBUTE_SCHEMA_FILTER,
        &PAS_SEARCH_ATTRIBUTES,
    )?;

    let mut attids = Vec::with_capacity(entries.len());
    for entry in &entries {
        let name = entry
            .first("lDAPDisplayName")
            .ok_or_else(|| malformed(entry, "missing lDAPDisplayName"))?;

        let system_flags = SystemFlags::from_bits_retain(read_flags(entry, "systemFlags")?);
        if system_flags.intersects(SystemFlags::NEVER_SENT) {
            trace!(attribute = name, ?system_flags, "not sent by servers");
            continue;
        }

        let search_flags = SearchFlags::from_bits_retain(read_flags(entry, "searchFlags")?);
        if search_flags.contains(SearchFlags::RODC_FILTERED) {
            trace!(attribute = name, "filtered from read-only replicas");
            continue;
        }

        attids.push(schema.attid_from_display_name(name)?);
    }

    let set = PartialAttributeSet::new(attids);
    debug!(
        schema_entries = entries.len(),
        requested = set.len(),
        "built partial attribute set"
    );
    Ok(set)
}

/// Reads a 32-bit flag word; an absent attribute means no flags.
fn read_flags(entry: &SearchEntry, name: &str) -> Result<u32, SchemaError> {
    let Some(raw) = entry.first(name) else {
        return Ok(0);
    };
    // Directory integers are signed 32-bit; keep the bit pattern.
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= i64::from(i32::MIN) && *v <= i64::from(u32::MAX))
        .map(|v| v as u32)
        .ok_or_else(|| malformed(entry, &format!("{name} is not a 32-bit integer: {raw}")))
}

fn malformed(entry: &SearchEntry, reason: &str) -> SchemaError {
    SchemaError::MalformedEntry {
        dn: entry.dn.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DrsError;
    use drsrepl_protocol::AttributeId;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct FakeSchema {
        entries: Vec<SearchEntry>,
        attids: HashMap<String, u32>,
        searches: Mutex<Vec<(String, SearchScope, String, Vec<String>)>>,
    }

    impl FakeSchema {
        fn new() -> Self {
            Self {
                entries: Vec::new(),
                attids: HashMap::new(),
                searches: Mutex::new(Vec::new()),
            }
        }

        fn attribute(
            mut self,
            name: &str,
            attid: u32,
            system: Option<&str>,
            search: Option<&str>,
        ) -> Self {
            let dn = format!("CN={name},CN=Schema,CN=Configuration,DC=example");
            let mut entry = SearchEntry::new(dn).with_attribute("lDAPDisplayName", name);
            if let Some(flags) = system {
                entry = entry.with_attribute("systemFlags", flags);
            }
            if let Some(flags) = search {
                entry = entry.with_attribute("searchFlags", flags);
            }
            self.entries.push(entry);
            self.attids.insert(name.to_string(), attid);
            self
        }
    }

    impl SchemaSource for FakeSchema {
        fn schema_base_dn(&self) -> Result<String, SchemaError> {
            Ok("CN=Schema,CN=Configuration,DC=example".into())
        }

        fn search(
            &self,
            base: &str,
            scope: SearchScope,
            filter: &str,
            attrs: &[&str],
        ) -> Result<Vec<SearchEntry>, SchemaError> {
            self.searches.lock().push((
                base.to_string(),
                scope,
                filter.to_string(),
                attrs.iter().map(|a| a.to_string()).collect(),
            ));
            Ok(self.entries.clone())
        }

        fn attid_from_display_name(&self, name: &str) -> Result<AttributeId, SchemaError> {
            self.attids
                .get(name)
                .map(|id| AttributeId(*id))
                .ok_or_else(|| SchemaError::UnknownAttribute(name.to_string()))
        }
    }

    #[test]
    fn filters_and_sorts() {
        let schema = FakeSchema::new()
            .attribute("name", 0x90001, Some("16"), None)
            .attribute("objectGUID", 0x90002, Some("16"), Some("9"))
            .attribute("cn", 0x3, None, None)
            .attribute("unicodePwd", 0x9005a, Some("16"), Some("640"))
            .attribute("tokenGroups", 0x9029e, Some("134217748"), None)
            .attribute("replPropertyMetaData", 0x90003, Some("1"), None);

        let pas = build_partial_attribute_set(&schema).unwrap();
        let ids: Vec<u32> = pas.attids().iter().map(|a| a.0).collect();
        assert_eq!(ids, vec![0x3, 0x90001, 0x90002]);
        assert_eq!(pas.version(), 1);
    }

    #[test]
    fn searches_attribute_schema_subtree() {
        let schema = FakeSchema::new().attribute("cn", 0x3, None, None);
        build_partial_attribute_set(&schema).unwrap();

        let searches = schema.searches.lock();
        assert_eq!(searches.len(), 1);
        let (base, scope, filter, attrs) = &searches[0];
        assert_eq!(base, "CN=Schema,CN=Configuration,DC=example");
        assert_eq!(*scope, SearchScope::Subtree);
        assert_eq!(filter, "objectClass=attributeSchema");
        assert_eq!(attrs, &["lDAPDisplayName", "systemFlags", "searchFlags"]);
    }

    #[test]
    fn negative_system_flags_keep_bits() {
        // 0x80000010 as a signed directory integer.
        let schema = FakeSchema::new()
            .attribute("keep", 0x10, Some("-2147483632"), None)
            // 0x80000004 has IS_CONSTRUCTED set.
            .attribute("drop", 0x11, Some("-2147483644"), None);

        let pas = build_partial_attribute_set(&schema).unwrap();
        assert_eq!(pas.attids(), &[AttributeId(0x10)]);
    }

    #[test]
    fn rejects_non_integer_flags() {
        let schema = FakeSchema::new().attribute("bad", 0x1, Some("sixteen"), None);
        let err = build_partial_attribute_set(&schema).unwrap_err();
        assert!(matches!(
            err,
            DrsError::Schema(SchemaError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn missing_display_name_is_an_error() {
        let mut schema = FakeSchema::new();
        schema.entries.push(SearchEntry::new("CN=nameless,CN=Schema"));
        assert!(matches!(
            build_partial_attribute_set(&schema),
            Err(DrsError::Schema(SchemaError::MalformedEntry { .. }))
        ));
    }

    #[test]
    fn unresolvable_attribute_propagates() {
        let mut schema = FakeSchema::new().attribute("cn", 0x3, None, None);
        schema.attids.clear();
        assert!(matches!(
            build_partial_attribute_set(&schema),
            Err(DrsError::Schema(SchemaError::UnknownAttribute(ref name))) if name == "cn"
        ));
    }

    #[test]
    fn duplicate_ids_collapse() {
        let schema = FakeSchema::new()
            .attribute("a", 0x5, None, None)
            .attribute("b", 0x5, None, None)
            .attribute("c", 0x1, None, None);
        let pas = build_partial_attribute_set(&schema).unwrap();
        assert_eq!(pas.attids(), &[AttributeId(0x1), AttributeId(0x5)]);
    }
}
