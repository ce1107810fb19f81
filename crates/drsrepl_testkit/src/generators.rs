//! Property-based test generators using proptest.

use crate::schema::SchemaAttribute;
use drsrepl_protocol::{
    AttributeId, ExtendedOperation, GetNcChangesRequest8, Guid, HighWatermark, ObjectIdentifier,
    PartialAttributeSet, PrefixMapping, ReplicaFlags, SearchFlags, SupportedExtensions, SystemFlags,
    UpToDateCursor, UpToDateVector,
};
use proptest::prelude::*;

/// Strategy for GUIDs, nil included.
pub fn guid_strategy() -> impl Strategy<Value = Guid> {
    prop_oneof![
        1 => Just(Guid::NIL),
        9 => prop::array::uniform16(any::<u8>()).prop_map(Guid::from_bytes),
    ]
}

/// Strategy for arbitrary capability masks, unknown bits included.
pub fn extensions_strategy() -> impl Strategy<Value = SupportedExtensions> {
    any::<u32>().prop_map(SupportedExtensions::from_bits_retain)
}

/// Strategy for arbitrary replica flag words.
pub fn replica_flags_strategy() -> impl Strategy<Value = ReplicaFlags> {
    any::<u32>().prop_map(ReplicaFlags::from_bits_retain)
}

/// Strategy for extended operation codes.
pub fn extended_op_strategy() -> impl Strategy<Value = ExtendedOperation> {
    (0u32..=7).prop_filter_map("known code", ExtendedOperation::from_code)
}

/// Strategy for cursors.
pub fn highwatermark_strategy() -> impl Strategy<Value = HighWatermark> {
    (any::<u64>(), any::<u64>(), any::<u64>())
        .prop_map(|(tmp, reserved, highest)| HighWatermark::new(tmp, reserved, highest))
}

/// Strategy for distinguished names.
pub fn dn_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9]{0,11}", 1..4)
        .prop_map(|parts| parts.iter().map(|p| format!("DC={p}")).collect::<Vec<_>>().join(","))
}

/// Strategy for attribute sets built from unsorted, possibly repeated ids.
pub fn attribute_set_strategy() -> impl Strategy<Value = PartialAttributeSet> {
    prop::collection::vec(any::<u32>().prop_map(AttributeId), 0..32)
        .prop_map(PartialAttributeSet::new)
}

/// Strategy for fully populated v8 requests.
pub fn request8_strategy() -> impl Strategy<Value = GetNcChangesRequest8> {
    (
        (guid_strategy(), guid_strategy(), guid_strategy(), dn_strategy()),
        highwatermark_strategy(),
        prop::option::of(prop::collection::vec((guid_strategy(), any::<u64>()), 0..4)),
        replica_flags_strategy(),
        (any::<u32>(), any::<u32>()),
        extended_op_strategy(),
        any::<u64>(),
        prop::option::of(attribute_set_strategy()),
        prop::collection::vec((any::<u32>(), prop::collection::vec(any::<u8>(), 1..8)), 0..3),
    )
        .prop_map(|(ids, hwm, utdv, flags, limits, op, fsmo, pas, mapping)| {
            let (dest, source, nc_guid, dn) = ids;
            let (max_objects, max_bytes) = limits;
            let nc = ObjectIdentifier { guid: nc_guid, dn };
            let mut req = GetNcChangesRequest8::new(nc, source, dest);
            req.highwatermark = hwm;
            req.uptodateness_vector = utdv.map(|cursors| UpToDateVector {
                cursors: cursors
                    .into_iter()
                    .map(|(id, usn)| UpToDateCursor {
                        source_dsa_invocation_id: id,
                        highest_usn: usn,
                    })
                    .collect(),
            });
            req.replica_flags = flags;
            req.max_object_count = max_objects;
            req.max_ndr_size = max_bytes;
            req.extended_op = op;
            req.fsmo_info = fsmo;
            req.partial_attribute_set = pas.clone();
            req.partial_attribute_set_ex = pas;
            req.mapping_ctr = mapping
                .into_iter()
                .map(|(id_prefix, oid)| PrefixMapping { id_prefix, oid })
                .collect();
            req
        })
}

/// Strategy for flag words biased toward the bits the filter looks at.
fn flag_word_strategy(interesting: u32) -> impl Strategy<Value = Option<i64>> {
    prop::option::of(prop_oneof![
        (any::<u32>()).prop_map(|bits| i64::from(bits as i32)),
        (any::<bool>(), any::<u32>()).prop_map(move |(set, noise)| {
            let bits = if set { noise | interesting } else { noise & !interesting };
            i64::from(bits)
        }),
    ])
}

/// Strategy for attribute definitions with distinct names and ids.
pub fn schema_attributes_strategy(max: usize) -> impl Strategy<Value = Vec<SchemaAttribute>> {
    prop::collection::btree_map(
        any::<u32>(),
        (
            flag_word_strategy(SystemFlags::NEVER_SENT.bits()),
            flag_word_strategy(SearchFlags::RODC_FILTERED.bits()),
        ),
        0..max,
    )
    .prop_map(|defs| {
        defs.into_iter()
            .enumerate()
            .map(|(i, (attid, (system_flags, search_flags)))| SchemaAttribute {
                name: format!("attr{i}"),
                attid,
                system_flags,
                search_flags,
            })
            .collect()
    })
    .prop_shuffle()
}

/// Returns true if a definition should appear in a read-only replica's set.
pub fn is_partial_set_member(attribute: &SchemaAttribute) -> bool {
    let system = SystemFlags::from_bits_retain(attribute.system_flags.unwrap_or(0) as u32);
    let search = SearchFlags::from_bits_retain(attribute.search_flags.unwrap_or(0) as u32);
    !system.intersects(SystemFlags::NEVER_SENT) && !search.contains(SearchFlags::RODC_FILTERED)
}
