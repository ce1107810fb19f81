//! Pull replies.

use crate::guid::Guid;
use crate::request::{AttributeId, HighWatermark, ObjectIdentifier};
use serde::{Deserialize, Serialize};

/// One attribute of a replicated object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaAttribute {
    /// Attribute id.
    pub attid: AttributeId,
    /// Encoded values.
    pub values: Vec<Vec<u8>>,
}

/// A replicated object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaObject {
    /// Object identity.
    pub identifier: ObjectIdentifier,
    /// Object flags.
    pub flags: u32,
    /// Changed attributes.
    pub attributes: Vec<ReplicaAttribute>,
}

/// Node of the singly-linked object list carried by a reply.
///
/// `Clone` and `Drop` walk the list iteratively, so list length is not
/// bounded by the stack.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedObjectItem {
    /// The object.
    pub object: ReplicaObject,
    /// Whether the object is the naming context root.
    pub is_nc_prefix: bool,
    /// Parent GUID, when ancestors were requested.
    pub parent_object_guid: Option<Guid>,
    /// Next object.
    pub next: Option<Box<ReplicatedObjectItem>>,
}

impl Clone for ReplicatedObjectItem {
    fn clone(&self) -> Self {
        let mut rest = Vec::new();
        let mut cursor = self.next.as_deref();
        while let Some(item) = cursor {
            rest.push(item);
            cursor = item.next.as_deref();
        }

        let mut next = None;
        for item in rest.into_iter().rev() {
            next = Some(Box::new(ReplicatedObjectItem {
                object: item.object.clone(),
                is_nc_prefix: item.is_nc_prefix,
                parent_object_guid: item.parent_object_guid,
                next,
            }));
        }
        ReplicatedObjectItem {
            object: self.object.clone(),
            is_nc_prefix: self.is_nc_prefix,
            parent_object_guid: self.parent_object_guid,
            next,
        }
    }
}

impl Drop for ReplicatedObjectItem {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut item) = next {
            next = item.next.take();
        }
    }
}

/// One server reply of the pull loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeChunk {
    /// Source DSA objectGUID.
    pub source_dsa_guid: Guid,
    /// Source DSA invocation id.
    pub source_dsa_invocation_id: Guid,
    /// Naming context pulled.
    pub naming_context: ObjectIdentifier,
    /// Cursor the request carried.
    pub old_highwatermark: HighWatermark,
    /// Cursor to send with the next request.
    pub new_highwatermark: HighWatermark,
    /// Number of objects the server claims to have sent.
    pub object_count: u32,
    /// Head of the object list.
    pub first_object: Option<Box<ReplicatedObjectItem>>,
    /// Whether the server has more to send.
    pub more_data: bool,
}

impl ChangeChunk {
    /// Builds a chunk, linking `objects` in order and setting the count.
    ///
    /// The count saturates at `u32::MAX`.
    pub fn from_objects(
        naming_context: ObjectIdentifier,
        old_highwatermark: HighWatermark,
        new_highwatermark: HighWatermark,
        objects: Vec<ReplicaObject>,
        more_data: bool,
    ) -> Self {
        let object_count = object_count_of(objects.len());
        let mut first_object = None;
        for object in objects.into_iter().rev() {
            first_object = Some(Box::new(ReplicatedObjectItem {
                object,
                is_nc_prefix: false,
                parent_object_guid: None,
                next: first_object,
            }));
        }

        Self {
            source_dsa_guid: Guid::NIL,
            source_dsa_invocation_id: Guid::NIL,
            naming_context,
            old_highwatermark,
            new_highwatermark,
            object_count,
            first_object,
            more_data,
        }
    }

    /// Returns true if the reply claims objects but carries no list.
    pub fn is_missing_objects(&self) -> bool {
        self.object_count != 0 && self.first_object.is_none()
    }

    /// Walks the object list.
    pub fn objects(&self) -> ObjectIter<'_> {
        ObjectIter {
            next: self.first_object.as_deref(),
        }
    }
}

/// Wire count for a list of `len` objects; saturates at `u32::MAX`.
fn object_count_of(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Iterator over the objects of a [`ChangeChunk`].
pub struct ObjectIter<'a> {
    next: Option<&'a ReplicatedObjectItem>,
}

impl<'a> Iterator for ObjectIter<'a> {
    type Item = &'a ReplicaObject;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next?;
        self.next = item.next.as_deref();
        Some(&item.object)
    }
}

/// A reply together with the level the server answered at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNcChangesReply {
    /// Reply layout level (1, 6 or 7).
    pub level: u32,
    /// Reply body.
    pub ctr: ChangeChunk,
}

impl GetNcChangesReply {
    /// Creates a reply.
    pub fn new(level: u32, ctr: ChangeChunk) -> Self {
        Self { level, ctr }
    }
}
