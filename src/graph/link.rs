//! Link record type.
//!
//! A link connects two nodes by identity. The raw source/target field values
//! are resolved into canonical [`NodeKey`]s during a rebuild; endpoints that do
//! not match any node in the snapshot are a data error surfaced when the
//! layout engine is seeded.

use super::Fields;
use super::node::NodeKey;
use crate::scene::ObjectId;

/// One link of the current graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct LinkRecord {
    /// Raw data fields from the input document.
    pub fields: Fields,
    /// Source node key, resolved through the configured accessor.
    pub source: Option<NodeKey>,
    /// Target node key, resolved through the configured accessor.
    pub target: Option<NodeKey>,
    /// Handle to the materialized render object (a directed segment), if any.
    pub object: Option<ObjectId>,
}

impl LinkRecord {
    /// Create a record from raw data fields.
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            source: None,
            target: None,
            object: None,
        }
    }
}
