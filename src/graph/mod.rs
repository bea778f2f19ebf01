//! Graph data model: node/link records, identity keys, and field accessors.

pub mod accessor;
pub mod data;
pub mod link;
pub mod node;

pub use accessor::Accessor;
pub use data::GraphData;
pub use link::LinkRecord;
pub use node::{NodeKey, NodeRecord, SimState};

/// Raw data fields of one record, as parsed from the input document.
pub type Fields = serde_json::Map<String, serde_json::Value>;
