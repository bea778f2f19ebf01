//! Graph snapshot: the `{nodes, links}` document.
//!
//! Replacing a snapshot is atomic from the engine's point of view: every
//! previously materialized render object and all running simulation state is
//! invalidated, and the next rebuild owns the new records outright.

use serde::Deserialize;

use super::Fields;
use super::link::LinkRecord;
use super::node::NodeRecord;

/// A full graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct GraphData {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

/// Wire shape of a snapshot document. Both sequences default to empty.
#[derive(Deserialize)]
struct RawGraphData {
    #[serde(default)]
    nodes: Vec<Fields>,
    #[serde(default)]
    links: Vec<Fields>,
}

impl<'de> Deserialize<'de> for GraphData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawGraphData::deserialize(deserializer)?;
        Ok(Self {
            nodes: raw.nodes.into_iter().map(NodeRecord::new).collect(),
            links: raw.links.into_iter().map(LinkRecord::new).collect(),
        })
    }
}

impl GraphData {
    /// True when the snapshot holds neither nodes nor links.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    /// Strip position/velocity components above the given dimension count
    /// from every node, so stale higher-dimension state cannot leak into a
    /// lower-dimension layout.
    pub fn strip_dimensions(&mut self, dims: u8) {
        for node in &mut self.nodes {
            if dims < 3 {
                node.sim.strip_z();
            }
            if dims < 2 {
                node.sim.strip_y();
            }
        }
    }
}
