//! Force layout backends behind one adapter.
//!
//! Two interchangeable engines drive node positions:
//! - [`force::ForceLayout`]: a continuous-force simulation (link, charge and
//!   centering forces with alpha/velocity decay) that tracks position and
//!   velocity directly on the node records, across 1-3 dimensions.
//! - [`topological::TopologicalLayout`]: a spring/repulsion integrator over
//!   its own internal graph representation, addressed by node identity and
//!   link index.
//!
//! Switching backend or dimensionality always re-seeds from scratch; there is
//! no migration of simulation state between engines.

pub mod force;
pub mod topological;

use glam::DVec3;
use thiserror::Error;

use crate::graph::{LinkRecord, NodeKey, NodeRecord};

pub use force::{ForceLayout, ForceTuning};
pub use topological::TopologicalLayout;

/// Which layout backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// Continuous-force simulation over the node records.
    #[default]
    Force,
    /// Spring integrator over an internal topological graph.
    Topological,
}

/// Errors raised at the layout boundary.
///
/// These are the loud failures of the system: a link that cannot bind to its
/// endpoints would silently corrupt the layout topology, and a position query
/// for an identity outside the current snapshot means the caller is holding
/// stale references from before a rebuild.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A link's endpoint key does not match any node in the snapshot.
    #[error("link {index}: endpoint `{key}` does not match any node")]
    UnresolvedEndpoint { index: usize, key: String },

    /// A link is missing its source or target value entirely.
    #[error("link {0} is missing a source or target")]
    IncompleteLink(usize),

    /// Position query for a node identity not present in the snapshot.
    #[error("unknown node identity `{0}`")]
    UnknownNode(String),

    /// Position query for a link index not present in the snapshot.
    #[error("unknown link index {0}")]
    UnknownLink(usize),
}

/// The active layout engine for one rebuild cycle.
///
/// All backend-specific state lives behind this enum; the synchronizer only
/// ever sees the uniform seed/advance/position contract.
pub enum LayoutAdapter {
    Force(ForceLayout),
    Topological(TopologicalLayout),
}

impl LayoutAdapter {
    /// Seed a fresh engine from the current snapshot.
    ///
    /// Fails when a link endpoint cannot be resolved to a node identity.
    pub fn seed(
        kind: EngineKind,
        nodes: &mut [NodeRecord],
        links: &[LinkRecord],
        dims: u8,
        tuning: &ForceTuning,
    ) -> Result<Self, LayoutError> {
        match kind {
            EngineKind::Force => Ok(Self::Force(ForceLayout::seed(nodes, links, dims, tuning)?)),
            EngineKind::Topological => Ok(Self::Topological(TopologicalLayout::seed(
                nodes, links, dims,
            )?)),
        }
    }

    /// Run one simulation step. Repeated calls strictly advance time.
    pub fn advance(&mut self, nodes: &mut [NodeRecord]) {
        match self {
            Self::Force(engine) => engine.advance(nodes),
            Self::Topological(engine) => engine.advance(),
        }
    }

    /// Query a node position by identity. Missing dimensions read as 0.
    pub fn node_position(&self, nodes: &[NodeRecord], key: &NodeKey) -> Result<DVec3, LayoutError> {
        match self {
            Self::Force(engine) => engine.node_position(nodes, key),
            Self::Topological(engine) => engine.node_position(key),
        }
    }

    /// Query a node position by snapshot index; `None` for out-of-range
    /// indices (the record was never registered).
    pub fn node_position_at(&self, nodes: &[NodeRecord], index: usize) -> Option<DVec3> {
        match self {
            Self::Force(_) => nodes.get(index).map(|n| n.sim.position()),
            Self::Topological(engine) => engine.node_position_at(index),
        }
    }

    /// Query a link's endpoint positions (source side, target side) by
    /// snapshot link index.
    pub fn link_position(
        &self,
        nodes: &[NodeRecord],
        index: usize,
    ) -> Result<(DVec3, DVec3), LayoutError> {
        match self {
            Self::Force(engine) => engine.link_position(nodes, index),
            Self::Topological(engine) => engine.link_position(index),
        }
    }

    /// Access the continuous-force backend, when active.
    pub fn force(&self) -> Option<&ForceLayout> {
        match self {
            Self::Force(engine) => Some(engine),
            Self::Topological(_) => None,
        }
    }

    /// Mutable access to the continuous-force backend, when active.
    pub fn force_mut(&mut self) -> Option<&mut ForceLayout> {
        match self {
            Self::Force(engine) => Some(engine),
            Self::Topological(_) => None,
        }
    }
}

/// Minimal deterministic PRNG for initial placement and coincident-node
/// jiggle. Keeps layouts reproducible without a randomness dependency.
#[derive(Debug, Clone)]
pub(crate) struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}
