//! Topological layout backend.
//!
//! Unlike the continuous-force engine, this backend never touches the node
//! records: it builds its own graph representation (petgraph `StableGraph`
//! plus identity/index maps) from node keys and edge pairs, integrates a
//! spring/repulsion system over internal position buffers, and answers
//! position queries by node identity or link index.

use std::collections::HashMap;

use glam::DVec3;
use petgraph::Directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};

use crate::graph::{LinkRecord, NodeKey, NodeRecord};

use super::{LayoutError, Lcg};

/// Spring rest length between linked nodes.
const SPRING_LENGTH: f64 = 30.0;
/// Spring stiffness.
const SPRING_COEFF: f64 = 0.0008;
/// Pairwise repulsion coefficient.
const REPULSION: f64 = 1.2;
/// Velocity drag coefficient.
const DRAG: f64 = 0.02;
/// Euler integration step.
const TIME_STEP: f64 = 20.0;

/// The topological engine state for one rebuild cycle.
#[derive(Debug)]
pub struct TopologicalLayout {
    /// Internal topology; node weights are snapshot indices.
    graph: StableGraph<usize, (), Directed>,
    key_to_index: HashMap<NodeKey, NodeIndex>,
    /// Snapshot node index -> internal index.
    node_indices: Vec<NodeIndex>,
    /// Snapshot link index -> internal edge.
    link_edges: Vec<EdgeIndex>,
    /// Positions/velocities by internal index slot.
    positions: Vec<DVec3>,
    velocities: Vec<DVec3>,
    /// When true the integrator stays in the XY plane.
    planar: bool,
    rng: Lcg,
}

impl TopologicalLayout {
    /// Build the internal graph from the snapshot and scatter initial
    /// positions deterministically.
    ///
    /// Two dimensions run a planar integration; one and three dimensions both
    /// run the full 3D integrator.
    pub fn seed(nodes: &[NodeRecord], links: &[LinkRecord], dims: u8) -> Result<Self, LayoutError> {
        let planar = dims == 2;
        let mut graph = StableGraph::with_capacity(nodes.len(), links.len());
        let mut key_to_index = HashMap::with_capacity(nodes.len());
        let mut node_indices = Vec::with_capacity(nodes.len());

        for (i, node) in nodes.iter().enumerate() {
            let index = graph.add_node(i);
            node_indices.push(index);
            if let Some(key) = &node.key {
                key_to_index.insert(key.clone(), index);
            }
        }

        let mut link_edges = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            let source = resolve(&key_to_index, link.source.as_ref(), i)?;
            let target = resolve(&key_to_index, link.target.as_ref(), i)?;
            link_edges.push(graph.add_edge(source, target, ()));
        }

        // Scatter start positions across a box that grows with the graph, so
        // dense graphs do not start collapsed on the origin.
        let mut rng = Lcg::new(0x7063_6772);
        let spread = SPRING_LENGTH * (nodes.len() as f64).cbrt().max(1.0);
        let mut positions = Vec::with_capacity(nodes.len());
        for _ in 0..nodes.len() {
            positions.push(DVec3::new(
                (rng.next_f64() - 0.5) * spread,
                (rng.next_f64() - 0.5) * spread,
                if planar {
                    0.0
                } else {
                    (rng.next_f64() - 0.5) * spread
                },
            ));
        }

        Ok(Self {
            velocities: vec![DVec3::ZERO; nodes.len()],
            graph,
            key_to_index,
            node_indices,
            link_edges,
            positions,
            planar,
            rng,
        })
    }

    /// Run one integration step: springs along edges, pairwise repulsion,
    /// drag, then Euler integration.
    pub fn advance(&mut self) {
        let n = self.positions.len();
        let mut forces = vec![DVec3::ZERO; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let mut delta = self.positions[i] - self.positions[j];
                if delta.length_squared() < 1e-12 {
                    delta = self.jiggle_vec();
                }
                let d2 = delta.length_squared();
                let push = delta / d2.sqrt() * (REPULSION / d2) * SPRING_LENGTH * SPRING_LENGTH;
                forces[i] += push;
                forces[j] -= push;
            }
        }

        for e in 0..self.link_edges.len() {
            let edge = self.link_edges[e];
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let (s, t) = (source.index(), target.index());
            let mut delta = self.positions[t] - self.positions[s];
            if delta.length_squared() < 1e-12 {
                delta = self.jiggle_vec();
            }
            let len = delta.length();
            let pull = delta / len * (SPRING_COEFF * (len - SPRING_LENGTH));
            forces[s] += pull;
            forces[t] -= pull;
        }

        for i in 0..n {
            let force = forces[i] - self.velocities[i] * DRAG;
            self.velocities[i] += force * TIME_STEP * 0.001;
            self.positions[i] += self.velocities[i] * TIME_STEP;
            if self.planar {
                self.positions[i].z = 0.0;
                self.velocities[i].z = 0.0;
            }
        }
    }

    fn jiggle_vec(&mut self) -> DVec3 {
        DVec3::new(
            (self.rng.next_f64() - 0.5) * 1e-6,
            (self.rng.next_f64() - 0.5) * 1e-6,
            if self.planar {
                0.0
            } else {
                (self.rng.next_f64() - 0.5) * 1e-6
            },
        )
    }

    /// Position lookup by node identity.
    pub fn node_position(&self, key: &NodeKey) -> Result<DVec3, LayoutError> {
        let index = self
            .key_to_index
            .get(key)
            .ok_or_else(|| LayoutError::UnknownNode(key.to_string()))?;
        Ok(self.positions[index.index()])
    }

    /// Position lookup by snapshot node index.
    pub fn node_position_at(&self, index: usize) -> Option<DVec3> {
        self.node_indices
            .get(index)
            .map(|idx| self.positions[idx.index()])
    }

    /// Endpoint positions (source side, target side) by snapshot link index.
    pub fn link_position(&self, index: usize) -> Result<(DVec3, DVec3), LayoutError> {
        let edge = self
            .link_edges
            .get(index)
            .ok_or(LayoutError::UnknownLink(index))?;
        let (source, target) = self
            .graph
            .edge_endpoints(*edge)
            .ok_or(LayoutError::UnknownLink(index))?;
        Ok((
            self.positions[source.index()],
            self.positions[target.index()],
        ))
    }
}

fn resolve(
    key_to_index: &HashMap<NodeKey, NodeIndex>,
    key: Option<&NodeKey>,
    link_index: usize,
) -> Result<NodeIndex, LayoutError> {
    let key = key.ok_or(LayoutError::IncompleteLink(link_index))?;
    key_to_index
        .get(key)
        .copied()
        .ok_or_else(|| LayoutError::UnresolvedEndpoint {
            index: link_index,
            key: key.to_string(),
        })
}
