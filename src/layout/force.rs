//! Continuous-force layout backend.
//!
//! An iterative force simulation in the d3-force family: link springs with
//! degree-derived strength and bias, pairwise many-body charge repulsion,
//! and a centering pass, cooled by an alpha schedule and velocity decay.
//! Position and velocity are tracked directly on the node records, so the
//! records themselves are the simulation state.
//!
//! Supports 1, 2 or 3 spatial dimensions; components beyond the configured
//! count are never written.

use std::collections::HashMap;

use glam::DVec3;

use crate::graph::{LinkRecord, NodeKey, NodeRecord};

use super::{LayoutError, Lcg};

/// Initial placement radius scale.
const INITIAL_RADIUS: f64 = 10.0;

/// Cooling/damping parameters carried over from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct ForceTuning {
    /// Per-tick decay of the simulation's alpha toward zero.
    pub alpha_decay: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
}

impl Default for ForceTuning {
    fn default() -> Self {
        Self {
            alpha_decay: 0.0228,
            velocity_decay: 0.4,
        }
    }
}

/// A link resolved to node slots, with its spring parameters.
#[derive(Debug)]
struct LinkBinding {
    source: usize,
    target: usize,
    /// Spring strength, `1 / min(deg(source), deg(target))`.
    strength: f64,
    /// Share of the correction applied to the target end,
    /// `deg(source) / (deg(source) + deg(target))`.
    bias: f64,
}

/// The continuous-force engine state for one rebuild cycle.
#[derive(Debug)]
pub struct ForceLayout {
    dims: u8,
    /// Component mask for the active dimensions.
    mask: DVec3,
    alpha: f64,
    alpha_decay: f64,
    /// Velocity retained per tick, `1 - velocity_decay`.
    velocity_factor: f64,
    link_distance: f64,
    charge_strength: f64,
    center_strength: f64,
    key_to_index: HashMap<NodeKey, usize>,
    bindings: Vec<LinkBinding>,
    jiggle: Lcg,
}

impl ForceLayout {
    /// Initialize engine state from the snapshot.
    ///
    /// Reads initial positions/velocities from each record's raw `x`/`y`/`z`
    /// (and `vx`/`vy`/`vz`) fields when present, places the rest on a
    /// deterministic phyllotaxis spiral, and binds every link to its endpoint
    /// slots. Fails when a link endpoint does not resolve.
    pub fn seed(
        nodes: &mut [NodeRecord],
        links: &[LinkRecord],
        dims: u8,
        tuning: &ForceTuning,
    ) -> Result<Self, LayoutError> {
        let dims = dims.clamp(1, 3);
        let mask = DVec3::new(
            1.0,
            if dims >= 2 { 1.0 } else { 0.0 },
            if dims >= 3 { 1.0 } else { 0.0 },
        );

        let mut key_to_index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter_mut().enumerate() {
            hydrate_from_fields(node, dims);
            if let Some(key) = &node.key {
                key_to_index.insert(key.clone(), i);
            }
        }
        initialize_positions(nodes, dims);

        // Degree counts drive per-link strength and bias, so loosely
        // connected nodes are pulled harder than hubs.
        let mut endpoints = Vec::with_capacity(links.len());
        let mut degree = vec![0usize; nodes.len()];
        for (i, link) in links.iter().enumerate() {
            let source = resolve_endpoint(&key_to_index, link.source.as_ref(), i)?;
            let target = resolve_endpoint(&key_to_index, link.target.as_ref(), i)?;
            degree[source] += 1;
            degree[target] += 1;
            endpoints.push((source, target));
        }

        let bindings = endpoints
            .into_iter()
            .map(|(source, target)| {
                let (ds, dt) = (degree[source] as f64, degree[target] as f64);
                LinkBinding {
                    source,
                    target,
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        Ok(Self {
            dims,
            mask,
            alpha: 1.0,
            alpha_decay: tuning.alpha_decay,
            velocity_factor: 1.0 - tuning.velocity_decay,
            link_distance: 30.0,
            charge_strength: -30.0,
            center_strength: 1.0,
            key_to_index,
            bindings,
            jiggle: Lcg::new(0x1cec001),
        })
    }

    /// Run one tick: decay alpha, accumulate forces, integrate, write back.
    pub fn advance(&mut self, nodes: &mut [NodeRecord]) {
        self.alpha += (0.0 - self.alpha) * self.alpha_decay;

        let n = nodes.len();
        let mut pos: Vec<DVec3> = nodes.iter().map(|node| node.sim.position()).collect();
        let mut vel: Vec<DVec3> = nodes
            .iter()
            .map(|node| {
                DVec3::new(
                    node.sim.vx.unwrap_or(0.0),
                    node.sim.vy.unwrap_or(0.0),
                    node.sim.vz.unwrap_or(0.0),
                )
            })
            .collect();

        self.apply_link_force(&pos, &mut vel);
        self.apply_charge_force(&pos, &mut vel);
        self.apply_center_force(&mut pos, n);

        for i in 0..n {
            vel[i] = (vel[i] * self.velocity_factor) * self.mask;
            pos[i] += vel[i];
            write_back(&mut nodes[i], pos[i], vel[i], self.dims);
        }
    }

    /// Spring each link toward its rest distance.
    fn apply_link_force(&mut self, pos: &[DVec3], vel: &mut [DVec3]) {
        for b in 0..self.bindings.len() {
            let (s, t) = (self.bindings[b].source, self.bindings[b].target);
            let mut delta = (pos[t] + vel[t] - pos[s] - vel[s]) * self.mask;
            if delta.length_squared() == 0.0 {
                delta = self.jiggle_vec();
            }
            let len = delta.length();
            let magnitude =
                (len - self.link_distance) / len * self.alpha * self.bindings[b].strength;
            let correction = delta * magnitude;
            vel[t] -= correction * self.bindings[b].bias;
            vel[s] += correction * (1.0 - self.bindings[b].bias);
        }
    }

    /// Pairwise many-body repulsion. O(n^2) by design: the synchronizer runs
    /// one step per externally paced frame, on the caller's thread.
    fn apply_charge_force(&mut self, pos: &[DVec3], vel: &mut [DVec3]) {
        let n = pos.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let mut delta = (pos[j] - pos[i]) * self.mask;
                if delta.length_squared() == 0.0 {
                    delta = self.jiggle_vec();
                }
                let w = self.charge_strength * self.alpha / delta.length_squared();
                vel[i] += delta * w;
                vel[j] -= delta * w;
            }
        }
    }

    /// Re-center the whole layout on the origin. Acts on positions directly,
    /// not velocities.
    fn apply_center_force(&self, pos: &mut [DVec3], n: usize) {
        if n == 0 {
            return;
        }
        let mean = pos.iter().copied().sum::<DVec3>() / n as f64;
        let shift = mean * self.center_strength * self.mask;
        for p in pos.iter_mut() {
            *p -= shift;
        }
    }

    fn jiggle_vec(&mut self) -> DVec3 {
        let mut v = DVec3::new(
            (self.jiggle.next_f64() - 0.5) * 1e-6,
            (self.jiggle.next_f64() - 0.5) * 1e-6,
            (self.jiggle.next_f64() - 0.5) * 1e-6,
        );
        v *= self.mask;
        v
    }

    /// Position lookup by node identity.
    pub fn node_position(
        &self,
        nodes: &[NodeRecord],
        key: &NodeKey,
    ) -> Result<DVec3, LayoutError> {
        let index = self
            .key_to_index
            .get(key)
            .ok_or_else(|| LayoutError::UnknownNode(key.to_string()))?;
        Ok(nodes[*index].sim.position())
    }

    /// Endpoint positions (source side, target side) by snapshot link index.
    pub fn link_position(
        &self,
        nodes: &[NodeRecord],
        index: usize,
    ) -> Result<(DVec3, DVec3), LayoutError> {
        let binding = self
            .bindings
            .get(index)
            .ok_or(LayoutError::UnknownLink(index))?;
        Ok((
            nodes[binding.source].sim.position(),
            nodes[binding.target].sim.position(),
        ))
    }

    /// Read a named simulation parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        Some(match name {
            "alpha" => self.alpha,
            "alpha_decay" => self.alpha_decay,
            "velocity_decay" => 1.0 - self.velocity_factor,
            "link_distance" => self.link_distance,
            "charge_strength" => self.charge_strength,
            "center_strength" => self.center_strength,
            _ => return None,
        })
    }

    /// Set a named simulation parameter. Returns false for unknown names.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "alpha" => self.alpha = value,
            "alpha_decay" => self.alpha_decay = value,
            "velocity_decay" => self.velocity_factor = 1.0 - value,
            "link_distance" => self.link_distance = value,
            "charge_strength" => self.charge_strength = value,
            "center_strength" => self.center_strength = value,
            _ => return false,
        }
        true
    }
}

fn resolve_endpoint(
    key_to_index: &HashMap<NodeKey, usize>,
    key: Option<&NodeKey>,
    link_index: usize,
) -> Result<usize, LayoutError> {
    let key = key.ok_or(LayoutError::IncompleteLink(link_index))?;
    key_to_index
        .get(key)
        .copied()
        .ok_or_else(|| LayoutError::UnresolvedEndpoint {
            index: link_index,
            key: key.to_string(),
        })
}

/// Seed simulation state from raw record fields, for data that ships with
/// initial positions.
fn hydrate_from_fields(node: &mut NodeRecord, dims: u8) {
    let field = |name: &str| node.fields.get(name).and_then(|v| v.as_f64());
    node.sim.x = node.sim.x.or_else(|| field("x"));
    node.sim.vx = node.sim.vx.or_else(|| field("vx"));
    if dims >= 2 {
        node.sim.y = node.sim.y.or_else(|| field("y"));
        node.sim.vy = node.sim.vy.or_else(|| field("vy"));
    }
    if dims >= 3 {
        node.sim.z = node.sim.z.or_else(|| field("z"));
        node.sim.vz = node.sim.vz.or_else(|| field("vz"));
    }
}

/// Deterministic phyllotaxis placement for nodes without positions, spreading
/// them outward so the first ticks do not fight coincident points.
fn initialize_positions(nodes: &mut [NodeRecord], dims: u8) {
    // Golden-angle increments keep consecutive nodes well separated.
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let roll = std::f64::consts::PI * 20.0 / (9.0 + 221.0_f64.sqrt());

    for (i, node) in nodes.iter_mut().enumerate() {
        let i_f = i as f64;
        let (px, py, pz) = match dims {
            1 => (INITIAL_RADIUS * i_f, 0.0, 0.0),
            2 => {
                let radius = INITIAL_RADIUS * (0.5 + i_f).sqrt();
                let angle = i_f * golden;
                (radius * angle.cos(), radius * angle.sin(), 0.0)
            }
            _ => {
                let radius = INITIAL_RADIUS * (0.5 + i_f).cbrt();
                let theta = i_f * golden;
                let phi = i_f * roll;
                (
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                )
            }
        };

        node.sim.x = node.sim.x.or(Some(px));
        node.sim.vx = node.sim.vx.or(Some(0.0));
        if dims >= 2 {
            node.sim.y = node.sim.y.or(Some(py));
            node.sim.vy = node.sim.vy.or(Some(0.0));
        }
        if dims >= 3 {
            node.sim.z = node.sim.z.or(Some(pz));
            node.sim.vz = node.sim.vz.or(Some(0.0));
        }
    }
}

fn write_back(node: &mut NodeRecord, pos: DVec3, vel: DVec3, dims: u8) {
    node.sim.x = Some(pos.x);
    node.sim.vx = Some(vel.x);
    if dims >= 2 {
        node.sim.y = Some(pos.y);
        node.sim.vy = Some(vel.y);
    }
    if dims >= 3 {
        node.sim.z = Some(pos.z);
        node.sim.vz = Some(vel.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Fields, GraphData};
    use serde_json::json;

    /// Build a snapshot with resolved node keys and link endpoints, the way
    /// the engine prepares records before seeding.
    fn snapshot(nodes: &[&str], links: &[(&str, &str)]) -> GraphData {
        let mut data = GraphData::default();
        for id in nodes {
            let mut fields = Fields::new();
            fields.insert("id".to_owned(), json!(id));
            let mut record = NodeRecord::new(fields);
            record.key = Some(NodeKey::new(*id));
            data.nodes.push(record);
        }
        for (source, target) in links {
            let mut record = crate::graph::LinkRecord::new(Fields::new());
            record.source = Some(NodeKey::new(*source));
            record.target = Some(NodeKey::new(*target));
            data.links.push(record);
        }
        data
    }

    #[test]
    fn test_seed_places_all_nodes() {
        let mut data = snapshot(&["a", "b", "c"], &[]);
        ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();
        for node in &data.nodes {
            assert!(node.sim.x.is_some());
            assert!(node.sim.y.is_some());
            assert!(node.sim.z.is_some());
        }
    }

    #[test]
    fn test_seed_one_dimension_leaves_higher_components_absent() {
        let mut data = snapshot(&["a", "b"], &[("a", "b")]);
        let mut engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 1, &ForceTuning::default()).unwrap();
        engine.advance(&mut data.nodes);

        for node in &data.nodes {
            assert!(node.sim.x.is_some());
            assert_eq!(node.sim.y, None);
            assert_eq!(node.sim.z, None);
            assert_eq!(node.sim.vy, None);
            assert_eq!(node.sim.vz, None);
        }
    }

    #[test]
    fn test_seed_hydrates_initial_positions_from_fields() {
        let mut data = snapshot(&["a"], &[]);
        data.nodes[0].fields.insert("x".to_owned(), json!(5.0));
        data.nodes[0].fields.insert("y".to_owned(), json!(-2.0));
        ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();
        assert_eq!(data.nodes[0].sim.x, Some(5.0));
        assert_eq!(data.nodes[0].sim.y, Some(-2.0));
    }

    #[test]
    fn test_advance_strictly_changes_state() {
        let mut data = snapshot(&["a", "b"], &[("a", "b")]);
        let mut engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();

        let initial: Vec<_> = data.nodes.iter().map(|n| n.sim.position()).collect();
        engine.advance(&mut data.nodes);
        let after_one: Vec<_> = data.nodes.iter().map(|n| n.sim.position()).collect();
        engine.advance(&mut data.nodes);
        let after_two: Vec<_> = data.nodes.iter().map(|n| n.sim.position()).collect();

        assert_ne!(initial, after_one);
        assert_ne!(after_one, after_two);
        for p in &after_two {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn test_unresolved_target_fails_seed() {
        let mut data = snapshot(&["a"], &[("a", "ghost")]);
        let err = ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default())
            .expect_err("seeding should fail");
        match err {
            LayoutError::UnresolvedEndpoint { index, key } => {
                assert_eq!(index, 0);
                assert_eq!(key, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_endpoint_fails_seed() {
        let mut data = snapshot(&["a", "b"], &[("a", "b")]);
        data.links[0].target = None;
        let err = ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default())
            .expect_err("seeding should fail");
        assert!(matches!(err, LayoutError::IncompleteLink(0)));
    }

    #[test]
    fn test_stale_node_query_fails_loudly() {
        let mut data = snapshot(&["a"], &[]);
        let engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();
        assert!(matches!(
            engine.node_position(&data.nodes, &NodeKey::new("stale")),
            Err(LayoutError::UnknownNode(_))
        ));
        assert!(matches!(
            engine.link_position(&data.nodes, 7),
            Err(LayoutError::UnknownLink(7))
        ));
    }

    #[test]
    fn test_link_position_tracks_endpoints() {
        let mut data = snapshot(&["a", "b"], &[("a", "b")]);
        let mut engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();
        engine.advance(&mut data.nodes);

        let (start, end) = engine.link_position(&data.nodes, 0).unwrap();
        assert_eq!(
            start,
            engine
                .node_position(&data.nodes, &NodeKey::new("a"))
                .unwrap()
        );
        assert_eq!(
            end,
            engine
                .node_position(&data.nodes, &NodeKey::new("b"))
                .unwrap()
        );
    }

    #[test]
    fn test_linked_nodes_settle_near_rest_distance() {
        let mut data = snapshot(&["a", "b"], &[("a", "b")]);
        let mut engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 2, &ForceTuning::default()).unwrap();
        for _ in 0..300 {
            engine.advance(&mut data.nodes);
        }
        let (start, end) = engine.link_position(&data.nodes, 0).unwrap();
        let distance = start.distance(end);
        // Link spring pulls toward its rest length while charge pushes apart;
        // the pair should settle in the same order of magnitude.
        assert!(
            distance > 5.0 && distance < 200.0,
            "settled at {distance}"
        );
    }

    #[test]
    fn test_named_parameters() {
        let mut data = snapshot(&["a"], &[]);
        let mut engine =
            ForceLayout::seed(&mut data.nodes, &data.links, 3, &ForceTuning::default()).unwrap();
        assert_eq!(engine.parameter("charge_strength"), Some(-30.0));
        assert_eq!(engine.parameter("alpha"), Some(1.0));
        assert_eq!(engine.parameter("bogus"), None);

        assert!(engine.set_parameter("link_distance", 50.0));
        assert_eq!(engine.parameter("link_distance"), Some(50.0));
        assert!(!engine.set_parameter("bogus", 1.0));
    }
}
