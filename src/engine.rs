//! The simulation-to-scene synchronizer.
//!
//! [`ForceGraphEngine`] ties the other modules together: it owns the current
//! graph snapshot, the scene group of materialized render objects, the active
//! layout backend and the animation scheduler. Replacing data or configuration
//! triggers a rebuild: pause, notify, auto-color, resolve identities,
//! re-materialize objects, re-seed the layout, run warmup, then hand control
//! back to the frame pump. Each pumped frame advances the simulation one step
//! and copies positions into object transforms until the cooldown budget runs
//! out.

use glam::DVec3;
use log::{info, warn};
use thiserror::Error;

use crate::color::assign_group_colors;
use crate::config::{ConfigUpdate, GraphConfig};
use crate::graph::{GraphData, NodeKey};
use crate::layout::{ForceTuning, LayoutAdapter, LayoutError};
use crate::scene::{ObjectFactory, SceneGroup};
use crate::scheduler::{AnimationScheduler, FrameAction, Phase, now_ms};

/// Errors surfaced through the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The layout backend rejected the snapshot or a query.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// A snapshot document failed to parse.
    #[error("malformed graph document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The synchronization engine: one graph snapshot, one scene, one layout.
#[derive(Default)]
pub struct ForceGraphEngine {
    config: GraphConfig,
    data: GraphData,
    scene: SceneGroup,
    layout: Option<LayoutAdapter>,
    scheduler: AnimationScheduler,
    /// Guards against overlapping remote snapshot fetches.
    fetching: bool,
}

impl ForceGraphEngine {
    /// Create an idle engine with default configuration and no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an idle engine with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current configuration.
    #[inline]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Current graph snapshot.
    #[inline]
    pub fn graph_data(&self) -> &GraphData {
        &self.data
    }

    /// The scene subtree of materialized render objects.
    #[inline]
    pub fn scene(&self) -> &SceneGroup {
        &self.scene
    }

    /// Current lifecycle phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Ticks elapsed in the current running cycle.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    /// Replace the graph snapshot and rebuild.
    pub fn set_graph_data(&mut self, data: GraphData) -> Result<(), EngineError> {
        self.set_graph_data_at(data, now_ms())
    }

    /// Replace the graph snapshot and rebuild, with an explicit clock.
    pub fn set_graph_data_at(&mut self, data: GraphData, now_ms: f64) -> Result<(), EngineError> {
        self.data = data;
        self.rebuild(now_ms)
    }

    /// Parse a JSON snapshot document and replace the current data with it.
    pub fn set_graph_json(&mut self, json: &str) -> Result<(), EngineError> {
        let data: GraphData = serde_json::from_str(json)?;
        self.set_graph_data(data)
    }

    /// Apply a configuration change, stripping and rebuilding as the change
    /// requires.
    pub fn configure(&mut self, update: ConfigUpdate) -> Result<(), EngineError> {
        self.configure_at(update, now_ms())
    }

    /// Apply a configuration change with an explicit clock.
    pub fn configure_at(&mut self, update: ConfigUpdate, now_ms: f64) -> Result<(), EngineError> {
        let invalidation = self.config.apply(update);
        if let Some(dims) = invalidation.strip_above {
            self.data.strip_dimensions(dims);
        }
        if invalidation.rebuild {
            self.rebuild(now_ms)?;
        }
        Ok(())
    }

    /// Pause the animation cycle without touching data or objects.
    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    /// Restart the current cycle with full energy: reset the force engine's
    /// alpha, re-run warmup, and re-arm the cooldown budgets. Unlike a data
    /// change this keeps all materialized objects and current positions.
    pub fn reheat(&mut self) {
        self.reheat_at(now_ms());
    }

    /// [`ForceGraphEngine::reheat`] with an explicit clock.
    pub fn reheat_at(&mut self, now_ms: f64) {
        let Some(layout) = self.layout.as_mut() else {
            return;
        };
        if let Some(force) = layout.force_mut() {
            force.set_parameter("alpha", 1.0);
        }
        self.scheduler.begin_warmup();
        for _ in 0..self.config.warmup_ticks {
            layout.advance(&mut self.data.nodes);
        }
        self.scheduler.begin_running(
            now_ms,
            self.config.cooldown_ticks,
            self.config.cooldown_time_ms,
        );
    }

    /// Current position of a node by identity. Fails for identities outside
    /// the active snapshot, or when no layout has been seeded.
    pub fn node_position(&self, key: &NodeKey) -> Result<DVec3, EngineError> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| LayoutError::UnknownNode(key.to_string()))?;
        Ok(layout.node_position(&self.data.nodes, key)?)
    }

    /// Read a named parameter of the continuous-force backend. `None` when
    /// the topological backend is active, no layout exists, or the name is
    /// unknown.
    pub fn force_parameter(&self, name: &str) -> Option<f64> {
        self.layout.as_ref()?.force()?.parameter(name)
    }

    /// Set a named parameter of the continuous-force backend. Returns false
    /// when the parameter could not be applied.
    pub fn set_force_parameter(&mut self, name: &str, value: f64) -> bool {
        match self.layout.as_mut().and_then(LayoutAdapter::force_mut) {
            Some(force) => force.set_parameter(name, value),
            None => false,
        }
    }

    /// True when a remote snapshot should be fetched: a URL is configured,
    /// no local data is present, and no fetch is already in flight.
    pub fn wants_remote_data(&self) -> bool {
        self.config.json_url.is_some() && self.data.is_empty() && !self.fetching
    }

    /// Mark a remote fetch as in flight, returning its URL. Suppresses
    /// overlapping fetches.
    pub fn begin_fetch(&mut self) -> Option<String> {
        if !self.wants_remote_data() {
            return None;
        }
        self.fetching = true;
        self.config.json_url.clone()
    }

    /// Complete a remote fetch with the downloaded document.
    pub fn finish_fetch(&mut self, json: &str) -> Result<(), EngineError> {
        self.fetching = false;
        self.set_graph_json(json)
    }

    /// Abort a remote fetch without data (network failure, bad response).
    pub fn abort_fetch(&mut self) {
        self.fetching = false;
    }

    /// Account for one externally pumped frame.
    pub fn tick_frame(&mut self) -> Result<(), EngineError> {
        self.tick_frame_at(now_ms())
    }

    /// [`ForceGraphEngine::tick_frame`] with an explicit clock.
    pub fn tick_frame_at(&mut self, now_ms: f64) -> Result<(), EngineError> {
        let Some(layout) = self.layout.as_mut() else {
            return Ok(());
        };
        match self.scheduler.frame(now_ms) {
            FrameAction::Advance => {
                layout.advance(&mut self.data.nodes);
                sync_scene(layout, &self.data, &mut self.scene)?;
            }
            FrameAction::FinalSync => {
                sync_scene(layout, &self.data, &mut self.scene)?;
            }
            FrameAction::Halted => {}
        }
        Ok(())
    }

    /// Full rebuild: the only path that materializes objects or seeds a
    /// layout. Runs synchronously, including warmup.
    fn rebuild(&mut self, now_ms: f64) -> Result<(), EngineError> {
        self.scheduler.pause();
        if let Some(hook) = &self.config.on_loading {
            hook();
        }
        info!(
            "rebuilding scene: {} nodes, {} links",
            self.data.nodes.len(),
            self.data.links.len()
        );

        // Auto-coloring writes into the raw fields, so it must run before
        // objects are materialized. It only applies when the color accessor
        // is a plain field the palette value can be written to.
        let node_color_field = self.config.node_color.field_name().unwrap_or("");
        assign_group_colors(
            self.data.nodes.iter_mut().map(|n| &mut n.fields),
            &self.config.node_auto_color_by,
            node_color_field,
        );
        let link_color_field = self.config.link_color.field_name().unwrap_or("");
        assign_group_colors(
            self.data.links.iter_mut().map(|l| &mut l.fields),
            &self.config.link_auto_color_by,
            link_color_field,
        );

        for node in &mut self.data.nodes {
            node.key = self.config.node_id.key(&node.fields);
        }
        for link in &mut self.data.links {
            link.source = self.config.link_source.key(&link.fields);
            link.target = self.config.link_target.key(&link.fields);
        }

        self.scene.clear();
        let mut factory = ObjectFactory::new();
        for i in 0..self.data.nodes.len() {
            let object = factory.node_object(&self.data.nodes[i], i, &self.config);
            self.data.nodes[i].object = Some(self.scene.add(object));
        }
        for i in 0..self.data.links.len() {
            let object = factory.link_object(&self.data.links[i], i, &self.config);
            self.data.links[i].object = Some(self.scene.add(object));
        }

        let tuning = ForceTuning {
            alpha_decay: self.config.alpha_decay,
            velocity_decay: self.config.velocity_decay,
        };
        let mut layout = match LayoutAdapter::seed(
            self.config.engine,
            &mut self.data.nodes,
            &self.data.links,
            self.config.num_dimensions,
            &tuning,
        ) {
            Ok(layout) => layout,
            Err(err) => {
                warn!("layout seeding failed: {err}");
                self.layout = None;
                return Err(err.into());
            }
        };

        self.scheduler.begin_warmup();
        for _ in 0..self.config.warmup_ticks {
            layout.advance(&mut self.data.nodes);
        }
        sync_scene(&layout, &self.data, &mut self.scene)?;
        self.layout = Some(layout);

        self.scheduler.begin_running(
            now_ms,
            self.config.cooldown_ticks,
            self.config.cooldown_time_ms,
        );
        if let Some(hook) = &self.config.on_finish_loading {
            hook();
        }
        Ok(())
    }
}

/// Copy layout positions into object transforms and repack the buffer.
///
/// Nodes translate; links anchor at the source endpoint, point their +Z axis
/// at the target, and stretch their unit-length cylinder to span the gap.
fn sync_scene(
    layout: &LayoutAdapter,
    data: &GraphData,
    scene: &mut SceneGroup,
) -> Result<(), EngineError> {
    for (i, node) in data.nodes.iter().enumerate() {
        let Some(id) = node.object else { continue };
        let Some(position) = layout.node_position_at(&data.nodes, i) else {
            continue;
        };
        if let Some(object) = scene.get_mut(id) {
            object.position = position.as_vec3();
        }
    }

    for (i, link) in data.links.iter().enumerate() {
        let Some(id) = link.object else { continue };
        let (start, end) = layout.link_position(&data.nodes, i)?;
        if let Some(object) = scene.get_mut(id) {
            let (start, end) = (start.as_vec3(), end.as_vec3());
            object.position = start;
            object.look_at(end);
            object.scale.z = start.distance(end);
        }
    }

    scene.pack_transforms();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Accessor;
    use crate::layout::EngineKind;
    use crate::scene::{ObjectTag, TRANSFORM_STRIDE};
    use std::cell::Cell;
    use std::rc::Rc;

    fn sample_data() -> GraphData {
        serde_json::from_str(
            r#"{
                "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
                "links": [{"source": "a", "target": "b"}, {"source": "b", "target": "c"}]
            }"#,
        )
        .unwrap()
    }

    fn built_engine() -> ForceGraphEngine {
        let mut engine = ForceGraphEngine::new();
        engine.set_graph_data_at(sample_data(), 0.0).unwrap();
        engine
    }

    #[test]
    fn test_rebuild_materializes_one_object_per_record() {
        let engine = built_engine();
        assert_eq!(engine.scene().len(), 5);
        let nodes = engine
            .scene()
            .objects()
            .filter(|o| o.tag == ObjectTag::Node)
            .count();
        assert_eq!(nodes, 3);
        for node in &engine.graph_data().nodes {
            assert!(node.object.is_some());
        }
        for link in &engine.graph_data().links {
            assert!(link.object.is_some());
        }
    }

    #[test]
    fn test_warmup_decays_alpha_before_first_frame() {
        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::WarmupTicks(5), 0.0)
            .unwrap();
        engine.set_graph_data_at(sample_data(), 0.0).unwrap();

        let expected = (1.0 - 0.0228f64).powi(5);
        let alpha = engine.force_parameter("alpha").unwrap();
        assert!((alpha - expected).abs() < 1e-12, "alpha {alpha}");
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn test_tick_budget_stops_after_final_sync() {
        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::CooldownTicks(Some(10)), 0.0)
            .unwrap();
        engine.set_graph_data_at(sample_data(), 0.0).unwrap();

        for _ in 0..20 {
            engine.tick_frame_at(1.0).unwrap();
        }
        assert_eq!(engine.phase(), Phase::Stopped);
        assert_eq!(engine.ticks(), 11);

        // Frozen positions survive further pumping untouched.
        let frozen = engine.scene().transform_buffer().to_vec();
        engine.tick_frame_at(2.0).unwrap();
        assert_eq!(engine.scene().transform_buffer(), frozen.as_slice());
    }

    #[test]
    fn test_time_budget_stops_ticking() {
        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::CooldownTimeMs(Some(100.0)), 0.0)
            .unwrap();
        engine.set_graph_data_at(sample_data(), 1000.0).unwrap();

        engine.tick_frame_at(1050.0).unwrap();
        assert_eq!(engine.phase(), Phase::Running);
        engine.tick_frame_at(1200.0).unwrap();
        assert_eq!(engine.phase(), Phase::Stopped);
    }

    #[test]
    fn test_lifecycle_hooks_fire_once_per_data_change() {
        let loading = Rc::new(Cell::new(0u32));
        let finished = Rc::new(Cell::new(0u32));

        let mut engine = ForceGraphEngine::new();
        let counter = loading.clone();
        engine
            .configure_at(
                ConfigUpdate::OnLoading(Some(Rc::new(move || counter.set(counter.get() + 1)))),
                0.0,
            )
            .unwrap();
        let counter = finished.clone();
        engine
            .configure_at(
                ConfigUpdate::OnFinishLoading(Some(Rc::new(move || {
                    counter.set(counter.get() + 1)
                }))),
                0.0,
            )
            .unwrap();
        // Hook installation alone must not rebuild.
        assert_eq!(loading.get(), 0);

        engine.set_graph_data_at(sample_data(), 0.0).unwrap();
        assert_eq!(loading.get(), 1);
        assert_eq!(finished.get(), 1);

        // Replacing data mid-run fires the pair exactly once more.
        engine.tick_frame_at(1.0).unwrap();
        engine.set_graph_data_at(sample_data(), 2.0).unwrap();
        assert_eq!(loading.get(), 2);
        assert_eq!(finished.get(), 2);
    }

    #[test]
    fn test_unresolved_link_fails_and_disables_ticking() {
        let data: GraphData = serde_json::from_str(
            r#"{"nodes": [{"id": "a"}], "links": [{"source": "a", "target": "ghost"}]}"#,
        )
        .unwrap();

        let mut engine = ForceGraphEngine::new();
        let err = engine.set_graph_data_at(data, 0.0).expect_err("bad link");
        assert!(matches!(
            err,
            EngineError::Layout(LayoutError::UnresolvedEndpoint { .. })
        ));

        // No layout: frames are no-ops rather than panics.
        engine.tick_frame_at(1.0).unwrap();
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_frame_syncs_node_positions_into_objects() {
        let mut engine = built_engine();
        engine.tick_frame_at(1.0).unwrap();

        for (i, node) in engine.graph_data().nodes.iter().enumerate() {
            let object = engine.scene().get(node.object.unwrap()).unwrap();
            assert_eq!(object.position, node.sim.position().as_vec3());
            assert_eq!(object.source_index, i);
        }
        assert_eq!(
            engine.scene().transform_buffer().len(),
            5 * TRANSFORM_STRIDE
        );
    }

    #[test]
    fn test_frame_stretches_links_between_endpoints() {
        let mut engine = built_engine();
        engine.tick_frame_at(1.0).unwrap();

        let data = engine.graph_data();
        let a = data.nodes[0].sim.position().as_vec3();
        let b = data.nodes[1].sim.position().as_vec3();
        let object = engine.scene().get(data.links[0].object.unwrap()).unwrap();

        assert_eq!(object.position, a);
        assert!((object.scale.z - a.distance(b)).abs() < 1e-5);
        let forward = object.rotation * glam::Vec3::Z;
        assert!((forward - (b - a).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_dimension_change_strips_and_replans() {
        let mut engine = built_engine();
        engine.tick_frame_at(1.0).unwrap();
        assert!(engine.graph_data().nodes[0].sim.z.is_some());

        engine
            .configure_at(ConfigUpdate::NumDimensions(2), 2.0)
            .unwrap();
        engine.tick_frame_at(3.0).unwrap();
        for node in &engine.graph_data().nodes {
            assert_eq!(node.sim.z, None);
        }
    }

    #[test]
    fn test_auto_color_assigns_palette_colors() {
        let data: GraphData = serde_json::from_str(
            r#"{"nodes": [{"id": 1, "team": "x"}, {"id": 2, "team": "y"}, {"id": 3, "team": "x"}]}"#,
        )
        .unwrap();

        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::NodeAutoColorBy(Accessor::field("team")), 0.0)
            .unwrap();
        engine.set_graph_data_at(data, 0.0).unwrap();

        let nodes = &engine.graph_data().nodes;
        assert_eq!(nodes[0].fields["color"], nodes[2].fields["color"]);
        assert_ne!(nodes[0].fields["color"], nodes[1].fields["color"]);

        let first = engine.scene().get(nodes[0].object.unwrap()).unwrap();
        let third = engine.scene().get(nodes[2].object.unwrap()).unwrap();
        assert!(Rc::ptr_eq(&first.material, &third.material));
    }

    #[test]
    fn test_topological_backend_has_no_force_parameters() {
        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::Engine(EngineKind::Topological), 0.0)
            .unwrap();
        engine.set_graph_data_at(sample_data(), 0.0).unwrap();

        assert_eq!(engine.force_parameter("alpha"), None);
        assert!(!engine.set_force_parameter("alpha", 1.0));

        engine.tick_frame_at(1.0).unwrap();
        let object = engine
            .scene()
            .get(engine.graph_data().nodes[0].object.unwrap())
            .unwrap();
        assert!(object.position.is_finite());
    }

    #[test]
    fn test_reheat_restores_full_energy_and_budget() {
        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::CooldownTicks(Some(2)), 0.0)
            .unwrap();
        engine.set_graph_data_at(sample_data(), 0.0).unwrap();

        for _ in 0..5 {
            engine.tick_frame_at(1.0).unwrap();
        }
        assert_eq!(engine.phase(), Phase::Stopped);
        let cooled = engine.force_parameter("alpha").unwrap();
        assert!(cooled < 1.0);

        engine.reheat_at(10.0);
        assert_eq!(engine.phase(), Phase::Running);
        assert_eq!(engine.force_parameter("alpha"), Some(1.0));
        engine.tick_frame_at(11.0).unwrap();
        assert_eq!(engine.ticks(), 1);
    }

    #[test]
    fn test_node_position_by_identity() {
        let mut engine = built_engine();
        engine.tick_frame_at(1.0).unwrap();

        let position = engine.node_position(&crate::graph::NodeKey::new("a")).unwrap();
        assert_eq!(position, engine.graph_data().nodes[0].sim.position());
        assert!(matches!(
            engine.node_position(&crate::graph::NodeKey::new("ghost")),
            Err(EngineError::Layout(LayoutError::UnknownNode(_)))
        ));
    }

    #[test]
    fn test_fetch_guard_suppresses_overlap() {
        let mut engine = ForceGraphEngine::new();
        assert!(engine.begin_fetch().is_none());

        engine
            .configure_at(
                ConfigUpdate::JsonUrl(Some("https://example.com/graph.json".to_owned())),
                0.0,
            )
            .unwrap();
        let url = engine.begin_fetch().unwrap();
        assert_eq!(url, "https://example.com/graph.json");
        // In flight: no second fetch.
        assert!(engine.begin_fetch().is_none());

        engine
            .finish_fetch(r#"{"nodes": [{"id": 1}], "links": []}"#)
            .unwrap();
        assert_eq!(engine.graph_data().nodes.len(), 1);
        // Data present now, so no further fetch wanted.
        assert!(!engine.wants_remote_data());
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let mut engine = ForceGraphEngine::new();
        assert!(matches!(
            engine.set_graph_json("{nodes: oops"),
            Err(EngineError::Parse(_))
        ));
    }

    #[test]
    fn test_custom_id_accessor_rebinds_links() {
        let data: GraphData = serde_json::from_str(
            r#"{"nodes": [{"name": "a"}, {"name": "b"}], "links": [{"source": "a", "target": "b"}]}"#,
        )
        .unwrap();

        let mut engine = ForceGraphEngine::new();
        engine
            .configure_at(ConfigUpdate::NodeId(Accessor::field("name")), 0.0)
            .unwrap();
        engine.set_graph_data_at(data, 0.0).unwrap();
        engine.tick_frame_at(1.0).unwrap();
        assert_eq!(engine.scene().len(), 3);
    }
}
