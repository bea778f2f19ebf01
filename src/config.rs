//! Engine configuration and its invalidation table.
//!
//! All tunables live in one plain [`GraphConfig`] struct. Changes flow
//! through [`GraphConfig::apply`] as [`ConfigUpdate`] values, and each update
//! variant maps to an explicit [`Invalidation`]: whether the scene must be
//! rebuilt and whether higher-dimension simulation state must be stripped.
//! This replaces ad hoc per-property change hooks with a finite, enumerable
//! transition table.

use std::rc::Rc;

use crate::graph::{Accessor, Fields};
use crate::layout::EngineKind;
use crate::scene::RenderObject;

/// Side-effecting lifecycle notification. Must not panic into the scheduler.
pub type LifecycleHook = Rc<dyn Fn()>;

/// Producer of a custom render object for a node, overriding the default
/// sphere. Returning `None` falls back to the default object.
pub type NodeObjectFn = Rc<dyn Fn(&Fields) -> Option<RenderObject>>;

/// All recognized engine options.
#[derive(Clone)]
pub struct GraphConfig {
    /// Remote snapshot location; fetched when the local snapshot is empty.
    pub json_url: Option<String>,
    /// Spatial dimensions the layout runs in (1-3).
    pub num_dimensions: u8,
    /// Sphere radius per cube root of node value.
    pub node_rel_size: f64,
    /// Node identity accessor.
    pub node_id: Accessor,
    /// Node size-value accessor.
    pub node_val: Accessor,
    /// Sphere segment count along both axes.
    pub node_resolution: u32,
    /// Node color accessor.
    pub node_color: Accessor,
    /// Grouping accessor for auto-coloring uncolored nodes.
    pub node_auto_color_by: Accessor,
    pub node_opacity: f64,
    /// Custom render-object override per node.
    pub node_object: Option<NodeObjectFn>,
    /// Link endpoint accessors.
    pub link_source: Accessor,
    pub link_target: Accessor,
    /// Link color accessor.
    pub link_color: Accessor,
    /// Grouping accessor for auto-coloring uncolored links.
    pub link_auto_color_by: Accessor,
    pub link_opacity: f64,
    /// Link thickness-value accessor.
    pub link_val: Accessor,
    /// Cylinder diameter per unit of link value.
    pub link_width_scale: f64,
    /// Cylinder radial segment count.
    pub link_resolution: u32,
    /// Which layout backend drives positions.
    pub engine: EngineKind,
    /// Continuous-force alpha decay per tick.
    pub alpha_decay: f64,
    /// Continuous-force velocity decay per tick.
    pub velocity_decay: f64,
    /// Simulation steps run before the first rendered frame.
    pub warmup_ticks: u32,
    /// Stop ticking after this many post-warmup frames. `None` = never.
    pub cooldown_ticks: Option<u64>,
    /// Stop ticking after this much wall-clock time. `None` = never.
    pub cooldown_time_ms: Option<f64>,
    /// Fires at the start of every rebuild.
    pub on_loading: Option<LifecycleHook>,
    /// Fires once warmup completes and frame-driven ticking begins.
    pub on_finish_loading: Option<LifecycleHook>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            json_url: None,
            num_dimensions: 3,
            node_rel_size: 4.0,
            node_id: Accessor::field("id"),
            node_val: Accessor::field("val"),
            node_resolution: 8,
            node_color: Accessor::field("color"),
            node_auto_color_by: Accessor::Unset,
            node_opacity: 0.75,
            node_object: None,
            link_source: Accessor::field("source"),
            link_target: Accessor::field("target"),
            link_color: Accessor::field("color"),
            link_auto_color_by: Accessor::Unset,
            link_opacity: 0.2,
            link_val: Accessor::field("val"),
            link_width_scale: 1.0,
            link_resolution: 6,
            engine: EngineKind::Force,
            alpha_decay: 0.0228,
            velocity_decay: 0.4,
            warmup_ticks: 0,
            cooldown_ticks: None,
            cooldown_time_ms: Some(15_000.0),
            on_loading: None,
            on_finish_loading: None,
        }
    }
}

/// One configuration change.
#[derive(Clone)]
pub enum ConfigUpdate {
    JsonUrl(Option<String>),
    NumDimensions(u8),
    NodeRelSize(f64),
    NodeId(Accessor),
    NodeVal(Accessor),
    NodeResolution(u32),
    NodeColor(Accessor),
    NodeAutoColorBy(Accessor),
    NodeOpacity(f64),
    NodeObject(Option<NodeObjectFn>),
    LinkSource(Accessor),
    LinkTarget(Accessor),
    LinkColor(Accessor),
    LinkAutoColorBy(Accessor),
    LinkOpacity(f64),
    LinkVal(Accessor),
    LinkWidthScale(f64),
    LinkResolution(u32),
    Engine(EngineKind),
    AlphaDecay(f64),
    VelocityDecay(f64),
    WarmupTicks(u32),
    CooldownTicks(Option<u64>),
    CooldownTimeMs(Option<f64>),
    OnLoading(Option<LifecycleHook>),
    OnFinishLoading(Option<LifecycleHook>),
}

/// Actions a configuration change requires of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Invalidation {
    /// Strip node position/velocity components above this dimension count
    /// before rebuilding.
    pub strip_above: Option<u8>,
    /// Tear down and rebuild scene objects and layout state.
    pub rebuild: bool,
}

impl Invalidation {
    const NONE: Self = Self {
        strip_above: None,
        rebuild: false,
    };
    const REBUILD: Self = Self {
        strip_above: None,
        rebuild: true,
    };
}

impl GraphConfig {
    /// Apply one update and report the invalidation it requires.
    ///
    /// Lifecycle hooks are the only options that change without a rebuild;
    /// a dimension change additionally strips now-inactive components from
    /// all existing nodes.
    pub fn apply(&mut self, update: ConfigUpdate) -> Invalidation {
        use ConfigUpdate::*;
        match update {
            JsonUrl(v) => {
                self.json_url = v;
                Invalidation::REBUILD
            }
            NumDimensions(v) => {
                self.num_dimensions = v.clamp(1, 3);
                Invalidation {
                    strip_above: (self.num_dimensions < 3).then_some(self.num_dimensions),
                    rebuild: true,
                }
            }
            NodeRelSize(v) => {
                self.node_rel_size = v;
                Invalidation::REBUILD
            }
            NodeId(v) => {
                self.node_id = v;
                Invalidation::REBUILD
            }
            NodeVal(v) => {
                self.node_val = v;
                Invalidation::REBUILD
            }
            NodeResolution(v) => {
                self.node_resolution = v;
                Invalidation::REBUILD
            }
            NodeColor(v) => {
                self.node_color = v;
                Invalidation::REBUILD
            }
            NodeAutoColorBy(v) => {
                self.node_auto_color_by = v;
                Invalidation::REBUILD
            }
            NodeOpacity(v) => {
                self.node_opacity = v;
                Invalidation::REBUILD
            }
            NodeObject(v) => {
                self.node_object = v;
                Invalidation::REBUILD
            }
            LinkSource(v) => {
                self.link_source = v;
                Invalidation::REBUILD
            }
            LinkTarget(v) => {
                self.link_target = v;
                Invalidation::REBUILD
            }
            LinkColor(v) => {
                self.link_color = v;
                Invalidation::REBUILD
            }
            LinkAutoColorBy(v) => {
                self.link_auto_color_by = v;
                Invalidation::REBUILD
            }
            LinkOpacity(v) => {
                self.link_opacity = v;
                Invalidation::REBUILD
            }
            LinkVal(v) => {
                self.link_val = v;
                Invalidation::REBUILD
            }
            LinkWidthScale(v) => {
                self.link_width_scale = v;
                Invalidation::REBUILD
            }
            LinkResolution(v) => {
                self.link_resolution = v;
                Invalidation::REBUILD
            }
            Engine(v) => {
                self.engine = v;
                Invalidation::REBUILD
            }
            AlphaDecay(v) => {
                self.alpha_decay = v;
                Invalidation::REBUILD
            }
            VelocityDecay(v) => {
                self.velocity_decay = v;
                Invalidation::REBUILD
            }
            WarmupTicks(v) => {
                self.warmup_ticks = v;
                Invalidation::REBUILD
            }
            CooldownTicks(v) => {
                self.cooldown_ticks = v;
                Invalidation::REBUILD
            }
            CooldownTimeMs(v) => {
                self.cooldown_time_ms = v;
                Invalidation::REBUILD
            }
            OnLoading(v) => {
                self.on_loading = v;
                Invalidation::NONE
            }
            OnFinishLoading(v) => {
                self.on_finish_loading = v;
                Invalidation::NONE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.num_dimensions, 3);
        assert_eq!(config.node_rel_size, 4.0);
        assert_eq!(config.node_resolution, 8);
        assert_eq!(config.link_resolution, 6);
        assert_eq!(config.engine, EngineKind::Force);
        assert_eq!(config.cooldown_ticks, None);
        assert_eq!(config.cooldown_time_ms, Some(15_000.0));
        assert_eq!(config.node_id.field_name(), Some("id"));
    }

    #[test]
    fn test_dimension_reduction_strips_and_rebuilds() {
        let mut config = GraphConfig::default();
        let inv = config.apply(ConfigUpdate::NumDimensions(2));
        assert_eq!(inv.strip_above, Some(2));
        assert!(inv.rebuild);
        assert_eq!(config.num_dimensions, 2);
    }

    #[test]
    fn test_three_dimensions_strips_nothing() {
        let mut config = GraphConfig::default();
        config.num_dimensions = 2;
        let inv = config.apply(ConfigUpdate::NumDimensions(3));
        assert_eq!(inv.strip_above, None);
        assert!(inv.rebuild);
    }

    #[test]
    fn test_dimension_count_clamped() {
        let mut config = GraphConfig::default();
        config.apply(ConfigUpdate::NumDimensions(0));
        assert_eq!(config.num_dimensions, 1);
        config.apply(ConfigUpdate::NumDimensions(9));
        assert_eq!(config.num_dimensions, 3);
    }

    #[test]
    fn test_lifecycle_hooks_change_without_rebuild() {
        let mut config = GraphConfig::default();
        let inv = config.apply(ConfigUpdate::OnLoading(Some(Rc::new(|| {}))));
        assert_eq!(inv, Invalidation::NONE);
        assert!(config.on_loading.is_some());

        let inv = config.apply(ConfigUpdate::OnFinishLoading(Some(Rc::new(|| {}))));
        assert!(!inv.rebuild);
    }

    #[test]
    fn test_visual_options_rebuild() {
        let mut config = GraphConfig::default();
        assert!(config.apply(ConfigUpdate::NodeRelSize(2.0)).rebuild);
        assert!(
            config
                .apply(ConfigUpdate::Engine(EngineKind::Topological))
                .rebuild
        );
        assert!(
            config
                .apply(ConfigUpdate::NodeColor(Accessor::field("tint")))
                .rebuild
        );
    }
}
