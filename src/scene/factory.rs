//! Object factory: materializes render objects for nodes and links.
//!
//! Geometry is cached by the quantized size value and materials by the
//! resolved color, so records sharing a value or color share one primitive
//! instance. Caches live for a single rebuild cycle; a new factory is created
//! whenever the graph data changes.
//!
//! Malformed inputs never error here: non-numeric size values and
//! unparseable colors degrade to defaults, favoring a wrong-looking visual
//! over a crashed host.

use std::collections::HashMap;
use std::rc::Rc;

use crate::color::{DEFAULT_LINK_COLOR, DEFAULT_NODE_COLOR, resolve_color};
use crate::config::GraphConfig;
use crate::graph::{Accessor, Fields, LinkRecord, NodeRecord};

use super::object::{Geometry, Material, ObjectTag, RenderObject};

/// Per-rebuild geometry and material caches.
#[derive(Default)]
pub struct ObjectFactory {
    sphere_geometries: HashMap<u64, Rc<Geometry>>,
    node_materials: HashMap<u32, Rc<Material>>,
    cylinder_geometries: HashMap<u64, Rc<Geometry>>,
    link_materials: HashMap<u32, Rc<Material>>,
}

impl ObjectFactory {
    /// Create a factory with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the render object for a node.
    ///
    /// When the configured custom-object accessor yields an override, that
    /// object is used verbatim (retagged to this node). Otherwise a sphere is
    /// built with radius `cbrt(val) * node_rel_size`, so apparent volume stays
    /// proportional to the value across the size range.
    pub fn node_object(
        &mut self,
        node: &NodeRecord,
        index: usize,
        config: &GraphConfig,
    ) -> RenderObject {
        if let Some(custom) = &config.node_object {
            if let Some(mut obj) = custom(&node.fields) {
                obj.tag = ObjectTag::Node;
                obj.source_index = index;
                return obj;
            }
        }

        let val = size_value(&config.node_val, &node.fields);
        let geometry = self
            .sphere_geometries
            .entry(val.to_bits())
            .or_insert_with(|| {
                Rc::new(Geometry::Sphere {
                    radius: (val.cbrt() * config.node_rel_size) as f32,
                    width_segments: config.node_resolution,
                    height_segments: config.node_resolution,
                })
            })
            .clone();

        let color =
            resolve_color(&config.node_color.value(&node.fields)).unwrap_or(DEFAULT_NODE_COLOR);
        let material = self
            .node_materials
            .entry(color)
            .or_insert_with(|| {
                Rc::new(Material {
                    color,
                    opacity: config.node_opacity as f32,
                    transparent: true,
                })
            })
            .clone();

        RenderObject::new(geometry, material, ObjectTag::Node, index)
    }

    /// Build the render object for a link: a unit cylinder anchored at its
    /// start end, radius `val * link_width_scale / 2`.
    pub fn link_object(
        &mut self,
        link: &LinkRecord,
        index: usize,
        config: &GraphConfig,
    ) -> RenderObject {
        let val = size_value(&config.link_val, &link.fields);
        let geometry = self
            .cylinder_geometries
            .entry(val.to_bits())
            .or_insert_with(|| {
                Rc::new(Geometry::Cylinder {
                    radius: (val * config.link_width_scale / 2.0) as f32,
                    radial_segments: config.link_resolution,
                })
            })
            .clone();

        let color =
            resolve_color(&config.link_color.value(&link.fields)).unwrap_or(DEFAULT_LINK_COLOR);
        let material = self
            .link_materials
            .entry(color)
            .or_insert_with(|| {
                Rc::new(Material {
                    color,
                    opacity: config.link_opacity as f32,
                    transparent: true,
                })
            })
            .clone();

        let mut obj = RenderObject::new(geometry, material, ObjectTag::Link, index);
        // Render links after nodes so translucent segments do not darken the
        // spheres they touch.
        obj.render_order = 10;
        obj
    }
}

/// Resolve a size value; missing, malformed, and zero values all fall back
/// to 1 (zero is deliberately treated as unset for upstream compatibility).
fn size_value(accessor: &Accessor, fields: &Fields) -> f64 {
    accessor
        .number(fields)
        .filter(|v| *v != 0.0)
        .unwrap_or(1.0)
}
