//! Forcegraph Scene
//!
//! A simulation-to-scene synchronization engine for force-directed node-link
//! graphs. It ingests `{nodes, links}` snapshots, materializes one retained
//! render object per record (spheres for nodes, stretched cylinders for
//! links), runs a pluggable layout simulation over 1-3 dimensions, and copies
//! positions into object transforms once per externally pumped frame. It can
//! be compiled to WebAssembly and driven from a JavaScript scene graph via
//! wasm-bindgen, or embedded natively as a plain library.
//!
//! # Architecture
//!
//! - `graph`: snapshot data model - node/link records, identity keys, field
//!   accessors
//! - `scene`: retained render objects, the engine-owned scene group, and the
//!   geometry/material caches
//! - `layout`: the two layout backends (continuous-force and topological)
//!   behind one adapter
//! - `color`: palette-based auto coloring and color value parsing
//! - `config`: the option set and its change/invalidation table
//! - `scheduler`: warmup/cooldown animation lifecycle
//! - `engine`: the synchronizer tying all of the above together

pub mod color;
pub mod config;
pub mod engine;
pub mod graph;
pub mod layout;
pub mod scene;
pub mod scheduler;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::{ConfigUpdate, GraphConfig};
pub use engine::{EngineError, ForceGraphEngine};
pub use graph::{Accessor, GraphData, NodeKey};
pub use layout::EngineKind;
pub use scheduler::Phase;
