//! Retained render scene: object types, the engine-owned scene subtree, and
//! the object factory with its per-rebuild caches.

pub mod factory;
pub mod object;

pub use factory::ObjectFactory;
pub use object::{
    Geometry, Material, ObjectId, ObjectTag, RenderObject, SceneGroup, TRANSFORM_STRIDE,
};
