//! Render object types: the interface boundary to the host scene graph.
//!
//! The engine materializes one [`RenderObject`] per node and per link into a
//! [`SceneGroup`] it owns. A host embeds the group and consumes either the
//! retained objects directly or the packed transform buffer. Geometry and
//! material instances are shared via `Rc`, so cloning an object (the custom
//! node override path) shares its primitives the way a scene-graph `clone()`
//! would.

use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};

/// Handle to a render object within its [`SceneGroup`].
///
/// Handles are only valid for the rebuild cycle that produced them; replacing
/// the graph snapshot clears the group and invalidates all prior handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Get the raw index value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

/// What kind of graph element an object renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTag {
    Node,
    Link,
}

/// A render primitive shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A sphere centered on the object origin.
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// A unit-length cylinder with its origin at one end and its length axis
    /// along +Z, so a look-at rotation plus a Z scale stretches it to span two
    /// endpoints without regenerating geometry.
    Cylinder { radius: f32, radial_segments: u32 },
}

/// Surface properties shared by all objects of the same resolved color.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// 24-bit hex color.
    pub color: u32,
    pub opacity: f32,
    pub transparent: bool,
}

/// One retained render object: a geometry/material pairing plus a transform.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub geometry: Rc<Geometry>,
    pub material: Rc<Material>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Draw-order hint for the host renderer; links render late to avoid dark
    /// segments occluding nodes.
    pub render_order: i32,
    /// Element kind tag for consumer-side inspection.
    pub tag: ObjectTag,
    /// Index of the source record in the current snapshot.
    pub source_index: usize,
}

impl RenderObject {
    /// Create an object with an identity transform.
    pub fn new(
        geometry: Rc<Geometry>,
        material: Rc<Material>,
        tag: ObjectTag,
        source_index: usize,
    ) -> Self {
        Self {
            geometry,
            material,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            render_order: 0,
            tag,
            source_index,
        }
    }

    /// Rotate the object so its +Z axis points at `target`.
    ///
    /// Degenerate cases (target coincides with the object position) keep the
    /// current rotation.
    pub fn look_at(&mut self, target: Vec3) {
        let delta = target - self.position;
        if delta.length_squared() > f32::EPSILON {
            self.rotation = Quat::from_rotation_arc(Vec3::Z, delta.normalize());
        }
    }
}

/// Floats per object in the packed transform buffer:
/// position (3) + rotation quaternion (4) + scale (3).
pub const TRANSFORM_STRIDE: usize = 10;

/// The scene subtree owned by the engine.
///
/// Cleared and repopulated on every rebuild. Alongside the retained objects it
/// maintains a flat `[x, y, z, qx, qy, qz, qw, sx, sy, sz]` buffer per object,
/// refreshed after each synchronization pass, for hosts that upload transforms
/// in bulk.
#[derive(Debug, Default)]
pub struct SceneGroup {
    objects: Vec<RenderObject>,
    transforms: Vec<f32>,
}

impl SceneGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all children and their packed transforms.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.transforms.clear();
    }

    /// Add a child object, returning its handle.
    pub fn add(&mut self, object: RenderObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Number of children.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when the group has no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Borrow a child by handle.
    pub fn get(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.get(id.0 as usize)
    }

    /// Mutably borrow a child by handle.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut RenderObject> {
        self.objects.get_mut(id.0 as usize)
    }

    /// Iterate over all children.
    pub fn objects(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.iter()
    }

    /// Repack every object's transform into the flat buffer.
    pub fn pack_transforms(&mut self) {
        self.transforms.clear();
        self.transforms.reserve(self.objects.len() * TRANSFORM_STRIDE);
        for obj in &self.objects {
            self.transforms.extend_from_slice(&[
                obj.position.x,
                obj.position.y,
                obj.position.z,
                obj.rotation.x,
                obj.rotation.y,
                obj.rotation.z,
                obj.rotation.w,
                obj.scale.x,
                obj.scale.y,
                obj.scale.z,
            ]);
        }
    }

    /// The packed transform buffer, `TRANSFORM_STRIDE` floats per object.
    #[inline]
    pub fn transform_buffer(&self) -> &[f32] {
        &self.transforms
    }
}
