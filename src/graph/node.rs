//! Node record type and simulation state.
//!
//! A node carries:
//! - Its raw data fields as parsed from the input snapshot
//! - A resolved identity key (unique within a snapshot)
//! - Simulation state: position and velocity per active dimension
//! - A handle to its materialized render object, once built

use std::fmt;

use glam::DVec3;
use serde_json::Value;

use super::Fields;
use crate::scene::ObjectId;

/// Canonical node identity.
///
/// Input snapshots may carry ids as JSON strings or numbers; both map to the
/// same key (`1` and `"1"` are the same node), so links can reference nodes
/// regardless of the numeric representation used in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey(String);

impl NodeKey {
    /// Create a key from a raw string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Canonicalize a JSON value into a key.
    ///
    /// Strings are used as-is, numbers and booleans are formatted the way
    /// JavaScript would (`1`, not `1.0`), and `null`/missing yields no key.
    /// Structured values fall back to their compact JSON text.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            other => Some(Self(other.to_string())),
        }
    }

    /// Get the canonical string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Per-node simulation state.
///
/// Fields beyond the configured dimension count are `None`, not zero: reducing
/// dimensionality strips the higher components entirely so stale state cannot
/// leak into a lower-dimension layout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
    pub vz: Option<f64>,
}

impl SimState {
    /// Read the position as a 3D vector, treating missing components as 0.
    #[inline]
    pub fn position(&self) -> DVec3 {
        DVec3::new(
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
    }

    /// Remove the Y position and velocity components.
    pub fn strip_y(&mut self) {
        self.y = None;
        self.vy = None;
    }

    /// Remove the Z position and velocity components.
    pub fn strip_z(&mut self) {
        self.z = None;
        self.vz = None;
    }

    /// True if any position component has been assigned.
    #[inline]
    pub fn is_placed(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }
}

/// One node of the current graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    /// Raw data fields from the input document.
    pub fields: Fields,
    /// Identity resolved through the configured id accessor.
    pub key: Option<NodeKey>,
    /// Simulation position/velocity, owned by the current layout cycle.
    pub sim: SimState,
    /// Handle to the materialized render object, if any.
    pub object: Option<ObjectId>,
}

impl NodeRecord {
    /// Create a record from raw data fields.
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            key: None,
            sim: SimState::default(),
            object: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_from_string_and_number_agree() {
        let from_str = NodeKey::from_value(&json!("1")).unwrap();
        let from_num = NodeKey::from_value(&json!(1)).unwrap();
        assert_eq!(from_str, from_num);
    }

    #[test]
    fn test_key_from_float_keeps_fraction() {
        let key = NodeKey::from_value(&json!(1.5)).unwrap();
        assert_eq!(key.as_str(), "1.5");
    }

    #[test]
    fn test_key_from_null_is_none() {
        assert!(NodeKey::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_sim_state_position_defaults_missing_to_zero() {
        let sim = SimState {
            x: Some(3.0),
            ..Default::default()
        };
        assert_eq!(sim.position(), DVec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_strip_removes_position_and_velocity() {
        let mut sim = SimState {
            x: Some(1.0),
            y: Some(2.0),
            z: Some(3.0),
            vx: Some(0.1),
            vy: Some(0.2),
            vz: Some(0.3),
        };
        sim.strip_z();
        assert_eq!(sim.z, None);
        assert_eq!(sim.vz, None);
        assert_eq!(sim.y, Some(2.0));

        sim.strip_y();
        assert_eq!(sim.y, None);
        assert_eq!(sim.vy, None);
        assert_eq!(sim.x, Some(1.0));
    }
}
