//! Constraint messages: the serializable input of sampler selection.
//!
//! Plain data, no validation. Names and frames are resolved when the
//! messages are turned into [`kinematic`](crate::kinematic) constraints.
//!
//! # Example
//!
//! ```
//! use clankers_samplers::msg::{Constraints, Primitive};
//!
//! let constraints = Constraints::from_toml_str(r#"
//!     [[joint_constraints]]
//!     joint_name = "elbow"
//!     position = 0.5
//!     tolerance_above = 0.1
//!     tolerance_below = 0.1
//!
//!     [[position_constraints]]
//!     link_name = "tool"
//!     [[position_constraints.regions]]
//!     shape = { type = "sphere", radius = 0.05 }
//!     pose = { position = [0.4, 0.0, 0.8] }
//! "#).unwrap();
//!
//! assert_eq!(constraints.joint_constraints.len(), 1);
//! assert!(matches!(
//!     constraints.position_constraints[0].regions[0].shape,
//!     Primitive::Sphere { .. }
//! ));
//! ```

use std::path::Path;

use clankers_core::ConfigError;
use serde::{Deserialize, Serialize};

const fn identity_quaternion() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// A constraint set: three independent, ordered collections.
///
/// Link names need not be unique within a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub joint_constraints: Vec<JointConstraint>,
    #[serde(default)]
    pub position_constraints: Vec<PositionConstraint>,
    #[serde(default)]
    pub orientation_constraints: Vec<OrientationConstraint>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.joint_constraints.is_empty()
            && self.position_constraints.is_empty()
            && self.orientation_constraints.is_empty()
    }

    /// Whether any position or orientation constraint is present.
    pub fn has_task_space(&self) -> bool {
        !self.position_constraints.is_empty() || !self.orientation_constraints.is_empty()
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

// ---------------------------------------------------------------------------
// Joint constraints
// ---------------------------------------------------------------------------

/// Keep one joint variable within `[position - tolerance_below, position + tolerance_above]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConstraint {
    pub joint_name: String,
    pub position: f64,
    #[serde(default)]
    pub tolerance_above: f64,
    #[serde(default)]
    pub tolerance_below: f64,
}

impl JointConstraint {
    pub fn new(joint_name: impl Into<String>, position: f64, tolerance: f64) -> Self {
        Self {
            joint_name: joint_name.into(),
            position,
            tolerance_above: tolerance,
            tolerance_below: tolerance,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A pose as position plus `[x, y, z, w]` quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default = "identity_quaternion")]
    pub orientation: [f64; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: identity_quaternion(),
        }
    }
}

impl Pose {
    pub const fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            orientation: identity_quaternion(),
        }
    }
}

/// Solid primitive centered on its pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    /// Axis-aligned box with full side lengths `[x, y, z]`.
    Box { size: [f64; 3] },
    Sphere { radius: f64 },
    /// Cylinder along the local `z` axis.
    Cylinder { radius: f64, height: f64 },
}

/// One region a constrained point may lie in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub shape: Primitive,
    #[serde(default)]
    pub pose: Pose,
}

// ---------------------------------------------------------------------------
// Task-space constraints
// ---------------------------------------------------------------------------

/// Keep a point on a link inside the union of `regions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConstraint {
    pub link_name: String,
    /// Frame the regions are expressed in. Empty means the planning frame.
    #[serde(default)]
    pub frame_id: String,
    /// Constrained point, in the link frame.
    #[serde(default)]
    pub target_point_offset: [f64; 3],
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl PositionConstraint {
    /// Constrain the link origin to a sphere in the planning frame.
    pub fn sphere(link_name: impl Into<String>, center: [f64; 3], radius: f64) -> Self {
        Self {
            link_name: link_name.into(),
            frame_id: String::new(),
            target_point_offset: [0.0; 3],
            regions: vec![Region {
                shape: Primitive::Sphere { radius },
                pose: Pose::at(center),
            }],
        }
    }

    /// Constrain the link origin to an axis-aligned box in the planning frame.
    pub fn cuboid(link_name: impl Into<String>, center: [f64; 3], size: [f64; 3]) -> Self {
        Self {
            link_name: link_name.into(),
            frame_id: String::new(),
            target_point_offset: [0.0; 3],
            regions: vec![Region {
                shape: Primitive::Box { size },
                pose: Pose::at(center),
            }],
        }
    }
}

/// Keep a link's orientation within absolute roll/pitch/yaw tolerances of
/// `orientation` (`[x, y, z, w]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationConstraint {
    pub link_name: String,
    #[serde(default)]
    pub frame_id: String,
    #[serde(default = "identity_quaternion")]
    pub orientation: [f64; 4],
    #[serde(default)]
    pub absolute_x_axis_tolerance: f64,
    #[serde(default)]
    pub absolute_y_axis_tolerance: f64,
    #[serde(default)]
    pub absolute_z_axis_tolerance: f64,
}

impl OrientationConstraint {
    pub fn new(link_name: impl Into<String>, orientation: [f64; 4], tolerances: [f64; 3]) -> Self {
        Self {
            link_name: link_name.into(),
            frame_id: String::new(),
            orientation,
            absolute_x_axis_tolerance: tolerances[0],
            absolute_y_axis_tolerance: tolerances[1],
            absolute_z_axis_tolerance: tolerances[2],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
