//! Configured kinematic constraints.
//!
//! Built from [`msg`](crate::msg) constraints against a [`PlanningScene`]:
//! names are validated and every frame is resolved into the planning frame
//! once, at construction. Each constraint can check a [`RobotState`]
//! (`decide`) and the task-space ones can draw targets from their tolerance
//! region.

use std::f64::consts::PI;

use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::{Distribution, UnitBall, UnitDisc};

use clankers_model::{IkTarget, JointType, RobotModel, RobotState, VariableBounds};

use crate::error::ConstraintError;
use crate::msg::{self, Primitive};
use crate::scene::PlanningScene;

/// Slack on position checks (meters), absorbing IK convergence error.
const POSITION_MARGIN: f64 = 1e-3;
/// Slack on orientation checks (radians).
const ORIENTATION_MARGIN: f64 = 2e-3;
/// Slack on joint checks.
const JOINT_MARGIN: f64 = 2.0 * f64::EPSILON;

fn vector(v: [f64; 3]) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// `[x, y, z, w]` to a unit quaternion; `None` for a zero quaternion.
fn unit_quaternion(q: [f64; 4]) -> Option<UnitQuaternion<f64>> {
    let [x, y, z, w] = q;
    UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f64::EPSILON)
}

/// Wrap an angle into `(-pi, pi]`.
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

// ---------------------------------------------------------------------------
// JointConstraint
// ---------------------------------------------------------------------------

/// Bound on a single joint variable.
#[derive(Debug, Clone, PartialEq)]
pub struct JointConstraint {
    variable: String,
    position: f64,
    tolerance_above: f64,
    tolerance_below: f64,
    continuous: bool,
}

impl JointConstraint {
    /// Validate against the model.
    ///
    /// Negative tolerances are treated as zero. Targets on continuous joints
    /// are wrapped into `(-pi, pi]`.
    pub fn new(model: &RobotModel, msg: &msg::JointConstraint) -> Result<Self, ConstraintError> {
        let name = &msg.joint_name;
        if model.variable_index(name).is_none() {
            return Err(ConstraintError::UnknownVariable(name.clone()));
        }
        if !msg.position.is_finite() {
            return Err(ConstraintError::InvalidTolerance {
                name: name.clone(),
                message: format!("target position {} is not finite", msg.position),
            });
        }
        let tolerance_above = tolerance(name, "tolerance_above", msg.tolerance_above)?;
        let tolerance_below = tolerance(name, "tolerance_below", msg.tolerance_below)?;

        let continuous = model
            .joint(name)
            .is_ok_and(|j| j.joint_type == JointType::Continuous);
        let position = if continuous {
            wrap_angle(msg.position)
        } else {
            msg.position
        };

        Ok(Self {
            variable: name.clone(),
            position,
            tolerance_above,
            tolerance_below,
            continuous,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn tolerance_above(&self) -> f64 {
        self.tolerance_above
    }

    pub fn tolerance_below(&self) -> f64 {
        self.tolerance_below
    }

    /// `[position - tolerance_below, position + tolerance_above]`.
    pub fn interval(&self) -> VariableBounds {
        VariableBounds::new(
            self.position - self.tolerance_below,
            self.position + self.tolerance_above,
        )
    }

    pub fn decide(&self, state: &RobotState) -> bool {
        let Some(value) = state.variable(&self.variable) else {
            return false;
        };
        let diff = if self.continuous {
            wrap_angle(value - self.position)
        } else {
            value - self.position
        };
        diff <= self.tolerance_above + JOINT_MARGIN && diff >= -self.tolerance_below - JOINT_MARGIN
    }
}

fn tolerance(name: &str, field: &str, value: f64) -> Result<f64, ConstraintError> {
    if !value.is_finite() {
        return Err(ConstraintError::InvalidTolerance {
            name: name.to_string(),
            message: format!("{field} {value} is not finite"),
        });
    }
    if value < 0.0 {
        tracing::warn!(joint = name, field, value, "negative joint tolerance, using 0");
        return Ok(0.0);
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// PositionConstraint
// ---------------------------------------------------------------------------

/// A region primitive placed in the planning frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRegion {
    pub shape: Primitive,
    pub pose: Isometry3<f64>,
}

impl PositionRegion {
    pub fn volume(&self) -> f64 {
        match self.shape {
            Primitive::Box { size } => size[0] * size[1] * size[2],
            Primitive::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Primitive::Cylinder { radius, height } => PI * radius * radius * height,
        }
    }

    /// Uniform point inside the region, in the planning frame.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3<f64> {
        let local = match self.shape {
            Primitive::Box { size } => Vector3::new(
                symmetric(rng, size[0] / 2.0),
                symmetric(rng, size[1] / 2.0),
                symmetric(rng, size[2] / 2.0),
            ),
            Primitive::Sphere { radius } => {
                let [x, y, z]: [f64; 3] = UnitBall.sample(rng);
                Vector3::new(x, y, z) * radius
            }
            Primitive::Cylinder { radius, height } => {
                let [x, y]: [f64; 2] = UnitDisc.sample(rng);
                Vector3::new(x * radius, y * radius, symmetric(rng, height / 2.0))
            }
        };
        (self.pose * Point3::from(local)).coords
    }

    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        let local = self.pose.inverse_transform_point(&Point3::from(*point)).coords;
        match self.shape {
            Primitive::Box { size } => (0..3).all(|i| local[i].abs() <= size[i] / 2.0 + POSITION_MARGIN),
            Primitive::Sphere { radius } => local.norm() <= radius + POSITION_MARGIN,
            Primitive::Cylinder { radius, height } => {
                local.xy().norm() <= radius + POSITION_MARGIN
                    && local.z.abs() <= height / 2.0 + POSITION_MARGIN
            }
        }
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, half: f64) -> f64 {
    rng.gen_range(-half..=half)
}

fn validate_shape(link: &str, shape: &Primitive) -> Result<(), ConstraintError> {
    let dims: &[f64] = match shape {
        Primitive::Box { size } => size,
        Primitive::Sphere { radius } => std::slice::from_ref(radius),
        Primitive::Cylinder { radius, height } => &[*radius, *height],
    };
    if dims.iter().all(|d| d.is_finite() && *d >= 0.0) {
        Ok(())
    } else {
        Err(ConstraintError::InvalidRegion {
            link: link.to_string(),
            message: format!("dimensions must be finite and >= 0, got {dims:?}"),
        })
    }
}

/// Keep a point on a link inside a union of regions.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionConstraint {
    link: String,
    offset: Vector3<f64>,
    regions: Vec<PositionRegion>,
}

impl PositionConstraint {
    pub fn new(scene: &PlanningScene, msg: &msg::PositionConstraint) -> Result<Self, ConstraintError> {
        let link = &msg.link_name;
        if !scene.model().has_link(link) {
            return Err(ConstraintError::UnknownLink(link.clone()));
        }
        if msg.regions.is_empty() {
            return Err(ConstraintError::NoRegions { link: link.clone() });
        }
        let frame = scene.frame_transform(&msg.frame_id)?;

        let regions = msg
            .regions
            .iter()
            .map(|region| {
                validate_shape(link, &region.shape)?;
                let rotation = unit_quaternion(region.pose.orientation)
                    .ok_or_else(|| ConstraintError::ZeroQuaternion { link: link.clone() })?;
                let [x, y, z] = region.pose.position;
                Ok(PositionRegion {
                    shape: region.shape,
                    pose: frame * Isometry3::from_parts(Translation3::new(x, y, z), rotation),
                })
            })
            .collect::<Result<Vec<_>, ConstraintError>>()?;

        Ok(Self {
            link: link.clone(),
            offset: vector(msg.target_point_offset),
            regions,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    /// Constrained point in the link frame.
    pub fn offset(&self) -> &Vector3<f64> {
        &self.offset
    }

    pub fn has_offset(&self) -> bool {
        self.offset.norm_squared() > f64::EPSILON
    }

    pub fn regions(&self) -> &[PositionRegion] {
        &self.regions
    }

    /// Total volume of the regions.
    pub fn volume(&self) -> f64 {
        self.regions.iter().map(PositionRegion::volume).sum()
    }

    /// A point inside a uniformly chosen region, in the planning frame.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3<f64> {
        let index = rng.gen_range(0..self.regions.len());
        self.regions[index].sample_point(rng)
    }

    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        self.regions.iter().any(|r| r.contains(point))
    }

    pub fn decide(&self, model: &RobotModel, state: &RobotState) -> bool {
        model
            .link_transform(&self.link, state)
            .is_ok_and(|pose| self.contains(&(pose * Point3::from(self.offset)).coords))
    }
}

// ---------------------------------------------------------------------------
// OrientationConstraint
// ---------------------------------------------------------------------------

/// Keep a link's orientation within roll/pitch/yaw tolerances of a target.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationConstraint {
    link: String,
    desired: UnitQuaternion<f64>,
    tolerances: Vector3<f64>,
}

impl OrientationConstraint {
    /// Tolerances are taken by absolute value.
    pub fn new(
        scene: &PlanningScene,
        msg: &msg::OrientationConstraint,
    ) -> Result<Self, ConstraintError> {
        let link = &msg.link_name;
        if !scene.model().has_link(link) {
            return Err(ConstraintError::UnknownLink(link.clone()));
        }
        let tolerances = Vector3::new(
            msg.absolute_x_axis_tolerance,
            msg.absolute_y_axis_tolerance,
            msg.absolute_z_axis_tolerance,
        )
        .abs();
        if tolerances.iter().any(|t| !t.is_finite()) {
            return Err(ConstraintError::InvalidTolerance {
                name: link.clone(),
                message: "orientation tolerances must be finite".into(),
            });
        }
        let rotation = unit_quaternion(msg.orientation)
            .ok_or_else(|| ConstraintError::ZeroQuaternion { link: link.clone() })?;
        let frame = scene.frame_transform(&msg.frame_id)?;

        Ok(Self {
            link: link.clone(),
            desired: frame.rotation * rotation,
            tolerances,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    /// Target orientation in the planning frame.
    pub fn desired(&self) -> &UnitQuaternion<f64> {
        &self.desired
    }

    /// Absolute roll, pitch, yaw tolerances.
    pub fn tolerances(&self) -> &Vector3<f64> {
        &self.tolerances
    }

    /// Product of the three angular tolerances.
    pub fn volume(&self) -> f64 {
        self.tolerances.x * self.tolerances.y * self.tolerances.z
    }

    /// Orientation drawn uniformly in roll/pitch/yaw within the tolerances.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> UnitQuaternion<f64> {
        let roll = symmetric(rng, self.tolerances.x.min(PI));
        let pitch = symmetric(rng, self.tolerances.y.min(PI));
        let yaw = symmetric(rng, self.tolerances.z.min(PI));
        self.desired * UnitQuaternion::from_euler_angles(roll, pitch, yaw)
    }

    pub fn decide(&self, model: &RobotModel, state: &RobotState) -> bool {
        let Ok(pose) = model.link_transform(&self.link, state) else {
            return false;
        };
        let (roll, pitch, yaw) = (self.desired.inverse() * pose.rotation).euler_angles();
        roll.abs() <= self.tolerances.x + ORIENTATION_MARGIN
            && pitch.abs() <= self.tolerances.y + ORIENTATION_MARGIN
            && yaw.abs() <= self.tolerances.z + ORIENTATION_MARGIN
    }
}

// ---------------------------------------------------------------------------
// IkSamplingPose
// ---------------------------------------------------------------------------

/// Position and/or orientation goal on one link.
#[derive(Debug, Clone, PartialEq)]
pub struct IkSamplingPose {
    position: Option<PositionConstraint>,
    orientation: Option<OrientationConstraint>,
}

impl IkSamplingPose {
    pub const fn from_position(position: PositionConstraint) -> Self {
        Self {
            position: Some(position),
            orientation: None,
        }
    }

    pub const fn from_orientation(orientation: OrientationConstraint) -> Self {
        Self {
            position: None,
            orientation: Some(orientation),
        }
    }

    /// Full pose goal. Both constraints must name the same link.
    pub fn from_pair(
        position: PositionConstraint,
        orientation: OrientationConstraint,
    ) -> Result<Self, ConstraintError> {
        if position.link != orientation.link {
            return Err(ConstraintError::LinkMismatch {
                position: position.link,
                orientation: orientation.link,
            });
        }
        Ok(Self {
            position: Some(position),
            orientation: Some(orientation),
        })
    }

    /// Build from messages against a scene.
    pub fn from_msgs(
        scene: &PlanningScene,
        position: Option<&msg::PositionConstraint>,
        orientation: Option<&msg::OrientationConstraint>,
    ) -> Result<Option<Self>, ConstraintError> {
        let position = position
            .map(|p| PositionConstraint::new(scene, p))
            .transpose()?;
        let orientation = orientation
            .map(|o| OrientationConstraint::new(scene, o))
            .transpose()?;
        match (position, orientation) {
            (Some(p), Some(o)) => Self::from_pair(p, o).map(Some),
            (Some(p), None) => Ok(Some(Self::from_position(p))),
            (None, Some(o)) => Ok(Some(Self::from_orientation(o))),
            (None, None) => Ok(None),
        }
    }

    pub fn position(&self) -> Option<&PositionConstraint> {
        self.position.as_ref()
    }

    pub fn orientation(&self) -> Option<&OrientationConstraint> {
        self.orientation.as_ref()
    }

    pub fn link(&self) -> &str {
        match (&self.position, &self.orientation) {
            (Some(p), _) => p.link(),
            (None, Some(o)) => o.link(),
            (None, None) => "",
        }
    }

    /// Sampling volume: region volume times the product of the angular
    /// tolerances. A missing constraint contributes a factor of one.
    pub fn volume(&self) -> f64 {
        let position = self.position.as_ref().map_or(1.0, PositionConstraint::volume);
        let orientation = self
            .orientation
            .as_ref()
            .map_or(1.0, OrientationConstraint::volume);
        position * orientation
    }

    /// Draw an IK target from the tolerance region.
    ///
    /// For a full pose the sampled point is the constrained point on the
    /// link, so the link origin is shifted back by the rotated offset.
    pub fn sample_target<R: Rng + ?Sized>(&self, rng: &mut R) -> IkTarget {
        match (&self.position, &self.orientation) {
            (Some(p), Some(o)) => {
                let point = p.sample_point(rng);
                let rotation = o.sample(rng);
                let origin = point - rotation * p.offset;
                IkTarget::Pose(Isometry3::from_parts(Translation3::from(origin), rotation))
            }
            (Some(p), None) => IkTarget::Position {
                point: p.sample_point(rng),
                link_offset: p.offset,
            },
            (None, Some(o)) => IkTarget::Orientation(o.sample(rng)),
            (None, None) => IkTarget::Orientation(UnitQuaternion::identity()),
        }
    }

    pub fn decide(&self, model: &RobotModel, state: &RobotState) -> bool {
        self.position.as_ref().is_none_or(|p| p.decide(model, state))
            && self
                .orientation
                .as_ref()
                .is_none_or(|o| o.decide(model, state))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
