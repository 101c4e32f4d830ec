//! Kinematic chain extracted from a [`RobotModel`].
//!
//! A [`KinematicChain`] is an ordered list of joints from the root link to a
//! tip link. It stores the static transforms (origins) and joint axes needed
//! for forward kinematics and Jacobian computation. Every actuated joint on
//! the path is kept, including joints outside the group being solved; the
//! solver decides per call which of them may move.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use clankers_model::kinematics::{joint_axis, origin_to_isometry};
use clankers_model::{JointType, ModelError, RobotModel, RobotState, VariableBounds};

/// A single joint in the kinematic chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    /// Name of this joint (and of its variable).
    pub name: String,
    /// Static transform from parent link frame to this joint frame.
    pub origin: Isometry3<f64>,
    /// Joint axis in the joint's local frame.
    pub axis: UnitVector3<f64>,
    /// Whether this is a prismatic joint (false = revolute).
    pub is_prismatic: bool,
    /// Position limits (rad or m).
    pub bounds: VariableBounds,
}

/// An ordered kinematic chain from the root link to a tip link.
///
/// Fixed joints have their transforms folded into the next actuated joint's
/// origin, or into the tip offset when they trail the last actuated joint.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    tip: String,
    /// Ordered joints from root to tip.
    joints: Vec<ChainJoint>,
    /// Transform from the last joint's child link to the tip link frame.
    tip_offset: Isometry3<f64>,
}

impl KinematicChain {
    /// Build the chain from the model root to `tip_link`.
    pub fn from_model(model: &RobotModel, tip_link: &str) -> Result<Self, ModelError> {
        let path = model.path_to_link(tip_link)?;

        let mut joints = Vec::new();
        let mut accumulated_fixed = Isometry3::identity();

        for joint in path {
            let joint_origin = origin_to_isometry(&joint.origin);

            if joint.joint_type.is_actuated() {
                // Compose any accumulated fixed transforms with this joint's origin
                let combined_origin = accumulated_fixed * joint_origin;
                accumulated_fixed = Isometry3::identity();

                joints.push(ChainJoint {
                    name: joint.name.clone(),
                    origin: combined_origin,
                    axis: joint_axis(joint),
                    is_prismatic: joint.joint_type == JointType::Prismatic,
                    bounds: joint.variable_bounds(),
                });
            } else {
                accumulated_fixed *= joint_origin;
            }
        }

        Ok(Self {
            tip: tip_link.to_string(),
            joints,
            tip_offset: accumulated_fixed,
        })
    }

    /// Name of the tip link.
    pub fn tip(&self) -> &str {
        &self.tip
    }

    /// Number of actuated joints on the chain.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Joint names in chain order.
    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    /// Access the joint definitions.
    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// Chain joint values read from a robot state.
    pub fn values_from(&self, state: &RobotState) -> Vec<f64> {
        self.joints
            .iter()
            .map(|j| state.variable(&j.name).unwrap_or(0.0))
            .collect()
    }

    /// Compute forward kinematics: joint positions -> tip link pose in the
    /// model frame.
    ///
    /// # Panics
    ///
    /// Panics if `q.len() != self.dof()`.
    pub fn forward_kinematics(&self, q: &[f64]) -> Isometry3<f64> {
        assert_eq!(q.len(), self.dof(), "q.len() must equal chain DOF");

        let mut transform = Isometry3::identity();
        for (joint, &value) in self.joints.iter().zip(q) {
            transform *= joint.origin;
            transform *= joint_transform(&joint.axis, joint.is_prismatic, value);
        }
        transform * self.tip_offset
    }

    /// Per-joint frames for Jacobian computation.
    ///
    /// Returns (joint origins, joint axes, reference point), all in the model
    /// frame. The reference point is `point_offset` expressed in the tip frame.
    pub fn joint_frames(
        &self,
        q: &[f64],
        point_offset: &Vector3<f64>,
    ) -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>, Vector3<f64>) {
        assert_eq!(q.len(), self.dof());

        let mut transform = Isometry3::identity();
        let mut origins = Vec::with_capacity(self.dof());
        let mut axes = Vec::with_capacity(self.dof());

        for (joint, &value) in self.joints.iter().zip(q) {
            transform *= joint.origin;

            // Joint origin and axis in the model frame, before joint motion
            origins.push(transform.translation.vector);
            axes.push(transform.rotation * joint.axis.into_inner());

            transform *= joint_transform(&joint.axis, joint.is_prismatic, value);
        }

        let tip = transform * self.tip_offset;
        let point = tip * Point3::from(*point_offset);
        (origins, axes, point.coords)
    }

    /// Clamp joint positions to their limits.
    pub fn clamp_joints(&self, q: &mut [f64]) {
        for (value, joint) in q.iter_mut().zip(&self.joints) {
            *value = joint.bounds.clamp(*value);
        }
    }
}

/// Compute the transform for a single joint at a given position.
fn joint_transform(axis: &UnitVector3<f64>, is_prismatic: bool, position: f64) -> Isometry3<f64> {
    if is_prismatic {
        Isometry3::from_parts(
            Translation3::from(axis.into_inner() * position),
            UnitQuaternion::identity(),
        )
    } else {
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(axis, position),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
