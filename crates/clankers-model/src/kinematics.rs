//! Forward kinematics over the robot model.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::error::ModelError;
use crate::state::RobotState;
use crate::types::{JointData, JointType, Origin, RobotModel};

/// Convert an [`Origin`] (xyz + rpy) to an [`Isometry3`].
///
/// URDF rpy is extrinsic XYZ, which is what `from_euler_angles` builds.
pub fn origin_to_isometry(origin: &Origin) -> Isometry3<f64> {
    let [x, y, z] = origin.xyz;
    let [roll, pitch, yaw] = origin.rpy;
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

/// Unit joint axis. A zero axis falls back to `+z`.
pub fn joint_axis(joint: &JointData) -> Unit<Vector3<f64>> {
    let [x, y, z] = joint.axis;
    Unit::try_new(Vector3::new(x, y, z), f64::EPSILON).unwrap_or_else(Vector3::z_axis)
}

/// Motion of a single joint at a given variable value.
pub fn joint_motion(joint: &JointData, value: f64) -> Isometry3<f64> {
    let axis = joint_axis(joint);
    match joint.joint_type {
        JointType::Prismatic => Isometry3::from_parts(
            Translation3::from(axis.into_inner() * value),
            UnitQuaternion::identity(),
        ),
        JointType::Revolute | JointType::Continuous => Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&axis, value),
        ),
        JointType::Fixed | JointType::Floating | JointType::Planar => Isometry3::identity(),
    }
}

impl RobotModel {
    /// Joints from the root link down to `link`, in root-to-link order.
    pub fn path_to_link(&self, link: &str) -> Result<Vec<&JointData>, ModelError> {
        self.link(link)?;
        let mut path = Vec::new();
        let mut current = link;
        while let Some(joint) = self.parent_joint(current) {
            // A well-formed tree never revisits a joint.
            if path.len() > self.joint_count() {
                return Err(ModelError::NoRootLink);
            }
            path.push(joint);
            current = &joint.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Pose of `link` in the model (root) frame for the given state.
    pub fn link_transform(
        &self,
        link: &str,
        state: &RobotState,
    ) -> Result<Isometry3<f64>, ModelError> {
        let mut transform = Isometry3::identity();
        for joint in self.path_to_link(link)? {
            transform *= origin_to_isometry(&joint.origin);
            if joint.joint_type.is_actuated() {
                let value = state.variable(&joint.name).unwrap_or(0.0);
                transform *= joint_motion(joint, value);
            }
        }
        Ok(transform)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
