//! Pluggable inverse-kinematics interface.
//!
//! Groups carry an optional [`SolverAllocatorFn`]; calling it yields a
//! [`KinematicsSolver`] bound to that group. Concrete solvers live outside
//! this crate (see `clankers-ik`).

use std::sync::Arc;

use nalgebra::{Isometry3, UnitQuaternion, Vector3};

use crate::group::JointModelGroup;
use crate::state::RobotState;
use crate::types::RobotModel;

/// What the solver should place, expressed in the model (root) frame.
#[derive(Debug, Clone, PartialEq)]
pub enum IkTarget {
    /// Place a point fixed on the link (`link_offset`, in the link frame) at
    /// `point`. Orientation is free.
    Position {
        point: Vector3<f64>,
        link_offset: Vector3<f64>,
    },
    /// Orient the link frame. Position is free.
    Orientation(UnitQuaternion<f64>),
    /// Place the link frame at a full pose.
    Pose(Isometry3<f64>),
}

/// An IK solver for one joint group.
pub trait KinematicsSolver: Send + Sync {
    /// Name of the group this solver was allocated for.
    fn group_name(&self) -> &str;

    /// Whether targets on `link` can be solved by this solver.
    fn supports_link(&self, link: &str) -> bool;

    /// Solve for the group's variables.
    ///
    /// `seed` supplies the starting values and the values of every joint the
    /// solver may not move. Variables listed in `locked` keep their seed
    /// values. On success, returns one value per group variable, in group
    /// order.
    fn solve(
        &self,
        link: &str,
        target: &IkTarget,
        seed: &RobotState,
        locked: &[String],
    ) -> Option<Vec<f64>>;
}

/// Builds a solver instance for a group, or `None` if it cannot.
pub type SolverAllocatorFn =
    Arc<dyn Fn(&RobotModel, &JointModelGroup) -> Option<Arc<dyn KinematicsSolver>> + Send + Sync>;
