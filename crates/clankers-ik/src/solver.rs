//! Damped Least Squares (Levenberg-Marquardt) IK solver.
//!
//! Iteratively solves for joint positions that place a link at a target
//! position, orientation or pose, using the geometric Jacobian and the DLS
//! pseudoinverse. Only joints flagged active move; the rest stay at their
//! initial values.

use nalgebra::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector3};

use clankers_core::IkSolverConfig;
use clankers_model::IkTarget;

use crate::chain::KinematicChain;

/// Result of an IK solve.
#[derive(Debug, Clone)]
pub struct IkResult {
    /// Solved joint positions, in chain order.
    pub joint_positions: Vec<f64>,
    /// Whether the solver converged within tolerance.
    pub converged: bool,
    /// Number of iterations used.
    pub iterations: u32,
    /// Final position error (meters). Zero for orientation-only targets.
    pub position_error: f64,
    /// Final orientation error (radians). Zero for position-only targets.
    pub orientation_error: f64,
}

/// Damped Least Squares IK solver.
#[derive(Debug, Clone)]
pub struct DlsSolver {
    config: IkSolverConfig,
}

impl DlsSolver {
    /// Create a new solver with the given configuration.
    pub const fn new(config: IkSolverConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(IkSolverConfig::default())
    }

    pub const fn config(&self) -> &IkSolverConfig {
        &self.config
    }

    /// Solve IK for the given chain and target.
    ///
    /// `q_init` is the starting configuration in chain order; `active[i]`
    /// says whether chain joint `i` may move.
    pub fn solve(
        &self,
        chain: &KinematicChain,
        target: &IkTarget,
        q_init: &[f64],
        active: &[bool],
    ) -> IkResult {
        assert_eq!(q_init.len(), chain.dof());
        assert_eq!(active.len(), chain.dof());

        let mut q: Vec<f64> = q_init.to_vec();
        let offset = point_offset(target);

        for iteration in 0..self.config.max_iterations {
            let (pos_err, ori_err, error_vec) = compute_error(chain, &q, target);

            if self.converged(target, pos_err, ori_err) {
                return IkResult {
                    joint_positions: q,
                    converged: true,
                    iterations: iteration,
                    position_error: pos_err,
                    orientation_error: ori_err,
                };
            }

            let jacobian = compute_jacobian(chain, &q, target, &offset, active);
            let m = jacobian.nrows();

            // DLS: dq = J^T (J J^T + lambda^2 I)^{-1} * error
            let jjt = &jacobian * jacobian.transpose();
            let damped =
                jjt + DMatrix::identity(m, m) * (self.config.damping * self.config.damping);
            let Some(damped_inv) = damped.try_inverse() else {
                // Singular even with damping
                return IkResult {
                    joint_positions: q,
                    converged: false,
                    iterations: iteration,
                    position_error: pos_err,
                    orientation_error: ori_err,
                };
            };

            let dq = jacobian.transpose() * damped_inv * error_vec;
            for (i, value) in q.iter_mut().enumerate() {
                if active[i] {
                    *value += dq[i];
                }
            }

            chain.clamp_joints(&mut q);
        }

        let (pos_err, ori_err, _) = compute_error(chain, &q, target);
        IkResult {
            converged: self.converged(target, pos_err, ori_err),
            joint_positions: q,
            iterations: self.config.max_iterations,
            position_error: pos_err,
            orientation_error: ori_err,
        }
    }

    fn converged(&self, target: &IkTarget, pos_err: f64, ori_err: f64) -> bool {
        match target {
            IkTarget::Position { .. } => pos_err < self.config.position_tolerance,
            IkTarget::Orientation(_) => ori_err < self.config.angle_tolerance,
            IkTarget::Pose(_) => {
                pos_err < self.config.position_tolerance && ori_err < self.config.angle_tolerance
            }
        }
    }
}

fn point_offset(target: &IkTarget) -> Vector3<f64> {
    match target {
        IkTarget::Position { link_offset, .. } => *link_offset,
        IkTarget::Orientation(_) | IkTarget::Pose(_) => Vector3::zeros(),
    }
}

/// Compute the error vector between the current tip pose and the target.
///
/// Returns (position_error_norm, orientation_error_norm, error_vector).
fn compute_error(chain: &KinematicChain, q: &[f64], target: &IkTarget) -> (f64, f64, DVector<f64>) {
    let tip = chain.forward_kinematics(q);
    match target {
        IkTarget::Position { point, link_offset } => {
            let current = tip * nalgebra::Point3::from(*link_offset);
            let pos_err = point - current.coords;
            (
                pos_err.norm(),
                0.0,
                DVector::from_column_slice(pos_err.as_slice()),
            )
        }
        IkTarget::Orientation(rotation) => {
            let ori_err = orientation_error(&(rotation * tip.rotation.inverse()));
            (
                0.0,
                ori_err.norm(),
                DVector::from_column_slice(ori_err.as_slice()),
            )
        }
        IkTarget::Pose(pose) => {
            let (pos_err, ori_err) = pose_error(&tip, pose);
            let error = DVector::from_column_slice(&[
                pos_err.x, pos_err.y, pos_err.z, ori_err.x, ori_err.y, ori_err.z,
            ]);
            (pos_err.norm(), ori_err.norm(), error)
        }
    }
}

fn pose_error(tip: &Isometry3<f64>, target: &Isometry3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let pos_err = target.translation.vector - tip.translation.vector;
    let ori_err = orientation_error(&(target.rotation * tip.rotation.inverse()));
    (pos_err, ori_err)
}

/// Extract orientation error as a 3-vector (axis * angle) from a unit quaternion.
fn orientation_error(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    q.axis()
        .map_or_else(Vector3::zeros, |axis| axis.into_inner() * q.angle())
}

/// Compute the geometric Jacobian for the current configuration.
///
/// Position targets give a 3xN matrix (linear rows), orientation targets a
/// 3xN matrix (angular rows), full-pose targets a 6xN matrix. Columns of
/// inactive joints are zero.
fn compute_jacobian(
    chain: &KinematicChain,
    q: &[f64],
    target: &IkTarget,
    offset: &Vector3<f64>,
    active: &[bool],
) -> DMatrix<f64> {
    let n = chain.dof();
    let (origins, axes, point) = chain.joint_frames(q, offset);

    let (linear, angular) = match target {
        IkTarget::Position { .. } => (Some(0), None),
        IkTarget::Orientation(_) => (None, Some(0)),
        IkTarget::Pose(_) => (Some(0), Some(3)),
    };
    let rows = if linear.is_some() && angular.is_some() { 6 } else { 3 };

    let mut jacobian = DMatrix::zeros(rows, n);

    for (i, joint) in chain.joints().iter().enumerate() {
        if !active[i] {
            continue;
        }
        let z_i = &axes[i];

        // Prismatic: linear z_i, no rotation. Revolute: linear z_i x r, angular z_i.
        let (lin, ang) = if joint.is_prismatic {
            (*z_i, Vector3::zeros())
        } else {
            (z_i.cross(&(point - origins[i])), *z_i)
        };

        if let Some(r) = linear {
            jacobian.fixed_view_mut::<3, 1>(r, i).copy_from(&lin);
        }
        if let Some(r) = angular {
            jacobian.fixed_view_mut::<3, 1>(r, i).copy_from(&ang);
        }
    }

    jacobian
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use clankers_model::parse_string;
    use clankers_test_utils::fixtures::{SIX_DOF_ARM, TWO_LINK_ARM};

    fn position(x: f64, y: f64, z: f64) -> IkTarget {
        IkTarget::Position {
            point: Vector3::new(x, y, z),
            link_offset: Vector3::zeros(),
        }
    }

    #[test]
    fn ik_roundtrip_two_link() {
        // FK at known angles, then IK to recover the position
        let model = parse_string(TWO_LINK_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let ee_target = chain.forward_kinematics(&[0.3, -0.5]);
        let t = ee_target.translation.vector;
        let solver = DlsSolver::with_defaults();
        let result = solver.solve(&chain, &position(t.x, t.y, t.z), &[0.0, 0.1], &[true; 2]);

        assert!(result.converged, "IK did not converge: pos_err={}", result.position_error);
        let ee_solved = chain.forward_kinematics(&result.joint_positions);
        assert_relative_eq!(ee_solved.translation.vector, t, epsilon = 1e-3);
    }

    #[test]
    fn ik_six_dof_position() {
        let model = parse_string(SIX_DOF_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let solver = DlsSolver::with_defaults();
        let result = solver.solve(&chain, &position(0.3, 0.0, 0.5), &[0.0; 6], &[true; 6]);

        assert!(result.converged, "IK did not converge: pos_err={}", result.position_error);
        let ee = chain.forward_kinematics(&result.joint_positions);
        assert_relative_eq!(ee.translation.x, 0.3, epsilon = 1e-3);
        assert_relative_eq!(ee.translation.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(ee.translation.z, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn ik_six_dof_full_pose_roundtrip() {
        let model = parse_string(SIX_DOF_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let ee_target = chain.forward_kinematics(&[0.5, 0.3, -0.4, 0.2, 0.1, -0.3]);
        let solver = DlsSolver::new(IkSolverConfig {
            max_iterations: 200,
            ..IkSolverConfig::default()
        });
        let result = solver.solve(&chain, &IkTarget::Pose(ee_target), &[0.0; 6], &[true; 6]);

        assert!(
            result.converged,
            "IK did not converge: pos_err={}, ori_err={}",
            result.position_error, result.orientation_error
        );
        assert!(result.position_error < 1e-3);
        assert!(result.orientation_error < 1e-2);
    }

    #[test]
    fn ik_orientation_only() {
        let model = parse_string(SIX_DOF_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let goal = chain.forward_kinematics(&[0.2, 0.4, 0.3, -0.2, 0.3, 0.1]).rotation;
        let solver = DlsSolver::with_defaults();
        let result = solver.solve(&chain, &IkTarget::Orientation(goal), &[0.0; 6], &[true; 6]);

        assert!(result.converged, "ori_err={}", result.orientation_error);
        let solved = chain.forward_kinematics(&result.joint_positions).rotation;
        assert!(solved.angle_to(&goal) < 1e-2);
    }

    #[test]
    fn inactive_joints_do_not_move() {
        let model = parse_string(SIX_DOF_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let q_init = [0.4, 0.0, 0.0, 0.0, 0.0, 0.0];
        let active = [false, true, true, true, true, true];
        let solver = DlsSolver::with_defaults();
        let result = solver.solve(&chain, &position(0.2, 0.1, 0.6), &q_init, &active);

        assert_relative_eq!(result.joint_positions[0], 0.4, epsilon = 1e-15);
    }

    #[test]
    fn ik_unreachable_target() {
        let model = parse_string(TWO_LINK_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let solver = DlsSolver::new(IkSolverConfig {
            max_iterations: 50,
            ..IkSolverConfig::default()
        });
        let result = solver.solve(&chain, &position(5.0, 5.0, 5.0), &[0.0, 0.0], &[true; 2]);

        assert!(!result.converged);
        assert!(result.position_error > 1.0);
    }

    #[test]
    fn ik_warm_start() {
        let model = parse_string(SIX_DOF_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let target = position(0.2, 0.1, 0.6);
        let solver = DlsSolver::with_defaults();

        let cold = solver.solve(&chain, &target, &[0.0; 6], &[true; 6]);
        assert!(cold.converged);

        let warm = solver.solve(&chain, &target, &cold.joint_positions, &[true; 6]);
        assert!(warm.converged);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn ik_respects_joint_limits() {
        let model = parse_string(TWO_LINK_ARM).unwrap();
        let chain = KinematicChain::from_model(&model, "end_effector").unwrap();

        let solver = DlsSolver::with_defaults();
        let result = solver.solve(&chain, &position(-0.1, 0.05, 0.05), &[0.0, 0.0], &[true; 2]);

        for (q, joint) in result.joint_positions.iter().zip(chain.joints()) {
            assert!(
                joint.bounds.contains(*q),
                "Joint {} out of limits: {} not in [{}, {}]",
                joint.name,
                q,
                joint.bounds.min,
                joint.bounds.max
            );
        }
    }
}
