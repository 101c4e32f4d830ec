//! Inverse kinematics solver for Clankers joint groups.
//!
//! Provides geometric Jacobian computation and Damped Least Squares
//! (Levenberg-Marquardt) IK solving for kinematic chains extracted from a
//! [`RobotModel`](clankers_model::RobotModel), wrapped as a
//! [`KinematicsSolver`](clankers_model::KinematicsSolver) that groups can
//! allocate.
//!
//! # Architecture
//!
//! ```text
//! RobotModel ──► KinematicChain ──► DlsSolver ──► DlsKinematicsSolver ──► group values
//! ```
//!
//! One [`KinematicChain`] is extracted per group link when the solver is
//! allocated. Each solve maps the seed state onto the chain, moves only the
//! group's unlocked joints and writes the result back in group order.

pub mod chain;
pub mod kinematics;
pub mod solver;

pub use chain::KinematicChain;
pub use kinematics::{DLS_SOLVER_NAME, DlsKinematicsSolver, attach_solvers, dls_allocator};
pub use solver::{DlsSolver, IkResult};
