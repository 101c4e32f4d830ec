//! Robot model for Clankers constraint sampling.
//!
//! Provides the kinematic tree parsed from URDF, named joint groups declared
//! through [`SemanticConfig`](clankers_core::SemanticConfig), the mutable
//! [`RobotState`] samplers write into, forward kinematics, and the
//! [`KinematicsSolver`] interface IK solvers plug into.
//!
//! # Architecture
//!
//! ```text
//! URDF ──► RobotModel ──► JointModelGroup ──► SolverAllocatorFn ──► KinematicsSolver
//!                 │
//!                 └──► RobotState (values) ──► link_transform (FK)
//! ```

pub mod error;
pub mod group;
pub mod kinematics;
pub mod parser;
pub mod solver;
pub mod state;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::ModelError;
pub use group::JointModelGroup;
pub use parser::{parse_file, parse_string};
pub use solver::{IkTarget, KinematicsSolver, SolverAllocatorFn};
pub use state::RobotState;
pub use types::{JointData, JointLimits, JointType, LinkData, Origin, RobotModel, VariableBounds};
