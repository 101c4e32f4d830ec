//! Error types for constraint construction, sampler configuration and
//! sampling.
//!
//! None of these abort a selection: the manager reports configure errors as
//! decision events and moves on, and planners simply retry on
//! [`SampleError`].

use thiserror::Error;

/// A frame could not be resolved against the scene.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(String),

    #[error("Frame {0} is a robot link that moves with the state")]
    MovingFrame(String),
}

/// A constraint message could not be turned into a usable constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    #[error("Unknown joint variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown link: {0}")]
    UnknownLink(String),

    #[error("Invalid tolerance for {name}: {message}")]
    InvalidTolerance { name: String, message: String },

    #[error("Position constraint on {link} has no regions")]
    NoRegions { link: String },

    #[error("Invalid region on {link}: {message}")]
    InvalidRegion { link: String, message: String },

    #[error("Zero quaternion in constraint on {link}")]
    ZeroQuaternion { link: String },

    #[error("Position constraint on {position} paired with orientation constraint on {orientation}")]
    LinkMismatch {
        position: String,
        orientation: String,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// A sampler could not be configured for the given constraints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigureError {
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("No constraint applies to group {group}")]
    NoConstraints { group: String },

    #[error("Variable {variable} is not part of group {group}")]
    VariableOutsideGroup { group: String, variable: String },

    #[error("Empty interval for {variable}: [{min}, {max}] misses the joint limits")]
    EmptyInterval { variable: String, min: f64, max: f64 },

    #[error("Group {group} has no IK solver")]
    NoSolver { group: String },

    #[error("IK solver for group {group} cannot solve for link {link}")]
    UnsupportedLink { group: String, link: String },

    #[error("Constraint set is not a single pose goal for group {group}")]
    AmbiguousGoal { group: String },

    #[error("Union for group {group} has no members")]
    NoMembers { group: String },

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

/// A `sample` call did not produce a state.
///
/// Implements [`Copy`] for cheap propagation on the sampling hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("Sampler is not configured")]
    NotConfigured,

    #[error("IK found no valid solution in {attempts} attempts")]
    IkExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_error_converts_into_constraint_error() {
        let err: ConstraintError = SceneError::UnknownFrame("table".into()).into();
        assert_eq!(err.to_string(), "Unknown frame: table");
    }

    #[test]
    fn configure_error_wraps_constraint_error() {
        let err: ConfigureError = ConstraintError::UnknownLink("gripper".into()).into();
        assert!(matches!(err, ConfigureError::Constraint(_)));
        assert_eq!(err.to_string(), "Unknown link: gripper");
    }

    #[test]
    fn sample_error_messages() {
        assert_eq!(
            SampleError::IkExhausted { attempts: 10 }.to_string(),
            "IK found no valid solution in 10 attempts"
        );
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn errors_are_send_sync() {
        assert_send_sync::<SceneError>();
        assert_send_sync::<ConstraintError>();
        assert_send_sync::<ConfigureError>();
        assert_send_sync::<SampleError>();
    }
}
