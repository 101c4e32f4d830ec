//! Error types for robot model loading and queries.

use std::path::PathBuf;

use clankers_core::ConfigError;

/// Errors that can occur while building or querying a [`RobotModel`](crate::RobotModel).
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Failed to read the URDF file.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse URDF XML content.
    #[error("URDF parse error: {0}")]
    Parse(String),

    /// A referenced link was not found in the model.
    #[error("missing link: {0}")]
    MissingLink(String),

    /// A referenced joint was not found in the model.
    #[error("missing joint: {0}")]
    MissingJoint(String),

    /// Invalid or unsupported joint type.
    #[error("unsupported joint type: {0}")]
    UnsupportedJointType(String),

    /// The URDF has no root link (no link that is never a child).
    #[error("no root link found")]
    NoRootLink,

    /// A group name was not declared.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Invalid semantic (group) configuration.
    #[error("group configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
