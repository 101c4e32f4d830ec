//! Read-only planning scene: the robot model plus named frame transforms.
//!
//! Samplers resolve every constraint frame once, at configure time, and keep
//! the resulting poses. Changing the scene afterwards does not affect an
//! already configured sampler.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Isometry3;

use clankers_model::{RobotModel, RobotState};

use crate::error::SceneError;

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Fixed frames known to the scene, each expressed in the planning frame.
#[derive(Debug, Clone, Default)]
pub struct Transforms {
    planning_frame: String,
    frames: HashMap<String, Isometry3<f64>>,
}

impl Transforms {
    pub fn new(planning_frame: impl Into<String>) -> Self {
        Self {
            planning_frame: planning_frame.into(),
            frames: HashMap::new(),
        }
    }

    pub fn planning_frame(&self) -> &str {
        &self.planning_frame
    }

    /// Register or replace a fixed frame. `pose` is the frame in the
    /// planning frame.
    pub fn set_transform(&mut self, frame: impl Into<String>, pose: Isometry3<f64>) {
        self.frames.insert(frame.into(), pose);
    }

    pub fn is_known(&self, frame: &str) -> bool {
        let frame = normalize(frame);
        frame.is_empty() || frame == self.planning_frame || self.frames.contains_key(frame)
    }

    /// Pose of `frame` in the planning frame.
    ///
    /// The empty frame and the planning frame itself resolve to identity.
    pub fn frame_transform(&self, frame: &str) -> Option<Isometry3<f64>> {
        let frame = normalize(frame);
        if frame.is_empty() || frame == self.planning_frame {
            return Some(Isometry3::identity());
        }
        self.frames.get(frame).copied()
    }
}

fn normalize(frame: &str) -> &str {
    frame.strip_prefix('/').unwrap_or(frame)
}

// ---------------------------------------------------------------------------
// PlanningScene
// ---------------------------------------------------------------------------

/// Immutable snapshot handed to the manager and every sampler it builds.
///
/// Cheap to clone: the model and transforms are shared.
#[derive(Debug, Clone)]
pub struct PlanningScene {
    model: Arc<RobotModel>,
    transforms: Arc<Transforms>,
}

impl PlanningScene {
    /// Scene whose planning frame is the model's root link, with no extra
    /// frames.
    pub fn new(model: Arc<RobotModel>) -> Self {
        let transforms = Transforms::new(model.root_link());
        Self {
            model,
            transforms: Arc::new(transforms),
        }
    }

    pub fn with_transforms(model: Arc<RobotModel>, transforms: Transforms) -> Self {
        Self {
            model,
            transforms: Arc::new(transforms),
        }
    }

    pub fn model(&self) -> &RobotModel {
        &self.model
    }

    pub fn shared_model(&self) -> Arc<RobotModel> {
        Arc::clone(&self.model)
    }

    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    pub fn planning_frame(&self) -> &str {
        self.transforms.planning_frame()
    }

    /// Add a fixed frame. Samplers built from earlier clones keep the old
    /// snapshot.
    pub fn set_frame_transform(&mut self, frame: impl Into<String>, pose: Isometry3<f64>) {
        Arc::make_mut(&mut self.transforms).set_transform(frame, pose);
    }

    /// A state with every variable at its default value.
    pub fn default_state(&self) -> RobotState {
        RobotState::new(&self.model)
    }

    /// Pose of `frame` in the planning frame.
    ///
    /// Scene frames are looked up first. A robot link is accepted only if it
    /// is rigidly attached to the root; links behind an actuated joint move
    /// with the state and are rejected.
    pub fn frame_transform(&self, frame: &str) -> Result<Isometry3<f64>, SceneError> {
        if let Some(pose) = self.transforms.frame_transform(frame) {
            return Ok(pose);
        }
        let link = normalize(frame);
        let Ok(path) = self.model.path_to_link(link) else {
            return Err(SceneError::UnknownFrame(frame.to_string()));
        };
        if path.iter().any(|joint| joint.joint_type.is_actuated()) {
            return Err(SceneError::MovingFrame(frame.to_string()));
        }
        self.model
            .link_transform(link, &self.default_state())
            .map_err(|_| SceneError::UnknownFrame(frame.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
