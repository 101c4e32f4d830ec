//! Constraint sampler selection for Clankers joint groups.
//!
//! Given a [`Constraints`] set and a group name, [`ConstraintSamplerManager`]
//! builds a sampler that repeatedly draws robot states satisfying the
//! constraints:
//!
//! - [`JointConstraintSampler`] for joint-space bounds,
//! - [`IkConstraintSampler`] for a position and/or orientation goal on one
//!   link, resolved through the group's IK solver,
//! - [`UnionConstraintSampler`] composing samplers over disjoint variables.
//!
//! # Architecture
//!
//! ```text
//! Constraints ──► ConstraintSamplerManager ──┬─► registered allocators
//!                        │                   └─► joint pass ─► IK pass ─► subgroups
//!                        │
//!                        ├──► DecisionObserver (events)
//!                        └──► Box<dyn ConstraintSampler> ──► sample(&mut RobotState)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clankers_core::SamplerConfig;
//! use clankers_samplers::prelude::*;
//!
//! # fn run(model: clankers_model::RobotModel) {
//! let scene = PlanningScene::new(Arc::new(model));
//! let manager = ConstraintSamplerManager::new(SamplerConfig::default());
//! let constraints = Constraints {
//!     joint_constraints: vec![JointConstraintMsg::new("elbow", 0.5, 0.1)],
//!     ..Constraints::default()
//! };
//! if let Some(mut sampler) = manager.select_sampler(&scene, "arm", &constraints) {
//!     let mut state = scene.default_state();
//!     sampler.sample(&mut state).ok();
//! }
//! # }
//! ```

pub mod error;
pub mod events;
pub mod ik;
pub mod joint;
pub mod kinematic;
pub mod manager;
pub mod msg;
pub mod sampler;
pub mod scene;
pub mod union;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{ConfigureError, ConstraintError, SampleError, SceneError};
pub use events::{DecisionEvent, DecisionObserver, GoalKind, RecordingObserver, TracingObserver};
pub use ik::IkConstraintSampler;
pub use joint::JointConstraintSampler;
pub use kinematic::IkSamplingPose;
pub use manager::ConstraintSamplerManager;
pub use msg::Constraints;
pub use sampler::{ConstraintSampler, ConstraintSamplerAllocator};
pub use scene::{PlanningScene, Transforms};
pub use union::{ExcludedMember, UnionConstraintSampler};

pub mod prelude {
    pub use crate::msg::{
        Constraints, JointConstraint as JointConstraintMsg, OrientationConstraint, Pose,
        PositionConstraint, Primitive, Region,
    };
    pub use crate::{
        ConstraintSampler, ConstraintSamplerAllocator, ConstraintSamplerManager, DecisionEvent,
        DecisionObserver, IkConstraintSampler, JointConstraintSampler, PlanningScene,
        RecordingObserver, SampleError, TracingObserver, UnionConstraintSampler,
    };
}
