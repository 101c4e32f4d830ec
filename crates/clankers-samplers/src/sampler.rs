//! Sampler and allocator traits.
//!
//! The manager and [`UnionConstraintSampler`](crate::union::UnionConstraintSampler)
//! only ever see samplers through [`ConstraintSampler`].

use std::collections::HashSet;

use clankers_core::SamplerConfig;
use clankers_model::RobotState;

use crate::error::{ConfigureError, SampleError};
use crate::msg::Constraints;
use crate::scene::PlanningScene;

/// Draws robot states that satisfy a configured set of constraints.
///
/// Samplers are built per selection call, owned by the caller and used from
/// one thread; the only state that changes between `sample` calls is the
/// sampler's own RNG.
pub trait ConstraintSampler: Send {
    /// Short type name, used in decision events.
    fn name(&self) -> &'static str;

    /// Group whose variables this sampler writes.
    fn group_name(&self) -> &str;

    /// Variables `sample` writes. Every other variable is left untouched.
    fn covered_variables(&self) -> &[String];

    /// Whether `configure` would accept this constraint set.
    fn can_service(&self, constraints: &Constraints) -> bool;

    /// (Re)configure from a constraint set.
    fn configure(&mut self, constraints: &Constraints) -> Result<(), ConfigureError>;

    /// Whether the last configuration succeeded.
    fn is_valid(&self) -> bool;

    /// Write one draw into `state`.
    ///
    /// On failure `state` may be partially written and must not be used.
    fn sample(&mut self, state: &mut RobotState) -> Result<(), SampleError>;

    /// Tolerance-extent measure for task-space samplers. Only used to rank
    /// candidates.
    fn sampling_volume(&self) -> Option<f64> {
        None
    }

    /// Whether `sample` reads variables other samplers write. Such samplers
    /// run after those that don't when composed.
    fn seeds_from_state(&self) -> bool {
        false
    }

    /// Stop writing the variables in `claimed` and keep them at whatever
    /// value the state holds.
    ///
    /// Returns `false` if the sampler cannot do that, or would be left with
    /// no variables; the sampler is unchanged in that case.
    fn release_variables(&mut self, claimed: &HashSet<String>) -> bool {
        let _ = claimed;
        false
    }
}

/// A pluggable source of samplers, consulted before the built-in selection.
pub trait ConstraintSamplerAllocator: Send + Sync {
    /// Whether this allocator wants to handle the request.
    fn can_service(&self, scene: &PlanningScene, group: &str, constraints: &Constraints) -> bool;

    /// Build a configured sampler. `None` means no sampler, not "try the
    /// next allocator".
    fn alloc(
        &self,
        scene: &PlanningScene,
        group: &str,
        constraints: &Constraints,
        config: &SamplerConfig,
    ) -> Option<Box<dyn ConstraintSampler>>;
}
