//! Joint-space sampling within per-variable bound intersections.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use clankers_core::SamplerConfig;
use clankers_core::seed::sampler_rng;
use clankers_model::{RobotState, VariableBounds};

use crate::error::{ConfigureError, SampleError};
use crate::kinematic::JointConstraint;
use crate::msg::Constraints;
use crate::sampler::ConstraintSampler;
use crate::scene::PlanningScene;

/// Samples each constrained variable uniformly in the intersection of its
/// constraint interval(s) and its joint limits.
#[derive(Debug)]
pub struct JointConstraintSampler {
    scene: PlanningScene,
    group: String,
    /// Covered variables, in group order.
    variables: Vec<String>,
    /// Interval per covered variable.
    intervals: Vec<VariableBounds>,
    rng: ChaCha8Rng,
}

impl JointConstraintSampler {
    pub fn new(
        scene: &PlanningScene,
        group: &str,
        config: &SamplerConfig,
    ) -> Result<Self, ConfigureError> {
        if !scene.model().has_group(group) {
            return Err(ConfigureError::UnknownGroup(group.to_string()));
        }
        Ok(Self {
            scene: scene.clone(),
            group: group.to_string(),
            variables: Vec::new(),
            intervals: Vec::new(),
            rng: sampler_rng(config.seed, &format!("joint:{group}")),
        })
    }

    /// Configure from already validated joint constraints.
    ///
    /// Every constraint must name a group variable. Constraints on the same
    /// variable are intersected.
    pub fn configure_joints(&mut self, constraints: &[JointConstraint]) -> Result<(), ConfigureError> {
        self.variables.clear();
        self.intervals.clear();
        let (variables, intervals) = self.intervals_for(constraints)?;
        self.variables = variables;
        self.intervals = intervals;
        Ok(())
    }

    /// Stored interval of a covered variable.
    pub fn interval(&self, variable: &str) -> Option<VariableBounds> {
        self.variables
            .iter()
            .position(|v| v == variable)
            .map(|i| self.intervals[i])
    }

    fn intervals_for(
        &self,
        constraints: &[JointConstraint],
    ) -> Result<(Vec<String>, Vec<VariableBounds>), ConfigureError> {
        let model = self.scene.model();
        let group = model
            .group(&self.group)
            .ok_or_else(|| ConfigureError::UnknownGroup(self.group.clone()))?;
        if constraints.is_empty() {
            return Err(ConfigureError::NoConstraints {
                group: self.group.clone(),
            });
        }

        let mut bounds: Vec<Option<VariableBounds>> = vec![None; group.variables().len()];
        for constraint in constraints {
            let variable = constraint.variable();
            let index = group
                .variables()
                .iter()
                .position(|v| v == variable)
                .ok_or_else(|| ConfigureError::VariableOutsideGroup {
                    group: self.group.clone(),
                    variable: variable.to_string(),
                })?;
            let current = bounds[index]
                .or_else(|| model.variable_bounds(variable))
                .unwrap_or(VariableBounds::UNBOUNDED);
            let requested = constraint.interval();
            let narrowed =
                current
                    .intersect(&requested)
                    .ok_or_else(|| ConfigureError::EmptyInterval {
                        variable: variable.to_string(),
                        min: requested.min,
                        max: requested.max,
                    })?;
            bounds[index] = Some(narrowed);
        }

        Ok(group
            .variables()
            .iter()
            .zip(bounds)
            .filter_map(|(v, b)| b.map(|b| (v.clone(), b)))
            .unzip())
    }

    /// Validated constraints on this sampler's group variables. Constraints
    /// naming other variables are skipped.
    fn group_constraints(&self, constraints: &Constraints) -> Result<Vec<JointConstraint>, ConfigureError> {
        let model = self.scene.model();
        let group = model
            .group(&self.group)
            .ok_or_else(|| ConfigureError::UnknownGroup(self.group.clone()))?;
        constraints
            .joint_constraints
            .iter()
            .filter(|c| group.has_variable(&c.joint_name))
            .map(|c| JointConstraint::new(model, c).map_err(ConfigureError::from))
            .collect()
    }
}

impl ConstraintSampler for JointConstraintSampler {
    fn name(&self) -> &'static str {
        "JointConstraintSampler"
    }

    fn group_name(&self) -> &str {
        &self.group
    }

    fn covered_variables(&self) -> &[String] {
        &self.variables
    }

    fn can_service(&self, constraints: &Constraints) -> bool {
        self.group_constraints(constraints)
            .and_then(|c| self.intervals_for(&c))
            .is_ok()
    }

    fn configure(&mut self, constraints: &Constraints) -> Result<(), ConfigureError> {
        self.variables.clear();
        self.intervals.clear();
        let joint_constraints = self.group_constraints(constraints)?;
        self.configure_joints(&joint_constraints)
    }

    fn is_valid(&self) -> bool {
        !self.variables.is_empty()
    }

    fn sample(&mut self, state: &mut RobotState) -> Result<(), SampleError> {
        if self.variables.is_empty() {
            return Err(SampleError::NotConfigured);
        }
        for (variable, interval) in self.variables.iter().zip(&self.intervals) {
            let value = if interval.min < interval.max {
                self.rng.gen_range(interval.min..=interval.max)
            } else {
                interval.min
            };
            state.set_variable(variable, value);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
