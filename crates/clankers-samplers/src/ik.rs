//! Task-space sampling through a group's IK solver.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use clankers_core::SamplerConfig;
use clankers_core::seed::sampler_rng;
use clankers_model::{KinematicsSolver, RobotModel, RobotState};

use crate::error::{ConfigureError, SampleError};
use crate::kinematic::IkSamplingPose;
use crate::msg::Constraints;
use crate::sampler::ConstraintSampler;
use crate::scene::PlanningScene;

/// Draws a pose from a goal region on one link and solves IK for it.
pub struct IkConstraintSampler {
    scene: PlanningScene,
    group: String,
    solver: Arc<dyn KinematicsSolver>,
    /// Every group variable, in the order the solver returns them.
    group_variables: Vec<String>,
    /// Variables this sampler writes.
    variables: Vec<String>,
    /// Group variables held at their state values.
    locked: Vec<String>,
    goal: Option<IkSamplingPose>,
    volume: f64,
    attempts: u32,
    validate: bool,
    root_seed: u64,
    rng: ChaCha8Rng,
}

impl IkConstraintSampler {
    /// Allocate the group's solver. Fails if the group is unknown or has no
    /// allocator.
    pub fn new(
        scene: &PlanningScene,
        group: &str,
        config: &SamplerConfig,
    ) -> Result<Self, ConfigureError> {
        let model = scene.model();
        let jmg = model
            .group(group)
            .ok_or_else(|| ConfigureError::UnknownGroup(group.to_string()))?;
        let solver = jmg
            .solver_instance(model)
            .ok_or_else(|| ConfigureError::NoSolver {
                group: group.to_string(),
            })?;

        Ok(Self {
            scene: scene.clone(),
            group: group.to_string(),
            solver,
            group_variables: jmg.variables().to_vec(),
            variables: jmg.variables().to_vec(),
            locked: Vec::new(),
            goal: None,
            volume: 0.0,
            attempts: config.ik_attempts,
            validate: config.validate_ik_solutions,
            root_seed: config.seed,
            rng: sampler_rng(config.seed, &format!("ik:{group}")),
        })
    }

    /// Configure from a pose goal. Fails if the solver cannot reach the
    /// goal's link.
    pub fn configure_pose(&mut self, goal: IkSamplingPose) -> Result<(), ConfigureError> {
        self.goal = None;
        let link = goal.link();
        if !self.solver.supports_link(link) {
            return Err(ConfigureError::UnsupportedLink {
                group: self.group.clone(),
                link: link.to_string(),
            });
        }
        self.volume = goal.volume();
        self.rng = sampler_rng(self.root_seed, &format!("ik:{}:{link}", self.group));
        self.goal = Some(goal);
        Ok(())
    }

    pub fn goal(&self) -> Option<&IkSamplingPose> {
        self.goal.as_ref()
    }

    /// Link the goal constrains.
    pub fn link(&self) -> Option<&str> {
        self.goal.as_ref().map(IkSamplingPose::link)
    }

    /// Variables held at their state values while solving.
    pub fn locked_variables(&self) -> &[String] {
        &self.locked
    }

    /// The single pose goal in `constraints`: one position constraint, one
    /// orientation constraint, or one of each on the same link.
    fn pose_from(&self, constraints: &Constraints) -> Result<IkSamplingPose, ConfigureError> {
        let ambiguous = || ConfigureError::AmbiguousGoal {
            group: self.group.clone(),
        };
        let positions = &constraints.position_constraints;
        let orientations = &constraints.orientation_constraints;
        if positions.len() > 1 || orientations.len() > 1 {
            return Err(ambiguous());
        }
        IkSamplingPose::from_msgs(&self.scene, positions.first(), orientations.first())?
            .ok_or_else(ambiguous)
    }
}

/// Move every bounded free variable to a random value within its limits.
fn randomize<R: Rng + ?Sized>(
    rng: &mut R,
    model: &RobotModel,
    variables: &[String],
    state: &mut RobotState,
) {
    for name in variables {
        if let Some(bounds) = model.variable_bounds(name).filter(|b| b.is_bounded()) {
            state.set_variable(name, rng.gen_range(bounds.min..=bounds.max));
        }
    }
}

impl ConstraintSampler for IkConstraintSampler {
    fn name(&self) -> &'static str {
        "IkConstraintSampler"
    }

    fn group_name(&self) -> &str {
        &self.group
    }

    fn covered_variables(&self) -> &[String] {
        &self.variables
    }

    fn can_service(&self, constraints: &Constraints) -> bool {
        self.pose_from(constraints)
            .is_ok_and(|goal| self.solver.supports_link(goal.link()))
    }

    fn configure(&mut self, constraints: &Constraints) -> Result<(), ConfigureError> {
        self.goal = None;
        let goal = self.pose_from(constraints)?;
        self.configure_pose(goal)
    }

    fn is_valid(&self) -> bool {
        self.goal.is_some()
    }

    fn sample(&mut self, state: &mut RobotState) -> Result<(), SampleError> {
        let Some(goal) = self.goal.as_ref() else {
            return Err(SampleError::NotConfigured);
        };
        let model = self.scene.model();
        let mut scratch = state.clone();

        for attempt in 0..self.attempts {
            if attempt > 0 {
                randomize(&mut self.rng, model, &self.variables, &mut scratch);
            }
            let target = goal.sample_target(&mut self.rng);
            let Some(values) = self.solver.solve(goal.link(), &target, &scratch, &self.locked)
            else {
                continue;
            };
            for (name, value) in self.group_variables.iter().zip(values) {
                if !self.locked.contains(name) {
                    scratch.set_variable(name, value);
                }
            }
            if self.validate && !goal.decide(model, &scratch) {
                continue;
            }
            for name in &self.variables {
                if let Some(value) = scratch.variable(name) {
                    state.set_variable(name, value);
                }
            }
            return Ok(());
        }

        Err(SampleError::IkExhausted {
            attempts: self.attempts,
        })
    }

    fn sampling_volume(&self) -> Option<f64> {
        self.goal.as_ref().map(|_| self.volume)
    }

    fn seeds_from_state(&self) -> bool {
        true
    }

    fn release_variables(&mut self, claimed: &HashSet<String>) -> bool {
        let (released, kept): (Vec<String>, Vec<String>) = self
            .variables
            .iter()
            .cloned()
            .partition(|v| claimed.contains(v));
        if released.is_empty() {
            return true;
        }
        if kept.is_empty() {
            return false;
        }
        self.locked.extend(released);
        self.variables = kept;
        true
    }
}

impl fmt::Debug for IkConstraintSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IkConstraintSampler")
            .field("group", &self.group)
            .field("link", &self.link())
            .field("variables", &self.variables)
            .field("locked", &self.locked)
            .field("volume", &self.volume)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg;
    use approx::assert_relative_eq;
    use clankers_core::IkSolverConfig;
    use clankers_test_utils::fixtures::body_model;
    use clankers_test_utils::{MockBehavior, MockSolver, mock_allocator, shared_allocator};

    fn no_validation() -> SamplerConfig {
        SamplerConfig {
            validate_ik_solutions: false,
            ..SamplerConfig::default()
        }
    }

    fn mock_scene(group: &str, behavior: MockBehavior) -> PlanningScene {
        let (mut model, _) = body_model();
        model
            .group_mut(group)
            .unwrap()
            .set_solver_allocator(mock_allocator(behavior));
        PlanningScene::new(Arc::new(model))
    }

    fn dls_scene() -> PlanningScene {
        let (mut model, semantic) = body_model();
        clankers_ik::attach_solvers(&mut model, &semantic, &IkSolverConfig::default()).unwrap();
        PlanningScene::new(Arc::new(model))
    }

    fn position_goal(scene: &PlanningScene, link: &str, center: [f64; 3], radius: f64) -> IkSamplingPose {
        IkSamplingPose::from_msgs(
            scene,
            Some(&msg::PositionConstraint::sphere(link, center, radius)),
            None,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn group_without_solver_is_rejected() {
        let scene = mock_scene("arm", MockBehavior::EchoSeed);
        let err = IkConstraintSampler::new(&scene, "body", &SamplerConfig::default()).unwrap_err();
        assert_eq!(err, ConfigureError::NoSolver { group: "body".into() });
    }

    #[test]
    fn unsupported_link_is_rejected() {
        let scene = mock_scene("arm", MockBehavior::EchoSeed);
        let mut s = IkConstraintSampler::new(&scene, "arm", &SamplerConfig::default()).unwrap();
        let err = s
            .configure_pose(position_goal(&scene, "palm", [0.0; 3], 0.1))
            .unwrap_err();
        assert!(matches!(err, ConfigureError::UnsupportedLink { .. }));
        assert!(!s.is_valid());
        assert!(s.sampling_volume().is_none());
    }

    #[test]
    fn volume_is_fixed_at_configure() {
        let scene = mock_scene("arm", MockBehavior::EchoSeed);
        let mut s = IkConstraintSampler::new(&scene, "arm", &SamplerConfig::default()).unwrap();
        s.configure_pose(position_goal(&scene, "wrist", [0.0, 0.2, 1.0], 0.1))
            .unwrap();
        let expected = 4.0 / 3.0 * std::f64::consts::PI * 0.001;
        assert_relative_eq!(s.sampling_volume().unwrap(), expected, epsilon = 1e-12);
        assert_eq!(s.link(), Some("wrist"));

        let mut state = scene.default_state();
        for _ in 0..5 {
            let _ = s.sample(&mut state);
        }
        assert_relative_eq!(s.sampling_volume().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn generic_configure_needs_a_single_goal() {
        let scene = mock_scene("arm", MockBehavior::EchoSeed);
        let mut s = IkConstraintSampler::new(&scene, "arm", &SamplerConfig::default()).unwrap();

        let mut c = Constraints::default();
        assert!(!s.can_service(&c));

        c.position_constraints
            .push(msg::PositionConstraint::sphere("wrist", [0.0, 0.2, 1.0], 0.1));
        c.orientation_constraints.push(msg::OrientationConstraint::new(
            "wrist",
            [0.0, 0.0, 0.0, 1.0],
            [0.1; 3],
        ));
        assert!(s.can_service(&c));
        s.configure(&c).unwrap();
        assert!(s.goal().unwrap().orientation().is_some());

        c.position_constraints
            .push(msg::PositionConstraint::sphere("forearm", [0.0, 0.2, 1.0], 0.1));
        assert!(!s.can_service(&c));
        assert!(matches!(s.configure(&c), Err(ConfigureError::AmbiguousGoal { .. })));
        assert!(!s.is_valid());
    }

    #[test]
    fn failing_solver_exhausts_attempts() {
        let (mut model, _) = body_model();
        let solver = Arc::new(MockSolver::for_group(
            model.group("arm").unwrap(),
            MockBehavior::Fail,
        ));
        model
            .group_mut("arm")
            .unwrap()
            .set_solver_allocator(shared_allocator(Arc::clone(&solver)));
        let scene = PlanningScene::new(Arc::new(model));

        let config = SamplerConfig {
            ik_attempts: 4,
            ..SamplerConfig::default()
        };
        let mut s = IkConstraintSampler::new(&scene, "arm", &config).unwrap();
        s.configure_pose(position_goal(&scene, "wrist", [0.0, 0.2, 1.0], 0.1))
            .unwrap();

        let mut state = scene.default_state();
        assert_eq!(
            s.sample(&mut state),
            Err(SampleError::IkExhausted { attempts: 4 })
        );
        assert_eq!(solver.call_count(), 4);
        assert_eq!(solver.requested_links(), vec!["wrist".to_string()]);
    }

    #[test]
    fn solution_is_written_to_covered_variables_only() {
        let scene = mock_scene("arm", MockBehavior::Constant(1));
        let mut s = IkConstraintSampler::new(&scene, "arm", &no_validation()).unwrap();
        s.configure_pose(position_goal(&scene, "wrist", [0.0, 0.2, 1.0], 0.1))
            .unwrap();

        let mut state = scene.default_state();
        state.set_variable("torso_yaw", 0.25);
        s.sample(&mut state).unwrap();
        assert_eq!(state.variable("shoulder_pitch"), Some(1.0));
        assert_eq!(state.variable("elbow_pitch"), Some(1.0));
        assert_eq!(state.variable("torso_yaw"), Some(0.25));
    }

    #[test]
    fn release_locks_claimed_variables() {
        let scene = mock_scene("manipulator", MockBehavior::Constant(1));
        let mut s = IkConstraintSampler::new(&scene, "manipulator", &no_validation()).unwrap();
        s.configure_pose(position_goal(&scene, "tool", [0.3, 0.2, 1.2], 0.1))
            .unwrap();

        let claimed: HashSet<String> = ["torso_yaw".to_string()].into();
        assert!(s.release_variables(&claimed));
        assert_eq!(s.locked_variables(), &["torso_yaw"]);
        assert!(!s.covered_variables().contains(&"torso_yaw".to_string()));

        let mut state = scene.default_state();
        state.set_variable("torso_yaw", -0.5);
        s.sample(&mut state).unwrap();
        assert_eq!(state.variable("torso_yaw"), Some(-0.5));
        assert_eq!(state.variable("wrist_roll"), Some(1.0));
    }

    #[test]
    fn release_of_everything_is_refused() {
        let scene = mock_scene("arm", MockBehavior::EchoSeed);
        let mut s = IkConstraintSampler::new(&scene, "arm", &SamplerConfig::default()).unwrap();
        let claimed: HashSet<String> =
            ["shoulder_pitch".to_string(), "elbow_pitch".to_string()].into();
        assert!(!s.release_variables(&claimed));
        assert_eq!(s.covered_variables().len(), 2);
        assert!(s.locked_variables().is_empty());

        let unrelated: HashSet<String> = ["wrist_roll".to_string()].into();
        assert!(s.release_variables(&unrelated));
        assert_eq!(s.covered_variables().len(), 2);
    }

    #[test]
    fn dls_samples_satisfy_the_goal() {
        let scene = dls_scene();
        let model = scene.model();

        // A point the manipulator reaches with torso, shoulder and elbow.
        let mut reference = scene.default_state();
        reference.set_variable("torso_yaw", 0.3);
        reference.set_variable("shoulder_pitch", 0.5);
        reference.set_variable("elbow_pitch", 0.7);
        let wrist = model.link_transform("wrist", &reference).unwrap().translation.vector;

        let mut s = IkConstraintSampler::new(&scene, "manipulator", &SamplerConfig::default()).unwrap();
        let goal = position_goal(&scene, "wrist", [wrist.x, wrist.y, wrist.z], 0.02);
        s.configure_pose(goal.clone()).unwrap();

        let mut state = scene.default_state();
        let mut successes = 0;
        for _ in 0..20 {
            if s.sample(&mut state).is_ok() {
                successes += 1;
                assert!(goal.decide(model, &state));
            }
        }
        assert!(successes > 0);
    }
}
