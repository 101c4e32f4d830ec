//! Mock IK solvers for testing sampler selection and composition.
//!
//! [`MockSolver`] answers every request with a scripted [`MockBehavior`] and
//! records what it was asked, so tests can assert which links reached which
//! group's solver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use clankers_model::{
    IkTarget, JointModelGroup, KinematicsSolver, RobotModel, RobotState, SolverAllocatorFn,
};

/// How a [`MockSolver`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Succeed, returning the seed's values for every group variable.
    EchoSeed,
    /// Succeed, returning this value for every unlocked variable.
    Constant(i32),
    /// Always fail.
    Fail,
}

/// A [`KinematicsSolver`] with scripted answers.
#[derive(Debug)]
pub struct MockSolver {
    group: String,
    variables: Vec<String>,
    links: HashSet<String>,
    behavior: MockBehavior,
    requests: Mutex<Vec<(String, IkTarget)>>,
}

impl MockSolver {
    /// Solver for `group` that accepts every group link.
    pub fn for_group(group: &JointModelGroup, behavior: MockBehavior) -> Self {
        Self {
            group: group.name().to_string(),
            variables: group.variables().to_vec(),
            links: group.links().iter().cloned().collect(),
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every `(link, target)` this solver was asked to solve, in call order.
    pub fn requests(&self) -> Vec<(String, IkTarget)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Links this solver was asked about, deduplicated in first-seen order.
    pub fn requested_links(&self) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for (link, _) in self.requests() {
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl KinematicsSolver for MockSolver {
    fn group_name(&self) -> &str {
        &self.group
    }

    fn supports_link(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    fn solve(
        &self,
        link: &str,
        target: &IkTarget,
        seed: &RobotState,
        locked: &[String],
    ) -> Option<Vec<f64>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((link.to_string(), target.clone()));

        let seed_value = |name: &String| seed.variable(name).unwrap_or(0.0);
        match self.behavior {
            MockBehavior::Fail => None,
            MockBehavior::EchoSeed => Some(self.variables.iter().map(seed_value).collect()),
            MockBehavior::Constant(value) => Some(
                self.variables
                    .iter()
                    .map(|name| {
                        if locked.contains(name) {
                            seed_value(name)
                        } else {
                            f64::from(value)
                        }
                    })
                    .collect(),
            ),
        }
    }
}

/// Allocator that builds a fresh [`MockSolver`] for whichever group asks.
pub fn mock_allocator(behavior: MockBehavior) -> SolverAllocatorFn {
    Arc::new(move |_: &RobotModel, group: &JointModelGroup| {
        Some(Arc::new(MockSolver::for_group(group, behavior)) as Arc<dyn KinematicsSolver>)
    })
}

/// Allocator that always hands out the same solver instance, so the test
/// keeps a handle to inspect its requests.
pub fn shared_allocator(solver: Arc<MockSolver>) -> SolverAllocatorFn {
    Arc::new(move |_: &RobotModel, _: &JointModelGroup| {
        Some(Arc::clone(&solver) as Arc<dyn KinematicsSolver>)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::body_model;
    use nalgebra::UnitQuaternion;

    fn any_target() -> IkTarget {
        IkTarget::Orientation(UnitQuaternion::identity())
    }

    #[test]
    fn echo_returns_seed_values() {
        let (model, _) = body_model();
        let arm = model.group("arm").unwrap();
        let solver = MockSolver::for_group(arm, MockBehavior::EchoSeed);

        let mut seed = RobotState::new(&model);
        seed.set_variable("elbow_pitch", 0.7);
        let values = solver.solve("forearm", &any_target(), &seed, &[]).unwrap();
        assert_eq!(values, vec![0.0, 0.7]);
        assert_eq!(solver.call_count(), 1);
        assert_eq!(solver.requested_links(), vec!["forearm".to_string()]);
    }

    #[test]
    fn constant_respects_locked_variables() {
        let (model, _) = body_model();
        let arm = model.group("arm").unwrap();
        let solver = MockSolver::for_group(arm, MockBehavior::Constant(1));

        let seed = RobotState::new(&model);
        let locked = vec!["shoulder_pitch".to_string()];
        let values = solver.solve("wrist", &any_target(), &seed, &locked).unwrap();
        assert_eq!(values, vec![0.0, 1.0]);
    }

    #[test]
    fn fail_records_and_fails() {
        let (model, _) = body_model();
        let hand = model.group("hand").unwrap();
        let solver = MockSolver::for_group(hand, MockBehavior::Fail);
        assert!(solver.supports_link("palm"));
        assert!(!solver.supports_link("forearm"));

        let seed = RobotState::new(&model);
        assert!(solver.solve("palm", &any_target(), &seed, &[]).is_none());
        assert_eq!(solver.call_count(), 1);
    }

    #[test]
    fn shared_allocator_hands_out_one_instance() {
        let (mut model, _) = body_model();
        let solver = Arc::new(MockSolver::for_group(
            model.group("arm").unwrap(),
            MockBehavior::EchoSeed,
        ));
        model
            .group_mut("arm")
            .unwrap()
            .set_solver_allocator(shared_allocator(Arc::clone(&solver)));

        let arm = model.group("arm").unwrap();
        let allocated = arm.solver_instance(&model).unwrap();
        let seed = RobotState::new(&model);
        allocated.solve("wrist", &any_target(), &seed, &[]);
        assert_eq!(solver.call_count(), 1);
    }
}
