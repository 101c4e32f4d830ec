//! Composite sampler over members with disjoint variables.

use std::collections::HashSet;

use clankers_model::RobotState;

use crate::error::{ConfigureError, SampleError};
use crate::msg::Constraints;
use crate::sampler::ConstraintSampler;

/// A member dropped at composition because it overlapped earlier members
/// and could not release the shared variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedMember {
    pub sampler: &'static str,
    pub group: String,
    /// The member's variables that were already claimed.
    pub overlap: Vec<String>,
}

/// Runs its members in order against one state.
///
/// Members that don't read the state (joint samplers) run first; among the
/// rest the given order is kept. No two retained members write the same
/// variable.
pub struct UnionConstraintSampler {
    group: String,
    members: Vec<Box<dyn ConstraintSampler>>,
    excluded: Vec<ExcludedMember>,
    variables: Vec<String>,
}

impl UnionConstraintSampler {
    pub fn new(group: impl Into<String>, members: Vec<Box<dyn ConstraintSampler>>) -> Self {
        let mut union = Self {
            group: group.into(),
            members: Vec::new(),
            excluded: Vec::new(),
            variables: Vec::new(),
        };
        union.compose(members);
        union
    }

    fn compose(&mut self, mut candidates: Vec<Box<dyn ConstraintSampler>>) {
        candidates.sort_by_key(|m| m.seeds_from_state());

        let mut claimed: HashSet<String> = HashSet::new();
        for mut member in candidates {
            let overlap: Vec<String> = member
                .covered_variables()
                .iter()
                .filter(|v| claimed.contains(*v))
                .cloned()
                .collect();
            if !overlap.is_empty() && !member.release_variables(&claimed) {
                tracing::warn!(
                    group = %self.group,
                    member = member.name(),
                    member_group = member.group_name(),
                    ?overlap,
                    "excluding union member that overlaps earlier members"
                );
                self.excluded.push(ExcludedMember {
                    sampler: member.name(),
                    group: member.group_name().to_string(),
                    overlap,
                });
                continue;
            }
            for v in member.covered_variables() {
                claimed.insert(v.clone());
                self.variables.push(v.clone());
            }
            self.members.push(member);
        }
    }

    pub fn members(&self) -> &[Box<dyn ConstraintSampler>] {
        &self.members
    }

    pub fn excluded(&self) -> &[ExcludedMember] {
        &self.excluded
    }

    /// Names of the retained members, in sampling order.
    pub fn member_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|m| m.name()).collect()
    }
}

impl ConstraintSampler for UnionConstraintSampler {
    fn name(&self) -> &'static str {
        "UnionConstraintSampler"
    }

    fn group_name(&self) -> &str {
        &self.group
    }

    fn covered_variables(&self) -> &[String] {
        &self.variables
    }

    fn can_service(&self, constraints: &Constraints) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.can_service(constraints))
    }

    /// Reconfigure every member in turn, then recompose.
    fn configure(&mut self, constraints: &Constraints) -> Result<(), ConfigureError> {
        let mut members = std::mem::take(&mut self.members);
        self.variables.clear();
        self.excluded.clear();

        let mut result = Ok(());
        for member in &mut members {
            if let Err(e) = member.configure(constraints) {
                result = Err(e);
                break;
            }
        }
        self.compose(members);
        result?;

        if self.members.is_empty() {
            return Err(ConfigureError::NoMembers {
                group: self.group.clone(),
            });
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.is_valid())
    }

    fn sample(&mut self, state: &mut RobotState) -> Result<(), SampleError> {
        if self.members.is_empty() {
            return Err(SampleError::NotConfigured);
        }
        for member in &mut self.members {
            member.sample(state)?;
        }
        Ok(())
    }

    fn seeds_from_state(&self) -> bool {
        self.members.iter().any(|m| m.seeds_from_state())
    }
}

impl std::fmt::Debug for UnionConstraintSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionConstraintSampler")
            .field("group", &self.group)
            .field("members", &self.member_names())
            .field("excluded", &self.excluded)
            .field("variables", &self.variables)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::JointConstraintSampler;
    use crate::msg;
    use crate::scene::PlanningScene;
    use clankers_core::SamplerConfig;
    use clankers_test_utils::fixtures::body_model;
    use std::sync::Arc;

    /// Writes a fixed value into its variables.
    struct Fixed {
        name: &'static str,
        variables: Vec<String>,
        value: f64,
        fails: bool,
        reads_state: bool,
    }

    impl Fixed {
        fn boxed(variables: &[&str], value: f64) -> Box<dyn ConstraintSampler> {
            Box::new(Self {
                name: "Fixed",
                variables: variables.iter().map(ToString::to_string).collect(),
                value,
                fails: false,
                reads_state: false,
            })
        }
    }

    impl ConstraintSampler for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn group_name(&self) -> &str {
            "body"
        }
        fn covered_variables(&self) -> &[String] {
            &self.variables
        }
        fn can_service(&self, _: &Constraints) -> bool {
            true
        }
        fn configure(&mut self, _: &Constraints) -> Result<(), ConfigureError> {
            Ok(())
        }
        fn is_valid(&self) -> bool {
            true
        }
        fn sample(&mut self, state: &mut RobotState) -> Result<(), SampleError> {
            if self.fails {
                return Err(SampleError::IkExhausted { attempts: 1 });
            }
            for v in &self.variables {
                state.set_variable(v, self.value);
            }
            Ok(())
        }
        fn seeds_from_state(&self) -> bool {
            self.reads_state
        }
    }

    fn scene() -> PlanningScene {
        PlanningScene::new(Arc::new(body_model().0))
    }

    #[test]
    fn disjoint_members_all_apply() {
        let scene = scene();
        let mut union = UnionConstraintSampler::new(
            "body",
            vec![
                Fixed::boxed(&["torso_yaw"], 0.1),
                Fixed::boxed(&["shoulder_pitch", "elbow_pitch"], 0.2),
                Fixed::boxed(&["wrist_roll"], 0.3),
            ],
        );
        assert!(union.excluded().is_empty());
        assert_eq!(union.covered_variables().len(), 4);

        let mut state = scene.default_state();
        for _ in 0..10 {
            union.sample(&mut state).unwrap();
            assert_eq!(state.variable("torso_yaw"), Some(0.1));
            assert_eq!(state.variable("elbow_pitch"), Some(0.2));
            assert_eq!(state.variable("wrist_roll"), Some(0.3));
        }
    }

    #[test]
    fn overlapping_member_is_excluded() {
        let union = UnionConstraintSampler::new(
            "body",
            vec![
                Fixed::boxed(&["torso_yaw", "shoulder_pitch"], 0.1),
                Fixed::boxed(&["shoulder_pitch", "elbow_pitch"], 0.2),
                Fixed::boxed(&["wrist_roll"], 0.3),
            ],
        );
        assert_eq!(union.members().len(), 2);
        assert_eq!(
            union.excluded(),
            &[ExcludedMember {
                sampler: "Fixed",
                group: "body".into(),
                overlap: vec!["shoulder_pitch".into()],
            }]
        );
        assert_eq!(
            union.covered_variables(),
            &["torso_yaw", "shoulder_pitch", "wrist_roll"]
        );
    }

    #[test]
    fn state_readers_run_last() {
        let reader = Box::new(Fixed {
            name: "Reader",
            variables: vec!["wrist_pitch".into()],
            value: 0.0,
            fails: false,
            reads_state: true,
        });
        let union = UnionConstraintSampler::new(
            "body",
            vec![reader, Fixed::boxed(&["torso_yaw"], 0.1)],
        );
        assert_eq!(union.member_names(), vec!["Fixed", "Reader"]);
        assert!(union.seeds_from_state());
    }

    #[test]
    fn first_failure_short_circuits() {
        let scene = scene();
        let failing = Box::new(Fixed {
            name: "Failing",
            variables: vec!["shoulder_pitch".into()],
            value: 0.0,
            fails: true,
            reads_state: false,
        });
        let mut union = UnionConstraintSampler::new(
            "body",
            vec![failing, Fixed::boxed(&["torso_yaw"], 0.7)],
        );
        let mut state = scene.default_state();
        assert_eq!(
            union.sample(&mut state),
            Err(SampleError::IkExhausted { attempts: 1 })
        );
        assert_eq!(state.variable("torso_yaw"), Some(0.0));
    }

    #[test]
    fn empty_union_is_not_valid() {
        let scene = scene();
        let mut union = UnionConstraintSampler::new("body", Vec::new());
        assert!(!union.is_valid());
        let mut state = scene.default_state();
        assert_eq!(union.sample(&mut state), Err(SampleError::NotConfigured));
        assert!(matches!(
            union.configure(&Constraints::default()),
            Err(ConfigureError::NoMembers { .. })
        ));
    }

    #[test]
    fn configure_reconfigures_members() {
        let scene = scene();
        let config = SamplerConfig::default();
        let joint = |group: &str| {
            Box::new(JointConstraintSampler::new(&scene, group, &config).unwrap())
                as Box<dyn ConstraintSampler>
        };
        let mut union = UnionConstraintSampler::new("body", vec![joint("arm"), joint("hand")]);
        assert!(!union.is_valid());

        let constraints = Constraints {
            joint_constraints: vec![
                msg::JointConstraint::new("elbow_pitch", 0.5, 0.1),
                msg::JointConstraint::new("wrist_roll", -0.5, 0.1),
            ],
            ..Constraints::default()
        };
        assert!(union.can_service(&constraints));
        union.configure(&constraints).unwrap();
        assert!(union.is_valid());
        assert_eq!(union.covered_variables(), &["elbow_pitch", "wrist_roll"]);

        let mut state = scene.default_state();
        union.sample(&mut state).unwrap();
        let elbow = state.variable("elbow_pitch").unwrap();
        let roll = state.variable("wrist_roll").unwrap();
        assert!((0.4..=0.6).contains(&elbow));
        assert!((-0.6..=-0.4).contains(&roll));
    }
}
