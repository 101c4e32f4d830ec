//! [`KinematicsSolver`] implementation backed by [`DlsSolver`].

use std::collections::HashMap;
use std::sync::Arc;

use clankers_core::{ConfigError, IkSolverConfig, SemanticConfig};
use clankers_model::{
    IkTarget, JointModelGroup, KinematicsSolver, ModelError, RobotModel, RobotState,
    SolverAllocatorFn,
};

use crate::chain::KinematicChain;
use crate::solver::DlsSolver;

/// Solver name groups use in their `solver` field to request DLS IK.
pub const DLS_SOLVER_NAME: &str = "dls";

/// DLS IK bound to one joint group.
///
/// Holds one chain per group link that at least one group variable moves.
/// Joints on a chain that belong to other groups are treated as fixed at
/// their seed values.
#[derive(Debug)]
pub struct DlsKinematicsSolver {
    group: String,
    /// Group variable name -> index in group order.
    variable_index: HashMap<String, usize>,
    chains: HashMap<String, KinematicChain>,
    solver: DlsSolver,
}

impl DlsKinematicsSolver {
    pub fn new(
        model: &RobotModel,
        group: &JointModelGroup,
        config: IkSolverConfig,
    ) -> Result<Self, ModelError> {
        let variable_index = group
            .variables()
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();

        let mut chains = HashMap::new();
        for link in group.links() {
            let chain = KinematicChain::from_model(model, link)?;
            if chain.joints().iter().any(|j| group.has_variable(&j.name)) {
                chains.insert(link.clone(), chain);
            }
        }

        Ok(Self {
            group: group.name().to_string(),
            variable_index,
            chains,
            solver: DlsSolver::new(config),
        })
    }

    /// Chain to `link`, if the group can move it.
    pub fn chain(&self, link: &str) -> Option<&KinematicChain> {
        self.chains.get(link)
    }
}

impl KinematicsSolver for DlsKinematicsSolver {
    fn group_name(&self) -> &str {
        &self.group
    }

    fn supports_link(&self, link: &str) -> bool {
        self.chains.contains_key(link)
    }

    fn solve(
        &self,
        link: &str,
        target: &IkTarget,
        seed: &RobotState,
        locked: &[String],
    ) -> Option<Vec<f64>> {
        let chain = self.chains.get(link)?;

        let active: Vec<bool> = chain
            .joints()
            .iter()
            .map(|j| self.variable_index.contains_key(&j.name) && !locked.contains(&j.name))
            .collect();
        if !active.contains(&true) {
            return None;
        }

        let result = self
            .solver
            .solve(chain, target, &chain.values_from(seed), &active);
        if !result.converged {
            tracing::trace!(
                group = %self.group,
                link,
                position_error = result.position_error,
                orientation_error = result.orientation_error,
                "DLS did not converge"
            );
            return None;
        }

        let mut values = vec![0.0; self.variable_index.len()];
        for (name, &i) in &self.variable_index {
            values[i] = seed.variable(name).unwrap_or(0.0);
        }
        for (joint, &value) in chain.joints().iter().zip(&result.joint_positions) {
            if let Some(&i) = self.variable_index.get(&joint.name) {
                values[i] = value;
            }
        }
        Some(values)
    }
}

/// Allocator that builds a [`DlsKinematicsSolver`] for whatever group it is
/// attached to.
pub fn dls_allocator(config: IkSolverConfig) -> SolverAllocatorFn {
    Arc::new(move |model: &RobotModel, group: &JointModelGroup| {
        match DlsKinematicsSolver::new(model, group, config.clone()) {
            Ok(solver) => Some(Arc::new(solver) as Arc<dyn KinematicsSolver>),
            Err(e) => {
                tracing::warn!(group = group.name(), error = %e, "failed to build DLS solver");
                None
            }
        }
    })
}

/// Attach solver allocators to every group whose declaration names a solver.
///
/// Groups must already be loaded into `model`.
pub fn attach_solvers(
    model: &mut RobotModel,
    semantic: &SemanticConfig,
    config: &IkSolverConfig,
) -> Result<(), ModelError> {
    config.validate()?;
    for group_config in &semantic.groups {
        let Some(solver) = group_config.solver.as_deref() else {
            continue;
        };
        if solver != DLS_SOLVER_NAME {
            return Err(ConfigError::InvalidValue {
                field: format!("groups.{}.solver", group_config.name),
                message: format!("unknown solver '{solver}'"),
            }
            .into());
        }
        let group = model
            .group_mut(&group_config.name)
            .ok_or_else(|| ModelError::UnknownGroup(group_config.name.clone()))?;
        group.set_solver_allocator(dls_allocator(config.clone()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use clankers_model::parse_string;
    use clankers_test_utils::fixtures::{SIX_DOF_ARM, TWO_LINK_ARM};
    use nalgebra::Vector3;

    fn semantic(toml: &str) -> SemanticConfig {
        SemanticConfig::from_toml_str(toml).unwrap()
    }

    fn loaded(urdf: &str, toml: &str) -> RobotModel {
        let mut model = parse_string(urdf).unwrap();
        let config = semantic(toml);
        model.load_groups(&config).unwrap();
        attach_solvers(&mut model, &config, &IkSolverConfig::default()).unwrap();
        model
    }

    const ARM_GROUP: &str = r#"
        [[groups]]
        name = "arm"
        joints = ["shoulder", "elbow", "ee_mount"]
        solver = "dls"
    "#;

    #[test]
    fn attach_and_allocate() {
        let model = loaded(TWO_LINK_ARM, ARM_GROUP);
        let group = model.group("arm").unwrap();
        let solver = group.solver_instance(&model).unwrap();
        assert_eq!(solver.group_name(), "arm");
        assert!(solver.supports_link("end_effector"));
        assert!(solver.supports_link("upper_arm"));
        assert!(!solver.supports_link("base"));
    }

    #[test]
    fn unknown_solver_name_is_rejected() {
        let mut model = parse_string(TWO_LINK_ARM).unwrap();
        let config = semantic(
            r#"
            [[groups]]
            name = "arm"
            joints = ["shoulder", "elbow"]
            solver = "analytic"
            "#,
        );
        model.load_groups(&config).unwrap();
        let err = attach_solvers(&mut model, &config, &IkSolverConfig::default()).unwrap_err();
        assert!(matches!(err, ModelError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn groups_without_solver_stay_bare() {
        let model = loaded(
            TWO_LINK_ARM,
            r#"
            [[groups]]
            name = "arm"
            joints = ["shoulder", "elbow"]
            "#,
        );
        assert!(model.group("arm").unwrap().solver_allocator().is_none());
    }

    #[test]
    fn solve_returns_group_order_values() {
        let model = loaded(TWO_LINK_ARM, ARM_GROUP);
        let group = model.group("arm").unwrap();
        let solver = group.solver_instance(&model).unwrap();

        let mut reference = RobotState::new(&model);
        reference.set_group_values(group, &[0.4, -0.7]);
        let goal = model.link_transform("end_effector", &reference).unwrap();

        let seed = RobotState::new(&model);
        let target = IkTarget::Position {
            point: goal.translation.vector,
            link_offset: Vector3::zeros(),
        };
        let values = solver.solve("end_effector", &target, &seed, &[]).unwrap();
        assert_eq!(values.len(), 2);

        let mut solved = seed.clone();
        solved.set_group_values(group, &values);
        let reached = model.link_transform("end_effector", &solved).unwrap();
        assert_relative_eq!(reached.translation.vector, goal.translation.vector, epsilon = 1e-3);
    }

    #[test]
    fn locked_variables_keep_seed_values() {
        let model = loaded(
            SIX_DOF_ARM,
            r#"
            [[groups]]
            name = "arm"
            joints = ["j1_base_yaw", "j2_shoulder_pitch", "j3_elbow_pitch",
                      "j4_forearm_roll", "j5_wrist_pitch", "j6_wrist_roll"]
            solver = "dls"
            "#,
        );
        let group = model.group("arm").unwrap();
        let solver = group.solver_instance(&model).unwrap();

        let mut seed = RobotState::new(&model);
        seed.set_variable("j1_base_yaw", 0.3);
        let target = IkTarget::Position {
            point: Vector3::new(0.2, 0.1, 0.6),
            link_offset: Vector3::zeros(),
        };
        let locked = vec!["j1_base_yaw".to_string()];
        if let Some(values) = solver.solve("end_effector", &target, &seed, &locked) {
            assert_relative_eq!(values[0], 0.3, epsilon = 1e-15);
        }
    }

    #[test]
    fn everything_locked_fails() {
        let model = loaded(TWO_LINK_ARM, ARM_GROUP);
        let solver = model.group("arm").unwrap().solver_instance(&model).unwrap();
        let seed = RobotState::new(&model);
        let target = IkTarget::Position {
            point: Vector3::new(0.3, 0.2, 0.05),
            link_offset: Vector3::zeros(),
        };
        let locked = vec!["shoulder".to_string(), "elbow".to_string()];
        assert!(solver.solve("end_effector", &target, &seed, &locked).is_none());
    }

    #[test]
    fn unsupported_link_fails() {
        let model = loaded(TWO_LINK_ARM, ARM_GROUP);
        let solver = model.group("arm").unwrap().solver_instance(&model).unwrap();
        let seed = RobotState::new(&model);
        let target = IkTarget::Orientation(nalgebra::UnitQuaternion::identity());
        assert!(solver.solve("base", &target, &seed, &[]).is_none());
    }
}
