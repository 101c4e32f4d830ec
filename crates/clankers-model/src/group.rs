//! Named joint groups.
//!
//! A [`JointModelGroup`] is the unit the samplers work on: an ordered list of
//! joint variables, the links those joints move, optional nested groups and
//! an optional IK solver allocator.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use clankers_core::GroupConfig;

use crate::error::ModelError;
use crate::solver::{KinematicsSolver, SolverAllocatorFn};
use crate::types::{JointType, RobotModel, VariableBounds};

/// A named, ordered subset of a robot's joint variables.
#[derive(Clone)]
pub struct JointModelGroup {
    name: String,
    variables: Vec<String>,
    variable_set: HashSet<String>,
    links: Vec<String>,
    link_set: HashSet<String>,
    subgroups: Vec<String>,
    solver: Option<SolverAllocatorFn>,
}

impl JointModelGroup {
    /// Build a group from its declared joints.
    ///
    /// Variables are the actuated joints in declared order. Links are the
    /// child links of every declared joint plus any links rigidly attached
    /// below them through fixed joints.
    pub fn from_config(model: &RobotModel, config: &GroupConfig) -> Result<Self, ModelError> {
        let mut variables = Vec::new();
        let mut links = Vec::new();
        let mut link_set = HashSet::new();

        for joint_name in &config.joints {
            let joint = model.joint(joint_name)?;
            if joint.joint_type.is_actuated() && !variables.contains(&joint.name) {
                variables.push(joint.name.clone());
            }
            collect_rigid_links(model, &joint.child, &mut links, &mut link_set);
        }

        Ok(Self {
            name: config.name.clone(),
            variable_set: variables.iter().cloned().collect(),
            variables,
            links,
            link_set,
            subgroups: config.subgroups.clone(),
            solver: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joint variables in group order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variable_set.contains(name)
    }

    /// Links moved by this group.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.link_set.contains(name)
    }

    /// Declared subgroup names.
    pub fn subgroups(&self) -> &[String] {
        &self.subgroups
    }

    /// Native bounds for every group variable, in group order.
    pub fn variable_bounds(&self, model: &RobotModel) -> Vec<VariableBounds> {
        self.variables
            .iter()
            .map(|v| {
                model
                    .variable_bounds(v)
                    .unwrap_or(VariableBounds::UNBOUNDED)
            })
            .collect()
    }

    pub fn solver_allocator(&self) -> Option<&SolverAllocatorFn> {
        self.solver.as_ref()
    }

    pub fn set_solver_allocator(&mut self, allocator: SolverAllocatorFn) {
        self.solver = Some(allocator);
    }

    /// Allocate a solver instance for this group, if it has an allocator.
    pub fn solver_instance(&self, model: &RobotModel) -> Option<Arc<dyn KinematicsSolver>> {
        self.solver.as_ref().and_then(|alloc| alloc(model, self))
    }
}

impl fmt::Debug for JointModelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JointModelGroup")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("links", &self.links)
            .field("subgroups", &self.subgroups)
            .field("has_solver", &self.solver.is_some())
            .finish()
    }
}

fn collect_rigid_links(
    model: &RobotModel,
    link: &str,
    links: &mut Vec<String>,
    link_set: &mut HashSet<String>,
) {
    if !link_set.insert(link.to_string()) {
        return;
    }
    links.push(link.to_string());
    for child in model.child_joints(link) {
        if child.joint_type == JointType::Fixed {
            collect_rigid_links(model, &child.child, links, link_set);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_string;
    use clankers_core::SemanticConfig;

    const ARM: &str = r#"
        <robot name="arm">
            <link name="base"/>
            <link name="upper_arm"/>
            <link name="forearm"/>
            <link name="tool"/>
            <joint name="shoulder" type="revolute">
                <parent link="base"/><child link="upper_arm"/>
                <axis xyz="0 0 1"/>
                <limit lower="-2.0" upper="2.0" effort="50" velocity="3"/>
            </joint>
            <joint name="elbow" type="revolute">
                <parent link="upper_arm"/><child link="forearm"/>
                <origin xyz="0 0 0.3"/>
                <axis xyz="0 1 0"/>
                <limit lower="-1.5" upper="1.5" effort="30" velocity="5"/>
            </joint>
            <joint name="tool_mount" type="fixed">
                <parent link="forearm"/><child link="tool"/>
                <origin xyz="0 0 0.2"/>
            </joint>
        </robot>
    "#;

    fn group_config(name: &str, joints: &[&str]) -> GroupConfig {
        GroupConfig {
            name: name.into(),
            joints: joints.iter().map(ToString::to_string).collect(),
            subgroups: vec![],
            solver: None,
        }
    }

    #[test]
    fn group_variables_and_links() {
        let model = parse_string(ARM).unwrap();
        let group =
            JointModelGroup::from_config(&model, &group_config("arm", &["shoulder", "elbow"]))
                .unwrap();
        assert_eq!(group.variables(), &["shoulder", "elbow"]);
        assert_eq!(group.links(), &["upper_arm", "forearm", "tool"]);
        assert!(group.has_link("tool"));
        assert!(!group.has_link("base"));
        assert!(group.has_variable("elbow"));
        assert!(!group.has_variable("tool_mount"));
    }

    #[test]
    fn group_with_unknown_joint_fails() {
        let model = parse_string(ARM).unwrap();
        let err =
            JointModelGroup::from_config(&model, &group_config("arm", &["wrist"])).unwrap_err();
        assert!(matches!(err, ModelError::MissingJoint(_)));
    }

    #[test]
    fn group_bounds_follow_model() {
        let model = parse_string(ARM).unwrap();
        let group =
            JointModelGroup::from_config(&model, &group_config("arm", &["elbow"])).unwrap();
        let bounds = group.variable_bounds(&model);
        assert_eq!(bounds, vec![VariableBounds::new(-1.5, 1.5)]);
    }

    #[test]
    fn group_without_allocator_has_no_solver() {
        let model = parse_string(ARM).unwrap();
        let group =
            JointModelGroup::from_config(&model, &group_config("arm", &["shoulder"])).unwrap();
        assert!(group.solver_allocator().is_none());
        assert!(group.solver_instance(&model).is_none());
        assert!(format!("{group:?}").contains("has_solver: false"));
    }

    #[test]
    fn load_groups_and_subgroup_solvers() {
        let mut model = parse_string(ARM).unwrap();
        let config = SemanticConfig::from_toml_str(
            r#"
            [[groups]]
            name = "upper"
            joints = ["shoulder"]

            [[groups]]
            name = "lower"
            joints = ["elbow", "tool_mount"]

            [[groups]]
            name = "arm"
            joints = ["shoulder", "elbow"]
            subgroups = ["upper", "lower"]
            "#,
        )
        .unwrap();
        model.load_groups(&config).unwrap();
        assert_eq!(model.group_names(), vec!["arm", "lower", "upper"]);

        let arm = model.group("arm").unwrap();
        assert!(model.subgroups_with_solver(arm).is_empty());

        let allocator: SolverAllocatorFn = Arc::new(|_, _| None);
        model
            .group_mut("lower")
            .unwrap()
            .set_solver_allocator(allocator);
        let arm = model.group("arm").unwrap();
        let subs = model.subgroups_with_solver(arm);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name(), "lower");
    }
}
