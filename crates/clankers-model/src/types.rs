//! Core data types for the in-memory robot model.
//!
//! These types are the crate's canonical representation of a robot,
//! independent of the XML parsing layer. They map closely to URDF concepts
//! but use Rust-native types, and add the joint-variable ordering and joint
//! groups the samplers work with.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use clankers_core::SemanticConfig;

use crate::error::ModelError;
use crate::group::JointModelGroup;

// ---------------------------------------------------------------------------
// JointType
// ---------------------------------------------------------------------------

/// URDF joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis, with position limits.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
    /// Unconstrained 6-DOF joint (rarely used).
    Floating,
    /// Translation along one axis with no rotation (rarely used).
    Planar,
}

impl JointType {
    /// Whether this joint type contributes a single scalar joint variable.
    ///
    /// Floating and planar joints are treated as rigid.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous | Self::Prismatic)
    }
}

// ---------------------------------------------------------------------------
// JointLimits / VariableBounds
// ---------------------------------------------------------------------------

/// Position limits of a joint as declared in the URDF.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointLimits {
    /// Lower position limit (rad or m). `None` means unbounded.
    pub lower: Option<f64>,
    /// Upper position limit (rad or m). `None` means unbounded.
    pub upper: Option<f64>,
}

/// Closed interval a joint variable may take. Unbounded sides are infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    pub min: f64,
    pub max: f64,
}

impl VariableBounds {
    pub const UNBOUNDED: Self = Self {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Intersection with another interval, or `None` if they are disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }

    /// The in-bounds value closest to zero.
    pub fn default_value(&self) -> f64 {
        self.clamp(0.0)
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// A 3D pose specified as position + roll-pitch-yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Origin {
    /// Translation `[x, y, z]` in meters.
    pub xyz: [f64; 3],
    /// Rotation `[roll, pitch, yaw]` in radians.
    pub rpy: [f64; 3],
}

// ---------------------------------------------------------------------------
// LinkData / JointData
// ---------------------------------------------------------------------------

/// In-memory representation of a URDF link.
///
/// Only the name matters for sampling; geometry lives with collision
/// checking, which is not part of this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkData {
    pub name: String,
}

impl LinkData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// In-memory representation of a URDF joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    /// Joint name. Actuated joints have one variable of the same name.
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Joint origin relative to parent link.
    pub origin: Origin,
    /// Joint axis (unit vector, default `[0, 0, 1]`).
    pub axis: [f64; 3],
    pub limits: JointLimits,
}

impl JointData {
    /// Bounds of this joint's variable.
    ///
    /// Continuous joints are bounded to `[-pi, pi]`; a missing limit side is
    /// unbounded.
    pub fn variable_bounds(&self) -> VariableBounds {
        match self.joint_type {
            JointType::Continuous => {
                VariableBounds::new(-std::f64::consts::PI, std::f64::consts::PI)
            }
            _ => VariableBounds::new(
                self.limits.lower.unwrap_or(f64::NEG_INFINITY),
                self.limits.upper.unwrap_or(f64::INFINITY),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// RobotModel
// ---------------------------------------------------------------------------

/// Complete in-memory robot model: kinematic tree, variable order, groups.
///
/// Built once and shared behind an `Arc` by every scene and sampler derived
/// from it.
#[derive(Debug, Clone)]
pub struct RobotModel {
    name: String,
    links: HashMap<String, LinkData>,
    joints: HashMap<String, JointData>,
    root_link: String,
    /// Actuated joint names, in declaration order.
    variables: Vec<String>,
    variable_index: Arc<HashMap<String, usize>>,
    /// Child link name -> name of the joint connecting it to its parent.
    parent_joint: HashMap<String, String>,
    groups: HashMap<String, JointModelGroup>,
}

impl RobotModel {
    /// Build a model from links and joints. `joints` order defines the
    /// variable order.
    pub fn new(
        name: impl Into<String>,
        links: Vec<LinkData>,
        joints: Vec<JointData>,
    ) -> Result<Self, ModelError> {
        let links: HashMap<String, LinkData> =
            links.into_iter().map(|l| (l.name.clone(), l)).collect();

        for joint in &joints {
            for link in [&joint.parent, &joint.child] {
                if !links.contains_key(link) {
                    return Err(ModelError::MissingLink(link.clone()));
                }
            }
        }

        // Root link = a link that is never a child of any joint.
        let child_links: HashSet<&str> = joints.iter().map(|j| j.child.as_str()).collect();
        let mut roots: Vec<&String> = links
            .keys()
            .filter(|name| !child_links.contains(name.as_str()))
            .collect();
        roots.sort_unstable();
        let root_link = roots.first().ok_or(ModelError::NoRootLink)?.to_string();

        let variables: Vec<String> = joints
            .iter()
            .filter(|j| j.joint_type.is_actuated())
            .map(|j| j.name.clone())
            .collect();
        let variable_index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        let parent_joint = joints
            .iter()
            .map(|j| (j.child.clone(), j.name.clone()))
            .collect();

        Ok(Self {
            name: name.into(),
            links,
            joints: joints.into_iter().map(|j| (j.name.clone(), j)).collect(),
            root_link,
            variables,
            variable_index: Arc::new(variable_index),
            parent_joint,
            groups: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the root link; also the model (planning) frame.
    pub fn root_link(&self) -> &str {
        &self.root_link
    }

    /// Get a link by name.
    pub fn link(&self, name: &str) -> Result<&LinkData, ModelError> {
        self.links
            .get(name)
            .ok_or_else(|| ModelError::MissingLink(name.into()))
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    /// Get a joint by name.
    pub fn joint(&self, name: &str) -> Result<&JointData, ModelError> {
        self.joints
            .get(name)
            .ok_or_else(|| ModelError::MissingJoint(name.into()))
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Joint whose child is `link`, or `None` for the root link.
    pub fn parent_joint(&self, link: &str) -> Option<&JointData> {
        self.parent_joint
            .get(link)
            .and_then(|j| self.joints.get(j))
    }

    /// Joints whose parent is `link`, sorted by name.
    pub fn child_joints(&self, link: &str) -> Vec<&JointData> {
        let mut children: Vec<&JointData> =
            self.joints.values().filter(|j| j.parent == link).collect();
        children.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Joint variable names in model order.
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// Number of joint variables.
    pub fn dof(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variable_index.get(name).copied()
    }

    pub(crate) fn shared_variable_index(&self) -> Arc<HashMap<String, usize>> {
        Arc::clone(&self.variable_index)
    }

    /// Native bounds of a joint variable.
    pub fn variable_bounds(&self, name: &str) -> Option<VariableBounds> {
        self.variable_index(name)?;
        self.joints.get(name).map(JointData::variable_bounds)
    }

    // -- Groups --

    pub fn group(&self, name: &str) -> Option<&JointModelGroup> {
        self.groups.get(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut JointModelGroup> {
        self.groups.get_mut(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Group names, sorted alphabetically.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register a group, replacing any group with the same name.
    pub fn add_group(&mut self, group: JointModelGroup) {
        self.groups.insert(group.name().to_string(), group);
    }

    /// Build and register every group declared in `config`.
    ///
    /// Solver allocators are not attached here; see `clankers_ik::attach_solvers`.
    pub fn load_groups(&mut self, config: &SemanticConfig) -> Result<(), ModelError> {
        config.validate()?;
        for group_config in &config.groups {
            let group = JointModelGroup::from_config(self, group_config)?;
            self.add_group(group);
        }
        Ok(())
    }

    /// Subgroups of `group` that carry their own solver allocator, in the
    /// group's declared subgroup order.
    pub fn subgroups_with_solver(&self, group: &JointModelGroup) -> Vec<&JointModelGroup> {
        group
            .subgroups()
            .iter()
            .filter_map(|name| self.group(name))
            .filter(|sub| sub.solver_allocator().is_some())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn revolute(name: &str, parent: &str, child: &str, lower: f64, upper: f64) -> JointData {
        JointData {
            name: name.into(),
            joint_type: JointType::Revolute,
            parent: parent.into(),
            child: child.into(),
            origin: Origin::default(),
            axis: [0.0, 0.0, 1.0],
            limits: JointLimits {
                lower: Some(lower),
                upper: Some(upper),
            },
        }
    }

    fn sample_model() -> RobotModel {
        let links = ["base", "link1", "link2", "tool"]
            .into_iter()
            .map(LinkData::new)
            .collect();
        let joints = vec![
            revolute("joint1", "base", "link1", -1.57, 1.57),
            JointData {
                joint_type: JointType::Continuous,
                ..revolute("joint2", "link1", "link2", 0.0, 0.0)
            },
            JointData {
                joint_type: JointType::Fixed,
                limits: JointLimits::default(),
                ..revolute("tool_mount", "link2", "tool", 0.0, 0.0)
            },
        ];
        RobotModel::new("test_robot", links, joints).unwrap()
    }

    #[test]
    fn joint_type_is_actuated() {
        assert!(JointType::Revolute.is_actuated());
        assert!(JointType::Continuous.is_actuated());
        assert!(JointType::Prismatic.is_actuated());
        assert!(!JointType::Fixed.is_actuated());
        assert!(!JointType::Floating.is_actuated());
        assert!(!JointType::Planar.is_actuated());
    }

    #[test]
    fn bounds_intersect_and_clamp() {
        let a = VariableBounds::new(-1.0, 1.0);
        let b = VariableBounds::new(0.5, 2.0);
        assert_eq!(a.intersect(&b), Some(VariableBounds::new(0.5, 1.0)));
        assert!(a.intersect(&VariableBounds::new(1.5, 2.0)).is_none());
        assert!((a.clamp(3.0) - 1.0).abs() < f64::EPSILON);
        assert!(a.is_bounded());
        assert!(!VariableBounds::UNBOUNDED.is_bounded());
        assert!((VariableBounds::new(0.2, 1.0).default_value() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn degenerate_intersection_is_a_point() {
        let a = VariableBounds::new(0.0, 1.0);
        let b = VariableBounds::new(1.0, 2.0);
        assert_eq!(a.intersect(&b), Some(VariableBounds::new(1.0, 1.0)));
    }

    #[test]
    fn model_root_and_variables() {
        let model = sample_model();
        assert_eq!(model.root_link(), "base");
        assert_eq!(model.variable_names(), &["joint1", "joint2"]);
        assert_eq!(model.dof(), 2);
        assert_eq!(model.variable_index("joint2"), Some(1));
        assert!(model.variable_index("tool_mount").is_none());
    }

    #[test]
    fn model_variable_bounds() {
        let model = sample_model();
        let b1 = model.variable_bounds("joint1").unwrap();
        assert!((b1.min + 1.57).abs() < f64::EPSILON);
        let b2 = model.variable_bounds("joint2").unwrap();
        assert!((b2.max - std::f64::consts::PI).abs() < f64::EPSILON);
        assert!(model.variable_bounds("tool_mount").is_none());
    }

    #[test]
    fn model_link_and_joint_lookup() {
        let model = sample_model();
        assert!(model.link("base").is_ok());
        assert!(matches!(model.link("missing"), Err(ModelError::MissingLink(_))));
        assert!(model.joint("joint1").is_ok());
        assert!(matches!(model.joint("missing"), Err(ModelError::MissingJoint(_))));
        assert_eq!(model.parent_joint("tool").unwrap().name, "tool_mount");
        assert!(model.parent_joint("base").is_none());
        assert_eq!(model.child_joints("link1")[0].name, "joint2");
    }

    #[test]
    fn model_rejects_dangling_link() {
        let err = RobotModel::new(
            "bad",
            vec![LinkData::new("base")],
            vec![revolute("j", "base", "ghost", -1.0, 1.0)],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::MissingLink(name) if name == "ghost"));
    }

    #[test]
    fn model_without_links_has_no_root() {
        let err = RobotModel::new("empty", vec![], vec![]).unwrap_err();
        assert!(matches!(err, ModelError::NoRootLink));
    }
}
