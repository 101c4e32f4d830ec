//! URDF robots and group declarations shared by the test suites.
//!
//! Models come back with their groups loaded but no solver allocators
//! attached; tests attach DLS allocators through `clankers_ik::attach_solvers`
//! or mock ones through [`crate::mocks`].

use clankers_core::SemanticConfig;
use clankers_model::{RobotModel, parse_string};

/// Planar two-joint arm. Both joints rotate about `z`; links extend along `x`.
pub const TWO_LINK_ARM: &str = r#"
    <robot name="two_link_arm">
        <link name="base"/>
        <link name="upper_arm"/>
        <link name="forearm"/>
        <link name="end_effector"/>
        <joint name="shoulder" type="revolute">
            <parent link="base"/><child link="upper_arm"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 0 1"/>
            <limit lower="-2.617" upper="2.617" effort="50" velocity="3"/>
        </joint>
        <joint name="elbow" type="revolute">
            <parent link="upper_arm"/><child link="forearm"/>
            <origin xyz="0.3 0 0"/><axis xyz="0 0 1"/>
            <limit lower="-2.094" upper="2.094" effort="30" velocity="5"/>
        </joint>
        <joint name="ee_mount" type="fixed">
            <parent link="forearm"/><child link="end_effector"/>
            <origin xyz="0.25 0 0"/>
        </joint>
    </robot>
"#;

/// Six revolute joints stacked along `z`; fully extended reach is 0.91 m.
pub const SIX_DOF_ARM: &str = r#"
    <robot name="six_dof_arm">
        <link name="base"/>
        <link name="shoulder_link"/>
        <link name="upper_arm"/>
        <link name="elbow_link"/>
        <link name="forearm"/>
        <link name="wrist_link"/>
        <link name="end_effector"/>
        <joint name="j1_base_yaw" type="revolute">
            <parent link="base"/><child link="shoulder_link"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 0 1"/>
            <limit lower="-3.14159" upper="3.14159" effort="80" velocity="2"/>
        </joint>
        <joint name="j2_shoulder_pitch" type="revolute">
            <parent link="shoulder_link"/><child link="upper_arm"/>
            <origin xyz="0 0 0.2"/><axis xyz="0 1 0"/>
            <limit lower="-1.5708" upper="2.356" effort="60" velocity="2"/>
        </joint>
        <joint name="j3_elbow_pitch" type="revolute">
            <parent link="upper_arm"/><child link="elbow_link"/>
            <origin xyz="0 0 0.3"/><axis xyz="0 1 0"/>
            <limit lower="-2.356" upper="2.356" effort="40" velocity="3"/>
        </joint>
        <joint name="j4_forearm_roll" type="revolute">
            <parent link="elbow_link"/><child link="forearm"/>
            <origin xyz="0 0 0.1"/><axis xyz="0 0 1"/>
            <limit lower="-3.14159" upper="3.14159" effort="20" velocity="5"/>
        </joint>
        <joint name="j5_wrist_pitch" type="revolute">
            <parent link="forearm"/><child link="wrist_link"/>
            <origin xyz="0 0 0.2"/><axis xyz="0 1 0"/>
            <limit lower="-2.094" upper="2.094" effort="10" velocity="5"/>
        </joint>
        <joint name="j6_wrist_roll" type="revolute">
            <parent link="wrist_link"/><child link="end_effector"/>
            <origin xyz="0 0 0.06"/><axis xyz="0 0 1"/>
            <limit lower="-3.14159" upper="3.14159" effort="5" velocity="8"/>
        </joint>
    </robot>
"#;

/// One group over all six joints of [`SIX_DOF_ARM`], solved with DLS.
pub const SIX_DOF_GROUPS: &str = r#"
    [[groups]]
    name = "arm"
    joints = ["j1_base_yaw", "j2_shoulder_pitch", "j3_elbow_pitch",
              "j4_forearm_roll", "j5_wrist_pitch", "j6_wrist_roll"]
    solver = "dls"
"#;

/// Torso, arm and hand. The wrist and tool frames hang off fixed joints.
pub const BODY: &str = r#"
    <robot name="body">
        <link name="base"/>
        <link name="torso"/>
        <link name="upper_arm"/>
        <link name="forearm"/>
        <link name="wrist"/>
        <link name="hand"/>
        <link name="palm"/>
        <link name="tool"/>
        <joint name="torso_yaw" type="revolute">
            <parent link="base"/><child link="torso"/>
            <origin xyz="0 0 0.4"/><axis xyz="0 0 1"/>
            <limit lower="-2.9" upper="2.9" effort="100" velocity="1"/>
        </joint>
        <joint name="shoulder_pitch" type="revolute">
            <parent link="torso"/><child link="upper_arm"/>
            <origin xyz="0 0.2 0.3"/><axis xyz="0 1 0"/>
            <limit lower="-1.9" upper="1.9" effort="60" velocity="2"/>
        </joint>
        <joint name="elbow_pitch" type="revolute">
            <parent link="upper_arm"/><child link="forearm"/>
            <origin xyz="0 0 0.35"/><axis xyz="0 1 0"/>
            <limit lower="-2.2" upper="2.2" effort="40" velocity="3"/>
        </joint>
        <joint name="wrist_mount" type="fixed">
            <parent link="forearm"/><child link="wrist"/>
            <origin xyz="0 0 0.3"/>
        </joint>
        <joint name="wrist_pitch" type="revolute">
            <parent link="wrist"/><child link="hand"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 1 0"/>
            <limit lower="-1.6" upper="1.6" effort="10" velocity="5"/>
        </joint>
        <joint name="wrist_roll" type="revolute">
            <parent link="hand"/><child link="palm"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 0 1"/>
            <limit lower="-2.9" upper="2.9" effort="5" velocity="8"/>
        </joint>
        <joint name="tool_mount" type="fixed">
            <parent link="palm"/><child link="tool"/>
            <origin xyz="0 0 0.08"/>
        </joint>
    </robot>
"#;

/// Groups over [`BODY`].
///
/// `body` has no solver of its own and delegates to `arm` and `hand`;
/// `manipulator` covers the same joints with one direct solver.
pub const BODY_GROUPS: &str = r#"
    [[groups]]
    name = "arm"
    joints = ["shoulder_pitch", "elbow_pitch", "wrist_mount"]
    solver = "dls"

    [[groups]]
    name = "hand"
    joints = ["wrist_pitch", "wrist_roll", "tool_mount"]
    solver = "dls"

    [[groups]]
    name = "body"
    joints = ["torso_yaw", "shoulder_pitch", "elbow_pitch", "wrist_mount",
              "wrist_pitch", "wrist_roll", "tool_mount"]
    subgroups = ["arm", "hand"]

    [[groups]]
    name = "manipulator"
    joints = ["torso_yaw", "shoulder_pitch", "elbow_pitch", "wrist_mount",
              "wrist_pitch", "wrist_roll", "tool_mount"]
    solver = "dls"
"#;

/// Parse `urdf` and load the groups declared in `groups_toml`.
///
/// # Panics
///
/// Panics if either document is invalid.
pub fn model_with_groups(urdf: &str, groups_toml: &str) -> (RobotModel, SemanticConfig) {
    let mut model = parse_string(urdf).expect("fixture URDF must parse");
    let semantic =
        SemanticConfig::from_toml_str(groups_toml).expect("fixture groups must be valid");
    model
        .load_groups(&semantic)
        .expect("fixture groups must match the URDF");
    (model, semantic)
}

/// [`BODY`] with [`BODY_GROUPS`] loaded.
pub fn body_model() -> (RobotModel, SemanticConfig) {
    model_with_groups(BODY, BODY_GROUPS)
}

/// [`SIX_DOF_ARM`] with [`SIX_DOF_GROUPS`] loaded.
pub fn six_dof_model() -> (RobotModel, SemanticConfig) {
    model_with_groups(SIX_DOF_ARM, SIX_DOF_GROUPS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_groups_partition_links() {
        let (model, _) = body_model();
        let arm = model.group("arm").unwrap();
        let hand = model.group("hand").unwrap();
        assert_eq!(arm.links(), &["upper_arm", "forearm", "wrist"]);
        assert_eq!(hand.links(), &["hand", "palm", "tool"]);
        assert!(arm.links().iter().all(|l| !hand.has_link(l)));
        assert_eq!(model.group("body").unwrap().variables().len(), 5);
    }

    #[test]
    fn six_dof_group_covers_every_variable() {
        let (model, _) = six_dof_model();
        assert_eq!(model.group("arm").unwrap().variables(), model.variable_names());
    }

    #[test]
    fn two_link_arm_parses() {
        let model = parse_string(TWO_LINK_ARM).unwrap();
        assert_eq!(model.variable_names(), &["shoulder", "elbow"]);
    }
}
