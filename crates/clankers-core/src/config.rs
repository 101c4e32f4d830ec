use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_ik_attempts() -> u32 {
    10
}
const fn default_true() -> bool {
    true
}
const fn default_max_iterations() -> u32 {
    100
}
const fn default_position_tolerance() -> f64 {
    1e-4
}
const fn default_angle_tolerance() -> f64 {
    1e-3
}
const fn default_damping() -> f64 {
    0.01
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

// ---------------------------------------------------------------------------
// IkSolverConfig
// ---------------------------------------------------------------------------

/// Parameters of the damped-least-squares IK solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkSolverConfig {
    /// Maximum solver iterations per solve call.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Position error tolerance (meters).
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: f64,
    /// Orientation error tolerance (radians).
    #[serde(default = "default_angle_tolerance")]
    pub angle_tolerance: f64,
    /// Damping factor (lambda). Higher = more robust near singularities,
    /// but slower convergence.
    #[serde(default = "default_damping")]
    pub damping: f64,
}

impl Default for IkSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            position_tolerance: default_position_tolerance(),
            angle_tolerance: default_angle_tolerance(),
            damping: default_damping(),
        }
    }
}

impl IkSolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("ik.max_iterations", "must be >= 1"));
        }
        if !is_positive(self.position_tolerance) {
            return Err(ConfigError::invalid("ik.position_tolerance", "must be > 0"));
        }
        if !is_positive(self.angle_tolerance) {
            return Err(ConfigError::invalid("ik.angle_tolerance", "must be > 0"));
        }
        if !is_positive(self.damping) {
            return Err(ConfigError::invalid("ik.damping", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SamplerConfig
// ---------------------------------------------------------------------------

/// Settings shared by every sampler the manager builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Root seed; each sampler derives its own RNG stream from it.
    #[serde(default)]
    pub seed: u64,

    /// Candidate poses an IK sampler tries per `sample` call before giving up.
    #[serde(default = "default_ik_attempts")]
    pub ik_attempts: u32,

    /// Check every IK solution against the configured constraints before
    /// accepting it.
    #[serde(default = "default_true")]
    pub validate_ik_solutions: bool,

    /// Damped-least-squares solver parameters.
    #[serde(default)]
    pub ik: IkSolverConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ik_attempts: default_ik_attempts(),
            validate_ik_solutions: true,
            ik: IkSolverConfig::default(),
        }
    }
}

impl SamplerConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ik_attempts == 0 {
            return Err(ConfigError::ZeroIkAttempts);
        }
        self.ik.validate()
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// GroupConfig / SemanticConfig
// ---------------------------------------------------------------------------

/// Declaration of a named joint group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// Joints in the group, in sampling order. Fixed joints are allowed and
    /// only contribute their child links.
    #[serde(default)]
    pub joints: Vec<String>,
    /// Names of other groups nested in this one, in priority order.
    #[serde(default)]
    pub subgroups: Vec<String>,
    /// Name of the IK solver to attach, e.g. `"dls"`. `None` = no direct IK.
    #[serde(default)]
    pub solver: Option<String>,
}

/// Semantic robot description: the set of joint groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticConfig {
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl SemanticConfig {
    /// Group names must be unique and subgroups must refer to declared groups.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ConfigError::invalid("groups.name", "must not be empty"));
            }
            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
        }
        for group in &self.groups {
            for sub in &group.subgroups {
                if !names.contains(sub.as_str()) || *sub == group.name {
                    return Err(ConfigError::UnknownSubgroup {
                        group: group.name.clone(),
                        subgroup: sub.clone(),
                    });
                }
            }
        }
        for group in &self.groups {
            if self.reaches(&group.name, &group.name, &mut HashSet::new()) {
                return Err(ConfigError::invalid(
                    "groups.subgroups",
                    format!("group {} is its own (indirect) subgroup", group.name),
                ));
            }
        }
        Ok(())
    }

    /// Whether `target` is reachable from `from` through subgroup edges.
    fn reaches<'a>(&'a self, from: &str, target: &str, seen: &mut HashSet<&'a str>) -> bool {
        let Some(group) = self.group(from) else {
            return false;
        };
        for sub in &group.subgroups {
            if sub == target {
                return true;
            }
            if seen.insert(sub.as_str()) && self.reaches(sub, target, seen) {
                return true;
            }
        }
        false
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
