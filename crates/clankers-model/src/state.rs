//! Mutable joint-variable values for one robot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::group::JointModelGroup;
use crate::types::RobotModel;

/// Dense vector of joint-variable values in model order.
///
/// Shares the model's name index, so cloning a state only copies the
/// values.
#[derive(Debug, Clone)]
pub struct RobotState {
    values: Vec<f64>,
    index: Arc<HashMap<String, usize>>,
}

impl RobotState {
    /// State with every variable at its default (the in-bounds value closest
    /// to zero).
    pub fn new(model: &RobotModel) -> Self {
        let values = model
            .variable_names()
            .iter()
            .map(|v| {
                model
                    .variable_bounds(v)
                    .map_or(0.0, |b| b.default_value())
            })
            .collect();
        Self {
            values,
            index: model.shared_variable_index(),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn variable(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    /// Set a variable by name. Returns `false` if the name is unknown.
    pub fn set_variable(&mut self, name: &str, value: f64) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Current values of the group's variables, in group order.
    pub fn group_values(&self, group: &JointModelGroup) -> Vec<f64> {
        group
            .variables()
            .iter()
            .map(|v| self.variable(v).unwrap_or(0.0))
            .collect()
    }

    /// Write `values` (group order) into the group's variables.
    pub fn set_group_values(&mut self, group: &JointModelGroup, values: &[f64]) {
        for (name, &value) in group.variables().iter().zip(values) {
            self.set_variable(name, value);
        }
    }

    /// Copy every value from `other`. Both states must come from the same model.
    pub fn copy_from(&mut self, other: &Self) {
        self.values.copy_from_slice(&other.values);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
