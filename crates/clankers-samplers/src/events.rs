//! Decision trace of sampler selection.
//!
//! The manager reports every branch it takes as a [`DecisionEvent`] to one
//! injected [`DecisionObserver`]. Events never influence the outcome.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Which constraints an IK candidate was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    Pose,
    Position,
    Orientation,
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pose => "pose",
            Self::Position => "position",
            Self::Orientation => "orientation",
        })
    }
}

/// One step of a selection call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionEvent {
    /// Selection started for `group`.
    Begin {
        group: String,
        joint: usize,
        position: usize,
        orientation: usize,
    },
    /// A registered allocator claimed the request.
    ExternalAllocator { group: String, index: usize },
    UnknownGroup { group: String },
    /// Joint constraints matched against the group. `dropped` lists
    /// constrained variables outside the group.
    JointCoverage {
        group: String,
        covered: usize,
        total: usize,
        dropped: Vec<String>,
    },
    /// Every group variable is constrained; the joint sampler is returned.
    JointSamplerSelected { group: String },
    /// Partial joint coverage; the joint sampler is kept for composition.
    JointSamplerPending { group: String, covered: usize },
    JointConfigureFailed { group: String, error: String },
    /// A joint constraint failed validation and was skipped; the others
    /// still count.
    JointConstraintRejected {
        group: String,
        variable: String,
        error: String,
    },
    /// An IK candidate was configured. `retained` is false when an earlier
    /// candidate for the same link has an equal or smaller volume.
    IkCandidate {
        group: String,
        link: String,
        kind: GoalKind,
        volume: f64,
        retained: bool,
    },
    IkConfigureFailed {
        group: String,
        link: String,
        kind: GoalKind,
        error: String,
    },
    /// The minimum-volume IK candidate won. Constraints on
    /// `discarded_links` are not enforced.
    IkSamplerSelected {
        group: String,
        link: String,
        volume: f64,
        discarded_links: Vec<String>,
    },
    /// Recursing into `subgroup` with the constraints on `links`.
    SubgroupAttempt {
        group: String,
        subgroup: String,
        links: Vec<String>,
    },
    SubgroupSelected {
        group: String,
        subgroup: String,
        sampler: &'static str,
    },
    UnionMemberExcluded {
        group: String,
        sampler: &'static str,
        overlap: Vec<String>,
    },
    UnionSelected {
        group: String,
        members: Vec<&'static str>,
    },
    /// Nothing task-space applied; the partial joint sampler is returned.
    JointFallback { group: String },
    NoSampler { group: String },
}

impl DecisionEvent {
    /// Group the event was raised for.
    pub fn group(&self) -> &str {
        match self {
            Self::Begin { group, .. }
            | Self::ExternalAllocator { group, .. }
            | Self::UnknownGroup { group }
            | Self::JointCoverage { group, .. }
            | Self::JointSamplerSelected { group }
            | Self::JointSamplerPending { group, .. }
            | Self::JointConfigureFailed { group, .. }
            | Self::JointConstraintRejected { group, .. }
            | Self::IkCandidate { group, .. }
            | Self::IkConfigureFailed { group, .. }
            | Self::IkSamplerSelected { group, .. }
            | Self::SubgroupAttempt { group, .. }
            | Self::SubgroupSelected { group, .. }
            | Self::UnionMemberExcluded { group, .. }
            | Self::UnionSelected { group, .. }
            | Self::JointFallback { group }
            | Self::NoSampler { group } => group,
        }
    }
}

/// Receives the decision trace.
pub trait DecisionObserver: Send + Sync {
    fn on_event(&self, event: &DecisionEvent);
}

// ---------------------------------------------------------------------------
// TracingObserver
// ---------------------------------------------------------------------------

/// Forwards events to `tracing`: exclusions at `warn`, the rest at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecisionObserver for TracingObserver {
    fn on_event(&self, event: &DecisionEvent) {
        match event {
            DecisionEvent::Begin {
                group,
                joint,
                position,
                orientation,
            } => tracing::debug!(group, joint, position, orientation, "selecting sampler"),
            DecisionEvent::ExternalAllocator { group, index } => {
                tracing::debug!(group, index, "registered allocator claimed request");
            }
            DecisionEvent::UnknownGroup { group } => tracing::debug!(group, "unknown group"),
            DecisionEvent::JointCoverage {
                group,
                covered,
                total,
                dropped,
            } => tracing::debug!(group, covered, total, ?dropped, "joint coverage"),
            DecisionEvent::JointSamplerSelected { group } => {
                tracing::debug!(group, "full joint coverage, using joint sampler");
            }
            DecisionEvent::JointSamplerPending { group, covered } => {
                tracing::debug!(group, covered, "partial joint coverage, joint sampler pending");
            }
            DecisionEvent::JointConfigureFailed { group, error } => {
                tracing::debug!(group, error, "joint sampler configure failed");
            }
            DecisionEvent::JointConstraintRejected {
                group,
                variable,
                error,
            } => tracing::debug!(group, variable, error, "joint constraint rejected"),
            DecisionEvent::IkCandidate {
                group,
                link,
                kind,
                volume,
                retained,
            } => tracing::debug!(group, link, %kind, volume, retained, "IK candidate"),
            DecisionEvent::IkConfigureFailed {
                group,
                link,
                kind,
                error,
            } => tracing::debug!(group, link, %kind, error, "IK candidate configure failed"),
            DecisionEvent::IkSamplerSelected {
                group,
                link,
                volume,
                discarded_links,
            } => tracing::debug!(group, link, volume, ?discarded_links, "IK sampler selected"),
            DecisionEvent::SubgroupAttempt {
                group,
                subgroup,
                links,
            } => tracing::debug!(group, subgroup, ?links, "trying subgroup"),
            DecisionEvent::SubgroupSelected {
                group,
                subgroup,
                sampler,
            } => tracing::debug!(group, subgroup, sampler, "subgroup produced a sampler"),
            DecisionEvent::UnionMemberExcluded {
                group,
                sampler,
                overlap,
            } => tracing::warn!(group, sampler, ?overlap, "union member excluded"),
            DecisionEvent::UnionSelected { group, members } => {
                tracing::debug!(group, ?members, "union sampler selected");
            }
            DecisionEvent::JointFallback { group } => {
                tracing::debug!(group, "falling back to partial joint sampler");
            }
            DecisionEvent::NoSampler { group } => tracing::debug!(group, "no sampler"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DecisionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order.
    pub fn events(&self) -> Vec<DecisionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DecisionObserver for RecordingObserver {
    fn on_event(&self, event: &DecisionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
