//! Sampler selection.
//!
//! [`ConstraintSamplerManager`] turns a constraint set for one group into a
//! configured sampler. Registered allocators get the first look; otherwise
//! the built-in procedure runs:
//!
//! 1. **Joint pass**: joint constraints on group variables become a
//!    [`JointConstraintSampler`]. Full coverage returns it; partial coverage
//!    keeps it pending.
//! 2. **IK pass** (group has a solver allocator): one IK candidate per
//!    constrained link, smallest sampling volume wins, merged with the
//!    pending joint sampler.
//! 3. **Subgroup pass** (no IK decision, subgroups with solvers exist):
//!    task-space constraints are split over subgroups by link and selection
//!    recurses into each.
//! 4. **Fallback**: the pending joint sampler, or nothing.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clankers_core::SamplerConfig;
use clankers_core::seed::derive_seed;
use clankers_model::JointModelGroup;

use crate::error::ConfigureError;
use crate::events::{DecisionEvent, DecisionObserver, GoalKind, TracingObserver};
use crate::ik::IkConstraintSampler;
use crate::joint::JointConstraintSampler;
use crate::kinematic::{IkSamplingPose, JointConstraint};
use crate::msg::{self, Constraints};
use crate::sampler::{ConstraintSampler, ConstraintSamplerAllocator};
use crate::scene::PlanningScene;
use crate::union::UnionConstraintSampler;

/// A configured IK sampler kept for one link.
struct IkCandidate {
    link: String,
    volume: f64,
    sampler: IkConstraintSampler,
}

/// Chooses and configures samplers for constraint sets.
///
/// Every selection call builds its samplers from a seed derived from the
/// root seed and the call's index, so samplers from different calls draw
/// different sequences while a fresh manager replays the same ones.
pub struct ConstraintSamplerManager {
    allocators: Vec<Box<dyn ConstraintSamplerAllocator>>,
    config: SamplerConfig,
    observer: Arc<dyn DecisionObserver>,
    selections: AtomicU64,
}

impl ConstraintSamplerManager {
    /// Manager with no registered allocators, reporting to `tracing`.
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            allocators: Vec::new(),
            config,
            observer: Arc::new(TracingObserver),
            selections: AtomicU64::new(0),
        }
    }

    /// Replace the decision observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Add an allocator. Allocators are consulted in registration order.
    pub fn register_allocator(&mut self, allocator: Box<dyn ConstraintSamplerAllocator>) {
        self.allocators.push(allocator);
    }

    /// Root configuration; `seed` is the root of every selection's seed.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Configuration for the next selection call.
    fn next_selection(&self) -> SamplerConfig {
        let index = self.selections.fetch_add(1, Ordering::Relaxed);
        SamplerConfig {
            seed: derive_seed(self.config.seed, &format!("selection:{index}")),
            ..self.config.clone()
        }
    }

    fn emit(&self, event: DecisionEvent) {
        self.observer.on_event(&event);
    }

    /// Sampler for `constraints` on `group`.
    ///
    /// The first registered allocator that claims the request decides the
    /// result, even if it then allocates nothing.
    pub fn select_sampler(
        &self,
        scene: &PlanningScene,
        group: &str,
        constraints: &Constraints,
    ) -> Option<Box<dyn ConstraintSampler>> {
        let config = self.next_selection();
        for (index, allocator) in self.allocators.iter().enumerate() {
            if allocator.can_service(scene, group, constraints) {
                self.emit(DecisionEvent::ExternalAllocator {
                    group: group.to_string(),
                    index,
                });
                return allocator.alloc(scene, group, constraints, &config);
            }
        }
        self.select_with(scene, group, constraints, &config)
    }

    /// Built-in selection, ignoring registered allocators.
    pub fn select_default_sampler(
        &self,
        scene: &PlanningScene,
        group: &str,
        constraints: &Constraints,
    ) -> Option<Box<dyn ConstraintSampler>> {
        let config = self.next_selection();
        self.select_with(scene, group, constraints, &config)
    }

    fn select_with(
        &self,
        scene: &PlanningScene,
        group: &str,
        constraints: &Constraints,
        config: &SamplerConfig,
    ) -> Option<Box<dyn ConstraintSampler>> {
        self.emit(DecisionEvent::Begin {
            group: group.to_string(),
            joint: constraints.joint_constraints.len(),
            position: constraints.position_constraints.len(),
            orientation: constraints.orientation_constraints.len(),
        });

        let model = scene.model();
        let Some(jmg) = model.group(group) else {
            self.emit(DecisionEvent::UnknownGroup {
                group: group.to_string(),
            });
            return None;
        };

        let mut pending: Option<Box<dyn ConstraintSampler>> = None;
        if !constraints.joint_constraints.is_empty() {
            match self.joint_pass(scene, jmg, constraints, config) {
                JointPass::Full(sampler) => {
                    self.emit(DecisionEvent::JointSamplerSelected {
                        group: group.to_string(),
                    });
                    return Some(sampler);
                }
                JointPass::Partial(sampler) => {
                    self.emit(DecisionEvent::JointSamplerPending {
                        group: group.to_string(),
                        covered: sampler.covered_variables().len(),
                    });
                    pending = Some(sampler);
                }
                JointPass::None => {}
            }
        }

        if jmg.solver_allocator().is_some() && constraints.has_task_space() {
            if let Some(ik) = self.select_ik_sampler(scene, group, constraints, config) {
                let ik: Box<dyn ConstraintSampler> = Box::new(ik);
                return Some(match pending {
                    Some(joint) => self.union(group, vec![joint, ik]),
                    None => ik,
                });
            }
        }

        let subgroups = model.subgroups_with_solver(jmg);
        if !subgroups.is_empty() && constraints.has_task_space() {
            let mut members: Vec<Box<dyn ConstraintSampler>> = Vec::new();
            for (subgroup, subset) in partition(&subgroups, constraints) {
                if subset.position_constraints.is_empty()
                    && subset.orientation_constraints.is_empty()
                {
                    continue;
                }
                self.emit(DecisionEvent::SubgroupAttempt {
                    group: group.to_string(),
                    subgroup: subgroup.to_string(),
                    links: constrained_links(&subset),
                });
                if let Some(sampler) = self.select_with(scene, subgroup, &subset, config) {
                    self.emit(DecisionEvent::SubgroupSelected {
                        group: group.to_string(),
                        subgroup: subgroup.to_string(),
                        sampler: sampler.name(),
                    });
                    members.push(sampler);
                }
            }
            if !members.is_empty() {
                if let Some(joint) = pending {
                    members.insert(0, joint);
                }
                return Some(self.union(group, members));
            }
        }

        if let Some(joint) = pending {
            self.emit(DecisionEvent::JointFallback {
                group: group.to_string(),
            });
            return Some(joint);
        }
        self.emit(DecisionEvent::NoSampler {
            group: group.to_string(),
        });
        None
    }

    /// Joint constraints on group variables, validated one by one. A
    /// constraint that fails validation is reported and skipped; only an
    /// empty combined interval discards the joint sampler.
    fn joint_pass(
        &self,
        scene: &PlanningScene,
        jmg: &JointModelGroup,
        constraints: &Constraints,
        config: &SamplerConfig,
    ) -> JointPass {
        let group = jmg.name();
        let mut dropped = Vec::new();
        let mut covered: HashSet<&str> = HashSet::new();
        let mut joints = Vec::new();
        for c in &constraints.joint_constraints {
            if !jmg.has_variable(&c.joint_name) {
                dropped.push(c.joint_name.clone());
                continue;
            }
            match JointConstraint::new(scene.model(), c) {
                Ok(joint) => {
                    covered.insert(&c.joint_name);
                    joints.push(joint);
                }
                Err(e) => self.emit(DecisionEvent::JointConstraintRejected {
                    group: group.to_string(),
                    variable: c.joint_name.clone(),
                    error: e.to_string(),
                }),
            }
        }
        self.emit(DecisionEvent::JointCoverage {
            group: group.to_string(),
            covered: covered.len(),
            total: jmg.variables().len(),
            dropped,
        });
        if joints.is_empty() {
            return JointPass::None;
        }

        let configured = JointConstraintSampler::new(scene, group, config)
            .and_then(|mut sampler| sampler.configure_joints(&joints).map(|()| sampler));
        match configured {
            Ok(sampler) if covered.len() == jmg.variables().len() => {
                JointPass::Full(Box::new(sampler))
            }
            Ok(sampler) => JointPass::Partial(Box::new(sampler)),
            Err(e) => {
                self.emit(DecisionEvent::JointConfigureFailed {
                    group: group.to_string(),
                    error: e.to_string(),
                });
                JointPass::None
            }
        }
    }

    /// Smallest-volume IK sampler over every constrained link.
    ///
    /// Candidates are tried as full poses first, then position-only, then
    /// orientation-only; links with a configured full pose skip the latter
    /// two.
    fn select_ik_sampler(
        &self,
        scene: &PlanningScene,
        group: &str,
        constraints: &Constraints,
        config: &SamplerConfig,
    ) -> Option<IkConstraintSampler> {
        let mut retained: Vec<IkCandidate> = Vec::new();
        let mut fully_paired: HashSet<String> = HashSet::new();

        let mut candidate = |position: Option<&msg::PositionConstraint>,
                             orientation: Option<&msg::OrientationConstraint>,
                             kind: GoalKind| {
            self.ik_candidate(scene, config, group, position, orientation, kind, &mut retained)
        };

        for p in &constraints.position_constraints {
            for o in &constraints.orientation_constraints {
                if p.link_name == o.link_name && candidate(Some(p), Some(o), GoalKind::Pose) {
                    fully_paired.insert(p.link_name.clone());
                }
            }
        }
        for p in &constraints.position_constraints {
            if !fully_paired.contains(&p.link_name) {
                candidate(Some(p), None, GoalKind::Position);
            }
        }
        for o in &constraints.orientation_constraints {
            if !fully_paired.contains(&o.link_name) {
                candidate(None, Some(o), GoalKind::Orientation);
            }
        }

        let mut best: Option<usize> = None;
        for (i, candidate) in retained.iter().enumerate() {
            if best.is_none_or(|b| candidate.volume < retained[b].volume) {
                best = Some(i);
            }
        }
        let winner = retained.remove(best?);
        let discarded_links = retained.into_iter().map(|c| c.link).collect();
        self.emit(DecisionEvent::IkSamplerSelected {
            group: group.to_string(),
            link: winner.link,
            volume: winner.volume,
            discarded_links,
        });
        Some(winner.sampler)
    }

    /// Configure one IK candidate and merge it into `retained`. Returns
    /// whether configuration succeeded.
    #[allow(clippy::too_many_arguments)]
    fn ik_candidate(
        &self,
        scene: &PlanningScene,
        config: &SamplerConfig,
        group: &str,
        position: Option<&msg::PositionConstraint>,
        orientation: Option<&msg::OrientationConstraint>,
        kind: GoalKind,
        retained: &mut Vec<IkCandidate>,
    ) -> bool {
        let link = position
            .map(|p| p.link_name.as_str())
            .or(orientation.map(|o| o.link_name.as_str()))
            .unwrap_or_default();

        let configured = IkSamplingPose::from_msgs(scene, position, orientation)
            .map_err(ConfigureError::from)
            .and_then(|goal| {
                let goal = goal.ok_or_else(|| ConfigureError::NoConstraints {
                    group: group.to_string(),
                })?;
                let volume = goal.volume();
                let mut sampler = IkConstraintSampler::new(scene, group, config)?;
                sampler.configure_pose(goal)?;
                Ok((sampler, volume))
            });
        let (sampler, volume) = match configured {
            Ok(ok) => ok,
            Err(e) => {
                self.emit(DecisionEvent::IkConfigureFailed {
                    group: group.to_string(),
                    link: link.to_string(),
                    kind,
                    error: e.to_string(),
                });
                return false;
            }
        };

        let retain = match retained.iter_mut().find(|c| c.link == link) {
            Some(existing) if volume < existing.volume => {
                existing.volume = volume;
                existing.sampler = sampler;
                true
            }
            Some(_) => false,
            None => {
                retained.push(IkCandidate {
                    link: link.to_string(),
                    volume,
                    sampler,
                });
                true
            }
        };
        self.emit(DecisionEvent::IkCandidate {
            group: group.to_string(),
            link: link.to_string(),
            kind,
            volume,
            retained: retain,
        });
        true
    }

    fn union(&self, group: &str, members: Vec<Box<dyn ConstraintSampler>>) -> Box<dyn ConstraintSampler> {
        let union = UnionConstraintSampler::new(group, members);
        for excluded in union.excluded() {
            self.emit(DecisionEvent::UnionMemberExcluded {
                group: group.to_string(),
                sampler: excluded.sampler,
                overlap: excluded.overlap.clone(),
            });
        }
        self.emit(DecisionEvent::UnionSelected {
            group: group.to_string(),
            members: union.member_names(),
        });
        Box::new(union)
    }
}

impl std::fmt::Debug for ConstraintSamplerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSamplerManager")
            .field("allocators", &self.allocators.len())
            .field("config", &self.config)
            .field("selections", &self.selections.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

enum JointPass {
    Full(Box<dyn ConstraintSampler>),
    Partial(Box<dyn ConstraintSampler>),
    None,
}

/// Split the task-space constraints over `subgroups`. Each constraint goes
/// to the first subgroup that contains its link; the rest are dropped.
fn partition<'a>(
    subgroups: &[&'a JointModelGroup],
    constraints: &Constraints,
) -> Vec<(&'a str, Constraints)> {
    let mut positions_used = vec![false; constraints.position_constraints.len()];
    let mut orientations_used = vec![false; constraints.orientation_constraints.len()];

    subgroups
        .iter()
        .map(|sub| {
            let mut subset = Constraints {
                name: constraints.name.clone(),
                ..Constraints::default()
            };
            for (p, used) in constraints
                .position_constraints
                .iter()
                .zip(positions_used.iter_mut())
            {
                if !*used && sub.has_link(&p.link_name) {
                    *used = true;
                    subset.position_constraints.push(p.clone());
                }
            }
            for (o, used) in constraints
                .orientation_constraints
                .iter()
                .zip(orientations_used.iter_mut())
            {
                if !*used && sub.has_link(&o.link_name) {
                    *used = true;
                    subset.orientation_constraints.push(o.clone());
                }
            }
            (sub.name(), subset)
        })
        .collect()
}

/// Distinct task-space links of `constraints`, in first-seen order.
fn constrained_links(constraints: &Constraints) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let names = constraints
        .position_constraints
        .iter()
        .map(|p| &p.link_name)
        .chain(constraints.orientation_constraints.iter().map(|o| &o.link_name));
    for name in names {
        if !links.contains(name) {
            links.push(name.clone());
        }
    }
    links
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
