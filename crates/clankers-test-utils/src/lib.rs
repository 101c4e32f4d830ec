//! Shared test fixtures and utilities for Clankers crates.
//!
//! Provides URDF robots with matching group declarations, mock IK solvers
//! with scripted behavior, and deterministic RNG setup.

pub mod fixtures;
pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{body_model, model_with_groups, six_dof_model};
pub use mocks::{MockBehavior, MockSolver, mock_allocator, shared_allocator};
pub use rng::{deterministic_vec, seeded_rng};
