// clankers-core: errors, configuration and seed derivation for the Clankers sampling crates.

pub mod config;
pub mod error;
pub mod seed;

pub use config::{GroupConfig, IkSolverConfig, SamplerConfig, SemanticConfig};
pub use error::ConfigError;
