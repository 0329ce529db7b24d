//! Error taxonomy for the tick engine.
//!
//! Only [`ConfigError`] and [`FatalOrganismError`] are kinds a caller of
//! this crate ever sees as a `Result::Err`: load-time configuration errors
//! are the only errors meant to surface upward (spec §7). Execution
//! failures, conflict losses and plugin/birth-handler errors are recorded
//! as data instead of propagated — see [`crate::organism::Organism::instruction_failed`]
//! and the `tracing::warn!` events emitted from [`crate::sim`].

use thiserror::Error;

/// Top-level error type for fallible core APIs.
#[derive(Debug, Error)]
pub enum EvoError {
    /// A policy class is unknown, a required default is missing, or a rule
    /// omits its mandatory entropy specification. Raised only at load time.
    #[error("thermodynamic policy configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An organism ran out of energy, exceeded its entropy limit, or an
    /// unchecked error escaped even the VM's global catch.
    #[error("fatal organism error: {0}")]
    FatalOrganism(#[from] FatalOrganismError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no default policy configured (overrides.instructions/families require a default)")]
    MissingDefault,

    #[error("unknown policy class: {0}")]
    UnknownPolicyClass(String),

    #[error("policy '{policy}' rejected its options: {reason}")]
    InvalidOptions { policy: String, reason: String },

    #[error("rule for '{context}' specifies neither a fixed nor a permille entropy contribution")]
    MissingEntropySpec { context: String },
}

#[derive(Debug, Error)]
pub enum FatalOrganismError {
    #[error("organism {organism_id}: {reason}")]
    Killed { organism_id: u64, reason: String },
}

impl From<anyhow::Error> for ConfigError {
    fn from(err: anyhow::Error) -> Self {
        ConfigError::InvalidOptions {
            policy: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_surfaces_through_evo_error() {
        let err: EvoError = ConfigError::MissingDefault.into();
        assert!(matches!(err, EvoError::Config(ConfigError::MissingDefault)));
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn fatal_organism_error_carries_reason() {
        let err = FatalOrganismError::Killed { organism_id: 7, reason: "Ran out of energy".into() };
        assert!(err.to_string().contains("Ran out of energy"));
        assert!(err.to_string().contains('7'));
    }
}
