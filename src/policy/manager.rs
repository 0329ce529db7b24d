//! Resolves and caches one [`ThermodynamicPolicy`] per opcode id.
//! Grounded on the teacher's `error/types.rs` load-then-validate pattern:
//! configuration is parsed and rejected eagerly, so nothing at tick time
//! can fail on a missing default.
//!
//! The instruction set is closed and known at `load()` time (see
//! `isa::registry`), so resolution happens once, eagerly, for every
//! registered opcode rather than lazily per first use. This keeps the
//! runtime cache trivially idempotent: there's no window where two
//! threads could race to populate the same slot with different instances.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::isa::opcode::{Family, OpcodeId};
use crate::isa::registry::Registry;
use crate::policy::builtin::{FixedCostPolicy, PeekPokePolicy, PeekPolicy, PokePolicy, ThermodynamicPolicy, UniversalPolicy};
use crate::policy::config::{FixedCostOptions, PeekOptions, PeekPokeOptions, PokeOptions, PolicyClassConfig, ThermodynamicsConfig, UniversalOptions};

pub struct PolicyManager {
    cache: HashMap<u32, Arc<dyn ThermodynamicPolicy>>,
}

impl std::fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyManager")
            .field("cache_len", &self.cache.len())
            .finish()
    }
}

impl PolicyManager {
    pub fn load(config: &ThermodynamicsConfig, registry: &Registry) -> Result<Self, ConfigError> {
        let mut cache = HashMap::new();
        for def in registry.all() {
            let class_config = resolve_class_config(config, def.name, def.opcode.family_name());
            let policy = instantiate(class_config)?;
            cache.insert(def.opcode.value(), policy);
        }
        Ok(PolicyManager { cache })
    }

    pub fn resolve(&self, opcode_id: OpcodeId) -> Option<&Arc<dyn ThermodynamicPolicy>> {
        self.cache.get(&opcode_id.value())
    }
}

fn resolve_class_config<'a>(
    config: &'a ThermodynamicsConfig,
    instruction_name: &str,
    family_name: &str,
) -> &'a PolicyClassConfig {
    for (key, cfg) in &config.overrides.instructions {
        if key.split(',').map(str::trim).any(|name| name.eq_ignore_ascii_case(instruction_name)) {
            return cfg;
        }
    }
    if let Some(cfg) = config.overrides.families.get(family_name) {
        return cfg;
    }
    &config.default
}

fn instantiate(class_config: &PolicyClassConfig) -> Result<Arc<dyn ThermodynamicPolicy>, ConfigError> {
    match class_config.class_name.as_str() {
        "FixedCost" => {
            let options: FixedCostOptions = if class_config.options.is_null() {
                FixedCostOptions { energy: None, entropy: None }
            } else {
                serde_json::from_value(class_config.options.clone()).map_err(|e| ConfigError::InvalidOptions {
                    policy: "FixedCost".into(),
                    reason: e.to_string(),
                })?
            };
            Ok(Arc::new(FixedCostPolicy::from_options(&options)))
        }
        "Universal" => {
            let options: UniversalOptions = serde_json::from_value(class_config.options.clone()).map_err(|e| {
                ConfigError::InvalidOptions {
                    policy: "Universal".into(),
                    reason: e.to_string(),
                }
            })?;
            for (key, rule) in options.read_rules.iter().chain(options.write_rules.iter()) {
                if !rule.entropy.is_configured() {
                    return Err(ConfigError::MissingEntropySpec {
                        context: format!("rule '{key}' in Universal policy"),
                    });
                }
            }
            Ok(Arc::new(UniversalPolicy::from_options(&options)))
        }
        "Peek" => {
            let options: PeekOptions = if class_config.options.is_null() {
                PeekOptions::default()
            } else {
                serde_json::from_value(class_config.options.clone()).map_err(|e| ConfigError::InvalidOptions {
                    policy: "Peek".into(),
                    reason: e.to_string(),
                })?
            };
            Ok(Arc::new(PeekPolicy::from_options(&options)))
        }
        "Poke" => {
            let options: PokeOptions = if class_config.options.is_null() {
                PokeOptions::default()
            } else {
                serde_json::from_value(class_config.options.clone()).map_err(|e| ConfigError::InvalidOptions {
                    policy: "Poke".into(),
                    reason: e.to_string(),
                })?
            };
            Ok(Arc::new(PokePolicy::from_options(&options)))
        }
        "PeekPoke" => {
            let options: PeekPokeOptions = if class_config.options.is_null() {
                PeekPokeOptions::default()
            } else {
                serde_json::from_value(class_config.options.clone()).map_err(|e| ConfigError::InvalidOptions {
                    policy: "PeekPoke".into(),
                    reason: e.to_string(),
                })?
            };
            Ok(Arc::new(PeekPokePolicy::from_options(&options)))
        }
        other => Err(ConfigError::UnknownPolicyClass(other.to_string())),
    }
}

impl OpcodeId {
    /// Fully-qualified family name used as the `overrides.families` key.
    pub fn family_name(self) -> &'static str {
        match self.family() {
            Some(Family::Arithmetic) => "Arithmetic",
            Some(Family::Control) => "Control",
            Some(Family::Stack) => "Stack",
            Some(Family::WorldAccess) => "WorldAccess",
            Some(Family::DataMovement) => "DataMovement",
            Some(Family::Reproduction) => "Reproduction",
            None => "Unknown",
        }
    }
}
