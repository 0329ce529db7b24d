//! `serde::Deserialize` shapes for thermodynamics configuration. Loading
//! the surrounding HOCON document is an external collaborator's job; the
//! core only needs these shapes once that collaborator hands it a
//! `serde_json::Value` (or any other `Deserialize` source).

use std::collections::HashMap;

use serde::Deserialize;

/// `default = {className, options?}`, optional per-instruction and
/// per-family overrides, as read by `PolicyManager::load`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThermodynamicsConfig {
    pub default: PolicyClassConfig,
    #[serde(default)]
    pub overrides: OverridesConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverridesConfig {
    #[serde(default)]
    pub instructions: HashMap<String, PolicyClassConfig>,
    #[serde(default)]
    pub families: HashMap<String, PolicyClassConfig>,
}

/// A single override entry: which policy class to instantiate and its
/// options. Used identically for `overrides.instructions.<key>` and
/// `overrides.families.<key>`.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyClassConfig {
    pub class_name: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Back-compat shape for `FixedCost`: `{energy-cost, entropy-delta}` or
/// `{energy, entropy}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FixedCostOptions {
    #[serde(alias = "energy-cost")]
    pub energy: Option<i64>,
    #[serde(alias = "entropy-delta")]
    pub entropy: Option<i64>,
}

/// A rule's contribution: a fixed amount and/or a per-mille fraction of
/// the target's absolute scalar value. At least one field must be set for
/// entropy; `PolicyManager::load` rejects a rule that sets neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleAmount {
    pub fixed: Option<i64>,
    pub permille: Option<i64>,
}

impl RuleAmount {
    pub fn is_configured(&self) -> bool {
        self.fixed.is_some() || self.permille.is_some()
    }

    pub fn resolve(&self, scalar_magnitude: i64) -> i64 {
        self.fixed.unwrap_or(0) + self.permille.unwrap_or(0) * scalar_magnitude / 1000
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleEntry {
    #[serde(default)]
    pub energy: RuleAmount,
    #[serde(default)]
    pub entropy: RuleAmount,
}

/// `Universal` policy options: base costs plus ownership/type-keyed rules.
#[derive(Debug, Clone, Deserialize)]
pub struct UniversalOptions {
    #[serde(rename = "base-energy", default)]
    pub base_energy: i64,
    #[serde(rename = "base-entropy", default)]
    pub base_entropy: i64,
    #[serde(rename = "read-rules", default)]
    pub read_rules: HashMap<String, RuleEntry>,
    #[serde(rename = "write-rules", default)]
    pub write_rules: HashMap<String, RuleEntry>,
}

/// `Peek` policy options: `{base-energy, base-entropy, foreign-energy,
/// foreign-entropy}`, all optional and falling back to `PeekPolicy::default`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeekOptions {
    #[serde(rename = "base-energy")]
    pub base_energy: Option<i64>,
    #[serde(rename = "base-entropy")]
    pub base_entropy: Option<i64>,
    #[serde(rename = "foreign-energy")]
    pub foreign_energy: Option<i64>,
    #[serde(rename = "foreign-entropy")]
    pub foreign_entropy: Option<i64>,
}

/// `Poke` policy options: `{base-energy, base-entropy,
/// disable-occupied-short-circuit}`, all optional and falling back to
/// `PokePolicy::default`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PokeOptions {
    #[serde(rename = "base-energy")]
    pub base_energy: Option<i64>,
    #[serde(rename = "base-entropy")]
    pub base_entropy: Option<i64>,
    #[serde(rename = "disable-occupied-short-circuit")]
    pub disable_occupied_short_circuit: Option<bool>,
}

/// `PeekPoke` policy options: an inner `Peek` and `Poke` options pair, read
/// from `{peek: {...}, poke: {...}}`. Either or both may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeekPokeOptions {
    #[serde(default)]
    pub peek: PeekOptions,
    #[serde(default)]
    pub poke: PokeOptions,
}
