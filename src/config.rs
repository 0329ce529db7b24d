//! Top-level configuration surfaces not owned by `policy::config`. Loading
//! the surrounding HOCON document is an external collaborator; these are
//! just the `serde::Deserialize` shapes it populates.

use serde::Deserialize;

/// Read once per organism creation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrganismConfig {
    #[serde(rename = "max-energy")]
    pub max_energy: i64,
    #[serde(rename = "max-entropy")]
    pub max_entropy: i64,
    #[serde(rename = "error-penalty-cost")]
    pub error_penalty_cost: i64,
}

impl Default for OrganismConfig {
    fn default() -> Self {
        OrganismConfig {
            max_energy: 32767,
            max_entropy: 8191,
            error_penalty_cost: 10,
        }
    }
}

/// World shape and topology, read once at bootstrap.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub extents: Vec<i64>,
    #[serde(default = "default_toroidal")]
    pub toroidal: bool,
}

fn default_toroidal() -> bool {
    true
}

/// Per-type selection weights and mutation rules for gene substitution,
/// and the per-birth substitution rate.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneSubstitutionConfig {
    #[serde(rename = "substitution-rate", default = "default_substitution_rate")]
    pub substitution_rate: f64,
    #[serde(rename = "selection-weights", default)]
    pub selection_weights: SelectionWeights,
    #[serde(rename = "flip-mode-weights", default)]
    pub flip_mode_weights: FlipModeWeights,
    #[serde(rename = "data-perturbation-exponent", default = "default_exponent")]
    pub data_perturbation_exponent: f64,
    #[serde(rename = "label-bit-flip-count", default = "default_bit_flip_count")]
    pub label_bit_flip_count: u32,
}

fn default_substitution_rate() -> f64 {
    0.01
}

fn default_exponent() -> f64 {
    0.5
}

fn default_bit_flip_count() -> u32 {
    1
}

impl Default for GeneSubstitutionConfig {
    fn default() -> Self {
        GeneSubstitutionConfig {
            substitution_rate: default_substitution_rate(),
            selection_weights: SelectionWeights::default(),
            flip_mode_weights: FlipModeWeights::default(),
            data_perturbation_exponent: default_exponent(),
            label_bit_flip_count: default_bit_flip_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SelectionWeights {
    #[serde(default = "one")]
    pub code: f64,
    #[serde(default = "one")]
    pub data: f64,
    #[serde(default = "one")]
    pub register: f64,
    #[serde(default = "one")]
    pub label: f64,
    #[serde(default = "one")]
    pub label_ref: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for SelectionWeights {
    fn default() -> Self {
        SelectionWeights {
            code: 1.0,
            data: 1.0,
            register: 1.0,
            label: 1.0,
            label_ref: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FlipModeWeights {
    #[serde(default = "one")]
    pub operation: f64,
    #[serde(default = "one")]
    pub family: f64,
    #[serde(default = "one")]
    pub variant: f64,
}

impl Default for FlipModeWeights {
    fn default() -> Self {
        FlipModeWeights {
            operation: 1.0,
            family: 1.0,
            variant: 1.0,
        }
    }
}
