//! Birth-time mutation hooks. Grounded on the teacher's small-trait
//! "pluggable step" pattern (`vm/interpreter.rs` dispatches to pluggable
//! opcode handlers); here the pluggable unit is a post-birth genome
//! mutation rather than an execution step.

use rand::Rng;

use crate::config::GeneSubstitutionConfig;
use crate::isa::opcode::OpcodeId;
use crate::isa::registry::Registry;
use crate::molecule::{Molecule, MoleculeType, VALUE_MASK};
use crate::organism::Organism;
use crate::random::RandomProvider;
use crate::world::Environment;

/// Called once per newborn organism, after execute, for every registered
/// handler (spec §4.7). Must not touch any organism but `child`.
pub trait BirthHandler {
    fn on_birth(&mut self, child: &mut Organism, env: &mut Environment, registry: &Registry);

    /// Stateless handlers return an empty byte sequence.
    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    fn load_state(&mut self, _bytes: &[u8]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeneKind {
    Code,
    Data,
    Register,
    Label,
    LabelRef,
}

fn gene_kind_of(kind: MoleculeType) -> Option<GeneKind> {
    match kind {
        MoleculeType::Code => Some(GeneKind::Code),
        MoleculeType::Data => Some(GeneKind::Data),
        MoleculeType::Register => Some(GeneKind::Register),
        MoleculeType::Label => Some(GeneKind::Label),
        MoleculeType::LabelRef => Some(GeneKind::LabelRef),
        MoleculeType::Energy | MoleculeType::Structure | MoleculeType::Reserved => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlipMode {
    Operation,
    Family,
    Variant,
}

/// Representative built-in handler: single-point substitution mutation,
/// applied with probability `substitution_rate` to one weighted-randomly
/// selected owned cell of the newborn's genome.
pub struct GeneSubstitution {
    config: GeneSubstitutionConfig,
    random: Box<dyn RandomProvider>,
}

impl GeneSubstitution {
    pub fn new(config: GeneSubstitutionConfig, random: Box<dyn RandomProvider>) -> Self {
        GeneSubstitution { config, random }
    }

    fn weight_for(&self, kind: GeneKind) -> f64 {
        let w = &self.config.selection_weights;
        match kind {
            GeneKind::Code => w.code,
            GeneKind::Data => w.data,
            GeneKind::Register => w.register,
            GeneKind::Label => w.label,
            GeneKind::LabelRef => w.label_ref,
        }
    }

    /// Weighted reservoir sampling over the child's owned, mutation-eligible
    /// cells: one pass, O(1) extra memory, exact weighted selection.
    fn select_cell(&self, child: &Organism, env: &Environment, rng: &mut dyn rand::RngCore) -> Option<usize> {
        let mut chosen = None;
        let mut total_weight = 0.0f64;
        let mut owned: Vec<usize> = env.get_cells_owned_by(child.id).iter().copied().collect();
        owned.sort_unstable();
        for flat_index in owned {
            let molecule = Molecule::from_int(env.get_molecule_int(flat_index));
            let Some(kind) = gene_kind_of(molecule.kind()) else { continue };
            if molecule.is_empty() {
                continue;
            }
            let weight = self.weight_for(kind);
            if weight <= 0.0 {
                continue;
            }
            total_weight += weight;
            if rng.gen::<f64>() < weight / total_weight {
                chosen = Some(flat_index);
            }
        }
        chosen
    }

    fn pick_flip_mode(&self, rng: &mut dyn rand::RngCore) -> FlipMode {
        let w = &self.config.flip_mode_weights;
        let total = w.operation + w.family + w.variant;
        let mut pick = rng.gen::<f64>() * total;
        if pick < w.operation {
            return FlipMode::Operation;
        }
        pick -= w.operation;
        if pick < w.family {
            return FlipMode::Family;
        }
        FlipMode::Variant
    }

    fn mutate_code(&self, registry: &Registry, current: OpcodeId, rank: usize, rng: &mut dyn rand::RngCore) -> OpcodeId {
        let mode = self.pick_flip_mode(rng);
        let candidates = match mode {
            FlipMode::Operation => registry.same_length(current, rank),
            FlipMode::Family => registry.same_family_same_length(current, rank),
            FlipMode::Variant => registry.same_variant_same_length(current, rank),
        };
        if candidates.is_empty() {
            return current;
        }
        let idx = rng.gen_range(0..candidates.len());
        candidates[idx]
    }

    fn mutate_register(&self, value: u32, rng: &mut dyn rand::RngCore) -> u32 {
        use crate::isa::operand::{bank_of, DR_BASE, FPR_BASE, LR_BASE, PR_BASE};
        use crate::isa::operand::RegisterBank;
        use crate::organism::{NUM_DATA_REGISTERS, NUM_FORMAL_PARAM_REGISTERS, NUM_LOCATION_REGISTERS, NUM_PROC_REGISTERS};
        let (bank, offset) = bank_of(value);
        let delta: i64 = if rng.gen_bool(0.5) { 1 } else { -1 };
        let (base, bank_size) = match bank {
            RegisterBank::Data => (DR_BASE, NUM_DATA_REGISTERS),
            RegisterBank::Procedure => (PR_BASE, NUM_PROC_REGISTERS),
            RegisterBank::FormalParameter => (FPR_BASE, NUM_FORMAL_PARAM_REGISTERS),
            RegisterBank::Location => (LR_BASE, NUM_LOCATION_REGISTERS),
        };
        let new_offset = (offset as i64 + delta).clamp(0, bank_size as i64 - 1) as u32;
        base + new_offset
    }

    fn mutate_data(&self, value: i64, rng: &mut dyn rand::RngCore) -> i64 {
        let magnitude = (value.unsigned_abs() as f64).powf(self.config.data_perturbation_exponent);
        let delta = magnitude.round().max(1.0) as i64;
        let offset = rng.gen_range(-delta..=delta);
        (value + offset).clamp(0, i64::from(VALUE_MASK))
    }

    fn mutate_label_bits(&self, value: u32, rng: &mut dyn rand::RngCore) -> u32 {
        let mut v = value;
        for _ in 0..self.config.label_bit_flip_count {
            let bit = rng.gen_range(0..19);
            v ^= 1 << bit;
        }
        v
    }
}

impl BirthHandler for GeneSubstitution {
    fn on_birth(&mut self, child: &mut Organism, env: &mut Environment, registry: &Registry) {
        let derived = self.random.derive_for("geneSubstitution", child.id);
        let mut rng = derived.as_rng();
        if !rng.gen_bool(self.config.substitution_rate.clamp(0.0, 1.0)) {
            return;
        }
        let Some(flat_index) = self.select_cell(child, env, rng.as_mut()) else {
            return;
        };
        let molecule = Molecule::from_int(env.get_molecule_int(flat_index));
        let rank = env.shape().rank();

        let mutated = match molecule.kind() {
            MoleculeType::Code => {
                let mutated_id = self.mutate_code(registry, OpcodeId(molecule.value()), rank, rng.as_mut());
                Molecule::new(MoleculeType::Code, mutated_id.value(), molecule.marker())
            }
            MoleculeType::Register => {
                let mutated_value = self.mutate_register(molecule.value(), rng.as_mut());
                Molecule::new(MoleculeType::Register, mutated_value, molecule.marker())
            }
            MoleculeType::Data => {
                // Spec clamps the mutated result to [0, VALUE_MASK], the
                // unsigned range, so it is written back unsigned rather
                // than through the signed two's-complement encoding.
                let mutated_value = self.mutate_data(molecule.value_signed(), rng.as_mut());
                Molecule::new(MoleculeType::Data, mutated_value as u32, molecule.marker())
            }
            MoleculeType::Label | MoleculeType::LabelRef => {
                let mutated_value = self.mutate_label_bits(molecule.value(), rng.as_mut());
                Molecule::new(molecule.kind(), mutated_value, molecule.marker())
            }
            _ => return,
        };

        let owner = env.get_owner_by_index(flat_index);
        env.set_molecule_by_index(flat_index, mutated, owner);
    }
}
