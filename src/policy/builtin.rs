//! Built-in thermodynamic policies. Grounded on the teacher's small
//! trait-object-per-behavior pattern in `vm/interpreter.rs` (an
//! interpreter step dispatches on an enum/trait rather than inlining every
//! case); here a `ThermodynamicPolicy` trait object is resolved once per
//! opcode and reused for the life of the simulation.

use crate::isa::instruction::ConflictStatus;
use crate::molecule::MoleculeType;
use crate::policy::config::{FixedCostOptions, PeekOptions, PeekPokeOptions, PokeOptions, RuleEntry, UniversalOptions};
use crate::policy::context::{OwnershipBucket, ThermodynamicContext};

/// Energy cost and entropy delta for one instruction execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cost {
    pub energy: i64,
    pub entropy: i64,
}

pub trait ThermodynamicPolicy: Send + Sync {
    fn cost(&self, ctx: &ThermodynamicContext) -> Cost;
}

fn is_losing(ctx: &ThermodynamicContext) -> bool {
    matches!(
        ctx.instruction.conflict_status,
        ConflictStatus::LostLowerIdWon | ConflictStatus::LostOtherReason
    )
}

/// `{energy, entropy}`, constant regardless of context. A losing
/// environment-modifying instruction is still charged the full fixed cost
/// under this policy (it has no concept of a reduced "base" cost).
pub struct FixedCostPolicy {
    pub energy: i64,
    pub entropy: i64,
}

impl FixedCostPolicy {
    pub fn from_options(options: &FixedCostOptions) -> Self {
        FixedCostPolicy {
            energy: options.energy.unwrap_or(1),
            entropy: options.entropy.unwrap_or(1),
        }
    }
}

impl Default for FixedCostPolicy {
    fn default() -> Self {
        FixedCostPolicy { energy: 1, entropy: 1 }
    }
}

impl ThermodynamicPolicy for FixedCostPolicy {
    fn cost(&self, _ctx: &ThermodynamicContext) -> Cost {
        Cost {
            energy: self.energy,
            entropy: self.entropy,
        }
    }
}

fn molecule_type_key(kind: MoleculeType) -> &'static str {
    match kind {
        MoleculeType::Code => "CODE",
        MoleculeType::Data => "DATA",
        MoleculeType::Energy => "ENERGY",
        MoleculeType::Structure => "STRUCTURE",
        MoleculeType::Label => "LABEL",
        MoleculeType::LabelRef => "LABELREF",
        MoleculeType::Register => "REGISTER",
        MoleculeType::Reserved => "RESERVED",
    }
}

fn lookup_rule<'a>(rules: &'a std::collections::HashMap<String, RuleEntry>, key: &str) -> Option<&'a RuleEntry> {
    rules.get(key).or_else(|| rules.get("_default"))
}

/// A unified policy configured with a base cost plus optional
/// ownership/type-keyed read and write rules. Read rules key on
/// `"<bucket>.<type>"` (falling back to `"<bucket>._default"`); write
/// rules key on `"<type>"` (falling back to `"_default"`).
pub struct UniversalPolicy {
    pub base_energy: i64,
    pub base_entropy: i64,
    pub read_rules: std::collections::HashMap<String, RuleEntry>,
    pub write_rules: std::collections::HashMap<String, RuleEntry>,
}

impl UniversalPolicy {
    pub fn from_options(options: &UniversalOptions) -> Self {
        UniversalPolicy {
            base_energy: options.base_energy,
            base_entropy: options.base_entropy,
            read_rules: options.read_rules.clone(),
            write_rules: options.write_rules.clone(),
        }
    }
}

impl ThermodynamicPolicy for UniversalPolicy {
    fn cost(&self, ctx: &ThermodynamicContext) -> Cost {
        let mut energy = self.base_energy;
        let mut entropy = self.base_entropy;

        if let Some(target) = &ctx.target {
            let bucket = OwnershipBucket::of(target.owner_id_at_target, ctx.organism.id);
            let type_key = molecule_type_key(target.molecule_at_target.kind());
            let magnitude = i64::from(target.molecule_at_target.value()).abs();

            let read_key = format!("{}.{}", bucket.as_key(), type_key);
            let read_default_key = format!("{}._default", bucket.as_key());
            if let Some(rule) = self.read_rules.get(&read_key).or_else(|| self.read_rules.get(&read_default_key)) {
                energy += rule.energy.resolve(magnitude);
                entropy += rule.entropy.resolve(magnitude);
            }

            if let Some(rule) = lookup_rule(&self.write_rules, type_key) {
                energy += rule.energy.resolve(magnitude);
                entropy += rule.entropy.resolve(magnitude);
            }
        }

        if is_losing(ctx) {
            return Cost {
                energy: self.base_energy,
                entropy: self.base_entropy,
            };
        }

        Cost { energy, entropy }
    }
}

/// Read-only policy: entropy-positive, never writes.
pub struct PeekPolicy {
    pub base_energy: i64,
    pub base_entropy: i64,
    pub foreign_energy: i64,
    pub foreign_entropy: i64,
}

impl Default for PeekPolicy {
    fn default() -> Self {
        PeekPolicy {
            base_energy: 1,
            base_entropy: 1,
            foreign_energy: 5,
            foreign_entropy: 5,
        }
    }
}

impl PeekPolicy {
    pub fn from_options(options: &PeekOptions) -> Self {
        let defaults = PeekPolicy::default();
        PeekPolicy {
            base_energy: options.base_energy.unwrap_or(defaults.base_energy),
            base_entropy: options.base_entropy.unwrap_or(defaults.base_entropy),
            foreign_energy: options.foreign_energy.unwrap_or(defaults.foreign_energy),
            foreign_entropy: options.foreign_entropy.unwrap_or(defaults.foreign_entropy),
        }
    }
}

impl ThermodynamicPolicy for PeekPolicy {
    fn cost(&self, ctx: &ThermodynamicContext) -> Cost {
        let foreign = ctx
            .target
            .as_ref()
            .map(|t| OwnershipBucket::of(t.owner_id_at_target, ctx.organism.id) == OwnershipBucket::Foreign)
            .unwrap_or(false);
        if foreign {
            Cost {
                energy: self.base_energy + self.foreign_energy,
                entropy: self.base_entropy + self.foreign_entropy,
            }
        } else {
            Cost {
                energy: self.base_energy,
                entropy: self.base_entropy,
            }
        }
    }
}

/// Write policy: entropy is typically negative (dissipation). A write
/// targeting an already-occupied cell costs zero, unless
/// `disable_occupied_short_circuit` is set (used when composed after a
/// Peek that just cleared the cell, in `PeekPokePolicy`).
pub struct PokePolicy {
    pub base_energy: i64,
    pub base_entropy: i64,
    pub disable_occupied_short_circuit: bool,
}

impl Default for PokePolicy {
    fn default() -> Self {
        PokePolicy {
            base_energy: 1,
            base_entropy: -1,
            disable_occupied_short_circuit: false,
        }
    }
}

impl PokePolicy {
    pub fn from_options(options: &PokeOptions) -> Self {
        let defaults = PokePolicy::default();
        PokePolicy {
            base_energy: options.base_energy.unwrap_or(defaults.base_energy),
            base_entropy: options.base_entropy.unwrap_or(defaults.base_entropy),
            disable_occupied_short_circuit: options.disable_occupied_short_circuit.unwrap_or(defaults.disable_occupied_short_circuit),
        }
    }
}

impl ThermodynamicPolicy for PokePolicy {
    fn cost(&self, ctx: &ThermodynamicContext) -> Cost {
        if !self.disable_occupied_short_circuit {
            if let Some(target) = &ctx.target {
                if !target.molecule_at_target.is_empty()
                    && matches!(ctx.instruction.conflict_status, ConflictStatus::LostTargetOccupied)
                {
                    return Cost { energy: 0, entropy: 0 };
                }
            }
        }
        Cost {
            energy: self.base_energy,
            entropy: self.base_entropy,
        }
    }
}

/// Peek followed by Poke, for the combined PPK* instruction family. The
/// inner Poke's occupied-target short circuit is disabled: the preceding
/// Peek already cleared the cell this tick, so "occupied" no longer means
/// "would overwrite".
pub struct PeekPokePolicy {
    pub peek: PeekPolicy,
    pub poke: PokePolicy,
}

impl Default for PeekPokePolicy {
    fn default() -> Self {
        PeekPokePolicy {
            peek: PeekPolicy::default(),
            poke: PokePolicy {
                disable_occupied_short_circuit: true,
                ..PokePolicy::default()
            },
        }
    }
}

impl PeekPokePolicy {
    pub fn from_options(options: &PeekPokeOptions) -> Self {
        let poke_defaults = PokePolicy { disable_occupied_short_circuit: true, ..PokePolicy::default() };
        PeekPokePolicy {
            peek: PeekPolicy::from_options(&options.peek),
            poke: PokePolicy {
                base_energy: options.poke.base_energy.unwrap_or(poke_defaults.base_energy),
                base_entropy: options.poke.base_entropy.unwrap_or(poke_defaults.base_entropy),
                disable_occupied_short_circuit: options.poke.disable_occupied_short_circuit.unwrap_or(poke_defaults.disable_occupied_short_circuit),
            },
        }
    }
}

impl ThermodynamicPolicy for PeekPokePolicy {
    fn cost(&self, ctx: &ThermodynamicContext) -> Cost {
        let peek_cost = self.peek.cost(ctx);
        let poke_cost = self.poke.cost(ctx);
        Cost {
            energy: peek_cost.energy + poke_cost.energy,
            entropy: peek_cost.entropy + poke_cost.entropy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;
    use crate::isa::instruction::Instruction;
    use crate::molecule::Molecule;
    use crate::organism::Organism;
    use crate::policy::context::TargetInfo;

    #[test]
    fn fixed_cost_ignores_context() {
        let policy = FixedCostPolicy { energy: 3, entropy: 2 };
        let instruction = Instruction::nop(1, Coord::new(vec![0, 0]));
        let organism = Organism::new(1, vec![0, 0]);
        let ctx = ThermodynamicContext::new(&instruction, &organism, &[], None);
        let cost = policy.cost(&ctx);
        assert_eq!(cost, Cost { energy: 3, entropy: 2 });
    }

    #[test]
    fn poke_short_circuits_on_occupied_loss() {
        let policy = PokePolicy::default();
        let mut instruction = Instruction::nop(1, Coord::new(vec![0, 0]));
        instruction.conflict_status = ConflictStatus::LostTargetOccupied;
        let organism = Organism::new(1, vec![0, 0]);
        let target = TargetInfo {
            coord: Coord::new(vec![1, 1]),
            molecule_at_target: Molecule::new(MoleculeType::Data, 1, 0),
            owner_id_at_target: 9,
        };
        let ctx = ThermodynamicContext::new(&instruction, &organism, &[], Some(target));
        assert_eq!(policy.cost(&ctx), Cost { energy: 0, entropy: 0 });
    }

    #[test]
    fn peek_charges_foreign_penalty() {
        let policy = PeekPolicy::default();
        let instruction = Instruction::nop(1, Coord::new(vec![0, 0]));
        let organism = Organism::new(1, vec![0, 0]);
        let target = TargetInfo {
            coord: Coord::new(vec![1, 1]),
            molecule_at_target: Molecule::new(MoleculeType::Data, 5, 0),
            owner_id_at_target: 2,
        };
        let ctx = ThermodynamicContext::new(&instruction, &organism, &[], Some(target));
        let cost = policy.cost(&ctx);
        assert_eq!(cost.energy, policy.base_energy + policy.foreign_energy);
    }
}
