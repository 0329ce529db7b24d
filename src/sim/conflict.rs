//! Conflict resolution: one winner per contested coordinate, chosen by
//! lowest organism id. Grounded on spec §4.6 step 4; no teacher precedent
//! (the notebook VM has no concurrent writers), written in the same
//! "derive then mutate a parallel Vec" style as `sim::mod`'s tick loop.

use std::collections::HashMap;

use crate::coord::Coord;
use crate::isa::instruction::{ConflictStatus, Instruction};
use crate::isa::registry::Registry;
use crate::world::Environment;

/// Groups environment-modifying instructions by every coordinate they
/// target and marks exactly one winner per coordinate; everything else is
/// marked `executedInTick=true` immediately (non-modifying instructions,
/// and modifying ones with no target at all). An uncontested or
/// contention-winning POKE whose target cell is already occupied wins the
/// coordinate but is marked `LostTargetOccupied` rather than
/// `WonExecution`, so the thermodynamic policy's occupied-write short
/// circuit (spec §4.3) has something real to key off.
pub fn resolve_conflicts(instructions: &mut [Instruction], environment: &Environment, registry: &Registry) {
    let mut buckets: HashMap<Coord, Vec<usize>> = HashMap::new();
    for (idx, instruction) in instructions.iter().enumerate() {
        if instruction.is_environment_modifying() {
            for coord in instruction.target_coordinates() {
                buckets.entry(coord.clone()).or_default().push(idx);
            }
        } else {
            // marked below, outside the borrow
        }
    }

    for instruction in instructions.iter_mut() {
        if !instruction.is_environment_modifying() {
            instruction.executed_in_tick = true;
        }
    }

    for mut indices in buckets.into_values() {
        indices.sort_by_key(|&i| instructions[i].organism_id);
        let winner = indices[0];
        instructions[winner].executed_in_tick = true;
        instructions[winner].conflict_status = winner_status(&instructions[winner], environment, registry);
        for &loser in &indices[1..] {
            instructions[loser].executed_in_tick = false;
            instructions[loser].conflict_status = ConflictStatus::LostLowerIdWon;
        }
    }
}

fn is_poke(instruction: &Instruction, registry: &Registry) -> bool {
    instruction
        .opcode_id
        .and_then(|id| registry.find_by_id(id))
        .map(|def| def.name == "POKI" || def.name == "POKR")
        .unwrap_or(false)
}

fn winner_status(instruction: &Instruction, environment: &Environment, registry: &Registry) -> ConflictStatus {
    if is_poke(instruction, registry) {
        if let Some(target) = instruction.first_target() {
            if !environment.get_molecule(target).is_empty() {
                return ConflictStatus::LostTargetOccupied;
            }
        }
    }
    ConflictStatus::WonExecution
}
