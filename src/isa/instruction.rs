//! A single planned action bound to one organism for one tick. Grounded on
//! the teacher's `Instruction` (`vm/bytecode.rs`): opcode plus a fixed small
//! operand vector, decoded once and reused by both the conflict resolver
//! and the executor.

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::isa::opcode::OpcodeId;
use crate::isa::operand::{RawOperand, ResolvedOperand};

/// Outcome of conflict resolution for one instruction, set during step 4
/// of the tick (see `sim::conflict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStatus {
    NotApplicable,
    WonExecution,
    LostLowerIdWon,
    LostTargetOccupied,
    LostTargetEmpty,
    LostOtherReason,
}

/// A per-tick planned instruction bound to one organism.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub organism_id: u64,
    pub opcode_id: Option<OpcodeId>,
    pub ip_at_plan: Coord,
    pub raw_args: Vec<RawOperand>,
    pub resolved: Vec<ResolvedOperand>,
    pub length: usize,
    pub executed_in_tick: bool,
    pub conflict_status: ConflictStatus,
    target_coordinates: Vec<Coord>,
}

impl Instruction {
    pub fn nop(organism_id: u64, ip_at_plan: Coord) -> Self {
        Instruction {
            organism_id,
            opcode_id: None,
            ip_at_plan,
            raw_args: Vec::new(),
            resolved: Vec::new(),
            length: 1,
            executed_in_tick: false,
            conflict_status: ConflictStatus::NotApplicable,
            target_coordinates: Vec::new(),
        }
    }

    pub fn new(
        organism_id: u64,
        opcode_id: OpcodeId,
        ip_at_plan: Coord,
        raw_args: Vec<RawOperand>,
        length: usize,
    ) -> Self {
        Instruction {
            organism_id,
            opcode_id: Some(opcode_id),
            ip_at_plan,
            raw_args,
            resolved: Vec::new(),
            length,
            executed_in_tick: false,
            conflict_status: ConflictStatus::NotApplicable,
            target_coordinates: Vec::new(),
        }
    }

    pub fn with_target_coordinates(mut self, targets: Vec<Coord>) -> Self {
        self.target_coordinates = targets;
        self
    }

    pub fn set_target_coordinates(&mut self, targets: Vec<Coord>) {
        self.target_coordinates = targets;
    }

    pub fn target_coordinates(&self) -> &[Coord] {
        &self.target_coordinates
    }

    pub fn is_environment_modifying(&self) -> bool {
        !self.target_coordinates.is_empty()
    }

    pub fn first_target(&self) -> Option<&Coord> {
        self.target_coordinates.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_has_no_targets_and_unit_length() {
        let i = Instruction::nop(1, Coord::new(vec![0, 0]));
        assert!(!i.is_environment_modifying());
        assert_eq!(i.length, 1);
        assert_eq!(i.conflict_status, ConflictStatus::NotApplicable);
    }

    #[test]
    fn instruction_with_targets_is_environment_modifying() {
        let i = Instruction::nop(1, Coord::new(vec![0, 0]))
            .with_target_coordinates(vec![Coord::new(vec![1, 1])]);
        assert!(i.is_environment_modifying());
        assert_eq!(i.first_target(), Some(&Coord::new(vec![1, 1])));
    }
}
