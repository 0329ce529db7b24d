//! The six closed operand kinds and their resolution against an organism's
//! registers and the data stack. Grounded on the teacher's `Instruction`
//! shape in `vm/bytecode.rs`, which pairs an opcode with a fixed small
//! vector of operands decoded ahead of execution.

use serde::{Deserialize, Serialize};

use crate::molecule::{Molecule, MoleculeType};
use crate::organism::Organism;

/// Numeric base offsets for the four register banks. A register operand's
/// raw index falls into exactly one bank by range.
pub const DR_BASE: u32 = 0;
pub const PR_BASE: u32 = 1000;
pub const FPR_BASE: u32 = 2000;
pub const LR_BASE: u32 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterBank {
    Data,
    Procedure,
    FormalParameter,
    Location,
}

/// Resolves a raw register index into its bank and local offset.
pub fn bank_of(raw_index: u32) -> (RegisterBank, u32) {
    if raw_index >= LR_BASE {
        (RegisterBank::Location, raw_index - LR_BASE)
    } else if raw_index >= FPR_BASE {
        (RegisterBank::FormalParameter, raw_index - FPR_BASE)
    } else if raw_index >= PR_BASE {
        (RegisterBank::Procedure, raw_index - PR_BASE)
    } else {
        (RegisterBank::Data, raw_index - DR_BASE)
    }
}

/// The closed set of operand kinds an instruction signature can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    Register,
    LocationRegister,
    Immediate,
    Literal,
    Vector,
    Label,
}

/// An operand slot as it appears embedded in an instruction's machine code:
/// one molecule for scalar kinds, one molecule per axis for `Vector`/`Label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawOperand {
    Scalar(Molecule),
    Axes(Vec<Molecule>),
}

impl RawOperand {
    pub fn cell_count(&self) -> usize {
        match self {
            RawOperand::Scalar(_) => 1,
            RawOperand::Axes(axes) => axes.len(),
        }
    }
}

/// A fully resolved operand: the value an instruction body actually
/// operates on, after reading through registers or the data stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedOperand {
    Value(i64),
    Coordinate(Vec<i64>),
    RegisterIndex(u32),
}

impl ResolvedOperand {
    pub fn as_value(&self) -> Option<i64> {
        match self {
            ResolvedOperand::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_coordinate(&self) -> Option<&[i64]> {
        match self {
            ResolvedOperand::Coordinate(axes) => Some(axes),
            _ => None,
        }
    }

    pub fn as_register_index(&self) -> Option<u32> {
        match self {
            ResolvedOperand::RegisterIndex(idx) => Some(*idx),
            _ => None,
        }
    }
}

/// Resolves one raw operand against an organism's current register state.
/// Does not mutate the organism: stack-backed reads are peeked here and
/// only committed by the caller once the whole instruction is known to
/// execute (see [`crate::vm::Vm::execute`]).
pub fn resolve_operand(kind: OperandKind, raw: &RawOperand, organism: &Organism) -> ResolvedOperand {
    match (kind, raw) {
        (OperandKind::Immediate, RawOperand::Scalar(mol)) => ResolvedOperand::Value(mol.value_signed()),
        (OperandKind::Literal, RawOperand::Scalar(mol)) => ResolvedOperand::Value(i64::from(mol.value())),
        (OperandKind::Register, RawOperand::Scalar(mol)) => ResolvedOperand::RegisterIndex(mol.value()),
        (OperandKind::LocationRegister, RawOperand::Scalar(mol)) => {
            let raw_index = mol.value();
            let coord = organism.read_location_register(raw_index);
            ResolvedOperand::Coordinate(coord.axes().to_vec())
        }
        (OperandKind::Vector, RawOperand::Axes(axes)) | (OperandKind::Label, RawOperand::Axes(axes)) => {
            ResolvedOperand::Coordinate(axes.iter().map(|m| m.value_signed()).collect())
        }
        _ => panic!("operand kind {kind:?} does not match its raw shape"),
    }
}

/// Reads the molecule underlying a register operand without interpreting
/// it, for opcodes that want the raw register value (e.g. `SETR`'s source).
pub fn register_molecule(mol: Molecule) -> MoleculeType {
    mol.kind()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_of_splits_by_numeric_range() {
        assert_eq!(bank_of(0), (RegisterBank::Data, 0));
        assert_eq!(bank_of(5), (RegisterBank::Data, 5));
        assert_eq!(bank_of(1000), (RegisterBank::Procedure, 0));
        assert_eq!(bank_of(2003), (RegisterBank::FormalParameter, 3));
        assert_eq!(bank_of(3007), (RegisterBank::Location, 7));
    }

    #[test]
    fn immediate_resolves_to_signed_value() {
        let mol = Molecule::new_signed(MoleculeType::Data, -9, 0);
        let raw = RawOperand::Scalar(mol);
        let organism = Organism::new(1, vec![0, 0]);
        let resolved = resolve_operand(OperandKind::Immediate, &raw, &organism);
        assert_eq!(resolved.as_value(), Some(-9));
    }

    #[test]
    fn vector_resolves_to_axis_list() {
        let axes = vec![
            Molecule::new_signed(MoleculeType::Data, 1, 0),
            Molecule::new_signed(MoleculeType::Data, -1, 0),
        ];
        let raw = RawOperand::Axes(axes);
        let organism = Organism::new(1, vec![0, 0]);
        let resolved = resolve_operand(OperandKind::Vector, &raw, &organism);
        assert_eq!(resolved.as_coordinate(), Some(&[1i64, -1][..]));
    }
}
