//! Compile-time-known table of instructions keyed by a dense opcode id.
//! Generalizes the teacher's `#[repr(u8)] enum OpCode` + match-based
//! dispatch (`vm/interpreter.rs`) into a table the gene-mutation subsystem
//! can also query by family/variant group and by instruction length.

use std::sync::OnceLock;

use crate::isa::opcode::{Family, OpcodeId, Variant};
use crate::isa::operand::OperandKind;
use crate::isa::ops;
use crate::vm::ExecutionOutcome;
use crate::vm::ExecutionContext;

pub type InstructionBody = fn(&mut ExecutionContext, &[crate::isa::operand::ResolvedOperand]) -> ExecutionOutcome;

/// One registered instruction: its identity, operand signature and body.
pub struct InstructionDef {
    pub name: &'static str,
    pub opcode: OpcodeId,
    pub signature: Vec<OperandKind>,
    pub body: InstructionBody,
}

impl InstructionDef {
    /// Length in cells: one opcode cell plus one per scalar operand, or
    /// `rank` per VECTOR/LABEL operand (they carry one cell per axis).
    pub fn length_for_rank(&self, rank: usize) -> usize {
        1 + self
            .signature
            .iter()
            .map(|kind| match kind {
                OperandKind::Vector | OperandKind::Label => rank,
                _ => 1,
            })
            .sum::<usize>()
    }
}

/// The opcode table. Built once by [`Registry::init`]; every opcode id in
/// a well-formed program refers to an entry here.
pub struct Registry {
    defs: Vec<InstructionDef>,
}

impl Registry {
    /// Registers every built-in instruction. Idempotent in the sense that
    /// repeated calls build an equivalent, independently-usable table —
    /// there is no global mutable state to race on.
    pub fn init() -> Self {
        let defs = vec![
            InstructionDef {
                name: "NOP",
                opcode: OpcodeId::encode(Family::Control, 0, Variant::Plain),
                signature: vec![],
                body: ops::op_nop,
            },
            InstructionDef {
                name: "SETI",
                opcode: OpcodeId::encode(Family::DataMovement, 0, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Immediate],
                body: ops::op_seti,
            },
            InstructionDef {
                name: "SETR",
                opcode: OpcodeId::encode(Family::DataMovement, 0, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::Register],
                body: ops::op_setr,
            },
            InstructionDef {
                name: "ADDI",
                opcode: OpcodeId::encode(Family::Arithmetic, 0, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Immediate],
                body: ops::op_addi,
            },
            InstructionDef {
                name: "ADDR",
                opcode: OpcodeId::encode(Family::Arithmetic, 0, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::Register],
                body: ops::op_addr,
            },
            InstructionDef {
                name: "SUBI",
                opcode: OpcodeId::encode(Family::Arithmetic, 1, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Immediate],
                body: ops::op_subi,
            },
            InstructionDef {
                name: "SUBR",
                opcode: OpcodeId::encode(Family::Arithmetic, 1, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::Register],
                body: ops::op_subr,
            },
            InstructionDef {
                name: "MULI",
                opcode: OpcodeId::encode(Family::Arithmetic, 2, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Immediate],
                body: ops::op_muli,
            },
            InstructionDef {
                name: "MULR",
                opcode: OpcodeId::encode(Family::Arithmetic, 2, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::Register],
                body: ops::op_mulr,
            },
            InstructionDef {
                name: "JMPI",
                opcode: OpcodeId::encode(Family::Control, 1, Variant::Immediate),
                signature: vec![OperandKind::Label],
                body: ops::op_jmpi,
            },
            InstructionDef {
                name: "JMPR",
                opcode: OpcodeId::encode(Family::Control, 1, Variant::Register),
                signature: vec![OperandKind::Register],
                body: ops::op_jmpr,
            },
            InstructionDef {
                name: "POKI",
                opcode: OpcodeId::encode(Family::WorldAccess, 0, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Vector],
                body: ops::op_poki,
            },
            InstructionDef {
                name: "POKR",
                opcode: OpcodeId::encode(Family::WorldAccess, 0, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::LocationRegister],
                body: ops::op_pokr,
            },
            InstructionDef {
                name: "PEKI",
                opcode: OpcodeId::encode(Family::WorldAccess, 1, Variant::Immediate),
                signature: vec![OperandKind::Register, OperandKind::Vector],
                body: ops::op_peki,
            },
            InstructionDef {
                name: "PEKR",
                opcode: OpcodeId::encode(Family::WorldAccess, 1, Variant::Register),
                signature: vec![OperandKind::Register, OperandKind::LocationRegister],
                body: ops::op_pekr,
            },
            InstructionDef {
                name: "PUSH",
                opcode: OpcodeId::encode(Family::Stack, 0, Variant::Immediate),
                signature: vec![OperandKind::Immediate],
                body: ops::op_push,
            },
            InstructionDef {
                name: "POP",
                opcode: OpcodeId::encode(Family::Stack, 1, Variant::Plain),
                signature: vec![OperandKind::Register],
                body: ops::op_pop,
            },
            InstructionDef {
                name: "FORK",
                opcode: OpcodeId::encode(Family::Reproduction, 0, Variant::Plain),
                signature: vec![OperandKind::Vector],
                body: ops::op_fork,
            },
        ];
        Registry { defs }
    }

    pub fn all(&self) -> &[InstructionDef] {
        &self.defs
    }

    pub fn find_by_id(&self, id: OpcodeId) -> Option<&InstructionDef> {
        self.defs.iter().find(|d| d.opcode == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&InstructionDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    pub fn signature_of(&self, id: OpcodeId) -> Option<&[OperandKind]> {
        self.find_by_id(id).map(|d| d.signature.as_slice())
    }

    pub fn length_of(&self, id: OpcodeId, rank: usize) -> Option<usize> {
        self.find_by_id(id).map(|d| d.length_for_rank(rank))
    }

    /// Opcode ids sharing a family and instruction length for a given
    /// environment rank, i.e. the candidate pool for a family-preserving,
    /// length-preserving CODE mutation.
    pub fn same_family_same_length(&self, id: OpcodeId, rank: usize) -> Vec<OpcodeId> {
        let Some(def) = self.find_by_id(id) else { return Vec::new() };
        let target_len = def.length_for_rank(rank);
        let target_family = id.family_bits();
        self.defs
            .iter()
            .filter(|d| d.opcode.family_bits() == target_family && d.length_for_rank(rank) == target_len)
            .map(|d| d.opcode)
            .collect()
    }

    /// Opcode ids sharing a variant (arity group) and instruction length,
    /// the candidate pool for a variant-preserving CODE mutation.
    pub fn same_variant_same_length(&self, id: OpcodeId, rank: usize) -> Vec<OpcodeId> {
        let Some(def) = self.find_by_id(id) else { return Vec::new() };
        let target_len = def.length_for_rank(rank);
        let target_variant = id.variant_bits();
        self.defs
            .iter()
            .filter(|d| d.opcode.variant_bits() == target_variant && d.length_for_rank(rank) == target_len)
            .map(|d| d.opcode)
            .collect()
    }

    /// All opcode ids of the same instruction length, the candidate pool
    /// for an operation-flip mutation (any family, any variant).
    pub fn same_length(&self, id: OpcodeId, rank: usize) -> Vec<OpcodeId> {
        let Some(def) = self.find_by_id(id) else { return Vec::new() };
        let target_len = def.length_for_rank(rank);
        self.defs
            .iter()
            .filter(|d| d.length_for_rank(rank) == target_len)
            .map(|d| d.opcode)
            .collect()
    }
}

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, built once on first access.
pub fn global() -> &'static Registry {
    GLOBAL_REGISTRY.get_or_init(Registry::init)
}
