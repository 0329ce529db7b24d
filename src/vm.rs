//! Plan/execute loop for one organism's instruction. Grounded on the
//! teacher's `vm/interpreter.rs` fetch-decode-execute shape, generalized
//! from a flat bytecode tape to molecules read out of a toroidal
//! environment through a registry-resolved planner.

use tracing::warn;

use crate::coord::Coord;
use crate::isa::instruction::Instruction;
use crate::isa::opcode::OpcodeId;
use crate::isa::operand::{resolve_operand, OperandKind, RawOperand};
use crate::isa::registry::Registry;
use std::cell::RefCell;

use crate::label_index::LabelIndex;
use crate::molecule::MoleculeType;
use crate::organism::{LastExecutionRecord, Organism};
use crate::policy::context::{TargetInfo, ThermodynamicContext};
use crate::policy::manager::PolicyManager;
use crate::random::RandomProvider;
use crate::world::Environment;

/// Whether an instruction body succeeded or requested a recorded failure.
/// Never propagated as a `Result` out of [`Vm::execute`] — see
/// [`crate::error`] for why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Ok,
    Failed(String),
}

impl ExecutionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed(_))
    }
}

/// Everything one instruction body needs: the acting organism, the world,
/// and the read-only collaborators it may consult (label index, program
/// artifact debug data, random provider for fuzzy jumps and anything
/// stochastic a future instruction might need).
pub struct ExecutionContext<'a> {
    pub organism: &'a mut Organism,
    pub environment: &'a mut Environment,
    pub label_index: Option<&'a RefCell<LabelIndex>>,
    pub random: Option<&'a dyn RandomProvider>,
    /// Set by a body that jumps (`JMPI`/`JMPR`) or otherwise wants the VM
    /// to skip its own IP-advance step.
    pub requested_ip: Option<Coord>,
    /// From the organism's config; charged on top of the policy cost
    /// whenever the body records `instructionFailed`.
    pub error_penalty_cost: i64,
    /// Newborns spawned this instruction (`FORK`); the simulation appends
    /// these to the active list after the execute phase (spec §4.6 step 6).
    pub newborns: &'a mut Vec<Organism>,
    pub next_organism_id: &'a mut u64,
    pub current_tick: u64,
}

impl<'a> ExecutionContext<'a> {
    pub fn request_jump(&mut self, ip: Coord) {
        self.requested_ip = Some(ip);
        self.organism.skip_ip_advance = true;
    }
}

pub struct Vm<'r> {
    registry: &'r Registry,
}

impl<'r> Vm<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Vm { registry }
    }

    fn decode_raw_args(&self, environment: &Environment, ip: &Coord, dv: &Coord, signature: &[OperandKind], rank: usize) -> Vec<RawOperand> {
        let mut cursor = ip.add(dv);
        let mut args = Vec::with_capacity(signature.len());
        for kind in signature {
            match kind {
                OperandKind::Vector | OperandKind::Label => {
                    let mut axes = Vec::with_capacity(rank);
                    for _ in 0..rank {
                        axes.push(environment.get_molecule(&cursor));
                        cursor = cursor.add(dv);
                    }
                    args.push(RawOperand::Axes(axes));
                }
                _ => {
                    args.push(RawOperand::Scalar(environment.get_molecule(&cursor)));
                    cursor = cursor.add(dv);
                }
            }
        }
        args
    }

    /// Reads the molecule at the organism's IP and materializes an
    /// `Instruction`. Non-CODE or empty cells, or unknown opcode ids,
    /// plan a NOP (marking `instructionFailed` in the unknown-id case).
    pub fn plan(&self, organism: &mut Organism, environment: &Environment) -> Instruction {
        organism.reset_per_tick_state();
        let ip = organism.ip.clone();
        let cell = environment.get_molecule(&ip);

        if cell.is_empty() || cell.kind() != MoleculeType::Code {
            return Instruction::nop(organism.id, ip);
        }

        let opcode = OpcodeId(cell.value());
        let Some(def) = self.registry.find_by_id(opcode) else {
            organism.mark_instruction_failed(format!("Unknown opcode id {}", opcode.value()));
            return Instruction::nop(organism.id, ip);
        };

        let rank = environment.shape().rank();
        let raw_args = self.decode_raw_args(environment, &ip, &organism.dv, &def.signature, rank);
        let length = def.length_for_rank(rank);

        let mut instruction = Instruction::new(organism.id, opcode, ip, raw_args, length);
        let resolved: Vec<_> = instruction
            .raw_args
            .iter()
            .zip(&def.signature)
            .map(|(raw, kind)| resolve_operand(*kind, raw, organism))
            .collect();
        instruction.resolved = resolved;

        let targets = self.target_coordinates(organism, &instruction, def.name);
        instruction.set_target_coordinates(targets);
        instruction
    }

    /// First (and, for every built-in instruction, only) target
    /// coordinate an environment-modifying instruction intends to write,
    /// derived from its resolved operands without mutating anything.
    fn target_coordinates(&self, organism: &Organism, instruction: &Instruction, name: &str) -> Vec<Coord> {
        match name {
            "POKI" | "PEKI" => instruction
                .resolved
                .get(1)
                .and_then(|r| r.as_coordinate())
                .map(|axes| vec![organism.ip.add(&Coord::new(axes.to_vec()))]),
            "POKR" | "PEKR" => instruction
                .resolved
                .get(1)
                .and_then(|r| r.as_coordinate())
                .map(|axes| vec![Coord::new(axes.to_vec())]),
            "FORK" => instruction
                .resolved
                .first()
                .and_then(|r| r.as_coordinate())
                .map(|axes| vec![organism.ip.add(&Coord::new(axes.to_vec()))]),
            _ => None,
        }
        .unwrap_or_default()
    }

    /// Observation-only replay of `plan`, for external inspection.
    pub fn peek_next_instruction(&self, organism: &Organism, environment: &Environment) -> Instruction {
        let mut scratch = organism.snapshot_for_peek();
        self.plan(&mut scratch, environment)
    }

    /// Runs one instruction to completion: resolves operands again,
    /// commits stack reads, prices the execution, runs the body, applies
    /// the fixed ordering in spec §4.5, and advances IP.
    pub fn execute(&self, instruction: &Instruction, ctx: &mut ExecutionContext, policies: &PolicyManager) {
        if ctx.organism.dead {
            return;
        }

        let Some(opcode) = instruction.opcode_id else {
            ctx.organism.skip_ip_advance = false;
            advance_ip(ctx.organism, instruction.length);
            return;
        };
        let Some(def) = self.registry.find_by_id(opcode) else {
            warn!(opcode = opcode.value(), "unknown opcode id at execute time");
            ctx.organism.mark_instruction_failed("Unknown opcode at execute time");
            advance_ip(ctx.organism, instruction.length);
            return;
        };

        let pre_registers = snapshot_registers(ctx.organism, instruction, &def.signature);
        let pre_location_registers = snapshot_location_registers(ctx.organism, instruction, &def.signature);

        let resolved: Vec<_> = instruction
            .raw_args
            .iter()
            .zip(&def.signature)
            .map(|(raw, kind)| resolve_operand(*kind, raw, ctx.organism))
            .collect();
        ctx.organism.commit_stack_reads();

        let target = instruction.first_target().map(|coord| TargetInfo {
            coord: coord.clone(),
            molecule_at_target: ctx.environment.get_molecule(coord),
            owner_id_at_target: ctx.environment.get_owner_id(coord),
        });

        let cost = policies.resolve(opcode).map(|policy| {
            let policy_ctx = ThermodynamicContext::new(instruction, ctx.organism, &resolved, target.clone());
            policy.cost(&policy_ctx)
        });

        if let Some(cost) = cost {
            ctx.organism.take_er(cost.energy);
            ctx.organism.add_sr(cost.entropy);
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (def.body)(ctx, &resolved)))
            .unwrap_or_else(|_| ExecutionOutcome::Failed("VM Runtime Error: instruction body panicked".into()));

        let error_penalty = match &outcome {
            ExecutionOutcome::Failed(reason) => {
                ctx.organism.mark_instruction_failed(reason.clone());
                true
            }
            ExecutionOutcome::Ok => false,
        };

        let error_penalty_cost = if error_penalty { ctx.error_penalty_cost } else { 0 };
        ctx.organism.take_er(error_penalty_cost);

        ctx.organism.last_execution = LastExecutionRecord {
            opcode_id: Some(opcode.value()),
            raw_args: Vec::new(),
            energy_cost: cost.map(|c| c.energy).unwrap_or(0) + error_penalty_cost,
            entropy_delta: cost.map(|c| c.entropy).unwrap_or(0),
            pre_registers,
            pre_location_registers,
        };

        if ctx.organism.check_death_conditions() {
            return;
        }

        if !ctx.organism.skip_ip_advance {
            advance_ip(ctx.organism, instruction.length);
        } else if let Some(requested) = ctx.requested_ip.take() {
            ctx.organism.ip = requested;
        }
    }
}

fn advance_ip(organism: &mut Organism, length: usize) {
    let step = organism.dv.scale(length as i64);
    organism.ip = organism.ip.add(&step);
}

fn snapshot_registers(organism: &Organism, instruction: &Instruction, signature: &[OperandKind]) -> std::collections::HashMap<u32, i64> {
    instruction
        .raw_args
        .iter()
        .zip(signature)
        .filter_map(|(raw, kind)| match (raw, kind) {
            (RawOperand::Scalar(mol), OperandKind::Register) => Some(mol.value()),
            _ => None,
        })
        .map(|idx| (idx, organism.read_register(idx)))
        .collect()
}

fn snapshot_location_registers(
    organism: &Organism,
    instruction: &Instruction,
    signature: &[OperandKind],
) -> std::collections::HashMap<u32, Coord> {
    instruction
        .raw_args
        .iter()
        .zip(signature)
        .filter_map(|(raw, kind)| match (raw, kind) {
            (RawOperand::Scalar(mol), OperandKind::LocationRegister) => Some(mol.value()),
            _ => None,
        })
        .map(|idx| (idx, organism.read_location_register(idx)))
        .collect()
}
