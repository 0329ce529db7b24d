//! Instruction bodies. Grounded on the teacher's per-opcode match arms in
//! `vm/interpreter.rs`; split into one function per opcode here because the
//! registry dispatches through a function pointer rather than a single
//! giant match.

use crate::coord::Coord;
use crate::isa::operand::ResolvedOperand;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::Organism;
use crate::vm::{ExecutionContext, ExecutionOutcome};

fn register_index(operand: &ResolvedOperand, label: &str) -> Result<u32, ExecutionOutcome> {
    operand
        .as_register_index()
        .ok_or_else(|| ExecutionOutcome::Failed(format!("{label}: expected a register operand")))
}

fn value_of(operand: &ResolvedOperand, label: &str) -> Result<i64, ExecutionOutcome> {
    operand
        .as_value()
        .ok_or_else(|| ExecutionOutcome::Failed(format!("{label}: expected a scalar operand")))
}

fn coordinate_of(operand: &ResolvedOperand, label: &str) -> Result<Coord, ExecutionOutcome> {
    operand
        .as_coordinate()
        .map(|axes| Coord::new(axes.to_vec()))
        .ok_or_else(|| ExecutionOutcome::Failed(format!("{label}: expected a coordinate operand")))
}

macro_rules! unwrap_or_fail {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(outcome) => return outcome,
        }
    };
}

pub fn op_nop(_ctx: &mut ExecutionContext, _args: &[ResolvedOperand]) -> ExecutionOutcome {
    ExecutionOutcome::Ok
}

pub fn op_seti(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], "SETI"));
    let value = unwrap_or_fail!(value_of(&args[1], "SETI"));
    ctx.organism.write_register(dest, value);
    ExecutionOutcome::Ok
}

pub fn op_setr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], "SETR"));
    let src = unwrap_or_fail!(register_index(&args[1], "SETR"));
    let value = ctx.organism.read_register(src);
    ctx.organism.write_register(dest, value);
    ExecutionOutcome::Ok
}

fn binary_arith(
    ctx: &mut ExecutionContext,
    args: &[ResolvedOperand],
    name: &str,
    op: fn(i64, i64) -> i64,
    rhs_is_register: bool,
) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], name));
    let rhs = if rhs_is_register {
        let reg = unwrap_or_fail!(register_index(&args[1], name));
        ctx.organism.read_register(reg)
    } else {
        unwrap_or_fail!(value_of(&args[1], name))
    };
    let lhs = ctx.organism.read_register(dest);
    ctx.organism.write_register(dest, op(lhs, rhs));
    ExecutionOutcome::Ok
}

pub fn op_addi(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "ADDI", |a, b| a + b, false)
}

pub fn op_addr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "ADDR", |a, b| a + b, true)
}

pub fn op_subi(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "SUBI", |a, b| a - b, false)
}

pub fn op_subr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "SUBR", |a, b| a - b, true)
}

pub fn op_muli(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "MULI", |a, b| a * b, false)
}

pub fn op_mulr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    binary_arith(ctx, args, "MULR", |a, b| a * b, true)
}

pub fn op_jmpi(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let offset = unwrap_or_fail!(coordinate_of(&args[0], "JMPI"));
    let target = ctx.organism.ip.add(&offset);
    ctx.request_jump(target);
    ExecutionOutcome::Ok
}

pub fn op_jmpr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let reg = unwrap_or_fail!(register_index(&args[0], "JMPR"));
    let key = ctx.organism.read_register(reg) as u32;
    let Some(label_index) = ctx.label_index else {
        return ExecutionOutcome::Failed("JMPR: no label index configured".into());
    };
    let label_index = label_index.borrow();
    let derived = ctx.random.map(|r| r.derive_for("labelMatching", ctx.organism.id));
    match label_index.find_target(key, &ctx.organism.ip, ctx.organism.id, derived.as_deref()) {
        Ok(Some(flat_index)) => {
            let target = ctx.environment.coord_of(flat_index);
            ctx.request_jump(target);
            ExecutionOutcome::Ok
        }
        Ok(None) => ExecutionOutcome::Failed("JMPR: no matching label within tolerance".into()),
        Err(e) => ExecutionOutcome::Failed(format!("JMPR: {e}")),
    }
}

pub fn op_poki(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let src = unwrap_or_fail!(register_index(&args[0], "POKI"));
    let offset = unwrap_or_fail!(coordinate_of(&args[1], "POKI"));
    let value = ctx.organism.read_register(src);
    let target = ctx.organism.ip.add(&offset);
    let molecule = Molecule::new_signed(MoleculeType::Data, value, 0);
    ctx.environment.set_molecule(molecule, &target, ctx.organism.id);
    ExecutionOutcome::Ok
}

pub fn op_pokr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let src = unwrap_or_fail!(register_index(&args[0], "POKR"));
    let target = unwrap_or_fail!(coordinate_of(&args[1], "POKR"));
    let value = ctx.organism.read_register(src);
    let molecule = Molecule::new_signed(MoleculeType::Data, value, 0);
    ctx.environment.set_molecule(molecule, &target, ctx.organism.id);
    ExecutionOutcome::Ok
}

pub fn op_peki(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], "PEKI"));
    let offset = unwrap_or_fail!(coordinate_of(&args[1], "PEKI"));
    let source = ctx.organism.ip.add(&offset);
    let molecule = ctx.environment.get_molecule(&source);
    ctx.organism.write_register(dest, molecule.value_signed());
    ExecutionOutcome::Ok
}

pub fn op_pekr(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], "PEKR"));
    let source = unwrap_or_fail!(coordinate_of(&args[1], "PEKR"));
    let molecule = ctx.environment.get_molecule(&source);
    ctx.organism.write_register(dest, molecule.value_signed());
    ExecutionOutcome::Ok
}

pub fn op_push(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let value = unwrap_or_fail!(value_of(&args[0], "PUSH"));
    ctx.organism.data_stack.push(value);
    ExecutionOutcome::Ok
}

pub fn op_pop(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let dest = unwrap_or_fail!(register_index(&args[0], "POP"));
    match ctx.organism.peek_stack(0) {
        Some(value) => {
            ctx.organism.write_register(dest, value);
            ExecutionOutcome::Ok
        }
        None => ExecutionOutcome::Failed("POP: data stack is empty".into()),
    }
}

pub fn op_fork(ctx: &mut ExecutionContext, args: &[ResolvedOperand]) -> ExecutionOutcome {
    let offset = unwrap_or_fail!(coordinate_of(&args[0], "FORK"));
    let child_ip = ctx.organism.ip.add(&offset);

    let child_id = *ctx.next_organism_id;
    *ctx.next_organism_id += 1;

    let mut child = Organism::new(child_id, child_ip.axes().to_vec());
    child.parent_id = Some(ctx.organism.id);
    child.birth_tick = ctx.current_tick;
    child.program_id = ctx.organism.program_id.clone();
    child.dv = ctx.organism.dv.clone();
    child.max_energy = ctx.organism.max_energy;
    child.max_entropy = ctx.organism.max_entropy;
    child.error_penalty_cost = ctx.organism.error_penalty_cost;
    child.er = ctx.organism.max_energy / 2;

    ctx.newborns.push(child);
    ExecutionOutcome::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Shape;
    use crate::world::NullLabelSink;
    use crate::world::Environment;

    fn ctx_harness<'a>(organism: &'a mut Organism, environment: &'a mut Environment, newborns: &'a mut Vec<Organism>, next_id: &'a mut u64) -> ExecutionContext<'a> {
        ExecutionContext {
            organism,
            environment,
            label_index: None,
            random: None,
            requested_ip: None,
            error_penalty_cost: 10,
            newborns,
            next_organism_id: next_id,
            current_tick: 0,
        }
    }

    #[test]
    fn seti_writes_destination_register() {
        let mut organism = Organism::new(1, vec![0, 0]);
        let mut environment = Environment::new(Shape::new(vec![8, 8]), Box::new(NullLabelSink));
        let mut newborns = Vec::new();
        let mut next_id = 2;
        let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
        let args = vec![ResolvedOperand::RegisterIndex(0), ResolvedOperand::Value(1)];
        let outcome = op_seti(&mut ctx, &args);
        assert_eq!(outcome, ExecutionOutcome::Ok);
        assert_eq!(organism.read_register(0), 1);
    }

    #[test]
    fn addi_accumulates_onto_existing_register_value() {
        let mut organism = Organism::new(1, vec![0, 0]);
        organism.write_register(0, 1);
        let mut environment = Environment::new(Shape::new(vec![8, 8]), Box::new(NullLabelSink));
        let mut newborns = Vec::new();
        let mut next_id = 2;
        let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
        let args = vec![ResolvedOperand::RegisterIndex(0), ResolvedOperand::Value(1)];
        op_addi(&mut ctx, &args);
        assert_eq!(organism.read_register(0), 2);
    }

    #[test]
    fn poki_then_peki_round_trips_through_the_world() {
        let mut organism = Organism::new(1, vec![2, 2]);
        organism.write_register(0, 5);
        let mut environment = Environment::new(Shape::new(vec![8, 8]), Box::new(NullLabelSink));
        let mut newborns = Vec::new();
        let mut next_id = 2;

        {
            let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
            let args = vec![ResolvedOperand::RegisterIndex(0), ResolvedOperand::Coordinate(vec![0, 1])];
            op_poki(&mut ctx, &args);
        }

        let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
        let args = vec![ResolvedOperand::RegisterIndex(1), ResolvedOperand::Coordinate(vec![0, 1])];
        op_peki(&mut ctx, &args);
        assert_eq!(organism.read_register(1), 5);
    }

    #[test]
    fn fork_queues_a_newborn_with_parent_linkage() {
        let mut organism = Organism::new(1, vec![0, 0]).with_energy(100, 50);
        let mut environment = Environment::new(Shape::new(vec![8, 8]), Box::new(NullLabelSink));
        let mut newborns = Vec::new();
        let mut next_id = 2;
        let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
        let args = vec![ResolvedOperand::Coordinate(vec![0, 1])];
        op_fork(&mut ctx, &args);
        assert_eq!(newborns.len(), 1);
        assert_eq!(newborns[0].parent_id, Some(1));
        assert_eq!(next_id, 3);
    }

    #[test]
    fn pop_on_empty_stack_fails_softly() {
        let mut organism = Organism::new(1, vec![0, 0]);
        let mut environment = Environment::new(Shape::new(vec![8, 8]), Box::new(NullLabelSink));
        let mut newborns = Vec::new();
        let mut next_id = 2;
        let mut ctx = ctx_harness(&mut organism, &mut environment, &mut newborns, &mut next_id);
        let args = vec![ResolvedOperand::RegisterIndex(0)];
        let outcome = op_pop(&mut ctx, &args);
        assert!(outcome.is_failed());
    }
}
