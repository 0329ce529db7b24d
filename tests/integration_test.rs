//! Smoke-level integration tests: a handful of minimal programs run end to
//! end through `Simulation::tick`, distinct from the named scenarios in
//! `scenario_tests.rs`.

use std::collections::HashMap;

use evochora_core::artifact::ProgramArtifact;
use evochora_core::coord::{Coord, Shape};
use evochora_core::isa::registry::Registry;
use evochora_core::molecule::{Molecule, MoleculeType};
use evochora_core::organism::Organism;
use evochora_core::policy::config::{OverridesConfig, PolicyClassConfig, ThermodynamicsConfig};
use evochora_core::policy::manager::PolicyManager;
use evochora_core::sim::Simulation;

fn policies() -> PolicyManager {
    let registry = Registry::init();
    let config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "FixedCost".into(),
            options: serde_json::json!({ "energy": 1, "entropy": 1 }),
        },
        overrides: OverridesConfig::default(),
    };
    PolicyManager::load(&config, &registry).unwrap()
}

fn single_organism_sim(artifact: ProgramArtifact, organism: Organism) -> Simulation {
    let mut sim = Simulation::bare(Shape::new(vec![64, 64]), policies());
    let mut artifacts = HashMap::new();
    artifacts.insert(artifact.program_id.clone(), artifact);
    sim.set_program_artifacts(artifacts);
    sim.add_organism(organism);
    sim
}

#[test]
fn stacked_arithmetic_settles_after_three_ticks() {
    let registry = Registry::init();
    let dv = Coord::new(vec![1, 0]);
    let start = Coord::new(vec![0, 0]);
    let seti = registry.find_by_name("SETI").unwrap().opcode;
    let addi = registry.find_by_name("ADDI").unwrap().opcode;
    let muli = registry.find_by_name("MULI").unwrap().opcode;

    let addi_at = start.add(&dv.scale(3));
    let muli_at = addi_at.add(&dv.scale(3));

    let artifact = ProgramArtifact::new("settle")
        .with_cell(start.clone(), Molecule::new(MoleculeType::Code, seti.value(), 0).to_int())
        .with_cell(start.add(&dv), Molecule::new(MoleculeType::Register, 0, 0).to_int())
        .with_cell(start.add(&dv.scale(2)), Molecule::new_signed(MoleculeType::Data, 10, 0).to_int())
        .with_cell(addi_at.clone(), Molecule::new(MoleculeType::Code, addi.value(), 0).to_int())
        .with_cell(addi_at.add(&dv), Molecule::new(MoleculeType::Register, 0, 0).to_int())
        .with_cell(addi_at.add(&dv.scale(2)), Molecule::new_signed(MoleculeType::Data, 20, 0).to_int())
        .with_cell(muli_at.clone(), Molecule::new(MoleculeType::Code, muli.value(), 0).to_int())
        .with_cell(muli_at.add(&dv), Molecule::new(MoleculeType::Register, 0, 0).to_int())
        .with_cell(muli_at.add(&dv.scale(2)), Molecule::new_signed(MoleculeType::Data, 3, 0).to_int());

    let mut organism = Organism::new(1, vec![0, 0]).with_energy(1000, 1000);
    organism.dv = dv;
    organism.program_id = Some("settle".to_string());

    let mut sim = single_organism_sim(artifact, organism);
    sim.tick();
    sim.tick();
    sim.tick();

    assert_eq!(sim.organisms()[0].read_register(0), 90, "(10 + 20) * 3 == 90");
}

#[test]
fn an_empty_cell_plans_as_a_free_nop() {
    let mut sim = Simulation::bare(Shape::new(vec![8, 8]), policies());
    let organism = Organism::new(1, vec![0, 0]).with_energy(1000, 1000);
    sim.add_organism(organism);

    let er_before = sim.organisms()[0].er;
    sim.tick();

    assert!(!sim.organisms()[0].instruction_failed, "an empty cell is a silent NOP, not a failure");
    assert_eq!(sim.organisms()[0].er, er_before, "an empty cell never reaches the policy layer, so it is free");
}

#[test]
fn the_registered_nop_instruction_still_pays_its_fixed_cost() {
    let registry = Registry::init();
    let nop = registry.find_by_name("NOP").unwrap().opcode;
    let coord = Coord::new(vec![0, 0]);
    let artifact = ProgramArtifact::new("nop").with_cell(coord.clone(), Molecule::new(MoleculeType::Code, nop.value(), 0).to_int());

    let mut organism = Organism::new(1, vec![0, 0]).with_energy(1000, 1000);
    organism.dv = Coord::new(vec![1, 0]);
    organism.program_id = Some("nop".to_string());

    let mut sim = single_organism_sim(artifact, organism);
    let er_before = sim.organisms()[0].er;
    sim.tick();

    assert_eq!(sim.organisms()[0].er, er_before - 1, "the registered NOP opcode is priced like any other instruction");
    assert_eq!(sim.organisms()[0].ip, Coord::new(vec![1, 0]), "NOP still advances the IP by its length");
}

#[test]
fn unknown_opcode_id_fails_planning_without_charging_a_cost() {
    let registry = Registry::init();
    let mut sim = Simulation::bare(Shape::new(vec![8, 8]), policies());
    let coord = Coord::new(vec![0, 0]);
    let bogus_opcode = 0x00FF_FFFE; // not registered by `Registry::init`
    let mut artifacts = HashMap::new();
    let artifact = ProgramArtifact::new("bogus").with_cell(coord.clone(), Molecule::new(MoleculeType::Code, bogus_opcode, 0).to_int());
    artifacts.insert("bogus".to_string(), artifact);
    sim.set_program_artifacts(artifacts);

    assert!(registry.find_by_id(evochora_core::isa::opcode::OpcodeId(bogus_opcode)).is_none());

    let mut organism = Organism::new(1, vec![0, 0]).with_energy(1000, 1000).with_error_penalty_cost(50);
    organism.program_id = Some("bogus".to_string());
    sim.add_organism(organism);

    let er_before = sim.organisms()[0].er;
    sim.tick();

    assert!(sim.organisms()[0].instruction_failed, "an unrecognized opcode id marks the instruction failed during planning");
    assert_eq!(er_before, sim.organisms()[0].er, "it plans straight to a sourceless NOP, which never reaches the cost machinery");
}
