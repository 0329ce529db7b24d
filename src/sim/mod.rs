//! The tick loop and its bootstrap surface. Grounded on the teacher's
//! `vm/interpreter.rs` top-level `VirtualMachine` (owns all mutable state,
//! exposes a `run`/`step` entry point, no interior mutability for hot
//! state) generalized from "interpret one bytecode module" to "advance one
//! world-plus-population tick".

pub mod conflict;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use crate::artifact::ProgramArtifact;
use crate::birth::BirthHandler;
use crate::config::WorldConfig;
use crate::coord::Shape;
use crate::error::EvoError;
use crate::isa::registry::Registry;
use crate::label_index::{LabelIndex, LabelIndexConfig, LabelIndexSink};
use crate::molecule::Molecule;
use crate::organism::Organism;
use crate::policy::config::ThermodynamicsConfig;
use crate::policy::manager::PolicyManager;
use crate::random::RandomProvider;
use crate::vm::{ExecutionContext, Vm};
use crate::world::{Environment, NullLabelSink};

pub use conflict::resolve_conflicts;

/// Runs once per tick, before the plan phase, with full read/write access
/// to the simulation (spec §6's tick plugin interface).
pub trait TickPlugin {
    fn execute(&mut self, simulation: &mut Simulation);
}

/// Owns the world, the population and every collaborator a tick needs.
/// Single-threaded by design (SPEC_FULL.md §5's resolution of the Open
/// Question in spec.md §9): no interior mutability for hot state, so a
/// tick runs to completion on the calling thread with no suspension point.
pub struct Simulation {
    environment: Environment,
    organisms: Vec<Organism>,
    registry: Registry,
    policies: PolicyManager,
    label_index: Rc<RefCell<LabelIndex>>,
    random: Option<Box<dyn RandomProvider>>,
    tick_plugins: Vec<Box<dyn TickPlugin>>,
    birth_handlers: Vec<Box<dyn BirthHandler>>,
    program_artifacts: HashMap<String, ProgramArtifact>,
    current_tick: u64,
    next_organism_id: u64,
    paused: bool,
}

impl Simulation {
    /// Assembles a simulation from its configuration surfaces: a toroidal
    /// `Environment` sized by `world_config`, a label index wired to it as
    /// a `LabelSink`, the built-in instruction registry, and a loaded
    /// `PolicyManager`. Everything else (organisms, plugins, handlers,
    /// random provider, program artifacts) is added afterward through the
    /// lifecycle methods below.
    pub fn bootstrap(world_config: &WorldConfig, thermodynamics_config: &ThermodynamicsConfig) -> Result<Self, EvoError> {
        let shape = Shape::new(world_config.extents.clone());
        let (sink, label_index) = LabelIndexSink::new(LabelIndex::new(shape.clone(), LabelIndexConfig::default()));
        let environment = Environment::new(shape, Box::new(sink));
        let registry = Registry::init();
        let policies = PolicyManager::load(thermodynamics_config, &registry).map_err(EvoError::Config)?;

        Ok(Simulation {
            environment,
            organisms: Vec::new(),
            registry,
            policies,
            label_index,
            random: None,
            tick_plugins: Vec::new(),
            birth_handlers: Vec::new(),
            program_artifacts: HashMap::new(),
            current_tick: 0,
            next_organism_id: 1,
            paused: false,
        })
    }

    /// A simulation with no label-matching observer and a default-rejecting
    /// policy manager, for tests that only need the tick loop's mechanics.
    pub fn bare(shape: Shape, policies: PolicyManager) -> Self {
        let environment = Environment::new(shape.clone(), Box::new(NullLabelSink));
        let (_, label_index) = LabelIndexSink::new(LabelIndex::new(shape, LabelIndexConfig::default()));
        Simulation {
            environment,
            organisms: Vec::new(),
            registry: Registry::init(),
            policies,
            label_index,
            random: None,
            tick_plugins: Vec::new(),
            birth_handlers: Vec::new(),
            program_artifacts: HashMap::new(),
            current_tick: 0,
            next_organism_id: 1,
            paused: false,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn set_random_provider(&mut self, random: Box<dyn RandomProvider>) {
        self.random = Some(random);
    }

    pub fn add_tick_plugin(&mut self, plugin: Box<dyn TickPlugin>) {
        self.tick_plugins.push(plugin);
    }

    pub fn add_birth_handler(&mut self, handler: Box<dyn BirthHandler>) {
        self.birth_handlers.push(handler);
    }

    pub fn set_program_artifacts(&mut self, artifacts: HashMap<String, ProgramArtifact>) {
        self.program_artifacts = artifacts;
    }

    /// Places `organism`'s program, if it names one with a known artifact,
    /// then adds it to the active population. Used for bootstrap organisms.
    pub fn add_organism(&mut self, organism: Organism) {
        self.place_program_cells(&organism);
        self.organisms.push(organism);
    }

    /// As [`Simulation::add_organism`], but stamps `birth_tick` with the
    /// current tick first — for organisms introduced mid-run rather than
    /// at bootstrap (e.g. externally injected, as opposed to `FORK`ed).
    pub fn add_new_organism(&mut self, mut organism: Organism) {
        organism.birth_tick = self.current_tick;
        self.place_program_cells(&organism);
        self.organisms.push(organism);
    }

    fn place_program_cells(&mut self, organism: &Organism) {
        let Some(program_id) = &organism.program_id else { return };
        let Some(artifact) = self.program_artifacts.get(program_id) else { return };
        let cells: Vec<(usize, u32)> = artifact
            .machine_code_layout
            .iter()
            .map(|(coord, packed)| (self.environment.shape().flat_index_wrapped(coord), *packed))
            .collect();
        for (flat_index, packed) in cells {
            self.environment.set_molecule_by_index(flat_index, Molecule::from_int(packed), organism.id);
        }
    }

    /// Advances the simulation by exactly one tick (spec §4.6). A no-op
    /// while [`Simulation::paused`].
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }

        self.run_tick_plugins();

        let vm = Vm::new(&self.registry);
        let mut organism_indices = Vec::new();
        let mut instructions = Vec::new();
        for (idx, organism) in self.organisms.iter_mut().enumerate() {
            if organism.is_alive() {
                instructions.push(vm.plan(organism, &self.environment));
                organism_indices.push(idx);
            }
        }

        resolve_conflicts(&mut instructions, &self.environment, &self.registry);

        let mut newborns: Vec<Organism> = Vec::new();
        for (slot, instruction) in instructions.iter().enumerate() {
            if !instruction.executed_in_tick {
                continue;
            }
            let organism_idx = organism_indices[slot];
            {
                let error_penalty_cost = self.organisms[organism_idx].error_penalty_cost;
                let organism = &mut self.organisms[organism_idx];
                let environment = &mut self.environment;
                let label_index = &*self.label_index;
                let random = self.random.as_deref();
                let mut ctx = ExecutionContext {
                    organism,
                    environment,
                    label_index: Some(label_index),
                    random,
                    requested_ip: None,
                    error_penalty_cost,
                    newborns: &mut newborns,
                    next_organism_id: &mut self.next_organism_id,
                    current_tick: self.current_tick,
                };
                vm.execute(instruction, &mut ctx, &self.policies);
            }
            if self.organisms[organism_idx].dead {
                let id = self.organisms[organism_idx].id;
                self.environment.clear_ownership_for(id);
            }
        }

        let first_new_idx = self.organisms.len();
        self.organisms.append(&mut newborns);
        for idx in first_new_idx..self.organisms.len() {
            let organism_id = self.organisms[idx].id;
            for handler in &mut self.birth_handlers {
                let child = &mut self.organisms[idx];
                let environment = &mut self.environment;
                let registry = &self.registry;
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handler.on_birth(child, environment, registry);
                }));
                if result.is_err() {
                    warn!(organism_id, "birth handler panicked; skipping");
                }
            }
        }

        self.current_tick += 1;
    }

    fn run_tick_plugins(&mut self) {
        let mut plugins = std::mem::take(&mut self.tick_plugins);
        for plugin in &mut plugins {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| plugin.execute(self)));
            if result.is_err() {
                warn!("tick plugin panicked; continuing with remaining plugins");
            }
        }
        self.tick_plugins = plugins;
    }
}
