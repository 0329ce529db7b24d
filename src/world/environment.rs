//! Dense storage of molecules with ownership tracking, grounded on the
//! teacher's `GlobalState`-style "plain struct + explicit mutation methods"
//! shape: no interior mutability, every write goes through a method that
//! also maintains the derived indexes (here: per-owner cell sets and label
//! notifications) the way `GlobalState` kept `globals`/`functions`/`types`
//! consistent by construction.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::coord::{Coord, Shape};
use crate::molecule::Molecule;
use crate::world::LabelSink;

/// An n-dimensional, toroidal grid of molecules with an owner id per cell.
pub struct Environment {
    shape: Shape,
    cells: Vec<Molecule>,
    owners: Vec<u64>,
    owned_by: HashMap<u64, HashSet<usize>>,
    label_sink: Box<dyn LabelSink>,
}

impl Environment {
    pub fn new(shape: Shape, label_sink: Box<dyn LabelSink>) -> Self {
        let len = shape.len();
        Environment {
            cells: vec![Molecule::EMPTY; len],
            owners: vec![0; len],
            owned_by: HashMap::new(),
            shape,
            label_sink,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn get_molecule(&self, coord: &Coord) -> Molecule {
        self.cells[self.shape.flat_index_wrapped(coord)]
    }

    pub fn get_molecule_int(&self, flat_index: usize) -> u32 {
        self.cells[flat_index].to_int()
    }

    pub fn get_owner_id(&self, coord: &Coord) -> u64 {
        self.owners[self.shape.flat_index_wrapped(coord)]
    }

    pub fn get_owner_by_index(&self, flat_index: usize) -> u64 {
        self.owners[flat_index]
    }

    /// Writes a molecule at a coordinate, wrapping it onto the torus first.
    /// Maintains the owned-cell index for `owner` and notifies the label
    /// sink whenever the old or new molecule is a `LABEL`.
    pub fn set_molecule(&mut self, mol: Molecule, coord: &Coord, owner: u64) {
        let flat = self.shape.flat_index_wrapped(coord);
        self.set_molecule_by_index(flat, mol, owner);
    }

    pub fn set_molecule_by_index(&mut self, flat_index: usize, mol: Molecule, owner: u64) {
        let old = self.cells[flat_index];
        let old_owner = self.owners[flat_index];

        if old_owner != 0 {
            if let Some(set) = self.owned_by.get_mut(&old_owner) {
                set.remove(&flat_index);
            }
        }
        if owner != 0 && !mol.is_empty() {
            self.owned_by.entry(owner).or_default().insert(flat_index);
        }

        self.cells[flat_index] = mol;
        self.owners[flat_index] = owner;

        if old.is_label() || mol.is_label() {
            let old_word = old.is_label().then_some(old);
            let new_word = mol.is_label().then_some(mol);
            self.label_sink.on_label_change(flat_index, old_word, new_word, owner);
        }
    }

    /// Changes only the owner of a cell, leaving its molecule untouched.
    /// Used by ownership-transfer instructions and by birth handlers that
    /// adopt cells into a newborn's genome.
    pub fn set_owner(&mut self, flat_index: usize, new_owner: u64) {
        let old_owner = self.owners[flat_index];
        if old_owner == new_owner {
            return;
        }
        if old_owner != 0 {
            if let Some(set) = self.owned_by.get_mut(&old_owner) {
                set.remove(&flat_index);
            }
        }
        if new_owner != 0 {
            self.owned_by.entry(new_owner).or_default().insert(flat_index);
        }
        self.owners[flat_index] = new_owner;

        let mol = self.cells[flat_index];
        if mol.is_label() {
            self.label_sink.on_owner_change(flat_index, mol, new_owner);
        }
    }

    /// Clears ownership of every cell an organism owns, e.g. on death.
    /// Label cells among them fire an owner-change event (owner becomes 0).
    pub fn clear_ownership_for(&mut self, owner_id: u64) {
        let Some(indices) = self.owned_by.remove(&owner_id) else {
            return;
        };
        for flat_index in indices {
            self.owners[flat_index] = 0;
            let mol = self.cells[flat_index];
            if mol.is_label() {
                self.label_sink.on_owner_change(flat_index, mol, 0);
            }
        }
    }

    pub fn get_cells_owned_by(&self, owner_id: u64) -> &HashSet<usize> {
        static EMPTY: OnceLock<HashSet<usize>> = OnceLock::new();
        self.owned_by
            .get(&owner_id)
            .unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }

    pub fn coord_of(&self, flat_index: usize) -> Coord {
        self.shape.coord_of(flat_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::MoleculeType;
    use crate::world::NullLabelSink;

    fn env(extents: Vec<i64>) -> Environment {
        Environment::new(Shape::new(extents), Box::new(NullLabelSink))
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut e = env(vec![4, 4]);
        let c = Coord::new(vec![1, 2]);
        let mol = Molecule::new(MoleculeType::Data, 7, 0);
        e.set_molecule(mol, &c, 3);
        assert_eq!(e.get_molecule(&c), mol);
        assert_eq!(e.get_owner_id(&c), 3);
    }

    #[test]
    fn coordinates_wrap_toroidally() {
        let mut e = env(vec![4, 4]);
        let mol = Molecule::new(MoleculeType::Data, 9, 0);
        e.set_molecule(mol, &Coord::new(vec![-1, -1]), 1);
        assert_eq!(e.get_molecule(&Coord::new(vec![3, 3])), mol);
    }

    #[test]
    fn clear_ownership_releases_all_owned_cells() {
        let mut e = env(vec![4, 4]);
        let mol = Molecule::new(MoleculeType::Data, 1, 0);
        e.set_molecule(mol, &Coord::new(vec![0, 0]), 7);
        e.set_molecule(mol, &Coord::new(vec![1, 1]), 7);
        e.clear_ownership_for(7);
        assert_eq!(e.get_owner_id(&Coord::new(vec![0, 0])), 0);
        assert_eq!(e.get_owner_id(&Coord::new(vec![1, 1])), 0);
        assert!(e.get_cells_owned_by(7).is_empty());
    }

    #[test]
    fn label_write_notifies_sink() {
        use std::sync::{Arc, Mutex};

        #[derive(Default, Clone)]
        struct Recorder(Arc<Mutex<Vec<(usize, bool, bool, u64)>>>);
        impl LabelSink for Recorder {
            fn on_label_change(&mut self, flat_index: usize, old: Option<Molecule>, new: Option<Molecule>, owner: u64) {
                self.0.lock().unwrap().push((flat_index, old.is_some(), new.is_some(), owner));
            }
            fn on_owner_change(&mut self, _: usize, _: Molecule, _: u64) {}
        }

        let rec = Recorder::default();
        let mut e = Environment::new(Shape::new(vec![4, 4]), Box::new(rec.clone()));
        let label = Molecule::new(MoleculeType::Label, 42, 0);
        e.set_molecule(label, &Coord::new(vec![2, 2]), 5);

        let events = rec.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].1 && events[0].2);
        assert_eq!(events[0].3, 5);
    }
}
