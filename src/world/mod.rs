pub mod environment;

pub use environment::Environment;

use crate::molecule::Molecule;

/// Observer notified of every label write and every owner change, so the
/// label index can mirror environment state without the environment
/// knowing anything about Hamming matching.
///
/// `(flat_index, old_word, new_word, owner)` — `old_word`/`new_word` are
/// `None` when the cell did not / does not hold a `LABEL` molecule, which
/// lets a single callback cover creation, removal and in-place mutation of
/// a label.
pub trait LabelSink {
    fn on_label_change(&mut self, flat_index: usize, old: Option<Molecule>, new: Option<Molecule>, owner: u64);

    fn on_owner_change(&mut self, flat_index: usize, molecule: Molecule, new_owner: u64);
}

/// A [`LabelSink`] that observes nothing, for environments that are not
/// wired to a label index (tests, scratch worlds).
#[derive(Default)]
pub struct NullLabelSink;

impl LabelSink for NullLabelSink {
    fn on_label_change(&mut self, _flat_index: usize, _old: Option<Molecule>, _new: Option<Molecule>, _owner: u64) {}
    fn on_owner_change(&mut self, _flat_index: usize, _molecule: Molecule, _new_owner: u64) {}
}
