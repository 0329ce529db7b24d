//! Hamming-tolerant fuzzy resolver for label jump targets. Grounded on the
//! teacher's `state/global.rs` pattern of a lookup structure fed purely by
//! observer callbacks (there: global bindings updated as the interpreter
//! runs; here: label writes/owner changes reported by [`crate::world::LabelSink`]).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::coord::{Coord, Shape};
use crate::random::RandomProvider;
use crate::world::LabelSink;

pub const KEY_BITS: u32 = 20;
const KEY_MASK: u32 = (1 << KEY_BITS) - 1;

pub const DEFAULT_HAMMING_WEIGHT: i64 = 50;
pub const DEFAULT_FOREIGN_PENALTY: i64 = 100;
pub const DEFAULT_TOLERANCE: u32 = 2;

#[derive(thiserror::Error, Debug)]
pub enum LabelMatchingError {
    #[error("selectionSpread > 0 requires a random provider")]
    MissingRandomProvider,
}

/// One stored label occurrence: which cell it lives in, who owns it, and
/// its ownership-transfer marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelEntry {
    pub flat_index: usize,
    pub owner: u64,
    pub marker: u8,
}

impl LabelEntry {
    /// A label is foreign to `caller_owner` while an ownership transfer is
    /// in flight (non-zero marker) even if the owner id itself matches.
    pub fn is_foreign(&self, caller_owner: u64) -> bool {
        self.owner != caller_owner || self.marker != 0
    }
}

struct StoredLabel {
    exact_key: u32,
    entry: LabelEntry,
}

/// Tuning knobs for scoring and tolerance, configured once at construction.
#[derive(Debug, Clone, Copy)]
pub struct LabelIndexConfig {
    pub tolerance: u32,
    pub hamming_weight: i64,
    pub foreign_penalty: i64,
    pub selection_spread: i64,
}

impl Default for LabelIndexConfig {
    fn default() -> Self {
        LabelIndexConfig {
            tolerance: DEFAULT_TOLERANCE,
            hamming_weight: DEFAULT_HAMMING_WEIGHT,
            foreign_penalty: DEFAULT_FOREIGN_PENALTY,
            selection_spread: 0,
        }
    }
}

/// Keys within `tolerance` are pre-expanded at insertion time so lookup is
/// an O(1) bucket access rather than a scan over all stored keys.
pub struct LabelIndex {
    config: LabelIndexConfig,
    shape: Shape,
    // bucket key -> stored labels reachable from that key within tolerance
    buckets: HashMap<u32, Vec<StoredLabel>>,
}

impl LabelIndex {
    pub fn new(shape: Shape, config: LabelIndexConfig) -> Self {
        LabelIndex {
            config,
            shape,
            buckets: HashMap::new(),
        }
    }

    fn neighbors_within_tolerance(key: u32, tolerance: u32) -> Vec<u32> {
        let mut out = vec![key];
        for bits in 1..=tolerance {
            for combo in combinations(KEY_BITS, bits) {
                let mut flipped = key;
                for bit in &combo {
                    flipped ^= 1 << bit;
                }
                out.push(flipped & KEY_MASK);
            }
        }
        out
    }

    pub fn add_label(&mut self, key: u32, entry: LabelEntry) {
        let key = key & KEY_MASK;
        for bucket_key in Self::neighbors_within_tolerance(key, self.config.tolerance) {
            self.buckets.entry(bucket_key).or_default().push(StoredLabel {
                exact_key: key,
                entry,
            });
        }
    }

    pub fn remove_label(&mut self, key: u32, flat_index: usize) {
        let key = key & KEY_MASK;
        for bucket_key in Self::neighbors_within_tolerance(key, self.config.tolerance) {
            if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
                bucket.retain(|stored| !(stored.exact_key == key && stored.entry.flat_index == flat_index));
            }
        }
    }

    pub fn update_owner(&mut self, key: u32, flat_index: usize, new_owner: u64) {
        let key = key & KEY_MASK;
        for bucket_key in Self::neighbors_within_tolerance(key, self.config.tolerance) {
            if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
                for stored in bucket.iter_mut() {
                    if stored.exact_key == key && stored.entry.flat_index == flat_index {
                        stored.entry.owner = new_owner;
                    }
                }
            }
        }
    }

    pub fn update_marker(&mut self, key: u32, flat_index: usize, new_marker: u8) {
        let key = key & KEY_MASK;
        for bucket_key in Self::neighbors_within_tolerance(key, self.config.tolerance) {
            if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
                for stored in bucket.iter_mut() {
                    if stored.exact_key == key && stored.entry.flat_index == flat_index {
                        stored.entry.marker = new_marker;
                    }
                }
            }
        }
    }

    fn score(&self, query_key: u32, caller: &Coord, caller_owner: u64, stored: &StoredLabel) -> i64 {
        let hamming = (query_key ^ stored.exact_key).count_ones() as i64;
        let candidate_coord = self.shape.coord_of(stored.entry.flat_index);
        let distance = self.shape.toroidal_chebyshev(caller, &candidate_coord);
        let foreign = if stored.entry.is_foreign(caller_owner) {
            self.config.foreign_penalty
        } else {
            0
        };
        self.config.hamming_weight * hamming + distance + foreign
    }

    /// Returns the flat index of the best-matching LABEL, or `None`.
    pub fn find_target(
        &self,
        query_key: u32,
        caller: &Coord,
        caller_owner: u64,
        random: Option<&dyn RandomProvider>,
    ) -> Result<Option<usize>, LabelMatchingError> {
        if self.config.selection_spread > 0 && random.is_none() {
            return Err(LabelMatchingError::MissingRandomProvider);
        }
        let query_key = query_key & KEY_MASK;

        let phase1: Vec<&StoredLabel> = self
            .buckets
            .get(&query_key)
            .into_iter()
            .flatten()
            .filter(|stored| stored.exact_key == query_key && !stored.entry.is_foreign(caller_owner))
            .collect();

        if !phase1.is_empty() {
            return Ok(Some(self.select(query_key, caller, caller_owner, phase1, random)));
        }

        let phase2: Vec<&StoredLabel> = self
            .buckets
            .get(&query_key)
            .into_iter()
            .flatten()
            .collect();

        if phase2.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.select(query_key, caller, caller_owner, phase2, random)))
    }

    fn select(
        &self,
        query_key: u32,
        caller: &Coord,
        caller_owner: u64,
        candidates: Vec<&StoredLabel>,
        random: Option<&dyn RandomProvider>,
    ) -> usize {
        if self.config.selection_spread > 0 {
            if let Some(random) = random {
                return self.select_stochastic(query_key, caller, caller_owner, candidates, random);
            }
        }
        self.select_deterministic(query_key, caller, caller_owner, candidates)
    }

    fn select_deterministic(
        &self,
        query_key: u32,
        caller: &Coord,
        caller_owner: u64,
        mut candidates: Vec<&StoredLabel>,
    ) -> usize {
        candidates.sort_by(|a, b| {
            let score_a = self.score(query_key, caller, caller_owner, a);
            let score_b = self.score(query_key, caller, caller_owner, b);
            score_a
                .cmp(&score_b)
                .then(a.entry.owner.cmp(&b.entry.owner))
                .then(a.entry.flat_index.cmp(&b.entry.flat_index))
        });
        candidates[0].entry.flat_index
    }

    fn select_stochastic(
        &self,
        query_key: u32,
        caller: &Coord,
        caller_owner: u64,
        candidates: Vec<&StoredLabel>,
        random: &dyn RandomProvider,
    ) -> usize {
        use rand::Rng;

        let weights: Vec<f64> = candidates
            .iter()
            .map(|stored| {
                let score = self.score(query_key, caller, caller_owner, stored);
                10000.0 * self.config.selection_spread as f64 / (self.config.selection_spread as f64 + score as f64)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let mut rng = random.as_rng();
        if total <= 0.0 {
            return self.select_deterministic(query_key, caller, caller_owner, candidates);
        }
        let mut pick = rng.gen::<f64>() * total;
        for (idx, weight) in weights.iter().enumerate() {
            if pick < *weight {
                return candidates[idx].entry.flat_index;
            }
            pick -= weight;
        }
        candidates[candidates.len() - 1].entry.flat_index
    }
}

/// All subsets of `bits` distinct positions out of `0..width`, used to
/// enumerate the neighbors at a given Hamming distance.
fn combinations(width: u32, bits: u32) -> Vec<Vec<u32>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    combinations_rec(width, bits, 0, &mut current, &mut out);
    out
}

fn combinations_rec(width: u32, bits: u32, start: u32, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
    if current.len() as u32 == bits {
        out.push(current.clone());
        return;
    }
    for pos in start..width {
        current.push(pos);
        combinations_rec(width, bits, pos + 1, current, out);
        current.pop();
    }
}

/// Observer adapter wiring [`LabelIndex`] up as a [`LabelSink`] so an
/// `Environment` can report label/owner changes without knowing anything
/// about Hamming matching. Shared via `Rc<RefCell<_>>` with whatever else
/// needs read access (the VM's `JMPR` handler) since the whole engine runs
/// single-threaded per tick (spec §5).
pub struct LabelIndexSink {
    pub index: Rc<RefCell<LabelIndex>>,
}

impl LabelIndexSink {
    pub fn new(index: LabelIndex) -> (Self, Rc<RefCell<LabelIndex>>) {
        let shared = Rc::new(RefCell::new(index));
        (LabelIndexSink { index: shared.clone() }, shared)
    }
}

impl LabelSink for LabelIndexSink {
    fn on_label_change(
        &mut self,
        flat_index: usize,
        old: Option<crate::molecule::Molecule>,
        new: Option<crate::molecule::Molecule>,
        owner: u64,
    ) {
        let mut index = self.index.borrow_mut();
        if let Some(old) = old {
            index.remove_label(old.value() & KEY_MASK, flat_index);
        }
        if let Some(new) = new {
            index.add_label(
                new.value() & KEY_MASK,
                LabelEntry {
                    flat_index,
                    owner,
                    marker: new.marker(),
                },
            );
        }
    }

    fn on_owner_change(&mut self, flat_index: usize, molecule: crate::molecule::Molecule, new_owner: u64) {
        self.index.borrow_mut().update_owner(molecule.value() & KEY_MASK, flat_index, new_owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_key_match_is_found() {
        let mut idx = LabelIndex::new(Shape::new(vec![16, 16]), LabelIndexConfig::default());
        idx.add_label(0b1010, LabelEntry { flat_index: 5, owner: 1, marker: 0 });
        let found = idx.find_target(0b1010, &Coord::new(vec![0, 0]), 1, None).unwrap();
        assert_eq!(found, Some(5));
    }

    #[test]
    fn within_tolerance_match_is_found() {
        let mut idx = LabelIndex::new(Shape::new(vec![16, 16]), LabelIndexConfig::default());
        idx.add_label(0b10101010101010101010, LabelEntry { flat_index: 5, owner: 1, marker: 0 });
        let query = 0b10101010101010101011;
        let found = idx.find_target(query, &Coord::new(vec![0, 0]), 1, None).unwrap();
        assert_eq!(found, Some(5));
    }

    #[test]
    fn beyond_tolerance_finds_nothing() {
        let mut idx = LabelIndex::new(Shape::new(vec![16, 16]), LabelIndexConfig::default());
        idx.add_label(0b10101010101010101010, LabelEntry { flat_index: 5, owner: 1, marker: 0 });
        let query = 0b10101010101010100001; // hamming 3
        let found = idx.find_target(query, &Coord::new(vec![0, 0]), 1, None).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn deterministic_tiebreak_prefers_lowest_owner_then_flat_index() {
        let mut idx = LabelIndex::new(Shape::new(vec![16, 16]), LabelIndexConfig::default());
        idx.add_label(0b1010, LabelEntry { flat_index: 9, owner: 3, marker: 0 });
        idx.add_label(0b1010, LabelEntry { flat_index: 2, owner: 1, marker: 0 });
        let found = idx.find_target(0b1010, &Coord::new(vec![0, 0]), 1, None).unwrap();
        assert_eq!(found, Some(2));
    }

    #[test]
    fn missing_random_provider_errors_when_spread_configured() {
        let idx = LabelIndex::new(
            Shape::new(vec![16, 16]),
            LabelIndexConfig { selection_spread: 5, ..LabelIndexConfig::default() },
        );
        let result = idx.find_target(0b1010, &Coord::new(vec![0, 0]), 1, None);
        assert!(matches!(result, Err(LabelMatchingError::MissingRandomProvider)));
    }

    #[test]
    fn stochastic_selection_picks_among_tied_candidates_and_stays_reproducible() {
        use crate::random::SeededRandomProvider;

        let mut idx = LabelIndex::new(
            Shape::new(vec![16, 16]),
            LabelIndexConfig { selection_spread: 5, ..LabelIndexConfig::default() },
        );
        idx.add_label(0b1010, LabelEntry { flat_index: 9, owner: 3, marker: 0 });
        idx.add_label(0b1010, LabelEntry { flat_index: 2, owner: 1, marker: 0 });

        let provider_a = SeededRandomProvider::new(7);
        let found_a = idx.find_target(0b1010, &Coord::new(vec![0, 0]), 1, Some(&provider_a)).unwrap();

        let provider_b = SeededRandomProvider::new(7);
        let found_b = idx.find_target(0b1010, &Coord::new(vec![0, 0]), 1, Some(&provider_b)).unwrap();

        assert_eq!(found_a, found_b, "same seed must reproduce the same stochastic pick");
        assert!(found_a == Some(9) || found_a == Some(2));
    }
}
