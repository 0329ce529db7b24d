//! N-dimensional coordinates and the toroidal shape they are addressed
//! against. The environment's rank is configurable; 2D is the common case
//! but nothing here assumes it.

use serde::{Deserialize, Serialize};

/// The shape of the world grid: one extent per dimension. Strides are
/// precomputed once so flat-index arithmetic never recomputes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    extents: Vec<i64>,
    strides: Vec<i64>,
}

impl Shape {
    pub fn new(extents: Vec<i64>) -> Self {
        assert!(!extents.is_empty(), "shape must have at least one dimension");
        assert!(extents.iter().all(|&e| e > 0), "every extent must be positive");

        let mut strides = vec![1i64; extents.len()];
        for i in (0..extents.len() - 1).rev() {
            strides[i] = strides[i + 1] * extents[i + 1];
        }
        Shape { extents, strides }
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[i64] {
        &self.extents
    }

    pub fn len(&self) -> usize {
        self.extents.iter().product::<i64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reduces a coordinate modulo the shape, always returning a
    /// non-negative representative per axis.
    pub fn wrap(&self, coord: &Coord) -> Coord {
        assert_eq!(coord.rank(), self.rank(), "coordinate rank must match shape rank");
        let axes = coord
            .axes
            .iter()
            .zip(&self.extents)
            .map(|(&c, &extent)| c.rem_euclid(extent))
            .collect();
        Coord::new(axes)
    }

    /// Flat index for a coordinate that is already wrapped.
    pub fn flat_index(&self, coord: &Coord) -> usize {
        coord
            .axes
            .iter()
            .zip(&self.strides)
            .map(|(&c, &s)| c * s)
            .sum::<i64>() as usize
    }

    /// Flat index after wrapping; the common entry point for any write/read.
    pub fn flat_index_wrapped(&self, coord: &Coord) -> usize {
        self.flat_index(&self.wrap(coord))
    }

    pub fn coord_of(&self, flat_index: usize) -> Coord {
        let mut remaining = flat_index as i64;
        let mut axes = vec![0i64; self.rank()];
        for i in 0..self.rank() {
            axes[i] = remaining / self.strides[i];
            remaining %= self.strides[i];
        }
        Coord::new(axes)
    }

    /// Toroidal Chebyshev distance (max absolute per-axis wrapped delta),
    /// used by the label index's scoring function.
    pub fn toroidal_chebyshev(&self, a: &Coord, b: &Coord) -> i64 {
        a.axes
            .iter()
            .zip(&b.axes)
            .zip(&self.extents)
            .map(|((&av, &bv), &extent)| {
                let raw = (av - bv).rem_euclid(extent);
                raw.min(extent - raw)
            })
            .max()
            .unwrap_or(0)
    }
}

/// An n-dimensional coordinate vector. May be un-reduced; reduce it through
/// `Shape::wrap` before using it to address a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    axes: Vec<i64>,
}

impl Coord {
    pub fn new(axes: Vec<i64>) -> Self {
        Coord { axes }
    }

    pub fn zero(rank: usize) -> Self {
        Coord::new(vec![0; rank])
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[i64] {
        &self.axes
    }

    pub fn add(&self, other: &Coord) -> Coord {
        assert_eq!(self.rank(), other.rank());
        Coord::new(
            self.axes
                .iter()
                .zip(&other.axes)
                .map(|(&a, &b)| a + b)
                .collect(),
        )
    }

    pub fn scale(&self, factor: i64) -> Coord {
        Coord::new(self.axes.iter().map(|&a| a * factor).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_reduces_modulo_shape() {
        let shape = Shape::new(vec![4, 4]);
        let wrapped = shape.wrap(&Coord::new(vec![-1, 5]));
        assert_eq!(wrapped.axes(), &[3, 1]);
    }

    #[test]
    fn flat_index_round_trips_through_coord_of() {
        let shape = Shape::new(vec![3, 5, 2]);
        for flat in 0..shape.len() {
            let coord = shape.coord_of(flat);
            assert_eq!(shape.flat_index(&coord), flat);
        }
    }

    #[test]
    fn cells_and_owners_len_equals_shape_product() {
        let shape = Shape::new(vec![1024, 1024]);
        assert_eq!(shape.len(), 1024 * 1024);
    }

    #[test]
    fn toroidal_chebyshev_wraps_around_edges() {
        let shape = Shape::new(vec![10, 10]);
        let a = Coord::new(vec![0, 0]);
        let b = Coord::new(vec![9, 0]);
        // going the other way around is distance 1, not 9
        assert_eq!(shape.toroidal_chebyshev(&a, &b), 1);
    }
}
