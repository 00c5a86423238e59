//! Interpolation weights for the corner grids of an n-gon.
//!
//! For corner `i` of an `n`-gon and a grid sample `(x, y)`, the weights blend
//! the polygon's base vertices so that the grid corner `(g-1, g-1)` lands on
//! vertex `i`, the `x = g-1` border runs to the midpoint of edge `i` and the
//! `y = g-1` border to the midpoint of edge `i - 1`. The center `(0, 0)` is
//! the polygon average.

use std::collections::HashMap;

/// Weight tables memoized per valence for one grid resolution.
#[derive(Debug, Clone)]
pub struct WeightTable {
    grid_cuts: usize,
    tables: HashMap<usize, Vec<f32>>,
}

impl WeightTable {
    /// Table for grids with `grid_cuts` interior samples per side
    /// (`grid_size = grid_cuts + 2`).
    pub fn new(grid_cuts: usize) -> Self {
        Self {
            grid_cuts,
            tables: HashMap::new(),
        }
    }

    /// Samples along a grid side.
    pub fn grid_size(&self) -> usize {
        self.grid_cuts + 2
    }

    /// All weights for valence `n`: `n` grids of `grid_size²` rows, each row
    /// holding `n` weights.
    pub fn weights(&mut self, n: usize) -> &[f32] {
        let g = self.grid_size();
        self.tables.entry(n).or_insert_with(|| build(n, g))
    }

    /// Weights of sample `(x, y)` of corner `corner` for valence `n`.
    pub fn row(&mut self, n: usize, corner: usize, x: usize, y: usize) -> &[f32] {
        let g = self.grid_size();
        let at = ((corner * g + y) * g + x) * n;
        &self.weights(n)[at..at + n]
    }

    /// Number of valences built so far.
    pub fn cached(&self) -> usize {
        self.tables.len()
    }

    /// Drop every cached table.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

fn build(n: usize, g: usize) -> Vec<f32> {
    let mut w = vec![0.0f32; n * g * g * n];
    let fac = 1.0 / n as f32;
    let fac2 = n as f32 - 4.0;
    let span = (g - 1) as f32;

    for corner in 0..n {
        for y in 0..g {
            for x in 0..g {
                let u = 0.5 - x as f32 / span / 2.0;
                let v = 0.5 - y as f32 / span / 2.0;
                let w_corner = (1.0 - u) * (1.0 - v) - fac2 * u * v * fac;
                let w_prev = (1.0 - v - fac2 * v * fac) * u;
                let w_next = v * (1.0 - u - fac2 * u * fac);

                let at = ((corner * g + y) * g + x) * n;
                let row = &mut w[at..at + n];
                if n > 3 {
                    row.fill((1.0 - (w_corner + w_prev + w_next)) / (n - 3) as f32);
                }
                row[corner] = w_corner;
                row[(corner + n - 1) % n] = w_prev;
                row[(corner + 1) % n] = w_next;
            }
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_samples() {
        let mut table = WeightTable::new(1);
        let g = table.grid_size();

        // Far corner sits on the polygon vertex.
        assert_eq!(table.row(4, 2, g - 1, g - 1), &[0.0, 0.0, 1.0, 0.0]);
        // Center is the average.
        for w in table.row(5, 0, 0, 0) {
            assert!((w - 0.2).abs() < 1e-6);
        }
        // x border midpoint is on edge (corner, corner + 1).
        assert_eq!(table.row(4, 1, g - 1, 0), &[0.0, 0.5, 0.5, 0.0]);
        // y border midpoint is on edge (corner - 1, corner).
        assert_eq!(table.row(4, 0, 0, g - 1), &[0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_memoized_per_valence() {
        let mut table = WeightTable::new(3);
        let first = table.weights(6).to_vec();
        table.weights(3);
        assert_eq!(table.cached(), 2);
        assert_eq!(table.weights(6), &first[..]);
        table.clear();
        assert_eq!(table.cached(), 0);
    }
}
