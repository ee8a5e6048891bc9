//! Potential array over a [`GridMap`] and the relaxation sweeps.
//!
//! Obstacle and goal cells are Dirichlet boundaries clamped to their
//! configured values. Only free cells are updated, each from the mean of
//! its four axis neighbours (5-point Laplacian). Neighbours outside the
//! grid read the obstacle value.

use crate::checkpoint::Checkpoint;
use crate::error::{HarmonicError, Result};
use crate::grid::{CellClass, GridMap};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dirichlet values for fixed cells and the starting value of free cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryValues {
    pub obstacle: f64,
    pub goal: f64,
    pub free_init: f64,
}

impl Default for BoundaryValues {
    fn default() -> Self {
        Self {
            obstacle: 1.0,
            goal: 0.0,
            free_init: 0.5,
        }
    }
}

impl BoundaryValues {
    pub fn validate(&self) -> Result<()> {
        if !(self.obstacle.is_finite() && self.goal.is_finite() && self.free_init.is_finite()) {
            return Err(HarmonicError::InvalidConfig(format!(
                "boundary values must be finite (obstacle={}, goal={}, free_init={})",
                self.obstacle, self.goal, self.free_init
            )));
        }
        if self.goal >= self.obstacle {
            return Err(HarmonicError::InvalidConfig(format!(
                "goal potential must be below obstacle potential (goal={}, obstacle={})",
                self.goal, self.obstacle
            )));
        }
        Ok(())
    }

    /// Initial value of a cell of the given class.
    #[inline]
    pub fn value_for(&self, class: CellClass) -> f64 {
        match class {
            CellClass::Free => self.free_init,
            CellClass::Obstacle => self.obstacle,
            CellClass::Goal => self.goal,
        }
    }
}

/// Traversal order of one relaxation sweep.
///
/// All orders converge to the same harmonic field; they differ in speed
/// and in the sequence of intermediate fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepOrder {
    /// Row-major, in place: later cells read values updated this sweep.
    #[default]
    GaussSeidel,
    /// Every cell reads the previous sweep's values only.
    Jacobi,
    /// Checkerboard Gauss-Seidel: all (x + y) even cells, then all odd.
    /// Each half-sweep is parallel with the `parallel` feature.
    RedBlack,
}

impl SweepOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepOrder::GaussSeidel => "gauss-seidel",
            SweepOrder::Jacobi => "jacobi",
            SweepOrder::RedBlack => "red-black",
        }
    }
}

/// Owned copy of the potentials for visualisation or export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

impl FieldSnapshot {
    /// `None` outside the grid.
    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    pub fn range(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Scalar potential over a grid map, mutated in place by relaxation.
#[derive(Clone, Debug)]
pub struct HarmonicField {
    map: GridMap,
    boundary: BoundaryValues,
    values: Vec<f64>,
    fixed: Vec<bool>,
    // Jacobi / red-black target buffer, allocated once
    scratch: Vec<f64>,
    sweeps: u32,
    last_max_delta: Option<f64>,
}

impl HarmonicField {
    /// Take ownership of `map` and set every cell to its starting value.
    pub fn initialize(map: GridMap, boundary: BoundaryValues) -> Result<Self> {
        boundary.validate()?;

        let free = map.count(CellClass::Free);
        if free == 0 {
            return Err(HarmonicError::InvalidMap(
                "map has no free cells to plan over".into(),
            ));
        }

        let values: Vec<f64> = map.cells().iter().map(|&c| boundary.value_for(c)).collect();
        let fixed = map.cells().iter().map(|c| c.is_fixed()).collect();

        let unreachable = map.unreachable_free_count();
        if unreachable > 0 {
            warn!(
                "{} of {} free cells have no free path to a goal; they will settle at the obstacle potential",
                unreachable, free
            );
        }
        debug!(
            "Initialized {}x{} field: {} free cells, boundary {:?}",
            map.width(),
            map.height(),
            free,
            boundary
        );

        Ok(Self {
            scratch: values.clone(),
            values,
            fixed,
            map,
            boundary,
            sweeps: 0,
            last_max_delta: None,
        })
    }

    /// Initialize over `map`, then seed free cells from `previous`.
    ///
    /// Used after the map changes (moved goal, new obstacles) so the solve
    /// starts near the old solution instead of from `free_init`.
    pub fn warm_start(map: GridMap, boundary: BoundaryValues, previous: &HarmonicField) -> Result<Self> {
        if map.dimensions() != previous.map.dimensions() {
            return Err(HarmonicError::InvalidMap(format!(
                "warm start field is {}x{} but map is {}x{}",
                previous.map.width(),
                previous.map.height(),
                map.width(),
                map.height()
            )));
        }
        let mut field = Self::initialize(map, boundary)?;
        for (i, v) in field.values.iter_mut().enumerate() {
            if !field.fixed[i] {
                *v = previous.values[i];
            }
        }
        field.scratch.copy_from_slice(&field.values);
        Ok(field)
    }

    /// Rebuild a field from a checkpoint taken over the same map.
    ///
    /// Fixed cells are reset to `boundary`, free cells take the stored
    /// potentials and the sweep counter resumes from the stored count.
    pub fn restore(map: GridMap, boundary: BoundaryValues, checkpoint: &Checkpoint) -> Result<Self> {
        let (w, h) = map.dimensions();
        if checkpoint.width as usize != w || checkpoint.height as usize != h {
            return Err(HarmonicError::Checkpoint(format!(
                "checkpoint is {}x{} but map is {}x{}",
                checkpoint.width, checkpoint.height, w, h
            )));
        }
        if checkpoint.values.len() != w * h {
            return Err(HarmonicError::Checkpoint(format!(
                "checkpoint holds {} potentials, expected {}",
                checkpoint.values.len(),
                w * h
            )));
        }
        if let Some(i) = checkpoint.values.iter().position(|v| !v.is_finite()) {
            return Err(HarmonicError::Checkpoint(format!(
                "non-finite potential at cell ({}, {})",
                i % w,
                i / w
            )));
        }

        let mut field = Self::initialize(map, boundary)?;
        for (i, v) in field.values.iter_mut().enumerate() {
            if !field.fixed[i] {
                *v = checkpoint.values[i];
            }
        }
        field.scratch.copy_from_slice(&field.values);
        field.sweeps = checkpoint.iterations;
        debug!("Restored field from checkpoint at sweep {}", field.sweeps);
        Ok(field)
    }

    // ---- Accessors ----

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn boundary(&self) -> &BoundaryValues {
        &self.boundary
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.map.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.map.height()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Potential of cell (x, y), `None` outside the grid.
    #[inline]
    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        self.map
            .in_bounds(x, y)
            .then(|| self.values[y * self.map.width() + x])
    }

    /// Out-of-grid cells count as fixed obstacles.
    #[inline]
    pub fn is_fixed(&self, x: usize, y: usize) -> bool {
        !self.map.in_bounds(x, y) || self.fixed[y * self.map.width() + x]
    }

    /// Total sweeps applied to this field, including restored ones.
    pub fn sweeps(&self) -> u32 {
        self.sweeps
    }

    pub fn last_max_delta(&self) -> Option<f64> {
        self.last_max_delta
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            width: self.map.width(),
            height: self.map.height(),
            values: self.values.clone(),
        }
    }

    // ---- Relaxation ----

    /// Stencil value for free cell (x, y) from current neighbours.
    /// Does not write; `None` for fixed or out-of-grid cells.
    pub fn relax_cell(&self, x: usize, y: usize) -> Option<f64> {
        if self.is_fixed(x, y) {
            return None;
        }
        let (w, h) = self.map.dimensions();
        Some(stencil(&self.values, w, h, self.boundary.obstacle, x, y))
    }

    /// Relax every free cell once; returns the largest absolute change.
    pub fn sweep(&mut self, order: SweepOrder) -> f64 {
        let max_delta = match order {
            SweepOrder::GaussSeidel => self.sweep_gauss_seidel(),
            SweepOrder::Jacobi => self.sweep_jacobi(),
            SweepOrder::RedBlack => {
                let a = self.relax_color(0);
                let b = self.relax_color(1);
                a.max(b)
            }
        };
        self.sweeps = self.sweeps.saturating_add(1);
        self.last_max_delta = Some(max_delta);
        trace!("sweep {} ({}): max delta {:e}", self.sweeps, order.as_str(), max_delta);
        max_delta
    }

    fn sweep_gauss_seidel(&mut self) -> f64 {
        let (w, h) = self.map.dimensions();
        let outside = self.boundary.obstacle;
        let mut max_delta = 0.0f64;

        for y in 0..h {
            let row = y * w;
            for x in 0..w {
                let i = row + x;
                if self.fixed[i] {
                    continue;
                }
                let new = stencil(&self.values, w, h, outside, x, y);
                max_delta = max_delta.max((new - self.values[i]).abs());
                self.values[i] = new;
            }
        }
        max_delta
    }

    fn sweep_jacobi(&mut self) -> f64 {
        let (w, h) = self.map.dimensions();
        let outside = self.boundary.obstacle;
        let values = &self.values;
        let fixed = &self.fixed;

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = if fixed[i] {
                values[i]
            } else {
                stencil(values, w, h, outside, i % w, i / w)
            };
        }

        let max_delta = values
            .iter()
            .zip(&self.scratch)
            .map(|(old, new)| (new - old).abs())
            .fold(0.0f64, f64::max);

        std::mem::swap(&mut self.values, &mut self.scratch);
        max_delta
    }

    /// One colour of the checkerboard. Same-colour cells never neighbour,
    /// so their updates only read the other colour and fixed cells.
    #[cfg(feature = "parallel")]
    fn relax_color(&mut self, color: usize) -> f64 {
        use rayon::prelude::*;

        let (w, h) = self.map.dimensions();
        let outside = self.boundary.obstacle;
        let fixed: &[bool] = &self.fixed;

        let values: &[f64] = &self.values;
        self.scratch
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, slot) in row.iter_mut().enumerate() {
                    if (x + y) & 1 != color || fixed[y * w + x] {
                        continue;
                    }
                    *slot = stencil(values, w, h, outside, x, y);
                }
            });

        let scratch: &[f64] = &self.scratch;
        self.values
            .par_chunks_mut(w)
            .enumerate()
            .map(|(y, row)| {
                let mut max_abs = 0.0f64;
                for (x, v) in row.iter_mut().enumerate() {
                    let i = y * w + x;
                    if (x + y) & 1 != color || fixed[i] {
                        continue;
                    }
                    max_abs = max_abs.max((scratch[i] - *v).abs());
                    *v = scratch[i];
                }
                max_abs
            })
            .reduce(|| 0.0f64, f64::max)
    }

    #[cfg(not(feature = "parallel"))]
    fn relax_color(&mut self, color: usize) -> f64 {
        self.relax_color_sequential(color)
    }

    // In-place half-sweep; the build without rayon uses it directly.
    #[cfg_attr(feature = "parallel", allow(dead_code))]
    fn relax_color_sequential(&mut self, color: usize) -> f64 {
        let (w, h) = self.map.dimensions();
        let outside = self.boundary.obstacle;
        let mut max_delta = 0.0f64;

        for y in 0..h {
            for x in ((y + color) & 1..w).step_by(2) {
                let i = y * w + x;
                if self.fixed[i] {
                    continue;
                }
                let new = stencil(&self.values, w, h, outside, x, y);
                max_delta = max_delta.max((new - self.values[i]).abs());
                self.values[i] = new;
            }
        }
        max_delta
    }
}

/// Mean of the four axis neighbours of (x, y); `outside` beyond the edge.
#[inline]
fn stencil(values: &[f64], width: usize, height: usize, outside: f64, x: usize, y: usize) -> f64 {
    let i = y * width + x;
    let left = if x > 0 { values[i - 1] } else { outside };
    let right = if x + 1 < width { values[i + 1] } else { outside };
    let up = if y > 0 { values[i - width] } else { outside };
    let down = if y + 1 < height { values[i + width] } else { outside };
    0.25 * (left + right + up + down)
}

impl fmt::Display for HarmonicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HarmonicField {}x{} (obstacle={}, goal={}, free_init={}; {} free cells): ",
            self.map.width(),
            self.map.height(),
            self.boundary.obstacle,
            self.boundary.goal,
            self.boundary.free_init,
            self.map.count(CellClass::Free)
        )?;
        match self.last_max_delta {
            Some(delta) => write!(f, "{} sweeps, last max delta {:e}", self.sweeps, delta),
            None => write!(f, "{} sweeps, not yet relaxed", self.sweeps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SIMPLE: &str = "
        ##G##
        #...#
        #...#
        #...#
        #####
    ";

    fn simple_field() -> HarmonicField {
        let map = GridMap::from_ascii(SIMPLE).unwrap();
        HarmonicField::initialize(map, BoundaryValues::default()).unwrap()
    }

    #[test]
    fn test_initialize_sets_boundary_values() {
        let field = simple_field();
        assert_eq!(field.value(2, 0), Some(0.0));
        assert_eq!(field.value(0, 0), Some(1.0));
        assert_eq!(field.value(2, 2), Some(0.5));
        assert_eq!(field.value(5, 0), None);
        assert!(field.is_fixed(2, 0));
        assert!(!field.is_fixed(1, 1));
        assert!(field.is_fixed(9, 9));
        assert_eq!(field.sweeps(), 0);
        assert_eq!(field.last_max_delta(), None);
    }

    #[test]
    fn test_red_black_half_sweeps_match_sequential() {
        let map = GridMap::from_ascii(
            "
            #..G...
            ..#.#..
            .##...#
            .......
            ",
        )
        .unwrap();
        let mut a = HarmonicField::initialize(map.clone(), BoundaryValues::default()).unwrap();
        let mut b = HarmonicField::initialize(map, BoundaryValues::default()).unwrap();

        for _ in 0..6 {
            for color in 0..2 {
                let da = a.relax_color(color);
                let db = b.relax_color_sequential(color);
                assert_eq!(da, db);
                assert_eq!(a.values(), b.values());
            }
        }
    }

    #[test]
    fn test_initialize_rejects_map_without_free_cells() {
        let map = GridMap::from_ascii("#G#").unwrap();
        let err = HarmonicField::initialize(map, BoundaryValues::default()).unwrap_err();
        assert!(matches!(err, HarmonicError::InvalidMap(_)));
    }

    #[test]
    fn test_initialize_rejects_inverted_boundary() {
        let map = GridMap::from_ascii(SIMPLE).unwrap();
        let boundary = BoundaryValues {
            obstacle: 0.0,
            goal: 1.0,
            free_init: 0.5,
        };
        let err = HarmonicField::initialize(map, boundary).unwrap_err();
        assert!(matches!(err, HarmonicError::InvalidConfig(_)));
    }

    #[test]
    fn test_relax_cell_reads_neighbors() {
        let field = simple_field();
        // (2, 1): goal above, obstacle-free neighbours at 0.5
        assert_abs_diff_eq!(field.relax_cell(2, 1).unwrap(), (0.0 + 0.5 + 0.5 + 0.5) / 4.0);
        // (1, 1): two walls, two free
        assert_abs_diff_eq!(field.relax_cell(1, 1).unwrap(), 0.75);
        assert_eq!(field.relax_cell(2, 0), None);
        assert_eq!(field.relax_cell(7, 1), None);
        // relax_cell does not write
        assert_eq!(field.value(2, 1), Some(0.5));
    }

    #[test]
    fn test_outside_grid_reads_obstacle_value() {
        // Free edge cells see the obstacle potential beyond the border.
        let map = GridMap::from_ascii("G..").unwrap();
        let field = HarmonicField::initialize(map, BoundaryValues::default()).unwrap();
        // (2, 0): left 0.5, right/up/down outside = 1.0
        assert_abs_diff_eq!(field.relax_cell(2, 0).unwrap(), (0.5 + 3.0) / 4.0);
    }

    #[test]
    fn test_gauss_seidel_first_sweep() {
        let mut field = simple_field();
        let delta = field.sweep(SweepOrder::GaussSeidel);
        // (1, 1) is visited first: 0.75, then (2, 1) already sees it
        assert_abs_diff_eq!(field.value(1, 1).unwrap(), 0.75);
        assert_abs_diff_eq!(field.value(2, 1).unwrap(), (0.75 + 0.0 + 0.5 + 0.5) / 4.0);
        assert_abs_diff_eq!(delta, 0.349609375);
        assert_eq!(field.sweeps(), 1);
        assert_eq!(field.last_max_delta(), Some(delta));
    }

    #[test]
    fn test_jacobi_first_sweep_uses_previous_values() {
        let mut field = simple_field();
        field.sweep(SweepOrder::Jacobi);
        assert_abs_diff_eq!(field.value(1, 1).unwrap(), 0.75);
        assert_abs_diff_eq!(field.value(2, 1).unwrap(), 0.375);
    }

    #[test]
    fn test_fixed_cells_never_change() {
        for order in [SweepOrder::GaussSeidel, SweepOrder::Jacobi, SweepOrder::RedBlack] {
            let mut field = simple_field();
            let before = field.values().to_vec();
            for _ in 0..25 {
                field.sweep(order);
            }
            for y in 0..5 {
                for x in 0..5 {
                    if field.is_fixed(x, y) {
                        let i = y * 5 + x;
                        assert_eq!(field.values()[i].to_bits(), before[i].to_bits());
                    }
                }
            }
        }
    }

    #[test]
    fn test_warm_start_copies_free_cells() {
        let mut field = simple_field();
        for _ in 0..5 {
            field.sweep(SweepOrder::GaussSeidel);
        }
        // Same layout with the goal moved to the bottom edge.
        let moved = GridMap::from_ascii("#####\n#...#\n#...#\n#...#\n##G##").unwrap();
        let warm = HarmonicField::warm_start(moved, BoundaryValues::default(), &field).unwrap();
        assert_eq!(warm.value(2, 2), field.value(2, 2));
        assert_eq!(warm.value(2, 0), Some(1.0));
        assert_eq!(warm.value(2, 4), Some(0.0));
        assert_eq!(warm.sweeps(), 0);

        let small = GridMap::from_ascii("G.").unwrap();
        assert!(HarmonicField::warm_start(small, BoundaryValues::default(), &field).is_err());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut field = simple_field();
        let snap = field.snapshot();
        field.sweep(SweepOrder::GaussSeidel);
        assert_eq!(snap.width, 5);
        assert_eq!(snap.height, 5);
        assert_eq!(snap.value(1, 1), Some(0.5));
        assert_eq!(snap.value(5, 1), None);
        assert_eq!(snap.value(1, 5), None);
        assert_eq!(snap.range(), (0.0, 1.0));
    }

    #[test]
    fn test_summary_reports_status() {
        let mut field = simple_field();
        let fresh = field.to_string();
        assert!(fresh.contains("5x5"));
        assert!(fresh.contains("9 free cells"));
        assert!(fresh.contains("not yet relaxed"));

        field.sweep(SweepOrder::GaussSeidel);
        assert!(field.to_string().contains("1 sweeps, last max delta"));
    }
}
