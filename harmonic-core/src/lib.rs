//! Harmonic potential fields for grid path planning.
//!
//! Obstacles and goals are Dirichlet boundaries on a grid classified from
//! an image; free space is relaxed until the field satisfies Laplace's
//! equation. The result has no local minima other than the goal, so
//! descending its gradient from any connected free cell reaches a goal.
//!
//! ```
//! use harmonic_core::{BoundaryValues, FieldSampler, GridMap, HarmonicField, solve};
//!
//! let map = GridMap::from_ascii("##G##\n#...#\n#...#\n#####").unwrap();
//! let mut field = HarmonicField::initialize(map, BoundaryValues::default()).unwrap();
//! let report = solve(&mut field, 1e-6, Some(10_000)).unwrap();
//! assert!(report.converged);
//!
//! let sampler = FieldSampler::new(&field);
//! let (_, dy) = sampler.gradient(2.0, 2.0).unwrap();
//! assert!(dy > 0.0);
//! ```

pub mod checkpoint;
pub mod error;
pub mod field;
pub mod grid;
pub mod path;
pub mod sampler;
pub mod solver;

pub use checkpoint::{Checkpoint, load_checkpoint, read_checkpoint, save_checkpoint, write_checkpoint};
pub use error::{HarmonicError, Result};
pub use field::{BoundaryValues, FieldSnapshot, HarmonicField, SweepOrder};
pub use grid::{CellClass, GridMap, PixelSource, PixelThresholds, RgbaPixels};
pub use path::{PathConfig, Termination, TracedPath, trace_path};
pub use sampler::{DEFAULT_CD_PRECISION, FieldSampler};
pub use solver::{
    DEFAULT_MAX_ITERATIONS, NonconvergenceWarning, SolveReport, Solver, SolverConfig,
    SweepProgress, solve,
};
