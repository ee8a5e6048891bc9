//! Sweep loop driving a [`HarmonicField`] to convergence.

use crate::error::{HarmonicError, Result};
use crate::field::{HarmonicField, SweepOrder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

/// Sweep cap applied unless the caller opts out with `max_iterations: None`.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Stop once a sweep's largest change falls below this
    pub epsilon: f64,
    /// Sweep cap; `None` is unbounded and may not terminate on
    /// pathological maps
    pub max_iterations: Option<u32>,
    pub order: SweepOrder,
    /// Log progress every this many sweeps (0 disables)
    pub progress_interval: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            order: SweepOrder::GaussSeidel,
            progress_interval: 1000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(HarmonicError::InvalidConfig(format!(
                "epsilon must be positive and finite (epsilon={})",
                self.epsilon
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(HarmonicError::InvalidConfig(
                "max_iterations must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Passed to the per-sweep callback of [`Solver::solve_with`].
#[derive(Clone, Copy, Debug)]
pub struct SweepProgress {
    /// Sweeps completed in this solve, starting at 1
    pub iteration: u32,
    pub max_delta: f64,
}

/// Outcome of one solve call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolveReport {
    /// Sweeps performed by this call
    pub iterations: u32,
    /// Wall-clock time of the sweep loop; zero on wasm32
    pub elapsed: Duration,
    pub converged: bool,
    /// Stopped early by the progress callback
    pub cancelled: bool,
    pub final_max_delta: Option<f64>,
    pub epsilon: f64,
}

impl SolveReport {
    /// Present when the cap was hit before epsilon was met.
    pub fn warning(&self) -> Option<NonconvergenceWarning> {
        (!self.converged && !self.cancelled).then(|| NonconvergenceWarning {
            iterations: self.iterations,
            max_delta: self.final_max_delta.unwrap_or(f64::INFINITY),
            epsilon: self.epsilon,
        })
    }
}

/// Non-fatal: the iteration cap stopped the solve before epsilon was met.
#[derive(Clone, Debug, PartialEq)]
pub struct NonconvergenceWarning {
    pub iterations: u32,
    pub max_delta: f64,
    pub epsilon: f64,
}

impl fmt::Display for NonconvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did not converge after {} sweeps: max delta {:e} >= epsilon {:e}",
            self.iterations, self.max_delta, self.epsilon
        )
    }
}

/// Repeats sweeps until the field settles or the cap is reached.
///
/// The solver holds no field state; it borrows the field for one call.
#[derive(Clone, Debug)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(&self, field: &mut HarmonicField) -> SolveReport {
        self.solve_with(field, |_| ControlFlow::Continue(()))
    }

    /// Solve, calling `on_sweep` after every sweep. Returning
    /// `ControlFlow::Break` stops between sweeps; a sweep is never
    /// interrupted.
    pub fn solve_with<F>(&self, field: &mut HarmonicField, mut on_sweep: F) -> SolveReport
    where
        F: FnMut(&SweepProgress) -> ControlFlow<()>,
    {
        let SolverConfig {
            epsilon,
            max_iterations,
            order,
            progress_interval,
        } = self.config;

        debug!(
            "Solving {}x{} field: order={}, epsilon={:e}, cap={:?}",
            field.width(),
            field.height(),
            order.as_str(),
            epsilon,
            max_iterations
        );

        let stopwatch = Stopwatch::start();
        let mut iterations = 0u32;
        let mut final_max_delta = None;
        let mut converged = false;
        let mut cancelled = false;

        while max_iterations.is_none_or(|cap| iterations < cap) {
            let max_delta = field.sweep(order);
            iterations = iterations.saturating_add(1);
            final_max_delta = Some(max_delta);

            if progress_interval > 0 && iterations % progress_interval == 0 {
                debug!("sweep {}: max delta {:e}", iterations, max_delta);
            }

            let flow = on_sweep(&SweepProgress {
                iteration: iterations,
                max_delta,
            });
            if max_delta < epsilon {
                converged = true;
                break;
            }
            if flow.is_break() {
                cancelled = true;
                break;
            }
        }

        let report = SolveReport {
            iterations,
            elapsed: stopwatch.elapsed(),
            converged,
            cancelled,
            final_max_delta,
            epsilon,
        };

        if converged {
            info!(
                "Converged after {} sweeps in {:.3?} (max delta {:e})",
                iterations, report.elapsed, final_max_delta.unwrap_or_default()
            );
        } else if cancelled {
            info!("Solve cancelled after {} sweeps", iterations);
        } else if let Some(warning) = report.warning() {
            warn!("{}", warning);
        }
        report
    }
}

/// Solve with the default order and progress settings.
pub fn solve(
    field: &mut HarmonicField,
    epsilon: f64,
    max_iterations: Option<u32>,
) -> Result<SolveReport> {
    let solver = Solver::new(SolverConfig {
        epsilon,
        max_iterations,
        ..SolverConfig::default()
    })?;
    Ok(solver.solve(field))
}

#[cfg(not(target_arch = "wasm32"))]
struct Stopwatch(std::time::Instant);

#[cfg(not(target_arch = "wasm32"))]
impl Stopwatch {
    fn start() -> Self {
        Self(std::time::Instant::now())
    }

    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

// std::time::Instant panics on wasm32-unknown-unknown; callers time there.
#[cfg(target_arch = "wasm32")]
struct Stopwatch;

#[cfg(target_arch = "wasm32")]
impl Stopwatch {
    fn start() -> Self {
        Self
    }

    fn elapsed(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::BoundaryValues;
    use crate::grid::GridMap;

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
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        for epsilon in [0.0, -1e-3, f64::NAN, f64::INFINITY] {
            let config = SolverConfig {
                epsilon,
                ..SolverConfig::default()
            };
            assert!(Solver::new(config).is_err());
        }
        let config = SolverConfig {
            max_iterations: Some(0),
            ..SolverConfig::default()
        };
        assert!(matches!(
            Solver::new(config),
            Err(HarmonicError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_converges_on_simple_map() {
        let mut field = simple_field();
        let report = solve(&mut field, 1e-3, Some(500)).unwrap();
        assert!(report.converged);
        assert!(!report.cancelled);
        assert!(report.iterations > 0 && report.iterations < 500);
        assert!(report.final_max_delta.unwrap() < 1e-3);
        assert!(report.warning().is_none());
        assert_eq!(field.sweeps(), report.iterations);
    }

    #[test]
    fn test_cap_reports_nonconvergence_without_error() {
        let mut field = simple_field();
        let report = solve(&mut field, 1e-12, Some(3)).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 3);
        let warning = report.warning().unwrap();
        assert_eq!(warning.iterations, 3);
        assert!(warning.max_delta >= 1e-12);
        assert!(warning.to_string().contains("did not converge after 3 sweeps"));
    }

    #[test]
    fn test_unbounded_solve_terminates_on_bounded_domain() {
        let mut field = simple_field();
        let report = solve(&mut field, 1e-9, None).unwrap();
        assert!(report.converged);
    }

    #[test]
    fn test_callback_can_cancel_between_sweeps() {
        let mut field = simple_field();
        let solver = Solver::new(SolverConfig {
            epsilon: 1e-12,
            ..SolverConfig::default()
        })
        .unwrap();

        let mut seen = Vec::new();
        let report = solver.solve_with(&mut field, |p| {
            seen.push(p.iteration);
            if p.iteration == 4 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert!(report.cancelled);
        assert!(!report.converged);
        assert_eq!(report.iterations, 4);
        assert!(report.warning().is_none());
    }

    #[test]
    fn test_gauss_seidel_deltas_do_not_grow() {
        let mut field = simple_field();
        let solver = Solver::new(SolverConfig {
            epsilon: 1e-10,
            ..SolverConfig::default()
        })
        .unwrap();
        let mut deltas = Vec::new();
        let report = solver.solve_with(&mut field, |p| {
            deltas.push(p.max_delta);
            ControlFlow::Continue(())
        });
        assert!(report.converged);
        for pair in deltas.windows(2).skip(1) {
            assert!(pair[1] <= pair[0], "delta grew: {:?}", pair);
        }
    }

    #[test]
    fn test_sweep_after_convergence_stays_below_epsilon() {
        for order in [SweepOrder::GaussSeidel, SweepOrder::Jacobi, SweepOrder::RedBlack] {
            let mut field = simple_field();
            let solver = Solver::new(SolverConfig {
                epsilon: 1e-3,
                order,
                ..SolverConfig::default()
            })
            .unwrap();
            assert!(solver.solve(&mut field).converged);
            assert!(field.sweep(order) < 1e-3, "{:?}", order);
        }
    }
}
