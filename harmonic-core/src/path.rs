use crate::error::{HarmonicError, Result};
use crate::grid::CellClass;
use crate::sampler::FieldSampler;
use log::debug;
use serde::{Deserialize, Serialize};

/// Number of previous points checked when detecting a stalled walk.
const STUCK_HISTORY: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Distance moved per step, in cells
    pub step_size: f64,
    /// Central-difference offset for the gradient, in cells
    pub cd_precision: f64,
    /// Maximum number of points, start included
    pub max_length: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            step_size: 0.25,
            cd_precision: 0.5,
            max_length: 10_000,
        }
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(HarmonicError::InvalidConfig(format!(
                "step_size must be positive (step_size={})",
                self.step_size
            )));
        }
        if !self.cd_precision.is_finite() || self.cd_precision <= 0.0 {
            return Err(HarmonicError::InvalidConfig(format!(
                "cd_precision must be positive (cd_precision={})",
                self.cd_precision
            )));
        }
        if self.max_length < 2 {
            return Err(HarmonicError::InvalidConfig(
                "max_length must allow at least one step".into(),
            ));
        }
        Ok(())
    }
}

/// Why the walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    ReachedGoal,
    /// Nearest cell became an obstacle.
    HitObstacle,
    /// Walk doubled back or the gradient vanished.
    Stuck,
    MaxLength,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Visited points, start first
    pub points: Vec<(f64, f64)>,
    pub termination: Termination,
}

impl TracedPath {
    pub fn reached_goal(&self) -> bool {
        self.termination == Termination::ReachedGoal
    }

    /// Sum of segment lengths.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
            .sum()
    }
}

/// Follow the descent direction from `start`.
pub fn trace_path(
    sampler: &FieldSampler<'_>,
    start: (f64, f64),
    config: &PathConfig,
) -> Result<TracedPath> {
    config.validate()?;
    let sampler = sampler.with_cd_precision(config.cd_precision)?;

    let (mut x, mut y) = start;
    if sampler.nearest_class(x, y)? == CellClass::Obstacle {
        return Err(HarmonicError::InvalidPath(format!(
            "start ({x}, {y}) lies on an obstacle"
        )));
    }

    let max_x = (sampler.field().width() - 1) as f64;
    let max_y = (sampler.field().height() - 1) as f64;
    let mut points = vec![start];

    let termination = loop {
        match sampler.nearest_class(x, y)? {
            CellClass::Goal => break Termination::ReachedGoal,
            CellClass::Obstacle => break Termination::HitObstacle,
            CellClass::Free => {}
        }
        if points.len() >= config.max_length {
            break Termination::MaxLength;
        }
        if is_stuck(&points, config.step_size) {
            break Termination::Stuck;
        }

        let Some((ux, uy)) = sampler.descent_direction(x, y)? else {
            break Termination::Stuck;
        };
        x = (x + ux * config.step_size).clamp(0.0, max_x);
        y = (y + uy * config.step_size).clamp(0.0, max_y);
        points.push((x, y));
    };

    debug!(
        "Traced path from ({:.2}, {:.2}): {} points, {:?}",
        start.0,
        start.1,
        points.len(),
        termination
    );
    Ok(TracedPath {
        points,
        termination,
    })
}

/// The newest point lies within half a step of one of the few before it.
fn is_stuck(points: &[(f64, f64)], step_size: f64) -> bool {
    let Some((&(x, y), earlier)) = points.split_last() else {
        return false;
    };
    earlier
        .iter()
        .rev()
        .take(STUCK_HISTORY)
        .any(|&(px, py)| (x - px).hypot(y - py) < step_size / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{BoundaryValues, HarmonicField};
    use crate::grid::GridMap;
    use crate::solver::solve;

    fn solved(text: &str) -> HarmonicField {
        let map = GridMap::from_ascii(text).unwrap();
        let mut field = HarmonicField::initialize(map, BoundaryValues::default()).unwrap();
        assert!(solve(&mut field, 1e-9, None).unwrap().converged);
        field
    }

    #[test]
    fn test_straight_corridor_reaches_goal() {
        let field = solved("##G##\n#...#\n#...#\n#...#\n#####");
        let sampler = FieldSampler::new(&field);
        let path = trace_path(&sampler, (2.0, 3.0), &PathConfig::default()).unwrap();
        assert!(path.reached_goal());
        let &(x, y) = path.points.last().unwrap();
        assert!((x - 2.0).abs() < 0.01);
        assert!(y < 0.5);
        assert!(path.length() > 2.5);
    }

    #[test]
    fn test_start_on_goal_is_trivial() {
        let field = solved("##G##\n#...#\n#####");
        let sampler = FieldSampler::new(&field);
        let path = trace_path(&sampler, (2.0, 0.0), &PathConfig::default()).unwrap();
        assert_eq!(path.points.len(), 1);
        assert!(path.reached_goal());
    }

    #[test]
    fn test_start_on_obstacle_rejected() {
        let field = solved("##G##\n#...#\n#####");
        let sampler = FieldSampler::new(&field);
        let err = trace_path(&sampler, (0.0, 0.0), &PathConfig::default()).unwrap_err();
        assert!(matches!(err, HarmonicError::InvalidPath(_)));
        let err = trace_path(&sampler, (9.0, 0.0), &PathConfig::default()).unwrap_err();
        assert!(matches!(err, HarmonicError::OutOfBounds { .. }));
    }

    #[test]
    fn test_max_length_stops_walk() {
        let field = solved("##G##\n#...#\n#...#\n#...#\n#####");
        let sampler = FieldSampler::new(&field);
        let config = PathConfig {
            max_length: 3,
            ..PathConfig::default()
        };
        let path = trace_path(&sampler, (2.0, 3.0), &config).unwrap();
        assert_eq!(path.termination, Termination::MaxLength);
        assert_eq!(path.points.len(), 3);
    }

    #[test]
    fn test_plateau_is_stuck() {
        // Pocket sealed off from the goal, seeded at the obstacle value,
        // stays exactly flat.
        let map = GridMap::from_ascii("G#...\n##...\n#....").unwrap();
        let boundary = BoundaryValues {
            free_init: 1.0,
            ..BoundaryValues::default()
        };
        let mut field = HarmonicField::initialize(map, boundary).unwrap();
        assert!(solve(&mut field, 1e-9, None).unwrap().converged);
        let sampler = FieldSampler::new(&field);
        let path = trace_path(&sampler, (3.0, 1.0), &PathConfig::default()).unwrap();
        assert_eq!(path.termination, Termination::Stuck);
    }

    #[test]
    fn test_is_stuck_detects_backtracking() {
        let forward = [(0.0, 0.0), (0.25, 0.0), (0.5, 0.0)];
        assert!(!is_stuck(&forward, 0.25));
        let back = [(0.0, 0.0), (0.25, 0.0), (0.5, 0.0), (0.3, 0.0)];
        assert!(is_stuck(&back, 0.25));
        assert!(!is_stuck(&[], 0.25));
    }

    #[test]
    fn test_config_validation() {
        assert!(PathConfig::default().validate().is_ok());
        let bad = PathConfig {
            step_size: 0.0,
            ..PathConfig::default()
        };
        assert!(bad.validate().is_err());
        let short = PathConfig {
            max_length: 1,
            ..PathConfig::default()
        };
        assert!(short.validate().is_err());
    }
}
