use harmonic_core::{BoundaryValues, PathConfig, PixelThresholds, SolverConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Full planner configuration, as read from a JSON file.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub boundary: BoundaryValues,
    pub solver: SolverConfig,
    pub thresholds: PixelThresholds,
    pub path: PathConfig,
}

impl PlannerConfig {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let config: PlannerConfig = serde_json::from_str(&text)
            .map_err(|e| format!("failed to parse config {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> harmonic_core::Result<()> {
        self.boundary.validate()?;
        self.solver.validate()?;
        self.path.validate()
    }
}
