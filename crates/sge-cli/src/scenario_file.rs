//! Scenario files: `[topology]`, `[params]`, and optional `[bounds]` and
//! `[solver]` tables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sge_algo::{AllocationProblem, SolverConfig};
use sge_core::Scenario;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(flatten)]
    pub scenario: Scenario,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl ScenarioFile {
    pub fn problem(&self) -> Result<AllocationProblem> {
        AllocationProblem::from_scenario(&self.scenario).context("building allocation problem")
    }

    pub fn display_name(&self, path: &Path) -> String {
        self.scenario
            .name
            .clone()
            .unwrap_or_else(|| path.display().to_string())
    }
}

/// Read a scenario from TOML, or from JSON when the extension is `.json`.
pub fn load_scenario(path: &Path) -> Result<ScenarioFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON {}", path.display()))
    } else {
        toml::from_str(&text).with_context(|| format!("parsing TOML {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_table_is_optional() {
        let file: ScenarioFile = toml::from_str(
            r#"
            [topology]
            kind = "line"
            nodes = 2

            [params]
            productivity = [[1.0], [1.0]]
            region_population = [2.0]
            "#,
        )
        .unwrap();
        assert_eq!(file.solver, SolverConfig::default());
        assert_eq!(file.problem().unwrap().n_var(), 1 + 2 + 2 + 2 + 2);
    }

    #[test]
    fn test_solver_table_overrides_defaults() {
        let file: ScenarioFile = toml::from_str(
            r#"
            name = "tiny"

            [topology]
            kind = "line"
            nodes = 1

            [params]
            productivity = [[1.0]]
            region_population = [1.0]

            [bounds]
            consumption = 1e-5

            [solver]
            max_iterations = 42
            "#,
        )
        .unwrap();
        assert_eq!(file.solver.max_iterations, 42);
        assert_eq!(file.scenario.bounds.consumption, 1e-5);
        assert_eq!(file.problem().unwrap().floors().consumption, 1e-5);
        assert_eq!(file.display_name(Path::new("x.toml")), "tiny");
    }
}
