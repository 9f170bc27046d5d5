//! Scenario description: a topology spec, the parameters defined on it and
//! the lower bounds of the allocation variables.

use crate::error::{SgeError, SgeResult};
use crate::params::ModelParams;
use crate::topology::{Topology, TopologySpec};
use serde::{Deserialize, Serialize};

/// Lower bounds for the positive blocks of the allocation vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Floors {
    /// Lower bound on `Cj` and `Djn`
    pub consumption: f64,
    /// Lower bound on both flow blocks
    pub flow: f64,
    /// Lower bound on `Lj`
    pub population: f64,
}

impl Default for Floors {
    fn default() -> Self {
        Self {
            consumption: 1e-6,
            flow: 1e-8,
            population: 1e-6,
        }
    }
}

impl Floors {
    /// Every floor must be finite and non-negative.
    pub fn validate(&self) -> SgeResult<()> {
        for (name, value) in [
            ("consumption", self.consumption),
            ("flow", self.flow),
            ("population", self.population),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SgeError::Validation(format!(
                    "{} floor must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub topology: TopologySpec,
    pub params: ModelParams,
    /// `[bounds]` table; defaults when absent
    #[serde(default)]
    pub bounds: Floors,
}

impl Scenario {
    /// Build the topology and resolve the parameters against it.
    pub fn build(&self) -> SgeResult<(Topology, ModelParams)> {
        self.bounds.validate()?;
        let topology = self.topology.build()?;
        let params = self.params.clone().resolve(&topology)?;
        Ok((topology, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SgeError;

    #[test]
    fn test_build_two_region_scenario() {
        let scenario: Scenario = toml::from_str(
            r#"
            name = "two-city"

            [topology]
            kind = "custom"
            regions = [0, 1]
            edges = [[0, 1]]

            [params]
            productivity = [[2.0], [1.0]]
            region_population = [1.0, 1.0]
            "#,
        )
        .unwrap();

        let (topo, params) = scenario.build().unwrap();
        assert_eq!(scenario.name.as_deref(), Some("two-city"));
        assert_eq!(scenario.bounds, Floors::default());
        assert_eq!(topo.node_count(), 2);
        assert_eq!(params.kappa, vec![1.0]);
    }

    #[test]
    fn test_build_propagates_model_incompatibility() {
        let scenario = Scenario {
            name: None,
            topology: TopologySpec::Line {
                nodes: 1,
                regions: None,
            },
            params: ModelParams::new(vec![vec![1.0, 1.0]], vec![1.0]),
            bounds: Floors::default(),
        };
        assert!(matches!(
            scenario.build(),
            Err(SgeError::ModelIncompatible { node: 0, .. })
        ));
    }

    #[test]
    fn test_bounds_table_overrides_floors() {
        let scenario: Scenario = toml::from_str(
            r#"
            [topology]
            kind = "line"
            nodes = 2

            [params]
            productivity = [[1.0], [1.0]]
            region_population = [2.0]

            [bounds]
            population = 0.9
            "#,
        )
        .unwrap();
        assert_eq!(scenario.bounds.population, 0.9);
        assert_eq!(scenario.bounds.flow, 1e-8);
        assert!(scenario.build().is_ok());
    }

    #[test]
    fn test_negative_floor_rejected() {
        let scenario = Scenario {
            name: None,
            topology: TopologySpec::Line {
                nodes: 1,
                regions: None,
            },
            params: ModelParams::new(vec![vec![1.0]], vec![1.0]),
            bounds: Floors {
                flow: -1.0,
                ..Floors::default()
            },
        };
        assert!(matches!(scenario.build(), Err(SgeError::Validation(_))));
    }
}
