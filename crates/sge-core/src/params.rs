//! Economic parameter set
//!
//! | Symbol | Field               | Meaning                                         | Default |
//! |--------|---------------------|-------------------------------------------------|---------|
//! | α      | `alpha`             | Cobb-Douglas share of consumption in utility    | 0.5     |
//! | σ      | `sigma`             | CES elasticity of substitution across goods     | 5.0     |
//! | a      | `a`                 | returns to labor in production `Y = Z·L^a`      | 0.8     |
//! | β      | `beta`              | congestion intensity of transport cost          | 1.0     |
//! | ν      | `nu`                | exponent of the cross-good flow power-sum       | 1.0     |
//! | m      | `goods_weights`     | per-good weight in the flow power-sum           | 1 each  |
//! | Z      | `productivity`      | `[node][good]` productivity                     | required|
//! | H      | `housing`           | per-node housing / amenity endowment            | 1 each  |
//! | Lr     | `region_population` | population target per region                    | required|
//! | ωr     | `region_weights`    | welfare weight per region                       | 1 each  |
//! | κ      | `kappa`             | per-edge capacity                               | 1 each  |
//!
//! Optional vectors left empty are filled with ones by [`ModelParams::resolve`],
//! which also validates every length against the topology.

use crate::error::{SgeError, SgeResult};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

fn default_alpha() -> f64 {
    0.5
}
fn default_sigma() -> f64 {
    5.0
}
fn default_a() -> f64 {
    0.8
}
fn default_one() -> f64 {
    1.0
}

/// Calibrated model parameters. Immutable once handed to a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_a")]
    pub a: f64,
    #[serde(default = "default_one")]
    pub beta: f64,
    #[serde(default = "default_one")]
    pub nu: f64,
    #[serde(default)]
    pub goods_weights: Vec<f64>,
    pub productivity: Vec<Vec<f64>>,
    #[serde(default)]
    pub housing: Vec<f64>,
    pub region_population: Vec<f64>,
    #[serde(default)]
    pub region_weights: Vec<f64>,
    #[serde(default)]
    pub kappa: Vec<f64>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            sigma: default_sigma(),
            a: default_a(),
            beta: 1.0,
            nu: 1.0,
            goods_weights: Vec::new(),
            productivity: Vec::new(),
            housing: Vec::new(),
            region_population: Vec::new(),
            region_weights: Vec::new(),
            kappa: Vec::new(),
        }
    }
}

impl ModelParams {
    /// Parameters with default elasticities and unit vectors everywhere
    /// except productivity and population targets.
    pub fn new(productivity: Vec<Vec<f64>>, region_population: Vec<f64>) -> Self {
        Self {
            productivity,
            region_population,
            ..Self::default()
        }
    }

    /// Number of goods (N), taken from the productivity rows.
    pub fn n_goods(&self) -> usize {
        self.productivity.first().map_or(0, Vec::len)
    }

    /// Productivity of good `n` at node `j`.
    #[inline]
    pub fn z(&self, node: usize, good: usize) -> f64 {
        self.productivity[node][good]
    }

    /// Fill empty optional vectors with ones and validate against `topology`.
    pub fn resolve(mut self, topology: &Topology) -> SgeResult<Self> {
        let n_goods = self.n_goods();
        if self.goods_weights.is_empty() {
            self.goods_weights = vec![1.0; n_goods];
        }
        if self.housing.is_empty() {
            self.housing = vec![1.0; topology.node_count()];
        }
        if self.region_weights.is_empty() {
            self.region_weights = vec![1.0; topology.region_count()];
        }
        if self.kappa.is_empty() {
            self.kappa = vec![1.0; topology.edge_count()];
        }
        self.validate(topology)?;
        Ok(self)
    }

    /// Check lengths, parameter domains and the single-good-per-node rule.
    pub fn validate(&self, topology: &Topology) -> SgeResult<()> {
        let n_nodes = topology.node_count();
        let n_goods = self.n_goods();

        // ====================================================================
        // DIMENSIONS
        // ====================================================================

        if self.productivity.len() != n_nodes {
            return Err(SgeError::dimension(
                "productivity rows",
                n_nodes,
                self.productivity.len(),
            ));
        }
        if n_goods == 0 {
            return Err(SgeError::Validation(
                "productivity must describe at least one good".into(),
            ));
        }
        for row in &self.productivity {
            if row.len() != n_goods {
                return Err(SgeError::dimension("productivity columns", n_goods, row.len()));
            }
        }
        check_len("goods_weights", &self.goods_weights, n_goods)?;
        check_len("housing", &self.housing, n_nodes)?;
        check_len(
            "region_population",
            &self.region_population,
            topology.region_count(),
        )?;
        check_len("region_weights", &self.region_weights, topology.region_count())?;
        check_len("kappa", &self.kappa, topology.edge_count())?;

        // ====================================================================
        // ELASTICITIES
        // ====================================================================

        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SgeError::Validation(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.sigma > 0.0) || (self.sigma - 1.0).abs() < 1e-12 {
            return Err(SgeError::Validation(format!(
                "sigma must be positive and different from 1, got {}",
                self.sigma
            )));
        }
        if !(self.a > 0.0 && self.a <= 1.0) {
            return Err(SgeError::Validation(format!(
                "a must lie in (0, 1], got {}",
                self.a
            )));
        }
        if !(self.beta >= 0.0) {
            return Err(SgeError::Validation(format!(
                "beta must be nonnegative, got {}",
                self.beta
            )));
        }
        if !(self.nu >= 1.0) {
            return Err(SgeError::Validation(format!(
                "nu must be at least 1, got {}",
                self.nu
            )));
        }

        // ====================================================================
        // VECTORS
        // ====================================================================

        check_all("goods_weights", &self.goods_weights, |v| v > 0.0)?;
        check_all("housing", &self.housing, |v| v >= 0.0)?;
        check_all("region_population", &self.region_population, |v| v > 0.0)?;
        check_all("region_weights", &self.region_weights, |v| v >= 0.0)?;
        check_all("kappa", &self.kappa, |v| v > 0.0)?;

        for (j, row) in self.productivity.iter().enumerate() {
            if let Some(bad) = row.iter().find(|z| !(z.is_finite() && **z >= 0.0)) {
                return Err(SgeError::Validation(format!(
                    "productivity at node {} must be finite and nonnegative, got {}",
                    j, bad
                )));
            }
            let producing = row.iter().filter(|&&z| z > 0.0).count();
            if producing > 1 {
                return Err(SgeError::ModelIncompatible {
                    node: j,
                    goods: producing,
                });
            }
        }

        Ok(())
    }
}

fn check_len(what: &str, values: &[f64], expected: usize) -> SgeResult<()> {
    if values.len() != expected {
        return Err(SgeError::dimension(what, expected, values.len()));
    }
    Ok(())
}

fn check_all(what: &str, values: &[f64], ok: impl Fn(f64) -> bool) -> SgeResult<()> {
    match values.iter().position(|&v| !(v.is_finite() && ok(v))) {
        Some(i) => Err(SgeError::Validation(format!(
            "{}[{}] = {} is out of range",
            what, i, values[i]
        ))),
        None => Ok(()),
    }
}

/// Edge capacity from infrastructure stock and iceberg distance:
/// `κ_e = I_e^γ / δτ_e`.
pub fn kappa_from_infrastructure(
    infrastructure: &[f64],
    delta_tau: &[f64],
    gamma: f64,
) -> SgeResult<Vec<f64>> {
    if infrastructure.len() != delta_tau.len() {
        return Err(SgeError::dimension(
            "delta_tau",
            infrastructure.len(),
            delta_tau.len(),
        ));
    }
    infrastructure
        .iter()
        .zip(delta_tau)
        .enumerate()
        .map(|(e, (&i, &tau))| {
            if tau <= 0.0 || i < 0.0 {
                Err(SgeError::Validation(format!(
                    "edge {}: infrastructure must be >= 0 and delta_tau > 0",
                    e
                )))
            } else {
                Ok(i.powf(gamma) / tau)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> Topology {
        Topology::line(2).unwrap()
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let params = ModelParams::new(vec![vec![1.0, 0.0], vec![0.0, 2.0]], vec![1.0])
            .resolve(&two_nodes())
            .unwrap();
        assert_eq!(params.goods_weights, vec![1.0, 1.0]);
        assert_eq!(params.housing, vec![1.0, 1.0]);
        assert_eq!(params.region_weights, vec![1.0]);
        assert_eq!(params.kappa, vec![1.0]);
        assert_eq!(params.n_goods(), 2);
    }

    #[test]
    fn test_rejects_multiple_goods_at_node() {
        let err = ModelParams::new(vec![vec![1.0, 0.5], vec![0.0, 2.0]], vec![1.0])
            .resolve(&two_nodes())
            .unwrap_err();
        assert!(
            matches!(err, SgeError::ModelIncompatible { node: 0, goods: 2 }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_rejects_wrong_row_count() {
        let err = ModelParams::new(vec![vec![1.0]], vec![1.0])
            .resolve(&two_nodes())
            .unwrap_err();
        assert!(matches!(err, SgeError::Dimension { .. }));
    }

    #[test]
    fn test_rejects_unit_sigma() {
        let mut params = ModelParams::new(vec![vec![1.0], vec![1.0]], vec![1.0]);
        params.sigma = 1.0;
        assert!(params.resolve(&two_nodes()).is_err());
    }

    #[test]
    fn test_rejects_nu_below_one() {
        let mut params = ModelParams::new(vec![vec![1.0], vec![1.0]], vec![1.0]);
        params.nu = 0.5;
        assert!(params.resolve(&two_nodes()).is_err());
    }

    #[test]
    fn test_rejects_nonpositive_population() {
        let params = ModelParams::new(vec![vec![1.0], vec![1.0]], vec![0.0]);
        let err = params.resolve(&two_nodes()).unwrap_err();
        assert!(err.to_string().contains("region_population"));
    }

    #[test]
    fn test_zero_productivity_node_is_allowed() {
        let params = ModelParams::new(vec![vec![1.0], vec![0.0]], vec![1.0]);
        assert!(params.resolve(&two_nodes()).is_ok());
    }

    #[test]
    fn test_kappa_from_infrastructure() {
        let kappa = kappa_from_infrastructure(&[4.0, 9.0], &[2.0, 3.0], 0.5).unwrap();
        assert!((kappa[0] - 1.0).abs() < 1e-12);
        assert!((kappa[1] - 1.0).abs() < 1e-12);
        assert!(kappa_from_infrastructure(&[1.0], &[0.0], 1.0).is_err());
        assert!(kappa_from_infrastructure(&[1.0], &[], 1.0).is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let params: ModelParams = serde_json::from_str(
            r#"{ "productivity": [[1.0], [2.0]], "region_population": [1.0] }"#,
        )
        .unwrap();
        assert_eq!(params.alpha, 0.5);
        assert_eq!(params.sigma, 5.0);
        assert_eq!(params.nu, 1.0);
        assert!(params.kappa.is_empty());
    }
}
