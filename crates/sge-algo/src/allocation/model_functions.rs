//! Scalar building blocks of the spatial model and their derivatives
//!
//! ```text
//! CES aggregate        D  = (Σₙ dₙ^ρ)^(1/ρ),          ρ = (σ-1)/σ
//! Flow power-sum       S  = Σₙ mₙ Qₙ^ν
//! Transport cost       c  = S^((β+1)/ν) / κ
//! Cobb-Douglas bundle  U  = (C/α)^α · K,              K = (H/(1-α))^(1-α)
//! Production           Y  = Z · L^a
//! ```
//!
//! First and second derivatives are written out explicitly; the Jacobian and
//! Hessian modules only combine them with multipliers and indices.

/// `ρ = (σ-1)/σ`.
#[inline]
pub fn ces_exponent(sigma: f64) -> f64 {
    (sigma - 1.0) / sigma
}

/// CES aggregate of per-good quantities.
pub fn ces_aggregate<I>(quantities: I, sigma: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let rho = ces_exponent(sigma);
    let sum: f64 = quantities.into_iter().map(|d| d.powf(rho)).sum();
    sum.powf(1.0 / rho)
}

/// `∂D/∂dₙ = D^(1/σ) · dₙ^(-1/σ)`.
#[inline]
pub fn ces_marginal(aggregate: f64, quantity: f64, sigma: f64) -> f64 {
    aggregate.powf(1.0 / sigma) * quantity.powf(-1.0 / sigma)
}

/// `∂²D/∂dₙ∂dₘ = (1/σ)·D^(2/σ-1)·dₙ^(-1/σ)·dₘ^(-1/σ) − δₙₘ·(1/σ)·D^(1/σ)·dₙ^(-1/σ-1)`.
#[inline]
pub fn ces_curvature(aggregate: f64, d_n: f64, d_m: f64, same_good: bool, sigma: f64) -> f64 {
    let inv = 1.0 / sigma;
    let mut value = inv * aggregate.powf(2.0 * inv - 1.0) * d_n.powf(-inv) * d_m.powf(-inv);
    if same_good {
        value -= inv * aggregate.powf(inv) * d_n.powf(-inv - 1.0);
    }
    value
}

/// `S = Σₙ mₙ Qₙ^ν`.
pub fn flow_power_sum<I>(flows: I, weights: &[f64], nu: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    flows
        .into_iter()
        .zip(weights)
        .map(|(q, m)| m * q.powf(nu))
        .sum()
}

/// Parameters of the congestion cost on one edge.
#[derive(Debug, Clone, Copy)]
pub struct Congestion {
    pub beta: f64,
    pub nu: f64,
    pub kappa: f64,
}

impl Congestion {
    /// `(β+1)/ν`
    #[inline]
    fn power(&self) -> f64 {
        (self.beta + 1.0) / self.nu
    }

    /// `c = S^((β+1)/ν) / κ`.
    #[inline]
    pub fn cost(&self, power_sum: f64) -> f64 {
        power_sum.powf(self.power()) / self.kappa
    }

    /// `∂c/∂Qₙ = (β+1)·mₙ·Qₙ^(ν-1)·S^((β+1)/ν-1) / κ`.
    #[inline]
    pub fn marginal(&self, power_sum: f64, q_n: f64, m_n: f64) -> f64 {
        (self.beta + 1.0) * m_n * q_n.powf(self.nu - 1.0) * power_sum.powf(self.power() - 1.0)
            / self.kappa
    }

    /// `∂²c/∂Qₙ∂Qₘ`: the cross term is always present; the diagonal term
    /// only exists for ν > 1.
    pub fn curvature(
        &self,
        power_sum: f64,
        q_n: f64,
        q_m: f64,
        m_n: f64,
        m_m: f64,
        same_good: bool,
    ) -> f64 {
        let p = self.power();
        let b1 = self.beta + 1.0;
        let mut value = b1
            * (b1 - self.nu)
            * m_n
            * m_m
            * (q_n * q_m).powf(self.nu - 1.0)
            * power_sum.powf(p - 2.0)
            / self.kappa;
        if same_good && self.nu > 1.0 {
            value += b1 * (self.nu - 1.0) * m_n * q_n.powf(self.nu - 2.0) * power_sum.powf(p - 1.0)
                / self.kappa;
        }
        value
    }
}

/// `K = (H/(1-α))^(1-α)`, the housing factor of the Cobb-Douglas bundle.
#[inline]
pub fn housing_factor(housing: f64, alpha: f64) -> f64 {
    (housing / (1.0 - alpha)).powf(1.0 - alpha)
}

/// `U = (C/α)^α · K`.
#[inline]
pub fn cobb_douglas(consumption: f64, housing_factor: f64, alpha: f64) -> f64 {
    (consumption / alpha).powf(alpha) * housing_factor
}

/// `∂U/∂C = (C/α)^(α-1) · K`.
#[inline]
pub fn cobb_douglas_marginal(consumption: f64, housing_factor: f64, alpha: f64) -> f64 {
    (consumption / alpha).powf(alpha - 1.0) * housing_factor
}

/// `∂²U/∂C² = -((1-α)/α) · (C/α)^(α-2) · K`.
#[inline]
pub fn cobb_douglas_curvature(consumption: f64, housing_factor: f64, alpha: f64) -> f64 {
    -((1.0 - alpha) / alpha) * (consumption / alpha).powf(alpha - 2.0) * housing_factor
}

/// `Y = Z · L^a`.
#[inline]
pub fn production(productivity: f64, labor: f64, a: f64) -> f64 {
    productivity * labor.powf(a)
}

/// `∂Y/∂L = a · Z · L^(a-1)`.
#[inline]
pub fn production_marginal(productivity: f64, labor: f64, a: f64) -> f64 {
    a * productivity * labor.powf(a - 1.0)
}

/// `∂²Y/∂L² = a(a-1) · Z · L^(a-2)`.
#[inline]
pub fn production_curvature(productivity: f64, labor: f64, a: f64) -> f64 {
    a * (a - 1.0) * productivity * labor.powf(a - 2.0)
}
