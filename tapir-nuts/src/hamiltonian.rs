use log::debug;
use rand::Rng;

use crate::metric::Metric;
use crate::model::{log_density_gradient, LogDensity};
use crate::point::PhasePoint;

/// Separable Hamiltonian `H(q, p) = U(q) + K(p)` with `U = -log p(q)`.
///
/// Positions the model rejects, or where the log density or any gradient
/// entry is not finite, get an infinite potential. The resulting energy
/// error is caught by the tree builder as a divergence.
pub struct Hamiltonian<'m, M> {
    model: &'m M,
    metric: Metric,
}

impl<'m, M: LogDensity> Hamiltonian<'m, M> {
    pub fn new(model: &'m M, metric: Metric) -> Self {
        Hamiltonian { model, metric }
    }

    pub fn model(&self) -> &'m M {
        self.model
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    /// Evaluate the potential and its gradient at `z.q`.
    pub fn update_potential_gradient(&self, z: &mut PhasePoint) {
        match log_density_gradient(self.model, &z.q) {
            Ok((lp, grad)) if lp.is_finite() && grad.iter().all(|g| g.is_finite()) => {
                z.potential = -lp;
                for (dst, g) in z.grad.iter_mut().zip(grad) {
                    *dst = -g;
                }
            }
            Ok((lp, _)) => {
                if lp.is_finite() {
                    debug!("non-finite gradient of the log density at {:?}", z.q);
                } else {
                    debug!("log density {lp} at {:?}", z.q);
                }
                Self::reject(z);
            }
            Err(e) => {
                debug!("log density rejected {:?}: {e}", z.q);
                Self::reject(z);
            }
        }
    }

    fn reject(z: &mut PhasePoint) {
        z.potential = f64::INFINITY;
        z.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Alias of [`update_potential_gradient`](Self::update_potential_gradient)
    /// for a freshly constructed point.
    pub fn init(&self, z: &mut PhasePoint) {
        self.update_potential_gradient(z);
    }

    pub fn kinetic(&self, z: &PhasePoint) -> f64 {
        self.metric.kinetic(&z.p)
    }

    /// Total energy. NaN maps to `+∞` so it always reads as a divergence.
    pub fn energy(&self, z: &PhasePoint) -> f64 {
        let h = z.potential + self.kinetic(z);
        if h.is_nan() {
            f64::INFINITY
        } else {
            h
        }
    }

    /// `∂K/∂p = M⁻¹ p`.
    pub fn dtau_dp(&self, z: &PhasePoint) -> Vec<f64> {
        self.metric.velocity(&z.p)
    }

    pub fn sample_momentum<R: Rng + ?Sized>(&self, rng: &mut R, z: &mut PhasePoint) {
        self.metric.sample_momentum(rng, &mut z.p);
    }
}
