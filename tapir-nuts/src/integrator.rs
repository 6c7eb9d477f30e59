use crate::hamiltonian::Hamiltonian;
use crate::model::LogDensity;
use crate::point::PhasePoint;

/// Explicit leapfrog (velocity Verlet) integrator for separable Hamiltonians.
///
/// Time reversible and volume preserving: evolving by `ε` and then by `-ε`
/// returns to the starting point up to rounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl Leapfrog {
    /// Half kick `p ← p - ε/2 ∂U/∂q` using the cached gradient.
    pub fn begin_update_p(&self, z: &mut PhasePoint, eps: f64) {
        let half = 0.5 * eps;
        let PhasePoint { p, grad, .. } = z;
        for (pi, gi) in p.iter_mut().zip(grad.iter()) {
            *pi -= half * gi;
        }
    }

    /// Drift `q ← q + ε M⁻¹ p`, then refresh the potential at the new position.
    pub fn update_q<M: LogDensity>(&self, z: &mut PhasePoint, ham: &Hamiltonian<'_, M>, eps: f64) {
        let velocity = ham.dtau_dp(z);
        for (q, v) in z.q.iter_mut().zip(velocity) {
            *q += eps * v;
        }
        ham.update_potential_gradient(z);
    }

    /// Closing half kick at the new position.
    pub fn end_update_p(&self, z: &mut PhasePoint, eps: f64) {
        self.begin_update_p(z, eps);
    }

    /// One full leapfrog step of signed size `eps`.
    pub fn evolve<M: LogDensity>(&self, z: &mut PhasePoint, ham: &Hamiltonian<'_, M>, eps: f64) {
        self.begin_update_p(z, eps);
        self.update_q(z, ham, eps);
        self.end_update_p(z, eps);
    }
}
