/// A point in phase space: position, momentum and the cached potential.
///
/// `potential` is the negative log density at `q` and `grad` its gradient,
/// both kept current by [`Hamiltonian::update_potential_gradient`] so the
/// integrator never evaluates the model twice at the same position.
///
/// [`Hamiltonian::update_potential_gradient`]: crate::Hamiltonian::update_potential_gradient
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhasePoint {
    pub q: Vec<f64>,
    pub p: Vec<f64>,
    pub potential: f64,
    pub grad: Vec<f64>,
}

impl PhasePoint {
    /// A point at `q` with zero momentum and no potential evaluated yet.
    pub fn new(q: Vec<f64>) -> Self {
        let n = q.len();
        PhasePoint {
            q,
            p: vec![0.0; n],
            potential: f64::INFINITY,
            grad: vec![0.0; n],
        }
    }

    pub fn dim(&self) -> usize {
        self.q.len()
    }

    /// Log density at `q`, i.e. the negated potential.
    pub fn log_density(&self) -> f64 {
        -self.potential
    }
}
