use tapir::Scalar;
use thiserror::Error;

/// A position outside the support of the target density.
///
/// Returned by [`LogDensity::log_density`] when a parameter violates a
/// constraint. The sampler treats it as a divergence, never as a failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct DomainError(pub String);

impl DomainError {
    pub fn new(msg: impl Into<String>) -> Self {
        DomainError(msg.into())
    }
}

/// Trait for target densities.
///
/// The density is written once, generically over [`Scalar`]: evaluating it
/// with `f64` gives a cheap value, evaluating it with [`tapir::Var`] records
/// the graph the sampler sweeps for gradients.
pub trait LogDensity {
    /// Number of unconstrained parameters.
    fn dim(&self) -> usize;

    /// Log density at `q`, up to an additive constant.
    fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError>;

    /// Names of the parameters, one per dimension.
    fn param_names(&self) -> Vec<String> {
        (1..=self.dim()).map(|i| format!("q.{i}")).collect()
    }
}

impl<M: LogDensity> LogDensity for &M {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError> {
        (**self).log_density(q)
    }

    fn param_names(&self) -> Vec<String> {
        (**self).param_names()
    }
}

/// `(log p(q), ∇ log p(q))` in one forward and one reverse pass.
///
/// The graph is recorded in a nested region on the calling thread's tape and
/// recovered before returning, whether or not the model succeeds.
pub fn log_density_gradient<M: LogDensity + ?Sized>(
    model: &M,
    q: &[f64],
) -> Result<(f64, Vec<f64>), DomainError> {
    tapir::try_value_and_grad(|v| model.log_density(v), q)
}
