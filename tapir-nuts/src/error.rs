//! Error types for the sampler.

use thiserror::Error;

/// Result type alias using the sampler's [`SamplerError`].
pub type Result<T> = std::result::Result<T, SamplerError>;

/// A configuration value outside its valid range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("adaptation target acceptance {0} must lie strictly between 0 and 1")]
    Delta(f64),

    #[error("adaptation regularization scale gamma {0} must be positive")]
    Gamma(f64),

    #[error("adaptation relaxation exponent kappa {0} must be positive")]
    Kappa(f64),

    #[error("adaptation iteration offset t0 {0} must be positive")]
    T0(f64),

    #[error("step size {0} must be positive and finite")]
    StepSize(f64),

    #[error("step size jitter {0} must lie in [0, 1]")]
    StepSizeJitter(f64),

    #[error("maximum tree depth {0} must lie in 1..=30")]
    MaxDepth(usize),

    #[error("maximum energy error {0} must be positive")]
    MaxDeltaH(f64),

    #[error("{name} window size must be positive")]
    Window { name: &'static str },

    #[error("metric must be {expected}-dimensional, got {got}")]
    MetricDimension { expected: usize, got: usize },

    #[error("inverse metric must be positive definite")]
    NotPositiveDefinite,

    #[error("unknown metric kind {0:?}, expected unit, diagonal or dense")]
    UnknownMetric(String),
}

/// Errors that stop a sampler run.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("initial point has dimension {got}, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("log density is not finite at the initial point: {reason}")]
    InitialPoint { reason: String },

    #[error("sampler has no current point; call initialize or warmup first")]
    NotInitialized,

    /// Step size heuristic left the range a proper posterior admits.
    #[error("step size search failed at {step_size:e}: {reason}")]
    StepSizeSearch { step_size: f64, reason: &'static str },

    /// The interrupt hook asked the run to stop.
    #[error("sampling interrupted at iteration {iteration}")]
    Interrupted { iteration: usize },
}
