use crate::error::ConfigError;
use crate::metric::MetricKind;
use crate::nuts::{UTurnCriterion, DEFAULT_MAX_DELTA_H, DEFAULT_MAX_DEPTH};

/// Parameters of the dual-averaging step size adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepSizeAdaptationConfig {
    /// Target mean acceptance statistic, in `(0, 1)` (default: 0.8).
    pub delta: f64,
    /// Regularization scale (default: 0.05).
    pub gamma: f64,
    /// Relaxation exponent of the averaged iterate (default: 0.75).
    pub kappa: f64,
    /// Iteration offset damping early updates (default: 10).
    pub t0: f64,
}

impl Default for StepSizeAdaptationConfig {
    fn default() -> Self {
        StepSizeAdaptationConfig {
            delta: 0.8,
            gamma: 0.05,
            kappa: 0.75,
            t0: 10.0,
        }
    }
}

impl StepSizeAdaptationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(ConfigError::Delta(self.delta));
        }
        if !(self.gamma > 0.0 && self.gamma.is_finite()) {
            return Err(ConfigError::Gamma(self.gamma));
        }
        if !(self.kappa > 0.0 && self.kappa.is_finite()) {
            return Err(ConfigError::Kappa(self.kappa));
        }
        if !(self.t0 > 0.0 && self.t0.is_finite()) {
            return Err(ConfigError::T0(self.t0));
        }
        Ok(())
    }
}

/// Warmup schedule for metric adaptation, in iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WindowConfig {
    /// Fast initial phase tuning only the step size (default: 75).
    pub init_buffer: usize,
    /// Fast final phase tuning only the step size (default: 50).
    pub term_buffer: usize,
    /// Length of the first slow window; later ones double (default: 25).
    pub base_window: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            init_buffer: 75,
            term_buffer: 50,
            base_window: 25,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_window == 0 {
            return Err(ConfigError::Window {
                name: "base_window",
            });
        }
        Ok(())
    }
}

/// Configuration of a sampler run.
///
/// ```
/// use tapir_nuts::{MetricKind, SamplerConfig};
///
/// let config = SamplerConfig::default()
///     .num_warmup(500)
///     .num_samples(2000)
///     .metric(MetricKind::Dense)
///     .target_accept(0.9);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SamplerConfig {
    /// Warmup iterations (default: 1000).
    pub num_warmup: usize,
    /// Sampling iterations after warmup (default: 1000).
    pub num_samples: usize,
    /// Adapt step size and metric during warmup (default: true).
    pub adapt: bool,
    /// Initial step size (default: 1).
    pub step_size: f64,
    /// Relative uniform jitter of the step size per transition, in `[0, 1]` (default: 0).
    pub step_size_jitter: f64,
    /// Maximum number of tree doublings per transition (default: 10).
    pub max_depth: usize,
    /// Energy error above which a leapfrog step is divergent (default: 1000).
    pub max_delta_h: f64,
    pub criterion: UTurnCriterion,
    pub metric: MetricKind,
    pub step_size_adaptation: StepSizeAdaptationConfig,
    pub windows: WindowConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            num_warmup: 1000,
            num_samples: 1000,
            adapt: true,
            step_size: 1.0,
            step_size_jitter: 0.0,
            max_depth: DEFAULT_MAX_DEPTH,
            max_delta_h: DEFAULT_MAX_DELTA_H,
            criterion: UTurnCriterion::default(),
            metric: MetricKind::default(),
            step_size_adaptation: StepSizeAdaptationConfig::default(),
            windows: WindowConfig::default(),
        }
    }
}

impl SamplerConfig {
    pub fn num_warmup(mut self, n: usize) -> Self {
        self.num_warmup = n;
        self
    }

    pub fn num_samples(mut self, n: usize) -> Self {
        self.num_samples = n;
        self
    }

    pub fn adapt(mut self, on: bool) -> Self {
        self.adapt = on;
        self
    }

    pub fn step_size(mut self, eps: f64) -> Self {
        self.step_size = eps;
        self
    }

    pub fn step_size_jitter(mut self, jitter: f64) -> Self {
        self.step_size_jitter = jitter;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_delta_h(mut self, bound: f64) -> Self {
        self.max_delta_h = bound;
        self
    }

    pub fn criterion(mut self, criterion: UTurnCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn metric(mut self, kind: MetricKind) -> Self {
        self.metric = kind;
        self
    }

    /// Shorthand for setting `step_size_adaptation.delta`.
    pub fn target_accept(mut self, delta: f64) -> Self {
        self.step_size_adaptation.delta = delta;
        self
    }

    pub fn step_size_adaptation(mut self, config: StepSizeAdaptationConfig) -> Self {
        self.step_size_adaptation = config;
        self
    }

    pub fn windows(mut self, config: WindowConfig) -> Self {
        self.windows = config;
        self
    }

    /// Check every value against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(ConfigError::StepSize(self.step_size));
        }
        if !(0.0..=1.0).contains(&self.step_size_jitter) {
            return Err(ConfigError::StepSizeJitter(self.step_size_jitter));
        }
        if !(1..=30).contains(&self.max_depth) {
            return Err(ConfigError::MaxDepth(self.max_depth));
        }
        if !(self.max_delta_h > 0.0) {
            return Err(ConfigError::MaxDeltaH(self.max_delta_h));
        }
        self.step_size_adaptation.validate()?;
        self.windows.validate()
    }
}
