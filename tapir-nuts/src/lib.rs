//! Hamiltonian Monte Carlo with the No-U-Turn sampler.
//!
//! Gradients come from [`tapir`]'s reverse-mode tape: a target written once
//! as [`LogDensity::log_density`] over any [`tapir::Scalar`] is evaluated
//! with [`tapir::Var`] inside a nested region at every leapfrog step.
//! [`Sampler`] runs warmup (dual-averaging step size and windowed
//! metric adaptation) followed by sampling, emitting one [`Draw`] per
//! transition to a [`Recorder`].

pub mod adaptation;
#[cfg(feature = "parallel")]
pub mod chains;
pub mod config;
pub mod diagnostics;
pub mod draws;
pub mod error;
pub mod estimator;
pub mod hamiltonian;
pub mod integrator;
pub mod interrupt;
pub mod math;
pub mod metric;
pub mod model;
pub mod nuts;
pub mod point;
pub mod sampler;
pub mod stepsize;
pub mod windowed;

pub use adaptation::{CovarAdaptation, MetricAdaptation, VarAdaptation};
#[cfg(feature = "parallel")]
pub use chains::{effective_sample_size, run_chains, run_chains_pooled, split_rhat, ChainOutput};
pub use config::{SamplerConfig, StepSizeAdaptationConfig, WindowConfig};
pub use draws::{Draw, Draws, Recorder, DIAGNOSTIC_NAMES};
pub use error::{ConfigError, Result, SamplerError};
pub use estimator::{WelfordCovar, WelfordVar};
pub use hamiltonian::Hamiltonian;
pub use integrator::Leapfrog;
pub use interrupt::{Interrupt, NoInterrupt};
pub use metric::{Metric, MetricKind};
pub use model::{log_density_gradient, DomainError, LogDensity};
pub use nuts::{Nuts, Termination, Transition, UTurnCriterion};
pub use point::PhasePoint;
pub use sampler::{chain_rng, RunSummary, Sampler};
pub use stepsize::StepSizeAdaptation;
pub use windowed::AdaptationWindows;
