//! The adaptive NUTS driver: warmup, sampling and per-transition output.

use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::adaptation::MetricAdaptation;
use crate::config::SamplerConfig;
use crate::draws::{Draw, Recorder};
use crate::error::{ConfigError, Result, SamplerError};
use crate::hamiltonian::Hamiltonian;
use crate::interrupt::{Interrupt, NoInterrupt};
use crate::metric::Metric;
use crate::model::{log_density_gradient, LogDensity};
use crate::nuts::{Nuts, Termination, Transition};
use crate::point::PhasePoint;
use crate::stepsize::StepSizeAdaptation;

/// Largest step size the initial search accepts before calling the
/// posterior improper.
const MAX_STEP_SIZE: f64 = 1e7;

/// Random stream for chain `chain` of a run seeded with `seed`.
///
/// Chains share the seed and are separated by `2^128`-step jumps, so their
/// streams never overlap.
pub fn chain_rng(seed: u64, chain: u64) -> Xoshiro256PlusPlus {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    for _ in 0..chain {
        rng.jump();
    }
    rng
}

/// What a finished run leaves behind besides its draws.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Step size used for sampling.
    pub step_size: f64,
    /// Metric used for sampling.
    pub metric: Metric,
    pub warmup_divergences: usize,
    pub divergences: usize,
    /// Mean acceptance statistic over the sampling iterations.
    pub mean_accept_stat: f64,
}

/// Adaptive NUTS sampler for one chain.
///
/// ```
/// use tapir::Scalar;
/// use tapir_nuts::{DomainError, Draws, LogDensity, Sampler, SamplerConfig};
///
/// struct Normal;
///
/// impl LogDensity for Normal {
///     fn dim(&self) -> usize {
///         1
///     }
///
///     fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError> {
///         Ok(-q[0] * q[0] * T::from_f(0.5))
///     }
/// }
///
/// let config = SamplerConfig::default().num_warmup(200).num_samples(200);
/// let mut sampler = Sampler::new(&Normal, config, 42).unwrap();
/// let mut draws = Draws::new();
/// let summary = sampler.run(&[0.5], &mut draws).unwrap();
/// assert_eq!(draws.sampling().count(), 200);
/// assert!(summary.step_size > 0.0);
/// ```
pub struct Sampler<'m, M, I = NoInterrupt> {
    config: SamplerConfig,
    hamiltonian: Hamiltonian<'m, M>,
    nuts: Nuts,
    rng: Xoshiro256PlusPlus,
    interrupt: I,
    nom_step_size: f64,
    step_adaptation: StepSizeAdaptation,
    metric_adaptation: MetricAdaptation,
    point: Option<PhasePoint>,
    iteration: usize,
    warmup_divergences: usize,
    divergences: usize,
    num_sampled: usize,
    accept_stat_sum: f64,
}

impl<'m, M: LogDensity> Sampler<'m, M> {
    /// Sampler for a single chain. Fails fast on an invalid configuration.
    pub fn new(model: &'m M, config: SamplerConfig, seed: u64) -> Result<Self> {
        Self::for_chain(model, config, seed, 0)
    }

    /// Sampler for chain `chain` of a multi-chain run seeded with `seed`.
    pub fn for_chain(model: &'m M, config: SamplerConfig, seed: u64, chain: u64) -> Result<Self> {
        config.validate()?;
        let dim = model.dim();
        let metric = Metric::identity(config.metric, dim);
        let mut step_adaptation = StepSizeAdaptation::new(config.step_size_adaptation);
        step_adaptation.restart_at(config.step_size);
        let metric_adaptation =
            MetricAdaptation::new(config.metric, dim, config.num_warmup, &config.windows);
        Ok(Sampler {
            hamiltonian: Hamiltonian::new(model, metric),
            nuts: Nuts::new(config.max_depth, config.max_delta_h, config.criterion),
            rng: chain_rng(seed, chain),
            interrupt: NoInterrupt,
            nom_step_size: config.step_size,
            step_adaptation,
            metric_adaptation,
            point: None,
            iteration: 0,
            warmup_divergences: 0,
            divergences: 0,
            num_sampled: 0,
            accept_stat_sum: 0.0,
            config,
        })
    }
}

impl<'m, M: LogDensity, I: Interrupt> Sampler<'m, M, I> {
    /// Replace the interrupt hook.
    pub fn with_interrupt<J: Interrupt>(self, interrupt: J) -> Sampler<'m, M, J> {
        Sampler {
            config: self.config,
            hamiltonian: self.hamiltonian,
            nuts: self.nuts,
            rng: self.rng,
            interrupt,
            nom_step_size: self.nom_step_size,
            step_adaptation: self.step_adaptation,
            metric_adaptation: self.metric_adaptation,
            point: self.point,
            iteration: self.iteration,
            warmup_divergences: self.warmup_divergences,
            divergences: self.divergences,
            num_sampled: self.num_sampled,
            accept_stat_sum: self.accept_stat_sum,
        }
    }

    /// Start from a given metric instead of the identity.
    pub fn with_metric(mut self, metric: Metric) -> Result<Self> {
        let expected = self.hamiltonian.model().dim();
        if metric.dim() != expected {
            return Err(ConfigError::MetricDimension {
                expected,
                got: metric.dim(),
            }
            .into());
        }
        self.hamiltonian.set_metric(metric);
        Ok(self)
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn metric(&self) -> &Metric {
        self.hamiltonian.metric()
    }

    /// Nominal step size, before jitter.
    pub fn step_size(&self) -> f64 {
        self.nom_step_size
    }

    pub fn set_step_size(&mut self, step_size: f64) -> Result<()> {
        if !(step_size > 0.0 && step_size.is_finite()) {
            return Err(ConfigError::StepSize(step_size).into());
        }
        self.nom_step_size = step_size;
        Ok(())
    }

    pub fn metric_adaptation(&self) -> &MetricAdaptation {
        &self.metric_adaptation
    }

    pub fn metric_adaptation_mut(&mut self) -> &mut MetricAdaptation {
        &mut self.metric_adaptation
    }

    /// Current point of the chain.
    pub fn point(&self) -> Option<&PhasePoint> {
        self.point.as_ref()
    }

    /// Set the chain's position. The log density and its gradient must be
    /// finite there.
    pub fn initialize(&mut self, q0: &[f64]) -> Result<()> {
        let expected = self.hamiltonian.model().dim();
        if q0.len() != expected {
            return Err(SamplerError::DimensionMismatch {
                expected,
                got: q0.len(),
            });
        }
        let (lp, grad) = log_density_gradient(self.hamiltonian.model(), q0).map_err(|e| {
            SamplerError::InitialPoint {
                reason: e.to_string(),
            }
        })?;
        if !lp.is_finite() {
            return Err(SamplerError::InitialPoint {
                reason: format!("log density is {lp}"),
            });
        }
        if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
            return Err(SamplerError::InitialPoint {
                reason: format!("gradient entry {i} is {}", grad[i]),
            });
        }
        let mut z = PhasePoint::new(q0.to_vec());
        z.potential = -lp;
        z.grad = grad.into_iter().map(|g| -g).collect();
        self.point = Some(z);
        Ok(())
    }

    /// Rescale the nominal step size until one leapfrog step from the
    /// current point crosses an acceptance probability of 0.8.
    pub fn init_stepsize(&mut self) -> Result<()> {
        let start = self.point.clone().ok_or(SamplerError::NotInitialized)?;
        if self.nom_step_size == 0.0
            || self.nom_step_size > MAX_STEP_SIZE
            || self.nom_step_size.is_nan()
        {
            return Ok(());
        }
        let threshold = 0.8_f64.ln();

        let delta_h = self.probe_step(&start);
        let direction = if delta_h > threshold { 1 } else { -1 };

        loop {
            let delta_h = self.probe_step(&start);
            if direction == 1 && !(delta_h > threshold) {
                break;
            }
            if direction == -1 && !(delta_h < threshold) {
                break;
            }
            self.nom_step_size = if direction == 1 {
                2.0 * self.nom_step_size
            } else {
                0.5 * self.nom_step_size
            };

            if self.nom_step_size > MAX_STEP_SIZE {
                warn!("step size search exceeded {MAX_STEP_SIZE:e}");
                return Err(SamplerError::StepSizeSearch {
                    step_size: self.nom_step_size,
                    reason: "posterior is improper",
                });
            }
            if self.nom_step_size == 0.0 {
                warn!("step size search underflowed to zero");
                return Err(SamplerError::StepSizeSearch {
                    step_size: self.nom_step_size,
                    reason: "no acceptably small step size; the posterior may not be continuous",
                });
            }
        }
        Ok(())
    }

    /// `H0 - H` after one leapfrog step with fresh momentum.
    fn probe_step(&mut self, start: &PhasePoint) -> f64 {
        let mut z = start.clone();
        self.hamiltonian.sample_momentum(&mut self.rng, &mut z);
        let h0 = self.hamiltonian.energy(&z);
        self.nuts
            .integrator()
            .evolve(&mut z, &self.hamiltonian, self.nom_step_size);
        h0 - self.hamiltonian.energy(&z)
    }

    fn jittered_step_size(&mut self) -> f64 {
        let jitter = self.config.step_size_jitter;
        if jitter > 0.0 {
            let u: f64 = self.rng.gen();
            self.nom_step_size * (1.0 + jitter * (2.0 * u - 1.0))
        } else {
            self.nom_step_size
        }
    }

    fn transition(&mut self) -> Result<Transition> {
        let current = self.point.take().ok_or(SamplerError::NotInitialized)?;
        let step_size = self.jittered_step_size();
        let t = self.nuts.transition(
            &self.hamiltonian,
            &current,
            step_size,
            &mut self.rng,
            &self.interrupt,
        );
        if t.termination == Termination::Interrupted {
            self.point = Some(current);
            return Err(SamplerError::Interrupted {
                iteration: self.iteration,
            });
        }
        self.point = Some(t.point.clone());
        Ok(t)
    }

    fn emit<R: Recorder + ?Sized>(&mut self, t: &Transition, warmup: bool, recorder: &mut R) {
        let draw = Draw {
            iteration: self.iteration,
            warmup,
            q: t.point.q.clone(),
            lp: t.point.log_density(),
            accept_stat: t.accept_stat,
            step_size: t.step_size,
            depth: t.depth,
            n_leapfrog: t.n_leapfrog,
            divergent: t.divergent,
            energy: t.energy,
        };
        recorder.record(&draw);
        self.iteration += 1;
    }

    /// Initialize at `q0` and run the warmup iterations, adapting the step
    /// size and metric when adaptation is on.
    pub fn warmup<R: Recorder + ?Sized>(&mut self, q0: &[f64], recorder: &mut R) -> Result<()> {
        self.start_warmup(q0)?;
        while self.warmup_until_window(recorder)? {
            if let Some(metric) = self.metric_adaptation.window_metric() {
                self.update_metric(metric)?;
            }
        }
        self.finish_warmup();
        Ok(())
    }

    /// Initialize at `q0` and search for a first step size.
    ///
    /// Together with [`warmup_until_window`](Self::warmup_until_window),
    /// [`update_metric`](Self::update_metric) and
    /// [`finish_warmup`](Self::finish_warmup) this lets a caller drive
    /// warmup one adaptation window at a time, e.g. to pool metric
    /// estimates across chains.
    pub fn start_warmup(&mut self, q0: &[f64]) -> Result<()> {
        self.initialize(q0)?;
        if self.config.adapt {
            self.init_stepsize()?;
            self.step_adaptation.restart_at(self.nom_step_size);
        }
        Ok(())
    }

    /// Run warmup transitions until a metric adaptation window closes or
    /// warmup is over. Returns `true` in the first case; the estimator then
    /// holds the window's draws and a new metric is due.
    pub fn warmup_until_window<R: Recorder + ?Sized>(&mut self, recorder: &mut R) -> Result<bool> {
        while self.iteration < self.config.num_warmup {
            let t = self.transition()?;
            if t.divergent {
                self.warmup_divergences += 1;
            }
            let mut closed = false;
            if self.config.adapt {
                self.nom_step_size = self.step_adaptation.learn_stepsize(t.accept_stat);
                closed = self.metric_adaptation.observe(&t.point.q);
            }
            self.emit(&t, true, recorder);
            if closed {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Switch to `metric` and restart step size adaptation from a fresh
    /// initial step size.
    pub fn update_metric(&mut self, metric: Metric) -> Result<()> {
        let expected = self.hamiltonian.model().dim();
        if metric.dim() != expected {
            return Err(ConfigError::MetricDimension {
                expected,
                got: metric.dim(),
            }
            .into());
        }
        self.hamiltonian.set_metric(metric);
        self.init_stepsize()?;
        self.step_adaptation.restart_at(self.nom_step_size);
        info!(
            "iteration {}: updated {} metric, step size restarts at {:e}",
            self.iteration,
            self.hamiltonian.metric().kind(),
            self.nom_step_size
        );
        Ok(())
    }

    /// Fix the step size at the dual-averaging estimate.
    pub fn finish_warmup(&mut self) {
        if self.config.adapt && self.config.num_warmup > 0 {
            self.nom_step_size = self.step_adaptation.complete_adaptation();
            info!("adapted step size {:e}", self.nom_step_size);
        }
    }

    /// Run the sampling iterations from the current point.
    pub fn sample<R: Recorder + ?Sized>(&mut self, recorder: &mut R) -> Result<()> {
        for _ in 0..self.config.num_samples {
            let t = self.transition()?;
            if t.divergent {
                self.divergences += 1;
            }
            self.num_sampled += 1;
            self.accept_stat_sum += t.accept_stat;
            self.emit(&t, false, recorder);
        }
        if self.divergences > 0 {
            warn!(
                "{} of {} sampling transitions diverged",
                self.divergences, self.num_sampled
            );
        }
        Ok(())
    }

    /// Warmup from `q0`, then sampling.
    pub fn run<R: Recorder + ?Sized>(&mut self, q0: &[f64], recorder: &mut R) -> Result<RunSummary> {
        self.warmup(q0, recorder)?;
        self.sample(recorder)?;
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        let n = self.num_sampled;
        RunSummary {
            step_size: self.nom_step_size,
            metric: self.hamiltonian.metric().clone(),
            warmup_divergences: self.warmup_divergences,
            divergences: self.divergences,
            mean_accept_stat: if n > 0 {
                self.accept_stat_sum / n as f64
            } else {
                f64::NAN
            },
        }
    }
}
