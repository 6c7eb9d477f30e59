//! Metric adaptation over the windowed warmup schedule.
//!
//! Positions drawn inside a slow window feed a Welford estimator. When the
//! window closes the estimate is shrunk towards `1e-3 · I`,
//!
//! ```text
//! Σ_reg = n / (n + 5) · Σ̂ + 1e-3 · 5 / (n + 5) · I
//! ```
//!
//! and becomes the new inverse metric.

use log::{info, warn};
use nalgebra::DMatrix;

use crate::config::WindowConfig;
use crate::error::ConfigError;
use crate::estimator::{WelfordCovar, WelfordVar};
use crate::metric::{Metric, MetricKind};
use crate::windowed::AdaptationWindows;

const SHRINKAGE_SAMPLES: f64 = 5.0;
const SHRINKAGE_TARGET: f64 = 1e-3;

fn shrink(n: usize) -> (f64, f64) {
    let n = n as f64;
    (
        n / (n + SHRINKAGE_SAMPLES),
        SHRINKAGE_TARGET * SHRINKAGE_SAMPLES / (n + SHRINKAGE_SAMPLES),
    )
}

fn regularized_variance(estimator: &WelfordVar) -> Vec<f64> {
    let (scale, floor) = shrink(estimator.num_samples());
    estimator
        .sample_variance()
        .into_iter()
        .map(|v| scale * v + floor)
        .collect()
}

fn regularized_covariance(estimator: &WelfordCovar) -> DMatrix<f64> {
    let dim = estimator.sample_mean().len();
    let (scale, floor) = shrink(estimator.num_samples());
    estimator.sample_covariance() * scale + DMatrix::<f64>::identity(dim, dim) * floor
}

/// Feed `q` to `add` when it falls in a slow window, then step the schedule.
fn observe(windows: &mut AdaptationWindows, q: &[f64], mut add: impl FnMut(&[f64])) -> bool {
    if windows.adaptation_window() {
        add(q);
    }
    let closed = windows.end_adaptation_window();
    if closed {
        windows.compute_next_window();
    }
    windows.increment();
    closed
}

fn keep_valid(updated: Result<Metric, ConfigError>) -> Option<Metric> {
    match updated {
        Ok(metric) => Some(metric),
        Err(e) => {
            warn!("keeping the previous metric: {e}");
            None
        }
    }
}

/// Diagonal metric adaptation.
#[derive(Debug, Clone)]
pub struct VarAdaptation {
    windows: AdaptationWindows,
    estimator: WelfordVar,
}

impl VarAdaptation {
    pub fn new(dim: usize, windows: AdaptationWindows) -> Self {
        VarAdaptation {
            windows,
            estimator: WelfordVar::new(dim),
        }
    }

    pub fn windows(&self) -> &AdaptationWindows {
        &self.windows
    }

    pub fn estimator(&self) -> &WelfordVar {
        &self.estimator
    }

    /// Record one warmup position and advance the schedule. Returns `true`
    /// when this position closed a slow window.
    pub fn observe(&mut self, q: &[f64]) -> bool {
        observe(&mut self.windows, q, |q| self.estimator.add_sample(q))
    }

    /// Regularized variance of the current window; restarts the estimator.
    pub fn take_variance(&mut self) -> Vec<f64> {
        let var = regularized_variance(&self.estimator);
        self.estimator.restart();
        var
    }

    /// Record one warmup position. Returns the regularized variance when a
    /// slow window closes.
    pub fn learn_variance(&mut self, q: &[f64]) -> Option<Vec<f64>> {
        self.observe(q).then(|| self.take_variance())
    }
}

/// Dense metric adaptation.
#[derive(Debug, Clone)]
pub struct CovarAdaptation {
    windows: AdaptationWindows,
    estimator: WelfordCovar,
}

impl CovarAdaptation {
    pub fn new(dim: usize, windows: AdaptationWindows) -> Self {
        CovarAdaptation {
            windows,
            estimator: WelfordCovar::new(dim),
        }
    }

    pub fn windows(&self) -> &AdaptationWindows {
        &self.windows
    }

    pub fn estimator(&self) -> &WelfordCovar {
        &self.estimator
    }

    /// Record one warmup position and advance the schedule. Returns `true`
    /// when this position closed a slow window.
    pub fn observe(&mut self, q: &[f64]) -> bool {
        observe(&mut self.windows, q, |q| self.estimator.add_sample(q))
    }

    /// Regularized covariance of the current window; restarts the estimator.
    pub fn take_covariance(&mut self) -> DMatrix<f64> {
        let covar = regularized_covariance(&self.estimator);
        self.estimator.restart();
        covar
    }

    /// Record one warmup position. Returns the regularized covariance when a
    /// slow window closes.
    pub fn learn_covariance(&mut self, q: &[f64]) -> Option<DMatrix<f64>> {
        self.observe(q).then(|| self.take_covariance())
    }
}

/// Metric adaptation for whichever metric kind the sampler runs.
#[derive(Debug, Clone)]
pub enum MetricAdaptation {
    /// The unit metric is never adapted; only the schedule advances.
    Unit(AdaptationWindows),
    Diagonal(VarAdaptation),
    Dense(CovarAdaptation),
}

impl MetricAdaptation {
    pub fn new(kind: MetricKind, dim: usize, num_warmup: usize, config: &WindowConfig) -> Self {
        let windows = AdaptationWindows::new(num_warmup, config);
        if windows.enabled() {
            info!(
                "metric adaptation windows (kind {kind}): {:?}",
                windows.schedule()
            );
        }
        match kind {
            MetricKind::Unit => MetricAdaptation::Unit(windows),
            MetricKind::Diagonal => MetricAdaptation::Diagonal(VarAdaptation::new(dim, windows)),
            MetricKind::Dense => MetricAdaptation::Dense(CovarAdaptation::new(dim, windows)),
        }
    }

    pub fn windows(&self) -> &AdaptationWindows {
        match self {
            MetricAdaptation::Unit(w) => w,
            MetricAdaptation::Diagonal(a) => a.windows(),
            MetricAdaptation::Dense(a) => a.windows(),
        }
    }

    /// Record one warmup position. Returns `true` when a slow window closed
    /// and a new metric is due.
    pub fn observe(&mut self, q: &[f64]) -> bool {
        match self {
            MetricAdaptation::Unit(w) => {
                w.increment();
                false
            }
            MetricAdaptation::Diagonal(a) => a.observe(q),
            MetricAdaptation::Dense(a) => a.observe(q),
        }
    }

    /// Metric estimated from this chain's window, or `None` for the unit
    /// metric or an estimate that is not positive definite.
    pub fn window_metric(&mut self) -> Option<Metric> {
        match self {
            MetricAdaptation::Unit(_) => None,
            MetricAdaptation::Diagonal(a) => keep_valid(Metric::diagonal(a.take_variance())),
            MetricAdaptation::Dense(a) => keep_valid(Metric::dense(a.take_covariance())),
        }
    }

    /// Record one warmup position; returns a new metric at window ends.
    pub fn learn(&mut self, q: &[f64]) -> Option<Metric> {
        if self.observe(q) {
            self.window_metric()
        } else {
            None
        }
    }

    /// Metric estimated from the windows of several chains at once.
    ///
    /// The chains' estimators are merged and regularized with the pooled
    /// sample count, then every estimator is restarted for the next window.
    pub fn pooled_metric<'a, P>(parts: P) -> Option<Metric>
    where
        P: IntoIterator<Item = &'a mut MetricAdaptation>,
    {
        let mut var: Option<WelfordVar> = None;
        let mut covar: Option<WelfordCovar> = None;
        for part in parts {
            match part {
                MetricAdaptation::Unit(_) => {}
                MetricAdaptation::Diagonal(a) => {
                    match var.as_mut() {
                        Some(pooled) => pooled.combine(&a.estimator),
                        None => var = Some(a.estimator.clone()),
                    }
                    a.estimator.restart();
                }
                MetricAdaptation::Dense(a) => {
                    match covar.as_mut() {
                        Some(pooled) => pooled.combine(&a.estimator),
                        None => covar = Some(a.estimator.clone()),
                    }
                    a.estimator.restart();
                }
            }
        }
        match (var, covar) {
            (Some(est), _) => keep_valid(Metric::diagonal(regularized_variance(&est))),
            (None, Some(est)) => keep_valid(Metric::dense(regularized_covariance(&est))),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_is_shrunk_at_window_end() {
        let config = WindowConfig {
            init_buffer: 2,
            term_buffer: 2,
            base_window: 4,
        };
        let windows = AdaptationWindows::new(20, &config);
        let mut adapt = VarAdaptation::new(1, windows);
        let draws = [9.0, 9.0, 1.0, 2.0, 3.0, 4.0];
        let mut updates = Vec::new();
        for (i, &x) in draws.iter().enumerate() {
            if let Some(var) = adapt.learn_variance(&[x]) {
                updates.push((i, var));
            }
        }
        // the first window covers iterations 2..6
        assert_eq!(updates.len(), 1);
        let (at, var) = &updates[0];
        assert_eq!(*at, 5);
        let sample_var = 5.0 / 3.0;
        let expected = 4.0 / 9.0 * sample_var + 1e-3 * 5.0 / 9.0;
        assert!((var[0] - expected).abs() < 1e-14);
        assert_eq!(adapt.estimator().num_samples(), 0);
    }

    #[test]
    fn pooled_variance_merges_every_chain() {
        let config = WindowConfig {
            init_buffer: 2,
            term_buffer: 2,
            base_window: 4,
        };
        let mut a = MetricAdaptation::new(MetricKind::Diagonal, 1, 20, &config);
        let mut b = a.clone();
        let xs = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [9.0, 9.0, 5.0, 6.0, 7.0, 8.0];
        for (i, (&x, &y)) in xs.iter().zip(&ys).enumerate() {
            assert_eq!(a.observe(&[x]), i == 5);
            assert_eq!(b.observe(&[y]), i == 5);
        }
        let metric = MetricAdaptation::pooled_metric([&mut a, &mut b]).unwrap();
        // the windows hold 1..=8 between them, whose sample variance is 6
        let expected = 8.0 / 13.0 * 6.0 + 1e-3 * 5.0 / 13.0;
        assert!((metric.inv_metric_diagonal()[0] - expected).abs() < 1e-14);
        for part in [&a, &b] {
            match part {
                MetricAdaptation::Diagonal(v) => assert_eq!(v.estimator().num_samples(), 0),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn pooling_unit_metrics_gives_nothing() {
        let mut parts = vec![
            MetricAdaptation::new(MetricKind::Unit, 2, 100, &WindowConfig::default());
            3
        ];
        assert!(MetricAdaptation::pooled_metric(parts.iter_mut()).is_none());
    }

    #[test]
    fn unit_metric_is_never_updated() {
        let mut adapt = MetricAdaptation::new(MetricKind::Unit, 2, 200, &WindowConfig::default());
        for _ in 0..200 {
            assert!(adapt.learn(&[0.0, 1.0]).is_none());
        }
        assert_eq!(adapt.windows().counter(), 200);
    }

    #[test]
    fn dense_updates_follow_the_schedule() {
        let mut adapt = MetricAdaptation::new(MetricKind::Dense, 2, 1000, &WindowConfig::default());
        let mut ends = Vec::new();
        for i in 0..1000 {
            let t = i as f64;
            if let Some(metric) = adapt.learn(&[t.sin(), t.cos()]) {
                assert_eq!(metric.kind(), MetricKind::Dense);
                ends.push(i);
            }
        }
        assert_eq!(ends, vec![99, 149, 249, 449, 949]);
    }
}
