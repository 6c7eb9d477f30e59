use nalgebra::DMatrix;

use crate::diagnostics;
use crate::estimator::{WelfordCovar, WelfordVar};

/// Names of the diagnostic columns that precede the parameters in
/// [`Draw::to_flat`].
pub const DIAGNOSTIC_NAMES: [&str; 7] = [
    "lp__",
    "accept_stat__",
    "stepsize__",
    "treedepth__",
    "n_leapfrog__",
    "divergent__",
    "energy__",
];

/// One emitted transition: the position plus its diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Draw {
    /// Zero-based iteration, counting warmup.
    pub iteration: usize,
    pub warmup: bool,
    pub q: Vec<f64>,
    pub lp: f64,
    pub accept_stat: f64,
    pub step_size: f64,
    pub depth: usize,
    pub n_leapfrog: usize,
    pub divergent: bool,
    pub energy: f64,
}

impl Draw {
    /// Diagnostics in [`DIAGNOSTIC_NAMES`] order followed by the parameters.
    pub fn to_flat(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(DIAGNOSTIC_NAMES.len() + self.q.len());
        row.extend_from_slice(&[
            self.lp,
            self.accept_stat,
            self.step_size,
            self.depth as f64,
            self.n_leapfrog as f64,
            if self.divergent { 1.0 } else { 0.0 },
            self.energy,
        ]);
        row.extend_from_slice(&self.q);
        row
    }

    /// Header matching [`to_flat`](Self::to_flat).
    pub fn column_names(param_names: &[String]) -> Vec<String> {
        DIAGNOSTIC_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(param_names.iter().cloned())
            .collect()
    }
}

/// Sink for draws as the sampler produces them.
pub trait Recorder {
    fn record(&mut self, draw: &Draw);
}

impl Recorder for Vec<Draw> {
    fn record(&mut self, draw: &Draw) {
        self.push(draw.clone());
    }
}

impl<R: Recorder + ?Sized> Recorder for &mut R {
    fn record(&mut self, draw: &Draw) {
        (**self).record(draw);
    }
}

/// In-memory recorder with summaries over the sampling (non-warmup) draws.
#[derive(Debug, Clone, Default)]
pub struct Draws {
    draws: Vec<Draw>,
}

impl Recorder for Draws {
    fn record(&mut self, draw: &Draw) {
        self.draws.push(draw.clone());
    }
}

impl Draws {
    pub fn new() -> Self {
        Draws::default()
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Every draw, warmup included.
    pub fn all(&self) -> &[Draw] {
        &self.draws
    }

    pub fn warmup(&self) -> impl Iterator<Item = &Draw> {
        self.draws.iter().filter(|d| d.warmup)
    }

    pub fn sampling(&self) -> impl Iterator<Item = &Draw> {
        self.draws.iter().filter(|d| !d.warmup)
    }

    fn dim(&self) -> usize {
        self.draws.first().map_or(0, |d| d.q.len())
    }

    fn variance_estimate(&self) -> WelfordVar {
        let mut est = WelfordVar::new(self.dim());
        self.sampling().for_each(|d| est.add_sample(&d.q));
        est
    }

    pub fn mean(&self) -> Vec<f64> {
        self.variance_estimate().sample_mean().to_vec()
    }

    pub fn variance(&self) -> Vec<f64> {
        self.variance_estimate().sample_variance()
    }

    /// Sampling draws of parameter `index`.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.sampling().map(|d| d.q[index]).collect()
    }

    /// Per-parameter quantiles of the sampling draws, one row per entry of
    /// `probs`.
    pub fn quantiles(&self, probs: &[f64]) -> Vec<Vec<f64>> {
        let columns: Vec<Vec<f64>> = (0..self.dim()).map(|i| self.column(i)).collect();
        probs
            .iter()
            .map(|&p| columns.iter().map(|c| diagnostics::quantile(c, p)).collect())
            .collect()
    }

    pub fn covariance(&self) -> DMatrix<f64> {
        let mut est = WelfordCovar::new(self.dim());
        self.sampling().for_each(|d| est.add_sample(&d.q));
        est.sample_covariance()
    }

    /// Mean acceptance statistic over the sampling draws; NaN if there are none.
    pub fn mean_accept_stat(&self) -> f64 {
        let (sum, n) = self
            .sampling()
            .fold((0.0, 0usize), |(s, n), d| (s + d.accept_stat, n + 1));
        if n == 0 {
            f64::NAN
        } else {
            sum / n as f64
        }
    }

    pub fn num_divergent(&self) -> usize {
        self.sampling().filter(|d| d.divergent).count()
    }

    /// Sampling draws as rows of [`Draw::to_flat`].
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.sampling().map(Draw::to_flat).collect()
    }

    pub fn into_inner(self) -> Vec<Draw> {
        self.draws
    }
}
