//! Online mean and (co)variance estimators.
//!
//! Both use Welford's update and merge with Chan's parallel formula, so
//! estimates gathered on separate chains can be pooled at window boundaries.

use nalgebra::{DMatrix, DVector};

/// Running mean and per-coordinate variance.
#[derive(Debug, Clone, PartialEq)]
pub struct WelfordVar {
    num_samples: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl WelfordVar {
    pub fn new(dim: usize) -> Self {
        WelfordVar {
            num_samples: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn restart(&mut self) {
        self.num_samples = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|m| *m = 0.0);
    }

    pub fn add_sample(&mut self, q: &[f64]) {
        self.num_samples += 1;
        let n = self.num_samples as f64;
        for ((mean, m2), &x) in self.mean.iter_mut().zip(&mut self.m2).zip(q) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn sample_mean(&self) -> &[f64] {
        &self.mean
    }

    /// Unbiased variance; zero with fewer than two samples.
    pub fn sample_variance(&self) -> Vec<f64> {
        if self.num_samples < 2 {
            return vec![0.0; self.mean.len()];
        }
        let denom = (self.num_samples - 1) as f64;
        self.m2.iter().map(|m| m / denom).collect()
    }

    /// Fold the samples summarized by `other` into `self`.
    pub fn combine(&mut self, other: &WelfordVar) {
        if other.num_samples == 0 {
            return;
        }
        let (na, nb) = (self.num_samples as f64, other.num_samples as f64);
        let n = na + nb;
        for i in 0..self.mean.len() {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * nb / n;
            self.m2[i] += other.m2[i] + delta * delta * na * nb / n;
        }
        self.num_samples += other.num_samples;
    }
}

/// Running mean and full covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct WelfordCovar {
    num_samples: usize,
    mean: DVector<f64>,
    m2: DMatrix<f64>,
}

impl WelfordCovar {
    pub fn new(dim: usize) -> Self {
        WelfordCovar {
            num_samples: 0,
            mean: DVector::zeros(dim),
            m2: DMatrix::zeros(dim, dim),
        }
    }

    pub fn restart(&mut self) {
        self.num_samples = 0;
        self.mean.fill(0.0);
        self.m2.fill(0.0);
    }

    pub fn add_sample(&mut self, q: &[f64]) {
        self.num_samples += 1;
        let x = DVector::from_column_slice(q);
        let delta = &x - &self.mean;
        self.mean += &delta / self.num_samples as f64;
        let delta_after = &x - &self.mean;
        self.m2 += &delta * delta_after.transpose();
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn sample_mean(&self) -> &[f64] {
        self.mean.as_slice()
    }

    /// Unbiased covariance; zero with fewer than two samples.
    pub fn sample_covariance(&self) -> DMatrix<f64> {
        if self.num_samples < 2 {
            return DMatrix::zeros(self.mean.len(), self.mean.len());
        }
        &self.m2 / (self.num_samples - 1) as f64
    }

    pub fn combine(&mut self, other: &WelfordCovar) {
        if other.num_samples == 0 {
            return;
        }
        let (na, nb) = (self.num_samples as f64, other.num_samples as f64);
        let n = na + nb;
        let delta = &other.mean - &self.mean;
        self.mean += &delta * (nb / n);
        self.m2 += &other.m2 + &delta * delta.transpose() * (na * nb / n);
        self.num_samples += other.num_samples;
    }
}
