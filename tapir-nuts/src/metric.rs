//! Euclidean metrics: the kinetic energy and momentum distribution.
//!
//! Metrics are stored by their inverse, which is the quantity the warmup
//! estimates (a posterior variance or covariance). The dense variant caches
//! the lower Cholesky factor `L` of the inverse metric, `M⁻¹ = L Lᵀ`.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::ConfigError;
use crate::math::dot;

/// Which family of metric to use and adapt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MetricKind {
    Unit,
    #[default]
    Diagonal,
    Dense,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Unit => write!(f, "unit"),
            MetricKind::Diagonal => write!(f, "diagonal"),
            MetricKind::Dense => write!(f, "dense"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" | "unit_e" => Ok(MetricKind::Unit),
            "diagonal" | "diag" | "diag_e" => Ok(MetricKind::Diagonal),
            "dense" | "dense_e" => Ok(MetricKind::Dense),
            _ => Err(ConfigError::UnknownMetric(s.to_string())),
        }
    }
}

/// A Euclidean metric over momentum space.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Unit { dim: usize },
    Diagonal { inv_metric: Vec<f64> },
    Dense { inv_metric: DMatrix<f64>, chol: DMatrix<f64> },
}

impl Metric {
    /// Identity metric of the given kind.
    pub fn identity(kind: MetricKind, dim: usize) -> Self {
        match kind {
            MetricKind::Unit => Metric::Unit { dim },
            MetricKind::Diagonal => Metric::Diagonal {
                inv_metric: vec![1.0; dim],
            },
            MetricKind::Dense => Metric::Dense {
                inv_metric: DMatrix::identity(dim, dim),
                chol: DMatrix::identity(dim, dim),
            },
        }
    }

    /// Diagonal metric from its inverse. Every entry must be positive and finite.
    pub fn diagonal(inv_metric: Vec<f64>) -> Result<Self, ConfigError> {
        if inv_metric.iter().any(|&m| !(m > 0.0 && m.is_finite())) {
            return Err(ConfigError::NotPositiveDefinite);
        }
        Ok(Metric::Diagonal { inv_metric })
    }

    /// Dense metric from its inverse, which must be square and positive definite.
    pub fn dense(inv_metric: DMatrix<f64>) -> Result<Self, ConfigError> {
        if inv_metric.nrows() != inv_metric.ncols() {
            return Err(ConfigError::MetricDimension {
                expected: inv_metric.nrows(),
                got: inv_metric.ncols(),
            });
        }
        if inv_metric.iter().any(|m| !m.is_finite()) {
            return Err(ConfigError::NotPositiveDefinite);
        }
        let chol = inv_metric
            .clone()
            .cholesky()
            .ok_or(ConfigError::NotPositiveDefinite)?
            .unpack();
        Ok(Metric::Dense { inv_metric, chol })
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Unit { .. } => MetricKind::Unit,
            Metric::Diagonal { .. } => MetricKind::Diagonal,
            Metric::Dense { .. } => MetricKind::Dense,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Metric::Unit { dim } => *dim,
            Metric::Diagonal { inv_metric } => inv_metric.len(),
            Metric::Dense { inv_metric, .. } => inv_metric.nrows(),
        }
    }

    /// `M⁻¹ p`, the velocity conjugate to `p` (often written p♯).
    pub fn velocity(&self, p: &[f64]) -> Vec<f64> {
        match self {
            Metric::Unit { .. } => p.to_vec(),
            Metric::Diagonal { inv_metric } => {
                p.iter().zip(inv_metric).map(|(pi, mi)| pi * mi).collect()
            }
            Metric::Dense { inv_metric, .. } => {
                let v = inv_metric * DVector::from_column_slice(p);
                v.as_slice().to_vec()
            }
        }
    }

    /// `½ pᵀ M⁻¹ p`.
    pub fn kinetic(&self, p: &[f64]) -> f64 {
        0.5 * dot(p, &self.velocity(p))
    }

    /// Draw `p ~ N(0, M)` into `p`.
    pub fn sample_momentum<R: Rng + ?Sized>(&self, rng: &mut R, p: &mut [f64]) {
        for pi in p.iter_mut() {
            *pi = rng.sample(StandardNormal);
        }
        match self {
            Metric::Unit { .. } => {}
            Metric::Diagonal { inv_metric } => {
                for (pi, mi) in p.iter_mut().zip(inv_metric) {
                    *pi /= mi.sqrt();
                }
            }
            Metric::Dense { chol, .. } => {
                // p = L⁻ᵀ z has covariance (L Lᵀ)⁻¹ = M
                let mut z = DVector::from_column_slice(p);
                let solved = chol.tr_solve_lower_triangular_mut(&mut z);
                debug_assert!(solved, "Cholesky factor has a zero on its diagonal");
                p.copy_from_slice(z.as_slice());
            }
        }
    }

    /// Diagonal of the inverse metric.
    pub fn inv_metric_diagonal(&self) -> Vec<f64> {
        match self {
            Metric::Unit { dim } => vec![1.0; *dim],
            Metric::Diagonal { inv_metric } => inv_metric.clone(),
            Metric::Dense { inv_metric, .. } => inv_metric.diagonal().as_slice().to_vec(),
        }
    }

    /// The inverse metric as a full matrix.
    pub fn inv_metric_matrix(&self) -> DMatrix<f64> {
        match self {
            Metric::Unit { dim } => DMatrix::identity(*dim, *dim),
            Metric::Diagonal { inv_metric } => {
                DMatrix::from_diagonal(&DVector::from_column_slice(inv_metric))
            }
            Metric::Dense { inv_metric, .. } => inv_metric.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind() {
        assert_eq!("dense".parse::<MetricKind>().unwrap(), MetricKind::Dense);
        assert_eq!("diag_e".parse::<MetricKind>().unwrap(), MetricKind::Diagonal);
        assert_eq!(" Unit ".parse::<MetricKind>().unwrap(), MetricKind::Unit);
        assert!(matches!(
            "riemann".parse::<MetricKind>(),
            Err(ConfigError::UnknownMetric(_))
        ));
        assert_eq!(MetricKind::Dense.to_string(), "dense");
    }

    #[test]
    fn rejects_bad_metrics() {
        assert_eq!(
            Metric::diagonal(vec![1.0, 0.0]),
            Err(ConfigError::NotPositiveDefinite)
        );
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert_eq!(
            Metric::dense(indefinite),
            Err(ConfigError::NotPositiveDefinite)
        );
        let rect = DMatrix::from_element(2, 3, 1.0);
        assert!(matches!(
            Metric::dense(rect),
            Err(ConfigError::MetricDimension { .. })
        ));
    }

    #[test]
    fn kinetic_energy_agrees_across_kinds() {
        let p = [0.3, -1.2];
        let diag = Metric::diagonal(vec![2.0, 0.5]).unwrap();
        let dense = Metric::dense(DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 0.5])).unwrap();
        let expected = 0.5 * (0.3 * 0.3 * 2.0 + 1.2 * 1.2 * 0.5);
        assert!((diag.kinetic(&p) - expected).abs() < 1e-14);
        assert!((dense.kinetic(&p) - expected).abs() < 1e-14);
        assert!((Metric::identity(MetricKind::Unit, 2).kinetic(&p) - 0.765).abs() < 1e-14);
    }
}
