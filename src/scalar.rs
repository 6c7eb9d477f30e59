//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently with
//! plain `f64` and with [`Var`]. The composite operations below have generic
//! default bodies; `Var` overrides them so each one records a single node
//! with closed-form partials instead of a chain of elementary ones.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::var::{unary, Var};

/// The central trait for AD-generic numeric code.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: f64) -> Self;

    /// Extract the primal value.
    fn value(&self) -> f64;

    #[inline]
    fn square(self) -> Self {
        self * self
    }

    /// Logistic sigmoid `1 / (1 + e^-x)`, evaluated without overflow.
    fn inv_logit(self) -> Self {
        if self.value() < 0.0 {
            let e = self.exp();
            e / (Self::one() + e)
        } else {
            Self::one() / (Self::one() + (-self).exp())
        }
    }

    /// `ln(1 + e^x)`, evaluated without overflow.
    fn log1p_exp(self) -> Self {
        if self.value() > 0.0 {
            self + (-self).exp().ln_1p()
        } else {
            self.exp().ln_1p()
        }
    }

    fn sum(xs: &[Self]) -> Self {
        xs.iter().fold(Self::zero(), |acc, &x| acc + x)
    }

    /// Sum of squares.
    fn dot_self(xs: &[Self]) -> Self {
        xs.iter().fold(Self::zero(), |acc, &x| acc + x * x)
    }

    /// # Panics
    ///
    /// Panics if `a` and `b` differ in length.
    fn dot_product(a: &[Self], b: &[Self]) -> Self {
        assert_eq!(a.len(), b.len(), "dot_product operands differ in length");
        a.iter()
            .zip(b)
            .fold(Self::zero(), |acc, (&x, &y)| acc + x * y)
    }

    /// `ln Σ e^xᵢ`, shifted by the maximum. Empty input gives `-∞`.
    fn log_sum_exp(xs: &[Self]) -> Self {
        let max = xs
            .iter()
            .fold(Self::neg_infinity(), |m, &x| if x > m { x } else { m });
        if !max.is_finite() {
            return max;
        }
        let shifted = xs.iter().fold(Self::zero(), |acc, &x| acc + (x - max).exp());
        max + shifted.ln()
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }
}

fn sigmoid(x: f64) -> f64 {
    if x < 0.0 {
        let e = x.exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

impl Scalar for Var {
    #[inline]
    fn from_f(val: f64) -> Self {
        Var::constant(val)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.value
    }

    fn square(self) -> Self {
        unary(self, self.value * self.value, 2.0 * self.value)
    }

    fn inv_logit(self) -> Self {
        let s = sigmoid(self.value);
        unary(self, s, s * (1.0 - s))
    }

    fn log1p_exp(self) -> Self {
        let x = self.value;
        let value = if x > 0.0 {
            x + (-x).exp().ln_1p()
        } else {
            x.exp().ln_1p()
        };
        unary(self, value, sigmoid(x))
    }

    fn sum(xs: &[Self]) -> Self {
        xs.iter().sum()
    }

    fn dot_self(xs: &[Self]) -> Self {
        let value = xs.iter().map(|x| x.value * x.value).sum();
        let partials: Vec<f64> = xs.iter().map(|x| 2.0 * x.value).collect();
        Var::precomputed(value, xs, &partials)
    }

    fn dot_product(a: &[Self], b: &[Self]) -> Self {
        assert_eq!(a.len(), b.len(), "dot_product operands differ in length");
        let value = a.iter().zip(b).map(|(x, y)| x.value * y.value).sum();
        let operands: Vec<Var> = a.iter().chain(b).copied().collect();
        let partials: Vec<f64> = b
            .iter()
            .map(|y| y.value)
            .chain(a.iter().map(|x| x.value))
            .collect();
        Var::precomputed(value, &operands, &partials)
    }

    fn log_sum_exp(xs: &[Self]) -> Self {
        let max = xs.iter().map(|x| x.value).fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Var::precomputed(max, xs, &vec![0.0; xs.len()]);
        }
        let weights: Vec<f64> = xs.iter().map(|x| (x.value - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        let softmax: Vec<f64> = weights.iter().map(|w| w / total).collect();
        Var::precomputed(max + total.ln(), xs, &softmax)
    }
}
