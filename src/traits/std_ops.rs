use std::iter::Sum;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::var::{binary, unary, with_constant, Var};

// ──────────────────────────────────────────────
//  Var operators
// ──────────────────────────────────────────────

impl Add for Var {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        binary(self, rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl Sub for Var {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        binary(self, rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl Mul for Var {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        binary(self, rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl Div for Var {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        let value = self.value * inv;
        binary(self, rhs, value, inv, -value * inv)
    }
}

impl Neg for Var {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        unary(self, -self.value, -1.0)
    }
}

impl Rem for Var {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let value = self.value % rhs.value;
        binary(self, rhs, value, 1.0, -(self.value / rhs.value).trunc())
    }
}

impl AddAssign for Var {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Var {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Var {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Var {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for Var {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// ──────────────────────────────────────────────
//  Mixed ops: Var with f64
// ──────────────────────────────────────────────

impl Add<f64> for Var {
    type Output = Var;
    #[inline]
    fn add(self, rhs: f64) -> Var {
        with_constant(self, rhs, self.value + rhs, 1.0)
    }
}

impl Add<Var> for f64 {
    type Output = Var;
    #[inline]
    fn add(self, rhs: Var) -> Var {
        with_constant(rhs, self, self + rhs.value, 1.0)
    }
}

impl Sub<f64> for Var {
    type Output = Var;
    #[inline]
    fn sub(self, rhs: f64) -> Var {
        with_constant(self, rhs, self.value - rhs, 1.0)
    }
}

impl Sub<Var> for f64 {
    type Output = Var;
    #[inline]
    fn sub(self, rhs: Var) -> Var {
        with_constant(rhs, self, self - rhs.value, -1.0)
    }
}

impl Mul<f64> for Var {
    type Output = Var;
    #[inline]
    fn mul(self, rhs: f64) -> Var {
        with_constant(self, rhs, self.value * rhs, rhs)
    }
}

impl Mul<Var> for f64 {
    type Output = Var;
    #[inline]
    fn mul(self, rhs: Var) -> Var {
        with_constant(rhs, self, self * rhs.value, self)
    }
}

impl Div<f64> for Var {
    type Output = Var;
    #[inline]
    fn div(self, rhs: f64) -> Var {
        let inv = 1.0 / rhs;
        with_constant(self, rhs, self.value * inv, inv)
    }
}

impl Div<Var> for f64 {
    type Output = Var;
    #[inline]
    fn div(self, rhs: Var) -> Var {
        let inv = 1.0 / rhs.value;
        let value = self * inv;
        with_constant(rhs, self, value, -value * inv)
    }
}

impl Rem<f64> for Var {
    type Output = Var;
    #[inline]
    fn rem(self, rhs: f64) -> Var {
        with_constant(self, rhs, self.value % rhs, 1.0)
    }
}

impl Rem<Var> for f64 {
    type Output = Var;
    #[inline]
    fn rem(self, rhs: Var) -> Var {
        with_constant(rhs, self, self % rhs.value, -(self / rhs.value).trunc())
    }
}

impl AddAssign<f64> for Var {
    #[inline]
    fn add_assign(&mut self, rhs: f64) {
        *self = *self + rhs;
    }
}

impl SubAssign<f64> for Var {
    #[inline]
    fn sub_assign(&mut self, rhs: f64) {
        *self = *self - rhs;
    }
}

impl MulAssign<f64> for Var {
    #[inline]
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl DivAssign<f64> for Var {
    #[inline]
    fn div_assign(&mut self, rhs: f64) {
        *self = *self / rhs;
    }
}

// Summing through a single n-ary node keeps long reductions to one tape entry.
impl Sum for Var {
    fn sum<I: Iterator<Item = Var>>(iter: I) -> Var {
        let terms: Vec<Var> = iter.collect();
        Var::precomputed(
            terms.iter().map(|v| v.value).sum(),
            &terms,
            &vec![1.0; terms.len()],
        )
    }
}

impl<'a> Sum<&'a Var> for Var {
    fn sum<I: Iterator<Item = &'a Var>>(iter: I) -> Var {
        iter.copied().sum()
    }
}

impl PartialEq for Var {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Var {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl PartialEq<f64> for Var {
    #[inline]
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl PartialOrd<f64> for Var {
    #[inline]
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}
