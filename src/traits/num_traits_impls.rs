use std::f64::consts;
use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::var::{binary, unary, Var};

impl Zero for Var {
    #[inline]
    fn zero() -> Self {
        Var::constant(0.0)
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl One for Var {
    #[inline]
    fn one() -> Self {
        Var::constant(1.0)
    }
}

impl Num for Var {
    type FromStrRadixErr = <f64 as Num>::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        <f64 as Num>::from_str_radix(str, radix).map(Var::constant)
    }
}

impl FromPrimitive for Var {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        Some(Var::constant(n as f64))
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        Some(Var::constant(n as f64))
    }
    #[inline]
    fn from_f32(n: f32) -> Option<Self> {
        Some(Var::constant(<f64 as From<f32>>::from(n)))
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        Some(Var::constant(n))
    }
}

impl ToPrimitive for Var {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }
    #[inline]
    fn to_f32(&self) -> Option<f32> {
        self.value.to_f32()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        Some(self.value)
    }
}

impl NumCast for Var {
    #[inline]
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Var::constant)
    }
}

impl Signed for Var {
    #[inline]
    fn abs(&self) -> Self {
        NumFloat::abs(*self)
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.value > other.value {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        Var::constant(self.value.signum())
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.value.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.value.is_sign_negative()
    }
}

#[rustfmt::skip]
impl FloatConst for Var {
    fn E() -> Self { Var::constant(consts::E) }
    fn FRAC_1_PI() -> Self { Var::constant(consts::FRAC_1_PI) }
    fn FRAC_1_SQRT_2() -> Self { Var::constant(consts::FRAC_1_SQRT_2) }
    fn FRAC_2_PI() -> Self { Var::constant(consts::FRAC_2_PI) }
    fn FRAC_2_SQRT_PI() -> Self { Var::constant(consts::FRAC_2_SQRT_PI) }
    fn FRAC_PI_2() -> Self { Var::constant(consts::FRAC_PI_2) }
    fn FRAC_PI_3() -> Self { Var::constant(consts::FRAC_PI_3) }
    fn FRAC_PI_4() -> Self { Var::constant(consts::FRAC_PI_4) }
    fn FRAC_PI_6() -> Self { Var::constant(consts::FRAC_PI_6) }
    fn FRAC_PI_8() -> Self { Var::constant(consts::FRAC_PI_8) }
    fn LN_10() -> Self { Var::constant(consts::LN_10) }
    fn LN_2() -> Self { Var::constant(consts::LN_2) }
    fn LOG10_E() -> Self { Var::constant(consts::LOG10_E) }
    fn LOG2_E() -> Self { Var::constant(consts::LOG2_E) }
    fn PI() -> Self { Var::constant(consts::PI) }
    fn SQRT_2() -> Self { Var::constant(consts::SQRT_2) }
    fn TAU() -> Self { Var::constant(consts::TAU) }
    fn LOG10_2() -> Self { Var::constant(consts::LOG10_2) }
    fn LOG2_10() -> Self { Var::constant(consts::LOG2_10) }
}

#[rustfmt::skip]
impl NumFloat for Var {
    fn nan() -> Self { Var::constant(f64::NAN) }
    fn infinity() -> Self { Var::constant(f64::INFINITY) }
    fn neg_infinity() -> Self { Var::constant(f64::NEG_INFINITY) }
    fn neg_zero() -> Self { Var::constant(-0.0) }

    fn min_value() -> Self { Var::constant(f64::MIN) }
    fn min_positive_value() -> Self { Var::constant(f64::MIN_POSITIVE) }
    fn max_value() -> Self { Var::constant(f64::MAX) }
    fn epsilon() -> Self { Var::constant(f64::EPSILON) }

    fn is_nan(self) -> bool { self.value.is_nan() }
    fn is_infinite(self) -> bool { self.value.is_infinite() }
    fn is_finite(self) -> bool { self.value.is_finite() }
    fn is_normal(self) -> bool { self.value.is_normal() }
    fn is_sign_positive(self) -> bool { self.value.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.value.is_sign_negative() }
    fn classify(self) -> FpCategory { self.value.classify() }

    // Piecewise constant: zero derivative almost everywhere.
    fn floor(self) -> Self { Var::constant(self.value.floor()) }
    fn ceil(self) -> Self { Var::constant(self.value.ceil()) }
    fn round(self) -> Self { Var::constant(self.value.round()) }
    fn trunc(self) -> Self { Var::constant(self.value.trunc()) }
    fn fract(self) -> Self {
        unary(self, self.value.fract(), 1.0)
    }
    fn abs(self) -> Self {
        unary(self, self.value.abs(), self.value.signum())
    }
    fn signum(self) -> Self {
        Var::constant(self.value.signum())
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        Var::precomputed(
            self.value.mul_add(a.value, b.value),
            &[self, a, b],
            &[a.value, self.value, 1.0],
        )
    }

    fn recip(self) -> Self {
        let inv = 1.0 / self.value;
        unary(self, inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let value = self.value.powi(n);
        let deriv = if n == 0 {
            0.0
        } else {
            <f64 as From<i32>>::from(n) * self.value.powi(n - 1)
        };
        unary(self, value, deriv)
    }

    fn powf(self, n: Self) -> Self {
        let value = self.value.powf(n.value);
        let dx = if n.value == 0.0 { 0.0 } else { n.value * self.value.powf(n.value - 1.0) };
        // x^y is flat in y at x = 0 for y > 0
        let dy = if self.value == 0.0 { 0.0 } else { value * self.value.ln() };
        binary(self, n, value, dx, dy)
    }

    fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        unary(self, s, 0.5 / s)
    }

    fn cbrt(self) -> Self {
        let c = self.value.cbrt();
        unary(self, c, 1.0 / (3.0 * c * c))
    }

    fn exp(self) -> Self {
        let e = self.value.exp();
        unary(self, e, e)
    }

    fn exp2(self) -> Self {
        let e = self.value.exp2();
        unary(self, e, e * consts::LN_2)
    }

    fn exp_m1(self) -> Self {
        unary(self, self.value.exp_m1(), self.value.exp())
    }

    fn ln(self) -> Self {
        unary(self, self.value.ln(), 1.0 / self.value)
    }

    fn log2(self) -> Self {
        unary(self, self.value.log2(), 1.0 / (self.value * consts::LN_2))
    }

    fn log10(self) -> Self {
        unary(self, self.value.log10(), 1.0 / (self.value * consts::LN_10))
    }

    fn ln_1p(self) -> Self {
        unary(self, self.value.ln_1p(), 1.0 / (1.0 + self.value))
    }

    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    fn sin(self) -> Self {
        unary(self, self.value.sin(), self.value.cos())
    }

    fn cos(self) -> Self {
        unary(self, self.value.cos(), -self.value.sin())
    }

    fn tan(self) -> Self {
        let c = self.value.cos();
        unary(self, self.value.tan(), 1.0 / (c * c))
    }

    fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.value.sin_cos();
        (unary(self, s, c), unary(self, c, -s))
    }

    fn asin(self) -> Self {
        unary(self, self.value.asin(), 1.0 / (1.0 - self.value * self.value).sqrt())
    }

    fn acos(self) -> Self {
        unary(self, self.value.acos(), -1.0 / (1.0 - self.value * self.value).sqrt())
    }

    fn atan(self) -> Self {
        unary(self, self.value.atan(), 1.0 / (1.0 + self.value * self.value))
    }

    fn atan2(self, other: Self) -> Self {
        let denom = self.value * self.value + other.value * other.value;
        binary(self, other, self.value.atan2(other.value), other.value / denom, -self.value / denom)
    }

    fn sinh(self) -> Self {
        unary(self, self.value.sinh(), self.value.cosh())
    }

    fn cosh(self) -> Self {
        unary(self, self.value.cosh(), self.value.sinh())
    }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        unary(self, t, 1.0 - t * t)
    }

    fn asinh(self) -> Self {
        unary(self, self.value.asinh(), 1.0 / (self.value * self.value + 1.0).sqrt())
    }

    fn acosh(self) -> Self {
        unary(self, self.value.acosh(), 1.0 / (self.value * self.value - 1.0).sqrt())
    }

    fn atanh(self) -> Self {
        unary(self, self.value.atanh(), 1.0 / (1.0 - self.value * self.value))
    }

    fn hypot(self, other: Self) -> Self {
        let h = self.value.hypot(other.value);
        binary(self, other, h, self.value / h, other.value / h)
    }

    fn max(self, other: Self) -> Self {
        if self.value >= other.value || other.value.is_nan() {
            unary(self, self.value, 1.0)
        } else {
            unary(other, other.value, 1.0)
        }
    }

    fn min(self, other: Self) -> Self {
        if self.value <= other.value || other.value.is_nan() {
            unary(self, self.value, 1.0)
        } else {
            unary(other, other.value, 1.0)
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value {
            self - other
        } else {
            Self::zero()
        }
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value.integer_decode()
    }

    fn to_degrees(self) -> Self {
        unary(self, self.value.to_degrees(), 180.0 / consts::PI)
    }

    fn to_radians(self) -> Self {
        unary(self, self.value.to_radians(), consts::PI / 180.0)
    }
}
