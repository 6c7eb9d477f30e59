use std::fmt::{self, Display};

use crate::tape::{self, CONSTANT};

/// Reverse-mode AD variable.
///
/// A value and an index into the current thread's tape, 16 bytes in all.
/// `Copy` because the node it names lives on the tape, not inside this
/// struct. A `Var` is only meaningful on the thread that created it and only
/// until the region it was recorded in is recovered.
#[derive(Clone, Copy, Debug)]
pub struct Var {
    pub(crate) value: f64,
    pub(crate) index: u32,
}

impl Var {
    /// Record a new independent variable.
    #[inline]
    pub fn new(value: f64) -> Self {
        let index = tape::with_tape(|t| t.new_variable(value));
        Var { value, index }
    }

    /// Create a constant (not tracked on tape).
    #[inline]
    pub fn constant(value: f64) -> Self {
        Var {
            value,
            index: CONSTANT,
        }
    }

    /// Record a node whose value and partial derivatives were computed
    /// outside the tape.
    ///
    /// `partials[i]` is the derivative of the result with respect to
    /// `operands[i]`. This is the hook for closed-form primitives such as a
    /// log-density that knows its own gradient.
    ///
    /// # Panics
    ///
    /// Panics if `operands` and `partials` differ in length.
    pub fn precomputed(value: f64, operands: &[Var], partials: &[f64]) -> Self {
        assert_eq!(
            operands.len(),
            partials.len(),
            "precomputed node needs one partial per operand"
        );
        let any_nan = operands.iter().any(|v| v.value.is_nan());
        let pairs: Vec<(u32, f64)> = operands
            .iter()
            .zip(partials)
            .map(|(v, &d)| (v.index, if any_nan { f64::NAN } else { d }))
            .collect();
        let index = tape::with_tape(|t| t.push_nary(value, &pairs));
        Var { value, index }
    }

    /// Primal value.
    #[inline]
    pub fn val(&self) -> f64 {
        self.value
    }

    /// Adjoint left on the tape by the last reverse sweep. Zero for constants.
    #[inline]
    pub fn adj(&self) -> f64 {
        tape::with_tape(|t| t.adjoint(self.index))
    }

    /// Run the reverse sweep with this variable as the output.
    ///
    /// Afterwards [`Var::adj`] on any upstream variable of the same region
    /// reads `d self / d var`.
    pub fn grad(&self) {
        tape::with_tape(|t| t.grad(self.index));
    }

    /// Get the tape index (for advanced usage / testing).
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Default for Var {
    fn default() -> Self {
        Var::constant(0.0)
    }
}

impl From<f64> for Var {
    #[inline]
    fn from(value: f64) -> Self {
        Var::constant(value)
    }
}

/// Record a unary elemental. A NaN operand makes the partial NaN.
#[inline]
pub(crate) fn unary(x: Var, value: f64, partial: f64) -> Var {
    let partial = if x.value.is_nan() { f64::NAN } else { partial };
    let index = tape::with_tape(|t| t.push_unary(value, x.index, partial));
    Var { value, index }
}

/// Record a binary elemental. A NaN in either operand makes both partials NaN.
#[inline]
pub(crate) fn binary(x: Var, y: Var, value: f64, dx: f64, dy: f64) -> Var {
    let (dx, dy) = if x.value.is_nan() || y.value.is_nan() {
        (f64::NAN, f64::NAN)
    } else {
        (dx, dy)
    };
    let index = tape::with_tape(|t| t.push_binary(value, x.index, dx, y.index, dy));
    Var { value, index }
}

/// Record an elemental of a variable and a plain `f64`. A NaN in either makes
/// the partial NaN.
#[inline]
pub(crate) fn with_constant(x: Var, c: f64, value: f64, partial: f64) -> Var {
    let partial = if c.is_nan() { f64::NAN } else { partial };
    unary(x, value, partial)
}
