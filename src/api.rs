//! Closure-based drivers over the tape.
//!
//! Every driver records into its own nested region and recovers it before
//! returning, so it can be called at any nesting depth without disturbing
//! variables the caller already holds.

use crate::nested::nested;
use crate::tape::{self, CONSTANT};
use crate::var::Var;

/// Relative step for the finite-difference stencils over gradients.
const FD_STEP: f64 = 1e-3;

fn leaves(x: &[f64]) -> Vec<Var> {
    tape::with_tape(|t| {
        x.iter()
            .map(|&value| Var {
                value,
                index: t.new_variable(value),
            })
            .collect()
    })
}

fn adjoints(inputs: &[Var]) -> Vec<f64> {
    tape::with_tape(|t| inputs.iter().map(|v| t.adjoint(v.index)).collect())
}

/// Compute the gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// ```
/// let g = tapir::grad(|x: &[tapir::Var]| {
///     x[0] * x[0] + x[1] * x[1]
/// }, &[3.0, 4.0]);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn grad(f: impl FnOnce(&[Var]) -> Var, x: &[f64]) -> Vec<f64> {
    value_and_grad(f, x).1
}

/// `(f(x), ∇f(x))` in one forward and one reverse pass.
pub fn value_and_grad(f: impl FnOnce(&[Var]) -> Var, x: &[f64]) -> (f64, Vec<f64>) {
    nested(|| {
        let inputs = leaves(x);
        let output = f(&inputs);
        output.grad();
        (output.value, adjoints(&inputs))
    })
}

/// Fallible [`value_and_grad`]: an `Err` from `f` is passed through and the
/// region is still recovered.
pub fn try_value_and_grad<E>(
    f: impl FnOnce(&[Var]) -> Result<Var, E>,
    x: &[f64],
) -> Result<(f64, Vec<f64>), E> {
    nested(|| {
        let inputs = leaves(x);
        let output = f(&inputs)?;
        output.grad();
        Ok((output.value, adjoints(&inputs)))
    })
}

/// Vector-Jacobian product (reverse mode): `(f(x), wᵀ·J)`.
///
/// Evaluates `f` at `x` and computes the adjoint product with weights `w`.
pub fn vjp(f: impl FnOnce(&[Var]) -> Vec<Var>, x: &[f64], w: &[f64]) -> (Vec<f64>, Vec<f64>) {
    nested(|| {
        let inputs = leaves(x);
        let outputs = f(&inputs);
        assert_eq!(
            outputs.len(),
            w.len(),
            "output length must match weight vector length"
        );
        let values: Vec<f64> = outputs.iter().map(|v| v.value).collect();
        let seeds: Vec<(u32, f64)> = outputs
            .iter()
            .zip(w)
            .filter(|(v, _)| v.index != CONSTANT)
            .map(|(v, &wi)| (v.index, wi))
            .collect();
        tape::with_tape(|t| t.grad_seeded(&seeds));
        (values, adjoints(&inputs))
    })
}

/// Full Jacobian of `f : R^n → R^m`, one reverse sweep per output.
///
/// Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`. The function is recorded
/// once; each sweep re-zeroes the region's adjoints before seeding.
pub fn jacobian(f: impl FnOnce(&[Var]) -> Vec<Var>, x: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
    nested(|| {
        let inputs = leaves(x);
        let outputs = f(&inputs);
        let values = outputs.iter().map(|v| v.value).collect();
        let jac = outputs
            .iter()
            .map(|out| {
                if out.is_constant() {
                    vec![0.0; inputs.len()]
                } else {
                    out.grad();
                    adjoints(&inputs)
                }
            })
            .collect();
        (values, jac)
    })
}

/// Fourth-order central difference of a vector-valued `g` along coordinate `i`.
fn stencil(g: &mut impl FnMut(&[f64]) -> Vec<f64>, x: &[f64], i: usize) -> Vec<f64> {
    let h = FD_STEP * x[i].abs().max(1.0);
    let mut probe = x.to_vec();
    let mut at = |offset: f64| {
        probe[i] = x[i] + offset * h;
        g(&probe)
    };
    let p2 = at(2.0);
    let p1 = at(1.0);
    let m1 = at(-1.0);
    let m2 = at(-2.0);
    (0..p1.len())
        .map(|k| (-p2[k] + 8.0 * p1[k] - 8.0 * m1[k] + m2[k]) / (12.0 * h))
        .collect()
}

fn symmetrize(h: &mut [Vec<f64>]) {
    let n = h.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (h[i][j] + h[j][i]);
            h[i][j] = avg;
            h[j][i] = avg;
        }
    }
}

/// Hessian by central differences of reverse-mode gradients.
///
/// Returns `(f(x), ∇f(x), H)`. Each column of `H` comes from a fourth-order
/// stencil over four gradient evaluations, each in its own nested region,
/// and the result is symmetrised. Accuracy is around `1e-8` relative for
/// smooth, well-scaled functions.
pub fn hessian(f: impl Fn(&[Var]) -> Var, x: &[f64]) -> (f64, Vec<f64>, Vec<Vec<f64>>) {
    nested(|| {
        let (value, gradient) = value_and_grad(&f, x);
        let mut g = |p: &[f64]| value_and_grad(&f, p).1;
        let columns: Vec<Vec<f64>> = (0..x.len()).map(|i| stencil(&mut g, x, i)).collect();
        // columns[i][j] = ∂²f/∂x_i∂x_j
        let mut h = columns;
        symmetrize(&mut h);
        (value, gradient, h)
    })
}

/// Hessian plus its derivative: `(f(x), H, T)` with
/// `T[k][i][j] = ∂H[i][j]/∂x_k`.
///
/// Differences the [`hessian`] driver, so each Hessian probe runs inside a
/// region nested within this one.
pub fn grad_hessian(
    f: impl Fn(&[Var]) -> Var,
    x: &[f64],
) -> (f64, Vec<Vec<f64>>, Vec<Vec<Vec<f64>>>) {
    let n = x.len();
    nested(|| {
        let (value, _, h) = hessian(&f, x);
        let mut flat = |p: &[f64]| hessian(&f, p).2.concat();
        let third = (0..n)
            .map(|k| {
                let d = stencil(&mut flat, x, k);
                d.chunks(n.max(1)).map(<[f64]>::to_vec).collect()
            })
            .collect();
        (value, h, third)
    })
}
