//! NaN inputs poison the partials of every node they reach, so gradients
//! through a NaN are NaN rather than a misleading finite number.

use num_traits::Float;
use tapir::{grad, Scalar, Var};

#[test]
fn nan_operand_makes_product_gradient_nan() {
    // d(x·y)/dx = y is finite, but x = NaN makes every partial NaN
    let g = grad(|v| v[0] * v[1], &[f64::NAN, 2.0]);
    assert!(g[0].is_nan());
    assert!(g[1].is_nan());
}

#[test]
fn nan_flows_through_unary_chain() {
    let g = grad(|v| (v[0].exp() + 1.0).ln().sin(), &[f64::NAN]);
    assert!(g[0].is_nan());
}

#[test]
fn nan_constant_poisons_mixed_ops() {
    let g = grad(|v| v[0] * f64::NAN, &[1.0]);
    assert!(g[0].is_nan());

    // the NaN sum poisons the other addend as well
    let g = grad(|v| v[0] * f64::NAN + v[1], &[1.0, 2.0]);
    assert!(g[1].is_nan());
}

#[test]
fn unused_nan_branch_does_not_leak() {
    // the NaN node is recorded but does not feed the output
    let g = grad(
        |v| {
            let _dead = v[0] * v[1];
            v[0] * 3.0
        },
        &[1.0, f64::NAN],
    );
    assert_eq!(g[0], 3.0);
    assert_eq!(g[1], 0.0);
}

#[test]
fn nan_in_precomputed_and_reductions() {
    let g = grad(|v| <Var as Scalar>::dot_self(v), &[1.0, f64::NAN, 2.0]);
    assert!(g.iter().all(|x| x.is_nan()));

    let g = grad(|v| <Var as Scalar>::log_sum_exp(v), &[1.0, f64::NAN]);
    assert!(g.iter().all(|x| x.is_nan()));
}

#[test]
fn domain_errors_surface_as_nan() {
    // sqrt of a negative number has a NaN value and therefore NaN downstream
    let g = grad(|v| v[0].sqrt() * 2.0 + v[1], &[-1.0, 1.0]);
    assert!(g[0].is_nan());
    assert!(g[1].is_nan());
}
