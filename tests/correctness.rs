use approx::assert_relative_eq;
use num_traits::Float;
use tapir::{grad, grad_hessian, hessian, jacobian, value_and_grad, vjp, Scalar, Var};

/// Central finite difference gradient.
fn finite_diff_grad(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}

/// Rosenbrock function, generic over scalar type.
fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = T::from_f(1.0);
    let hundred = T::from_f(100.0);
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

/// Beale function: (1.5 - x + xy)² + (2.25 - x + xy²)² + (2.625 - x + xy³)²
fn beale<T: Scalar>(x: &[T]) -> T {
    let (x0, x1) = (x[0], x[1]);
    let t1 = T::from_f(1.5) - x0 + x0 * x1;
    let t2 = T::from_f(2.25) - x0 + x0 * x1 * x1;
    let t3 = T::from_f(2.625) - x0 + x0 * x1 * x1 * x1;
    t1 * t1 + t2 * t2 + t3 * t3
}

const COVARIATES: [[f64; 2]; 5] = [[0.5, 1.0], [-1.2, 0.3], [2.0, -0.7], [0.1, 0.1], [-0.4, 2.2]];
const OUTCOMES: [f64; 5] = [1.0, 0.0, 1.0, 0.0, 1.0];

/// Bernoulli-logit log likelihood with an intercept.
fn logistic_log_lik<T: Scalar>(beta: &[T]) -> T {
    let mut total = T::zero();
    for (row, &y) in COVARIATES.iter().zip(&OUTCOMES) {
        let eta = beta[0] + beta[1] * T::from_f(row[0]) + beta[2] * T::from_f(row[1]);
        total = total + T::from_f(y) * eta - eta.log1p_exp();
    }
    total
}

#[test]
fn rosenbrock_gradient_matches_finite_differences() {
    let x = [1.2, 0.8, -0.5, 1.7];
    let g = grad(|v| rosenbrock(v), &x);
    let fd = finite_diff_grad(|v| rosenbrock(v), &x, 1e-6);
    for (a, b) in g.iter().zip(&fd) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
}

#[test]
fn beale_gradient_matches_finite_differences() {
    let x = [1.0, 0.5];
    let (v, g) = value_and_grad(|v| beale(v), &x);
    assert_relative_eq!(v, beale(&x), max_relative = 1e-14);
    let fd = finite_diff_grad(|v| beale(v), &x, 1e-6);
    for (a, b) in g.iter().zip(&fd) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
}

#[test]
fn logistic_gradient_matches_finite_differences() {
    let beta = [0.3, -0.8, 1.1];
    let g = grad(|b| logistic_log_lik(b), &beta);
    let fd = finite_diff_grad(|b| logistic_log_lik(b), &beta, 1e-6);
    for (a, b) in g.iter().zip(&fd) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
}

#[test]
fn gradient_is_linear() {
    let x = [0.7, -0.3, 1.1];
    let (a, b) = (2.5_f64, -0.75_f64);
    let combined = grad(
        |v| {
            let f = logistic_log_lik(v);
            let g = v[0].sin() * v[1] + v[2].exp();
            f * a + g * b
        },
        &x,
    );
    let gf = grad(|v| logistic_log_lik(v), &x);
    let gg = grad(|v| v[0].sin() * v[1] + v[2].exp(), &x);
    for i in 0..3 {
        assert_relative_eq!(combined[i], a * gf[i] + b * gg[i], max_relative = 1e-12);
    }
}

#[test]
fn rosenbrock_hessian_is_exact_for_a_polynomial() {
    let (x, y) = (1.2, 0.8);
    let (v, g, h) = hessian(|v| rosenbrock(v), &[x, y]);
    assert_relative_eq!(v, rosenbrock(&[x, y]), max_relative = 1e-14);
    assert_relative_eq!(g[1], 200.0 * (y - x * x), max_relative = 1e-12);

    assert_relative_eq!(h[0][0], 2.0 - 400.0 * y + 1200.0 * x * x, epsilon = 1e-6);
    assert_relative_eq!(h[0][1], -400.0 * x, epsilon = 1e-6);
    assert_relative_eq!(h[1][0], -400.0 * x, epsilon = 1e-6);
    assert_relative_eq!(h[1][1], 200.0, epsilon = 1e-6);
}

#[test]
fn transcendental_hessian() {
    // f(a, b) = e^a sin b
    let (a, b) = (0.4_f64, 1.3_f64);
    let (_, _, h) = hessian(|v| v[0].exp() * v[1].sin(), &[a, b]);
    let (e, s, c) = (a.exp(), b.sin(), b.cos());
    assert_relative_eq!(h[0][0], e * s, epsilon = 1e-8);
    assert_relative_eq!(h[0][1], e * c, epsilon = 1e-8);
    assert_relative_eq!(h[1][1], -e * s, epsilon = 1e-8);
}

#[test]
fn third_derivatives() {
    let (a, b) = (0.4_f64, 1.3_f64);
    let (v, h, t) = grad_hessian(|v| v[0].exp() * v[1].sin(), &[a, b]);
    let (e, s, c) = (a.exp(), b.sin(), b.cos());
    assert_relative_eq!(v, e * s, max_relative = 1e-14);
    assert_relative_eq!(h[0][1], e * c, epsilon = 1e-8);

    // T[k][i][j] = ∂H[i][j]/∂x_k
    assert_relative_eq!(t[0][0][0], e * s, epsilon = 1e-5);
    assert_relative_eq!(t[0][0][1], e * c, epsilon = 1e-5);
    assert_relative_eq!(t[1][0][0], e * c, epsilon = 1e-5);
    assert_relative_eq!(t[0][1][1], -e * s, epsilon = 1e-5);
    assert_relative_eq!(t[1][0][1], -e * s, epsilon = 1e-5);
    assert_relative_eq!(t[1][1][1], -e * c, epsilon = 1e-5);
}

#[test]
fn rosenbrock_third_derivatives() {
    let (x, y) = (1.2, 0.8);
    let (_, _, t) = grad_hessian(|v| rosenbrock(v), &[x, y]);
    assert_relative_eq!(t[0][0][0], 2400.0 * x, epsilon = 1e-4);
    assert_relative_eq!(t[1][0][0], -400.0, epsilon = 1e-4);
    assert_relative_eq!(t[0][0][1], -400.0, epsilon = 1e-4);
    assert_relative_eq!(t[1][1][1], 0.0, epsilon = 1e-4);
}

#[test]
fn jacobian_rows_are_output_gradients() {
    let x = [2.0_f64, 3.0];
    let (values, jac) = jacobian(
        |v| vec![v[0] * v[1], v[0].sin(), v[1] * v[1] + 3.0, Var::constant(1.0)],
        &x,
    );
    assert_eq!(values, vec![6.0, x[0].sin(), 12.0, 1.0]);
    assert_eq!(jac[0], vec![3.0, 2.0]);
    assert_relative_eq!(jac[1][0], x[0].cos(), max_relative = 1e-14);
    assert_eq!(jac[1][1], 0.0);
    assert_eq!(jac[2], vec![0.0, 6.0]);
    assert_eq!(jac[3], vec![0.0, 0.0]);
}

#[test]
fn vjp_matches_weighted_jacobian() {
    let x = [0.5, -1.5, 2.0];
    let w = [1.0, -2.0];
    let f = |v: &[Var]| vec![v[0] * v[1] * v[2], v[0].exp() + v[2]];
    let (values, product) = vjp(f, &x, &w);
    let (_, jac) = jacobian(f, &x);
    assert_eq!(values.len(), 2);
    for j in 0..3 {
        assert_relative_eq!(product[j], w[0] * jac[0][j] + w[1] * jac[1][j], max_relative = 1e-14);
    }
}
