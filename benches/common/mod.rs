#![allow(dead_code)]

use tapir::Scalar;

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Scalar>(x: &[T]) -> T {
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

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Logistic regression log likelihood ────────────────────────────────────
// x = coefficients; synthetic design row i has entries sin(i + j), labels alternate

pub fn logistic_log_likelihood<T: Scalar>(x: &[T]) -> T {
    let mut lp = T::zero();
    for i in 0..32 {
        let eta = x
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (j, &b)| acc + b * T::from_f(((i + j) as f64).sin()));
        // log p(y | eta) = y·eta - log(1 + e^eta)
        let y = if i % 2 == 0 { eta } else { T::zero() };
        lp = lp + y - eta.log1p_exp();
    }
    lp
}

// ─── Hierarchical normal log density ───────────────────────────────────────
// x = [mu, log_tau, theta_1..theta_n]; theta_i ~ N(mu, tau), y_i ~ N(theta_i, 1)

pub fn hierarchical_log_density<T: Scalar>(x: &[T]) -> T {
    let mu = x[0];
    let log_tau = x[1];
    let tau = log_tau.exp();
    let theta = &x[2..];
    let half = T::from_f(0.5);
    let mut lp = -half * mu * mu / T::from_f(25.0) - half * log_tau * log_tau;
    for (i, &t) in theta.iter().enumerate() {
        let y = T::from_f((i as f64 * 0.37).sin() * 2.0);
        let z = (t - mu) / tau;
        lp = lp - half * z.square() - log_tau - half * (y - t).square();
    }
    lp
}

// ─── Finite Differences ────────────────────────────────────────────────────

pub fn finite_diff_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
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

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}
