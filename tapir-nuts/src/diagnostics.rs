//! Convergence diagnostics over the draws of one or more chains.
//!
//! Both estimators take one slice of scalar draws per chain; chains of
//! unequal length are truncated to the shortest.

/// Tolerance under which draws count as equal when testing for a constant
/// chain.
const CONSTANT_TOLERANCE: f64 = 1e-12;

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Unbiased sample variance.
fn variance(x: &[f64]) -> f64 {
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (x.len() as f64 - 1.0)
}

fn approx_constant(x: &[f64]) -> bool {
    let first = x[0];
    let scale = first.abs().max(1.0);
    x.iter().all(|v| (v - first).abs() <= CONSTANT_TOLERANCE * scale)
}

/// Biased autocovariance of `x` at lag `k`, normalized by `x.len()`.
fn autocovariance_at(x: &[f64], mean: f64, k: usize) -> f64 {
    let n = x.len();
    x[..n - k]
        .iter()
        .zip(&x[k..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>()
        / n as f64
}

/// Biased autocovariance of `x` at every lag `0..x.len()`.
pub fn autocovariance(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let m = mean(x);
    (0..x.len()).map(|k| autocovariance_at(x, m, k)).collect()
}

/// Split potential scale reduction `R̂`.
///
/// Each chain is split into its first and last halves, which are then
/// compared as separate chains:
///
/// ```text
/// R̂ = sqrt((B / W + n - 1) / n)
/// ```
///
/// with `B` the between-half and `W` the mean within-half variance.
/// Returns NaN with fewer than four draws per chain.
pub fn split_rhat(chains: &[&[f64]]) -> f64 {
    let n_samples = match chains.iter().map(|c| c.len()).min() {
        Some(n) => n - n % 2,
        None => return f64::NAN,
    };
    let n = n_samples / 2;
    if n < 2 {
        return f64::NAN;
    }

    let mut split_means = Vec::with_capacity(2 * chains.len());
    let mut split_vars = Vec::with_capacity(2 * chains.len());
    for chain in chains {
        for half in [&chain[..n], &chain[chain.len() - n..]] {
            split_means.push(mean(half));
            split_vars.push(variance(half));
        }
    }

    let var_between = n as f64 * variance(&split_means);
    let var_within = mean(&split_vars);
    let n = n as f64;
    ((var_between / var_within + n - 1.0) / n).sqrt()
}

/// Effective sample size across chains.
///
/// Autocorrelations are combined over chains and summed with Geyer's
/// initial monotone sequence estimator. The result is capped at
/// `N · log10(N)` for `N` total draws. Returns NaN for non-finite draws,
/// for chains that are all the same constant and for fewer than four
/// draws per chain.
pub fn effective_sample_size(chains: &[&[f64]]) -> f64 {
    let num_draws = match chains.iter().map(|c| c.len()).min() {
        Some(n) if n >= 4 => n,
        _ => return f64::NAN,
    };
    let chains: Vec<&[f64]> = chains.iter().map(|c| &c[..num_draws]).collect();
    let num_chains = chains.len();

    if chains.iter().flat_map(|c| c.iter()).any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    if chains.iter().any(|c| approx_constant(c)) {
        let firsts: Vec<f64> = chains.iter().map(|c| c[0]).collect();
        if approx_constant(&firsts) {
            return f64::NAN;
        }
    }

    let chain_means: Vec<f64> = chains.iter().map(|c| mean(c)).collect();
    let mean_acov = |k: usize| -> f64 {
        chains
            .iter()
            .zip(&chain_means)
            .map(|(c, &m)| autocovariance_at(c, m, k))
            .sum::<f64>()
            / num_chains as f64
    };

    let n = num_draws as f64;
    let mean_var = mean_acov(0) * n / (n - 1.0);
    let mut var_plus = mean_var * (n - 1.0) / n;
    if num_chains > 1 {
        var_plus += variance(&chain_means);
    }
    let rho = |k: usize| 1.0 - (mean_var - mean_acov(k)) / var_plus;

    let mut rho_hat = vec![0.0; num_draws];
    let mut rho_even = 1.0;
    let mut rho_odd = rho(1);
    rho_hat[0] = rho_even;
    rho_hat[1] = rho_odd;

    // the last pair of lags is left out of the positive sequence and kept
    // as a bias correction below
    let mut s = 1;
    while s < num_draws - 4 && rho_even + rho_odd > 0.0 {
        rho_even = rho(s + 1);
        rho_odd = rho(s + 2);
        if rho_even + rho_odd >= 0.0 {
            rho_hat[s + 1] = rho_even;
            rho_hat[s + 2] = rho_odd;
        }
        s += 2;
    }
    let max_s = s;
    if rho_even > 0.0 {
        rho_hat[max_s + 1] = rho_even;
    }

    // initial positive sequence -> initial monotone sequence
    let mut s = 1;
    while s + 3 <= max_s {
        let prev = rho_hat[s - 1] + rho_hat[s];
        if rho_hat[s + 1] + rho_hat[s + 2] > prev {
            rho_hat[s + 1] = prev / 2.0;
            rho_hat[s + 2] = rho_hat[s + 1];
        }
        s += 2;
    }

    let total = (num_chains * num_draws) as f64;
    let tau = -1.0 + 2.0 * rho_hat[..max_s].iter().sum::<f64>() + rho_hat[max_s + 1];
    (total / tau).min(total * total.log10())
}

/// Linearly interpolated sample quantile at probability `prob` in `[0, 1]`.
/// NaN for empty input.
pub fn quantile(x: &[f64], prob: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let h = (sorted.len() - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn normal_draws(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n).map(|_| StandardNormal.sample(&mut rng)).collect()
    }

    /// AR(1) series `x_t = phi · x_{t-1} + e_t`.
    fn ar1(seed: u64, n: usize, phi: f64) -> Vec<f64> {
        let mut x = 0.0;
        normal_draws(seed, n)
            .into_iter()
            .map(|e| {
                x = phi * x + e;
                x
            })
            .collect()
    }

    #[test]
    fn autocovariance_matches_a_hand_computation() {
        let acov = autocovariance(&[1.0, 2.0, 3.0, 4.0]);
        // deviations -1.5, -0.5, 0.5, 1.5
        assert!((acov[0] - 5.0 / 4.0).abs() < 1e-14);
        assert!((acov[1] - 1.25 / 4.0).abs() < 1e-14);
        assert!((acov[2] - (-1.5) / 4.0).abs() < 1e-14);
        assert!((acov[3] - (-2.25) / 4.0).abs() < 1e-14);
        assert!(autocovariance(&[]).is_empty());
    }

    #[test]
    fn independent_draws_have_full_sample_size() {
        let chains: Vec<Vec<f64>> = (0..4).map(|k| normal_draws(k, 1000)).collect();
        let views: Vec<&[f64]> = chains.iter().map(Vec::as_slice).collect();
        let ess = effective_sample_size(&views);
        assert!(ess > 3000.0 && ess < 5500.0, "ess = {ess}");
        let rhat = split_rhat(&views);
        assert!((rhat - 1.0).abs() < 0.01, "rhat = {rhat}");
    }

    #[test]
    fn autocorrelation_lowers_the_sample_size() {
        // for phi = 0.9 the integrated autocorrelation time is 19
        let chains: Vec<Vec<f64>> = (0..4).map(|k| ar1(10 + k, 5000, 0.9)).collect();
        let views: Vec<&[f64]> = chains.iter().map(Vec::as_slice).collect();
        let ess = effective_sample_size(&views);
        let expected = 20_000.0 / 19.0;
        assert!(ess > 0.6 * expected && ess < 1.5 * expected, "ess = {ess}");
    }

    #[test]
    fn shifted_chains_have_large_rhat() {
        let a = normal_draws(1, 500);
        let b: Vec<f64> = normal_draws(2, 500).iter().map(|x| x + 3.0).collect();
        assert!(split_rhat(&[&a, &b]) > 1.5);

        // a trend inside each chain shows up between its halves
        let trend: Vec<f64> = (0..500).map(|i| i as f64 / 50.0).collect();
        let c: Vec<f64> = a.iter().zip(&trend).map(|(x, t)| x + t).collect();
        assert!(split_rhat(&[&c]) > 1.5);
    }

    #[test]
    fn degenerate_input_gives_nan() {
        let same = vec![2.0; 100];
        assert!(effective_sample_size(&[&same, &same]).is_nan());
        assert!(effective_sample_size(&[&[1.0, f64::NAN, 0.0, 2.0, 3.0]]).is_nan());
        assert!(effective_sample_size(&[&[1.0, 2.0, 3.0]]).is_nan());
        assert!(effective_sample_size(&[]).is_nan());
        assert!(split_rhat(&[&[1.0, 2.0, 3.0]]).is_nan());
        assert!(split_rhat(&[]).is_nan());

        // constant chains at different values are not degenerate
        let other = vec![3.0; 100];
        assert!(effective_sample_size(&[&same, &other]).is_finite());
    }

    #[test]
    fn quantiles_interpolate() {
        let x = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(quantile(&x, 0.0), 1.0);
        assert_eq!(quantile(&x, 0.5), 3.0);
        assert_eq!(quantile(&x, 1.0), 5.0);
        assert!((quantile(&x, 0.1) - 1.4).abs() < 1e-14);
        assert!(quantile(&[], 0.5).is_nan());
    }
}
