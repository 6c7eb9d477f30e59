#![cfg(feature = "parallel")]

use tapir::Scalar;
use tapir_nuts::{
    effective_sample_size, run_chains, run_chains_pooled, split_rhat, DomainError, Draws,
    LogDensity, MetricKind, Sampler, SamplerConfig, SamplerError,
};

struct StdNormal(usize);

impl LogDensity for StdNormal {
    fn dim(&self) -> usize {
        self.0
    }

    fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError> {
        Ok(-T::dot_self(q) * T::from_f(0.5))
    }
}

#[test]
fn parallel_chains_match_sequential_runs() {
    let model = StdNormal(3);
    let config = SamplerConfig::default().num_warmup(100).num_samples(100);
    let inits = vec![vec![0.0; 3], vec![1.0; 3], vec![-1.0, 0.5, 2.0], vec![0.1; 3]];

    let outputs = run_chains(&model, &config, &inits, 2024).unwrap();
    assert_eq!(outputs.len(), inits.len());
    for (k, out) in outputs.iter().enumerate() {
        assert_eq!(out.chain, k);
        let mut sampler = Sampler::for_chain(&model, config.clone(), 2024, k as u64).unwrap();
        let mut draws = Draws::new();
        let summary = sampler.run(&inits[k], &mut draws).unwrap();
        assert_eq!(out.draws.all(), draws.all());
        assert_eq!(out.summary.step_size, summary.step_size);
    }
    assert_ne!(outputs[0].draws.all(), outputs[3].draws.all());
}

#[test]
fn a_failing_chain_fails_the_run() {
    let model = StdNormal(2);
    let config = SamplerConfig::default().num_warmup(20).num_samples(20);
    let inits = vec![vec![0.0, 0.0], vec![0.0]];
    assert!(matches!(
        run_chains(&model, &config, &inits, 1),
        Err(SamplerError::DimensionMismatch { .. })
    ));
}

/// Independent normals with standard deviations `1, 10`.
struct Scaled;

impl LogDensity for Scaled {
    fn dim(&self) -> usize {
        2
    }

    fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError> {
        let y = q[1] * T::from_f(0.1);
        Ok(-(q[0] * q[0] + y * y) * T::from_f(0.5))
    }
}

#[test]
fn pooled_warmup_gives_every_chain_the_same_metric() {
    let config = SamplerConfig::default().num_warmup(300).num_samples(200);
    let inits = vec![vec![0.0, 0.0], vec![1.0, -5.0], vec![-1.0, 5.0]];

    let outputs = run_chains_pooled(&Scaled, &config, &inits, 77).unwrap();
    assert_eq!(outputs.len(), 3);
    let metric = &outputs[0].summary.metric;
    assert_eq!(metric.kind(), MetricKind::Diagonal);
    for out in &outputs {
        assert_eq!(&out.summary.metric, metric);
        assert_eq!(out.draws.warmup().count(), 300);
        assert_eq!(out.draws.sampling().count(), 200);
    }
    let var = metric.inv_metric_diagonal();
    assert!(var[1] > 10.0 * var[0], "pooled inverse metric {var:?}");

    // independent adaptation ends on a different metric per chain
    let independent = run_chains(&Scaled, &config, &inits, 77).unwrap();
    assert_ne!(independent[0].summary.metric, independent[1].summary.metric);

    let again = run_chains_pooled(&Scaled, &config, &inits, 77).unwrap();
    for (a, b) in outputs.iter().zip(&again) {
        assert_eq!(a.draws.all(), b.draws.all());
    }
}

#[test]
fn unit_metric_pooling_matches_independent_chains() {
    let config = SamplerConfig::default()
        .metric(MetricKind::Unit)
        .num_warmup(150)
        .num_samples(50);
    let inits = vec![vec![0.5; 3], vec![-0.5; 3]];
    let pooled = run_chains_pooled(&StdNormal(3), &config, &inits, 5).unwrap();
    let independent = run_chains(&StdNormal(3), &config, &inits, 5).unwrap();
    for (a, b) in pooled.iter().zip(&independent) {
        assert_eq!(a.draws.all(), b.draws.all());
        assert_eq!(a.summary.step_size, b.summary.step_size);
    }
}

#[test]
fn converged_chains_pass_the_diagnostics() {
    let model = StdNormal(2);
    let config = SamplerConfig::default().num_warmup(500).num_samples(500);
    let inits = vec![vec![2.0, -2.0], vec![-2.0, 2.0], vec![0.0, 0.0], vec![1.0, 1.0]];
    let outputs = run_chains(&model, &config, &inits, 31).unwrap();

    let rhat = split_rhat(&outputs);
    let ess = effective_sample_size(&outputs);
    assert_eq!(rhat.len(), 2);
    assert_eq!(ess.len(), 2);
    for i in 0..2 {
        assert!(rhat[i] < 1.05, "rhat[{i}] = {}", rhat[i]);
        assert!(ess[i] > 500.0, "ess[{i}] = {}", ess[i]);
    }
}
