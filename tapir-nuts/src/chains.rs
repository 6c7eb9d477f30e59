//! Independent chains on rayon worker threads.
//!
//! Each chain records into the tape of the thread it runs on, so chains
//! share nothing but the model. [`run_chains_pooled`] additionally brings
//! the chains together at every adaptation window end to share one metric.

use rayon::prelude::*;

use crate::adaptation::MetricAdaptation;
use crate::config::SamplerConfig;
use crate::diagnostics;
use crate::draws::Draws;
use crate::error::Result;
use crate::model::LogDensity;
use crate::sampler::{RunSummary, Sampler};

/// Output of one chain of [`run_chains`].
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub chain: usize,
    pub draws: Draws,
    pub summary: RunSummary,
}

/// Run one chain per initial point in parallel.
///
/// Chain `k` draws from [`chain_rng(seed, k)`](crate::chain_rng), so results
/// do not depend on thread scheduling. The first failing chain's error is
/// returned.
pub fn run_chains<M: LogDensity + Sync>(
    model: &M,
    config: &SamplerConfig,
    inits: &[Vec<f64>],
    seed: u64,
) -> Result<Vec<ChainOutput>> {
    config.validate()?;
    inits
        .par_iter()
        .enumerate()
        .map(|(chain, q0)| {
            let mut sampler = Sampler::for_chain(model, config.clone(), seed, chain as u64)?;
            let mut draws = Draws::new();
            let summary = sampler.run(q0, &mut draws)?;
            Ok(ChainOutput {
                chain,
                draws,
                summary,
            })
        })
        .collect()
}

/// Like [`run_chains`], but warmup pools the metric estimate of all chains.
///
/// Chains run in parallel up to each slow window end. There the windows'
/// estimators are merged, and every chain switches to the metric of the
/// pooled estimate and searches a new initial step size. Sampling then
/// proceeds independently. Step sizes stay per chain.
pub fn run_chains_pooled<M: LogDensity + Sync>(
    model: &M,
    config: &SamplerConfig,
    inits: &[Vec<f64>],
    seed: u64,
) -> Result<Vec<ChainOutput>> {
    config.validate()?;
    let mut chains = (0..inits.len())
        .map(|chain| {
            let sampler = Sampler::for_chain(model, config.clone(), seed, chain as u64)?;
            Ok((sampler, Draws::new()))
        })
        .collect::<Result<Vec<_>>>()?;

    chains
        .par_iter_mut()
        .zip(inits.par_iter())
        .try_for_each(|((sampler, _), q0)| sampler.start_warmup(q0))?;

    loop {
        let closed = chains
            .par_iter_mut()
            .map(|(sampler, draws)| sampler.warmup_until_window(draws))
            .collect::<Result<Vec<bool>>>()?;
        if !closed.contains(&true) {
            break;
        }
        let pooled = MetricAdaptation::pooled_metric(
            chains
                .iter_mut()
                .map(|(sampler, _)| sampler.metric_adaptation_mut()),
        );
        if let Some(metric) = pooled {
            chains
                .par_iter_mut()
                .try_for_each(|(sampler, _)| sampler.update_metric(metric.clone()))?;
        }
    }

    chains
        .into_par_iter()
        .enumerate()
        .map(|(chain, (mut sampler, mut draws))| {
            sampler.finish_warmup();
            sampler.sample(&mut draws)?;
            Ok(ChainOutput {
                chain,
                summary: sampler.summary(),
                draws,
            })
        })
        .collect()
}

fn per_parameter(outputs: &[ChainOutput], stat: fn(&[&[f64]]) -> f64) -> Vec<f64> {
    let dim = outputs
        .first()
        .map_or(0, |out| out.summary.metric.dim());
    (0..dim)
        .map(|i| {
            let columns: Vec<Vec<f64>> = outputs.iter().map(|out| out.draws.column(i)).collect();
            let views: Vec<&[f64]> = columns.iter().map(Vec::as_slice).collect();
            stat(&views)
        })
        .collect()
}

/// Split `R̂` of every parameter over the chains' sampling draws.
pub fn split_rhat(outputs: &[ChainOutput]) -> Vec<f64> {
    per_parameter(outputs, diagnostics::split_rhat)
}

/// Multi-chain effective sample size of every parameter over the chains'
/// sampling draws.
pub fn effective_sample_size(outputs: &[ChainOutput]) -> Vec<f64> {
    per_parameter(outputs, diagnostics::effective_sample_size)
}
