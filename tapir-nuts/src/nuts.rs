//! The No-U-Turn sampler with multinomial trajectory sampling.
//!
//! Each transition resamples momentum and grows a trajectory by repeated
//! doubling in random directions. New subtrees are built recursively; inside
//! a subtree the candidate point is chosen by uniform progressive sampling
//! (weights `e^{H0 - H}`), and at the top level by biased progressive
//! sampling, which favours the most recent doubling. Growth stops at a
//! U-turn, a divergence, an interrupt, or the maximum depth.

use std::fmt;

use log::debug;
use rand::Rng;

use crate::hamiltonian::Hamiltonian;
use crate::integrator::Leapfrog;
use crate::interrupt::Interrupt;
use crate::math::{add, dot, log_sum_exp};
use crate::model::LogDensity;
use crate::point::PhasePoint;

/// Default bound on `H - H0` before a leapfrog step counts as divergent.
pub const DEFAULT_MAX_DELTA_H: f64 = 1000.0;

/// Default maximum tree depth (at most `2^10 - 1` leapfrog steps).
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// How a trajectory detects that it has started to turn back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UTurnCriterion {
    /// `p♯⁻·ρ > 0` and `p♯⁺·ρ > 0` with `ρ` the summed momentum, plus the
    /// two checks across each merge boundary.
    #[default]
    Generalized,
    /// `p♯⁻·(q⁺ - q⁻) ≥ 0` and `p♯⁺·(q⁺ - q⁻) ≥ 0` on the end points only.
    Endpoint,
}

/// Why trajectory growth stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Termination {
    UTurn,
    Divergent,
    MaxDepth,
    Interrupted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::UTurn => write!(f, "no-U-turn criterion"),
            Termination::Divergent => write!(f, "divergent transition"),
            Termination::MaxDepth => write!(f, "maximum tree depth reached"),
            Termination::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Result of one NUTS transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The selected point; its momentum is the one it had on the trajectory.
    pub point: PhasePoint,
    pub step_size: f64,
    /// Number of completed doublings.
    pub depth: usize,
    pub n_leapfrog: usize,
    pub divergent: bool,
    /// Hamiltonian at the selected point.
    pub energy: f64,
    /// Mean of `min(1, e^{H0 - H})` over every leapfrog step taken.
    pub accept_stat: f64,
    pub termination: Termination,
}

/// One end of a (sub)trajectory.
#[derive(Debug, Clone)]
struct Boundary {
    q: Vec<f64>,
    p: Vec<f64>,
    p_sharp: Vec<f64>,
}

impl Boundary {
    fn at<M: LogDensity>(z: &PhasePoint, ham: &Hamiltonian<'_, M>) -> Self {
        Boundary {
            q: z.q.clone(),
            p: z.p.clone(),
            p_sharp: ham.dtau_dp(z),
        }
    }
}

/// A valid subtree, with `begin` adjacent to the trajectory it extends.
struct Subtree {
    begin: Boundary,
    end: Boundary,
    rho: Vec<f64>,
    log_sum_weight: f64,
    proposal: PhasePoint,
}

/// Two adjacent pieces of trajectory as seen from their shared seam.
struct Span<'a> {
    /// End touching the other span.
    inner: &'a Boundary,
    /// Far end.
    outer: &'a Boundary,
    rho: &'a [f64],
}

#[derive(Debug, Default)]
struct TreeStats {
    n_leapfrog: usize,
    sum_metro_prob: f64,
    divergent: bool,
}

/// NUTS transition kernel.
#[derive(Debug, Clone)]
pub struct Nuts {
    pub max_depth: usize,
    pub max_delta_h: f64,
    pub criterion: UTurnCriterion,
    integrator: Leapfrog,
}

impl Default for Nuts {
    fn default() -> Self {
        Nuts::new(DEFAULT_MAX_DEPTH, DEFAULT_MAX_DELTA_H, UTurnCriterion::default())
    }
}

impl Nuts {
    pub fn new(max_depth: usize, max_delta_h: f64, criterion: UTurnCriterion) -> Self {
        Nuts {
            max_depth,
            max_delta_h,
            criterion,
            integrator: Leapfrog,
        }
    }

    pub fn integrator(&self) -> &Leapfrog {
        &self.integrator
    }

    /// One transition from `current`, whose potential must already be set.
    pub fn transition<M, R, I>(
        &self,
        ham: &Hamiltonian<'_, M>,
        current: &PhasePoint,
        step_size: f64,
        rng: &mut R,
        interrupt: &I,
    ) -> Transition
    where
        M: LogDensity,
        R: Rng + ?Sized,
        I: Interrupt + ?Sized,
    {
        let mut z = current.clone();
        ham.sample_momentum(rng, &mut z);
        let h0 = ham.energy(&z);

        let start = Boundary::at(&z, ham);
        let mut bck = (z.clone(), start.clone());
        let mut fwd = (z.clone(), start);
        let mut rho = z.p.clone();
        let mut log_sum_weight = 0.0;
        let mut sample = z;

        let mut builder = TreeBuilder {
            nuts: self,
            ham,
            rng,
            interrupt,
            step_size,
            h0,
            stats: TreeStats::default(),
        };

        let mut depth = 0;
        let mut termination = Termination::MaxDepth;
        while depth < self.max_depth {
            let forward = builder.rng.gen::<f64>() > 0.5;
            let sign = if forward { 1.0 } else { -1.0 };
            let (tip, far) = if forward {
                (&mut fwd, &bck)
            } else {
                (&mut bck, &fwd)
            };

            let subtree = match builder.build_tree(depth, &mut tip.0, sign) {
                Ok(subtree) => subtree,
                Err(reason) => {
                    termination = reason;
                    break;
                }
            };
            depth += 1;

            if subtree.log_sum_weight > log_sum_weight {
                sample = subtree.proposal.clone();
            } else {
                let accept = (subtree.log_sum_weight - log_sum_weight).exp();
                if builder.rng.gen::<f64>() < accept {
                    sample = subtree.proposal.clone();
                }
            }
            log_sum_weight = log_sum_exp(log_sum_weight, subtree.log_sum_weight);

            let total = add(&rho, &subtree.rho);
            let old = Span {
                inner: &tip.1,
                outer: &far.1,
                rho: &rho,
            };
            let new = Span {
                inner: &subtree.begin,
                outer: &subtree.end,
                rho: &subtree.rho,
            };
            let persist = self.persists(sign, &old, &new, &total);
            tip.1 = subtree.end;
            rho = total;
            if !persist {
                termination = Termination::UTurn;
                break;
            }
        }

        let TreeStats {
            n_leapfrog,
            sum_metro_prob,
            divergent,
        } = builder.stats;
        let accept_stat = if n_leapfrog > 0 {
            sum_metro_prob / n_leapfrog as f64
        } else {
            0.0
        };
        let energy = ham.energy(&sample);
        Transition {
            point: sample,
            step_size,
            depth,
            n_leapfrog,
            divergent,
            energy,
            accept_stat,
            termination,
        }
    }

    /// Whether the trajectory made of `old` followed (in direction `sign`)
    /// by `new` may keep growing. `rho` is the summed momentum of both.
    fn persists(&self, sign: f64, old: &Span<'_>, new: &Span<'_>, rho: &[f64]) -> bool {
        match self.criterion {
            UTurnCriterion::Generalized => {
                generalized(old.outer, new.outer, rho)
                    && generalized(old.outer, new.inner, &add(old.rho, &new.inner.p))
                    && generalized(old.inner, new.outer, &add(new.rho, &old.inner.p))
            }
            UTurnCriterion::Endpoint => {
                if sign > 0.0 {
                    endpoint(old.outer, new.outer)
                } else {
                    endpoint(new.outer, old.outer)
                }
            }
        }
    }
}

fn generalized(a: &Boundary, b: &Boundary, rho: &[f64]) -> bool {
    dot(&a.p_sharp, rho) > 0.0 && dot(&b.p_sharp, rho) > 0.0
}

/// `first` precedes `last` in integration time.
fn endpoint(first: &Boundary, last: &Boundary) -> bool {
    let dq: Vec<f64> = last.q.iter().zip(&first.q).map(|(a, b)| a - b).collect();
    dot(&dq, &first.p_sharp) >= 0.0 && dot(&dq, &last.p_sharp) >= 0.0
}

struct TreeBuilder<'a, 'm, M, R: ?Sized, I: ?Sized> {
    nuts: &'a Nuts,
    ham: &'a Hamiltonian<'m, M>,
    rng: &'a mut R,
    interrupt: &'a I,
    step_size: f64,
    h0: f64,
    stats: TreeStats,
}

impl<M, R, I> TreeBuilder<'_, '_, M, R, I>
where
    M: LogDensity,
    R: Rng + ?Sized,
    I: Interrupt + ?Sized,
{
    /// Build a subtree of `2^depth` leapfrog steps from `z` in direction
    /// `sign`, leaving `z` at its far end.
    fn build_tree(&mut self, depth: usize, z: &mut PhasePoint, sign: f64) -> Result<Subtree, Termination> {
        if depth == 0 {
            return self.leaf(z, sign);
        }

        let init = self.build_tree(depth - 1, z, sign)?;
        let last = self.build_tree(depth - 1, z, sign)?;

        let log_sum_weight = log_sum_exp(init.log_sum_weight, last.log_sum_weight);
        let accept = (last.log_sum_weight - log_sum_weight).exp();
        let proposal = if self.rng.gen::<f64>() < accept {
            last.proposal
        } else {
            init.proposal
        };

        let rho = add(&init.rho, &last.rho);
        let persist = {
            let old = Span {
                inner: &init.end,
                outer: &init.begin,
                rho: &init.rho,
            };
            let new = Span {
                inner: &last.begin,
                outer: &last.end,
                rho: &last.rho,
            };
            self.nuts.persists(sign, &old, &new, &rho)
        };
        if !persist {
            return Err(Termination::UTurn);
        }

        Ok(Subtree {
            begin: init.begin,
            end: last.end,
            rho,
            log_sum_weight,
            proposal,
        })
    }

    fn leaf(&mut self, z: &mut PhasePoint, sign: f64) -> Result<Subtree, Termination> {
        if self.interrupt.interrupted() {
            return Err(Termination::Interrupted);
        }
        self.nuts
            .integrator
            .evolve(z, self.ham, sign * self.step_size);
        self.stats.n_leapfrog += 1;

        let h = self.ham.energy(z);
        let log_weight = self.h0 - h;
        self.stats.sum_metro_prob += if log_weight > 0.0 {
            1.0
        } else {
            log_weight.exp()
        };

        if h - self.h0 > self.nuts.max_delta_h {
            debug!(
                "divergent leapfrog step: energy error {:e} at step size {:e}",
                h - self.h0,
                self.step_size
            );
            self.stats.divergent = true;
            return Err(Termination::Divergent);
        }

        let edge = Boundary::at(z, self.ham);
        Ok(Subtree {
            begin: edge.clone(),
            end: edge,
            rho: z.p.clone(),
            log_sum_weight: log_weight,
            proposal: z.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::NoInterrupt;
    use crate::metric::{Metric, MetricKind};
    use crate::model::DomainError;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use tapir::Scalar;

    struct StdNormal(usize);

    impl LogDensity for StdNormal {
        fn dim(&self) -> usize {
            self.0
        }

        fn log_density<T: Scalar>(&self, q: &[T]) -> Result<T, DomainError> {
            Ok(-T::dot_self(q) * T::from_f(0.5))
        }
    }

    fn start(ham: &Hamiltonian<'_, StdNormal>, q: Vec<f64>) -> PhasePoint {
        let mut z = PhasePoint::new(q);
        ham.init(&mut z);
        z
    }

    #[test]
    fn leapfrog_count_matches_depth_on_a_turn() {
        let model = StdNormal(3);
        let ham = Hamiltonian::new(&model, Metric::identity(MetricKind::Unit, 3));
        let nuts = Nuts::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut z = start(&ham, vec![0.5, -0.2, 1.0]);
        for _ in 0..50 {
            let t = nuts.transition(&ham, &z, 0.3, &mut rng, &NoInterrupt);
            assert!(!t.divergent);
            assert!(t.depth >= 1);
            // completed doublings plus at most one partial subtree
            assert!(t.n_leapfrog >= (1 << t.depth) - 1);
            assert!(t.n_leapfrog < 1 << (t.depth + 1));
            assert!(t.accept_stat > 0.0 && t.accept_stat <= 1.0);
            assert_eq!(t.termination, Termination::UTurn);
            z = t.point;
        }
    }

    #[test]
    fn max_depth_caps_the_trajectory() {
        let model = StdNormal(2);
        let ham = Hamiltonian::new(&model, Metric::identity(MetricKind::Unit, 2));
        let nuts = Nuts::new(2, DEFAULT_MAX_DELTA_H, UTurnCriterion::Generalized);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let z = start(&ham, vec![1.0, 1.0]);
        // tiny steps never turn within four leapfrogs
        let t = nuts.transition(&ham, &z, 1e-3, &mut rng, &NoInterrupt);
        assert_eq!(t.termination, Termination::MaxDepth);
        assert_eq!(t.depth, 2);
        assert_eq!(t.n_leapfrog, 3);
    }

    #[test]
    fn huge_steps_diverge() {
        let model = StdNormal(2);
        let ham = Hamiltonian::new(&model, Metric::identity(MetricKind::Unit, 2));
        let nuts = Nuts::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let z = start(&ham, vec![1.0, -1.0]);
        let t = nuts.transition(&ham, &z, 200.0, &mut rng, &NoInterrupt);
        assert!(t.divergent);
        assert_eq!(t.termination, Termination::Divergent);
        assert_eq!(t.point.q, z.q);
        assert!(t.accept_stat < 1e-10);
    }

    #[test]
    fn endpoint_criterion_also_turns() {
        let model = StdNormal(2);
        let ham = Hamiltonian::new(&model, Metric::identity(MetricKind::Unit, 2));
        let nuts = Nuts::new(10, DEFAULT_MAX_DELTA_H, UTurnCriterion::Endpoint);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(19);
        let z = start(&ham, vec![0.3, 0.4]);
        let t = nuts.transition(&ham, &z, 0.2, &mut rng, &NoInterrupt);
        assert_eq!(t.termination, Termination::UTurn);
        assert!(t.depth < 10);
    }
}
