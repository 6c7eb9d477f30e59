use crate::config::StepSizeAdaptationConfig;

/// Nesterov dual averaging of the log step size.
///
/// Drives the mean acceptance statistic towards `delta`. During warmup the
/// working step size is `exp(x)`; once adaptation completes the averaged
/// iterate `exp(x̄)` is used instead.
#[derive(Debug, Clone)]
pub struct StepSizeAdaptation {
    config: StepSizeAdaptationConfig,
    mu: f64,
    counter: f64,
    s_bar: f64,
    x_bar: f64,
}

impl StepSizeAdaptation {
    pub fn new(config: StepSizeAdaptationConfig) -> Self {
        StepSizeAdaptation {
            config,
            mu: 0.0,
            counter: 0.0,
            s_bar: 0.0,
            x_bar: 0.0,
        }
    }

    pub fn config(&self) -> &StepSizeAdaptationConfig {
        &self.config
    }

    /// Shrinkage target of the log step size.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn set_mu(&mut self, mu: f64) {
        self.mu = mu;
    }

    /// Forget all history.
    pub fn restart(&mut self) {
        self.counter = 0.0;
        self.s_bar = 0.0;
        self.x_bar = 0.0;
    }

    /// Restart around a new step size: `mu = ln(10 ε)`.
    pub fn restart_at(&mut self, step_size: f64) {
        self.mu = (10.0 * step_size).ln();
        self.restart();
    }

    /// Feed one acceptance statistic and return the next working step size.
    pub fn learn_stepsize(&mut self, adapt_stat: f64) -> f64 {
        let StepSizeAdaptationConfig {
            delta,
            gamma,
            kappa,
            t0,
        } = self.config;
        self.counter += 1.0;
        let adapt_stat = adapt_stat.min(1.0);

        let eta = 1.0 / (self.counter + t0);
        self.s_bar = (1.0 - eta) * self.s_bar + eta * (delta - adapt_stat);

        let x = self.mu - self.s_bar * self.counter.sqrt() / gamma;
        let x_eta = self.counter.powf(-kappa);
        self.x_bar = (1.0 - x_eta) * self.x_bar + x_eta * x;

        x.exp()
    }

    /// Final step size after warmup.
    pub fn complete_adaptation(&self) -> f64 {
        self.x_bar.exp()
    }
}
