use log::{info, warn};

use crate::config::WindowConfig;

/// Minimum warmup length for which metric adaptation runs at all.
pub const MIN_ADAPT_WARMUP: usize = 20;

/// The slow-window schedule of warmup.
///
/// Warmup is split into a fast initial buffer, a sequence of slow windows
/// that double in length, and a fast terminal buffer. The last slow window
/// is stretched so it ends where the terminal buffer begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptationWindows {
    num_warmup: usize,
    init_buffer: usize,
    term_buffer: usize,
    base_window: usize,
    adapt_window_counter: usize,
    adapt_window_size: usize,
    adapt_next_window: usize,
    enabled: bool,
}

impl AdaptationWindows {
    pub fn new(num_warmup: usize, config: &WindowConfig) -> Self {
        let mut windows = AdaptationWindows {
            num_warmup,
            init_buffer: config.init_buffer,
            term_buffer: config.term_buffer,
            base_window: config.base_window,
            adapt_window_counter: 0,
            adapt_window_size: 0,
            adapt_next_window: 0,
            enabled: true,
        };
        windows.set_window_params();
        windows
    }

    fn set_window_params(&mut self) {
        if self.num_warmup < MIN_ADAPT_WARMUP {
            warn!(
                "no metric adaptation with {} warmup iterations (need at least {MIN_ADAPT_WARMUP})",
                self.num_warmup
            );
            self.enabled = false;
            self.restart();
            return;
        }

        if self.init_buffer + self.base_window + self.term_buffer > self.num_warmup {
            let n = self.num_warmup as f64;
            self.init_buffer = (0.15 * n) as usize;
            self.term_buffer = (0.1 * n) as usize;
            self.base_window = self.num_warmup - (self.init_buffer + self.term_buffer);
            info!(
                "warmup of {} iterations is too short for the requested windows; \
                 using init_buffer = {}, adapt_window = {}, term_buffer = {}",
                self.num_warmup, self.init_buffer, self.base_window, self.term_buffer
            );
        }
        self.restart();
    }

    pub fn restart(&mut self) {
        self.adapt_window_counter = 0;
        self.adapt_window_size = self.base_window;
        self.adapt_next_window = (self.init_buffer + self.adapt_window_size).saturating_sub(1);
    }

    /// Whether metric adaptation runs at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn num_warmup(&self) -> usize {
        self.num_warmup
    }

    pub fn init_buffer(&self) -> usize {
        self.init_buffer
    }

    pub fn term_buffer(&self) -> usize {
        self.term_buffer
    }

    pub fn base_window(&self) -> usize {
        self.base_window
    }

    /// Warmup iterations seen so far.
    pub fn counter(&self) -> usize {
        self.adapt_window_counter
    }

    /// Whether the current iteration falls inside a slow window.
    pub fn adaptation_window(&self) -> bool {
        self.enabled
            && self.adapt_window_counter >= self.init_buffer
            && self.adapt_window_counter < self.num_warmup - self.term_buffer
            && self.adapt_window_counter != self.num_warmup
    }

    /// Whether the current iteration closes a slow window.
    pub fn end_adaptation_window(&self) -> bool {
        self.enabled
            && self.adapt_window_counter == self.adapt_next_window
            && self.adapt_window_counter != self.num_warmup
    }

    /// Advance the schedule past a closing window.
    pub fn compute_next_window(&mut self) {
        let last = self.num_warmup - self.term_buffer - 1;
        if self.adapt_next_window == last {
            return;
        }
        self.adapt_window_size *= 2;
        self.adapt_next_window = self.adapt_window_counter + self.adapt_window_size;
        if self.adapt_next_window != last {
            let next_window_boundary = self.adapt_next_window + 2 * self.adapt_window_size;
            if next_window_boundary >= self.num_warmup - self.term_buffer {
                self.adapt_next_window = last;
            }
        }
    }

    pub(crate) fn increment(&mut self) {
        self.adapt_window_counter += 1;
    }

    /// The `[start, end)` iteration ranges of every slow window.
    pub fn schedule(&self) -> Vec<(usize, usize)> {
        let mut probe = self.clone();
        probe.restart();
        let mut windows = Vec::new();
        let mut start = probe.init_buffer;
        while probe.adapt_window_counter < probe.num_warmup {
            if probe.end_adaptation_window() {
                windows.push((start, probe.adapt_window_counter + 1));
                start = probe.adapt_window_counter + 1;
                probe.compute_next_window();
            }
            probe.increment();
        }
        windows
    }
}
