//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and iteration counters.
///
/// Created when `--stats` is passed and threaded as `Option<&mut Stats>`;
/// zero cost when absent.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub outer_iterations: usize,
    pub cg_iterations: Vec<usize>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            outer_iterations: 0,
            cg_iterations: Vec::new(),
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Hearth Performance Stats ===");
        for (name, dur) in &self.phases {
            eprintln!("  {:<20} {:>8.3}s", name, dur.as_secs_f64());
        }
        if self.outer_iterations > 0 {
            eprintln!("  Outer iterations:    {}", self.outer_iterations);
            let iters: Vec<String> = self.cg_iterations.iter().map(|i| i.to_string()).collect();
            eprintln!("    CG iters:          {}", iters.join(" / "));
        }
        eprintln!("  ────────────────────────────");
        eprintln!("  Total:               {:>8.3}s", total.as_secs_f64());
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
