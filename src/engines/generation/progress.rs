use super::evolution_engine::ProgressCallback;
use log::{debug, info};

/// Logs generation progress through the `log` facade
pub struct LogProgressCallback {
    label: String,
    report_every: usize,
}

impl LogProgressCallback {
    pub fn new(label: impl Into<String>, report_every: usize) -> Self {
        Self {
            label: label.into(),
            report_every: report_every.max(1),
        }
    }
}

impl ProgressCallback for LogProgressCallback {
    fn on_phase_start(&mut self, layer: &str, phase: &str) {
        self.label = format!("{}/{}", layer, phase);
    }

    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(&mut self, generation: usize, best_fitness: f64) {
        if generation % self.report_every == 0 {
            debug!(
                "[{}] Gen {:3}: best fitness = {:.4}",
                self.label, generation, best_fitness
            );
        }
    }

    fn on_threshold_reached(&mut self, generation: usize, best_fitness: f64) {
        info!(
            "[{}] Reached threshold at gen {} (fitness: {:.3})",
            self.label,
            generation + 1,
            best_fitness
        );
    }
}

/// Records the best fitness of every evaluated generation
#[derive(Debug, Default, Clone)]
pub struct HistoryProgressCallback {
    best: Vec<f64>,
    threshold_generation: Option<usize>,
}

impl HistoryProgressCallback {
    pub fn best_per_generation(&self) -> &[f64] {
        &self.best
    }

    pub fn threshold_generation(&self) -> Option<usize> {
        self.threshold_generation
    }

    pub fn clear(&mut self) {
        self.best.clear();
        self.threshold_generation = None;
    }
}

impl ProgressCallback for HistoryProgressCallback {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(&mut self, _generation: usize, best_fitness: f64) {
        self.best.push(best_fitness);
    }

    fn on_threshold_reached(&mut self, generation: usize, _best_fitness: f64) {
        self.threshold_generation = Some(generation);
    }
}
