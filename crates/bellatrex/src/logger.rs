//! Verbosity-gated logging for fitting, search, and explanation.
//!
//! Messages go through the [`log`] facade; the host application picks the
//! backend. [`Verbosity`] filters on top of whatever level the backend lets
//! through, so a `Silent` explainer stays quiet even under `RUST_LOG=debug`.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::grid::CandidateConfig;

/// Verbosity level for explainer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// No output.
    Silent,
    /// Candidate failures, search exhaustion, report I/O problems.
    #[default]
    Warning,
    /// Progress, winning configuration, predictions, rule files.
    Info,
    /// Per-candidate scores, selected trees, inline rules.
    Debug,
}

/// Logger for one search and explanation call.
#[derive(Debug)]
pub struct SearchLogger {
    verbosity: Verbosity,
    start: Option<Instant>,
}

impl SearchLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, start: None }
    }

    #[inline]
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self.verbosity >= level
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Warning) {
            log::warn!("{}", message.as_ref());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Info) {
            log::info!("{}", message.as_ref());
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Debug) {
            log::debug!("{}", message.as_ref());
        }
    }

    /// Mark the start of a search over `n_candidates` grid points.
    pub fn start_search(&mut self, n_candidates: usize, parallel: bool) {
        self.start = Some(Instant::now());
        if parallel {
            self.warn(
                "parallel search may pick a different configuration than sequential search when scores tie",
            );
        }
        self.info(format!(
            "searching {n_candidates} configurations ({})",
            if parallel { "parallel" } else { "sequential" }
        ));
    }

    pub fn log_candidate(&self, config: &CandidateConfig, score: f64) {
        self.debug(format!("candidate {config}: fidelity {score:.4}"));
    }

    pub fn log_failure(&self, config: &CandidateConfig, reason: &str) {
        self.warn(format!("candidate {config} failed: {reason}"));
    }

    pub fn log_exhausted(&self, n_candidates: usize) {
        self.warn(format!(
            "all {n_candidates} candidate configurations failed; falling back to {}",
            CandidateConfig::FALLBACK
        ));
    }

    pub fn finish_search(&self, best: &CandidateConfig, score: f64) {
        self.info(format!("best params: {best}"));
        self.info(format!("achieved fidelity: {score:.4}"));
        if let Some(start) = self.start {
            self.debug(format!("search took {:.2?}", start.elapsed()));
        }
    }
}
