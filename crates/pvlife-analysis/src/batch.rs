//! Fitting many lifetime curves at once using rayon.
//!
//! Each job owns its curve and configuration, so jobs run independently.
//! A failing job is recorded against its id and never stops the others.

use log::info;
use pvlife_core::LifetimeCurve;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::lifetime::{FitConfig, FitResult, fit_lifetime};

/// Configuration for batch execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Minimum jobs to use parallel execution (below this, sequential is faster).
    pub min_items_for_parallel: usize,
    /// Chunk size for work distribution. None = auto (rayon default).
    pub chunk_size: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_items_for_parallel: 4,
            chunk_size: None,
        }
    }
}

impl BatchConfig {
    pub fn with_min_parallel(mut self, min: usize) -> Self {
        self.min_items_for_parallel = min;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }
}

/// One device or measurement to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitJob {
    #[serde(default)]
    pub id: String,
    pub curve: LifetimeCurve,
    #[serde(default)]
    pub config: FitConfig,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub id: String,
    pub result: Result<FitResult>,
}

/// Per-job outcomes in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub parallel: bool,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Failed jobs with the class of their error.
    pub fn failures(&self) -> impl Iterator<Item = (&str, ErrorKind, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Err(err) => Some((o.id.as_str(), err.kind(), err)),
            Ok(_) => None,
        })
    }
}

fn run(job: &FitJob) -> BatchOutcome {
    BatchOutcome {
        id: job.id.clone(),
        result: fit_lifetime(&job.curve, &job.config),
    }
}

/// Fit every job, in parallel when worthwhile.
///
/// Falls back to sequential execution if:
/// - Number of jobs is below `config.min_items_for_parallel`
/// - Only 1 rayon thread is available
pub fn fit_batch(jobs: &[FitJob], config: &BatchConfig) -> BatchReport {
    let parallel = jobs.len() >= config.min_items_for_parallel && rayon::current_num_threads() > 1;

    let outcomes: Vec<BatchOutcome> = if !parallel {
        jobs.iter().map(run).collect()
    } else {
        info!(
            "fitting {} jobs on {} threads",
            jobs.len(),
            rayon::current_num_threads()
        );
        match config.chunk_size {
            Some(size) => jobs
                .par_chunks(size.max(1))
                .flat_map_iter(|chunk| chunk.iter().map(run))
                .collect(),
            None => jobs.par_iter().map(run).collect(),
        }
    };

    let report = BatchReport { outcomes, parallel };
    info!(
        "batch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvlife_core::Doping;

    fn bad_job(id: &str) -> FitJob {
        FitJob {
            id: id.to_string(),
            curve: LifetimeCurve {
                nd: vec![1e14, 1e15],
                tau: vec![1e-3],
                temperature: 298.15,
                wafer_thickness: 0.03,
                doping: Doping::donors(1e15),
            },
            config: FitConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.min_items_for_parallel, 4);
        assert!(config.chunk_size.is_none());
        assert_eq!(config.with_chunk_size(2).chunk_size, Some(2));
    }

    #[test]
    fn test_failures_keep_order_and_identity() {
        let jobs = vec![bad_job("a"), bad_job("b")];
        let report = fit_batch(&jobs, &BatchConfig::default());
        assert!(!report.parallel);
        assert_eq!(report.len(), 2);
        assert_eq!(report.failed(), 2);
        let ids: Vec<&str> = report.failures().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(report.failures().all(|(_, kind, _)| kind == ErrorKind::Input));
    }

    #[test]
    fn test_empty_batch() {
        let report = fit_batch(&[], &BatchConfig::default());
        assert!(report.is_empty());
        assert_eq!(report.succeeded(), 0);
    }
}
