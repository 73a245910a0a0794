//! Creates many materials in one pass over a shared `MaterialEngine`.
//!
//! Items run in parallel on rayon; the engine's caches are the only shared
//! state. Each item succeeds or fails on its own, and the report lists
//! outcomes in input order.
mod plan;

use std::collections::BTreeMap;

use matgraph::{BackendId, CreatedMaterial, MaterialEngine, MaterialError};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use plan::{
    is_model_file, match_textures, model_stem, plan_models, BatchItem, MatchStrategy,
    SUPPORTED_MODEL_EXTENSIONS,
};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub item: BatchItem,
    pub result: Result<CreatedMaterial, MaterialError>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_backend: BTreeMap<BackendId, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_ok())
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.outcomes.len(),
            ..BatchSummary::default()
        };
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(created) => {
                    summary.succeeded += 1;
                    *summary
                        .by_backend
                        .entry(created.selection.backend)
                        .or_default() += 1;
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchDriver<'a> {
    engine: &'a MaterialEngine,
    threads: Option<usize>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(engine: &'a MaterialEngine) -> Self {
        Self {
            engine,
            threads: None,
        }
    }

    /// Caps the worker count; `None` or zero uses rayon's global pool.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads.filter(|count| *count > 0);
        self
    }

    pub fn run(&self, items: Vec<BatchItem>) -> Result<BatchReport, BatchError> {
        let outcomes = match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                pool.install(|| self.run_items(items))
            }
            None => self.run_items(items),
        };
        let report = BatchReport { outcomes };
        let summary = report.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );
        Ok(report)
    }

    fn run_items(&self, items: Vec<BatchItem>) -> Vec<BatchOutcome> {
        items
            .into_par_iter()
            .map(|item| {
                let result = self
                    .engine
                    .create_material(&item.name, &item.files, item.requested);
                if let Err(err) = &result {
                    warn!(material = %item.name, error = %err, "material failed; continuing batch");
                }
                BatchOutcome { item, result }
            })
            .collect()
    }
}
