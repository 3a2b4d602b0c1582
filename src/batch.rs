use indicatif::ProgressBar;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::PreprocessConfig;
use crate::device::build_resizer;
use crate::discovery::discover;
use crate::error::Result;
use crate::transform::{ensure_dir, try_process_image, PrepContext};

/// A source image and where its processed copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchPlan {
    pub items: Vec<WorkItem>,
    /// Sources dropped because a later source claimed the same output path.
    pub collisions: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub total: usize,
    pub failures: Vec<PathBuf>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.succeeded, self.total)
    }
}

/// Lists every (source, output) pair before any work starts.
pub fn plan(config: &PreprocessConfig) -> Result<BatchPlan> {
    let sources = discover(&config.input_dir, &config.extensions, config.limit)?;

    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();
    let mut plan = BatchPlan::default();
    for source in sources {
        let Some(name) = source.output_name(config.format) else {
            tracing::warn!("cannot derive an output name for {}", source.path.display());
            continue;
        };
        let output = config.output_dir.join(name);

        // one item per output path, so parallel workers never share a file
        if let Some(&index) = claimed.get(&output) {
            let item = &mut plan.items[index];
            tracing::warn!(
                "{} and {} both map to {}; keeping the later source",
                item.source.display(),
                source.path.display(),
                output.display()
            );
            item.source = source.path;
            plan.collisions += 1;
            continue;
        }

        claimed.insert(output.clone(), plan.items.len());
        plan.items.push(WorkItem {
            source: source.path,
            output,
        });
    }

    Ok(plan)
}

/// Processes every item, sequentially for `workers == 1`, otherwise on a
/// pool of `workers` threads. Item failures are logged and counted.
pub fn execute(
    ctx: &PrepContext,
    items: &[WorkItem],
    workers: usize,
    progress: &ProgressBar,
) -> Result<BatchReport> {
    progress.set_length(items.len() as u64);

    let process = |item: &WorkItem| {
        let ok = try_process_image(ctx, &item.source, &item.output);
        progress.inc(1);
        ok
    };

    let results: Vec<bool> = if workers <= 1 {
        items.iter().map(process).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        pool.install(|| items.par_iter().map(process).collect())
    };
    progress.finish_and_clear();

    let failures = items
        .iter()
        .zip(&results)
        .filter(|(_, ok)| !**ok)
        .map(|(item, _)| item.source.clone())
        .collect();

    Ok(BatchReport {
        succeeded: results.iter().filter(|ok| **ok).count(),
        total: items.len(),
        failures,
    })
}

/// Validates the config, builds the shared context once, plans, then executes.
pub fn run(config: &PreprocessConfig, progress: &ProgressBar) -> Result<BatchReport> {
    config.validate()?;
    let resizer = build_resizer(config.target, config.filter)?;
    ensure_dir(&config.output_dir)?;

    let plan = plan(config)?;
    tracing::info!(
        "processing {} images with {} resizer ({} worker(s), {})",
        plan.items.len(),
        resizer.name(),
        config.workers,
        config.target_size()
    );

    let ctx = PrepContext::new(resizer, config.target_size(), config.format);
    execute(&ctx, &plan.items, config.workers, progress)
}
