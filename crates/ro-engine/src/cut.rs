//! The `cut` pipeline: evaluate every grid point on every sample group.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use ro_data::{discover_groups, load_table, read_metadata, read_supercuts, ResultStore};
use ro_optimizer::{scale_factors, CutGrid, DispatchReport, Dispatcher, SelectionEvaluator};
use ro_types::{internal_error, CountTable, MetadataTable, RoResult};

use crate::config::CutConfig;

/// Outcome of a `cut` run.
#[derive(Debug, Clone)]
pub struct CutRun {
    pub output_dir: PathBuf,
    pub grid_size: usize,
    pub report: DispatchReport,
}

/// Run `cut`. Everything that can fail without looking at events is checked
/// before dispatch; after that a failing group is logged and skipped.
pub fn run_cut(config: &CutConfig) -> RoResult<CutRun> {
    config.validate()?;
    let start = Instant::now();

    let supercuts = read_supercuts(&config.supercuts)?;
    let grid = CutGrid::new(&supercuts)?;
    info!(
        dimensions = supercuts.len(),
        combinations = grid.len(),
        "Loaded supercuts"
    );

    let metadata = match &config.metadata {
        Some(path) => read_metadata(path)?,
        None => MetadataTable::default(),
    };
    let groups = discover_groups(&config.files, &config.tree_name)?;
    let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    let factors = scale_factors(&metadata, &ids)?;

    let store = ResultStore::create(&config.output_dir, config.overwrite)?;
    let evaluator = SelectionEvaluator::new(config.event_weight.as_str());

    let report = Dispatcher::new(config.num_workers).dispatch(&groups, |group| {
        let scale_factor = factors
            .get(&group.id)
            .copied()
            .ok_or_else(|| internal_error!("no scale factor for sample {}", group.id))?;

        let mut table = CountTable::new();
        for file in &group.files {
            let source = load_table(file, &group.tree_name)?;
            evaluator.accumulate(&grid, &source, scale_factor, &mut table)?;
        }
        store.write_count_table(&group.id, &table)?;
        Ok(())
    })?;

    if report.failed() > 0 {
        warn!(
            failed = report.failed(),
            total = report.outcomes.len(),
            "Some samples were skipped"
        );
    }
    info!(
        succeeded = report.succeeded(),
        wall_ms = start.elapsed().as_millis() as u64,
        cpu_ms = report.cpu_time().as_millis() as u64,
        output = %store.root().display(),
        "Cut run finished"
    );

    Ok(CutRun {
        output_dir: store.root().to_path_buf(),
        grid_size: grid.len(),
        report,
    })
}
