//! Parallel evaluation of sample groups with per-group failure isolation.
//!
//! Each sample group runs on a dedicated rayon pool. A failing or panicking
//! group is logged and recorded as a failure; it never aborts its siblings.
//! Completion events stream over a crossbeam channel to a reporter thread
//! while the pool works.

use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, info};

use ro_types::{internal_error, EvaluationError, RoError, RoResult, SampleGroup};

/// How many workers to run and how many groups they share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAllocation {
    pub num_workers: usize,
    pub num_tasks: usize,
}

impl WorkerAllocation {
    /// Never more workers than tasks, never fewer than one.
    pub fn new(requested: usize, num_tasks: usize) -> Self {
        Self {
            num_workers: requested.min(num_tasks).max(1),
            num_tasks,
        }
    }
}

/// Completion notice for one sample group.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub sample: String,
    pub success: bool,
    pub elapsed: Duration,
}

/// Result of one sample group, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub sample: String,
    pub success: bool,
    pub elapsed: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub outcomes: Vec<SampleOutcome>,
    /// Wall-clock time of the whole dispatch.
    pub wall_time: Duration,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Sum of per-group elapsed times.
    pub fn cpu_time(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Runs one closure per sample group on a bounded worker pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    num_workers: usize,
    progress: Option<Sender<ProgressEvent>>,
}

impl Dispatcher {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            progress: None,
        }
    }

    /// Forward every completion event to `tx` as well as the internal
    /// reporter.
    pub fn with_progress(mut self, tx: Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Evaluate every group and block until all have finished.
    ///
    /// Outcomes come back in the order of `groups`, whatever order the
    /// workers finished in.
    pub fn dispatch<F>(&self, groups: &[SampleGroup], work: F) -> RoResult<DispatchReport>
    where
        F: Fn(&SampleGroup) -> RoResult<()> + Sync,
    {
        let allocation = WorkerAllocation::new(self.num_workers, groups.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(allocation.num_workers)
            .thread_name(|i| format!("ro-worker-{i}"))
            .build()
            .map_err(|e| internal_error!("failed to build worker pool: {e}"))?;

        info!(
            workers = allocation.num_workers,
            samples = allocation.num_tasks,
            "Dispatching sample groups"
        );

        let started = Instant::now();
        let (tx, rx) = unbounded::<ProgressEvent>();
        let forward = self.progress.clone();

        let outcomes = std::thread::scope(|scope| {
            let reporter = scope.spawn(move || report_progress(rx, allocation.num_tasks, forward));

            let outcomes: Vec<SampleOutcome> = pool.install(|| {
                groups
                    .par_iter()
                    .map_with(tx, |tx, group| run_isolated(group, &work, tx))
                    .collect()
            });

            if reporter.join().is_err() {
                error!("Progress reporter panicked");
            }
            outcomes
        });

        let report = DispatchReport {
            outcomes,
            wall_time: started.elapsed(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cpu_seconds = report.cpu_time().as_secs_f64(),
            wall_seconds = report.wall_time.as_secs_f64(),
            "Dispatch finished"
        );
        Ok(report)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(1)
    }
}

fn run_isolated<F>(group: &SampleGroup, work: &F, tx: &Sender<ProgressEvent>) -> SampleOutcome
where
    F: Fn(&SampleGroup) -> RoResult<()>,
{
    let started = Instant::now();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| work(group))) {
        Ok(result) => result,
        Err(payload) => Err(RoError::Evaluation(EvaluationError::Panicked {
            message: panic_message(payload.as_ref()),
        })),
    };
    let elapsed = started.elapsed();

    let error = match result {
        Ok(()) => None,
        Err(e) => {
            error!(sample = %group.id, error = %e, "Caught an error, skipping sample");
            Some(e.to_string())
        }
    };

    let outcome = SampleOutcome {
        sample: group.id.clone(),
        success: error.is_none(),
        elapsed,
        error,
    };
    // Best-effort; the reporter only logs.
    let _ = tx.send(ProgressEvent {
        sample: outcome.sample.clone(),
        success: outcome.success,
        elapsed,
    });
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Drains completion events until every sender is gone. Returns how many
/// events it saw.
fn report_progress(
    rx: Receiver<ProgressEvent>,
    total: usize,
    forward: Option<Sender<ProgressEvent>>,
) -> usize {
    let mut done = 0;
    for event in rx {
        done += 1;
        info!(
            sample = %event.sample,
            success = event.success,
            elapsed_seconds = event.elapsed.as_secs_f64(),
            "[{done}/{total}] sample finished"
        );
        if let Some(forward) = &forward {
            let _ = forward.send(event);
        }
    }
    done
}
