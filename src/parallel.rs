//! Parallel firing of several agenda groups.
//!
//! Each group keeps its own evaluator, so the single-driver rule of the
//! firing loop holds: a lane is only ever driven by the worker that pulled it
//! off the job queue. Groups share the session and executor, whose own
//! synchronization decides how their firings interleave.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{info, warn};

use crate::config::RuleBaseConfig;
use crate::error::{ExecutionError, FireError, FireResult};
use crate::evaluator::{AgendaEvaluator, FireOutcome};
use crate::filter::AgendaFilter;
use crate::group::AgendaGroup;
use crate::halt::HaltHandle;
use crate::limit::FireLimit;

struct Lane {
    evaluator: AgendaEvaluator,
    group: Arc<dyn AgendaGroup>,
}

/// Outcome of firing one group.
#[derive(Debug)]
pub struct GroupFireReport {
    /// Group name.
    pub group: String,
    /// Fire count and stop reason, or the error that ended the group's loop.
    pub result: FireResult<FireOutcome>,
}

/// Fires a set of groups concurrently on a bounded number of worker threads.
pub struct ParallelFiring {
    lanes: Vec<Lane>,
    worker_threads: usize,
    default_fire_limit: FireLimit,
}

impl ParallelFiring {
    /// Create a driver using at most `worker_threads` threads per call.
    #[must_use]
    pub fn new(worker_threads: usize) -> Self {
        Self {
            lanes: Vec::new(),
            worker_threads: worker_threads.max(1),
            default_fire_limit: FireLimit::Unlimited,
        }
    }

    /// Create a driver sized from the rule base configuration, using its
    /// `default_fire_limit` for `fire_all_default`.
    #[must_use]
    pub fn from_config(config: &RuleBaseConfig) -> Self {
        Self {
            default_fire_limit: config.default_fire_limit,
            ..Self::new(config.parallel_worker_threads)
        }
    }

    /// Limit used by `fire_all_default`.
    #[must_use]
    pub const fn default_fire_limit(&self) -> FireLimit {
        self.default_fire_limit
    }

    /// Add a group with its dedicated evaluator.
    pub fn add(&mut self, evaluator: AgendaEvaluator, group: Arc<dyn AgendaGroup>) -> HaltHandle {
        let handle = evaluator.halt_handle();
        self.lanes.push(Lane { evaluator, group });
        handle
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Returns true if no group was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Halt handles for every group, in insertion order.
    #[must_use]
    pub fn halt_handles(&self) -> Vec<HaltHandle> {
        self.lanes.iter().map(|l| l.evaluator.halt_handle()).collect()
    }

    /// Evaluator of the `idx`-th group.
    #[must_use]
    pub fn evaluator(&self, idx: usize) -> Option<&AgendaEvaluator> {
        self.lanes.get(idx).map(|l| &l.evaluator)
    }

    /// `fire_all` with the driver's default fire limit.
    pub fn fire_all_default(&mut self, filter: Option<&dyn AgendaFilter>) -> Vec<GroupFireReport> {
        self.fire_all(filter, self.default_fire_limit)
    }

    /// Fire every group once, each with its own fire count starting at zero.
    ///
    /// Reports come back in insertion order. A group whose evaluator panics
    /// is reported as `ExecutionError::WorkerPanicked` and removed from the
    /// driver, since its evaluator state can no longer be trusted.
    pub fn fire_all(
        &mut self,
        filter: Option<&dyn AgendaFilter>,
        fire_limit: FireLimit,
    ) -> Vec<GroupFireReport> {
        let lanes = std::mem::take(&mut self.lanes);
        if lanes.is_empty() {
            return Vec::new();
        }

        let count = lanes.len();
        let names: Vec<String> = lanes.iter().map(|l| l.group.name().to_string()).collect();
        let workers = self.worker_threads.min(count);
        info!(groups = count, workers, "parallel group firing started");

        // Both queues hold every lane, so neither side ever blocks on send.
        let (job_tx, job_rx) = bounded::<(usize, Lane)>(count);
        let (done_tx, done_rx) = bounded::<(usize, Option<Lane>, FireResult<FireOutcome>)>(count);
        for job in lanes.into_iter().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for idx in 1..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("salience-group-{idx}"))
                    .spawn_scoped(scope, move || drain_lanes(&job_rx, &done_tx, filter, fire_limit));
                if let Err(e) = spawned {
                    warn!(error = %e, "failed to spawn group worker; continuing with fewer threads");
                }
            }
            drain_lanes(&job_rx, &done_tx, filter, fire_limit);
        });
        drop(done_tx);

        let mut slots: Vec<Option<(Option<Lane>, FireResult<FireOutcome>)>> =
            (0..count).map(|_| None).collect();
        for (idx, lane, result) in done_rx.try_iter() {
            slots[idx] = Some((lane, result));
        }

        let mut reports = Vec::with_capacity(count);
        for (slot, group) in slots.into_iter().zip(names) {
            let result = match slot {
                Some((lane, result)) => {
                    if let Some(lane) = lane {
                        self.lanes.push(lane);
                    }
                    result
                }
                None => Err(FireError::internal(format!("group '{group}' produced no report"))),
            };
            reports.push(GroupFireReport { group, result });
        }
        reports
    }
}

fn drain_lanes(
    job_rx: &Receiver<(usize, Lane)>,
    done_tx: &Sender<(usize, Option<Lane>, FireResult<FireOutcome>)>,
    filter: Option<&dyn AgendaFilter>,
    fire_limit: FireLimit,
) {
    while let Ok((idx, mut lane)) = job_rx.try_recv() {
        let fired = panic::catch_unwind(AssertUnwindSafe(|| {
            lane.evaluator
                .evaluate_and_fire_detailed(lane.group.as_ref(), filter, 0, fire_limit)
        }));
        let message = match fired {
            Ok(result) => (idx, Some(lane), result),
            Err(_) => {
                let group = lane.group.name().to_string();
                warn!(group = %group, "group evaluator panicked");
                (idx, None, Err(ExecutionError::WorkerPanicked { group }.into()))
            }
        };
        let _ = done_tx.send(message);
    }
}
