// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Dependency-ordered parallel transfer of a set of paths.
//!
//! The scheduler owns one job per planned path. A job waits until every
//! reference that is itself in the plan has been transferred, then a worker
//! task streams its NAR from the source into the destination. At most
//! `max_jobs` workers transfer at a time. A failed job marks every job that
//! transitively depends on it as failed without dispatching it; unrelated
//! jobs keep going.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use harmonia_store_core::{StorePath, ValidPathInfo};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument as _, debug, debug_span, warn};

use crate::error::{PathError, StoreError};
use crate::store::{RepairFlag, StoreAdapter};
use crate::verifying_reader::VerifyingReader;

/// One path the scheduler should transfer.
#[derive(Debug)]
pub struct PlannedTransfer {
    pub info: ValidPathInfo,
    pub repair: RepairFlag,
    /// Set when the path was refused before scheduling (e.g. by the
    /// signature gate). The job fails without being dispatched.
    pub rejected: Option<PathError>,
}

impl PlannedTransfer {
    pub fn new(info: ValidPathInfo) -> Self {
        Self {
            info,
            repair: RepairFlag::NoRepair,
            rejected: None,
        }
    }
}

/// Outcome of a scheduler run, in plan order.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub transferred: Vec<StorePath>,
    /// Sum of the NAR sizes of the transferred paths.
    pub bytes: u64,
    pub failures: Vec<(StorePath, PathError)>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for dependencies.
    Pending,
    /// All dependencies done, queued for a worker.
    ReadyToSend,
    InFlight,
    Done,
    Failed,
}

#[derive(Debug)]
struct Job {
    info: ValidPathInfo,
    repair: RepairFlag,
    state: JobState,
    /// Dependencies in the plan that are not done yet.
    pending: usize,
    dependents: Vec<usize>,
    error: Option<PathError>,
}

type WorkerResult = (usize, Result<u64, PathError>);

/// Transfers planned paths with a bounded worker pool.
pub struct TransferScheduler {
    max_jobs: usize,
}

impl TransferScheduler {
    /// A `max_jobs` of zero is treated as one.
    pub fn new(max_jobs: usize) -> Self {
        Self {
            max_jobs: max_jobs.max(1),
        }
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Run `plan` to completion.
    ///
    /// `plan` must list dependencies before dependents. Entries for a path
    /// that already appeared earlier in the plan are ignored.
    pub async fn run<S, D>(
        &self,
        src: Arc<S>,
        dst: Arc<D>,
        plan: Vec<PlannedTransfer>,
    ) -> TransferReport
    where
        S: StoreAdapter,
        D: StoreAdapter,
    {
        let mut coordinator = Coordinator::new(plan);
        let permits = Arc::new(Semaphore::new(self.max_jobs));
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();

        loop {
            while let Some(index) = coordinator.next_ready() {
                let info = coordinator.jobs[index].info.clone();
                let repair = coordinator.jobs[index].repair;
                let span = debug_span!("copy_path", path = %info.path);
                let src = Arc::clone(&src);
                let dst = Arc::clone(&dst);
                let permits = Arc::clone(&permits);
                workers.spawn(
                    async move {
                        let result = match permits.acquire().await {
                            Ok(_permit) => transfer_path(&*src, &*dst, info, repair).await,
                            Err(_) => Err(PathError::TransferIo {
                                path: info.path.clone(),
                                source: StoreError::InvalidData("worker pool closed".into()),
                            }),
                        };
                        (index, result)
                    }
                    .instrument(span),
                );
            }

            match workers.join_next().await {
                None => break,
                Some(Ok((index, result))) => coordinator.complete(index, result),
                Some(Err(join_error)) => {
                    warn!(error = %join_error, "transfer task did not complete");
                }
            }
        }

        coordinator.fail_abandoned();
        coordinator.into_report()
    }
}

async fn transfer_path<S, D>(
    src: &S,
    dst: &D,
    info: ValidPathInfo,
    repair: RepairFlag,
) -> Result<u64, PathError>
where
    S: StoreAdapter,
    D: StoreAdapter,
{
    debug!(nar_size = info.nar_size, ?repair, "transferring");
    let nar = src
        .nar_from_path(&info.path)
        .await
        .map_err(|source| PathError::TransferIo {
            path: info.path.clone(),
            source,
        })?;
    let nar = VerifyingReader::new(nar, info.path.clone(), info.nar_hash, info.nar_size);

    // The copy was not produced by the destination.
    let mut dst_info = info;
    dst_info.ultimate = false;
    dst.add_to_store(&dst_info, Box::pin(nar), repair)
        .await
        .map_err(|source| PathError::from_transfer(dst_info.path.clone(), source))?;
    debug!("done");
    Ok(dst_info.nar_size)
}

/// Job bookkeeping. Only the task driving [`TransferScheduler::run`] touches
/// it; workers report back through the join set.
struct Coordinator {
    jobs: Vec<Job>,
    ready: VecDeque<usize>,
    in_flight: HashSet<StorePath>,
}

impl Coordinator {
    fn new(plan: Vec<PlannedTransfer>) -> Self {
        let mut index: HashMap<StorePath, usize> = HashMap::new();
        let mut jobs: Vec<Job> = Vec::with_capacity(plan.len());
        let mut rejected = Vec::new();
        for entry in plan {
            if index.contains_key(&entry.info.path) {
                continue;
            }
            index.insert(entry.info.path.clone(), jobs.len());
            if let Some(err) = entry.rejected {
                rejected.push((jobs.len(), err));
            }
            jobs.push(Job {
                info: entry.info,
                repair: entry.repair,
                state: JobState::Pending,
                pending: 0,
                dependents: Vec::new(),
                error: None,
            });
        }

        for i in 0..jobs.len() {
            let deps: Vec<usize> = jobs[i]
                .info
                .references_excluding_self()
                .filter_map(|reference| index.get(reference).copied())
                .collect();
            jobs[i].pending = deps.len();
            for dep in deps {
                jobs[dep].dependents.push(i);
            }
        }

        let mut coordinator = Self {
            jobs,
            ready: VecDeque::new(),
            in_flight: HashSet::new(),
        };
        for (i, err) in rejected {
            coordinator.fail(i, err);
        }
        for i in 0..coordinator.jobs.len() {
            coordinator.mark_ready_if_unblocked(i);
        }
        coordinator
    }

    fn mark_ready_if_unblocked(&mut self, i: usize) {
        let job = &mut self.jobs[i];
        if job.state == JobState::Pending && job.pending == 0 {
            job.state = JobState::ReadyToSend;
            self.ready.push_back(i);
        }
    }

    /// Pop the next ready job and mark it in flight.
    fn next_ready(&mut self) -> Option<usize> {
        while let Some(i) = self.ready.pop_front() {
            let job = &mut self.jobs[i];
            if job.state != JobState::ReadyToSend {
                continue;
            }
            if !self.in_flight.insert(job.info.path.clone()) {
                continue;
            }
            job.state = JobState::InFlight;
            debug!(path = %job.info.path, "dispatching");
            return Some(i);
        }
        None
    }

    fn complete(&mut self, i: usize, result: Result<u64, PathError>) {
        self.in_flight.remove(&self.jobs[i].info.path);
        match result {
            Ok(_) => {
                self.jobs[i].state = JobState::Done;
                for d in self.jobs[i].dependents.clone() {
                    self.jobs[d].pending = self.jobs[d].pending.saturating_sub(1);
                    self.mark_ready_if_unblocked(d);
                }
            }
            Err(err) => self.fail(i, err),
        }
    }

    /// Mark `i` failed and every job that transitively depends on it.
    fn fail(&mut self, i: usize, err: PathError) {
        let root = self.jobs[i].info.path.clone();
        let kind = err.kind();
        warn!(path = %root, error = %err, "path failed");
        self.jobs[i].state = JobState::Failed;
        self.jobs[i].error = Some(err);

        let mut stack = self.jobs[i].dependents.clone();
        while let Some(d) = stack.pop() {
            let job = &mut self.jobs[d];
            if matches!(job.state, JobState::Failed | JobState::Done) {
                continue;
            }
            debug!(path = %job.info.path, dependency = %root, "skipping dependent");
            job.state = JobState::Failed;
            job.error = Some(PathError::DependencyFailed {
                dependency: root.clone(),
                kind,
            });
            stack.extend(job.dependents.iter().copied());
        }
    }

    /// Fail jobs whose worker vanished without reporting back.
    fn fail_abandoned(&mut self) {
        let abandoned: Vec<usize> = (0..self.jobs.len())
            .filter(|&i| self.jobs[i].state == JobState::InFlight)
            .collect();
        for i in abandoned {
            let path = self.jobs[i].info.path.clone();
            self.in_flight.remove(&path);
            self.fail(
                i,
                PathError::TransferIo {
                    path,
                    source: StoreError::io(
                        "transfer task",
                        std::io::Error::other("task ended without a result"),
                    ),
                },
            );
        }
    }

    fn into_report(self) -> TransferReport {
        let mut report = TransferReport::default();
        for job in self.jobs {
            match job.state {
                JobState::Done => {
                    report.bytes += job.info.nar_size;
                    report.transferred.push(job.info.path);
                }
                _ => {
                    let err = job.error.unwrap_or_else(|| PathError::TransferIo {
                        path: job.info.path.clone(),
                        source: StoreError::InvalidData(format!(
                            "job left in state {:?}",
                            job.state
                        )),
                    });
                    report.failures.push((job.info.path, err));
                }
            }
        }
        report
    }
}
