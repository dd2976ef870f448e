//! In-memory job records
//!
//! Records are created when a request is accepted, appended to while the
//! pipeline runs and frozen once the job is terminal. Terminal jobs beyond
//! the retention limit are evicted oldest first; running jobs never are.

use crate::types::{JobEvent, JobId, JobInfo, JobStatus};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, JobInfo>,
    /// Terminal jobs in the order they finished
    finished: VecDeque<JobId>,
    /// Evicted jobs whose artifacts have not been released yet
    evicted: Vec<JobId>,
}

/// Job identifier to job record mapping
pub struct JobStore {
    inner: RwLock<Inner>,
    retain_finished: usize,
}

impl JobStore {
    /// Create a store keeping at most `retain_finished` terminal jobs
    pub fn new(retain_finished: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            retain_finished,
        }
    }

    // A poisoned lock only means a writer panicked mid-update; the map itself is still usable
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a newly accepted job in the `running` state
    pub fn insert(&self, id: JobId, title: impl Into<String>) -> JobInfo {
        let info = JobInfo {
            id,
            title: title.into(),
            status: JobStatus::Running,
            log: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.write().jobs.insert(id, info.clone());
        info
    }

    /// Append a non-terminal event; returns whether it was recorded
    pub fn append(&self, id: JobId, event: JobEvent) -> bool {
        if event.is_terminal() {
            warn!(job_id = %id, kind = event.kind(), "terminal events go through finish or fail");
            return false;
        }
        let mut inner = self.write();
        match inner.jobs.get_mut(&id) {
            Some(job) if !job.status.is_terminal() => {
                job.log.push(event);
                true
            }
            Some(_) => {
                warn!(job_id = %id, "ignoring event for terminal job");
                false
            }
            None => {
                warn!(job_id = %id, "ignoring event for unknown job");
                false
            }
        }
    }

    /// Mark the job finished with its artifact name; returns whether it changed
    pub fn finish(&self, id: JobId, artifact: impl Into<String>) -> bool {
        let artifact = artifact.into();
        self.conclude(id, JobStatus::Finished, JobEvent::Done(artifact.clone()), |job| {
            job.result = Some(artifact)
        })
    }

    /// Mark the job failed with a description; returns whether it changed
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.conclude(id, JobStatus::Failed, JobEvent::Error(error.clone()), |job| {
            job.error = Some(error)
        })
    }

    fn conclude(
        &self,
        id: JobId,
        status: JobStatus,
        event: JobEvent,
        set: impl FnOnce(&mut JobInfo),
    ) -> bool {
        let mut inner = self.write();
        let Some(job) = inner.jobs.get_mut(&id) else {
            warn!(job_id = %id, "cannot conclude unknown job");
            return false;
        };
        if job.status.is_terminal() {
            warn!(job_id = %id, "job already concluded");
            return false;
        }
        job.status = status;
        job.log.push(event);
        job.finished_at = Some(Utc::now());
        set(job);

        inner.finished.push_back(id);
        while inner.finished.len() > self.retain_finished {
            if let Some(evicted) = inner.finished.pop_front() {
                inner.jobs.remove(&evicted);
                inner.evicted.push(evicted);
                debug!(job_id = %evicted, "evicted finished job");
            }
        }
        true
    }

    /// Snapshot of one job
    pub fn get(&self, id: JobId) -> Option<JobInfo> {
        self.read().jobs.get(&id).cloned()
    }

    /// Events recorded after the first `offset` ones
    pub fn events_since(&self, id: JobId, offset: usize) -> Option<Vec<JobEvent>> {
        self.read()
            .jobs
            .get(&id)
            .map(|job| job.log.iter().skip(offset).cloned().collect())
    }

    /// Take the ids evicted since the last call
    pub fn take_evicted(&self) -> Vec<JobId> {
        std::mem::take(&mut self.write().evicted)
    }

    /// Every stored job, newest first
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<_> = self.read().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }
}
