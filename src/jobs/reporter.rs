//! Progress reporting for one job
//!
//! Every event is recorded in the job store, sent on the job's event channel
//! and mirrored to `tracing`. A single reporter (and its clones) is the only
//! producer for a job, so the store log and the channel see the same order.

use super::store::JobStore;
use crate::runner::OutputSink;
use crate::types::{JobEvent, JobId, Stage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Producer side of a job's progress channel
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    store: Arc<JobStore>,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ProgressReporter {
    pub(crate) fn new(
        job_id: JobId,
        store: Arc<JobStore>,
        tx: mpsc::UnboundedSender<JobEvent>,
    ) -> Self {
        Self { job_id, store, tx }
    }

    /// Job this reporter belongs to
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Announce entry into a pipeline stage
    pub fn stage(&self, stage: Stage, detail: impl AsRef<str>) {
        let message = format!("{}: {}", stage, detail.as_ref());
        info!(job_id = %self.job_id, %stage, "{}", detail.as_ref());
        self.emit(JobEvent::Status(message));
    }

    /// Terminal success; `artifact` is the external artifact name
    pub fn done(&self, artifact: &str) {
        info!(job_id = %self.job_id, artifact, "job finished");
        if self.store.finish(self.job_id, artifact) {
            let _ = self.tx.send(JobEvent::Done(artifact.to_string()));
        }
    }

    /// Terminal failure
    pub fn fail(&self, message: &str) {
        error!(job_id = %self.job_id, error = message, "job failed");
        if self.store.fail(self.job_id, message) {
            let _ = self.tx.send(JobEvent::Error(message.to_string()));
        }
    }

    fn emit(&self, event: JobEvent) {
        if self.store.append(self.job_id, event.clone()) {
            // The consumer may have gone away (client disconnected); the store still has it
            let _ = self.tx.send(event);
        }
    }
}

impl OutputSink for ProgressReporter {
    fn log(&self, line: &str) {
        debug!(job_id = %self.job_id, "{}", line);
        self.emit(JobEvent::Log(line.to_string()));
    }

    fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "{}", message);
        self.emit(JobEvent::Warning(message.to_string()));
    }
}
