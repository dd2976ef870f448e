//! Job controller and execution gate
//!
//! [`JobController::start`] validates a request, takes the single execution
//! gate without waiting and spawns the job's pipeline. If the gate is held
//! the request is rejected with [`Error::Busy`] before anything is created.
//!
//! ```text
//! start ──► validate ──► try_acquire gate ──► insert ──► spawn pipeline
//!               │              │                              │
//!               ▼              ▼                              ▼
//!        InvalidRequest       Busy            events ──► JobHandle (SPSC)
//! ```
//!
//! The spawned task holds the gate permit until the pipeline has ended and
//! its scratch space is gone, then emits the terminal `DONE` or `ERROR`.

mod artifacts;
mod pipeline;
mod reporter;
mod store;


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use artifacts::{Artifact, ArtifactRegistry};
pub use reporter::ProgressReporter;
pub use store::JobStore;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tools::{CliConverter, CliDownloader, Converter, Downloader};
use crate::types::{ContentSource, ConvertRequest, JobEvent, JobId, JobInfo};
use crate::utils;
use pipeline::Pipeline;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Consumer side of a started job
pub struct JobHandle {
    /// Identifier of the accepted job
    pub id: JobId,
    events: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    /// Next event, or `None` once the terminal event has been delivered
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Drain events until the terminal one, returning everything received
    pub async fn wait(mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    /// Events as a stream, for transports that forward them live
    pub fn into_stream(self) -> UnboundedReceiverStream<JobEvent> {
        UnboundedReceiverStream::new(self.events)
    }
}

/// Owns job lifecycles and the single execution gate
#[derive(Clone)]
pub struct JobController {
    config: Arc<Config>,
    downloader: Arc<dyn Downloader>,
    converter: Arc<dyn Converter>,
    store: Arc<JobStore>,
    artifacts: Arc<ArtifactRegistry>,
    gate: Arc<Semaphore>,
}

impl JobController {
    /// Create a controller with explicit tool adapters
    pub fn new(
        config: Arc<Config>,
        downloader: Arc<dyn Downloader>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        let store = Arc::new(JobStore::new(config.jobs.retain_finished));
        Self {
            config,
            downloader,
            converter,
            store,
            artifacts: Arc::new(ArtifactRegistry::new()),
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    /// Create a controller using the external CLI tools named in `config`
    pub fn from_config(config: Arc<Config>) -> Self {
        let downloader = Arc::new(CliDownloader::from_config(&config));
        let converter = Arc::new(CliConverter::from_config(&config));
        info!(
            downloader = downloader.name(),
            converter = converter.name(),
            "job controller using CLI tools"
        );
        Self::new(config, downloader, converter)
    }

    /// Accept a request and start its pipeline in the background
    ///
    /// Never waits: returns [`Error::Busy`] immediately if another job holds
    /// the gate. Must be called from within a Tokio runtime.
    pub fn start(&self, request: ConvertRequest) -> Result<JobHandle> {
        request.validate()?;
        if let Some(range) = request.range
            && range.len() > self.config.jobs.max_units
        {
            return Err(Error::InvalidRequest(format!(
                "volume range covers {} volumes, at most {} are allowed",
                range.len(),
                self.config.jobs.max_units
            )));
        }
        let permit = self.gate.clone().try_acquire_owned().map_err(|_| Error::Busy)?;

        let id = JobId::new();
        self.store.insert(id, request.title.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(id, self.store.clone(), tx);
        let scratch = self
            .config
            .storage
            .scratch_dir
            .join(format!("job-{}", id.short()));
        info!(job_id = %id, title = %request.title, "job accepted");

        let upload_dir = self.config.storage.upload_dir.clone();
        let local_input = match &request.source {
            ContentSource::Local { path } => Some(path.clone()),
            _ => None,
        };
        let pipeline = Pipeline {
            config: self.config.clone(),
            downloader: self.downloader.clone(),
            converter: self.converter.clone(),
            artifacts: self.artifacts.clone(),
            reporter: reporter.clone(),
            request,
            scratch: scratch.clone(),
        };

        let store = self.store.clone();
        let artifacts = self.artifacts.clone();
        tokio::spawn(async move {
            // Inner task so a panic anywhere in the pipeline still ends the job
            let result = tokio::spawn(pipeline.run()).await;

            if let Err(e) = utils::remove_dir_if_exists(&scratch).await {
                warn!(job_id = %id, error = %e, ?scratch, "failed to remove job scratch");
            }
            if let Some(input) = local_input {
                remove_upload(&input, &upload_dir).await;
            }
            drop(permit);

            match result {
                Ok(Ok(artifact)) => reporter.done(&artifact),
                Ok(Err(e)) => reporter.fail(&e.to_string()),
                Err(e) => reporter.fail(&format!("pipeline aborted: {}", e)),
            }
            release_evicted(&store, &artifacts).await;
        });

        Ok(JobHandle { id, events: rx })
    }

    /// Whether a job currently holds the gate
    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Snapshot of a job
    pub fn job(&self, id: JobId) -> Result<JobInfo> {
        self.store
            .get(id)
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// Events of a job after the first `offset`
    pub fn events_since(&self, id: JobId, offset: usize) -> Result<Vec<JobEvent>> {
        self.store
            .events_since(id, offset)
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// All retained jobs, newest first
    pub fn jobs(&self) -> Vec<JobInfo> {
        self.store.list()
    }

    /// Look up a delivered artifact by external name
    pub fn artifact(&self, name: &str) -> Result<Artifact> {
        self.artifacts
            .resolve(name)
            .ok_or_else(|| Error::ArtifactNotFound(name.to_string()))
    }

    /// Configuration the controller runs with
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Delete the artifacts of jobs the store no longer retains
async fn release_evicted(store: &JobStore, artifacts: &ArtifactRegistry) {
    for job_id in store.take_evicted() {
        for artifact in artifacts.remove_job(job_id) {
            match tokio::fs::remove_file(&artifact.path).await {
                Ok(()) => debug!(%job_id, path = ?artifact.path, "deleted evicted artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    %job_id,
                    path = ?artifact.path,
                    error = %e,
                    "failed to delete evicted artifact"
                ),
            }
        }
    }
}

/// Remove a consumed upload, but only if it lives under the upload directory
async fn remove_upload(input: &Path, upload_dir: &Path) {
    let (Ok(input_abs), Ok(upload_abs)) =
        (std::path::absolute(input), std::path::absolute(upload_dir))
    else {
        return;
    };
    if !input_abs.starts_with(&upload_abs) || input_abs == upload_abs {
        return;
    }
    let removed = if input_abs.is_dir() {
        utils::remove_dir_if_exists(&input_abs).await
    } else {
        match tokio::fs::remove_file(&input_abs).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Error::Io(e)),
            _ => Ok(()),
        }
    };
    if let Err(e) = removed {
        warn!(path = ?input_abs, error = %e, "failed to remove consumed upload");
    }
}
