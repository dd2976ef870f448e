//! Registry of delivered artifacts
//!
//! Maps an artifact's external name to its stored location and the file name
//! the caller should see. Names are never decoded by slicing.

use crate::types::JobId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// A packaged file available for retrieval
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Job that produced it
    pub job_id: JobId,
    /// Location inside the output directory
    pub path: PathBuf,
    /// Download file name presented to the caller
    pub display_name: String,
}

/// External artifact name to artifact mapping
#[derive(Default)]
pub struct ArtifactRegistry {
    entries: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stored artifact and return its external name
    ///
    /// The name is `<job-id>_<display-name>`.
    pub fn register(
        &self,
        job_id: JobId,
        path: impl Into<PathBuf>,
        display_name: impl Into<String>,
    ) -> String {
        let artifact = Artifact {
            job_id,
            path: path.into(),
            display_name: display_name.into(),
        };
        let name = format!("{}_{}", job_id, artifact.display_name);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone(), artifact);
        name
    }

    /// Look up an artifact by external name
    pub fn resolve(&self, name: &str) -> Option<Artifact> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Forget every artifact of `job_id` and return them
    ///
    /// Stored files are left in place; deleting them is up to the caller.
    pub fn remove_job(&self, job_id: JobId) -> Vec<Artifact> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let names: Vec<String> = entries
            .iter()
            .filter(|(_, artifact)| artifact.job_id == job_id)
            .map(|(name, _)| name.clone())
            .collect();
        names
            .iter()
            .filter_map(|name| entries.remove(name))
            .collect()
    }

    /// Number of registered artifacts
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
