//! CLI converter using the external `kcc-c2e` binary

use super::traits::{ConversionTarget, Converter};
use crate::runner::{CommandRunner, CommandSpec, OutputSink, RunOutcome};
use async_trait::async_trait;
use std::path::PathBuf;

/// Converter that shells out to Kindle Comic Converter's `kcc-c2e`
pub struct CliConverter {
    binary_path: PathBuf,
    runner: CommandRunner,
}

impl CliConverter {
    /// Create a converter with an explicit binary path
    pub fn new(binary_path: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            binary_path: binary_path.into(),
            runner,
        }
    }

    /// Build the argument vector: `-p <profile> -f <format> -o <dir> [-m] [-u] <sources>...`
    pub fn command_for(&self, target: &ConversionTarget) -> CommandSpec {
        let mut spec = CommandSpec::new("converter", &self.binary_path)
            .arg("-p")
            .arg(&target.profile)
            .arg("-f")
            .arg(&target.format)
            .arg("-o")
            .arg(&target.output_dir)
            .fresh_dir(&target.output_dir);
        if target.manga_mode {
            spec = spec.arg("-m");
        }
        if target.upscale {
            spec = spec.arg("-u");
        }
        spec.args(&target.sources)
    }
}

#[async_trait]
impl Converter for CliConverter {
    async fn convert(&self, target: &ConversionTarget, sink: &dyn OutputSink) -> RunOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&target.output_dir).await {
            sink.warning(&format!(
                "cannot create output directory {}: {}",
                target.output_dir.display(),
                e
            ));
            return RunOutcome {
                succeeded: false,
                attempts: 0,
            };
        }
        self.runner.run(&self.command_for(target), sink).await
    }

    fn name(&self) -> &'static str {
        "kcc-c2e"
    }
}
