//! Shared helpers for pipeline scenarios driven by shell-script tools

use panelpress::{CliConverter, CliDownloader, CommandRunner, Config, JobController};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Downloader that writes one chapter directory of `pages` images per volume
///
/// Fails with exit status 3 for the volume named in `FAIL_VOLUME`.
pub const DOWNLOADER: &str = r#"#!/bin/sh
dest=""
volume="1"
while [ $# -gt 0 ]; do
  case "$1" in
    --path) dest="$2"; shift ;;
    --start-volume) volume="$2"; shift ;;
  esac
  shift
done
echo "fetching volume $volume"
if [ "$volume" = "FAIL_VOLUME" ]; then
  echo "volume $volume is unavailable" >&2
  exit 3
fi
mkdir -p "$dest/Ch. 1"
for page in 001 002 003; do
  printf jpeg > "$dest/Ch. 1/$page.jpg"
done
"#;

/// Converter that writes `<out>/<basename of last source>.mobi`
///
/// Fails the first `FAILURES` invocations, counted in `COUNTER`. Failed runs
/// leave `<out>/partial.mobi` behind when `PARTIAL` is 1.
pub const CONVERTER: &str = r#"#!/bin/sh
out=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -p|-f) shift ;;
    -m|-u) ;;
    *) last="$1" ;;
  esac
  shift
done
n=$(cat "COUNTER" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "COUNTER"
if [ "$n" -le FAILURES ]; then
  if [ PARTIAL = 1 ]; then
    printf half > "$out/partial.mobi"
  fi
  echo "conversion crashed" >&2
  exit 1
fi
printf mobi > "$out/$(basename "$last").mobi"
echo "converted $last"
"#;

pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub struct Harness {
    pub dir: TempDir,
    pub config: Arc<Config>,
    pub controller: JobController,
}

impl Harness {
    pub fn scratch_dir(&self) -> PathBuf {
        self.config.storage.scratch_dir.clone()
    }
}

/// Controller whose downloader fails `fail_volume` and whose converter fails
/// its first `converter_failures` runs
pub fn harness(fail_volume: Option<u32>, converter_failures: u32) -> Harness {
    build(fail_volume, converter_failures, false)
}

/// Like [`harness`], but every failed converter run leaves a partial document
pub fn harness_with_partial_output(converter_failures: u32) -> Harness {
    build(None, converter_failures, true)
}

fn build(fail_volume: Option<u32>, converter_failures: u32, partial: bool) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.scratch_dir = dir.path().join("scratch");
    config.storage.output_dir = dir.path().join("processed");
    config.storage.upload_dir = dir.path().join("uploads");
    config.retry.max_attempts = 3;
    config.retry.cooldown = Duration::ZERO;
    let config = Arc::new(config);

    let downloader_path = dir.path().join("fake-downloader.sh");
    let fail = fail_volume.map(|v| v.to_string()).unwrap_or_else(|| "none".into());
    write_script(&downloader_path, &DOWNLOADER.replace("FAIL_VOLUME", &fail));

    let converter_path = dir.path().join("fake-converter.sh");
    let counter = dir.path().join("converter-runs");
    write_script(
        &converter_path,
        &CONVERTER
            .replace("COUNTER", &counter.to_string_lossy())
            .replace("FAILURES", &converter_failures.to_string())
            .replace("PARTIAL", if partial { "1" } else { "0" }),
    );

    let runner = CommandRunner::from_config(&config.retry);
    let downloader = CliDownloader::new(&downloader_path, &downloader_path, runner.clone());
    let converter = CliConverter::new(&converter_path, runner);
    let controller = JobController::new(config.clone(), Arc::new(downloader), Arc::new(converter));

    Harness {
        dir,
        config,
        controller,
    }
}
