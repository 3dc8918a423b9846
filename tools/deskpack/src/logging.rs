use crate::errors::DeskpackError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const RUN_LOG_PREFIX: &str = "run-";
const RUN_LOG_SUFFIX: &str = ".jsonl";

static RUN_LOG: OnceLock<Mutex<Option<JsonlLogger>>> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), DeskpackError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DeskpackError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| DeskpackError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| DeskpackError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| DeskpackError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| DeskpackError::Io(e.to_string()))
    }
}

/// Opens a fresh per-run log file under `dir` and routes `append_run_log` to it.
pub fn init_run_log(
    dir: &Path,
    started_at: SystemTime,
    keep_runs: usize,
    max_payload_bytes: usize,
) -> Result<PathBuf, DeskpackError> {
    fs::create_dir_all(dir).map_err(|e| DeskpackError::Io(e.to_string()))?;
    let path = dir.join(run_log_name(started_at));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| DeskpackError::Io(e.to_string()))?;

    let mut logger = JsonlLogger::new(&path);
    logger.max_payload_bytes = max_payload_bytes;
    let sink = RUN_LOG.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = sink.lock() {
        *slot = Some(logger);
    }
    // The new log sorts last, so it always survives.
    let _ = prune_run_logs(dir, keep_runs)?;
    Ok(path)
}

/// Best-effort structured event; silently dropped when no run log is open.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let Some(sink) = RUN_LOG.get() else {
        return;
    };
    let Ok(slot) = sink.lock() else {
        return;
    };
    if let Some(logger) = slot.as_ref() {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

/// Deletes the oldest run logs in `dir` so at most `keep` remain.
pub fn prune_run_logs(dir: &Path, keep: usize) -> Result<Vec<PathBuf>, DeskpackError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|e| DeskpackError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_run_log(path))
        .collect::<Vec<_>>();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    let mut deleted = Vec::with_capacity(excess);
    for path in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|e| DeskpackError::Io(e.to_string()))?;
        deleted.push(path);
    }
    Ok(deleted)
}

/// `run-<secs>-<nanos>-<pid>.jsonl`; fixed-width time fields keep name order chronological.
fn run_log_name(started_at: SystemTime) -> String {
    let since_epoch = started_at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!(
        "{RUN_LOG_PREFIX}{:012}-{:09}-{}{RUN_LOG_SUFFIX}",
        since_epoch.as_secs(),
        since_epoch.subsec_nanos(),
        std::process::id()
    )
}

fn is_run_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(RUN_LOG_PREFIX) && name.ends_with(RUN_LOG_SUFFIX))
        .unwrap_or(false)
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{
        append_run_log, init_run_log, prune_run_logs, run_log_name, truncate_json, JsonlLogger,
        LogEvent,
    };
    use crate::runtime::{Clock, FakeClock};
    use serde_json::json;
    use std::fs;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("run.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "compile.started",
                payload: json!({"sources": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");
        logger
            .append(&LogEvent {
                level: "debug",
                event_type: "compile.finished",
                payload: json!({}),
            })
            .expect("append");

        let text = fs::read_to_string(&path).expect("read");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event_type\":\"compile.started\""));
        assert!(lines[0].contains("..."));
        assert!(lines[1].contains("\"payload\":{}"));
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let value = truncate_json(json!("èèèèèèèèèè"), 8);
        let text = value.as_str().expect("string");
        assert!(text.ends_with("..."));
    }

    #[test]
    fn prune_keeps_newest_run_logs_and_ignores_other_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for secs in [1, 2, 3] {
            fs::write(dir.path().join(format!("run-{secs:012}.jsonl")), "{}\n").expect("log");
        }
        fs::write(dir.path().join("notes.txt"), "keep me").expect("notes");

        let deleted = prune_run_logs(dir.path(), 1).expect("pruned");
        assert_eq!(deleted.len(), 2);
        assert!(deleted[0].ends_with("run-000000000001.jsonl"));
        assert!(dir.path().join("run-000000000003.jsonl").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn run_log_names_separate_runs_within_one_second() {
        let first = run_log_name(UNIX_EPOCH + Duration::from_millis(5_100));
        let second = run_log_name(UNIX_EPOCH + Duration::from_millis(5_600));
        assert_ne!(first, second);
        assert!(first < second);
        assert!(first.starts_with("run-000000000005-100000000-"));
    }

    #[test]
    fn back_to_back_runs_each_get_a_log_and_old_ones_are_pruned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = FakeClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let mut paths = Vec::new();
        for _ in 0..3 {
            let path = init_run_log(dir.path(), clock.now(), 2, 4096).expect("init");
            append_run_log("info", "run.started", json!({}));
            paths.push(path);
            clock.advance(Duration::from_millis(250));
        }

        assert!(!paths[0].exists());
        assert!(paths[1].is_file());
        assert!(paths[2].is_file());
        let logs = fs::read_dir(dir.path()).expect("log dir").count();
        assert_eq!(logs, 2);
    }
}
