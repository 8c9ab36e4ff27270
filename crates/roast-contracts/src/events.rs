use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

pub const ROAST_STARTED: &str = "roast_started";
pub const IMAGE_ENCODED: &str = "image_encoded";
pub const GATEWAY_REQUEST: &str = "gateway_request";
pub const GATEWAY_RESPONSE: &str = "gateway_response";
pub const ROAST_COMPLETED: &str = "roast_completed";
pub const ROAST_FAILED: &str = "roast_failed";
pub const SESSION_STATE: &str = "session_state";

/// Append-only JSONL log of roast lifecycle events.
///
/// - default fields are `type`, `run_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
///
/// A disabled writer builds events the same way but never touches disk.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self::with_path(Some(path.into()), run_id.into())
    }

    pub fn disabled(run_id: impl Into<String>) -> Self {
        Self::with_path(None, run_id.into())
    }

    fn with_path(path: Option<PathBuf>, run_id: String) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path,
                run_id,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_ref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    /// Emits and swallows write failures; the event log never fails a roast.
    pub fn emit_quiet(&self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.emit(event_type, payload) {
            eprintln!("roast event log write failed ({event_type}): {err:#}");
        }
    }
}

/// Reads every event back from a JSONL log, skipping malformed lines.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "roast-123");

        let mut payload = EventPayload::new();
        payload.insert("mime_type".to_string(), Value::String("image/png".to_string()));
        let emitted = writer.emit(ROAST_STARTED, payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("roast_started".to_string()));
        assert_eq!(parsed["run_id"], Value::String("roast-123".to_string()));
        assert_eq!(parsed["mime_type"], Value::String("image/png".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let writer = EventWriter::disabled("roast-123");

        let mut payload = EventPayload::new();
        payload.insert("run_id".to_string(), Value::String("override".to_string()));
        let emitted = writer.emit(ROAST_FAILED, payload)?;

        assert_eq!(emitted["type"], Value::String("roast_failed".to_string()));
        assert_eq!(emitted["run_id"], Value::String("override".to_string()));
        Ok(())
    }

    #[test]
    fn disabled_writer_never_creates_a_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::disabled("roast-123");
        writer.emit(ROAST_STARTED, EventPayload::new())?;
        assert!(writer.path().is_none());
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn emit_appends_lines_and_read_events_returns_them_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "roast-123");

        writer.emit(ROAST_STARTED, EventPayload::new())?;
        writer.emit_quiet(ROAST_COMPLETED, EventPayload::new());
        fs::write(
            &path,
            format!("{}not json\n", fs::read_to_string(&path)?),
        )?;

        let events = read_events(&path)?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], Value::String("roast_started".to_string()));
        assert_eq!(events[1]["type"], Value::String("roast_completed".to_string()));
        Ok(())
    }
}
