//! Snapshot published by the core loop and served by the status API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use catjam_engine::EngineStatus;
use chrono::{DateTime, Local};
use serde::Serialize;

/// How many warning lines the status API keeps around.
pub const WARNING_CAPACITY: usize = 50;

/// Bounded, shared buffer of recent WARN/ERROR lines.  Filled by the
/// logging layer, read by the core when it publishes a snapshot.
#[derive(Debug, Clone)]
pub struct WarningLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::with_capacity(WARNING_CAPACITY)
    }
}

impl WarningLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a line, dropping the oldest once full.
    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub recent_warnings: Vec<String>,
    /// `None` until the core has run its first tick.
    pub updated_at: Option<DateTime<Local>>,
}

impl StatusSnapshot {
    pub fn capture(engine: EngineStatus, warnings: &WarningLog) -> Self {
        Self {
            engine,
            recent_warnings: warnings.recent(),
            updated_at: Some(Local::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_log_is_bounded() {
        let log = WarningLog::with_capacity(3);
        for i in 0..5 {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.recent(), vec!["line 2", "line 3", "line 4"]);

        // clones share the buffer
        let reader = log.clone();
        log.push("line 5".to_string());
        assert_eq!(reader.recent().last().map(String::as_str), Some("line 5"));
    }

    #[test]
    fn test_snapshot_flattens_engine_status() {
        let log = WarningLog::default();
        log.push("12:00:00 [WARN] settings: fetch failed".to_string());
        let engine = EngineStatus {
            playing: true,
            track_key: Some("song__band".to_string()),
            ..EngineStatus::default()
        };

        let json = serde_json::to_value(StatusSnapshot::capture(engine, &log)).unwrap();
        assert_eq!(json["playing"], true);
        assert_eq!(json["track_key"], "song__band");
        assert_eq!(json["settings"]["enabled"], true);
        assert_eq!(json["recent_warnings"].as_array().map(Vec::len), Some(1));
        assert!(json["updated_at"].is_string());
    }
}
