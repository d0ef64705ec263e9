//! Timestamped run log.
//!
//! Every stage of a preparation run writes human-readable report lines
//! through a [`RunLog`]. Each line is a `(timestamp, message)` pair rendered
//! as `YYYY-MM-DD HH:MM:SS - message`, which is also the format
//! [`parse_log`] reads back.

use crate::error::{PrepError, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::trace;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;
const SEPARATOR: &str = " - ";

/// File extensions treated as output artifacts when summarising a log.
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".dot", ".png", ".csv", ".json", ".log"];

/// A single log record with second granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl LogLine {
    pub fn new(timestamp: NaiveDateTime, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            message: message.into(),
        }
    }

    /// Parse a single `YYYY-MM-DD HH:MM:SS - message` line.
    pub fn parse(line: &str) -> Result<Self> {
        let head = line
            .get(..TIMESTAMP_LEN)
            .ok_or_else(|| PrepError::LogFormat(line.to_string()))?;
        let timestamp = NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT)
            .map_err(|_| PrepError::LogFormat(line.to_string()))?;

        let rest = &line[TIMESTAMP_LEN..];
        let message = if let Some(msg) = rest.strip_prefix(SEPARATOR) {
            msg
        } else if rest.trim_end() == SEPARATOR.trim_end() || rest.is_empty() {
            // writers that trim trailing whitespace turn "ts - " into "ts -"
            ""
        } else {
            return Err(PrepError::LogFormat(line.to_string()));
        };

        Ok(Self {
            timestamp,
            message: message.to_string(),
        })
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            SEPARATOR,
            self.message
        )
    }
}

/// Parse a whole log text. Lines without a leading timestamp continue the
/// previous message; leading orphan lines are rejected.
pub fn parse_log(text: &str) -> Result<Vec<LogLine>> {
    let mut lines: Vec<LogLine> = Vec::new();
    for raw in text.lines() {
        match LogLine::parse(raw) {
            Ok(line) => lines.push(line),
            Err(e) => match lines.last_mut() {
                Some(prev) => {
                    prev.message.push('\n');
                    prev.message.push_str(raw);
                }
                None if raw.trim().is_empty() => continue,
                None => return Err(e),
            },
        }
    }
    Ok(lines)
}

/// Shared, ordered recorder of report lines for one run.
///
/// Cloning yields another handle onto the same buffer so the analyzer and
/// the preprocessing stage can write into a single log.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message stamped with the current local time.
    pub fn log(&self, message: impl AsRef<str>) {
        self.log_at(Local::now().naive_local(), message);
    }

    /// Record a message with an explicit timestamp. Multi-line messages
    /// become one entry per line, all sharing the timestamp.
    pub fn log_at(&self, timestamp: NaiveDateTime, message: impl AsRef<str>) {
        let mut lines = self.lines.lock().unwrap();
        // keep the sequence non-decreasing even if the wall clock steps back
        let timestamp = match lines.last() {
            Some(last) if last.timestamp > timestamp => last.timestamp,
            _ => timestamp,
        };
        for part in message.as_ref().split('\n') {
            trace!(target: "causal_prep::run_log", "{}", part);
            lines.push(LogLine::new(timestamp, part));
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn render(&self) -> String {
        let lines = self.lines.lock().unwrap();
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let lines = parse_log(&text)?;
        Ok(Self {
            lines: Arc::new(Mutex::new(lines)),
        })
    }

    pub fn summary(&self) -> LogSummary {
        LogSummary::from_lines(&self.lines())
    }
}

/// Overview of a recorded run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub line_count: usize,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub elapsed_seconds: i64,
    pub artifacts: Vec<String>,
}

impl LogSummary {
    pub fn from_lines(lines: &[LogLine]) -> Self {
        let started_at = lines.first().map(|l| l.timestamp);
        let finished_at = lines.last().map(|l| l.timestamp);
        let elapsed_seconds = match (started_at, finished_at) {
            (Some(start), Some(end)) => (end - start).num_seconds(),
            _ => 0,
        };

        let mut artifacts: Vec<String> = Vec::new();
        for line in lines {
            for token in line.message.split_whitespace() {
                if let Some(artifact) = artifact_token(token) {
                    if !artifacts.contains(&artifact) {
                        artifacts.push(artifact);
                    }
                }
            }
        }

        Self {
            line_count: lines.len(),
            started_at,
            finished_at,
            elapsed_seconds,
            artifacts,
        }
    }
}

fn artifact_token(token: &str) -> Option<String> {
    let cleaned = token
        .trim_matches(|c| matches!(c, ',' | ';' | '(' | ')' | '[' | ']' | '\'' | '"' | '`'))
        .trim_end_matches('.');
    let lower = cleaned.to_ascii_lowercase();
    ARTIFACT_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
        .then(|| cleaned.to_string())
}
