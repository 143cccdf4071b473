// crates/lti-toolbox/src/log.rs
// ============================================================================
// Module: Tool Log
// Description: Two-stage JSON-lines log for tool configuration events.
// Purpose: Buffer records until the log file is known, then write through.
// Dependencies: serde, serde_json, thiserror, lti-toolbox-core
// ============================================================================

//! ## Overview
//! The loader wants to log before it has resolved where the log lives. A
//! [`ToolLog`] starts in a buffering stage and collects records in memory.
//! [`ToolLog::go_live`] is a one-way transition: it flushes the buffer in
//! order and from then on every record is appended to the sink as a single
//! JSON line.
//!
//! Write failures after the transition are swallowed; logging never fails a
//! request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use lti_toolbox_core::ToolId;
use lti_toolbox_core::time::now_unix_millis;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Routine progress.
    Info,
    /// Noteworthy but expected.
    Notice,
    /// Something was skipped or rejected.
    Warning,
    /// An operation failed.
    Error,
}

/// One JSON-lines log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Creation time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Severity.
    pub level: LogLevel,
    /// Tool the record belongs to, once known.
    pub tool_id: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// Tool log errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The log already transitioned to its live stage.
    #[error("tool log is already live")]
    AlreadyLive,
    /// The sink could not be opened or written.
    #[error("tool log write failed: {0}")]
    Write(String),
}

/// Stage of the log.
enum Stage {
    /// Records are held until a sink is attached.
    Buffering(Vec<LogRecord>),
    /// Records are appended to the sink.
    Live(Box<dyn Write + Send>),
}

/// Mutable log state behind the mutex.
struct LogState {
    /// Current stage.
    stage: Stage,
    /// Tool id stamped onto new records.
    tool_id: Option<String>,
}

/// Two-stage tool log.
///
/// # Invariants
/// - Records reach the sink in emission order, buffered ones first.
/// - The buffering to live transition happens at most once.
pub struct ToolLog {
    /// Guarded log state.
    state: Mutex<LogState>,
}

impl fmt::Debug for ToolLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolLog")
            .field("live", &self.is_live())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for ToolLog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tool Log
// ============================================================================

impl ToolLog {
    /// Creates a log in the buffering stage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                stage: Stage::Buffering(Vec::new()),
                tool_id: None,
            }),
        }
    }

    /// Stamps subsequent records with `tool_id`.
    pub fn bind_tool(&self, tool_id: &ToolId) {
        if let Ok(mut state) = self.state.lock() {
            state.tool_id = Some(tool_id.to_string());
        }
    }

    /// Emits a record at `level`.
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let record = LogRecord {
            timestamp_ms: now_unix_millis(),
            level,
            tool_id: state.tool_id.clone(),
            message: message.into(),
        };
        match &mut state.stage {
            Stage::Buffering(pending) => pending.push(record),
            Stage::Live(sink) => {
                let _ = write_record(sink.as_mut(), &record);
            }
        }
    }

    /// Emits an info record.
    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    /// Emits a notice record.
    pub fn notice(&self, message: impl Into<String>) {
        self.record(LogLevel::Notice, message);
    }

    /// Emits a warning record.
    pub fn warning(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message);
    }

    /// Emits an error record.
    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    /// Attaches `sink`, flushes buffered records in order, and goes live.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::AlreadyLive`] on a second transition and
    /// [`LogError::Write`] when the buffered records cannot be written.
    pub fn go_live(&self, mut sink: Box<dyn Write + Send>) -> Result<(), LogError> {
        let mut state =
            self.state.lock().map_err(|_| LogError::Write("mutex poisoned".to_string()))?;
        let Stage::Buffering(pending) = &mut state.stage else {
            return Err(LogError::AlreadyLive);
        };
        let pending = std::mem::take(pending);
        let flushed = pending.iter().try_for_each(|record| write_record(sink.as_mut(), record));
        state.stage = Stage::Live(sink);
        flushed
    }

    /// Opens `path` for appending as a log sink.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Write`] when the file cannot be opened.
    pub fn open_file_sink(path: &Path) -> Result<File, LogError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| LogError::Write(format!("{}: {err}", path.display())))
    }

    /// Returns true once the log writes through to a sink.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.lock().is_ok_and(|state| matches!(state.stage, Stage::Live(_)))
    }

    /// Returns the number of records waiting for a sink.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().map_or(0, |state| match &state.stage {
            Stage::Buffering(pending) => pending.len(),
            Stage::Live(_) => 0,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes one record as a JSON line and flushes.
fn write_record(sink: &mut dyn Write, record: &LogRecord) -> Result<(), LogError> {
    let payload = serde_json::to_string(record).map_err(|err| LogError::Write(err.to_string()))?;
    writeln!(sink, "{payload}").map_err(|err| LogError::Write(err.to_string()))?;
    sink.flush().map_err(|err| LogError::Write(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
