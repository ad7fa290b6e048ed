//! Log entries and their line format
//!
//! ```text
//! 2024-05-01 10:00:00 +02:00>  (p) 12 units executed, 40 rows affected.
//! 2024-05-01 10:00:03 +02:00>  (n) database is locked; retry in 3 seconds...
//! ```

use std::fmt;

use chrono::{DateTime, FixedOffset, Local};

/// chrono format of the leading timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Progress,
    Notification,
}

impl LogKind {
    pub fn marker(&self) -> char {
        match self {
            LogKind::Progress => 'p',
            LogKind::Notification => 'n',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'p' => Some(LogKind::Progress),
            'n' => Some(LogKind::Notification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    Progress {
        executed_units: u64,
        affected_rows: u64,
    },
    Notification(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<FixedOffset>,
    payload: LogPayload,
}

impl LogEntry {
    /// Cumulative counters, stamped with the current local time
    pub fn progress(executed_units: u64, affected_rows: u64) -> Self {
        Self {
            timestamp: now(),
            payload: LogPayload::Progress {
                executed_units,
                affected_rows,
            },
        }
    }

    /// Free-form message, stamped with the current local time.
    ///
    /// Line breaks are folded into spaces so the entry stays on one line.
    pub fn notification(message: impl Into<String>) -> Self {
        let message: String = message.into();
        let message = if message.contains(['\n', '\r']) {
            message
                .split(['\n', '\r'])
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            message
        };

        Self {
            timestamp: now(),
            payload: LogPayload::Notification(message),
        }
    }

    /// Replace the timestamp, truncated to whole seconds like the line format
    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = truncate_to_seconds(timestamp);
        self
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    pub fn payload(&self) -> &LogPayload {
        &self.payload
    }

    pub fn kind(&self) -> LogKind {
        match self.payload {
            LogPayload::Progress { .. } => LogKind::Progress,
            LogPayload::Notification(_) => LogKind::Notification,
        }
    }

    pub fn message(&self) -> String {
        match &self.payload {
            LogPayload::Progress {
                executed_units,
                affected_rows,
            } => format!("{} units executed, {} rows affected.", executed_units, affected_rows),
            LogPayload::Notification(message) => message.clone(),
        }
    }

    pub fn render_line(&self) -> String {
        format!(
            "{}>  ({}) {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.kind().marker(),
            self.message()
        )
    }

    /// Parse one rendered line back into an entry.
    ///
    /// The error is a short reason suitable for
    /// [`RunnerError::LogParse`](crate::RunnerError::LogParse).
    pub fn parse_line(line: &str) -> Result<Self, String> {
        if line.trim().is_empty() {
            return Err("line is blank".to_string());
        }

        let (stamp, rest) = line
            .split_once('>')
            .ok_or_else(|| "missing '>' after timestamp".to_string())?;
        let timestamp = DateTime::parse_from_str(stamp.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid timestamp '{}': {}", stamp.trim(), e))?;

        let rest = rest.trim_start();
        let mut chars = rest.chars();
        let (Some('('), Some(marker), Some(')')) = (chars.next(), chars.next(), chars.next()) else {
            return Err("expected a '(x)' kind marker".to_string());
        };
        let kind = LogKind::from_marker(marker)
            .ok_or_else(|| format!("unknown kind marker '{}'", marker))?;
        let body = chars.as_str();
        let body = body.strip_prefix(' ').unwrap_or(body);

        let payload = match kind {
            LogKind::Notification => LogPayload::Notification(body.to_string()),
            LogKind::Progress => parse_progress(body)?,
        };

        Ok(Self { timestamp, payload })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_line())
    }
}

fn parse_progress(body: &str) -> Result<LogPayload, String> {
    let malformed = || format!("malformed progress message '{}'", body);

    let (units, rest) = body.split_once(" units executed, ").ok_or_else(malformed)?;
    let rows = rest.strip_suffix(" rows affected.").ok_or_else(malformed)?;

    Ok(LogPayload::Progress {
        executed_units: units.trim().parse().map_err(|_| malformed())?,
        affected_rows: rows.trim().parse().map_err(|_| malformed())?,
    })
}

fn now() -> DateTime<FixedOffset> {
    truncate_to_seconds(Local::now().fixed_offset())
}

fn truncate_to_seconds(timestamp: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    use chrono::Timelike;
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}
