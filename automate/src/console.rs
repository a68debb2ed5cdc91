use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{error, info, warn};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// A single line shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Operator-facing log. Keeps the newest `capacity` entries and mirrors each
/// one to `tracing`.
#[derive(Debug, Clone)]
pub struct Console {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message.into());
    }

    pub fn push(&mut self, level: Level, message: String) {
        match level {
            Level::Info => info!(target: "automate::console", "{}", message),
            Level::Warn => warn!(target: "automate::console", "{}", message),
            Level::Error => error!(target: "automate::console", "{}", message),
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: Local::now(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Messages without timestamps, oldest first.
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_format() {
        let mut console = Console::default();
        console.log("Added Click");
        let line = console.last().unwrap().to_string();

        // "[HH:MM:SS] Added Click"
        assert_eq!(line.len(), "[00:00:00] Added Click".len());
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] Added Click");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut console = Console::new(2);
        console.log("one");
        console.warn("two");
        console.error("three");
        assert_eq!(console.messages(), vec!["two", "three"]);
        assert_eq!(console.last().unwrap().level, Level::Error);
    }
}
