//! Structured event log.
//!
//! The event log is the contract with the external replay/animation tools:
//! an ordered sequence of `(time, category, payload)` records written as one
//! JSON object per line. Category strings and payload field names are
//! bit-exact; consumers match on them directly.
//!
//! The logger is an explicit handle with lifecycle `open → append* → close`,
//! scoped to one simulation run and injected into the engine at
//! construction. There is no process-wide sink.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::SimTime;

/// Record categories recognized by the replay tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Node appears: `{event: "START", id, name, x, y, capacity, used}`.
    Config,
    /// Link transition: `{event: "UP"|"DOWN", nodes: [a, b]}`.
    Link,
    /// Position update: `{event: "SET", id, x, y}`.
    Move,
    /// Store usage update: `{id, used, capacity}`.
    Store,
    /// Bundle transfer: `{event: "TX"|"RX", src, dst}`.
    Router,
}

impl Category {
    /// The exact category string written to the log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Config => "CONFIG",
            Category::Link => "LINK",
            Category::Move => "MOVE",
            Category::Store => "STORE",
            Category::Router => "ROUTER",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIG" => Ok(Category::Config),
            "LINK" => Ok(Category::Link),
            "MOVE" => Ok(Category::Move),
            "STORE" => Ok(Category::Store),
            "ROUTER" => Ok(Category::Router),
            other => Err(format!("unknown event category '{other}'")),
        }
    }
}

/// Append-only event sink with category filtering.
pub struct EventLogger {
    sink: Option<Box<dyn Write + Send>>,
    filter: HashSet<Category>,
    records_written: u64,
}

impl EventLogger {
    /// A logger that drops everything (logging disabled).
    pub fn disabled() -> Self {
        Self {
            sink: None,
            filter: HashSet::new(),
            records_written: 0,
        }
    }

    /// Opens a logger writing to an arbitrary sink.
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Some(writer),
            filter: HashSet::new(),
            records_written: 0,
        }
    }

    /// Opens a logger writing JSON lines to `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::to_writer(Box::new(BufWriter::new(file))))
    }

    /// Restricts logging to the given categories (empty set keeps all).
    pub fn with_filter(mut self, filter: impl IntoIterator<Item = Category>) -> Self {
        self.filter = filter.into_iter().collect();
        self
    }

    /// True when records are being written.
    pub fn is_logging(&self) -> bool {
        self.sink.is_some()
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one record. Payload fields are flattened next to `time` and
    /// `category`, matching the consumer format. Skipped when the category
    /// is filtered out or the logger is disabled.
    pub fn log(&mut self, time: SimTime, category: Category, payload: serde_json::Value) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if !self.filter.is_empty() && !self.filter.contains(&category) {
            return;
        }

        let mut record = json!({
            "time": time,
            "category": category.as_str(),
        });
        if let (Some(obj), Some(fields)) = (record.as_object_mut(), payload.as_object()) {
            for (k, v) in fields {
                obj.insert(k.clone(), v.clone());
            }
        }

        // A full sink is not worth aborting a run over; report and move on.
        if let Err(e) = writeln!(sink, "{record}") {
            tracing::warn!("event log write failed: {e}");
        }
        self.records_written += 1;
    }

    /// Flushes and closes the sink. Further records are dropped.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                tracing::warn!("event log flush failed: {e}");
            }
        }
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::disabled()
    }
}
