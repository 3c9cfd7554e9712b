//! In-memory ring of recent log records for diagnostics bundles.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Bounded buffer of recent records; the oldest record is dropped first.
///
/// Cheap to clone: clones share the same storage.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<LogRecord>>>,
    capacity: usize,
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, record: LogRecord) {
        let mut q = self.inner.lock();
        while q.len() >= self.capacity {
            q.pop_front();
        }
        q.push_back(record);
    }

    /// Records oldest-first, optionally only those at exactly `level`.
    pub fn entries(&self, level: Option<Level>) -> Vec<LogRecord> {
        let q = self.inner.lock();
        match level {
            Some(level) => {
                let wanted = level.as_str();
                q.iter().filter(|r| r.level == wanted).cloned().collect()
            }
            None => q.iter().cloned().collect(),
        }
    }

    /// One line per record: `<timestamp> [<LEVEL>] [<target>]: <message>`.
    pub fn render_text(&self) -> String {
        let q = self.inner.lock();
        let mut out = String::new();
        for r in q.iter() {
            let _ = writeln!(
                out,
                "{} [{}] [{}]: {}",
                r.timestamp.to_rfc3339(),
                r.level,
                r.target,
                r.message
            );
        }
        out
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Layer feeding this buffer; filter it with the desired level when composing.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            buffer: self.clone(),
        }
    }
}

/// `tracing-subscriber` layer that copies every event into a [`LogBuffer`].
pub struct CaptureLayer {
    buffer: LogBuffer,
}

/// Collects `message` plus the remaining fields as `key=value` pairs.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogRecord {
            timestamp: Utc::now(),
            level: meta.level().as_str().to_string(),
            target: meta.target().to_string(),
            message: format!("{}{}", visitor.message, visitor.fields),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    fn record(level: &str, message: &str) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: "modreg::lifecycle".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn oldest_records_are_dropped() {
        let buf = LogBuffer::new(2);
        buf.push(record("INFO", "one"));
        buf.push(record("INFO", "two"));
        buf.push(record("WARN", "three"));

        let msgs: Vec<_> = buf.entries(None).into_iter().map(|r| r.message).collect();
        assert_eq!(msgs, vec!["two", "three"]);
    }

    #[test]
    fn entries_filter_by_exact_level() {
        let buf = LogBuffer::new(10);
        buf.push(record("INFO", "started"));
        buf.push(record("ERROR", "failed"));

        let errors = buf.entries(Some(Level::ERROR));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "failed");
        assert!(buf.entries(Some(Level::DEBUG)).is_empty());
    }

    #[test]
    fn render_text_format() {
        let buf = LogBuffer::new(10);
        buf.push(record("WARN", "Module not yet initialized"));
        let text = buf.render_text();
        assert!(text.contains(" [WARN] [modreg::lifecycle]: Module not yet initialized\n"));
    }

    #[test]
    fn layer_captures_message_and_fields() {
        let buf = LogBuffer::new(10);
        let subscriber = tracing_subscriber::registry().with(buf.layer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(module = "autocomplete", "Module not yet initialized");
        });

        let entries = buf.entries(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, "WARN");
        assert_eq!(
            entries[0].message,
            "Module not yet initialized module=autocomplete"
        );
    }
}
