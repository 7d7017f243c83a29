//! Line sinks
//!
//! Where state transitions and remote log lines go while a run is supervised.
//! The supervisor only formats lines; deciding what to do with them is the
//! caller's business.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

/// Destination for run output lines
pub trait LineSink: Send + Sync {
    /// Emits one already formatted line
    fn emit(&self, line: &str);
}

/// Forwards every line to `tracing` under the `sluice::job` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn emit(&self, line: &str) {
        info!(target: "sluice::job", "{}", line);
    }
}

/// Writes lines to stdout, one per line
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not fail the run
        let _ = writeln!(out, "{}", line);
    }
}

/// In-memory sink that can be drained
///
/// Clones share the same buffer, so one handle can be given to the runner and
/// another kept for reading.
#[derive(Debug, Clone, Default)]
pub struct BufferedSink {
    buffer: Arc<Mutex<Vec<String>>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all buffered lines and clears the buffer
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    /// Snapshot of the buffered lines
    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LineSink for BufferedSink {
    fn emit(&self, line: &str) {
        self.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_sink_drain() {
        let sink = BufferedSink::new();
        let reader = sink.clone();

        sink.emit("first");
        sink.emit("second");
        assert_eq!(reader.lines(), vec!["first", "second"]);

        assert_eq!(reader.drain().len(), 2);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<Arc<dyn LineSink>> = vec![
            Arc::new(TracingSink),
            Arc::new(BufferedSink::new()),
        ];
        for sink in sinks {
            sink.emit("run-1 | RUNNING | ");
        }
    }
}
