//! Log domain types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a remote log line came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogSource {
    /// Producer of the output, e.g. `SPARK_DRIVER` or `SPARK_EXECUTOR/1`
    pub name: String,
    /// Stream identifier, e.g. `stdout` or `stderr`
    pub stream: String,
}

/// One line of remote log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub source: LogSource,
    pub message: String,
}

impl LogLine {
    pub fn new(source: LogSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.source.name, self.source.stream, self.message
        )
    }
}
