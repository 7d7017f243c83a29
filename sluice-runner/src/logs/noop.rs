use async_trait::async_trait;
use sluice_core::domain::log::LogLine;

use super::LogConsumer;

/// Used when a run has no resolvable log destination
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogConsumer;

#[async_trait]
impl LogConsumer for NoopLogConsumer {
    async fn next_batch(&mut self) -> Vec<LogLine> {
        Vec::new()
    }
}
