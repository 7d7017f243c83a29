use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use sluice_client::{ObjectStore, ObjectSummary};
use sluice_core::ObjectUri;
use sluice_core::domain::log::{LogLine, LogSource};
use sluice_core::domain::run::RunHandle;
use tracing::debug;

use super::LogConsumer;

const GZIP_SUFFIX: &str = ".gz";
const STREAMS: &[&str] = &["stdout", "stderr"];

/// Read position within one log object
#[derive(Debug, Clone, Default)]
struct ObjectCursor {
    size: u64,
    etag: Option<String>,
    emitted: usize,
    /// Trailing text not yet terminated by a newline
    tail: Option<String>,
}

/// Reads log objects the service ships to the object store
///
/// Objects live under
/// `{log_uri}/applications/{app}/jobs/{run}/{SOURCE...}/{stdout|stderr}[.gz]`
/// and are rewritten in place as the run progresses, so each object is
/// re-read when its size or ETag changes and only lines past the ones
/// already emitted are returned. An unterminated last line is held back
/// until its newline arrives or the consumer is drained.
pub struct ObjectLogConsumer {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectUri,
    cursors: HashMap<String, ObjectCursor>,
}

impl ObjectLogConsumer {
    pub fn new(store: Arc<dyn ObjectStore>, log_uri: &ObjectUri, handle: &RunHandle) -> Self {
        let prefix = log_uri
            .join("applications")
            .join(&handle.application_id)
            .join("jobs")
            .join(&handle.run_id);

        Self {
            store,
            prefix,
            cursors: HashMap::new(),
        }
    }

    /// Prefix below which this run's log objects live
    pub fn prefix(&self) -> &ObjectUri {
        &self.prefix
    }

    async fn list_all(&self) -> sluice_client::Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .store
                .list_objects(&self.prefix, continuation.as_deref())
                .await?;
            objects.extend(page.objects);

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn is_unchanged(&self, object: &ObjectSummary) -> bool {
        self.cursors
            .get(&object.key)
            .is_some_and(|cursor| cursor.size == object.size && cursor.etag == object.etag)
    }

    /// Lines past each object's cursor; `flush` also releases unterminated tails
    async fn read(&mut self, flush: bool) -> Vec<LogLine> {
        let objects = match self.list_all().await {
            Ok(objects) => objects,
            Err(e) => {
                debug!("Failed to list logs under {}: {}", self.prefix, e);
                return Vec::new();
            }
        };

        let mut batch = Vec::new();
        for object in objects {
            let Some(source) = parse_source(&self.prefix.prefix(), &object.key) else {
                continue;
            };
            if self.is_unchanged(&object) {
                if flush {
                    if let Some(cursor) = self.cursors.get_mut(&object.key) {
                        if let Some(tail) = cursor.tail.take() {
                            batch.push(LogLine::new(source, tail));
                            cursor.emitted += 1;
                        }
                    }
                }
                continue;
            }

            let uri = self.prefix.with_key(object.key.clone());
            let body = match self.store.get_object(&uri).await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Failed to fetch log object {}: {}", uri, e);
                    continue;
                }
            };
            let text = match decode(&object.key, body) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Failed to decode log object {}: {}", uri, e);
                    continue;
                }
            };

            let cursor = self.cursors.entry(object.key.clone()).or_default();
            let (complete, tail) = split_tail(&text);
            let lines: Vec<&str> = complete.lines().collect();
            batch.extend(
                lines
                    .iter()
                    .skip(cursor.emitted)
                    .map(|line| LogLine::new(source.clone(), *line)),
            );

            cursor.emitted = cursor.emitted.max(lines.len());
            cursor.tail = None;
            if !tail.is_empty() && cursor.emitted == lines.len() {
                if flush {
                    batch.push(LogLine::new(source, tail));
                    cursor.emitted += 1;
                } else {
                    cursor.tail = Some(tail.to_string());
                }
            }
            cursor.size = object.size;
            cursor.etag = object.etag;
        }

        batch
    }
}

#[async_trait]
impl LogConsumer for ObjectLogConsumer {
    async fn next_batch(&mut self) -> Vec<LogLine> {
        self.read(false).await
    }

    async fn drain(&mut self) -> Vec<LogLine> {
        self.read(true).await
    }
}

/// Source and stream encoded in a log object key
///
/// `{prefix}SPARK_EXECUTOR/1/stderr.gz` becomes source `SPARK_EXECUTOR/1`,
/// stream `stderr`. Keys that are not stdout/stderr files are ignored.
fn parse_source(prefix: &str, key: &str) -> Option<LogSource> {
    let relative = key.strip_prefix(prefix)?;
    let (source, file) = relative.rsplit_once('/')?;
    let stream = file.strip_suffix(GZIP_SUFFIX).unwrap_or(file);

    if source.is_empty() || !STREAMS.contains(&stream) {
        return None;
    }

    Some(LogSource {
        name: source.to_string(),
        stream: stream.to_string(),
    })
}

/// Splits `text` after its last newline
fn split_tail(text: &str) -> (&str, &str) {
    match text.rfind('\n') {
        Some(end) => text.split_at(end + 1),
        None => ("", text),
    }
}

fn decode(key: &str, body: Vec<u8>) -> std::io::Result<String> {
    let bytes = if key.ends_with(GZIP_SUFFIX) {
        let mut decoded = Vec::new();
        MultiGzDecoder::new(body.as_slice()).read_to_end(&mut decoded)?;
        decoded
    } else {
        body
    };

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
