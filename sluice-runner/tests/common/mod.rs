#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use sluice_client::{ClientError, ControlPlane, ObjectPage, ObjectStore, ObjectSummary};
use sluice_core::ObjectUri;
use sluice_core::domain::run::{AttemptPage, RunAttempt, RunHandle, RunState};
use sluice_core::dto::application::Application;
use sluice_core::dto::job_run::{MonitoringConfiguration, StartJobRunRequest};
use sluice_runner::RunnerConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Output is captured per test and only shown for failing tests unless run
/// with `--nocapture`. Enable levels with e.g. `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Runner config with a 1s base poll interval
pub fn test_config() -> RunnerConfig {
    RunnerConfig::new().with_poll_interval(Duration::from_secs(1), Duration::from_secs(60))
}

pub fn page(state: RunState, detail: &str) -> AttemptPage {
    AttemptPage {
        attempts: vec![RunAttempt {
            attempt: 1,
            state,
            state_details: detail.to_string(),
        }],
        next_token: None,
    }
}

/// One scripted answer to a list-attempts call
#[derive(Debug, Clone)]
pub enum ListResponse {
    Page(AttemptPage),
    Throttled,
    Fail(String),
}

impl ListResponse {
    pub fn state(state: RunState, detail: &str) -> Self {
        ListResponse::Page(page(state, detail))
    }
}

/// One recorded list-attempts call
#[derive(Debug, Clone)]
pub struct ListCall {
    pub at: Instant,
    pub next_token: Option<String>,
}

#[derive(Default)]
struct ControlPlaneState {
    script: VecDeque<ListResponse>,
    submissions: Vec<StartJobRunRequest>,
    list_calls: Vec<ListCall>,
    cancels: Vec<RunHandle>,
    application_lookups: usize,
}

/// Scripted control plane
///
/// List calls consume the script in order; once it is exhausted every call
/// reports a single RUNNING attempt.
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    state: Arc<Mutex<ControlPlaneState>>,
    fail_submit: bool,
    application_log_uri: Option<String>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeControlPlane {
    pub fn new(script: Vec<ListResponse>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().script = script.into();
        fake
    }

    pub fn failing_submit() -> Self {
        Self {
            fail_submit: true,
            ..Self::default()
        }
    }

    pub fn with_application_log_uri(mut self, uri: &str) -> Self {
        self.application_log_uri = Some(uri.to_string());
        self
    }

    /// Cancels `token` right after the `n`th list call returns
    pub fn cancel_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn submissions(&self) -> Vec<StartJobRunRequest> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn cancels(&self) -> Vec<RunHandle> {
        self.state.lock().unwrap().cancels.clone()
    }

    pub fn application_lookups(&self) -> usize {
        self.state.lock().unwrap().application_lookups
    }

    /// Gaps between consecutive list calls, starting from `start`
    pub fn poll_gaps(&self, start: Instant) -> Vec<Duration> {
        let mut previous = start;
        self.list_calls()
            .into_iter()
            .map(|call| {
                let gap = call.at - previous;
                previous = call.at;
                gap
            })
            .collect()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn start_job_run(
        &self,
        request: &StartJobRunRequest,
    ) -> sluice_client::Result<RunHandle> {
        if self.fail_submit {
            return Err(ClientError::from_response(
                400,
                "ValidationException",
                "execution role is invalid",
            ));
        }

        let mut state = self.state.lock().unwrap();
        state.submissions.push(request.clone());
        Ok(RunHandle::new(
            request.application_id.clone(),
            format!("run-{}", state.submissions.len()),
        ))
    }

    async fn list_job_run_attempts(
        &self,
        _handle: &RunHandle,
        next_token: Option<&str>,
    ) -> sluice_client::Result<AttemptPage> {
        let (response, calls) = {
            let mut state = self.state.lock().unwrap();
            state.list_calls.push(ListCall {
                at: Instant::now(),
                next_token: next_token.map(str::to_string),
            });
            let response = state
                .script
                .pop_front()
                .unwrap_or_else(|| ListResponse::state(RunState::Running, ""));
            (response, state.list_calls.len())
        };

        if let Some((n, token)) = &self.cancel_after {
            if calls == *n {
                token.cancel();
            }
        }

        match response {
            ListResponse::Page(page) => Ok(page),
            ListResponse::Throttled => Err(ClientError::from_response(
                400,
                "ThrottlingException",
                "Rate exceeded",
            )),
            ListResponse::Fail(message) => Err(ClientError::from_response(
                500,
                "InternalServerException",
                message,
            )),
        }
    }

    async fn cancel_job_run(&self, handle: &RunHandle) -> sluice_client::Result<()> {
        self.state.lock().unwrap().cancels.push(handle.clone());
        Ok(())
    }

    async fn get_application(&self, application_id: &str) -> sluice_client::Result<Application> {
        self.state.lock().unwrap().application_lookups += 1;
        Ok(Application {
            application_id: application_id.to_string(),
            name: None,
            state: Some("STARTED".to_string()),
            monitoring_configuration: self
                .application_log_uri
                .as_ref()
                .map(|uri| MonitoringConfiguration::for_log_uri(uri.clone())),
        })
    }
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<(String, String), (Vec<u8>, String)>,
    version: u64,
    listed_prefixes: Vec<String>,
    deleted: Vec<String>,
    gets: usize,
}

/// Object store kept in memory, with small listing pages
#[derive(Clone)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<StoreState>>,
    page_size: usize,
    fail_puts_containing: Option<String>,
    fail_lists: bool,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            page_size: 2,
            fail_puts_containing: None,
            fail_lists: false,
        }
    }

    /// Rejects uploads whose key contains `fragment`
    pub fn failing_puts(mut self, fragment: &str) -> Self {
        self.fail_puts_containing = Some(fragment.to_string());
        self
    }

    pub fn failing_lists(mut self) -> Self {
        self.fail_lists = true;
        self
    }

    /// Writes an object directly, bypassing failure injection
    pub fn insert(&self, uri: &str, body: impl Into<Vec<u8>>) {
        let uri = ObjectUri::parse(uri).unwrap();
        let mut state = self.state.lock().unwrap();
        state.version += 1;
        let etag = format!("v{}", state.version);
        state.objects.insert(
            (uri.bucket().to_string(), uri.key().to_string()),
            (body.into(), etag),
        );
    }

    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        let uri = ObjectUri::parse(uri).unwrap();
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(uri.bucket().to_string(), uri.key().to_string()))
            .map(|(body, _)| body.clone())
    }

    /// Keys in `bucket` starting with `prefix`
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|(b, key)| b == bucket && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn listed_prefixes(&self) -> Vec<String> {
        self.state.lock().unwrap().listed_prefixes.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, uri: &ObjectUri, body: Vec<u8>) -> sluice_client::Result<()> {
        if let Some(fragment) = &self.fail_puts_containing {
            if uri.key().contains(fragment.as_str()) {
                return Err(ClientError::from_response(403, "AccessDenied", "Access Denied"));
            }
        }

        self.insert(&uri.to_string(), body);
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &ObjectUri,
        continuation: Option<&str>,
    ) -> sluice_client::Result<ObjectPage> {
        let mut state = self.state.lock().unwrap();
        state.listed_prefixes.push(prefix.prefix());
        if self.fail_lists {
            return Err(ClientError::from_response(403, "AccessDenied", "Access Denied"));
        }

        let key_prefix = prefix.prefix();
        let matching: Vec<ObjectSummary> = state
            .objects
            .iter()
            .filter(|((bucket, key), _)| bucket == prefix.bucket() && key.starts_with(&key_prefix))
            .filter(|((_, key), _)| continuation.is_none_or(|after| key.as_str() > after))
            .map(|((_, key), (body, etag))| ObjectSummary {
                key: key.clone(),
                size: body.len() as u64,
                etag: Some(etag.clone()),
            })
            .collect();

        let objects: Vec<ObjectSummary> = matching.iter().take(self.page_size).cloned().collect();
        let next_token = if matching.len() > self.page_size {
            objects.last().map(|object| object.key.clone())
        } else {
            None
        };

        Ok(ObjectPage { objects, next_token })
    }

    async fn get_object(&self, uri: &ObjectUri) -> sluice_client::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        state
            .objects
            .get(&(uri.bucket().to_string(), uri.key().to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| ClientError::NotFound(uri.to_string()))
    }

    async fn delete_object(&self, uri: &ObjectUri) -> sluice_client::Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .objects
            .remove(&(uri.bucket().to_string(), uri.key().to_string()));
        state.deleted.push(uri.key().to_string());
        Ok(())
    }
}
