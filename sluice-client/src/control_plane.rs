//! Control-plane client
//!
//! Submits, lists, cancels and inspects runs on the managed batch-compute
//! service (EMR Serverless REST API).

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use sluice_core::domain::run::{AttemptPage, RunHandle};
use sluice_core::dto::application::{Application, GetApplicationResponse};
use sluice_core::dto::job_run::{
    ListJobRunAttemptsResponse, StartJobRunRequest, StartJobRunResponse,
};
use tracing::debug;

use crate::error::Result;
use crate::signing::{AwsCredentials, Signer};
use crate::{handle_empty_response, handle_response};

const SERVICE: &str = "emr-serverless";

/// Operations the runner consumes from the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Submits a new run
    ///
    /// # Arguments
    /// * `request` - The fully built submission request
    ///
    /// # Returns
    /// A handle identifying the submitted run
    async fn start_job_run(&self, request: &StartJobRunRequest) -> Result<RunHandle>;

    /// Lists the attempts backing a run, one page at a time
    ///
    /// # Arguments
    /// * `handle` - The run to inspect
    /// * `next_token` - Cursor returned by the previous page, if any
    async fn list_job_run_attempts(
        &self,
        handle: &RunHandle,
        next_token: Option<&str>,
    ) -> Result<AttemptPage>;

    /// Requests cancellation of a run
    async fn cancel_job_run(&self, handle: &RunHandle) -> Result<()>;

    /// Fetches application metadata, including its default monitoring destination
    async fn get_application(&self, application_id: &str) -> Result<Application>;
}

/// HTTP implementation of ControlPlane
#[derive(Debug, Clone)]
pub struct EmrServerlessClient {
    client: Client,
    endpoint: String,
    signer: Option<Signer>,
    region: String,
}

impl EmrServerlessClient {
    /// Creates a client for the regional endpoint
    ///
    /// # Arguments
    /// * `region` - Region hosting the application (e.g., "eu-west-1")
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            client: Client::new(),
            endpoint: format!("https://{}.{}.amazonaws.com", SERVICE, region),
            signer: None,
            region,
        }
    }

    /// Overrides the endpoint (e.g., a local emulator)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Signs every request with these credentials
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.signer = Some(Signer::new(credentials, self.region.clone(), SERVICE));
        self
    }

    /// Uses a custom HTTP client (timeouts, proxies, TLS settings)
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> String {
        let path: String = segments
            .iter()
            .map(|segment| format!("/{}", urlencoding::encode(segment)))
            .collect();
        format!("{}{}", self.endpoint, path)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let mut request = builder.build()?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut request)?;
        }

        debug!("{} {}", request.method(), request.url());
        Ok(self.client.execute(request).await?)
    }
}

#[async_trait]
impl ControlPlane for EmrServerlessClient {
    async fn start_job_run(&self, request: &StartJobRunRequest) -> Result<RunHandle> {
        let url = self.url(&["applications", &request.application_id, "jobruns"]);
        let body = serde_json::to_vec(request).map_err(|e| {
            crate::ClientError::InvalidRequest(format!("Failed to encode request: {}", e))
        })?;

        let response = self
            .send(
                self.client
                    .request(Method::POST, &url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body),
            )
            .await?;

        let started: StartJobRunResponse = handle_response(response).await?;
        Ok(started.into())
    }

    async fn list_job_run_attempts(
        &self,
        handle: &RunHandle,
        next_token: Option<&str>,
    ) -> Result<AttemptPage> {
        let mut url = self.url(&[
            "applications",
            &handle.application_id,
            "jobruns",
            &handle.run_id,
            "attempts",
        ]);
        if let Some(token) = next_token {
            url = format!("{}?nextToken={}", url, urlencoding::encode(token));
        }

        let response = self.send(self.client.get(&url)).await?;
        let page: ListJobRunAttemptsResponse = handle_response(response).await?;
        Ok(page.into())
    }

    async fn cancel_job_run(&self, handle: &RunHandle) -> Result<()> {
        let url = self.url(&[
            "applications",
            &handle.application_id,
            "jobruns",
            &handle.run_id,
        ]);

        let response = self.send(self.client.delete(&url)).await?;
        handle_empty_response(response).await
    }

    async fn get_application(&self, application_id: &str) -> Result<Application> {
        let url = self.url(&["applications", application_id]);

        let response = self.send(self.client.get(&url)).await?;
        let app: GetApplicationResponse = handle_response(response).await?;
        Ok(app.application)
    }
}
