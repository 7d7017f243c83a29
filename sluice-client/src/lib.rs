//! Sluice clients
//!
//! Typed clients for the two remote services a run depends on:
//! - [`ControlPlane`]: submit, list attempts, cancel, and inspect applications
//!   on the managed batch-compute service
//! - [`ObjectStore`]: put, list, get and delete objects used for staging and logs
//!
//! Both are traits so the runner can be driven by in-memory fakes in tests; the
//! HTTP implementations talk to the EMR Serverless and S3 REST APIs and sign
//! requests with AWS SigV4 when credentials are configured.
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::{AwsCredentials, ControlPlane, EmrServerlessClient};
//! use sluice_core::domain::run::RunHandle;
//!
//! #[tokio::main]
//! async fn main() -> sluice_client::Result<()> {
//!     let client = EmrServerlessClient::new("eu-west-1")
//!         .with_credentials(AwsCredentials::new("AKID", "secret"));
//!
//!     let page = client
//!         .list_job_run_attempts(&RunHandle::new("app-id", "run-id"), None)
//!         .await?;
//!     println!("{} attempt(s)", page.attempts.len());
//!     Ok(())
//! }
//! ```

pub mod control_plane;
pub mod error;
pub mod object_store;
pub mod signing;

// Re-export commonly used types
pub use control_plane::{ControlPlane, EmrServerlessClient};
pub use error::{ClientError, Result};
pub use object_store::{ObjectPage, ObjectStore, ObjectSummary, S3Client};
pub use signing::{AwsCredentials, Signer};

use serde::de::DeserializeOwned;

/// Header carrying the service error code on JSON APIs
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Handle an API response and deserialize JSON
///
/// Checks the status code and returns a classified error if the request
/// failed, or deserializes the response body if successful.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response that returns no meaningful content
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    Ok(())
}

/// Builds a classified error from a failed response
///
/// JSON services put the error code in `x-amzn-ErrorType` (or `__type`) and
/// the message in `message`; XML services return `<Error><Code/><Message/></Error>`.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let header_code = response
        .headers()
        .get(ERROR_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).to_string());

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let (body_code, message) = if body.trim_start().starts_with('<') {
        parse_xml_error(&body)
    } else {
        parse_json_error(&body)
    };

    let code = header_code.or(body_code).unwrap_or_default();
    ClientError::from_response(status, code, message.unwrap_or(body))
}

fn parse_json_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };

    let code = value
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|code| code.rsplit('#').next().unwrap_or(code).to_string());
    let message = ["message", "Message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string);

    (code, message)
}

fn parse_xml_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(doc) = roxmltree::Document::parse(body) else {
        return (None, None);
    };

    let text_of = |tag: &str| {
        doc.descendants()
            .find(|node| node.has_tag_name(tag))
            .and_then(|node| node.text())
            .map(str::to_string)
    };

    (text_of("Code"), text_of("Message"))
}
