//! Job run DTOs

use serde::{Deserialize, Serialize};

use crate::domain::run::{AttemptPage, RunAttempt, RunHandle, RunState};

/// Body of a start-job-run request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRunRequest {
    /// Addressed through the request path, not the body
    #[serde(skip)]
    pub application_id: String,
    pub client_token: String,
    pub name: String,
    pub execution_role_arn: String,
    pub job_driver: JobDriver,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timeout_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_overrides: Option<ConfigurationOverrides>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDriver {
    pub spark_submit: SparkSubmit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkSubmit {
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_point_arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spark_submit_parameters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_configuration: Option<MonitoringConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_monitoring_configuration: Option<S3MonitoringConfiguration>,
}

impl MonitoringConfiguration {
    /// Monitoring block that ships logs to `log_uri`
    pub fn for_log_uri(log_uri: impl Into<String>) -> Self {
        Self {
            s3_monitoring_configuration: Some(S3MonitoringConfiguration {
                log_uri: Some(log_uri.into()),
            }),
        }
    }

    pub fn log_uri(&self) -> Option<&str> {
        self.s3_monitoring_configuration
            .as_ref()
            .and_then(|s3| s3.log_uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3MonitoringConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_uri: Option<String>,
}

/// Response of a start-job-run request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRunResponse {
    pub application_id: String,
    pub job_run_id: String,
    #[serde(default)]
    pub arn: Option<String>,
}

impl From<StartJobRunResponse> for RunHandle {
    fn from(response: StartJobRunResponse) -> Self {
        RunHandle::new(response.application_id, response.job_run_id)
    }
}

/// Response of a list-job-run-attempts request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobRunAttemptsResponse {
    #[serde(default)]
    pub job_run_attempts: Vec<JobRunAttemptSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunAttemptSummary {
    #[serde(default)]
    pub attempt: Option<u32>,
    pub state: RunState,
    #[serde(default)]
    pub state_details: Option<String>,
}

impl From<ListJobRunAttemptsResponse> for AttemptPage {
    fn from(response: ListJobRunAttemptsResponse) -> Self {
        let attempts = response
            .job_run_attempts
            .into_iter()
            .enumerate()
            .map(|(idx, summary)| RunAttempt {
                attempt: summary.attempt.unwrap_or(idx as u32 + 1),
                state: summary.state,
                state_details: summary.state_details.unwrap_or_default(),
            })
            .collect();

        AttemptPage {
            attempts,
            next_token: response.next_token.filter(|token| !token.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case_and_skips_unset() {
        let request = StartJobRunRequest {
            application_id: "app".to_string(),
            client_token: "token".to_string(),
            name: "asset".to_string(),
            execution_role_arn: "role".to_string(),
            job_driver: JobDriver {
                spark_submit: SparkSubmit {
                    entry_point: "s3://b/main.py".to_string(),
                    entry_point_arguments: vec![],
                    spark_submit_parameters: None,
                },
            },
            execution_timeout_minutes: None,
            configuration_overrides: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "clientToken": "token",
                "name": "asset",
                "executionRoleArn": "role",
                "jobDriver": { "sparkSubmit": { "entryPoint": "s3://b/main.py" } }
            })
        );
    }

    #[test]
    fn test_attempts_response_into_page() {
        let response: ListJobRunAttemptsResponse = serde_json::from_value(serde_json::json!({
            "jobRunAttempts": [
                { "attempt": 1, "state": "FAILED", "stateDetails": "OOM" },
                { "attempt": 2, "state": "RUNNING" }
            ],
            "nextToken": "abc"
        }))
        .unwrap();

        let page = AttemptPage::from(response);
        assert_eq!(page.attempts.len(), 2);
        assert_eq!(page.attempts[0].state_details, "OOM");
        assert_eq!(page.latest().unwrap().state, RunState::Running);
        assert_eq!(page.next_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_monitoring_log_uri() {
        let cfg = MonitoringConfiguration::for_log_uri("s3://b/logs");
        assert_eq!(cfg.log_uri(), Some("s3://b/logs"));
        assert_eq!(MonitoringConfiguration::default().log_uri(), None);
    }
}
