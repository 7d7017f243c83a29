//! Application DTOs

use serde::{Deserialize, Serialize};

use super::job_run::MonitoringConfiguration;

/// Response of a get-application request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetApplicationResponse {
    pub application: Application,
}

/// The subset of application metadata the runner needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub monitoring_configuration: Option<MonitoringConfiguration>,
}

impl Application {
    /// Log destination configured on the application itself
    pub fn default_log_uri(&self) -> Option<&str> {
        self.monitoring_configuration
            .as_ref()
            .and_then(MonitoringConfiguration::log_uri)
    }
}
