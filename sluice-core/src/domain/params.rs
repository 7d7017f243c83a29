//! Run parameter types
//!
//! `RunParameters` is built once per run by merging the asset's string
//! parameters over the connection's static defaults. It is never mutated
//! afterwards; workspace-derived values are applied when the submission
//! request is built.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::ObjectUri;
use crate::duration::parse_duration;

/// Recognised keys of the per-asset parameter map
pub mod keys {
    pub const ENTRYPOINT: &str = "entrypoint";
    pub const CONFIG: &str = "config";
    pub const LOGS: &str = "logs";
    pub const TIMEOUT: &str = "timeout";
    pub const ARGS: &str = "args";
}

/// Errors raised while resolving run parameters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("invalid object URI {0}")]
    InvalidUri(String),

    #[error("missing required parameter: {0}")]
    Missing(&'static str),
}

/// Static, per-connection defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDefaults {
    pub application_id: String,
    pub execution_role: String,
    pub region: String,
    /// Root URI under which run workspaces are staged
    pub workspace: Option<String>,
}

/// Fully resolved execution configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub application_id: String,
    pub execution_role: String,
    pub entrypoint: String,
    pub args: Vec<String>,
    /// Free-form spark-submit parameters
    pub config: String,
    pub timeout: Option<Duration>,
    pub region: String,
    /// Explicit log destination, if the asset set one
    pub logs: Option<ObjectUri>,
    pub workspace: Option<ObjectUri>,
}

impl RunParameters {
    /// Merges asset parameters over connection defaults
    ///
    /// Blank values count as unset. An unparseable `timeout` is logged and
    /// dropped, leaving the run without a timeout; a malformed URI is an error.
    pub fn resolve(
        defaults: &ConnectionDefaults,
        params: &HashMap<String, String>,
    ) -> Result<Self, ParameterError> {
        let get = |key: &str| {
            params
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if defaults.application_id.trim().is_empty() {
            return Err(ParameterError::Missing("application_id"));
        }
        if defaults.execution_role.trim().is_empty() {
            return Err(ParameterError::Missing("execution_role"));
        }

        let timeout = get(keys::TIMEOUT).and_then(|raw| match parse_duration(raw) {
            Ok(timeout) => Some(timeout),
            Err(e) => {
                warn!("Ignoring timeout parameter: {}", e);
                None
            }
        });
        let logs = get(keys::LOGS).map(ObjectUri::parse).transpose()?;
        let workspace = defaults
            .workspace
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ObjectUri::parse)
            .transpose()?;

        let args = get(keys::ARGS)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            application_id: defaults.application_id.trim().to_string(),
            execution_role: defaults.execution_role.trim().to_string(),
            entrypoint: get(keys::ENTRYPOINT).unwrap_or_default().to_string(),
            args,
            config: get(keys::CONFIG).unwrap_or_default().to_string(),
            timeout,
            region: defaults.region.trim().to_string(),
            logs,
            workspace,
        })
    }

    /// Timeout in whole minutes, truncating any remainder
    pub fn timeout_minutes(&self) -> Option<u64> {
        self.timeout.map(|timeout| timeout.as_secs() / 60)
    }
}
