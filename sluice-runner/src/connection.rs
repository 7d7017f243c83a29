//! Connection settings
//!
//! Static per-connection values handed to every run: credentials, the target
//! application, execution role, region and workspace root. Any field may hold
//! `${VAR}` placeholders that are expanded from the environment before use.

use regex::Regex;
use sluice_client::AwsCredentials;
use sluice_core::domain::params::ConnectionDefaults;

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}]+)\}";

/// One configured compute connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub application_id: String,
    pub execution_role: String,
    pub region: String,
    pub workspace: String,
}

impl ConnectionConfig {
    /// Replaces `${VAR}` placeholders in every field using `lookup`
    ///
    /// Unset variables expand to the empty string. Values are trimmed first;
    /// substituted text is not scanned again.
    pub fn expand_placeholders<F>(self, lookup: F) -> Result<Self, regex::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
        let expand = |value: String| {
            pattern
                .replace_all(value.trim(), |caps: &regex::Captures| {
                    lookup(&caps[1]).unwrap_or_default()
                })
                .into_owned()
        };

        Ok(Self {
            access_key: expand(self.access_key),
            secret_key: expand(self.secret_key),
            session_token: expand(self.session_token),
            application_id: expand(self.application_id),
            execution_role: expand(self.execution_role),
            region: expand(self.region),
            workspace: expand(self.workspace),
        })
    }

    /// Defaults that per-asset parameters are merged over
    pub fn defaults(&self) -> ConnectionDefaults {
        ConnectionDefaults {
            application_id: self.application_id.clone(),
            execution_role: self.execution_role.clone(),
            region: self.region.clone(),
            workspace: Some(self.workspace.clone()).filter(|ws| !ws.is_empty()),
        }
    }

    /// Signing credentials, if an access key pair is configured
    ///
    /// Without them requests are sent unsigned, which is what local
    /// emulators expect.
    pub fn credentials(&self) -> Option<AwsCredentials> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return None;
        }

        let credentials = AwsCredentials::new(self.access_key.clone(), self.secret_key.clone());
        Some(if self.session_token.is_empty() {
            credentials
        } else {
            credentials.with_session_token(self.session_token.clone())
        })
    }
}
