//! Run submitter
//!
//! Turns resolved run parameters (plus the staged workspace, if any) into a
//! start-job-run request.

use std::collections::BTreeMap;

use sluice_core::ObjectUri;
use sluice_core::domain::params::RunParameters;
use sluice_core::domain::workspace::Workspace;
use sluice_core::dto::job_run::{
    ConfigurationOverrides, JobDriver, MonitoringConfiguration, SparkSubmit, StartJobRunRequest,
};
use uuid::Uuid;

/// Spark configuration namespace for executor environment variables
const EXECUTOR_ENV: &str = "spark.executorEnv";

/// Spark configuration namespace for driver environment variables
const DRIVER_ENV: &str = "spark.emr-serverless.driverEnv";

/// Spark configuration key listing extra Python files for the job
const PY_FILES: &str = "spark.submit.pyFiles";

/// Builds the submission request for one run
///
/// Each call uses a fresh client token, so it must be called exactly once per
/// invocation.
pub fn build(
    params: &RunParameters,
    workspace: Option<&Workspace>,
    env: &BTreeMap<String, String>,
    asset_name: &str,
) -> StartJobRunRequest {
    let entry_point = match workspace {
        Some(workspace) => workspace.entrypoint.to_string(),
        None => params.entrypoint.clone(),
    };

    let mut submit_params: Vec<String> = Vec::new();
    if !params.config.is_empty() {
        submit_params.push(params.config.clone());
    }
    if let Some(workspace) = workspace {
        submit_params.push(conf(PY_FILES, &workspace.context.to_string()));
    }
    for (key, value) in env {
        submit_params.push(conf(&format!("{}.{}", EXECUTOR_ENV, key), value));
        submit_params.push(conf(&format!("{}.{}", DRIVER_ENV, key), value));
    }
    let spark_submit_parameters = Some(submit_params.join(" ")).filter(|joined| !joined.is_empty());

    let configuration_overrides =
        effective_log_uri(params, workspace).map(|uri| ConfigurationOverrides {
            monitoring_configuration: Some(MonitoringConfiguration::for_log_uri(uri.to_string())),
        });

    StartJobRunRequest {
        application_id: params.application_id.clone(),
        client_token: Uuid::new_v4().to_string(),
        name: asset_name.to_string(),
        execution_role_arn: params.execution_role.clone(),
        job_driver: JobDriver {
            spark_submit: SparkSubmit {
                entry_point,
                entry_point_arguments: params.args.clone(),
                spark_submit_parameters,
            },
        },
        execution_timeout_minutes: params.timeout_minutes(),
        configuration_overrides,
    }
}

/// Explicit log destination, else the workspace's shared logs path
pub fn effective_log_uri<'a>(
    params: &'a RunParameters,
    workspace: Option<&'a Workspace>,
) -> Option<&'a ObjectUri> {
    params
        .logs
        .as_ref()
        .or_else(|| workspace.map(|workspace| &workspace.logs))
}

fn conf(key: &str, value: &str) -> String {
    format!("--conf {}={}", key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use sluice_core::domain::params::ConnectionDefaults;

    fn params(pairs: &[(&str, &str)]) -> RunParameters {
        let defaults = ConnectionDefaults {
            application_id: "app-1".to_string(),
            execution_role: "arn:aws:iam::1:role/r".to_string(),
            region: "eu-west-1".to_string(),
            workspace: Some("s3://bucket/ws".to_string()),
        };
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunParameters::resolve(&defaults, &map).unwrap()
    }

    fn workspace() -> Workspace {
        let root = ObjectUri::parse("s3://bucket/ws").unwrap();
        Workspace::with_run_id(&root, "daily", "run-7", "main.py")
    }

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_build_without_workspace() {
        let params = params(&[
            ("entrypoint", "s3://code/job.py"),
            ("config", "--conf spark.executor.cores=2"),
            ("args", "--date 2024-01-01"),
            ("timeout", "90s"),
        ]);

        let request = build(&params, None, &BTreeMap::new(), "daily_sales");

        assert_eq!(request.application_id, "app-1");
        assert_eq!(request.name, "daily_sales");
        assert_eq!(request.job_driver.spark_submit.entry_point, "s3://code/job.py");
        assert_eq!(
            request.job_driver.spark_submit.entry_point_arguments,
            vec!["--date", "2024-01-01"]
        );
        assert_eq!(
            request.job_driver.spark_submit.spark_submit_parameters.as_deref(),
            Some("--conf spark.executor.cores=2")
        );
        assert_eq!(request.execution_timeout_minutes, Some(1));
        assert!(request.configuration_overrides.is_none());
    }

    #[test]
    fn test_build_with_workspace_and_env() {
        let params = params(&[("config", "--conf a=b")]);
        let env = env(&[("STAGE", "prod"), ("API_URL", "https://x")]);

        let request = build(&params, Some(&workspace()), &env, "asset");
        let spark = &request.job_driver.spark_submit;

        assert_eq!(spark.entry_point, "s3://bucket/ws/daily/run-7/main.py");
        assert_eq!(
            spark.spark_submit_parameters.as_deref(),
            Some(
                "--conf a=b \
                 --conf spark.submit.pyFiles=s3://bucket/ws/daily/run-7/context.zip \
                 --conf spark.executorEnv.API_URL=https://x \
                 --conf spark.emr-serverless.driverEnv.API_URL=https://x \
                 --conf spark.executorEnv.STAGE=prod \
                 --conf spark.emr-serverless.driverEnv.STAGE=prod"
            )
        );
        assert_eq!(
            request
                .configuration_overrides
                .and_then(|o| o.monitoring_configuration)
                .and_then(|m| m.log_uri().map(str::to_string))
                .as_deref(),
            Some("s3://bucket/ws/logs")
        );
    }

    #[test]
    fn test_explicit_logs_win_over_workspace() {
        let params = params(&[("logs", "s3://audit/logs")]);
        let ws = workspace();
        assert_eq!(
            effective_log_uri(&params, Some(&ws)).map(ToString::to_string),
            Some("s3://audit/logs".to_string())
        );
    }

    #[test]
    fn test_empty_submit_parameters_are_omitted() {
        let request = build(&params(&[]), None, &BTreeMap::new(), "asset");
        assert!(request.job_driver.spark_submit.spark_submit_parameters.is_none());
        assert!(request.execution_timeout_minutes.is_none());
    }

    #[test]
    fn test_sub_minute_timeout_truncates_to_zero() {
        let mut params = params(&[]);
        params.timeout = Some(Duration::from_secs(59));
        let request = build(&params, None, &BTreeMap::new(), "asset");
        assert_eq!(request.execution_timeout_minutes, Some(0));
    }

    #[test]
    fn test_client_token_is_fresh_per_build() {
        let params = params(&[]);
        let first = build(&params, None, &BTreeMap::new(), "asset");
        let second = build(&params, None, &BTreeMap::new(), "asset");
        assert_ne!(first.client_token, second.client_token);
    }
}
