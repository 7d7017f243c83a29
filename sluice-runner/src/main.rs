//! Sluice
//!
//! Runs one Spark asset on EMR Serverless: stages the script and its project
//! into the workspace bucket, submits the run, streams its state transitions
//! and logs to stdout, and cleans up afterwards. Ctrl-C cancels the run.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sluice_client::{EmrServerlessClient, S3Client};
use sluice_core::domain::asset::Asset;
use sluice_core::domain::params::keys;
use sluice_runner::{ConnectionConfig, Job, JobRunner, RunnerConfig, StdoutSink};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Stage, submit and supervise Spark jobs on EMR Serverless", long_about = None)]
struct Cli {
    /// Asset name, used as the job run name
    #[arg(long)]
    asset: String,

    /// Entrypoint script; a local file unless --no-staging is set
    #[arg(long)]
    entrypoint: PathBuf,

    /// Pipeline name, used in the workspace layout
    #[arg(long, default_value = "default")]
    pipeline: String,

    /// Submit the entrypoint as-is instead of staging it
    #[arg(long)]
    no_staging: bool,

    /// Asset parameter (entrypoint, config, logs, timeout, args)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Environment variable for the driver and executors
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,

    #[arg(long, env = "SLUICE_APPLICATION_ID", default_value = "")]
    application_id: String,

    #[arg(long, env = "SLUICE_EXECUTION_ROLE", default_value = "")]
    execution_role: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Workspace root, e.g. s3://bucket/workspaces
    #[arg(long, env = "SLUICE_WORKSPACE", default_value = "")]
    workspace: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", default_value = "", hide_env_values = true)]
    access_key: String,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", default_value = "", hide_env_values = true)]
    secret_key: String,

    #[arg(long, env = "AWS_SESSION_TOKEN", default_value = "", hide_env_values = true)]
    session_token: String,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "sluice_runner=trace")
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "sluice_runner=info,sluice_client=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = RunnerConfig::from_env()?;
    config.validate()?;

    let connection = ConnectionConfig {
        access_key: cli.access_key,
        secret_key: cli.secret_key,
        session_token: cli.session_token,
        application_id: cli.application_id,
        execution_role: cli.execution_role,
        region: cli.region,
        workspace: cli.workspace,
    }
    .expand_placeholders(|name| std::env::var(name).ok())
    .context("Failed to expand connection placeholders")?;

    let mut control_plane = EmrServerlessClient::new(connection.region.clone());
    let mut store = S3Client::new(connection.region.clone());
    if let Some(endpoint) = &config.control_plane_endpoint {
        control_plane = control_plane.with_endpoint(endpoint.clone());
    }
    if let Some(endpoint) = &config.object_store_endpoint {
        store = store.with_endpoint(endpoint.clone());
    }
    match connection.credentials() {
        Some(credentials) => {
            control_plane = control_plane.with_credentials(credentials.clone());
            store = store.with_credentials(credentials);
        }
        None => warn!("No access key configured, sending unsigned requests"),
    }

    let mut params: HashMap<String, String> = cli.params.into_iter().collect();
    if cli.no_staging && !params.contains_key(keys::ENTRYPOINT) {
        params.insert(
            keys::ENTRYPOINT.to_string(),
            cli.entrypoint.to_string_lossy().into_owned(),
        );
    }
    let env: BTreeMap<String, String> = cli.env.into_iter().collect();

    let asset = Asset::new(cli.asset, cli.entrypoint, !cli.no_staging);
    let job = Job::resolve(asset, cli.pipeline, &connection.defaults(), &params)?.with_env(env);

    let runner = JobRunner::new(Arc::new(control_plane), Arc::new(store), config)
        .with_sink(Arc::new(StdoutSink));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    info!("Running asset {} of pipeline {}", job.asset.name, job.pipeline);
    runner
        .run(&job, &cancel)
        .await
        .with_context(|| format!("Run of {} failed", job.asset.name))?;

    info!("Run of {} succeeded", job.asset.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("args=--date 2024-01-01"),
            Ok(("args".to_string(), "--date 2024-01-01".to_string()))
        );
        assert_eq!(
            parse_key_value("config=--conf a=b"),
            Ok(("config".to_string(), "--conf a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
