mod cli;
mod config;
mod controller;
mod engine;
mod error;
mod params;
mod state_machine;
mod ui;
mod util;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use cli::{Cli, Command};
use config::PartgenConfig;
use controller::{ControllerSettings, GenerationController};
use engine::EngineClient;
use params::{ModelParams, catalogue_defaults, parameters_from_query, parse_param_specs};
use state_machine::{JobOutcome, JobParameters, ParamValue};
use ui::TerminalSink;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let mut config = PartgenConfig::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(interval) = cli.interval_ms {
        config.poll_interval_ms = interval;
    }

    match cli.command {
        Command::Generate {
            query,
            layer_height,
            col_min,
            col_max,
            bar_min,
            bar_max,
            catalogue,
            out_dir,
            no_download,
            json,
        } => {
            let mut parameters = match &catalogue {
                Some(path) => catalogue_defaults(&parse_param_specs(&read_catalogue(path)?)?),
                None => JobParameters::new(),
            };
            if let Some(query) = &query {
                parameters.merge(parameters_from_query(query)?);
            }
            for (name, value) in [
                (params::LAYER_HEIGHT, layer_height),
                (params::COL_MIN, col_min),
                (params::COL_MAX, col_max),
                (params::BAR_MIN, bar_min),
                (params::BAR_MAX, bar_max),
            ] {
                if let Some(value) = value {
                    parameters.insert(name, value);
                }
            }
            if parameters.is_empty() {
                tracing::warn!("no part parameters given; the server will use its defaults");
            }
            if let Some(dir) = out_dir {
                config.download_dir = dir;
            }
            if no_download {
                config.download = false;
            }
            generate(&config, parameters, json).await
        }
        Command::Submit { query } => submit(&config, &query).await,
        Command::Params { catalogue, query } => {
            list_params(&catalogue, query.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn generate(config: &PartgenConfig, parameters: JobParameters, json: bool) -> Result<ExitCode> {
    let client = EngineClient::new(&config.server_url, config.request_timeout())?;
    let settings = ControllerSettings::from_config(config, client.endpoint(&config.artifact_path)?);

    let label = ModelParams::from_parameters(&parameters)
        .map(|m| m.job_key())
        .unwrap_or_else(|_| "part".to_string());

    let mut controller = GenerationController::new(Arc::new(client), settings);
    controller.start(parameters, TerminalSink::new(&label))?;
    let outcome = controller.run().await?;
    tracing::debug!(state = %controller.state(), "generation job ended");

    if let Some(sink) = controller.sink() {
        sink.complete(&outcome);
        if json && let Some(report) = controller.report() {
            sink.print_report(&report);
        }
    }

    Ok(match outcome {
        JobOutcome::Success(_) => ExitCode::SUCCESS,
        JobOutcome::Failure(_) => ExitCode::FAILURE,
    })
}

async fn submit(config: &PartgenConfig, query: &str) -> Result<ExitCode> {
    let data = parameters_from_query(query)?;
    let client = EngineClient::new(&config.server_url, config.request_timeout())?;
    let settings = ControllerSettings::from_config(config, client.endpoint(&config.artifact_path)?);
    let generator: GenerationController<EngineClient, TerminalSink> =
        GenerationController::new(Arc::new(client), settings);

    match generator.submit(&data).await {
        Ok(result) => {
            println!("{}", result.message());
            Ok(if result.is_accepted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "submission failed");
            println!("{}", controller::COMMUNICATION_ERROR_MESSAGE);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn list_params(catalogue: &Path, query: Option<&str>) -> Result<()> {
    let specs = parse_param_specs(&read_catalogue(catalogue)?)?;
    let values = match query {
        Some(query) => parameters_from_query(query)?,
        None => JobParameters::new(),
    };

    for spec in &specs {
        let value = values.get(&spec.name).or(spec.default.as_ref());
        let shown = match value {
            Some(ParamValue::Number(n)) => util::smart_to_string(*n, util::DEFAULT_DIGITS),
            Some(ParamValue::Text(s)) => s.clone(),
            None => "-".to_string(),
        };
        let label = spec.label.as_deref().unwrap_or(&spec.name);
        let units = spec.units.as_deref().unwrap_or("");
        println!("{label:<24} {shown} {units}");
    }
    Ok(())
}

fn read_catalogue(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalogue {}", path.display()))
}
