//! Main entry point for the insurance order lifecycle runner.
//!
//! Creates one order against the configured backend, updates it, deletes it
//! and checks that it is gone, failing on the first unexpected response.
//!
//! Exit status: 0 when the scenario passes, 1 when a step fails, 2 when the
//! configuration or the HTTP client cannot be set up.

use clap::{Parser, ValueEnum};
use policy_api::implementations::{http::HttpApiClient, memory::InMemoryBackend};
use policy_api::{ApiError, InsuranceApiService};
use policy_config::{Config, ConfigError, ScenarioConfig, UpdateMode};
use policy_core::{OrderLifecycleScenario, ScenarioEvent, Step};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Command-line arguments for the runner.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file. Without one, credentials are read from
	/// AUTH_USERNAME and AUTH_PASSWORD.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Target the production deployment
	#[arg(long)]
	production: bool,

	/// Require exactly 201 when creating the order
	#[arg(long)]
	strict: bool,

	/// How selection fields are submitted
	#[arg(long, value_enum)]
	update_mode: Option<ModeArg>,

	/// Run against the in-process backend instead of the network
	#[arg(long)]
	dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
	Combined,
	Stepwise,
}

impl From<ModeArg> for UpdateMode {
	fn from(mode: ModeArg) -> Self {
		match mode {
			ModeArg::Combined => UpdateMode::Combined,
			ModeArg::Stepwise => UpdateMode::Stepwise,
		}
	}
}

/// Setup failures; all map to exit status 2.
#[derive(Debug, Error)]
enum SetupError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Client(#[from] ApiError),
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let (api, scenario_config) = match build(&args).await {
		Ok(parts) => parts,
		Err(e) => {
			tracing::error!(error = %e, "Setup failed");
			eprintln!("Configuration error: {}", e);
			return ExitCode::from(2);
		},
	};

	let scenario = OrderLifecycleScenario::new(api, scenario_config);
	let progress = tokio::spawn(collect_progress(scenario.event_bus().subscribe()));

	let result = scenario.run().await;
	let completed = progress.await.unwrap_or_default();

	match result {
		Ok(report) => {
			println!("Scenario passed");
			println!("{}", report.summary());
			ExitCode::SUCCESS
		},
		Err(e) => {
			println!("Scenario failed after {} request(s)", completed.len());
			for (step, status, elapsed) in &completed {
				println!(
					"  [{}] {:<22} {} ({} ms)",
					step.position(),
					step.name(),
					status,
					elapsed.as_millis()
				);
			}
			eprintln!("{}", e);
			ExitCode::from(1)
		},
	}
}

/// Loads configuration, applies command-line overrides and picks the backend.
async fn build(args: &Args) -> Result<(InsuranceApiService, ScenarioConfig), SetupError> {
	if args.dry_run && args.config.is_none() {
		tracing::info!("Dry run against the in-memory backend");
		let mut scenario = ScenarioConfig::default();
		apply_scenario_overrides(args, &mut scenario);
		return Ok((
			InsuranceApiService::new(Box::new(InMemoryBackend::new())),
			scenario,
		));
	}

	let mut config = match &args.config {
		Some(path) => Config::from_file(path).await?,
		None => Config::from_env()?,
	};
	apply_overrides(args, &mut config)?;

	if args.dry_run {
		tracing::info!("Dry run against the in-memory backend");
		return Ok((
			InsuranceApiService::new(Box::new(InMemoryBackend::new())),
			config.scenario,
		));
	}

	tracing::info!(
		base_url = %config.base_url(),
		environment = ?config.api.environment,
		"Loaded configuration"
	);
	let client = HttpApiClient::from_config(&config)?;
	Ok((InsuranceApiService::new(Box::new(client)), config.scenario))
}

fn apply_overrides(args: &Args, config: &mut Config) -> Result<(), ConfigError> {
	if args.production {
		config.select_production();
	}
	apply_scenario_overrides(args, &mut config.scenario);
	config.validate()
}

fn apply_scenario_overrides(args: &Args, scenario: &mut ScenarioConfig) {
	if args.strict {
		scenario.strict_status_codes = true;
	}
	if let Some(mode) = args.update_mode {
		scenario.update_mode = mode.into();
	}
}

/// Collects completed steps until the scenario finishes.
async fn collect_progress(
	mut receiver: broadcast::Receiver<ScenarioEvent>,
) -> Vec<(Step, u16, Duration)> {
	let mut completed = Vec::new();
	loop {
		match receiver.recv().await {
			Ok(ScenarioEvent::StepCompleted {
				step,
				status,
				elapsed,
			}) => completed.push((step, status, elapsed)),
			Ok(ScenarioEvent::ScenarioFinished { .. }) => break,
			Ok(_) => {},
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Progress listener lagged behind");
			},
			Err(broadcast::error::RecvError::Closed) => break,
		}
	}
	completed
}
