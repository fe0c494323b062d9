//! Configuration loading from files and from the process environment.
//!
//! Both entry points take an environment lookup function so the
//! `PRODUCTION` switch and the credential variables can be exercised in tests
//! without touching the real process environment.

use crate::{ApiConfig, Config, ConfigError, Credentials, Environment, ScenarioConfig};
use policy_types::SecretString;
use std::path::Path;

/// Username for Basic authentication.
pub const ENV_USERNAME: &str = "AUTH_USERNAME";
/// Password for Basic authentication.
pub const ENV_PASSWORD: &str = "AUTH_PASSWORD";
/// `1` selects the production deployment.
pub const ENV_PRODUCTION: &str = "PRODUCTION";

/// Reads, parses and validates a configuration file, then applies the
/// `PRODUCTION` switch.
pub(crate) async fn load_config<F>(path: &Path, lookup: F) -> Result<Config, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let content = tokio::fs::read_to_string(path).await.map_err(|e| {
		ConfigError::Io(std::io::Error::new(
			e.kind(),
			format!("Cannot read configuration {}: {}", path.display(), e),
		))
	})?;

	let mut config: Config = content.parse()?;
	apply_environment(&mut config, &lookup);
	config.validate()?;

	tracing::debug!(
		path = %path.display(),
		environment = ?config.api.environment,
		"Loaded configuration file"
	);
	Ok(config)
}

/// Builds a configuration from environment variables only.
pub(crate) fn config_from_env<F>(lookup: F) -> Result<Config, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let required = |key: &str| {
		lookup(key)
			.filter(|value| !value.trim().is_empty())
			.ok_or_else(|| {
				ConfigError::Validation(format!("Environment variable '{}' not found", key))
			})
	};

	let username = required(ENV_USERNAME)?;
	let password = SecretString::new(required(ENV_PASSWORD)?);

	let mut config = Config {
		api: ApiConfig {
			environment: Environment::Staging,
			staging_url: crate::default_staging_url(),
			production_url: crate::default_production_url(),
			base_url: None,
			timeout_seconds: crate::default_timeout_seconds(),
			credentials: Credentials { username, password },
		},
		scenario: ScenarioConfig::default(),
	};
	apply_environment(&mut config, &lookup);
	config.validate()?;
	Ok(config)
}

/// `PRODUCTION=1` selects the production deployment unless `base_url` is set.
/// Any other value leaves the configured environment alone.
fn apply_environment<F>(config: &mut Config, lookup: &F)
where
	F: Fn(&str) -> Option<String>,
{
	if lookup(ENV_PRODUCTION).as_deref().map(str::trim) == Some("1") {
		config.select_production();
	}
}
