//! Configuration module for the insurance order lifecycle runner.
//!
//! Configuration is loaded from a TOML file in which `${VAR}` and
//! `${VAR:-default}` placeholders are resolved from the environment before
//! parsing. When no file is given, [`Config::from_env`] builds an equivalent
//! configuration from `AUTH_USERNAME`, `AUTH_PASSWORD` and `PRODUCTION`.
//!
//! Credentials have no built-in fallback: a missing username or password is a
//! configuration error.

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}
mod loader;

pub use loader::{ENV_PASSWORD, ENV_PRODUCTION, ENV_USERNAME};

use policy_types::{ProductId, SecretString, TariffKind, TripOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Connection settings for the insurance backend.
	pub api: ApiConfig,
	/// Parameters of the order lifecycle scenario.
	#[serde(default)]
	pub scenario: ScenarioConfig,
}

/// Which backend deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	#[default]
	Staging,
	Production,
}

/// Connection settings for the insurance backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Deployment selected when `base_url` is not set.
	#[serde(default)]
	pub environment: Environment,
	/// Base URL of the staging deployment.
	#[serde(default = "default_staging_url")]
	pub staging_url: String,
	/// Base URL of the production deployment.
	#[serde(default = "default_production_url")]
	pub production_url: String,
	/// Explicit base URL; wins over `environment`.
	#[serde(default)]
	pub base_url: Option<String>,
	/// Per-request timeout in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Basic authentication credentials.
	pub credentials: Credentials,
}

/// Basic authentication credentials.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
	pub username: String,
	pub password: SecretString,
}

/// How selection fields (country, currency, tariff, amount) are submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
	/// Country, tariff and amount ride along with the scalar-field PATCH.
	#[default]
	Combined,
	/// One PATCH per selection field, each picking from the previous response.
	Stepwise,
}

/// How the amount id is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AmountSelection {
	/// Submit this id in combined mode. Stepwise mode always submits the
	/// first amount offered for the chosen tariff.
	Fixed(i64),
	/// Submit the first entry of `amount_available`.
	Offered(OfferedAmount),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferedAmount {
	FirstAvailable,
}

/// Parameters of the order lifecycle scenario.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
	/// Product the order is created against.
	pub product_id: ProductId,
	/// Country names to keep from `available_countries`.
	pub acceptable_countries: Vec<String>,
	/// Offsets of `date_from` / `date_to` from today.
	pub trip_offset_days: TripOffset,
	/// Submitted as `days_count`.
	pub trip_duration_days: u32,
	/// Require exactly 201 on order creation instead of any 2xx.
	pub strict_status_codes: bool,
	pub update_mode: UpdateMode,
	/// Which tariff/amount field pair to fill.
	pub tariff_kind: TariffKind,
	/// Amount id to submit, or `"first_available"`.
	pub amount: AmountSelection,
	pub insuring_type: String,
	pub period: u32,
	pub start_alien: bool,
	pub traveling_type: String,
	/// Abort when none of `acceptable_countries` is offered instead of
	/// submitting an empty country set.
	pub require_country_match: bool,
	/// Number of GETs issued after deletion; each must answer 404.
	pub deletion_probes: u32,
}

impl Default for ScenarioConfig {
	fn default() -> Self {
		Self {
			product_id: 166,
			acceptable_countries: ["Japan", "Australia", "Mozambique", "Angola"]
				.into_iter()
				.map(String::from)
				.collect(),
			trip_offset_days: TripOffset::default(),
			trip_duration_days: 20,
			strict_status_codes: false,
			update_mode: UpdateMode::default(),
			tariff_kind: TariffKind::default(),
			amount: AmountSelection::Fixed(69),
			insuring_type: "Физлицо".to_string(),
			period: 365,
			start_alien: false,
			traveling_type: "Однократная".to_string(),
			require_country_match: false,
			deletion_probes: 1,
		}
	}
}

fn default_staging_url() -> String {
	"http://insurance-backend-stg.i.bestdoctor.dev/api/".to_string()
}

fn default_production_url() -> String {
	"https://b2b.bestinsure.tech/api/".to_string()
}

fn default_timeout_seconds() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a TOML file, then applies `PRODUCTION` from
	/// the process environment.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		loader::load_config(path.as_ref(), |key| std::env::var(key).ok()).await
	}

	/// Builds configuration from `AUTH_USERNAME`, `AUTH_PASSWORD` and
	/// `PRODUCTION` with every other setting at its default.
	pub fn from_env() -> Result<Self, ConfigError> {
		loader::config_from_env(|key| std::env::var(key).ok())
	}

	/// Selects the production deployment. An explicit `base_url` still wins
	/// over the environment, which is logged.
	pub fn select_production(&mut self) {
		self.api.environment = Environment::Production;
		if let Some(url) = &self.api.base_url {
			tracing::warn!(
				base_url = %url,
				"Production requested but base_url is set, requests go to base_url"
			);
		}
	}

	/// Base URL of the selected deployment, always ending with `/` so that
	/// relative endpoint paths join under it.
	pub fn base_url(&self) -> String {
		let url = match (&self.api.base_url, self.api.environment) {
			(Some(url), _) => url.as_str(),
			(None, Environment::Staging) => self.api.staging_url.as_str(),
			(None, Environment::Production) => self.api.production_url.as_str(),
		};
		if url.ends_with('/') {
			url.to_string()
		} else {
			format!("{}/", url)
		}
	}

	/// Validates the configuration.
	///
	/// Checks credentials, the selected base URL, the request timeout and the
	/// scenario parameters.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let credentials = &self.api.credentials;
		if credentials.username.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Credentials username cannot be empty".into(),
			));
		}
		if credentials.password.is_empty() {
			return Err(ConfigError::Validation(
				"Credentials password cannot be empty".into(),
			));
		}

		let base_url = self.base_url();
		let url = Url::parse(&base_url).map_err(|e| {
			ConfigError::Validation(format!("Base URL '{}' is invalid: {}", base_url, e))
		})?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(ConfigError::Validation(format!(
				"Base URL '{}' must use http or https",
				base_url
			)));
		}
		if url.host_str().is_none_or(str::is_empty) {
			return Err(ConfigError::Validation(format!(
				"Base URL '{}' has no host",
				base_url
			)));
		}

		if self.api.timeout_seconds == 0 || self.api.timeout_seconds > 300 {
			return Err(ConfigError::Validation(
				"timeout_seconds must be between 1 and 300".into(),
			));
		}

		let scenario = &self.scenario;
		if scenario.trip_offset_days.start > scenario.trip_offset_days.end {
			return Err(ConfigError::Validation(format!(
				"trip_offset_days.start ({}) cannot be after trip_offset_days.end ({})",
				scenario.trip_offset_days.start, scenario.trip_offset_days.end
			)));
		}
		if scenario.deletion_probes == 0 {
			return Err(ConfigError::Validation(
				"deletion_probes must be at least 1".into(),
			));
		}
		if scenario.acceptable_countries.is_empty() {
			return Err(ConfigError::Validation(
				"acceptable_countries cannot be empty".into(),
			));
		}
		if scenario.insuring_type.trim().is_empty() {
			return Err(ConfigError::Validation(
				"insuring_type cannot be empty".into(),
			));
		}
		if scenario.traveling_type.trim().is_empty() {
			return Err(ConfigError::Validation(
				"traveling_type cannot be empty".into(),
			));
		}

		Ok(())
	}
}

/// Parses TOML after resolving environment placeholders, then validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
