//! Configuration builder for tests.
//!
//! Produces valid `Config` instances pointed at an arbitrary base URL, so
//! scenario tests can run against an in-memory backend or a mock.

use crate::{
	AmountSelection, ApiConfig, Config, Credentials, Environment, ScenarioConfig, UpdateMode,
};
use policy_types::TariffKind;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	base_url: String,
	username: String,
	password: String,
	scenario: ScenarioConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a builder with test credentials and default scenario settings.
	pub fn new() -> Self {
		Self {
			base_url: "http://localhost:8080/api/".to_string(),
			username: "tester@example.com".to_string(),
			password: "test-password".to_string(),
			scenario: ScenarioConfig::default(),
		}
	}

	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();
		self
	}

	pub fn product_id(mut self, id: i64) -> Self {
		self.scenario.product_id = id;
		self
	}

	pub fn acceptable_countries(mut self, names: &[&str]) -> Self {
		self.scenario.acceptable_countries = names.iter().map(|n| n.to_string()).collect();
		self
	}

	pub fn strict_status_codes(mut self, strict: bool) -> Self {
		self.scenario.strict_status_codes = strict;
		self
	}

	pub fn update_mode(mut self, mode: UpdateMode) -> Self {
		self.scenario.update_mode = mode;
		self
	}

	pub fn tariff_kind(mut self, kind: TariffKind) -> Self {
		self.scenario.tariff_kind = kind;
		self
	}

	pub fn amount(mut self, amount: AmountSelection) -> Self {
		self.scenario.amount = amount;
		self
	}

	pub fn require_country_match(mut self, required: bool) -> Self {
		self.scenario.require_country_match = required;
		self
	}

	pub fn deletion_probes(mut self, probes: u32) -> Self {
		self.scenario.deletion_probes = probes;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			api: ApiConfig {
				environment: Environment::Staging,
				staging_url: crate::default_staging_url(),
				production_url: crate::default_production_url(),
				base_url: Some(self.base_url),
				timeout_seconds: 5,
				credentials: Credentials {
					username: self.username,
					password: self.password.into(),
				},
			},
			scenario: self.scenario,
		}
	}
}
