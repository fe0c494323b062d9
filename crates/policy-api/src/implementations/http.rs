//! reqwest-backed implementation of the request capability.
//!
//! The client is built once with the base URL, the request timeout and the
//! default headers (`Accept: application/json` and Basic authorization), so
//! every call only supplies a relative path and an optional JSON body.

use crate::{ApiClientInterface, ApiError, ApiResponse, HttpMethod};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use policy_config::{Config, Credentials};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP client bound to one backend deployment.
pub struct HttpApiClient {
	client: Client,
	base_url: Url,
}

impl HttpApiClient {
	/// Creates a client rooted at `base_url`.
	pub fn new(
		base_url: &str,
		credentials: &Credentials,
		timeout: Duration,
	) -> Result<Self, ApiError> {
		let base_url = Url::parse(base_url)
			.map_err(|e| ApiError::Configuration(format!("Invalid base URL '{}': {}", base_url, e)))?;

		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		let mut authorization = HeaderValue::from_str(&basic_authorization(credentials))
			.map_err(|e| ApiError::Configuration(format!("Invalid credentials: {}", e)))?;
		authorization.set_sensitive(true);
		headers.insert(AUTHORIZATION, authorization);

		let client = Client::builder()
			.default_headers(headers)
			.timeout(timeout)
			.pool_idle_timeout(Duration::from_secs(90))
			.build()
			.map_err(|e| ApiError::Configuration(e.to_string()))?;

		Ok(Self { client, base_url })
	}

	/// Creates a client for the deployment selected by `config`.
	pub fn from_config(config: &Config) -> Result<Self, ApiError> {
		Self::new(
			&config.base_url(),
			&config.api.credentials,
			Duration::from_secs(config.api.timeout_seconds),
		)
	}

	/// Resolves a relative endpoint path against the base URL.
	fn url(&self, path: &str) -> Result<Url, ApiError> {
		let relative = path.trim_start_matches("./").trim_start_matches('/');
		self.base_url
			.join(relative)
			.map_err(|e| ApiError::Configuration(format!("Invalid path '{}': {}", path, e)))
	}

	async fn send(
		&self,
		method: HttpMethod,
		path: &str,
		body: Option<&Value>,
	) -> Result<ApiResponse, ApiError> {
		let url = self.url(path)?;
		let request = match method {
			HttpMethod::Get => self.client.get(url),
			HttpMethod::Post => self.client.post(url),
			HttpMethod::Patch => self.client.patch(url),
			HttpMethod::Delete => self.client.delete(url),
		};
		let request = match body {
			Some(body) => request.json(body),
			None => request,
		};

		let response = request
			.send()
			.await
			.map_err(|e| ApiError::Transport(format!("{} {}: {}", method, path, e)))?;
		let status = response.status().as_u16();
		let bytes = response
			.bytes()
			.await
			.map_err(|e| ApiError::InvalidBody(format!("{} {}: {}", method, path, e)))?;

		tracing::debug!(%method, path, status, "Received response");
		Ok(ApiResponse::new(status, parse_body(&bytes)))
	}
}

/// `Basic base64(username:password)`
fn basic_authorization(credentials: &Credentials) -> String {
	let encoded = credentials.password.with_exposed(|password| {
		STANDARD.encode(format!("{}:{}", credentials.username, password))
	});
	format!("Basic {}", encoded)
}

/// Empty and non-JSON bodies become `Value::Null`.
fn parse_body(bytes: &[u8]) -> Value {
	if bytes.is_empty() {
		return Value::Null;
	}
	serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

#[async_trait]
impl ApiClientInterface for HttpApiClient {
	async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
		self.send(HttpMethod::Get, path, None).await
	}

	async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
		self.send(HttpMethod::Post, path, Some(body)).await
	}

	async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
		self.send(HttpMethod::Patch, path, Some(body)).await
	}

	async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
		self.send(HttpMethod::Delete, path, None).await
	}
}
