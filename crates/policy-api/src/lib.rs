//! HTTP collaborator for the insurance backend.
//!
//! [`ApiClientInterface`] is the low-level request capability: one method per
//! HTTP verb, each returning the status code and the parsed JSON body.
//! [`InsuranceApiService`] wraps an implementation and exposes the endpoint
//! surface the order lifecycle scenario exercises.

use async_trait::async_trait;
use policy_types::{fields, CertificateId, OrderPatch, ProductId};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Relative endpoint paths.
pub mod paths {
	use policy_types::{CertificateId, ProductId};

	pub const PRODUCTS: &str = "traveling_abroad";
	pub const CERTIFICATES: &str = "traveling_abroad_certificate";

	pub fn product(id: ProductId) -> String {
		format!("{}/{}", PRODUCTS, id)
	}

	pub fn certificate(id: &CertificateId) -> String {
		format!("{}/{}", CERTIFICATES, id)
	}
}

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
	/// The request never produced a response (connection, timeout, TLS).
	#[error("Transport error: {0}")]
	Transport(String),
	/// The response body could not be read.
	#[error("Invalid response body: {0}")]
	InvalidBody(String),
	/// The client could not be constructed from configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// HTTP verbs used by the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	Get,
	Post,
	Patch,
	Delete,
}

impl fmt::Display for HttpMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Patch => "PATCH",
			HttpMethod::Delete => "DELETE",
		})
	}
}

/// Status code and parsed body of a response.
///
/// Bodies that are empty or not JSON are represented as `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
	pub status: u16,
	pub body: Value,
}

impl ApiResponse {
	pub fn new(status: u16, body: Value) -> Self {
		Self { status, body }
	}
}

/// Trait defining the request capability the scenario depends on.
///
/// Implementations carry the base URL and the authentication headers; callers
/// pass endpoint paths relative to the base URL.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApiClientInterface: Send + Sync {
	async fn get(&self, path: &str) -> Result<ApiResponse, ApiError>;

	async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError>;

	async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError>;

	async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError>;
}

/// Typed access to the insurance endpoints.
///
/// Methods return the raw [`ApiResponse`] so the caller decides which status
/// codes are acceptable.
pub struct InsuranceApiService {
	client: Box<dyn ApiClientInterface>,
}

impl InsuranceApiService {
	pub fn new(client: Box<dyn ApiClientInterface>) -> Self {
		Self { client }
	}

	/// `GET traveling_abroad`
	pub async fn list_products(&self) -> Result<ApiResponse, ApiError> {
		self.log(HttpMethod::Get, paths::PRODUCTS);
		self.client.get(paths::PRODUCTS).await
	}

	/// `GET traveling_abroad/{id}`
	pub async fn get_product(&self, id: ProductId) -> Result<ApiResponse, ApiError> {
		let path = paths::product(id);
		self.log(HttpMethod::Get, &path);
		self.client.get(&path).await
	}

	/// `POST traveling_abroad_certificate` with
	/// `{is_available: true, traveling_abroad: product}`.
	pub async fn create_certificate(&self, product: ProductId) -> Result<ApiResponse, ApiError> {
		let body = OrderPatch::new()
			.set(fields::IS_AVAILABLE, true)
			.set(fields::TRAVELING_ABROAD, product)
			.to_value();
		self.log(HttpMethod::Post, paths::CERTIFICATES);
		self.client.post(paths::CERTIFICATES, &body).await
	}

	/// `GET traveling_abroad_certificate/{id}`
	pub async fn get_certificate(&self, id: &CertificateId) -> Result<ApiResponse, ApiError> {
		let path = paths::certificate(id);
		self.log(HttpMethod::Get, &path);
		self.client.get(&path).await
	}

	/// `PATCH traveling_abroad_certificate/{id}`
	pub async fn patch_certificate(
		&self,
		id: &CertificateId,
		patch: &OrderPatch,
	) -> Result<ApiResponse, ApiError> {
		let path = paths::certificate(id);
		self.log(HttpMethod::Patch, &path);
		self.client.patch(&path, &patch.to_value()).await
	}

	/// `DELETE traveling_abroad_certificate/{id}`
	pub async fn delete_certificate(&self, id: &CertificateId) -> Result<ApiResponse, ApiError> {
		let path = paths::certificate(id);
		self.log(HttpMethod::Delete, &path);
		self.client.delete(&path).await
	}

	fn log(&self, method: HttpMethod, path: &str) {
		tracing::debug!(%method, path, "Sending request");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mockall::predicate::eq;
	use serde_json::json;

	#[test]
	fn test_paths() {
		assert_eq!(paths::product(166), "traveling_abroad/166");
		assert_eq!(
			paths::certificate(&CertificateId::from(5)),
			"traveling_abroad_certificate/5"
		);
	}

	#[tokio::test]
	async fn test_create_certificate_body() {
		let mut client = MockApiClientInterface::new();
		client
			.expect_post()
			.with(
				eq(paths::CERTIFICATES),
				eq(json!({"is_available": true, "traveling_abroad": 166})),
			)
			.times(1)
			.returning(|_, _| Ok(ApiResponse::new(201, json!({"data": {"id": 1}}))));

		let service = InsuranceApiService::new(Box::new(client));
		let response = service.create_certificate(166).await.unwrap();
		assert_eq!(response.status, 201);
	}

	#[tokio::test]
	async fn test_patch_sends_patch_body() {
		let mut client = MockApiClientInterface::new();
		client
			.expect_patch()
			.with(
				eq("traveling_abroad_certificate/9"),
				eq(json!({"period": 365})),
			)
			.times(1)
			.returning(|_, body| Ok(ApiResponse::new(200, json!({"data": body}))));

		let service = InsuranceApiService::new(Box::new(client));
		let patch = OrderPatch::new().set(fields::PERIOD, 365);
		let response = service
			.patch_certificate(&CertificateId::from(9), &patch)
			.await
			.unwrap();
		assert_eq!(response.body["data"]["period"], json!(365));
	}
}
