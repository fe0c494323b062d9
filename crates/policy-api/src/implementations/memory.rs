//! In-memory insurance backend.
//!
//! Implements the `traveling_abroad` endpoint surface in process: a product
//! catalogue, a certificate store with server-side option sets that narrow
//! with the chosen currency and tariff, and 404 after deletion. Used by the
//! scenario tests and by the runner's dry-run mode.
//!
//! Failure modes the scenario must detect can be switched on through the
//! builder methods: wrong create status, list-shaped create response, deletes
//! that are refused or acknowledged but not applied, corrupted PATCH echoes.

use crate::{ApiClientInterface, ApiError, ApiResponse, HttpMethod};
use async_trait::async_trait;
use policy_types::{fields, CountryOption, Product, ProductId};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shape of the `data` member in a create response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateShape {
	/// `{"data": {...}}`
	Singleton,
	/// `{"data": [{...}]}`
	List,
}

/// A request received by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
	pub method: HttpMethod,
	pub path: String,
	pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Behaviour {
	create_status: u16,
	create_shape: CreateShape,
	honour_deletes: bool,
	delete_status: u16,
	countries: Vec<CountryOption>,
	currencies: Vec<String>,
	echo_overrides: Map<String, Value>,
}

#[derive(Debug)]
struct BackendState {
	products: Vec<Product>,
	certificates: HashMap<i64, Map<String, Value>>,
	next_id: i64,
	requests: Vec<RecordedRequest>,
}

/// In-process stand-in for the insurance backend.
///
/// Clones share the same store, so a test can keep a handle for inspection
/// after boxing another clone into an `InsuranceApiService`.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
	state: Arc<RwLock<BackendState>>,
	behaviour: Behaviour,
}

impl Default for InMemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryBackend {
	pub fn new() -> Self {
		let products = [(165, "Medical"), (166, "Traveling abroad"), (170, "Property")]
			.into_iter()
			.map(|(id, title)| {
				let mut product = Product::new(id);
				product.extra.insert("title".into(), json!(title));
				product
			})
			.collect();

		let countries = [
			(10, "Australia"),
			(11, "France"),
			(12, "Angola"),
			(13, "Japan"),
			(14, "Mozambique"),
			(15, "Germany"),
		]
		.into_iter()
		.map(|(id, name)| CountryOption {
			id,
			name: name.to_string(),
		})
		.collect();

		Self {
			state: Arc::new(RwLock::new(BackendState {
				products,
				certificates: HashMap::new(),
				next_id: 1000,
				requests: Vec::new(),
			})),
			behaviour: Behaviour {
				create_status: 201,
				create_shape: CreateShape::Singleton,
				honour_deletes: true,
				delete_status: 204,
				countries,
				currencies: vec!["USD".into(), "EUR".into()],
				echo_overrides: Map::new(),
			},
		}
	}

	/// Replaces the product catalogue.
	pub fn with_products(self, ids: &[ProductId]) -> Self {
		if let Ok(mut state) = self.state.try_write() {
			state.products = ids.iter().copied().map(Product::new).collect();
		}
		self
	}

	/// Replaces the country catalogue.
	pub fn with_countries(mut self, countries: &[(i64, &str)]) -> Self {
		self.behaviour.countries = countries
			.iter()
			.map(|(id, name)| CountryOption {
				id: *id,
				name: name.to_string(),
			})
			.collect();
		self
	}

	/// Replaces the offered currencies.
	pub fn with_currencies(mut self, codes: &[&str]) -> Self {
		self.behaviour.currencies = codes.iter().map(|code| code.to_string()).collect();
		self
	}

	pub fn with_create_status(mut self, status: u16) -> Self {
		self.behaviour.create_status = status;
		self
	}

	pub fn with_create_shape(mut self, shape: CreateShape) -> Self {
		self.behaviour.create_shape = shape;
		self
	}

	/// Acknowledge DELETE with 204 but keep the certificate.
	pub fn ignoring_deletes(mut self) -> Self {
		self.behaviour.honour_deletes = false;
		self
	}

	/// Refuse DELETE with `status`, keeping the certificate.
	pub fn with_delete_status(mut self, status: u16) -> Self {
		self.behaviour.delete_status = status;
		self
	}

	/// Report `value` for `field` in every PATCH response.
	pub fn with_echo_override(mut self, field: &str, value: Value) -> Self {
		self.behaviour.echo_overrides.insert(field.to_string(), value);
		self
	}

	/// Requests received so far, in arrival order.
	pub async fn requests(&self) -> Vec<RecordedRequest> {
		self.state.read().await.requests.clone()
	}

	/// Number of live certificates.
	pub async fn certificate_count(&self) -> usize {
		self.state.read().await.certificates.len()
	}

	async fn handle(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> ApiResponse {
		let mut state = self.state.write().await;
		state.requests.push(RecordedRequest {
			method,
			path: path.to_string(),
			body: body.cloned(),
		});

		let trimmed = path.trim_start_matches("./").trim_matches('/');
		let segments: Vec<&str> = trimmed.split('/').collect();

		match (method, segments.as_slice()) {
			(HttpMethod::Get, ["traveling_abroad"]) => {
				ApiResponse::new(200, json!({ "data": state.products }))
			},
			(HttpMethod::Get, ["traveling_abroad", id]) => {
				match id
					.parse::<ProductId>()
					.ok()
					.and_then(|id| state.products.iter().find(|p| p.id == id))
				{
					Some(product) => ApiResponse::new(200, json!({ "data": product })),
					None => not_found(),
				}
			},
			(HttpMethod::Post, ["traveling_abroad_certificate"]) => {
				self.create(&mut state, body)
			},
			(method, ["traveling_abroad_certificate", id]) => {
				let Some(id) = id.parse::<i64>().ok().filter(|id| state.certificates.contains_key(id))
				else {
					return not_found();
				};
				match method {
					HttpMethod::Get => match state.certificates.get(&id) {
						Some(record) => ApiResponse::new(200, json!({ "data": self.render(record) })),
						None => not_found(),
					},
					HttpMethod::Patch => self.update(&mut state, id, body),
					HttpMethod::Delete => {
						let status = self.behaviour.delete_status;
						if !(200..300).contains(&status) {
							return ApiResponse::new(status, json!({ "detail": "Delete refused." }));
						}
						if self.behaviour.honour_deletes {
							state.certificates.remove(&id);
						}
						ApiResponse::new(status, Value::Null)
					},
					HttpMethod::Post => method_not_allowed(),
				}
			},
			(_, ["traveling_abroad"]) | (_, ["traveling_abroad", _]) => method_not_allowed(),
			(_, ["traveling_abroad_certificate"]) => method_not_allowed(),
			_ => not_found(),
		}
	}

	fn create(&self, state: &mut BackendState, body: Option<&Value>) -> ApiResponse {
		let product = body
			.and_then(|b| b.get(fields::TRAVELING_ABROAD))
			.and_then(Value::as_i64)
			.filter(|id| state.products.iter().any(|p| p.id == *id));
		let Some(product) = product else {
			return bad_request(fields::TRAVELING_ABROAD, "Invalid pk - object does not exist.");
		};
		let is_available = body
			.and_then(|b| b.get(fields::IS_AVAILABLE))
			.and_then(Value::as_bool)
			.unwrap_or(false);

		let id = state.next_id;
		state.next_id += 1;

		let mut record = Map::new();
		record.insert("id".into(), json!(id));
		record.insert(fields::IS_AVAILABLE.into(), json!(is_available));
		record.insert(fields::TRAVELING_ABROAD.into(), json!(product));
		record.insert(fields::COUNTRY.into(), json!([]));
		record.insert(fields::CURRENCY_TYPE.into(), Value::Null);
		state.certificates.insert(id, record.clone());

		let rendered = self.render(&record);
		let data = match self.behaviour.create_shape {
			CreateShape::Singleton => rendered,
			CreateShape::List => json!([rendered]),
		};
		ApiResponse::new(self.behaviour.create_status, json!({ "data": data }))
	}

	fn update(&self, state: &mut BackendState, id: i64, body: Option<&Value>) -> ApiResponse {
		let Some(patch) = body.and_then(Value::as_object) else {
			return bad_request("non_field_errors", "Expected a JSON object.");
		};
		let Some(stored) = state.certificates.get(&id) else {
			return not_found();
		};

		let mut record = stored.clone();
		for (field, value) in patch {
			record.insert(field.clone(), value.clone());
		}

		if let Some(countries) = patch.get(fields::COUNTRY) {
			match self.resolve_countries(countries) {
				Some(resolved) => {
					record.insert(fields::COUNTRY.into(), resolved);
				},
				None => return bad_request(fields::COUNTRY, "Invalid pk - object does not exist."),
			}
		}

		if let Some(currency) = patch.get(fields::CURRENCY_TYPE) {
			let offered = currency
				.as_str()
				.is_some_and(|code| self.behaviour.currencies.iter().any(|c| c == code));
			if !offered {
				return bad_request(fields::CURRENCY_TYPE, "Not a valid choice.");
			}
		}

		let currency = record.get(fields::CURRENCY_TYPE).and_then(Value::as_str);
		for field in [fields::ONE_TIME_TARIFF, fields::MULTIPLE_TARIFF] {
			if let Some(tariff) = patch.get(field) {
				let offered = tariff
					.as_i64()
					.is_some_and(|t| tariffs_for(currency).contains(&t));
				if !offered {
					return bad_request(field, "Tariff is not available.");
				}
			}
		}

		let tariff = current_tariff(&record);
		for field in [fields::AMOUNT_ONE_TIME_TARIFF, fields::AMOUNT_MULTIPLE_TARIFF] {
			if let Some(amount) = patch.get(field) {
				let offered = amount
					.as_i64()
					.is_some_and(|a| amounts_for(tariff).contains(&a));
				if !offered {
					return bad_request(field, "Amount is not available.");
				}
			}
		}

		let mut rendered = self.render(&record);
		state.certificates.insert(id, record);

		if let Some(data) = rendered.as_object_mut() {
			for (field, value) in &self.behaviour.echo_overrides {
				data.insert(field.clone(), value.clone());
			}
		}
		ApiResponse::new(200, json!({ "data": rendered }))
	}

	/// Country ids to `{id, name}` objects; `None` if any id is unknown.
	fn resolve_countries(&self, value: &Value) -> Option<Value> {
		value
			.as_array()?
			.iter()
			.map(|id| {
				let id = id.as_i64()?;
				self.behaviour
					.countries
					.iter()
					.find(|c| c.id == id)
					.map(|c| json!({ "id": c.id, "name": c.name }))
			})
			.collect::<Option<Vec<_>>>()
			.map(Value::Array)
	}

	fn render(&self, record: &Map<String, Value>) -> Value {
		let currency = record.get(fields::CURRENCY_TYPE).and_then(Value::as_str);
		let tariff = current_tariff(record);

		let mut data = record.clone();
		data.insert(
			"available_countries".into(),
			json!(self.behaviour.countries),
		);
		data.insert(
			"available_currencies".into(),
			json!(self.behaviour.currencies),
		);
		data.insert(
			"tariff_available".into(),
			Value::Array(
				tariffs_for(currency)
					.into_iter()
					.map(|id| json!({ "id": id, "title": format!("Tariff {}", id) }))
					.collect(),
			),
		);
		data.insert(
			"amount_available".into(),
			Value::Array(
				amounts_for(tariff)
					.into_iter()
					.map(|id| json!({ "id": id }))
					.collect(),
			),
		);
		Value::Object(data)
	}
}

/// Tariffs depend on the chosen currency; without one the USD set applies.
fn tariffs_for(currency: Option<&str>) -> Vec<i64> {
	match currency {
		Some("EUR") => vec![21],
		_ => vec![11, 12],
	}
}

/// Amounts depend on the chosen tariff; without one the first tariff's set applies.
fn amounts_for(tariff: Option<i64>) -> Vec<i64> {
	match tariff {
		Some(12) => vec![71],
		Some(21) => vec![72],
		_ => vec![69, 70],
	}
}

fn current_tariff(record: &Map<String, Value>) -> Option<i64> {
	record
		.get(fields::MULTIPLE_TARIFF)
		.and_then(Value::as_i64)
		.or_else(|| record.get(fields::ONE_TIME_TARIFF).and_then(Value::as_i64))
}

fn not_found() -> ApiResponse {
	ApiResponse::new(404, json!({ "detail": "Not found." }))
}

fn method_not_allowed() -> ApiResponse {
	ApiResponse::new(405, json!({ "detail": "Method not allowed." }))
}

fn bad_request(field: &str, message: &str) -> ApiResponse {
	ApiResponse::new(400, json!({ "errors": { field: [message] } }))
}

#[async_trait]
impl ApiClientInterface for InMemoryBackend {
	async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
		Ok(self.handle(HttpMethod::Get, path, None).await)
	}

	async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
		Ok(self.handle(HttpMethod::Post, path, Some(body)).await)
	}

	async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
		Ok(self.handle(HttpMethod::Patch, path, Some(body)).await)
	}

	async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
		Ok(self.handle(HttpMethod::Delete, path, None).await)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn create(backend: &InMemoryBackend) -> i64 {
		let response = backend
			.post(
				"traveling_abroad_certificate",
				&json!({"is_available": true, "traveling_abroad": 166}),
			)
			.await
			.unwrap();
		assert_eq!(response.status, 201);
		response.body["data"]["id"].as_i64().unwrap()
	}

	#[tokio::test]
	async fn test_product_endpoints() {
		let backend = InMemoryBackend::new();
		let list = backend.get("./traveling_abroad").await.unwrap();
		assert_eq!(list.status, 200);
		assert_eq!(list.body["data"].as_array().unwrap().len(), 3);

		let product = backend.get("traveling_abroad/166").await.unwrap();
		assert_eq!(product.body["data"]["id"], json!(166));

		let missing = backend.get("traveling_abroad/1").await.unwrap();
		assert_eq!(missing.status, 404);
	}

	#[tokio::test]
	async fn test_replaced_catalogue() {
		let backend = InMemoryBackend::new().with_products(&[7]);
		let list = backend.get("traveling_abroad").await.unwrap();
		assert_eq!(list.body, json!({"data": [{"id": 7}]}));
		assert_eq!(backend.get("traveling_abroad/166").await.unwrap().status, 404);
	}

	#[tokio::test]
	async fn test_create_rejects_unknown_product() {
		let backend = InMemoryBackend::new();
		let response = backend
			.post("traveling_abroad_certificate", &json!({"traveling_abroad": 1}))
			.await
			.unwrap();
		assert_eq!(response.status, 400);
		assert_eq!(backend.certificate_count().await, 0);
	}

	#[tokio::test]
	async fn test_list_shaped_create_response() {
		let backend = InMemoryBackend::new().with_create_shape(CreateShape::List);
		let response = backend
			.post(
				"traveling_abroad_certificate",
				&json!({"is_available": true, "traveling_abroad": 166}),
			)
			.await
			.unwrap();
		assert!(response.body["data"].is_array());
		assert!(response.body["data"][0]["id"].is_i64());
	}

	#[tokio::test]
	async fn test_patch_narrows_option_sets() {
		let backend = InMemoryBackend::new();
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		let response = backend
			.patch(&path, &json!({"currency_type": "EUR"}))
			.await
			.unwrap();
		assert_eq!(response.status, 200);
		assert_eq!(response.body["data"]["tariff_available"][0]["id"], json!(21));

		let response = backend
			.patch(&path, &json!({"multiple_tariff": 21}))
			.await
			.unwrap();
		assert_eq!(response.body["data"]["amount_available"], json!([{"id": 72}]));

		let rejected = backend
			.patch(&path, &json!({"amount_multiple_tariff": 69}))
			.await
			.unwrap();
		assert_eq!(rejected.status, 400);
	}

	#[tokio::test]
	async fn test_patch_resolves_countries() {
		let backend = InMemoryBackend::new();
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		let response = backend.patch(&path, &json!({"country": [13, 12]})).await.unwrap();
		assert_eq!(
			response.body["data"]["country"],
			json!([{"id": 13, "name": "Japan"}, {"id": 12, "name": "Angola"}])
		);

		let rejected = backend.patch(&path, &json!({"country": [999]})).await.unwrap();
		assert_eq!(rejected.status, 400);
	}

	#[tokio::test]
	async fn test_delete_then_gone() {
		let backend = InMemoryBackend::new();
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		assert_eq!(backend.delete(&path).await.unwrap().status, 204);
		assert_eq!(backend.get(&path).await.unwrap().status, 404);
		assert_eq!(backend.get(&path).await.unwrap().status, 404);
		assert_eq!(backend.delete(&path).await.unwrap().status, 404);
	}

	#[tokio::test]
	async fn test_ignoring_deletes_keeps_certificate() {
		let backend = InMemoryBackend::new().ignoring_deletes();
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		assert_eq!(backend.delete(&path).await.unwrap().status, 204);
		assert_eq!(backend.get(&path).await.unwrap().status, 200);
	}

	#[tokio::test]
	async fn test_refused_delete_keeps_certificate() {
		let backend = InMemoryBackend::new().with_delete_status(500);
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		assert_eq!(backend.delete(&path).await.unwrap().status, 500);
		assert_eq!(backend.get(&path).await.unwrap().status, 200);
		assert_eq!(backend.certificate_count().await, 1);
	}

	#[tokio::test]
	async fn test_replaced_currencies() {
		let backend = InMemoryBackend::new().with_currencies(&["EUR"]);
		let id = create(&backend).await;
		let path = format!("traveling_abroad_certificate/{}", id);

		let order = backend.get(&path).await.unwrap();
		assert_eq!(order.body["data"]["available_currencies"], json!(["EUR"]));

		let rejected = backend
			.patch(&path, &json!({"currency_type": "USD"}))
			.await
			.unwrap();
		assert_eq!(rejected.status, 400);
		assert_eq!(
			rejected.body,
			json!({"errors": {"currency_type": ["Not a valid choice."]}})
		);
	}

	#[tokio::test]
	async fn test_requests_are_recorded_in_order() {
		let backend = InMemoryBackend::new();
		backend.get("traveling_abroad").await.unwrap();
		backend.delete("traveling_abroad_certificate/1").await.unwrap();

		let requests = backend.requests().await;
		assert_eq!(requests.len(), 2);
		assert_eq!(requests[0].method, HttpMethod::Get);
		assert_eq!(requests[1].method, HttpMethod::Delete);
		assert_eq!(requests[1].path, "traveling_abroad_certificate/1");
	}

	#[tokio::test]
	async fn test_fresh_id_per_create() {
		let backend = InMemoryBackend::new();
		let first = create(&backend).await;
		let second = create(&backend).await;
		assert_ne!(first, second);
	}
}
