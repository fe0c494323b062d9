//! Response envelope handling.
//!
//! Every backend response wraps its payload under a top-level `data` key.
//! Certificate creation is inconsistent about what it puts there: sometimes
//! the new record itself, sometimes a list whose first element is the new
//! record. [`extract_singleton_or_first`] accepts both shapes.

use crate::CertificateId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while unwrapping a response body.
#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
	/// The body has no `data` key.
	#[error("Response body has no 'data' field")]
	MissingData,
	/// `data` is neither an object with an id nor a non-empty list.
	#[error("Response 'data' has no record with an 'id': {0}")]
	NoRecord(String),
	/// `data` does not match the expected payload type.
	#[error("Unexpected 'data' payload: {0}")]
	Decode(String),
}

/// The `{ "data": ... }` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
	pub data: T,
}

impl<T> Envelope<T> {
	pub fn new(data: T) -> Self {
		Self { data }
	}
}

impl<T: DeserializeOwned> Envelope<T> {
	/// Decodes the `data` member of a raw response body.
	pub fn decode(body: &Value) -> Result<T, EnvelopeError> {
		let data = body.get("data").ok_or(EnvelopeError::MissingData)?;
		serde_json::from_value(data.clone()).map_err(|e| EnvelopeError::Decode(e.to_string()))
	}
}

/// Returns the record carried by `data`, trying `data.id` first and falling
/// back to `data[0].id`.
pub fn extract_singleton_or_first(body: &Value) -> Result<&Value, EnvelopeError> {
	let data = body.get("data").ok_or(EnvelopeError::MissingData)?;

	if data.get("id").is_some_and(|id| !id.is_null()) {
		return Ok(data);
	}

	match data.as_array().and_then(|items| items.first()) {
		Some(first) if first.get("id").is_some_and(|id| !id.is_null()) => Ok(first),
		_ => Err(EnvelopeError::NoRecord(data.to_string())),
	}
}

/// Extracts the new certificate id from a create response.
pub fn extract_certificate_id(body: &Value) -> Result<CertificateId, EnvelopeError> {
	let record = extract_singleton_or_first(body)?;
	record
		.get("id")
		.and_then(CertificateId::from_json)
		.ok_or_else(|| EnvelopeError::NoRecord(record.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_singleton_shape() {
		let body = json!({"data": {"id": 7, "is_available": true}});
		assert_eq!(extract_certificate_id(&body).unwrap(), CertificateId::from(7));
	}

	#[test]
	fn test_list_shape_uses_first_element() {
		let body = json!({"data": [{"id": 8}, {"id": 9}]});
		assert_eq!(extract_certificate_id(&body).unwrap(), CertificateId::from(8));
	}

	#[test]
	fn test_singleton_wins_over_list_fallback() {
		let body = json!({"data": {"id": "x-1"}});
		assert_eq!(extract_certificate_id(&body).unwrap().as_str(), "x-1");
	}

	#[test]
	fn test_missing_record() {
		assert_eq!(
			extract_certificate_id(&json!({"errors": []})),
			Err(EnvelopeError::MissingData)
		);
		assert!(matches!(
			extract_certificate_id(&json!({"data": []})),
			Err(EnvelopeError::NoRecord(_))
		));
		assert!(matches!(
			extract_certificate_id(&json!({"data": {"id": null}})),
			Err(EnvelopeError::NoRecord(_))
		));
	}

	#[test]
	fn test_decode_typed_payload() {
		let body = json!({"data": [{"id": 1}, {"id": 166}]});
		let products: Vec<crate::Product> = Envelope::decode(&body).unwrap();
		assert_eq!(products.len(), 2);
		assert!(Envelope::<Vec<crate::Product>>::decode(&json!({"data": 5})).is_err());
	}
}
