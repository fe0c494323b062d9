//! Product payloads.
//!
//! Products are insurance offerings listed by the backend. The runner only
//! relies on the numeric id; every other field is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable numeric identifier of an insurance product.
pub type ProductId = i64;

/// An insurance offering as returned by `traveling_abroad` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
	/// Product identifier.
	pub id: ProductId,
	/// Remaining fields, opaque to the runner.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Product {
	/// Creates a product with no extra fields.
	pub fn new(id: ProductId) -> Self {
		Self {
			id,
			extra: Map::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_product_keeps_unknown_fields() {
		let product: Product = serde_json::from_value(json!({
			"id": 166,
			"title": "Traveling abroad",
			"is_active": true
		}))
		.unwrap();

		assert_eq!(product.id, 166);
		assert_eq!(product.extra.get("title"), Some(&json!("Traveling abroad")));
		assert_eq!(product.extra.get("is_active"), Some(&json!(true)));
	}
}
