//! Partial certificate updates.
//!
//! An [`OrderPatch`] is the body of a PATCH call. It keeps the submission
//! order of its fields so that echo verification walks them in the same
//! order they were sent and always reports the first mismatch.

use crate::TripWindow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Wire names of certificate fields.
pub mod fields {
	pub const IS_AVAILABLE: &str = "is_available";
	pub const TRAVELING_ABROAD: &str = "traveling_abroad";
	pub const COUNTRY: &str = "country";
	pub const CURRENCY_TYPE: &str = "currency_type";
	pub const ONE_TIME_TARIFF: &str = "one_time_tariff";
	pub const MULTIPLE_TARIFF: &str = "multiple_tariff";
	pub const AMOUNT_ONE_TIME_TARIFF: &str = "amount_one_time_tariff";
	pub const AMOUNT_MULTIPLE_TARIFF: &str = "amount_multiple_tariff";
	pub const DATE_FROM: &str = "date_from";
	pub const DATE_TO: &str = "date_to";
	pub const DAYS_COUNT: &str = "days_count";
	pub const INSURING_TYPE: &str = "insuring_type";
	pub const PERIOD: &str = "period";
	pub const START_ALIEN: &str = "start_alien";
	pub const TRAVELING_TYPE: &str = "traveling_type";
}

/// Which tariff/amount field pair a certificate is priced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffKind {
	OneTime,
	#[default]
	Multiple,
}

impl TariffKind {
	pub fn tariff_field(self) -> &'static str {
		match self {
			TariffKind::OneTime => fields::ONE_TIME_TARIFF,
			TariffKind::Multiple => fields::MULTIPLE_TARIFF,
		}
	}

	pub fn amount_field(self) -> &'static str {
		match self {
			TariffKind::OneTime => fields::AMOUNT_ONE_TIME_TARIFF,
			TariffKind::Multiple => fields::AMOUNT_MULTIPLE_TARIFF,
		}
	}
}

/// A field that came back different from what was submitted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Field '{field}' expected {expected}, got {actual}")]
pub struct EchoMismatch {
	pub field: String,
	pub expected: Value,
	pub actual: Value,
}

/// Body of a PATCH request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPatch(Map<String, Value>);

impl OrderPatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a raw field.
	pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
		self.0.insert(field.to_string(), value.into());
		self
	}

	pub fn countries(self, ids: &[i64]) -> Self {
		self.set(fields::COUNTRY, ids.to_vec())
	}

	pub fn currency(self, code: &str) -> Self {
		self.set(fields::CURRENCY_TYPE, code)
	}

	pub fn tariff(self, kind: TariffKind, id: i64) -> Self {
		self.set(kind.tariff_field(), id)
	}

	pub fn amount(self, kind: TariffKind, id: i64) -> Self {
		self.set(kind.amount_field(), id)
	}

	pub fn trip(self, window: &TripWindow) -> Self {
		self.set(fields::DATE_FROM, window.date_from())
			.set(fields::DATE_TO, window.date_to())
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn to_value(&self) -> Value {
		Value::Object(self.0.clone())
	}

	/// Checks that `echoed` carries every submitted field with an equal value.
	///
	/// Scalars must be equal. `country` is compared as a set of ids, the echo
	/// being either a list of ids or a list of `{id, name}` objects.
	pub fn verify_echo(&self, echoed: &Map<String, Value>) -> Result<(), EchoMismatch> {
		for (field, expected) in &self.0 {
			let actual = echoed.get(field).cloned().unwrap_or(Value::Null);
			let matches = if field == fields::COUNTRY {
				match (id_set(expected), id_set(&actual)) {
					(Some(sent), Some(got)) => sent == got,
					_ => false,
				}
			} else {
				*expected == actual
			};

			if !matches {
				return Err(EchoMismatch {
					field: field.clone(),
					expected: expected.clone(),
					actual,
				});
			}
		}
		Ok(())
	}
}

/// Collects the ids of a list of ids or of `{id, ...}` objects.
fn id_set(value: &Value) -> Option<BTreeSet<i64>> {
	value
		.as_array()?
		.iter()
		.map(|item| match item {
			Value::Number(n) => n.as_i64(),
			Value::Object(obj) => obj.get("id").and_then(Value::as_i64),
			_ => None,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn echoed(value: Value) -> Map<String, Value> {
		value.as_object().cloned().unwrap()
	}

	#[test]
	fn test_patch_preserves_submission_order() {
		let patch = OrderPatch::new()
			.amount(TariffKind::Multiple, 69)
			.countries(&[3, 1])
			.set(fields::DAYS_COUNT, 20);
		let keys: Vec<_> = patch.keys().collect();
		assert_eq!(
			keys,
			vec![fields::AMOUNT_MULTIPLE_TARIFF, fields::COUNTRY, fields::DAYS_COUNT]
		);
		assert_eq!(patch.to_value()[fields::COUNTRY], json!([3, 1]));
	}

	#[test]
	fn test_echo_country_compared_as_id_set() {
		let patch = OrderPatch::new().countries(&[3, 1]);
		let response = echoed(json!({
			"country": [{"id": 1, "name": "Angola"}, {"id": 3, "name": "Japan"}]
		}));
		assert!(patch.verify_echo(&response).is_ok());

		let missing_one = echoed(json!({"country": [{"id": 1, "name": "Angola"}]}));
		let err = patch.verify_echo(&missing_one).unwrap_err();
		assert_eq!(err.field, fields::COUNTRY);
	}

	#[test]
	fn test_echo_empty_country_set() {
		let patch = OrderPatch::new().countries(&[]);
		assert!(patch.verify_echo(&echoed(json!({"country": []}))).is_ok());
	}

	#[test]
	fn test_echo_scalar_mismatch_reports_values() {
		let patch = OrderPatch::new()
			.set(fields::PERIOD, 365)
			.set(fields::START_ALIEN, false);
		let err = patch
			.verify_echo(&echoed(json!({"period": 365, "start_alien": true})))
			.unwrap_err();
		assert_eq!(err.field, fields::START_ALIEN);
		assert_eq!(err.expected, json!(false));
		assert_eq!(err.actual, json!(true));
	}

	#[test]
	fn test_echo_missing_field_is_null() {
		let patch = OrderPatch::new().currency("USD");
		let err = patch.verify_echo(&Map::new()).unwrap_err();
		assert_eq!(err.actual, Value::Null);
	}

	#[test]
	fn test_tariff_kind_fields() {
		assert_eq!(TariffKind::default(), TariffKind::Multiple);
		assert_eq!(TariffKind::OneTime.tariff_field(), "one_time_tariff");
		assert_eq!(TariffKind::OneTime.amount_field(), "amount_one_time_tariff");
	}
}
