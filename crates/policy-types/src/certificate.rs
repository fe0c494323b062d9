//! Certificate (order) payloads.
//!
//! A certificate is created against a product and then narrowed through a
//! series of PATCH calls. Each response re-supplies the option sets that are
//! valid for the current selection, so callers must always pick from the most
//! recent payload.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a certificate.
///
/// The backend emits numeric ids, but the runner only ever uses them as path
/// segments, so both numbers and strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateId(String);

impl CertificateId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Builds an id from a JSON scalar. Returns `None` for nulls, objects,
	/// arrays and empty strings.
	pub fn from_json(value: &Value) -> Option<Self> {
		match value {
			Value::Number(n) => Some(Self(n.to_string())),
			Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
			_ => None,
		}
	}
}

impl fmt::Display for CertificateId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<i64> for CertificateId {
	fn from(id: i64) -> Self {
		Self(id.to_string())
	}
}

impl Serialize for CertificateId {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self.0.parse::<i64>() {
			Ok(n) => serializer.serialize_i64(n),
			Err(_) => serializer.serialize_str(&self.0),
		}
	}
}

impl<'de> Deserialize<'de> for CertificateId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		CertificateId::from_json(&value).ok_or_else(|| {
			serde::de::Error::custom(format!("invalid certificate id: {}", value))
		})
	}
}

/// A country the certificate may cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryOption {
	pub id: i64,
	pub name: String,
}

/// An entry of a server-supplied option set (tariffs, amounts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectableOption {
	pub id: i64,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl SelectableOption {
	pub fn new(id: i64) -> Self {
		Self {
			id,
			extra: Map::new(),
		}
	}
}

/// Certificate detail as returned by `traveling_abroad_certificate/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
	pub id: CertificateId,
	#[serde(default)]
	pub available_countries: Vec<CountryOption>,
	#[serde(default)]
	pub available_currencies: Vec<String>,
	#[serde(default)]
	pub tariff_available: Vec<SelectableOption>,
	#[serde(default)]
	pub amount_available: Vec<SelectableOption>,
	/// Mutable and informational fields (`country`, `date_from`, ...).
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

impl Certificate {
	/// Ids of the available countries whose name is in `names`, in the order
	/// the server listed them.
	pub fn country_ids_matching<S: AsRef<str>>(&self, names: &[S]) -> Vec<i64> {
		self.available_countries
			.iter()
			.filter(|country| names.iter().any(|name| name.as_ref() == country.name))
			.map(|country| country.id)
			.collect()
	}

	pub fn first_currency(&self) -> Option<&str> {
		self.available_currencies.first().map(String::as_str)
	}

	pub fn first_tariff(&self) -> Option<i64> {
		self.tariff_available.first().map(|t| t.id)
	}

	pub fn first_amount(&self) -> Option<i64> {
		self.amount_available.first().map(|a| a.id)
	}
}
