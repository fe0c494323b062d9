//! Common types for the insurance order lifecycle runner.
//!
//! This crate defines the payloads exchanged with the insurance backend and
//! the small helpers shared by the client, the scenario engine and the
//! runner binary.

/// Certificate (order) payloads and their option sets.
pub mod certificate;
/// Response envelope handling, including the create-response shape fallback.
pub mod envelope;
/// Partial certificate updates and echo comparison.
pub mod patch;
/// Product payloads.
pub mod product;
/// Secret string wrapper for credentials.
pub mod secret_string;
/// Trip date computation.
pub mod trip;

pub use certificate::{Certificate, CertificateId, CountryOption, SelectableOption};
pub use envelope::{extract_certificate_id, extract_singleton_or_first, Envelope, EnvelopeError};
pub use patch::{fields, EchoMismatch, OrderPatch, TariffKind};
pub use product::{Product, ProductId};
pub use secret_string::SecretString;
pub use trip::{TripOffset, TripWindow, DATE_FORMAT};
