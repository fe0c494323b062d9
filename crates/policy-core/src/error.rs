//! Scenario failure types.

use crate::state::LifecycleError;
use crate::steps::Step;
use policy_api::ApiError;
use policy_types::EchoMismatch;
use serde_json::Value;
use thiserror::Error;

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepFailure {
	/// Non-2xx status where 2xx was expected.
	#[error("Response code is {status}, expected to be 200-299")]
	HttpFailure { status: u16 },
	/// A specific status was expected.
	#[error("Response code is {actual}, expected {expected}")]
	StatusMismatch { expected: u16, actual: u16 },
	/// A response field differs from the expected value.
	#[error("Field '{field}' expected {expected}, got {actual}")]
	FieldMismatch {
		field: String,
		expected: Value,
		actual: Value,
	},
	/// Data a later step depends on is absent.
	#[error("Missing precondition: {0}")]
	MissingPrecondition(String),
	/// The request produced no response.
	#[error("Transport failure: {0}")]
	Transport(String),
}

impl From<EchoMismatch> for StepFailure {
	fn from(mismatch: EchoMismatch) -> Self {
		StepFailure::FieldMismatch {
			field: mismatch.field,
			expected: mismatch.expected,
			actual: mismatch.actual,
		}
	}
}

impl From<ApiError> for StepFailure {
	fn from(err: ApiError) -> Self {
		StepFailure::Transport(err.to_string())
	}
}

/// Errors that abort a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
	#[error("Step '{step}' failed: {failure}")]
	Step { step: Step, failure: StepFailure },
	#[error("Lifecycle error: {0}")]
	State(#[from] LifecycleError),
}

impl ScenarioError {
	/// The step that failed, if the failure came from a step.
	pub fn step(&self) -> Option<Step> {
		match self {
			ScenarioError::Step { step, .. } => Some(*step),
			ScenarioError::State(_) => None,
		}
	}

	pub fn failure(&self) -> Option<&StepFailure> {
		match self {
			ScenarioError::Step { failure, .. } => Some(failure),
			ScenarioError::State(_) => None,
		}
	}
}
