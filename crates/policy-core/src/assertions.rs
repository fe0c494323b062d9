//! Expectation checks.
//!
//! Every check publishes `ExpectationPassed` or `ExpectationFailed` and, on
//! failure, returns the [`ScenarioError`] that aborts the run. Descriptions of
//! passed checks are buffered until the step completes so they can be attached
//! to its report record.

use crate::error::{ScenarioError, StepFailure};
use crate::event_bus::{EventBus, ScenarioEvent};
use crate::steps::Step;
use policy_types::OrderPatch;
use serde_json::Value;

pub struct Assertions {
	bus: EventBus,
	passed: Vec<String>,
}

impl Assertions {
	pub fn new(bus: EventBus) -> Self {
		Self {
			bus,
			passed: Vec::new(),
		}
	}

	/// Status must be 200-299.
	pub fn expect_success(&mut self, step: Step, status: u16) -> Result<(), ScenarioError> {
		if (200..300).contains(&status) {
			self.pass(step, format!("status {} is 2xx", status));
			Ok(())
		} else {
			Err(self.fail(step, StepFailure::HttpFailure { status }))
		}
	}

	/// Status must equal `expected` exactly.
	pub fn expect_status(
		&mut self,
		step: Step,
		expected: u16,
		actual: u16,
	) -> Result<(), ScenarioError> {
		if expected == actual {
			self.pass(step, format!("status is {}", expected));
			Ok(())
		} else {
			Err(self.fail(step, StepFailure::StatusMismatch { expected, actual }))
		}
	}

	pub fn expect_field(
		&mut self,
		step: Step,
		field: &str,
		expected: &Value,
		actual: &Value,
	) -> Result<(), ScenarioError> {
		if expected == actual {
			self.pass(step, format!("{} is {}", field, expected));
			Ok(())
		} else {
			Err(self.fail(
				step,
				StepFailure::FieldMismatch {
					field: field.to_string(),
					expected: expected.clone(),
					actual: actual.clone(),
				},
			))
		}
	}

	/// Every field of `sent` must come back under `data` in `body`.
	pub fn expect_echo(
		&mut self,
		step: Step,
		sent: &OrderPatch,
		body: &Value,
	) -> Result<(), ScenarioError> {
		let Some(echoed) = body.get("data").and_then(Value::as_object) else {
			return Err(self.fail(
				step,
				StepFailure::MissingPrecondition("PATCH response has no 'data' object".into()),
			));
		};
		match sent.verify_echo(echoed) {
			Ok(()) => {
				self.pass(step, format!("{} field(s) echoed", sent.len()));
				Ok(())
			},
			Err(mismatch) => Err(self.fail(step, mismatch.into())),
		}
	}

	/// `id` must be one of `ids`.
	pub fn expect_contains(
		&mut self,
		step: Step,
		ids: &[i64],
		id: i64,
		collection: &str,
	) -> Result<(), ScenarioError> {
		if ids.contains(&id) {
			self.pass(step, format!("{} contains {}", collection, id));
			Ok(())
		} else {
			Err(self.fail(
				step,
				StepFailure::MissingPrecondition(format!(
					"{} {:?} does not contain {}",
					collection, ids, id
				)),
			))
		}
	}

	/// Unwraps data a later step depends on.
	pub fn require<T>(
		&mut self,
		step: Step,
		value: Option<T>,
		what: &str,
	) -> Result<T, ScenarioError> {
		match value {
			Some(value) => Ok(value),
			None => Err(self.fail(step, StepFailure::MissingPrecondition(what.to_string()))),
		}
	}

	/// Records a failure and builds the error that aborts the run.
	pub fn fail(&mut self, step: Step, failure: StepFailure) -> ScenarioError {
		tracing::warn!(%step, %failure, "Expectation failed");
		self.bus.publish(ScenarioEvent::ExpectationFailed {
			step,
			failure: failure.clone(),
		});
		self.passed.clear();
		ScenarioError::Step { step, failure }
	}

	/// Drains the descriptions of checks passed since the last call.
	pub fn take_passed(&mut self) -> Vec<String> {
		std::mem::take(&mut self.passed)
	}

	fn pass(&mut self, step: Step, description: String) {
		self.bus.publish(ScenarioEvent::ExpectationPassed {
			step,
			description: description.clone(),
		});
		self.passed.push(description);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use policy_types::fields;
	use serde_json::json;

	fn assertions() -> Assertions {
		Assertions::new(EventBus::default())
	}

	#[test]
	fn test_expect_success_range() {
		let mut a = assertions();
		assert!(a.expect_success(Step::ListProducts, 204).is_ok());
		let err = a.expect_success(Step::ListProducts, 500).unwrap_err();
		assert_eq!(err.failure(), Some(&StepFailure::HttpFailure { status: 500 }));
		assert_eq!(err.step(), Some(Step::ListProducts));
	}

	#[test]
	fn test_expect_status_exact() {
		let mut a = assertions();
		let err = a.expect_status(Step::CreateOrder, 201, 200).unwrap_err();
		assert_eq!(
			err.failure(),
			Some(&StepFailure::StatusMismatch {
				expected: 201,
				actual: 200
			})
		);
	}

	#[test]
	fn test_expect_echo_reports_first_mismatch() {
		let mut a = assertions();
		let sent = OrderPatch::new()
			.set(fields::DAYS_COUNT, 20)
			.set(fields::PERIOD, 365);
		let body = json!({"data": {"days_count": 20, "period": 30}});
		let err = a.expect_echo(Step::UpdateOrder, &sent, &body).unwrap_err();
		assert_eq!(
			err.failure(),
			Some(&StepFailure::FieldMismatch {
				field: "period".into(),
				expected: json!(365),
				actual: json!(30),
			})
		);
	}

	#[test]
	fn test_expect_echo_without_data() {
		let mut a = assertions();
		let sent = OrderPatch::new().set(fields::PERIOD, 365);
		let err = a.expect_echo(Step::UpdateOrder, &sent, &Value::Null).unwrap_err();
		assert!(matches!(
			err.failure(),
			Some(StepFailure::MissingPrecondition(_))
		));
	}

	#[test]
	fn test_expect_contains() {
		let mut a = assertions();
		assert!(a.expect_contains(Step::ListProducts, &[1, 166], 166, "products").is_ok());
		let err = a
			.expect_contains(Step::ListProducts, &[1, 2], 166, "products")
			.unwrap_err();
		assert!(err.to_string().contains("166"));
	}

	#[test]
	fn test_passed_descriptions_are_drained() {
		let mut a = assertions();
		a.expect_success(Step::GetOrder, 200).unwrap();
		a.expect_field(Step::GetOrder, "id", &json!(1), &json!(1))
			.unwrap();
		assert_eq!(a.take_passed().len(), 2);
		assert!(a.take_passed().is_empty());
	}

	#[tokio::test]
	async fn test_failure_is_published() {
		let bus = EventBus::default();
		let mut receiver = bus.subscribe();
		let mut a = Assertions::new(bus);
		let _ = a.require::<i64>(Step::GetOrder, None, "tariff_available is empty");

		assert_eq!(
			receiver.recv().await.unwrap(),
			ScenarioEvent::ExpectationFailed {
				step: Step::GetOrder,
				failure: StepFailure::MissingPrecondition("tariff_available is empty".into()),
			}
		);
	}
}
