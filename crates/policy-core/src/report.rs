//! Result of a successful scenario run.

use crate::state::LifecycleState;
use crate::steps::Step;
use policy_types::CertificateId;
use std::fmt::Write;
use std::time::Duration;

/// One executed request and the expectations it satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
	pub step: Step,
	pub status: u16,
	pub elapsed: Duration,
	pub expectations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
	/// Id of the order created (and deleted) by the run.
	pub certificate_id: CertificateId,
	pub final_state: LifecycleState,
	pub steps: Vec<StepRecord>,
	pub elapsed: Duration,
}

impl ScenarioReport {
	/// Number of requests issued during the run.
	pub fn request_count(&self) -> usize {
		self.steps.len()
	}

	/// Number of requests issued for `step`.
	pub fn count(&self, step: Step) -> usize {
		self.steps.iter().filter(|r| r.step == step).count()
	}

	/// Human-readable, one line per request.
	pub fn summary(&self) -> String {
		let mut out = String::new();
		for record in &self.steps {
			let _ = writeln!(
				out,
				"  [{}] {:<22} {} ({} ms)",
				record.step.position(),
				record.step.name(),
				record.status,
				record.elapsed.as_millis()
			);
		}
		let _ = write!(
			out,
			"Order {} reached {} after {} request(s) in {} ms",
			self.certificate_id,
			self.final_state,
			self.request_count(),
			self.elapsed.as_millis()
		);
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_summary_lists_every_request() {
		let report = ScenarioReport {
			certificate_id: CertificateId::from(42),
			final_state: LifecycleState::ConfirmedGone,
			steps: vec![
				StepRecord {
					step: Step::DeleteOrder,
					status: 204,
					elapsed: Duration::from_millis(3),
					expectations: vec!["status 204 is 2xx".into()],
				},
				StepRecord {
					step: Step::VerifyDeletion,
					status: 404,
					elapsed: Duration::from_millis(1),
					expectations: vec!["status is 404".into()],
				},
			],
			elapsed: Duration::from_millis(4),
		};

		let summary = report.summary();
		assert!(summary.contains("[7] Delete order"));
		assert!(summary.contains("[8] Verify deletion"));
		assert!(summary.ends_with("Order 42 reached CONFIRMED_GONE after 2 request(s) in 4 ms"));
		assert_eq!(report.count(Step::VerifyDeletion), 1);
	}
}
