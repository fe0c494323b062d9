//! Event bus for scenario progress.
//!
//! Progress is published on a broadcast channel so that observers (the
//! runner's console output, tests) can follow a run without the scenario
//! knowing about them.

use crate::error::StepFailure;
use crate::state::LifecycleState;
use crate::steps::Step;
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted while a scenario runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioEvent {
	StepStarted {
		step: Step,
	},
	/// A step's request returned and all its expectations held.
	StepCompleted {
		step: Step,
		status: u16,
		elapsed: Duration,
	},
	ExpectationPassed {
		step: Step,
		description: String,
	},
	ExpectationFailed {
		step: Step,
		failure: StepFailure,
	},
	StateChanged {
		from: LifecycleState,
		to: LifecycleState,
	},
	ScenarioFinished {
		success: bool,
	},
}

/// Broadcast channel for [`ScenarioEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ScenarioEvent>,
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ScenarioEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Having no subscribers is not an error.
	pub fn publish(&self, event: ScenarioEvent) {
		if self.sender.send(event).is_err() {
			tracing::trace!("No subscribers for scenario event");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::default();
		bus.publish(ScenarioEvent::ScenarioFinished { success: true });
	}

	#[tokio::test]
	async fn test_subscribers_receive_in_order() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();
		bus.publish(ScenarioEvent::StepStarted {
			step: Step::ListProducts,
		});
		bus.publish(ScenarioEvent::ScenarioFinished { success: false });

		assert_eq!(
			receiver.recv().await.unwrap(),
			ScenarioEvent::StepStarted {
				step: Step::ListProducts
			}
		);
		assert_eq!(
			receiver.recv().await.unwrap(),
			ScenarioEvent::ScenarioFinished { success: false }
		);
	}
}
