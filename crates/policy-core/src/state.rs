//! Order lifecycle state machine.
//!
//! The order under test moves through
//! `None -> Created -> Updating* -> Deleted -> ConfirmedGone`. `Updating` is
//! re-entrant, `ConfirmedGone` is terminal, and no state may be skipped.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Where the order under test is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
	/// No order exists yet.
	None,
	Created,
	/// At least one PATCH has been accepted.
	Updating,
	Deleted,
	/// Deletion has been observed through a 404.
	ConfirmedGone,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LifecycleState::None => "NONE",
			LifecycleState::Created => "CREATED",
			LifecycleState::Updating => "UPDATING",
			LifecycleState::Deleted => "DELETED",
			LifecycleState::ConfirmedGone => "CONFIRMED_GONE",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
	#[error("Invalid lifecycle transition from {from} to {to}")]
	InvalidTransition {
		from: LifecycleState,
		to: LifecycleState,
	},
}

static TRANSITIONS: Lazy<HashMap<LifecycleState, HashSet<LifecycleState>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		LifecycleState::None,
		HashSet::from([LifecycleState::Created]),
	);
	m.insert(
		LifecycleState::Created,
		HashSet::from([LifecycleState::Updating]),
	);
	m.insert(
		LifecycleState::Updating,
		HashSet::from([LifecycleState::Updating, LifecycleState::Deleted]),
	);
	m.insert(
		LifecycleState::Deleted,
		HashSet::from([LifecycleState::ConfirmedGone]),
	);
	m.insert(LifecycleState::ConfirmedGone, HashSet::new()); // terminal
	m
});

/// Tracks the lifecycle of the single order a scenario run owns.
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
	state: LifecycleState,
}

impl Default for OrderLifecycle {
	fn default() -> Self {
		Self::new()
	}
}

impl OrderLifecycle {
	pub fn new() -> Self {
		Self {
			state: LifecycleState::None,
		}
	}

	pub fn state(&self) -> LifecycleState {
		self.state
	}

	/// Moves to `to`, returning the state left behind.
	pub fn transition(&mut self, to: LifecycleState) -> Result<LifecycleState, LifecycleError> {
		let from = self.state;
		if !Self::is_valid_transition(from, to) {
			return Err(LifecycleError::InvalidTransition { from, to });
		}
		self.state = to;
		Ok(from)
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_full_lifecycle() {
		let mut lifecycle = OrderLifecycle::new();
		for to in [
			LifecycleState::Created,
			LifecycleState::Updating,
			LifecycleState::Updating,
			LifecycleState::Deleted,
			LifecycleState::ConfirmedGone,
		] {
			lifecycle.transition(to).unwrap();
		}
		assert_eq!(lifecycle.state(), LifecycleState::ConfirmedGone);
	}

	#[test]
	fn test_no_state_may_be_skipped() {
		assert!(!OrderLifecycle::is_valid_transition(
			LifecycleState::None,
			LifecycleState::Updating
		));
		assert!(!OrderLifecycle::is_valid_transition(
			LifecycleState::Created,
			LifecycleState::Deleted
		));
		assert!(!OrderLifecycle::is_valid_transition(
			LifecycleState::Updating,
			LifecycleState::ConfirmedGone
		));
	}

	#[test]
	fn test_confirmed_gone_is_terminal() {
		for to in [
			LifecycleState::None,
			LifecycleState::Created,
			LifecycleState::Updating,
			LifecycleState::Deleted,
			LifecycleState::ConfirmedGone,
		] {
			assert!(!OrderLifecycle::is_valid_transition(
				LifecycleState::ConfirmedGone,
				to
			));
		}
	}

	#[test]
	fn test_invalid_transition_leaves_state() {
		let mut lifecycle = OrderLifecycle::new();
		let err = lifecycle.transition(LifecycleState::Deleted).unwrap_err();
		assert_eq!(
			err,
			LifecycleError::InvalidTransition {
				from: LifecycleState::None,
				to: LifecycleState::Deleted,
			}
		);
		assert_eq!(lifecycle.state(), LifecycleState::None);
		assert_eq!(err.to_string(), "Invalid lifecycle transition from NONE to DELETED");
	}
}
