//! Trip date computation.

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Wire format of `date_from` / `date_to`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Offsets of the trip boundaries from the current date, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripOffset {
	pub start: u64,
	pub end: u64,
}

impl Default for TripOffset {
	fn default() -> Self {
		Self { start: 10, end: 30 }
	}
}

/// Concrete trip dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripWindow {
	pub from: NaiveDate,
	pub to: NaiveDate,
}

impl TripWindow {
	/// Shifts `today` by both offsets. Saturates at the calendar limit.
	pub fn starting_from(today: NaiveDate, offset: TripOffset) -> Self {
		let shift = |days: u64| today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
		Self {
			from: shift(offset.start),
			to: shift(offset.end),
		}
	}

	/// Window relative to the local calendar date.
	pub fn from_local_today(offset: TripOffset) -> Self {
		Self::starting_from(Local::now().date_naive(), offset)
	}

	pub fn date_from(&self) -> String {
		self.from.format(DATE_FORMAT).to_string()
	}

	pub fn date_to(&self) -> String {
		self.to.format(DATE_FORMAT).to_string()
	}
}
