//! Named scenario steps.

use std::fmt;

/// One step of the order lifecycle scenario.
///
/// The selection steps only run in stepwise update mode; in combined mode the
/// selection fields travel with [`Step::UpdateOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
	ListProducts,
	GetProduct,
	CreateOrder,
	GetOrder,
	SelectCountries,
	SelectCurrency,
	SelectTariff,
	SelectAmount,
	UpdateOrder,
	DeleteOrder,
	VerifyDeletion,
}

impl Step {
	/// Position in the eight-step workflow. The selection steps share
	/// position 5.
	pub fn position(self) -> u8 {
		match self {
			Step::ListProducts => 1,
			Step::GetProduct => 2,
			Step::CreateOrder => 3,
			Step::GetOrder => 4,
			Step::SelectCountries
			| Step::SelectCurrency
			| Step::SelectTariff
			| Step::SelectAmount => 5,
			Step::UpdateOrder => 6,
			Step::DeleteOrder => 7,
			Step::VerifyDeletion => 8,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Step::ListProducts => "Get list of products",
			Step::GetProduct => "Get product info",
			Step::CreateOrder => "Create new order",
			Step::GetOrder => "Get order data",
			Step::SelectCountries => "Select countries",
			Step::SelectCurrency => "Select currency",
			Step::SelectTariff => "Select tariff",
			Step::SelectAmount => "Select amount",
			Step::UpdateOrder => "Update order",
			Step::DeleteOrder => "Delete order",
			Step::VerifyDeletion => "Verify deletion",
		}
	}
}

impl fmt::Display for Step {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
