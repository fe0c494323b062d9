//! Scenario engine for the insurance order lifecycle.
//!
//! [`OrderLifecycleScenario`] drives one certificate from creation to
//! confirmed deletion against an [`policy_api::InsuranceApiService`],
//! checking status codes and echoed fields at every step. Progress is
//! published on an [`EventBus`], and a successful run yields a
//! [`ScenarioReport`].

pub mod assertions;
pub mod error;
pub mod event_bus;
pub mod report;
pub mod scenario;
pub mod state;
pub mod steps;

pub use error::{ScenarioError, StepFailure};
pub use event_bus::{EventBus, ScenarioEvent};
pub use report::{ScenarioReport, StepRecord};
pub use scenario::OrderLifecycleScenario;
pub use state::{LifecycleError, LifecycleState, OrderLifecycle};
pub use steps::Step;
