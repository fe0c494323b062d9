//! The order lifecycle scenario.
//!
//! Drives a single certificate through list products, fetch product, create,
//! fetch, selection updates, scalar update, delete and deletion check. Each
//! step awaits its response before the next begins, and the first failed
//! expectation aborts the run. Nothing is retried and nothing is cleaned up
//! after a failure, so a run that fails between create and delete leaves its
//! order behind; the step spans carry its `certificate_id`.

use crate::assertions::Assertions;
use crate::error::{ScenarioError, StepFailure};
use crate::event_bus::{EventBus, ScenarioEvent};
use crate::report::{ScenarioReport, StepRecord};
use crate::state::{LifecycleState, OrderLifecycle};
use crate::steps::Step;
use chrono::NaiveDate;
use policy_api::{ApiError, ApiResponse, InsuranceApiService};
use policy_config::{AmountSelection, ScenarioConfig, UpdateMode};
use policy_types::{
	extract_certificate_id, fields, Certificate, CertificateId, Envelope, OrderPatch, Product,
	TripWindow,
};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Instant;
use tracing::instrument;

/// Per-run bookkeeping: assertions, lifecycle and the records of completed
/// requests.
struct RunContext {
	assertions: Assertions,
	lifecycle: OrderLifecycle,
	records: Vec<StepRecord>,
	pending: Option<(Step, u16, Instant)>,
	bus: EventBus,
}

impl RunContext {
	fn new(bus: EventBus) -> Self {
		Self {
			assertions: Assertions::new(bus.clone()),
			lifecycle: OrderLifecycle::new(),
			records: Vec::new(),
			pending: None,
			bus,
		}
	}

	/// Awaits one request. A collaborator error is a transport failure of `step`.
	async fn send<F>(&mut self, step: Step, request: F) -> Result<ApiResponse, ScenarioError>
	where
		F: Future<Output = Result<ApiResponse, ApiError>>,
	{
		self.bus.publish(ScenarioEvent::StepStarted { step });
		let started = Instant::now();
		match request.await {
			Ok(response) => {
				tracing::debug!(status = response.status, "Received response");
				self.pending = Some((step, response.status, started));
				Ok(response)
			},
			Err(err) => Err(self.assertions.fail(step, err.into())),
		}
	}

	/// Closes the record of the last request once its expectations held.
	fn complete(&mut self) {
		let Some((step, status, started)) = self.pending.take() else {
			return;
		};
		let elapsed = started.elapsed();
		tracing::info!(status, elapsed_ms = elapsed.as_millis() as u64, "Step completed");
		self.bus.publish(ScenarioEvent::StepCompleted {
			step,
			status,
			elapsed,
		});
		self.records.push(StepRecord {
			step,
			status,
			elapsed,
			expectations: self.assertions.take_passed(),
		});
	}

	fn transition(&mut self, to: LifecycleState) -> Result<(), ScenarioError> {
		let from = self.lifecycle.transition(to)?;
		tracing::debug!(%from, %to, "Order lifecycle transition");
		self.bus.publish(ScenarioEvent::StateChanged { from, to });
		Ok(())
	}

	/// Decodes the `data` member of a response, failing `step` if it does
	/// not have the expected shape.
	fn decode<T: serde::de::DeserializeOwned>(
		&mut self,
		step: Step,
		body: &Value,
	) -> Result<T, ScenarioError> {
		Envelope::<T>::decode(body).map_err(|e| {
			self.assertions
				.fail(step, StepFailure::MissingPrecondition(e.to_string()))
		})
	}
}

/// One parameterised run of the order lifecycle against a backend.
pub struct OrderLifecycleScenario {
	api: InsuranceApiService,
	config: ScenarioConfig,
	today: Option<NaiveDate>,
	event_bus: EventBus,
}

impl OrderLifecycleScenario {
	pub fn new(api: InsuranceApiService, config: ScenarioConfig) -> Self {
		Self {
			api,
			config,
			today: None,
			event_bus: EventBus::default(),
		}
	}

	/// Pins the date trip offsets are counted from. Defaults to the local
	/// calendar date at the time of the update step.
	pub fn with_today(mut self, today: NaiveDate) -> Self {
		self.today = Some(today);
		self
	}

	pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
		self.event_bus = event_bus;
		self
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Runs all steps in order and returns the report, or the first failure.
	#[instrument(skip_all, fields(product_id = self.config.product_id, mode = ?self.config.update_mode))]
	pub async fn run(&self) -> Result<ScenarioReport, ScenarioError> {
		let started = Instant::now();
		let mut ctx = RunContext::new(self.event_bus.clone());

		let result = self.execute(&mut ctx).await;
		self.event_bus.publish(ScenarioEvent::ScenarioFinished {
			success: result.is_ok(),
		});

		match result {
			Ok(certificate_id) => {
				tracing::info!(%certificate_id, "Scenario passed");
				Ok(ScenarioReport {
					certificate_id,
					final_state: ctx.lifecycle.state(),
					steps: ctx.records,
					elapsed: started.elapsed(),
				})
			},
			Err(err) => {
				tracing::error!(error = %err, state = %ctx.lifecycle.state(), "Scenario failed");
				Err(err)
			},
		}
	}

	async fn execute(&self, ctx: &mut RunContext) -> Result<CertificateId, ScenarioError> {
		self.list_products(ctx).await?;
		self.get_product(ctx).await?;
		let id = self.create_order(ctx).await?;
		let certificate = self.get_order(ctx, &id).await?;
		let selection = self.update_selection(ctx, &id, certificate).await?;
		self.update_order(ctx, &id, selection).await?;
		self.delete_order(ctx, &id).await?;
		self.verify_deletion(ctx, &id).await?;
		Ok(id)
	}

	#[instrument(skip_all, fields(step = %Step::ListProducts))]
	async fn list_products(&self, ctx: &mut RunContext) -> Result<(), ScenarioError> {
		let step = Step::ListProducts;
		let response = ctx.send(step, self.api.list_products()).await?;
		ctx.assertions.expect_success(step, response.status)?;

		let products: Vec<Product> = ctx.decode(step, &response.body)?;
		let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
		ctx.assertions
			.expect_contains(step, &ids, self.config.product_id, "product list")?;
		ctx.complete();
		Ok(())
	}

	#[instrument(skip_all, fields(step = %Step::GetProduct))]
	async fn get_product(&self, ctx: &mut RunContext) -> Result<(), ScenarioError> {
		let step = Step::GetProduct;
		let response = ctx
			.send(step, self.api.get_product(self.config.product_id))
			.await?;
		ctx.assertions.expect_success(step, response.status)?;

		let actual = response
			.body
			.get("data")
			.and_then(|data| data.get("id"))
			.cloned()
			.unwrap_or(Value::Null);
		ctx.assertions
			.expect_field(step, "id", &json!(self.config.product_id), &actual)?;
		ctx.complete();
		Ok(())
	}

	#[instrument(skip_all, fields(step = %Step::CreateOrder, certificate_id = tracing::field::Empty))]
	async fn create_order(&self, ctx: &mut RunContext) -> Result<CertificateId, ScenarioError> {
		let step = Step::CreateOrder;
		let response = ctx
			.send(step, self.api.create_certificate(self.config.product_id))
			.await?;
		if self.config.strict_status_codes {
			ctx.assertions.expect_status(step, 201, response.status)?;
		} else {
			ctx.assertions.expect_success(step, response.status)?;
		}

		let id = extract_certificate_id(&response.body).map_err(|e| {
			ctx.assertions
				.fail(step, StepFailure::MissingPrecondition(e.to_string()))
		})?;
		tracing::Span::current().record("certificate_id", tracing::field::display(&id));

		ctx.complete();
		ctx.transition(LifecycleState::Created)?;
		Ok(id)
	}

	#[instrument(skip_all, fields(step = %Step::GetOrder, certificate_id = %id))]
	async fn get_order(
		&self,
		ctx: &mut RunContext,
		id: &CertificateId,
	) -> Result<Certificate, ScenarioError> {
		let step = Step::GetOrder;
		let response = ctx.send(step, self.api.get_certificate(id)).await?;
		ctx.assertions.expect_success(step, response.status)?;
		let certificate = ctx.decode(step, &response.body)?;
		ctx.complete();
		Ok(certificate)
	}

	/// Chooses country, currency, tariff and amount.
	///
	/// Stepwise mode PATCHes each selection and picks the next option from the
	/// previous response; the returned patch is then empty. Combined mode
	/// PATCHes nothing and returns country, tariff and amount for the scalar
	/// update to carry.
	async fn update_selection(
		&self,
		ctx: &mut RunContext,
		id: &CertificateId,
		certificate: Certificate,
	) -> Result<OrderPatch, ScenarioError> {
		let kind = self.config.tariff_kind;
		match self.config.update_mode {
			UpdateMode::Combined => {
				let countries = self.select_countries(ctx, &certificate)?;
				let tariff = self.select_tariff(ctx, &certificate)?;
				let amount = self.select_amount(ctx, &certificate)?;
				Ok(OrderPatch::new()
					.countries(&countries)
					.tariff(kind, tariff)
					.amount(kind, amount))
			},
			UpdateMode::Stepwise => {
				let countries = self.select_countries(ctx, &certificate)?;
				let certificate = self
					.patch_selection(
						ctx,
						id,
						Step::SelectCountries,
						OrderPatch::new().countries(&countries),
					)
					.await?;

				let currency = ctx.assertions.require(
					Step::SelectCurrency,
					certificate.first_currency().map(str::to_string),
					"available_currencies is empty",
				)?;
				let certificate = self
					.patch_selection(
						ctx,
						id,
						Step::SelectCurrency,
						OrderPatch::new().currency(&currency),
					)
					.await?;

				let tariff = self.select_tariff(ctx, &certificate)?;
				let certificate = self
					.patch_selection(
						ctx,
						id,
						Step::SelectTariff,
						OrderPatch::new().tariff(kind, tariff),
					)
					.await?;

				let amount = self.select_amount(ctx, &certificate)?;
				self.patch_selection(
					ctx,
					id,
					Step::SelectAmount,
					OrderPatch::new().amount(kind, amount),
				)
				.await?;

				Ok(OrderPatch::new())
			},
		}
	}

	/// Offered countries whose name is acceptable, in server order.
	fn select_countries(
		&self,
		ctx: &mut RunContext,
		certificate: &Certificate,
	) -> Result<Vec<i64>, ScenarioError> {
		let ids = certificate.country_ids_matching(&self.config.acceptable_countries);
		if ids.is_empty() {
			if self.config.require_country_match {
				return Err(ctx.assertions.fail(
					Step::SelectCountries,
					StepFailure::MissingPrecondition(format!(
						"none of {:?} is in available_countries",
						self.config.acceptable_countries
					)),
				));
			}
			tracing::warn!(
				acceptable = ?self.config.acceptable_countries,
				"No acceptable country offered, submitting an empty country set"
			);
		}
		Ok(ids)
	}

	fn select_tariff(
		&self,
		ctx: &mut RunContext,
		certificate: &Certificate,
	) -> Result<i64, ScenarioError> {
		ctx.assertions.require(
			Step::SelectTariff,
			certificate.first_tariff(),
			"tariff_available is empty",
		)
	}

	/// A fixed amount only applies to combined mode. Stepwise submits the
	/// first amount offered by the tariff response.
	fn select_amount(
		&self,
		ctx: &mut RunContext,
		certificate: &Certificate,
	) -> Result<i64, ScenarioError> {
		match (self.config.update_mode, &self.config.amount) {
			(UpdateMode::Combined, AmountSelection::Fixed(id)) => Ok(*id),
			_ => ctx.assertions.require(
				Step::SelectAmount,
				certificate.first_amount(),
				"amount_available is empty",
			),
		}
	}

	#[instrument(skip_all, fields(step = %step, certificate_id = %id))]
	async fn patch_selection(
		&self,
		ctx: &mut RunContext,
		id: &CertificateId,
		step: Step,
		patch: OrderPatch,
	) -> Result<Certificate, ScenarioError> {
		let response = ctx.send(step, self.api.patch_certificate(id, &patch)).await?;
		ctx.assertions.expect_success(step, response.status)?;
		ctx.assertions.expect_echo(step, &patch, &response.body)?;
		let certificate = ctx.decode(step, &response.body)?;
		ctx.complete();
		ctx.transition(LifecycleState::Updating)?;
		Ok(certificate)
	}

	#[instrument(skip_all, fields(step = %Step::UpdateOrder, certificate_id = %id))]
	async fn update_order(
		&self,
		ctx: &mut RunContext,
		id: &CertificateId,
		selection: OrderPatch,
	) -> Result<(), ScenarioError> {
		let step = Step::UpdateOrder;
		let offset = self.config.trip_offset_days;
		let window = match self.today {
			Some(today) => TripWindow::starting_from(today, offset),
			None => TripWindow::from_local_today(offset),
		};

		let patch = selection
			.trip(&window)
			.set(fields::DAYS_COUNT, self.config.trip_duration_days)
			.set(fields::INSURING_TYPE, self.config.insuring_type.as_str())
			.set(fields::PERIOD, self.config.period)
			.set(fields::START_ALIEN, self.config.start_alien)
			.set(fields::TRAVELING_TYPE, self.config.traveling_type.as_str());

		let response = ctx.send(step, self.api.patch_certificate(id, &patch)).await?;
		ctx.assertions.expect_success(step, response.status)?;
		ctx.assertions.expect_echo(step, &patch, &response.body)?;
		ctx.complete();
		ctx.transition(LifecycleState::Updating)?;
		Ok(())
	}

	#[instrument(skip_all, fields(step = %Step::DeleteOrder, certificate_id = %id))]
	async fn delete_order(&self, ctx: &mut RunContext, id: &CertificateId) -> Result<(), ScenarioError> {
		let step = Step::DeleteOrder;
		let response = ctx.send(step, self.api.delete_certificate(id)).await?;
		ctx.assertions.expect_success(step, response.status)?;
		ctx.complete();
		ctx.transition(LifecycleState::Deleted)?;
		Ok(())
	}

	#[instrument(skip_all, fields(step = %Step::VerifyDeletion, certificate_id = %id))]
	async fn verify_deletion(
		&self,
		ctx: &mut RunContext,
		id: &CertificateId,
	) -> Result<(), ScenarioError> {
		let step = Step::VerifyDeletion;
		for attempt in 1..=self.config.deletion_probes {
			tracing::debug!(attempt, "Fetching deleted order");
			let response = ctx.send(step, self.api.get_certificate(id)).await?;
			ctx.assertions.expect_status(step, 404, response.status)?;
			ctx.complete();
		}
		ctx.transition(LifecycleState::ConfirmedGone)?;
		Ok(())
	}
}
