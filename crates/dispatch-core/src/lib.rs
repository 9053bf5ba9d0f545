//! Core workflow engine for the dispatch system.
//!
//! The [`WorkflowEngine`] is the single façade through which all order,
//! verification and wallet operations flow. It wires the order state
//! machine, the verification service and the wallet service over one
//! storage backend, enforces actor authorization at the boundary, and
//! broadcasts workflow events to subscribers. Its `run` loop drives the
//! recurring hold-release sweep and the daily payout sweep.

pub mod event_bus;

pub use event_bus::EventBus;

use chrono::Timelike;
use dispatch_config::Config;
use dispatch_order::OrderStateMachine;
use dispatch_storage::{StorageInterface, StorageService};
use dispatch_types::{
	current_timestamp, truncate_id, Actor, ActorRole, NewOrderRequest, Order, OrderEvent,
	OrderStatus, Payment, Payout, PayoutMethod, Verification, VerificationEvent, WalletEvent,
	WalletSummary, WorkflowError, WorkflowEvent,
};
use dispatch_verification::{CodeGenerator, VerificationService};
use dispatch_wallet::{WalletError, WalletPolicy, WalletService};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur while assembling or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The configuration could not be turned into a runnable engine.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Result of a status update, carrying any code issued by the edge.
///
/// A pickup code is returned only for the PREPARING -> READY_FOR_PICKUP
/// edge, to the vendor who triggered it. Delivery OTPs are never returned
/// here; they reach the customer through the event bus.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
	pub order: Order,
	pub pickup_code: Option<String>,
}

/// Orchestrates order lifecycle, verification and wallet operations.
pub struct WorkflowEngine {
	config: Config,
	state_machine: Arc<OrderStateMachine>,
	verification: VerificationService,
	wallet: WalletService,
	event_bus: EventBus,
}

impl WorkflowEngine {
	/// Builds an engine from validated configuration and a storage backend.
	pub fn new(config: Config, backend: Box<dyn StorageInterface>) -> Result<Self, EngineError> {
		let storage = Arc::new(StorageService::new(backend));
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));

		let verification = VerificationService::new(
			state_machine.clone(),
			CodeGenerator::new(config.verification.pickup_code_length),
			Duration::from_secs(config.verification.otp_ttl_seconds),
		);

		let payout_method = match config.wallet.payout_method.as_str() {
			"upi" => PayoutMethod::Upi,
			"bank_transfer" => PayoutMethod::BankTransfer,
			other => {
				return Err(EngineError::Config(format!(
					"Unknown payout method: {}",
					other
				)))
			},
		};
		let wallet = WalletService::new(
			storage,
			WalletPolicy {
				hold_period: Duration::from_secs(config.wallet.hold_hours * 3600),
				commission_percent: config.wallet.commission_percent,
				driver_share_percent: config.wallet.driver_share_percent,
				minimum_payout: Decimal::from(config.wallet.minimum_payout),
				payout_method,
			},
		);

		Ok(Self {
			config,
			state_machine,
			verification,
			wallet,
			event_bus: EventBus::new(1000),
		})
	}

	/// Subscribes to workflow events.
	pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
		self.event_bus.subscribe()
	}

	/// Submits a new order on behalf of the authenticated buyer.
	pub async fn submit_order(
		&self,
		request: NewOrderRequest,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		require_role(actor, ActorRole::Customer)?;
		if request.restaurant_id.trim().is_empty() {
			return Err(WorkflowError::InvalidRequest(
				"restaurantId must not be empty".to_string(),
			));
		}
		if request.amount <= Decimal::ZERO {
			return Err(WorkflowError::InvalidRequest(
				"Order amount must be positive".to_string(),
			));
		}

		let now = current_timestamp();
		let order = Order {
			id: uuid::Uuid::new_v4().to_string(),
			status: OrderStatus::Pending,
			restaurant_id: request.restaurant_id,
			driver_id: None,
			buyer_id: actor.id.clone(),
			payment: Payment {
				method: request.payment_method,
				amount: request.amount,
				transaction_id: request.transaction_id,
			},
			verification: Verification::default(),
			created_at: now,
			updated_at: now,
		};
		self.state_machine.store_order(&order).await?;

		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::Submitted {
			order_id: order.id.clone(),
		}));
		tracing::info!(
			order_id = %truncate_id(&order.id),
			buyer_id = %order.buyer_id,
			amount = %order.payment.amount,
			"Order submitted"
		);
		Ok(order)
	}

	/// Fetches an order by id.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, WorkflowError> {
		self.state_machine.get_order(order_id).await
	}

	/// Claims a READY_FOR_PICKUP order for the acting driver.
	pub async fn accept_order(&self, order_id: &str, actor: &Actor) -> Result<Order, WorkflowError> {
		require_role(actor, ActorRole::Driver)?;
		let order = self.state_machine.claim(order_id, &actor.id).await?;

		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::StatusChanged {
			order_id: order.id.clone(),
			from: OrderStatus::ReadyForPickup,
			to: OrderStatus::Accepted,
		}));
		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::Claimed {
			order_id: order.id.clone(),
			driver_id: actor.id.clone(),
		}));
		Ok(order)
	}

	/// Moves an order along a lifecycle edge on behalf of an actor.
	///
	/// Edges with bound side effects issue their code inside the same
	/// persist as the status change: READY_FOR_PICKUP gets a fresh pickup
	/// code (returned to the vendor caller), ARRIVED_AT_CUSTOMER gets a
	/// fresh delivery OTP (broadcast for customer notification).
	pub async fn update_order_status(
		&self,
		order_id: &str,
		to: OrderStatus,
		actor: &Actor,
	) -> Result<StatusUpdate, WorkflowError> {
		// The pre-transition status comes back from under the order lock,
		// so the published event never carries a stale `from`.
		let (from, update) = match to {
			OrderStatus::ReadyForPickup => {
				let code = self.verification.new_pickup_code();
				let issued = code.clone();
				let (from, order) = self
					.state_machine
					.transition_with(order_id, to, actor, move |order| {
						VerificationService::set_pickup_code(order, code);
					})
					.await?;
				self.event_bus
					.publish(WorkflowEvent::Verification(VerificationEvent::PickupCodeIssued {
						order_id: order.id.clone(),
					}));
				(
					from,
					StatusUpdate {
						order,
						pickup_code: Some(issued),
					},
				)
			},
			OrderStatus::ArrivedAtCustomer => {
				let issued_at = current_timestamp();
				let (otp, expires_at) = self.verification.new_delivery_otp();
				let issued = otp.clone();
				let (from, order) = self
					.state_machine
					.transition_with(order_id, to, actor, move |order| {
						VerificationService::set_delivery_otp(order, otp, issued_at, expires_at);
					})
					.await?;
				self.event_bus
					.publish(WorkflowEvent::Verification(VerificationEvent::DeliveryOtpIssued {
						order_id: order.id.clone(),
						otp: issued,
						expires_at,
					}));
				(
					from,
					StatusUpdate {
						order,
						pickup_code: None,
					},
				)
			},
			_ => {
				let (from, order) = self
					.state_machine
					.transition_with(order_id, to, actor, |_| {})
					.await?;
				(
					from,
					StatusUpdate {
						order,
						pickup_code: None,
					},
				)
			},
		};

		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::StatusChanged {
			order_id: update.order.id.clone(),
			from,
			to,
		}));
		if to == OrderStatus::Cancelled {
			self.event_bus.publish(WorkflowEvent::Order(OrderEvent::Cancelled {
				order_id: update.order.id.clone(),
			}));
		}
		Ok(update)
	}

	/// Cancels an order, invalidating its pending codes.
	pub async fn cancel_order(&self, order_id: &str, actor: &Actor) -> Result<Order, WorkflowError> {
		let update = self
			.update_order_status(order_id, OrderStatus::Cancelled, actor)
			.await?;
		Ok(update.order)
	}

	/// Re-issues a pickup code, shown on the vendor surface.
	///
	/// Only the order's own vendor (or an admin) may read it.
	pub async fn generate_pickup_code(
		&self,
		order_id: &str,
		actor: &Actor,
	) -> Result<String, WorkflowError> {
		let order = self.state_machine.get_order(order_id).await?;
		require_vendor_of(&order, actor)?;

		let code = self.verification.issue_pickup_code(order_id).await?;
		self.event_bus
			.publish(WorkflowEvent::Verification(VerificationEvent::PickupCodeIssued {
				order_id: order_id.to_string(),
			}));
		Ok(code)
	}

	/// Re-issues a delivery OTP, shown on the customer surface.
	///
	/// Only the order's buyer (or an admin or the system, for the
	/// notification path) may trigger it. Returns the OTP and its expiry.
	pub async fn generate_delivery_otp(
		&self,
		order_id: &str,
		actor: &Actor,
	) -> Result<(String, u64), WorkflowError> {
		let order = self.state_machine.get_order(order_id).await?;
		require_buyer_of(&order, actor)?;

		let (otp, expires_at) = self.verification.issue_delivery_otp(order_id).await?;
		self.event_bus
			.publish(WorkflowEvent::Verification(VerificationEvent::DeliveryOtpIssued {
				order_id: order_id.to_string(),
				otp: otp.clone(),
				expires_at,
			}));
		Ok((otp, expires_at))
	}

	/// Verifies a pickup code submitted by the acting driver.
	pub async fn verify_pickup(
		&self,
		order_id: &str,
		code: &str,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		require_role(actor, ActorRole::Driver)?;
		let order = self.verification.verify_pickup(order_id, code, &actor.id).await?;

		self.event_bus
			.publish(WorkflowEvent::Verification(VerificationEvent::PickupVerified {
				order_id: order.id.clone(),
				driver_id: actor.id.clone(),
			}));
		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::StatusChanged {
			order_id: order.id.clone(),
			from: OrderStatus::Accepted,
			to: OrderStatus::PickedUp,
		}));
		Ok(order)
	}

	/// Verifies a delivery OTP submitted by the acting driver.
	///
	/// On success the order is DELIVERED and earnings are credited as HELD
	/// wallet entries for the driver and the vendor.
	pub async fn verify_delivery(
		&self,
		order_id: &str,
		otp: &str,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		require_role(actor, ActorRole::Driver)?;
		let order = match self.verification.verify_delivery(order_id, otp, &actor.id).await {
			Ok(order) => order,
			Err(WorkflowError::AlreadyConsumed) => {
				// An earlier attempt may have persisted DELIVERED and then
				// failed the wallet write; re-credit before reporting.
				self.recover_missing_credit(order_id).await?;
				return Err(WorkflowError::AlreadyConsumed);
			},
			Err(e) => return Err(e),
		};

		self.credit_delivered(&order).await?;

		self.event_bus
			.publish(WorkflowEvent::Verification(VerificationEvent::DeliveryVerified {
				order_id: order.id.clone(),
				driver_id: actor.id.clone(),
			}));
		self.event_bus.publish(WorkflowEvent::Order(OrderEvent::StatusChanged {
			order_id: order.id.clone(),
			from: OrderStatus::ArrivedAtCustomer,
			to: OrderStatus::Delivered,
		}));
		Ok(order)
	}

	/// Credits HELD earnings for a delivered order and publishes each entry.
	async fn credit_delivered(&self, order: &Order) -> Result<(), WorkflowError> {
		let entries = self
			.wallet
			.credit_delivery(order, current_timestamp())
			.await
			.map_err(wallet_error)?;
		for entry in entries {
			self.event_bus.publish(WorkflowEvent::Wallet(WalletEvent::EntryCredited {
				entry_id: entry.id,
				owner_id: entry.owner_id,
				order_id: entry.order_id,
				amount: entry.amount,
			}));
		}
		Ok(())
	}

	/// Re-credits a DELIVERED order whose wallet entries are missing.
	///
	/// Delivery verification persists DELIVERED before crediting, so a storage
	/// failure between the two leaves earnings uncredited while every retry
	/// reports AlreadyConsumed. This closes that gap.
	async fn recover_missing_credit(&self, order_id: &str) -> Result<(), WorkflowError> {
		let order = self.state_machine.get_order(order_id).await?;
		if order.status != OrderStatus::Delivered {
			return Ok(());
		}
		if self.wallet.has_credited(&order).await.map_err(wallet_error)? {
			return Ok(());
		}
		tracing::warn!(order_id = %order.id, "Delivered order missing wallet entries, re-crediting");
		self.credit_delivered(&order).await
	}

	/// Returns an owner's wallet balance summary.
	pub async fn wallet_summary(
		&self,
		owner_id: &str,
		actor: &Actor,
	) -> Result<WalletSummary, WorkflowError> {
		require_owner_or_admin(owner_id, actor)?;
		self.wallet
			.summary(owner_id, current_timestamp())
			.await
			.map_err(wallet_error)
	}

	/// Returns an owner's payouts, newest first.
	pub async fn payout_history(
		&self,
		owner_id: &str,
		actor: &Actor,
	) -> Result<Vec<Payout>, WorkflowError> {
		require_owner_or_admin(owner_id, actor)?;
		self.wallet.payout_history(owner_id).await.map_err(wallet_error)
	}

	/// Records a transfer confirmation from the payment rail.
	pub async fn mark_payout_completed(
		&self,
		payout_id: &str,
		utr: &str,
		actor: &Actor,
	) -> Result<Payout, WorkflowError> {
		require_operator(actor)?;
		let payout = self
			.wallet
			.complete_payout(payout_id, utr)
			.await
			.map_err(wallet_error)?;
		self.event_bus.publish(WorkflowEvent::Wallet(WalletEvent::PayoutCompleted {
			payout_id: payout.id.clone(),
			utr: utr.to_string(),
		}));
		Ok(payout)
	}

	/// Records a transfer failure; the payout's entries go back to
	/// AVAILABLE for the next sweep.
	pub async fn mark_payout_failed(
		&self,
		payout_id: &str,
		reason: &str,
		actor: &Actor,
	) -> Result<Payout, WorkflowError> {
		require_operator(actor)?;
		let payout = self
			.wallet
			.fail_payout(payout_id, reason)
			.await
			.map_err(wallet_error)?;
		self.event_bus.publish(WorkflowEvent::Wallet(WalletEvent::PayoutFailed {
			payout_id: payout.id.clone(),
			reason: reason.to_string(),
		}));
		Ok(payout)
	}

	/// Runs the background sweeps until a shutdown signal arrives.
	///
	/// Held entries are released on a fixed interval; the payout sweep
	/// runs once per local day at the configured hour. Sweep failures are
	/// logged and retried on the next tick, never fatal.
	pub async fn run(&self) -> Result<(), EngineError> {
		let release_secs = self.config.wallet.release_interval_seconds.max(1);
		let mut release_ticker = tokio::time::interval(Duration::from_secs(release_secs));
		let mut sweep_ticker = tokio::time::interval(Duration::from_secs(60));
		let mut last_sweep_day: Option<chrono::NaiveDate> = None;

		tracing::info!(
			service_id = %self.config.service.id,
			release_interval_seconds = release_secs,
			payout_hour = self.config.wallet.payout_hour,
			"Workflow engine started"
		);

		loop {
			tokio::select! {
				_ = release_ticker.tick() => {
					match self.wallet.release_due(current_timestamp()).await {
						Ok(0) => {},
						Ok(count) => {
							self.event_bus.publish(WorkflowEvent::Wallet(
								WalletEvent::EntriesReleased { count },
							));
						},
						Err(e) => tracing::error!(error = %e, "Hold release sweep failed"),
					}
				}
				_ = sweep_ticker.tick() => {
					let now_local = chrono::Local::now();
					let today = now_local.date_naive();
					if now_local.hour() == self.config.wallet.payout_hour
						&& last_sweep_day != Some(today)
					{
						match self.wallet.sweep_payouts(current_timestamp()).await {
							Ok(payouts) => {
								last_sweep_day = Some(today);
								for payout in payouts {
									self.event_bus.publish(WorkflowEvent::Wallet(
										WalletEvent::PayoutCreated {
											payout_id: payout.id,
											owner_id: payout.owner_id,
											amount: payout.amount,
										},
									));
								}
							},
							Err(e) => tracing::error!(error = %e, "Payout sweep failed"),
						}
					}
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown signal received, stopping engine");
					break;
				}
			}
		}
		Ok(())
	}
}

fn require_role(actor: &Actor, role: ActorRole) -> Result<(), WorkflowError> {
	if actor.role == role {
		Ok(())
	} else {
		Err(WorkflowError::Unauthorized(format!(
			"Operation requires {} role, got {}",
			role, actor.role
		)))
	}
}

fn require_operator(actor: &Actor) -> Result<(), WorkflowError> {
	match actor.role {
		ActorRole::Admin | ActorRole::System => Ok(()),
		other => Err(WorkflowError::Unauthorized(format!(
			"Operation requires ADMIN or SYSTEM role, got {}",
			other
		))),
	}
}

fn require_owner_or_admin(owner_id: &str, actor: &Actor) -> Result<(), WorkflowError> {
	match actor.role {
		ActorRole::Admin => Ok(()),
		ActorRole::Driver | ActorRole::Vendor if actor.id == owner_id => Ok(()),
		_ => Err(WorkflowError::Unauthorized(
			"Wallets are visible only to their owner".to_string(),
		)),
	}
}

fn require_vendor_of(order: &Order, actor: &Actor) -> Result<(), WorkflowError> {
	match actor.role {
		ActorRole::Admin => Ok(()),
		ActorRole::Vendor if actor.id == order.restaurant_id => Ok(()),
		_ => Err(WorkflowError::Unauthorized(
			"Pickup codes are visible only to the order's vendor".to_string(),
		)),
	}
}

fn require_buyer_of(order: &Order, actor: &Actor) -> Result<(), WorkflowError> {
	match actor.role {
		ActorRole::Admin | ActorRole::System => Ok(()),
		ActorRole::Customer if actor.id == order.buyer_id => Ok(()),
		_ => Err(WorkflowError::Unauthorized(
			"Delivery OTPs are visible only to the order's buyer".to_string(),
		)),
	}
}

fn wallet_error(err: WalletError) -> WorkflowError {
	match err {
		WalletError::Storage(msg) => WorkflowError::Storage(msg),
		other => WorkflowError::InvalidRequest(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_storage::implementations::memory::MemoryStorage;
	use dispatch_storage::StorageError;
	use dispatch_types::PaymentMethod;
	use std::sync::atomic::{AtomicBool, Ordering};

	const CONFIG: &str = r#"
[service]
id = "dispatch-test"

[storage]
primary = "memory"

[storage.implementations.memory]
"#;

	fn engine() -> WorkflowEngine {
		let config = Config::from_toml_str(CONFIG).unwrap();
		WorkflowEngine::new(config, Box::new(MemoryStorage::new())).unwrap()
	}

	fn order_request(restaurant: &str, amount: u32) -> NewOrderRequest {
		NewOrderRequest {
			restaurant_id: restaurant.to_string(),
			payment_method: PaymentMethod::Upi,
			amount: Decimal::from(amount),
			transaction_id: "txn-1".to_string(),
		}
	}

	/// Walks an order from submission to the point where a driver holds it,
	/// returning (order id, pickup code).
	async fn submit_and_ready(engine: &WorkflowEngine) -> (String, String) {
		let buyer = Actor::customer("buyer-1");
		let vendor = Actor::vendor("vendor-1");

		let order = engine
			.submit_order(order_request("vendor-1", 500), &buyer)
			.await
			.unwrap();

		for to in [OrderStatus::Confirmed, OrderStatus::Preparing] {
			engine.update_order_status(&order.id, to, &vendor).await.unwrap();
		}
		let update = engine
			.update_order_status(&order.id, OrderStatus::ReadyForPickup, &vendor)
			.await
			.unwrap();
		(order.id, update.pickup_code.unwrap())
	}

	#[tokio::test]
	async fn test_full_delivery_flow_credits_earnings() {
		let engine = engine();
		let driver = Actor::driver("driver-1");
		let (order_id, pickup_code) = submit_and_ready(&engine).await;

		engine.accept_order(&order_id, &driver).await.unwrap();

		// Submitted with different casing and whitespace; still matches.
		let picked = engine
			.verify_pickup(&order_id, &format!(" {} ", pickup_code.to_lowercase()), &driver)
			.await
			.unwrap();
		assert_eq!(picked.status, OrderStatus::PickedUp);

		// Arrival issues the OTP; the customer receives it via the bus.
		let mut events = engine.subscribe();
		engine
			.update_order_status(&order_id, OrderStatus::ArrivedAtCustomer, &driver)
			.await
			.unwrap();
		let otp = loop {
			match events.recv().await.unwrap() {
				WorkflowEvent::Verification(VerificationEvent::DeliveryOtpIssued {
					otp,
					expires_at,
					..
				}) => {
					assert!(expires_at > current_timestamp());
					break otp;
				},
				_ => continue,
			}
		};

		let delivered = engine.verify_delivery(&order_id, &otp, &driver).await.unwrap();
		assert_eq!(delivered.status, OrderStatus::Delivered);

		// Driver earned 10% of 500, held for 24h.
		let summary = engine.wallet_summary("driver-1", &driver).await.unwrap();
		assert_eq!(summary.in_hold, Decimal::from(50u32));
		assert_eq!(summary.available, Decimal::ZERO);
		let vendor_summary = engine
			.wallet_summary("vendor-1", &Actor::vendor("vendor-1"))
			.await
			.unwrap();
		assert_eq!(vendor_summary.in_hold, Decimal::from(400u32));
	}

	#[tokio::test]
	async fn test_repeat_delivery_verification_does_not_credit_twice() {
		let engine = engine();
		let driver = Actor::driver("driver-1");
		let (order_id, pickup_code) = submit_and_ready(&engine).await;

		engine.accept_order(&order_id, &driver).await.unwrap();
		engine.verify_pickup(&order_id, &pickup_code, &driver).await.unwrap();

		let mut events = engine.subscribe();
		engine
			.update_order_status(&order_id, OrderStatus::ArrivedAtCustomer, &driver)
			.await
			.unwrap();
		let otp = loop {
			if let WorkflowEvent::Verification(VerificationEvent::DeliveryOtpIssued {
				otp, ..
			}) = events.recv().await.unwrap()
			{
				break otp;
			}
		};

		engine.verify_delivery(&order_id, &otp, &driver).await.unwrap();
		let repeat = engine.verify_delivery(&order_id, &otp, &driver).await;
		assert_eq!(repeat.unwrap_err(), WorkflowError::AlreadyConsumed);

		let summary = engine.wallet_summary("driver-1", &driver).await.unwrap();
		assert_eq!(summary.total_earned, Decimal::from(50u32));
	}

	#[tokio::test]
	async fn test_submit_rejects_non_positive_amount() {
		let engine = engine();
		let result = engine
			.submit_order(order_request("vendor-1", 0), &Actor::customer("buyer-1"))
			.await;
		assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
	}

	#[tokio::test]
	async fn test_submit_requires_customer_role() {
		let engine = engine();
		let result = engine
			.submit_order(order_request("vendor-1", 500), &Actor::driver("driver-1"))
			.await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_accept_requires_driver_role() {
		let engine = engine();
		let (order_id, _) = submit_and_ready(&engine).await;

		let result = engine.accept_order(&order_id, &Actor::customer("buyer-1")).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_pickup_code_visible_only_to_owning_vendor() {
		let engine = engine();
		let (order_id, _) = submit_and_ready(&engine).await;

		let other = Actor::vendor("vendor-2");
		let result = engine.generate_pickup_code(&order_id, &other).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		let owner = Actor::vendor("vendor-1");
		let code = engine.generate_pickup_code(&order_id, &owner).await.unwrap();
		assert!(!code.is_empty());
	}

	#[tokio::test]
	async fn test_delivery_otp_visible_only_to_buyer() {
		let engine = engine();
		let driver = Actor::driver("driver-1");
		let (order_id, pickup_code) = submit_and_ready(&engine).await;
		engine.accept_order(&order_id, &driver).await.unwrap();
		engine.verify_pickup(&order_id, &pickup_code, &driver).await.unwrap();
		engine
			.update_order_status(&order_id, OrderStatus::ArrivedAtCustomer, &driver)
			.await
			.unwrap();

		let result = engine.generate_delivery_otp(&order_id, &driver).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		let (otp, expires_at) = engine
			.generate_delivery_otp(&order_id, &Actor::customer("buyer-1"))
			.await
			.unwrap();
		assert_eq!(otp.len(), 4);
		assert!(expires_at > current_timestamp());
	}

	#[tokio::test]
	async fn test_wallet_summary_requires_owner_or_admin() {
		let engine = engine();

		let stranger = Actor::driver("driver-2");
		let result = engine.wallet_summary("driver-1", &stranger).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		let admin = Actor::new("admin-1", ActorRole::Admin);
		let summary = engine.wallet_summary("driver-1", &admin).await.unwrap();
		assert_eq!(summary.total_earned, Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_cancel_publishes_cancellation() {
		let engine = engine();
		let (order_id, _) = submit_and_ready(&engine).await;

		let mut events = engine.subscribe();
		let cancelled = engine
			.cancel_order(&order_id, &Actor::vendor("vendor-1"))
			.await
			.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);
		assert!(cancelled.verification.pickup_code.is_none());

		let mut saw_cancelled = false;
		while let Ok(event) = events.try_recv() {
			match event {
				WorkflowEvent::Order(OrderEvent::Cancelled { .. }) => saw_cancelled = true,
				WorkflowEvent::Order(OrderEvent::StatusChanged { from, to, .. }) => {
					assert_eq!(from, OrderStatus::ReadyForPickup);
					assert_eq!(to, OrderStatus::Cancelled);
				},
				_ => {},
			}
		}
		assert!(saw_cancelled);
	}

	#[tokio::test]
	async fn test_payout_bookkeeping_requires_operator() {
		let engine = engine();

		let driver = Actor::driver("driver-1");
		let result = engine.mark_payout_completed("p1", "UTR-1", &driver).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		// Operators pass the guard; an unknown payout is a request error.
		let result = engine
			.mark_payout_failed("p1", "bank rejected", &Actor::system())
			.await;
		assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
	}

	/// Backend whose wallet entry writes can be made to fail, to exercise the
	/// window between the DELIVERED persist and the wallet credit.
	struct FlakyStorage {
		inner: MemoryStorage,
		fail_wallet_writes: Arc<AtomicBool>,
	}

	#[async_trait::async_trait]
	impl StorageInterface for FlakyStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			if self.fail_wallet_writes.load(Ordering::SeqCst)
				&& key.starts_with("wallet_entries:")
			{
				return Err(StorageError::Backend("write refused".to_string()));
			}
			self.inner.set_bytes(key, value).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}

		fn config_schema(&self) -> Box<dyn dispatch_types::ConfigSchema> {
			self.inner.config_schema()
		}
	}

	#[tokio::test]
	async fn test_retry_recovers_credit_after_wallet_write_failure() {
		let fail_wallet_writes = Arc::new(AtomicBool::new(false));
		let backend = FlakyStorage {
			inner: MemoryStorage::new(),
			fail_wallet_writes: fail_wallet_writes.clone(),
		};
		let config = Config::from_toml_str(CONFIG).unwrap();
		let engine = WorkflowEngine::new(config, Box::new(backend)).unwrap();

		let driver = Actor::driver("driver-1");
		let (order_id, pickup_code) = submit_and_ready(&engine).await;
		engine.accept_order(&order_id, &driver).await.unwrap();
		engine.verify_pickup(&order_id, &pickup_code, &driver).await.unwrap();

		let mut events = engine.subscribe();
		engine
			.update_order_status(&order_id, OrderStatus::ArrivedAtCustomer, &driver)
			.await
			.unwrap();
		let otp = loop {
			if let WorkflowEvent::Verification(VerificationEvent::DeliveryOtpIssued {
				otp, ..
			}) = events.recv().await.unwrap()
			{
				break otp;
			}
		};

		// The delivery persists but the credit fails, leaving the driver
		// with nothing earned on a DELIVERED order.
		fail_wallet_writes.store(true, Ordering::SeqCst);
		let first = engine.verify_delivery(&order_id, &otp, &driver).await;
		assert!(matches!(first, Err(WorkflowError::Storage(_))));
		let order = engine.get_order(&order_id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Delivered);
		let summary = engine.wallet_summary("driver-1", &driver).await.unwrap();
		assert_eq!(summary.total_earned, Decimal::ZERO);

		// Once storage is healthy a retry re-credits, then keeps reporting
		// the verification as consumed.
		fail_wallet_writes.store(false, Ordering::SeqCst);
		let retry = engine.verify_delivery(&order_id, &otp, &driver).await;
		assert_eq!(retry.unwrap_err(), WorkflowError::AlreadyConsumed);
		let summary = engine.wallet_summary("driver-1", &driver).await.unwrap();
		assert_eq!(summary.total_earned, Decimal::from(50u32));
		let vendor_summary = engine
			.wallet_summary("vendor-1", &Actor::vendor("vendor-1"))
			.await
			.unwrap();
		assert_eq!(vendor_summary.total_earned, Decimal::from(400u32));
	}
}
