//! Order state machine for the dispatch workflow system.
//!
//! Manages order state transitions with validation, ensuring orders move
//! through the legal lifecycle:
//! Pending -> Confirmed -> Preparing -> ReadyForPickup -> Accepted ->
//! PickedUp -> ArrivedAtCustomer -> Delivered, with Cancelled reachable
//! from any non-terminal state. Enforces which actor may trigger each
//! transition and serializes all mutation of one order behind a per-order
//! async lock, so claims and verification consumption are atomic
//! check-and-set operations.

use dashmap::DashMap;
use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{
	current_timestamp, truncate_id, Actor, ActorRole, Order, OrderStatus, StorageKey,
	WorkflowError,
};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	/// Per-order mutation locks. An entry is created on first touch and
	/// kept for the order's lifetime; orders are short-lived enough that
	/// the registry does not need eviction.
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			locks: DashMap::new(),
		}
	}

	fn lock_for(&self, order_id: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	/// Stores a new order.
	pub async fn store_order(&self, order: &Order) -> Result<(), WorkflowError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| WorkflowError::Storage(e.to_string()))
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, WorkflowError> {
		match self
			.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
		{
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => Err(WorkflowError::OrderNotFound(order_id.to_string())),
			Err(e) => Err(WorkflowError::Storage(e.to_string())),
		}
	}

	/// Applies a fallible update to an order under its mutation lock.
	///
	/// The order is re-read inside the lock, the updater is applied, and
	/// the result is persisted only if the updater succeeds. A failing
	/// updater leaves the stored order untouched, which is what gives
	/// claims and verification their exactly-one-winner semantics.
	pub async fn with_order<T, F>(&self, order_id: &str, updater: F) -> Result<T, WorkflowError>
	where
		F: FnOnce(&mut Order) -> Result<T, WorkflowError>,
	{
		let lock = self.lock_for(order_id);
		let _guard = lock.lock().await;

		let mut order = self.get_order(order_id).await?;
		let value = updater(&mut order)?;
		order.updated_at = current_timestamp();

		// A DELIVERED order with an unconsumed OTP means status and
		// verification disagree. Surface it loudly rather than correct it.
		if order.status == OrderStatus::Delivered
			&& order.verification.delivery_consumed_at.is_none()
		{
			tracing::error!(
				order_id = %truncate_id(order_id),
				"Data integrity violation: DELIVERED order with unconsumed OTP"
			);
		}

		self.storage
			.update(StorageKey::Orders.as_str(), order_id, &order)
			.await
			.map_err(|e| WorkflowError::Storage(e.to_string()))?;

		Ok(value)
	}

	/// Checks if a state transition edge exists in the lifecycle table.
	pub fn is_valid_transition(from: &OrderStatus, to: &OrderStatus) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				OrderStatus::Pending,
				HashSet::from([OrderStatus::Confirmed, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::Confirmed,
				HashSet::from([OrderStatus::Preparing, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::Preparing,
				HashSet::from([OrderStatus::ReadyForPickup, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::ReadyForPickup,
				HashSet::from([OrderStatus::Accepted, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::Accepted,
				HashSet::from([OrderStatus::PickedUp, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::PickedUp,
				HashSet::from([OrderStatus::ArrivedAtCustomer, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::ArrivedAtCustomer,
				HashSet::from([OrderStatus::Delivered, OrderStatus::Cancelled]),
			);
			m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
			m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
			m
		});

		TRANSITIONS
			.get(from)
			.is_some_and(|set| set.contains(to))
	}

	/// Checks that the actor may trigger the given edge.
	///
	/// Vendor-only edges require the order's own vendor (admins may act on
	/// any order); driver edges require the assigned driver.
	fn authorize_edge(order: &Order, to: &OrderStatus, actor: &Actor) -> Result<(), WorkflowError> {
		match to {
			OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::ReadyForPickup => {
				require_vendor(order, actor)
			},
			OrderStatus::ArrivedAtCustomer => require_assigned_driver(order, actor),
			OrderStatus::Cancelled => match actor.role {
				ActorRole::Admin | ActorRole::System => Ok(()),
				_ => require_vendor(order, actor),
			},
			// Claiming and verification have dedicated entry points; the
			// plain transition surface never reaches these states.
			OrderStatus::Accepted => Err(WorkflowError::Unauthorized(
				"Orders are claimed through acceptOrder".to_string(),
			)),
			OrderStatus::PickedUp => Err(WorkflowError::Unauthorized(
				"PICKED_UP requires pickup verification".to_string(),
			)),
			OrderStatus::Delivered => Err(WorkflowError::Unauthorized(
				"DELIVERED requires delivery verification".to_string(),
			)),
			OrderStatus::Pending => Err(WorkflowError::InvalidRequest(
				"Orders cannot transition back to PENDING".to_string(),
			)),
		}
	}

	/// Transitions an order to a new status with validation.
	pub async fn transition(
		&self,
		order_id: &str,
		to: OrderStatus,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let (_, order) = self.transition_with(order_id, to, actor, |_| {}).await?;
		Ok(order)
	}

	/// Transitions an order and applies a side effect in the same persist.
	///
	/// Used for edges whose side effect must be atomic with the status
	/// change, e.g. issuing a pickup code when the vendor marks an order
	/// READY_FOR_PICKUP. The effect runs only after validation passes.
	/// Returns the pre-transition status alongside the updated order; the
	/// status is read under the order lock, so callers can publish it
	/// without racing concurrent updates.
	pub async fn transition_with<E>(
		&self,
		order_id: &str,
		to: OrderStatus,
		actor: &Actor,
		effect: E,
	) -> Result<(OrderStatus, Order), WorkflowError>
	where
		E: FnOnce(&mut Order),
	{
		let updated = self
			.with_order(order_id, |order| {
				if !Self::is_valid_transition(&order.status, &to) {
					return Err(WorkflowError::InvalidTransition {
						from: order.status,
						to,
					});
				}
				Self::authorize_edge(order, &to, actor)?;

				let from = order.status;
				order.status = to;
				if to == OrderStatus::Cancelled {
					order.verification.invalidate();
				}
				effect(order);
				Ok((from, order.clone()))
			})
			.await?;

		let (from, order) = updated;
		tracing::info!(
			order_id = %truncate_id(order_id),
			from = %from,
			to = %to,
			actor = %actor.role,
			"Order transitioned"
		);
		Ok((from, order))
	}

	/// Claims a READY_FOR_PICKUP order for a driver.
	///
	/// Atomic compare-and-set on driver_id/status: exactly one of any
	/// number of racing drivers wins; the rest get AlreadyAssigned.
	pub async fn claim(&self, order_id: &str, driver_id: &str) -> Result<Order, WorkflowError> {
		let order = self
			.with_order(order_id, |order| {
				if order.driver_id.is_some() {
					return Err(WorkflowError::AlreadyAssigned);
				}
				if order.status != OrderStatus::ReadyForPickup {
					return Err(WorkflowError::InvalidTransition {
						from: order.status,
						to: OrderStatus::Accepted,
					});
				}
				order.driver_id = Some(driver_id.to_string());
				order.status = OrderStatus::Accepted;
				Ok(order.clone())
			})
			.await?;

		tracing::info!(
			order_id = %truncate_id(order_id),
			driver_id = %driver_id,
			"Order claimed"
		);
		Ok(order)
	}

	/// Cancels an order, invalidating all pending codes.
	pub async fn cancel(&self, order_id: &str, actor: &Actor) -> Result<Order, WorkflowError> {
		self.transition(order_id, OrderStatus::Cancelled, actor).await
	}
}

fn require_vendor(order: &Order, actor: &Actor) -> Result<(), WorkflowError> {
	if actor.role == ActorRole::Admin {
		return Ok(());
	}
	if actor.role != ActorRole::Vendor {
		return Err(WorkflowError::Unauthorized(format!(
			"Requires VENDOR role, got {}",
			actor.role
		)));
	}
	if actor.id != order.restaurant_id {
		return Err(WorkflowError::Unauthorized(
			"Vendor does not own this order".to_string(),
		));
	}
	Ok(())
}

fn require_assigned_driver(order: &Order, actor: &Actor) -> Result<(), WorkflowError> {
	if actor.role != ActorRole::Driver {
		return Err(WorkflowError::Unauthorized(format!(
			"Requires DRIVER role, got {}",
			actor.role
		)));
	}
	match &order.driver_id {
		Some(assigned) if *assigned == actor.id => Ok(()),
		_ => Err(WorkflowError::NotAssigned),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_storage::implementations::memory::MemoryStorage;
	use dispatch_types::{Payment, PaymentMethod, Verification};
	use rust_decimal::Decimal;

	fn test_order(id: &str, status: OrderStatus) -> Order {
		Order {
			id: id.to_string(),
			status,
			restaurant_id: "vendor-1".to_string(),
			driver_id: None,
			buyer_id: "buyer-1".to_string(),
			payment: Payment {
				method: PaymentMethod::Upi,
				amount: Decimal::new(25000, 2),
				transaction_id: "txn-1".to_string(),
			},
			verification: Verification::default(),
			created_at: 1_700_000_000,
			updated_at: 1_700_000_000,
		}
	}

	fn machine() -> OrderStateMachine {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		OrderStateMachine::new(storage)
	}

	#[tokio::test]
	async fn test_vendor_walks_order_to_ready() {
		let sm = machine();
		sm.store_order(&test_order("o1", OrderStatus::Pending))
			.await
			.unwrap();
		let vendor = Actor::vendor("vendor-1");

		for to in [
			OrderStatus::Confirmed,
			OrderStatus::Preparing,
			OrderStatus::ReadyForPickup,
		] {
			let order = sm.transition("o1", to, &vendor).await.unwrap();
			assert_eq!(order.status, to);
		}
	}

	#[tokio::test]
	async fn test_transition_reports_prior_status_from_under_lock() {
		let sm = machine();
		sm.store_order(&test_order("o1", OrderStatus::Pending))
			.await
			.unwrap();

		let (from, order) = sm
			.transition_with("o1", OrderStatus::Confirmed, &Actor::vendor("vendor-1"), |_| {})
			.await
			.unwrap();
		assert_eq!(from, OrderStatus::Pending);
		assert_eq!(order.status, OrderStatus::Confirmed);
	}

	#[tokio::test]
	async fn test_invalid_transition_leaves_state_unchanged() {
		let sm = machine();
		sm.store_order(&test_order("o1", OrderStatus::Pending))
			.await
			.unwrap();
		let vendor = Actor::vendor("vendor-1");

		let result = sm
			.transition("o1", OrderStatus::ReadyForPickup, &vendor)
			.await;
		assert_eq!(
			result.unwrap_err(),
			WorkflowError::InvalidTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::ReadyForPickup,
			}
		);
		assert_eq!(
			sm.get_order("o1").await.unwrap().status,
			OrderStatus::Pending
		);
	}

	#[tokio::test]
	async fn test_wrong_vendor_is_unauthorized() {
		let sm = machine();
		sm.store_order(&test_order("o1", OrderStatus::Pending))
			.await
			.unwrap();

		let other = Actor::vendor("vendor-2");
		let result = sm.transition("o1", OrderStatus::Confirmed, &other).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_driver_cannot_use_plain_transition_for_pickup() {
		let sm = machine();
		let mut order = test_order("o1", OrderStatus::Accepted);
		order.driver_id = Some("driver-1".to_string());
		sm.store_order(&order).await.unwrap();

		let driver = Actor::driver("driver-1");
		let result = sm.transition("o1", OrderStatus::PickedUp, &driver).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_claim_sets_driver_and_status() {
		let sm = machine();
		sm.store_order(&test_order("o1", OrderStatus::ReadyForPickup))
			.await
			.unwrap();

		let order = sm.claim("o1", "driver-1").await.unwrap();
		assert_eq!(order.status, OrderStatus::Accepted);
		assert_eq!(order.driver_id.as_deref(), Some("driver-1"));

		let second = sm.claim("o1", "driver-2").await;
		assert_eq!(second.unwrap_err(), WorkflowError::AlreadyAssigned);
	}

	#[tokio::test]
	async fn test_concurrent_claims_have_one_winner() {
		let sm = Arc::new(machine());
		sm.store_order(&test_order("o1", OrderStatus::ReadyForPickup))
			.await
			.unwrap();

		let mut handles = Vec::new();
		for i in 0..8 {
			let sm = sm.clone();
			handles.push(tokio::spawn(async move {
				sm.claim("o1", &format!("driver-{}", i)).await
			}));
		}

		let mut winners = 0;
		let mut already_assigned = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => winners += 1,
				Err(WorkflowError::AlreadyAssigned) => already_assigned += 1,
				Err(other) => panic!("unexpected error: {:?}", other),
			}
		}
		assert_eq!(winners, 1);
		assert_eq!(already_assigned, 7);
	}

	#[tokio::test]
	async fn test_cancel_invalidates_codes() {
		let sm = machine();
		let mut order = test_order("o1", OrderStatus::ReadyForPickup);
		order.verification.pickup_code = Some("AB12CD34".to_string());
		sm.store_order(&order).await.unwrap();

		let cancelled = sm.cancel("o1", &Actor::vendor("vendor-1")).await.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);
		assert!(cancelled.verification.pickup_code.is_none());
	}

	#[tokio::test]
	async fn test_cancel_after_delivery_fails() {
		let sm = machine();
		let mut order = test_order("o1", OrderStatus::Delivered);
		order.verification.delivery_consumed_at = Some(1_700_000_100);
		sm.store_order(&order).await.unwrap();

		let result = sm.cancel("o1", &Actor::vendor("vendor-1")).await;
		assert!(matches!(
			result,
			Err(WorkflowError::InvalidTransition { .. })
		));
	}

	#[tokio::test]
	async fn test_unknown_order_is_not_found() {
		let sm = machine();
		let result = sm.get_order("missing").await;
		assert_eq!(
			result.unwrap_err(),
			WorkflowError::OrderNotFound("missing".to_string())
		);
	}
}
