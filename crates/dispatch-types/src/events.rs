//! Event types for inter-service communication.
//!
//! Events flow through a broadcast bus so consumers (dashboards,
//! notification senders) can react to workflow changes without polling.
//! Delivery of an event is fire-and-forget; no transition's correctness
//! depends on a subscriber seeing it.

use crate::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main event type encompassing all workflow events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
	/// Events from the order state machine.
	Order(OrderEvent),
	/// Events from verification operations.
	Verification(VerificationEvent),
	/// Events from wallet and payout bookkeeping.
	Wallet(WalletEvent),
}

/// Events related to order lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order entered the system.
	Submitted { order_id: String },
	/// An order moved to a new status.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// A driver won the claim on a ready order.
	Claimed { order_id: String, driver_id: String },
	/// An order was cancelled and its codes invalidated.
	Cancelled { order_id: String },
}

/// Events related to proof-of-pickup and proof-of-delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationEvent {
	/// A fresh pickup code was issued for an order.
	///
	/// The code itself is not broadcast; the vendor surface receives it in
	/// the issuing call's response.
	PickupCodeIssued { order_id: String },
	/// A fresh delivery OTP was issued, valid until `expires_at`.
	///
	/// Carries the digits so the notification collaborator can deliver
	/// them to the customer; subscribers are in-process and trusted.
	DeliveryOtpIssued {
		order_id: String,
		otp: String,
		expires_at: u64,
	},
	/// Pickup was verified and the order moved to PICKED_UP.
	PickupVerified { order_id: String, driver_id: String },
	/// Delivery was verified and the order moved to DELIVERED.
	DeliveryVerified { order_id: String, driver_id: String },
}

/// Events related to wallet entries and payouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletEvent {
	/// An earning was credited (HELD) for a delivered order.
	EntryCredited {
		entry_id: String,
		owner_id: String,
		order_id: String,
		amount: Decimal,
	},
	/// The hold-release sweep promoted entries to AVAILABLE.
	EntriesReleased { count: usize },
	/// The daily sweep created a payout.
	PayoutCreated {
		payout_id: String,
		owner_id: String,
		amount: Decimal,
	},
	/// A payout transfer completed with the given reference.
	PayoutCompleted { payout_id: String, utr: String },
	/// A payout transfer failed; its entries were reverted to AVAILABLE.
	PayoutFailed { payout_id: String, reason: String },
}
