//! Order types for the dispatch workflow system.
//!
//! This module defines the order record, its status enum, the payment
//! summary and the embedded verification state used throughout the order
//! lifecycle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a food-delivery order with its full lifecycle state.
///
/// An order is created at checkout and carries everything needed for
/// status tracking, proof-of-pickup/delivery verification and wallet
/// crediting once delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Vendor (restaurant) that received the order.
	pub restaurant_id: String,
	/// Assigned driver. None until a driver claims the order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	/// Customer who placed the order.
	pub buyer_id: String,
	/// Payment summary for the order.
	pub payment: Payment,
	/// Proof-of-pickup and proof-of-delivery state.
	pub verification: Verification,
	/// Timestamp when this order was created (unix seconds).
	pub created_at: u64,
	/// Timestamp when this order was last updated (unix seconds).
	pub updated_at: u64,
}

impl Order {
	/// Returns true if the order has reached a terminal state.
	pub fn is_terminal(&self) -> bool {
		matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled)
	}
}

/// Payment summary attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
	/// How the order was (or will be) paid.
	pub method: PaymentMethod,
	/// Total order amount.
	pub amount: Decimal,
	/// Gateway transaction reference, or a synthetic id for COD.
	pub transaction_id: String,
}

/// Supported payment methods.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
	Cod,
	Card,
	Upi,
}

/// Verification state embedded in an order.
///
/// Holds the current proof-of-pickup code and proof-of-delivery OTP along
/// with their consumption timestamps. A consumed code can never be matched
/// again; issuing a new code invalidates any prior unconsumed one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verification {
	/// One-time code the driver presents to the vendor at pickup.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pickup_code: Option<String>,
	/// Timestamp when the pickup code was consumed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pickup_consumed_at: Option<u64>,
	/// One-time 4-digit OTP the customer hands to the driver.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_otp: Option<String>,
	/// Timestamp when the current OTP was generated.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub otp_generated_at: Option<u64>,
	/// Timestamp after which the current OTP no longer matches.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub otp_expires_at: Option<u64>,
	/// Timestamp when the delivery OTP was consumed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_consumed_at: Option<u64>,
}

impl Verification {
	/// Clears all codes, invalidating any pending verification.
	///
	/// Used on cancellation so no further verification can succeed.
	pub fn invalidate(&mut self) {
		self.pickup_code = None;
		self.delivery_otp = None;
		self.otp_generated_at = None;
		self.otp_expires_at = None;
	}
}

/// Status of an order in the delivery workflow.
///
/// This is the single authoritative status enum; external callers parse
/// into it at the API boundary rather than branching on ad hoc strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Created on checkout submission, awaiting vendor acceptance.
	Pending,
	/// Vendor accepted the order.
	Confirmed,
	/// Vendor is preparing the order.
	Preparing,
	/// Prepared and waiting for a driver to claim it.
	ReadyForPickup,
	/// A driver claimed the order.
	Accepted,
	/// Pickup verified; order is in transit.
	PickedUp,
	/// Driver signalled arrival at the customer.
	ArrivedAtCustomer,
	/// Delivery verified. Terminal.
	Delivered,
	/// Rejected or cancelled. Terminal.
	Cancelled,
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "PENDING",
			OrderStatus::Confirmed => "CONFIRMED",
			OrderStatus::Preparing => "PREPARING",
			OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
			OrderStatus::Accepted => "ACCEPTED",
			OrderStatus::PickedUp => "PICKED_UP",
			OrderStatus::ArrivedAtCustomer => "ARRIVED_AT_CUSTOMER",
			OrderStatus::Delivered => "DELIVERED",
			OrderStatus::Cancelled => "CANCELLED",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"PENDING" => Ok(Self::Pending),
			"CONFIRMED" => Ok(Self::Confirmed),
			"PREPARING" => Ok(Self::Preparing),
			"READY_FOR_PICKUP" => Ok(Self::ReadyForPickup),
			"ACCEPTED" => Ok(Self::Accepted),
			"PICKED_UP" => Ok(Self::PickedUp),
			"ARRIVED_AT_CUSTOMER" => Ok(Self::ArrivedAtCustomer),
			"DELIVERED" => Ok(Self::Delivered),
			"CANCELLED" => Ok(Self::Cancelled),
			other => Err(format!("Unknown order status: {}", other)),
		}
	}
}
