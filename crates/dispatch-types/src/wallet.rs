//! Wallet and payout types.
//!
//! Earnings from delivered orders are held for a configurable period before
//! becoming withdrawable, then batched into payouts by a daily sweep.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single earning credited to a driver or vendor for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
	/// Unique identifier for this entry.
	pub id: String,
	/// Driver or vendor the earning belongs to.
	pub owner_id: String,
	/// Order that produced the earning.
	pub order_id: String,
	/// Earned amount.
	pub amount: Decimal,
	/// Timestamp when the earning was credited (unix seconds).
	pub earned_at: u64,
	/// Timestamp when the hold period ends and the entry becomes
	/// withdrawable (earned_at + hold period).
	pub hold_release_at: u64,
	/// Current state of the entry.
	pub status: WalletEntryStatus,
	/// Payout that swept this entry, once one exists.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payout_id: Option<String>,
}

/// Lifecycle state of a wallet entry.
///
/// Held -> Available only once the hold period elapses;
/// Available -> PaidOut only via a payout sweep. A failed payout reverts
/// its entries to Available so the next sweep retries them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletEntryStatus {
	Held,
	Available,
	PaidOut,
}

/// An outgoing transfer batching one owner's available entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
	/// Unique identifier for this payout.
	pub id: String,
	/// Driver or vendor being paid.
	pub owner_id: String,
	/// Sum of the swept entries at sweep time.
	pub amount: Decimal,
	/// Transfer rail for this payout.
	pub method: PayoutMethod,
	/// Current state of the payout.
	pub status: PayoutStatus,
	/// Bank/UPI transaction reference once the transfer completes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utr: Option<String>,
	/// Entries this payout swept. Needed to revert them on failure.
	pub entry_ids: Vec<String>,
	/// Timestamp when the sweep created this payout (unix seconds).
	pub created_at: u64,
}

/// Supported payout rails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutMethod {
	Upi,
	BankTransfer,
}

/// Lifecycle state of a payout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

impl fmt::Display for PayoutStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			PayoutStatus::Pending => "PENDING",
			PayoutStatus::Processing => "PROCESSING",
			PayoutStatus::Completed => "COMPLETED",
			PayoutStatus::Failed => "FAILED",
		};
		write!(f, "{}", name)
	}
}

/// Point-in-time balance summary for one owner.
///
/// Hold state is computed against the query time, so a summary never lags
/// behind the persisted sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
	/// Sum of entries past their hold period and not yet paid out.
	pub available: Decimal,
	/// Sum of entries still inside their hold period.
	pub in_hold: Decimal,
	/// Lifetime sum of all entries, including paid out ones.
	pub total_earned: Decimal,
}
