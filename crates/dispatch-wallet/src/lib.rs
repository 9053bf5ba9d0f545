//! Wallet and payout bookkeeping for the dispatch workflow system.
//!
//! Earnings from delivered orders are credited as HELD wallet entries, one
//! per payee. A recurring sweep promotes entries past their hold period to
//! AVAILABLE, and a daily sweep batches each owner's available balance into
//! a payout when it clears the configured minimum. Failed payouts revert
//! their entries so the next sweep retries them; funds are never silently
//! lost.

use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{
	truncate_id, Order, Payout, PayoutMethod, PayoutStatus, StorageKey, WalletEntry,
	WalletEntryStatus, WalletSummary,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
	/// No payout exists under the given id.
	#[error("Payout not found: {0}")]
	PayoutNotFound(String),
	/// The payout is not in a state that permits the operation.
	#[error("Payout {id} is {status}, expected {expected}")]
	InvalidPayoutState {
		id: String,
		status: PayoutStatus,
		expected: PayoutStatus,
	},
}

impl From<StorageError> for WalletError {
	fn from(err: StorageError) -> Self {
		WalletError::Storage(err.to_string())
	}
}

/// Tunable policy for earnings and payouts.
#[derive(Debug, Clone)]
pub struct WalletPolicy {
	/// How long an earning stays HELD after delivery.
	pub hold_period: Duration,
	/// Platform commission taken from the vendor, in percent.
	pub commission_percent: u32,
	/// Driver's share of the order amount, in percent.
	pub driver_share_percent: u32,
	/// Minimum available balance for the sweep to create a payout.
	pub minimum_payout: Decimal,
	/// Transfer rail used for created payouts.
	pub payout_method: PayoutMethod,
}

/// Manages wallet entries and payout sweeps.
pub struct WalletService {
	storage: Arc<StorageService>,
	policy: WalletPolicy,
}

impl WalletService {
	pub fn new(storage: Arc<StorageService>, policy: WalletPolicy) -> Self {
		Self { storage, policy }
	}

	fn percent_of(amount: Decimal, percent: u32) -> Decimal {
		(amount * Decimal::from(percent) / Decimal::from(100u32)).round_dp(2)
	}

	/// Credits HELD earnings for a delivered order.
	///
	/// Creates one entry for the driver (their share of the order amount)
	/// and one for the vendor (the amount net of commission). Entry ids
	/// derive from (order, owner), so a crash-retried credit overwrites the
	/// same records instead of duplicating them.
	pub async fn credit_delivery(
		&self,
		order: &Order,
		now: u64,
	) -> Result<Vec<WalletEntry>, WalletError> {
		let driver_id = match &order.driver_id {
			Some(id) => id.clone(),
			None => {
				// Verified deliveries always carry a driver; treat the gap
				// as corrupt input rather than credit a phantom payee.
				tracing::error!(
					order_id = %truncate_id(&order.id),
					"Delivered order has no driver; skipping wallet credit"
				);
				return Ok(Vec::new());
			},
		};

		let driver_amount = Self::percent_of(order.payment.amount, self.policy.driver_share_percent);
		let vendor_amount =
			order.payment.amount - Self::percent_of(order.payment.amount, self.policy.commission_percent);
		let hold_release_at = now + self.policy.hold_period.as_secs();

		let mut entries = Vec::with_capacity(2);
		for (owner_id, amount) in [
			(driver_id, driver_amount),
			(order.restaurant_id.clone(), vendor_amount),
		] {
			let entry = WalletEntry {
				id: format!("{}-{}", order.id, owner_id),
				owner_id,
				order_id: order.id.clone(),
				amount,
				earned_at: now,
				hold_release_at,
				status: WalletEntryStatus::Held,
				payout_id: None,
			};
			self.storage
				.store(StorageKey::WalletEntries.as_str(), &entry.id, &entry)
				.await?;
			tracing::info!(
				entry_id = %entry.id,
				owner_id = %entry.owner_id,
				amount = %entry.amount,
				"Wallet entry credited"
			);
			entries.push(entry);
		}
		Ok(entries)
	}

	/// Returns true if the order's delivery earnings were already credited.
	///
	/// Entry ids are deterministic, so the driver's entry existing means the
	/// credit ran. Orders without a driver have nothing to credit.
	pub async fn has_credited(&self, order: &Order) -> Result<bool, WalletError> {
		let Some(driver_id) = &order.driver_id else {
			return Ok(true);
		};
		Ok(self
			.storage
			.exists(
				StorageKey::WalletEntries.as_str(),
				&format!("{}-{}", order.id, driver_id),
			)
			.await?)
	}

	async fn all_entries(&self) -> Result<Vec<WalletEntry>, WalletError> {
		Ok(self
			.storage
			.retrieve_all(StorageKey::WalletEntries.as_str())
			.await?)
	}

	/// Promotes HELD entries past their hold period to AVAILABLE.
	///
	/// Returns the number of entries promoted.
	pub async fn release_due(&self, now: u64) -> Result<usize, WalletError> {
		let mut released = 0;
		for mut entry in self.all_entries().await? {
			if entry.status == WalletEntryStatus::Held && entry.hold_release_at <= now {
				entry.status = WalletEntryStatus::Available;
				self.storage
					.update(StorageKey::WalletEntries.as_str(), &entry.id, &entry)
					.await?;
				released += 1;
			}
		}
		if released > 0 {
			tracing::info!(count = released, "Released held wallet entries");
		}
		Ok(released)
	}

	/// Computes an owner's balance summary at the given instant.
	///
	/// Hold state is evaluated against `now`, so the summary is accurate
	/// even between release sweeps.
	pub async fn summary(&self, owner_id: &str, now: u64) -> Result<WalletSummary, WalletError> {
		let mut available = Decimal::ZERO;
		let mut in_hold = Decimal::ZERO;
		let mut total_earned = Decimal::ZERO;

		for entry in self.all_entries().await? {
			if entry.owner_id != owner_id {
				continue;
			}
			total_earned += entry.amount;
			match entry.status {
				WalletEntryStatus::Available => available += entry.amount,
				WalletEntryStatus::Held if entry.hold_release_at <= now => {
					available += entry.amount
				},
				WalletEntryStatus::Held => in_hold += entry.amount,
				WalletEntryStatus::PaidOut => {},
			}
		}

		Ok(WalletSummary {
			available,
			in_hold,
			total_earned,
		})
	}

	/// Runs the payout sweep over all owners' AVAILABLE balances.
	///
	/// For each owner whose available sum clears the minimum, creates a
	/// PENDING payout recording the contributing entries and flips those
	/// entries to PAID_OUT. Balances below the minimum roll over.
	pub async fn sweep_payouts(&self, now: u64) -> Result<Vec<Payout>, WalletError> {
		let mut per_owner: HashMap<String, Vec<WalletEntry>> = HashMap::new();
		for entry in self.all_entries().await? {
			if entry.status == WalletEntryStatus::Available {
				per_owner.entry(entry.owner_id.clone()).or_default().push(entry);
			}
		}

		let mut payouts = Vec::new();
		for (owner_id, entries) in per_owner {
			let total: Decimal = entries.iter().map(|e| e.amount).sum();
			if total < self.policy.minimum_payout {
				tracing::info!(
					owner_id = %owner_id,
					available = %total,
					minimum = %self.policy.minimum_payout,
					"Available balance below payout minimum, rolling over"
				);
				continue;
			}

			let payout = Payout {
				id: uuid::Uuid::new_v4().to_string(),
				owner_id: owner_id.clone(),
				amount: total,
				method: self.policy.payout_method,
				status: PayoutStatus::Pending,
				utr: None,
				entry_ids: entries.iter().map(|e| e.id.clone()).collect(),
				created_at: now,
			};

			// The payout record (with its entry list) is written before the
			// entries flip, so a crash mid-sweep can be reconciled from it.
			self.storage
				.store(StorageKey::Payouts.as_str(), &payout.id, &payout)
				.await?;

			for mut entry in entries {
				entry.status = WalletEntryStatus::PaidOut;
				entry.payout_id = Some(payout.id.clone());
				self.storage
					.update(StorageKey::WalletEntries.as_str(), &entry.id, &entry)
					.await?;
			}

			tracing::info!(
				payout_id = %truncate_id(&payout.id),
				owner_id = %owner_id,
				amount = %payout.amount,
				"Payout created"
			);
			payouts.push(payout);
		}
		Ok(payouts)
	}

	async fn get_payout(&self, payout_id: &str) -> Result<Payout, WalletError> {
		match self
			.storage
			.retrieve(StorageKey::Payouts.as_str(), payout_id)
			.await
		{
			Ok(payout) => Ok(payout),
			Err(StorageError::NotFound) => Err(WalletError::PayoutNotFound(payout_id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	/// Marks a pending payout as completed with its transfer reference.
	pub async fn complete_payout(&self, payout_id: &str, utr: &str) -> Result<Payout, WalletError> {
		let mut payout = self.get_payout(payout_id).await?;
		if !matches!(payout.status, PayoutStatus::Pending | PayoutStatus::Processing) {
			return Err(WalletError::InvalidPayoutState {
				id: payout.id,
				status: payout.status,
				expected: PayoutStatus::Pending,
			});
		}
		payout.status = PayoutStatus::Completed;
		payout.utr = Some(utr.to_string());
		self.storage
			.update(StorageKey::Payouts.as_str(), payout_id, &payout)
			.await?;
		tracing::info!(payout_id = %truncate_id(payout_id), utr = %utr, "Payout completed");
		Ok(payout)
	}

	/// Marks a payout as failed and reverts its entries to AVAILABLE.
	///
	/// The reverted entries are picked up again by the next sweep.
	pub async fn fail_payout(&self, payout_id: &str, reason: &str) -> Result<Payout, WalletError> {
		let mut payout = self.get_payout(payout_id).await?;
		if !matches!(payout.status, PayoutStatus::Pending | PayoutStatus::Processing) {
			return Err(WalletError::InvalidPayoutState {
				id: payout.id,
				status: payout.status,
				expected: PayoutStatus::Pending,
			});
		}
		payout.status = PayoutStatus::Failed;
		self.storage
			.update(StorageKey::Payouts.as_str(), payout_id, &payout)
			.await?;

		for entry_id in &payout.entry_ids {
			let mut entry: WalletEntry = self
				.storage
				.retrieve(StorageKey::WalletEntries.as_str(), entry_id)
				.await?;
			entry.status = WalletEntryStatus::Available;
			entry.payout_id = None;
			self.storage
				.update(StorageKey::WalletEntries.as_str(), entry_id, &entry)
				.await?;
		}

		tracing::warn!(
			payout_id = %truncate_id(payout_id),
			reason = %reason,
			"Payout failed, entries reverted for retry"
		);
		Ok(payout)
	}

	/// Returns an owner's payouts, newest first.
	pub async fn payout_history(&self, owner_id: &str) -> Result<Vec<Payout>, WalletError> {
		let mut payouts: Vec<Payout> = self
			.storage
			.retrieve_all::<Payout>(StorageKey::Payouts.as_str())
			.await?
			.into_iter()
			.filter(|p| p.owner_id == owner_id)
			.collect();
		payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(payouts)
	}
}
