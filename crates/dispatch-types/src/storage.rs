//! Storage-related types for the dispatch system.

/// Storage namespaces for the different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Namespace for order records.
	Orders,
	/// Namespace for wallet entries.
	WalletEntries,
	/// Namespace for payout records.
	Payouts,
}

impl StorageKey {
	/// Returns the string representation of the storage namespace.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::WalletEntries => "wallet_entries",
			StorageKey::Payouts => "payouts",
		}
	}
}
