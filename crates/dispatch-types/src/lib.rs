//! Common types module for the dispatch workflow system.
//!
//! This module defines the core data types and structures used throughout
//! the order verification and lifecycle service. It provides a centralized
//! location for shared types to ensure consistency across all components.

/// Actor identity and role types for authorization decisions.
pub mod actor;
/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Error taxonomy shared by all workflow operations.
pub mod errors;
/// Event types for inter-service communication.
pub mod events;
/// Order, payment and verification types.
pub mod order;
/// Storage namespace keys for managing persistent data.
pub mod storage;
/// Utility functions for timestamps and display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;
/// Wallet entry and payout types.
pub mod wallet;

// Re-export all types for convenient access
pub use actor::*;
pub use api::*;
pub use errors::*;
pub use events::*;
pub use order::*;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
pub use wallet::*;
