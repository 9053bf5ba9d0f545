//! Actor identity types.
//!
//! Every workflow operation takes the acting identity explicitly; the core
//! never relies on ambient session state. Surfaces resolve a session token
//! to an `Actor` before calling in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity performing a workflow operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
	/// Opaque identifier of the acting party.
	pub id: String,
	/// Role the party acts under.
	pub role: ActorRole,
}

impl Actor {
	pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
		Self {
			id: id.into(),
			role,
		}
	}

	/// Shorthand for a vendor actor.
	pub fn vendor(id: impl Into<String>) -> Self {
		Self::new(id, ActorRole::Vendor)
	}

	/// Shorthand for a driver actor.
	pub fn driver(id: impl Into<String>) -> Self {
		Self::new(id, ActorRole::Driver)
	}

	/// Shorthand for a customer actor.
	pub fn customer(id: impl Into<String>) -> Self {
		Self::new(id, ActorRole::Customer)
	}

	/// The system actor used by internal jobs such as the payout sweep.
	pub fn system() -> Self {
		Self::new("system", ActorRole::System)
	}
}

/// Roles permitted to trigger workflow operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
	Vendor,
	Driver,
	Customer,
	Admin,
	System,
}

impl fmt::Display for ActorRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ActorRole::Vendor => "VENDOR",
			ActorRole::Driver => "DRIVER",
			ActorRole::Customer => "CUSTOMER",
			ActorRole::Admin => "ADMIN",
			ActorRole::System => "SYSTEM",
		};
		write!(f, "{}", name)
	}
}
