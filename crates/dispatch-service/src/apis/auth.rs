//! Actor resolution for API requests.
//!
//! Session handling lives at the gateway; requests arrive with the already
//! authenticated identity in the `x-actor-id` and `x-actor-role` headers.
//! The core receives the resolved [`Actor`] explicitly and never trusts
//! identifiers from request bodies.

use axum::http::HeaderMap;
use dispatch_types::{Actor, ActorRole, ApiError};

/// Resolves the acting identity from request headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
	let id = headers
		.get("x-actor-id")
		.and_then(|v| v.to_str().ok())
		.filter(|s| !s.is_empty())
		.ok_or_else(|| ApiError::bad_request("Missing x-actor-id header"))?;

	let role = headers
		.get("x-actor-role")
		.and_then(|v| v.to_str().ok())
		.ok_or_else(|| ApiError::bad_request("Missing x-actor-role header"))?;

	let role = match role.to_ascii_uppercase().as_str() {
		"VENDOR" => ActorRole::Vendor,
		"DRIVER" => ActorRole::Driver,
		"CUSTOMER" => ActorRole::Customer,
		"ADMIN" => ActorRole::Admin,
		"SYSTEM" => ActorRole::System,
		other => {
			return Err(ApiError::bad_request(format!(
				"Unknown actor role: {}",
				other
			)))
		},
	};

	Ok(Actor::new(id, role))
}
