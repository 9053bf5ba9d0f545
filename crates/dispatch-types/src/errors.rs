//! Error taxonomy for workflow operations.
//!
//! All verification and transition failures are returned as typed results
//! to the caller, never thrown as unrecoverable. The HTTP layer maps each
//! variant to a status code; UI surfaces own the user-facing messaging.

use crate::OrderStatus;
use thiserror::Error;

/// Errors returned by workflow operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
	/// The requested status edge is not in the transition table.
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// The actor's role or identity does not permit the operation.
	#[error("Unauthorized: {0}")]
	Unauthorized(String),
	/// The calling driver is not the driver assigned to the order.
	#[error("Driver is not assigned to this order")]
	NotAssigned,
	/// Another driver already claimed the order.
	#[error("Order is already assigned to a driver")]
	AlreadyAssigned,
	/// The submitted code does not match the stored one.
	#[error("Submitted code does not match")]
	CodeMismatch,
	/// The OTP's lifetime has elapsed.
	#[error("Code has expired")]
	Expired,
	/// The code was already consumed by an earlier verification.
	#[error("Code has already been consumed")]
	AlreadyConsumed,
	/// No order exists under the given id.
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The request payload is malformed or incomplete.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}
