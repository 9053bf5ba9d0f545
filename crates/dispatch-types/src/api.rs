//! API types for the dispatch HTTP API.
//!
//! This module defines the uniform response envelope returned by every
//! façade operation, plus the structured error type with its HTTP status
//! mapping.

use crate::{OrderStatus, PaymentMethod, WorkflowError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniform `{ success, message, data }` envelope for façade results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	/// Whether the operation succeeded.
	pub success: bool,
	/// Short human-readable outcome description.
	pub message: String,
	/// Operation payload, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}

impl<T> ApiResponse<T> {
	/// Builds a success envelope with a payload.
	pub fn ok(message: impl Into<String>, data: T) -> Self {
		Self {
			success: true,
			message: message.into(),
			data: Some(data),
		}
	}
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Success flag, always false. Keeps the envelope shape uniform.
	pub success: bool,
	/// Machine-readable error code, e.g. "ALREADY_CONSUMED".
	pub error: String,
	/// Human-readable description.
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub struct ApiError {
	/// HTTP status code to respond with.
	pub status: u16,
	/// Machine-readable error code.
	pub code: &'static str,
	/// Human-readable description.
	pub message: String,
}

impl ApiError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		Self {
			status: 400,
			code: "BAD_REQUEST",
			message: message.into(),
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		ErrorResponse {
			success: false,
			error: self.code.to_string(),
			message: self.message.clone(),
		}
	}
}

impl From<WorkflowError> for ApiError {
	fn from(err: WorkflowError) -> Self {
		let message = err.to_string();
		let (status, code) = match &err {
			WorkflowError::InvalidTransition { .. } => (409, "INVALID_TRANSITION"),
			WorkflowError::Unauthorized(_) => (403, "UNAUTHORIZED"),
			WorkflowError::NotAssigned => (403, "NOT_ASSIGNED"),
			WorkflowError::AlreadyAssigned => (409, "ALREADY_ASSIGNED"),
			WorkflowError::CodeMismatch => (409, "CODE_MISMATCH"),
			WorkflowError::Expired => (409, "EXPIRED"),
			WorkflowError::AlreadyConsumed => (409, "ALREADY_CONSUMED"),
			WorkflowError::OrderNotFound(_) => (404, "ORDER_NOT_FOUND"),
			WorkflowError::InvalidRequest(_) => (400, "BAD_REQUEST"),
			WorkflowError::Storage(_) => (500, "INTERNAL_ERROR"),
		};
		Self {
			status,
			code,
			message,
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.code, self.message)
	}
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Request body for submitting a new order.
///
/// The buyer is taken from the authenticated actor, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
	/// Vendor the order is placed with.
	pub restaurant_id: String,
	/// How the order was paid.
	pub payment_method: PaymentMethod,
	/// Order total.
	pub amount: Decimal,
	/// Reference from the payment processor.
	pub transaction_id: String,
}

/// Order view returned by API endpoints.
///
/// Verification codes are deliberately absent: codes travel to their
/// audience (vendor surface, customer SMS) through issuance responses and
/// events, never through order reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
	pub id: String,
	pub status: OrderStatus,
	pub restaurant_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	pub buyer_id: String,
	pub created_at: u64,
	pub updated_at: u64,
}

impl From<&crate::Order> for OrderView {
	fn from(order: &crate::Order) -> Self {
		Self {
			id: order.id.clone(),
			status: order.status,
			restaurant_id: order.restaurant_id.clone(),
			driver_id: order.driver_id.clone(),
			buyer_id: order.buyer_id.clone(),
			created_at: order.created_at,
			updated_at: order.updated_at,
		}
	}
}
