//! Verification endpoints: code issuance and proof-of-handoff checks.

use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Json,
};
use dispatch_types::{ApiError, ApiResponse, OrderView};
use serde::{Deserialize, Serialize};

use crate::apis::auth::actor_from_headers;
use crate::server::AppState;

/// Request body for POST /orders/{id}/verify-pickup.
#[derive(Debug, Deserialize)]
pub struct VerifyPickupRequest {
	pub code: String,
}

/// Request body for POST /orders/{id}/verify-delivery.
#[derive(Debug, Deserialize)]
pub struct VerifyDeliveryRequest {
	pub otp: String,
}

/// Response for pickup code issuance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupCodeResponse {
	pub pickup_code: String,
}

/// Response for delivery OTP issuance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOtpResponse {
	pub otp: String,
	pub expires_at: u64,
}

/// Handles POST /api/orders/{id}/pickup-code requests.
pub async fn generate_pickup_code(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<PickupCodeResponse>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.generate_pickup_code(&id, &actor).await {
		Ok(pickup_code) => Ok(Json(ApiResponse::ok(
			"Pickup code issued",
			PickupCodeResponse { pickup_code },
		))),
		Err(e) => {
			tracing::warn!("Pickup code issuance failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/delivery-otp requests.
pub async fn generate_delivery_otp(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<DeliveryOtpResponse>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.generate_delivery_otp(&id, &actor).await {
		Ok((otp, expires_at)) => Ok(Json(ApiResponse::ok(
			"Delivery OTP issued",
			DeliveryOtpResponse { otp, expires_at },
		))),
		Err(e) => {
			tracing::warn!("Delivery OTP issuance failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/verify-pickup requests.
pub async fn verify_pickup(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<VerifyPickupRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.verify_pickup(&id, &request.code, &actor).await {
		Ok(order) => Ok(Json(ApiResponse::ok(
			"Pickup verified",
			OrderView::from(&order),
		))),
		Err(e) => {
			tracing::warn!("Pickup verification failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/verify-delivery requests.
pub async fn verify_delivery(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<VerifyDeliveryRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.verify_delivery(&id, &request.otp, &actor).await {
		Ok(order) => Ok(Json(ApiResponse::ok(
			"Delivery verified",
			OrderView::from(&order),
		))),
		Err(e) => {
			tracing::warn!("Delivery verification failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}
