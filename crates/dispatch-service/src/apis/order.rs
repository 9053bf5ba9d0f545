//! Order endpoints: submission, retrieval, claiming and status updates.

use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Json,
};
use dispatch_types::{ApiError, ApiResponse, NewOrderRequest, OrderStatus, OrderView};
use serde::{Deserialize, Serialize};

use crate::apis::auth::actor_from_headers;
use crate::server::AppState;

/// Request body for POST /orders/{id}/status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
	/// Target status in wire format, e.g. "READY_FOR_PICKUP".
	pub status: String,
}

/// Response for status updates.
///
/// Carries the pickup code when the update issued one, so the vendor
/// surface can display it immediately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
	pub order: OrderView,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pickup_code: Option<String>,
}

/// Handles POST /api/orders requests.
pub async fn submit(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<NewOrderRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.submit_order(request, &actor).await {
		Ok(order) => Ok(Json(ApiResponse::ok(
			"Order submitted",
			OrderView::from(&order),
		))),
		Err(e) => {
			tracing::warn!("Order submission failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles GET /api/orders/{id} requests.
///
/// The view never contains verification codes, so reads need no actor.
pub async fn get_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	match state.engine.get_order(&id).await {
		Ok(order) => Ok(Json(ApiResponse::ok("Order found", OrderView::from(&order)))),
		Err(e) => {
			tracing::warn!("Order retrieval failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/accept requests.
pub async fn accept(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.accept_order(&id, &actor).await {
		Ok(order) => Ok(Json(ApiResponse::ok(
			"Order accepted",
			OrderView::from(&order),
		))),
		Err(e) => {
			tracing::warn!("Order claim failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/status requests.
pub async fn update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusResponse>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let to: OrderStatus = request
		.status
		.parse()
		.map_err(|_| ApiError::bad_request(format!("Unknown order status: {}", request.status)))?;

	match state.engine.update_order_status(&id, to, &actor).await {
		Ok(update) => Ok(Json(ApiResponse::ok(
			format!("Order moved to {}", to),
			StatusResponse {
				order: OrderView::from(&update.order),
				pickup_code: update.pickup_code,
			},
		))),
		Err(e) => {
			tracing::warn!("Status update failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles POST /api/orders/{id}/cancel requests.
pub async fn cancel(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.cancel_order(&id, &actor).await {
		Ok(order) => Ok(Json(ApiResponse::ok(
			"Order cancelled",
			OrderView::from(&order),
		))),
		Err(e) => {
			tracing::warn!("Order cancellation failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}
