//! Wallet endpoints: balance summary and payout history.

use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Json,
};
use dispatch_types::{ApiError, ApiResponse, Payout, WalletSummary};

use crate::apis::auth::actor_from_headers;
use crate::server::AppState;

/// Handles GET /api/wallets/{owner}/summary requests.
pub async fn summary(
	Path(owner): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<WalletSummary>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.wallet_summary(&owner, &actor).await {
		Ok(summary) => Ok(Json(ApiResponse::ok("Wallet summary", summary))),
		Err(e) => {
			tracing::warn!("Wallet summary failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}

/// Handles GET /api/wallets/{owner}/payouts requests.
pub async fn payouts(
	Path(owner): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Payout>>>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	match state.engine.payout_history(&owner, &actor).await {
		Ok(history) => Ok(Json(ApiResponse::ok("Payout history", history))),
		Err(e) => {
			tracing::warn!("Payout history failed: {}", e);
			Err(ApiError::from(e))
		},
	}
}
