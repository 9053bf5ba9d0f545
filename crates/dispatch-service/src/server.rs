//! HTTP server for the dispatch workflow API.
//!
//! Builds the router over the workflow engine and serves it. All handler
//! logic lives in the `apis` modules; this module only wires routes and
//! middleware.

use axum::{
	routing::{get, post},
	Router,
};
use dispatch_config::ApiConfig;
use dispatch_core::WorkflowEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::apis;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the workflow engine for processing requests.
	pub engine: Arc<WorkflowEngine>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<WorkflowEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(apis::order::submit))
				.route("/orders/{id}", get(apis::order::get_by_id))
				.route("/orders/{id}/accept", post(apis::order::accept))
				.route("/orders/{id}/status", post(apis::order::update_status))
				.route("/orders/{id}/cancel", post(apis::order::cancel))
				.route(
					"/orders/{id}/pickup-code",
					post(apis::verification::generate_pickup_code),
				)
				.route(
					"/orders/{id}/delivery-otp",
					post(apis::verification::generate_delivery_otp),
				)
				.route(
					"/orders/{id}/verify-pickup",
					post(apis::verification::verify_pickup),
				)
				.route(
					"/orders/{id}/verify-delivery",
					post(apis::verification::verify_delivery),
				)
				.route("/wallets/{owner}/summary", get(apis::wallet::summary))
				.route("/wallets/{owner}/payouts", get(apis::wallet::payouts)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Dispatch API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
