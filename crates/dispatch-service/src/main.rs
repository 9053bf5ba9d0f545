//! Main entry point for the dispatch workflow service.
//!
//! This binary runs the order verification and lifecycle service: the
//! workflow engine with its background wallet sweeps, plus the HTTP API
//! used by the vendor, driver and customer surfaces.

use clap::Parser;
use dispatch_config::Config;
use dispatch_core::WorkflowEngine;
use dispatch_storage::StorageFactory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the dispatch service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started dispatch service");

	let config = Config::from_file_async(args.config.to_str().unwrap()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let api_config = config.api.clone();
	let engine = Arc::new(build_engine(config)?);

	let api_enabled = api_config.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = api_config.unwrap();
		let api_engine = Arc::clone(&engine);

		tokio::select! {
			result = engine.run() => {
				tracing::info!("Engine finished");
				result?;
			}
			result = server::start_server(api_config, api_engine) => {
				tracing::info!("API server finished");
				result?;
			}
		}
	} else {
		tracing::info!("Starting engine only");
		engine.run().await?;
	}

	tracing::info!("Stopped dispatch service");
	Ok(())
}

/// Builds the workflow engine, resolving the configured primary storage
/// backend from the registered factories.
fn build_engine(config: Config) -> Result<WorkflowEngine, Box<dyn std::error::Error>> {
	let factories: HashMap<String, StorageFactory> = dispatch_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	let primary = config.storage.primary.clone();
	let factory = factories
		.get(&primary)
		.ok_or_else(|| format!("Unknown storage backend: {}", primary))?;
	let backend_config = config
		.storage
		.implementations
		.get(&primary)
		.ok_or_else(|| format!("Missing configuration for storage backend: {}", primary))?;
	let backend = factory(backend_config)?;

	Ok(WorkflowEngine::new(config, backend)?)
}
