//! Configuration module for the dispatch workflow system.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the dispatch service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for verification codes.
	#[serde(default)]
	pub verification: VerificationConfig,
	/// Configuration for wallet holds and payout sweeps.
	#[serde(default)]
	pub wallet: WalletConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for verification codes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
	/// Lifetime of a delivery OTP in seconds.
	#[serde(default = "default_otp_ttl_seconds")]
	pub otp_ttl_seconds: u64,
	/// Length of generated pickup codes.
	#[serde(default = "default_pickup_code_length")]
	pub pickup_code_length: usize,
}

impl Default for VerificationConfig {
	fn default() -> Self {
		Self {
			otp_ttl_seconds: default_otp_ttl_seconds(),
			pickup_code_length: default_pickup_code_length(),
		}
	}
}

/// Returns the default OTP lifetime: 10 minutes.
fn default_otp_ttl_seconds() -> u64 {
	600
}

/// Returns the default pickup code length.
fn default_pickup_code_length() -> usize {
	8
}

/// Configuration for wallet holds and payout sweeps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Hours an earning stays held before becoming withdrawable.
	#[serde(default = "default_hold_hours")]
	pub hold_hours: u64,
	/// Platform commission taken from the vendor, in percent.
	#[serde(default = "default_commission_percent")]
	pub commission_percent: u32,
	/// Driver's share of the order amount, in percent.
	#[serde(default = "default_driver_share_percent")]
	pub driver_share_percent: u32,
	/// Minimum available balance for the sweep to create a payout.
	#[serde(default = "default_minimum_payout")]
	pub minimum_payout: u64,
	/// Local hour of day (0-23) at which the daily payout sweep runs.
	#[serde(default = "default_payout_hour")]
	pub payout_hour: u32,
	/// Interval in seconds between hold-release sweeps.
	#[serde(default = "default_release_interval_seconds")]
	pub release_interval_seconds: u64,
	/// Transfer rail used for created payouts: "upi" or "bank_transfer".
	#[serde(default = "default_payout_method")]
	pub payout_method: String,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			hold_hours: default_hold_hours(),
			commission_percent: default_commission_percent(),
			driver_share_percent: default_driver_share_percent(),
			minimum_payout: default_minimum_payout(),
			payout_hour: default_payout_hour(),
			release_interval_seconds: default_release_interval_seconds(),
			payout_method: default_payout_method(),
		}
	}
}

/// Returns the default hold period in hours.
fn default_hold_hours() -> u64 {
	24
}

/// Returns the default platform commission in percent.
fn default_commission_percent() -> u32 {
	20
}

/// Returns the default driver share in percent.
fn default_driver_share_percent() -> u32 {
	10
}

/// Returns the default minimum payout amount.
fn default_minimum_payout() -> u64 {
	100
}

/// Returns the default payout sweep hour (02:00 local).
fn default_payout_hour() -> u32 {
	2
}

/// Returns the default hold-release sweep interval: 5 minutes.
fn default_release_interval_seconds() -> u64 {
	300
}

/// Returns the default payout method.
fn default_payout_method() -> String {
	"upi".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server should be started.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Host to bind to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_enabled() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8080
}

impl Config {
	/// Parses configuration from a TOML string and validates it.
	pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_toml_str(&content)
	}

	/// Loads configuration from a file asynchronously.
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		Self::from_toml_str(&content)
	}

	/// Validates cross-field constraints not expressible in serde.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("service.id must not be empty".into()));
		}
		if !self.storage.implementations.contains_key(&self.storage.primary) {
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no matching implementations entry",
				self.storage.primary
			)));
		}
		if self.wallet.payout_hour > 23 {
			return Err(ConfigError::Validation(
				"wallet.payout_hour must be between 0 and 23".into(),
			));
		}
		if self.wallet.commission_percent > 100 || self.wallet.driver_share_percent > 100 {
			return Err(ConfigError::Validation(
				"wallet percentages must be between 0 and 100".into(),
			));
		}
		if !matches!(self.wallet.payout_method.as_str(), "upi" | "bank_transfer") {
			return Err(ConfigError::Validation(format!(
				"wallet.payout_method must be 'upi' or 'bank_transfer', got '{}'",
				self.wallet.payout_method
			)));
		}
		Ok(())
	}
}
