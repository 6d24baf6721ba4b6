//! Configuration for the ticket settlement core.
//!
//! Configuration is loaded from a TOML file. String values may reference
//! environment variables with `${VAR_NAME}` or `${VAR_NAME:-default}`;
//! references are resolved before parsing and the parsed configuration is
//! validated before use, so invalid setups fail at construction time.

use alloy_primitives::{Address, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
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

/// Top-level configuration for the settlement core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Sender monitor settings.
	pub monitor: MonitorConfig,
	/// Transaction manager settings.
	pub transactions: TransactionsConfig,
	/// Gas price bounds and refresh cadence.
	#[serde(default)]
	pub gas: GasConfig,
	/// Blockchain endpoint and signing key.
	pub chain: ChainConfig,
	/// Ticket store backend.
	pub store: StoreConfig,
}

/// Sender monitor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
	/// Address this recipient claims reserve allocations under.
	pub claimant: String,
	/// Interval between cache cleanup passes, in seconds.
	#[serde(default = "default_cleanup_interval_secs")]
	pub cleanup_interval_secs: u64,
	/// Idle time after which a cached sender is evicted, in seconds.
	#[serde(default = "default_ttl_secs")]
	pub ttl_secs: u64,
}

fn default_cleanup_interval_secs() -> u64 {
	300 // 5 minutes between cleanup passes
}

fn default_ttl_secs() -> u64 {
	3600 // evict senders idle for an hour
}

/// Transaction manager settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionsConfig {
	/// How long to wait for inclusion before attempting replacement, in seconds.
	#[serde(default = "default_tx_timeout_secs")]
	pub tx_timeout_secs: u64,
	/// Maximum fee-bumped replacements per logical transaction.
	#[serde(default = "default_max_replacements")]
	pub max_replacements: u32,
	/// Percentage increase applied to both fee caps on replacement.
	#[serde(default = "default_price_bump")]
	pub price_bump: u64,
}

fn default_tx_timeout_secs() -> u64 {
	300 // 5 minutes before the first replacement attempt
}

fn default_max_replacements() -> u32 {
	3
}

fn default_price_bump() -> u64 {
	// The minimum bump most execution clients accept for a replacement is
	// 10%; one extra point clears integer rounding.
	11
}

/// Gas price bounds and refresh cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GasConfig {
	/// Floor for the cached gas price, in wei (decimal string).
	#[serde(default = "default_min_gas_price")]
	pub min_gas_price: String,
	/// Ceiling for submitted fee caps, in wei (decimal string). Unset means
	/// no ceiling.
	pub max_gas_price: Option<String>,
	/// Interval between gas price refreshes, in seconds.
	#[serde(default = "default_gas_poll_interval_secs")]
	pub poll_interval_secs: u64,
}

fn default_min_gas_price() -> String {
	"0".to_string()
}

fn default_gas_poll_interval_secs() -> u64 {
	7
}

impl Default for GasConfig {
	fn default() -> Self {
		Self {
			min_gas_price: default_min_gas_price(),
			max_gas_price: None,
			poll_interval_secs: default_gas_poll_interval_secs(),
		}
	}
}

/// Blockchain endpoint and signing key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// HTTP RPC endpoint.
	pub rpc_url: String,
	/// Chain ID transactions target.
	pub chain_id: u64,
	/// Hex-encoded private key used to sign redemption transactions.
	pub private_key: String,
}

/// Ticket store backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
	/// Backend name: `memory` or `file`.
	pub backend: String,
	/// Base directory for the file backend.
	pub path: Option<String>,
}

impl Config {
	/// Loads configuration from a TOML file.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path).await?;
		contents.parse()
	}

	/// Interval between cache cleanup passes.
	pub fn cleanup_interval(&self) -> Duration {
		Duration::from_secs(self.monitor.cleanup_interval_secs)
	}

	/// Idle time after which a cached sender is evicted.
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.monitor.ttl_secs)
	}

	/// How long to wait for inclusion before attempting replacement.
	pub fn tx_timeout(&self) -> Duration {
		Duration::from_secs(self.transactions.tx_timeout_secs)
	}

	/// Interval between gas price refreshes.
	pub fn gas_poll_interval(&self) -> Duration {
		Duration::from_secs(self.gas.poll_interval_secs)
	}

	/// The claimant address, parsed.
	pub fn claimant(&self) -> Result<Address, ConfigError> {
		self.monitor
			.claimant
			.parse()
			.map_err(|e| ConfigError::Validation(format!("Invalid claimant address: {}", e)))
	}

	/// The configured gas price floor, parsed.
	pub fn min_gas_price(&self) -> Result<U256, ConfigError> {
		parse_wei("gas.min_gas_price", &self.gas.min_gas_price)
	}

	/// The configured fee-cap ceiling, parsed, if any.
	pub fn max_gas_price(&self) -> Result<Option<U256>, ConfigError> {
		self.gas
			.max_gas_price
			.as_deref()
			.map(|v| parse_wei("gas.max_gas_price", v))
			.transpose()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		self.claimant()?;

		if self.monitor.cleanup_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"monitor.cleanup_interval_secs must be greater than 0".into(),
			));
		}
		if self.monitor.ttl_secs == 0 {
			return Err(ConfigError::Validation(
				"monitor.ttl_secs must be greater than 0".into(),
			));
		}

		if self.transactions.tx_timeout_secs == 0 {
			return Err(ConfigError::Validation(
				"transactions.tx_timeout_secs must be greater than 0".into(),
			));
		}

		self.min_gas_price()?;
		if let Some(max) = self.max_gas_price()? {
			let min = self.min_gas_price()?;
			if max < min {
				return Err(ConfigError::Validation(
					"gas.max_gas_price must not be below gas.min_gas_price".into(),
				));
			}
		}
		if self.gas.poll_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"gas.poll_interval_secs must be greater than 0".into(),
			));
		}

		if !self.chain.rpc_url.starts_with("http://") && !self.chain.rpc_url.starts_with("https://")
		{
			return Err(ConfigError::Validation(
				"chain.rpc_url must start with http:// or https://".into(),
			));
		}
		if self.chain.chain_id == 0 {
			return Err(ConfigError::Validation(
				"chain.chain_id must be greater than 0".into(),
			));
		}
		let key = self.chain.private_key.strip_prefix("0x").unwrap_or(&self.chain.private_key);
		if key.len() != 64 || key.chars().any(|c| !c.is_ascii_hexdigit()) {
			return Err(ConfigError::Validation(
				"chain.private_key must be 64 hex characters (32 bytes)".into(),
			));
		}

		match self.store.backend.as_str() {
			"memory" => {}
			"file" => {
				if self.store.path.as_deref().unwrap_or("").is_empty() {
					return Err(ConfigError::Validation(
						"store.path is required for the file backend".into(),
					));
				}
			}
			other => {
				return Err(ConfigError::Validation(format!(
					"Unknown store backend '{}'",
					other
				)));
			}
		}

		Ok(())
	}
}

fn parse_wei(field: &str, value: &str) -> Result<U256, ConfigError> {
	U256::from_str_radix(value, 10)
		.map_err(|e| ConfigError::Validation(format!("Invalid {}: {}", field, e)))
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[monitor]
claimant = "0x5fbdb2315678afecb367f032d93f642f64180aa3"

[transactions]

[chain]
rpc_url = "http://localhost:8545"
chain_id = 42161
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[store]
backend = "memory"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_RPC_HOST", "localhost");
		std::env::set_var("TEST_RPC_PORT", "8545");

		let input = "rpc_url = \"http://${TEST_RPC_HOST}:${TEST_RPC_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("TEST_RPC_HOST");
		std::env::remove_var("TEST_RPC_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.monitor.cleanup_interval_secs, 300);
		assert_eq!(config.monitor.ttl_secs, 3600);
		assert_eq!(config.transactions.tx_timeout_secs, 300);
		assert_eq!(config.transactions.max_replacements, 3);
		assert_eq!(config.transactions.price_bump, 11);
		assert_eq!(config.gas.min_gas_price, "0");
		assert!(config.gas.max_gas_price.is_none());
		assert_eq!(config.ttl(), Duration::from_secs(3600));
	}

	#[test]
	fn test_invalid_claimant_rejected() {
		let config = BASE_CONFIG.replace(
			"0x5fbdb2315678afecb367f032d93f642f64180aa3",
			"not-an-address",
		);
		let result: Result<Config, _> = config.parse();
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("Invalid claimant address"));
	}

	#[test]
	fn test_invalid_private_key_rejected() {
		let config = BASE_CONFIG.replace(
			"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
			"0x1234",
		);
		let result: Result<Config, _> = config.parse();
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("private_key"));
	}

	#[test]
	fn test_non_http_rpc_url_rejected() {
		let config = BASE_CONFIG.replace("http://localhost:8545", "ws://localhost:8546");
		let result: Result<Config, _> = config.parse();
		assert!(result.is_err());
	}

	#[test]
	fn test_file_backend_requires_path() {
		let config = BASE_CONFIG.replace("backend = \"memory\"", "backend = \"file\"");
		let result: Result<Config, _> = config.parse();
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("store.path"));

		let config = BASE_CONFIG.replace(
			"backend = \"memory\"",
			"backend = \"file\"\npath = \"./data/tickets\"",
		);
		let config: Config = config.parse().unwrap();
		assert_eq!(config.store.path.as_deref(), Some("./data/tickets"));
	}

	#[test]
	fn test_max_gas_price_below_min_rejected() {
		let config = format!(
			"{}\n[gas]\nmin_gas_price = \"100\"\nmax_gas_price = \"50\"\n",
			BASE_CONFIG
		);
		let result: Result<Config, _> = config.parse();
		assert!(result.is_err());
	}

	#[test]
	fn test_gas_prices_parse() {
		let config = format!(
			"{}\n[gas]\nmin_gas_price = \"1000000000\"\nmax_gas_price = \"2000000000\"\n",
			BASE_CONFIG
		);
		let config: Config = config.parse().unwrap();
		assert_eq!(config.min_gas_price().unwrap(), U256::from(1_000_000_000u64));
		assert_eq!(
			config.max_gas_price().unwrap(),
			Some(U256::from(2_000_000_000u64))
		);
	}
}
