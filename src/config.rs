// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Runtime Configuration
//!
//! This module loads environment variables into a [`Config`] struct at
//! startup. All knobs recognized by the service are listed here.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the embedded database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LEDGER_RPC_URL` | JSON-RPC endpoint of the EVM-compatible ledger | Required |
//! | `LEDGER_ADMIN_KEY` | Hex private key signing exchange-contract payouts | Required |
//! | `EXCHANGE_CONTRACT_ADDRESS` | Address of the exchange vault contract | Required |
//! | `USDC_TOKEN_ADDRESS` | USDC token contract address | Required |
//! | `USDT_TOKEN_ADDRESS` | USDT token contract address | Required |
//! | `DAI_TOKEN_ADDRESS` | DAI token contract address | Required |
//! | `PAYSTACK_SECRET_KEY` | Paystack API secret (also the webhook HMAC key) | Required |
//! | `PAYSTACK_API_BASE_URL` | Paystack API base URL | `https://api.paystack.co` |
//! | `RATE_SOURCE_URL` | Upstream price feed base URL | CoinGecko public API |
//! | `ORACLE_REFRESH_MINUTES` | Period of the background rate refresh | `30` |
//! | `ORACLE_STALENESS_MINUTES` | Snapshot age that forces a refresh on read | `60` |
//! | `VAULT_KEY` | Key-vault master secret for wallet key material | Required |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{env, path::PathBuf};

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_PAYSTACK_API_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_RATE_SOURCE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_ORACLE_REFRESH_MINUTES: u64 = 30;
const DEFAULT_ORACLE_STALENESS_MINUTES: u64 = 60;

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Immutable runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub host: String,
    /// Server bind port.
    pub port: u16,
    /// Root directory for the embedded redb database.
    pub data_dir: PathBuf,
    /// JSON-RPC endpoint of the EVM-compatible ledger.
    pub ledger_rpc_url: String,
    /// Hex-encoded admin private key for exchange-contract payouts.
    pub ledger_admin_key: String,
    /// Exchange vault contract address (`0x`-prefixed).
    pub exchange_contract_address: String,
    /// USDC token contract address.
    pub usdc_token_address: String,
    /// USDT token contract address.
    pub usdt_token_address: String,
    /// DAI token contract address.
    pub dai_token_address: String,
    /// Paystack secret key (bearer auth + webhook HMAC).
    pub paystack_secret_key: String,
    /// Paystack API base URL.
    pub paystack_api_base_url: String,
    /// Upstream rate source base URL.
    pub rate_source_url: String,
    /// Background oracle refresh period in minutes.
    pub oracle_refresh_minutes: u64,
    /// Snapshot staleness ceiling in minutes.
    pub oracle_staleness_minutes: u64,
    /// Key-vault master secret.
    pub vault_key: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("HOST", "0.0.0.0"),
            port: parse_env_or("PORT", 8080)?,
            data_dir: PathBuf::from(env_or_default("DATA_DIR", DEFAULT_DATA_DIR)),
            ledger_rpc_url: env_required("LEDGER_RPC_URL")?,
            ledger_admin_key: env_required("LEDGER_ADMIN_KEY")?,
            exchange_contract_address: env_required("EXCHANGE_CONTRACT_ADDRESS")?,
            usdc_token_address: env_required("USDC_TOKEN_ADDRESS")?,
            usdt_token_address: env_required("USDT_TOKEN_ADDRESS")?,
            dai_token_address: env_required("DAI_TOKEN_ADDRESS")?,
            paystack_secret_key: env_required("PAYSTACK_SECRET_KEY")?,
            paystack_api_base_url: env_or_default(
                "PAYSTACK_API_BASE_URL",
                DEFAULT_PAYSTACK_API_BASE_URL,
            ),
            rate_source_url: env_or_default("RATE_SOURCE_URL", DEFAULT_RATE_SOURCE_URL),
            oracle_refresh_minutes: parse_env_or(
                "ORACLE_REFRESH_MINUTES",
                DEFAULT_ORACLE_REFRESH_MINUTES,
            )?,
            oracle_staleness_minutes: parse_env_or(
                "ORACLE_STALENESS_MINUTES",
                DEFAULT_ORACLE_STALENESS_MINUTES,
            )?,
            vault_key: env_required("VAULT_KEY")?,
        })
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid(name, e.to_string())),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_default_falls_back_when_unset() {
        assert_eq!(env_or_default("NAIRABRIDGE_TEST_UNSET", "fallback"), "fallback");
    }

    #[test]
    fn parse_env_or_uses_default_when_unset() {
        let port: u16 = parse_env_or("NAIRABRIDGE_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }
}
