// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Asset Registry
//!
//! Fixed registry of the assets the exchange settles. The decimal counts
//! are part of the wire compatibility contract with the exchange contract
//! and must not change:
//!
//! | Symbol | Decimals | Notes |
//! |--------|----------|-------|
//! | HBAR   | 8        | native ledger asset |
//! | USDC   | 6        | |
//! | USDT   | 6        | |
//! | DAI    | 18       | |
//! | NGN    | 2        | fiat pivot, minor unit = kobo |

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;

/// Kobo per naira.
pub const NGN_MINOR_PER_MAJOR: i64 = 100;

/// A registered asset the exchange can settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    /// Native ledger asset, 8 decimals.
    Hbar,
    /// USD stablecoin, 6 decimals.
    Usdc,
    /// USD stablecoin, 6 decimals.
    Usdt,
    /// USD stablecoin, 18 decimals.
    Dai,
    /// Naira fiat ledger, 2 decimals (kobo).
    Ngn,
}

impl Asset {
    /// All registered assets.
    pub const ALL: [Asset; 5] = [Asset::Hbar, Asset::Usdc, Asset::Usdt, Asset::Dai, Asset::Ngn];

    /// Canonical symbol string.
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Hbar => "HBAR",
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Dai => "DAI",
            Asset::Ngn => "NGN",
        }
    }

    /// Fixed-point decimal count used by the on-chain representation.
    pub fn decimals(&self) -> u8 {
        match self {
            Asset::Hbar => 8,
            Asset::Usdc | Asset::Usdt => 6,
            Asset::Dai => 18,
            Asset::Ngn => 2,
        }
    }

    /// True for the fiat pivot currency.
    pub fn is_fiat(&self) -> bool {
        matches!(self, Asset::Ngn)
    }

    /// USD-pegged stablecoins are priced 1:1 with the USD/NGN pivot rate.
    pub fn is_stablecoin(&self) -> bool {
        matches!(self, Asset::Usdc | Asset::Usdt | Asset::Dai)
    }

    /// Parse a symbol string (case-insensitive).
    pub fn from_symbol(symbol: &str) -> Option<Asset> {
        match symbol.to_ascii_uppercase().as_str() {
            "HBAR" => Some(Asset::Hbar),
            "USDC" => Some(Asset::Usdc),
            "USDT" => Some(Asset::Usdt),
            "DAI" => Some(Asset::Dai),
            "NGN" => Some(Asset::Ngn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Amount conversion error.
#[derive(Debug, thiserror::Error)]
pub enum AmountError {
    #[error("amount {0} is negative")]
    Negative(Decimal),

    #[error("amount {0} overflows the fixed-point representation")]
    Overflow(String),
}

/// Scale a human-readable amount to the asset's fixed-point integer units.
///
/// Truncates below the asset's smallest unit so the system never pays out
/// dust it was not asked for.
pub fn to_fixed_point(asset: Asset, amount: Decimal) -> Result<U256, AmountError> {
    if amount.is_sign_negative() {
        return Err(AmountError::Negative(amount));
    }
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(asset.decimals() as u32)))
        .ok_or_else(|| AmountError::Overflow(amount.to_string()))?;
    let units: u128 = scaled
        .trunc()
        .try_into()
        .map_err(|_| AmountError::Overflow(amount.to_string()))?;
    Ok(U256::from(units))
}

/// Scale fixed-point integer units back to a human-readable amount.
pub fn from_fixed_point(asset: Asset, units: U256) -> Result<Decimal, AmountError> {
    let raw: u128 = units
        .try_into()
        .map_err(|_| AmountError::Overflow(units.to_string()))?;
    let raw_i128: i128 = raw
        .try_into()
        .map_err(|_| AmountError::Overflow(units.to_string()))?;
    Decimal::try_from_i128_with_scale(raw_i128, asset.decimals() as u32)
        .map_err(|_| AmountError::Overflow(units.to_string()))
}

/// Per-deployment token contract addresses, loaded from [`Config`].
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    by_asset: HashMap<Asset, Address>,
    by_address: HashMap<Address, Asset>,
}

/// Token registry construction error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid contract address for {0}: {1}")]
    InvalidAddress(&'static str, String),
}

impl TokenRegistry {
    /// Build the registry from configured contract addresses.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let entries: [(&'static str, Asset, &str); 3] = [
            ("USDC", Asset::Usdc, &config.usdc_token_address),
            ("USDT", Asset::Usdt, &config.usdt_token_address),
            ("DAI", Asset::Dai, &config.dai_token_address),
        ];

        let mut by_asset = HashMap::new();
        let mut by_address = HashMap::new();
        for (name, asset, raw) in entries {
            let address: Address = raw
                .parse()
                .map_err(|_| RegistryError::InvalidAddress(name, raw.to_string()))?;
            by_asset.insert(asset, address);
            by_address.insert(address, asset);
        }
        Ok(Self {
            by_asset,
            by_address,
        })
    }

    /// Contract address for a token asset. `None` for HBAR and NGN, which
    /// have no token contract.
    pub fn address_of(&self, asset: Asset) -> Option<Address> {
        self.by_asset.get(&asset).copied()
    }

    /// Reverse lookup for deposit-event attribution.
    pub fn asset_at(&self, address: Address) -> Option<Asset> {
        self.by_address.get(&address).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn registry_decimals_match_wire_contract() {
        assert_eq!(Asset::Hbar.decimals(), 8);
        assert_eq!(Asset::Usdc.decimals(), 6);
        assert_eq!(Asset::Usdt.decimals(), 6);
        assert_eq!(Asset::Dai.decimals(), 18);
        assert_eq!(Asset::Ngn.decimals(), 2);
    }

    #[test]
    fn symbol_round_trips() {
        for asset in Asset::ALL {
            assert_eq!(Asset::from_symbol(asset.symbol()), Some(asset));
        }
        assert_eq!(Asset::from_symbol("usdc"), Some(Asset::Usdc));
        assert_eq!(Asset::from_symbol("DOGE"), None);
    }

    #[test]
    fn fixed_point_scales_by_registered_decimals() {
        let units = to_fixed_point(Asset::Usdc, dec!(10)).unwrap();
        assert_eq!(units, U256::from(10_000_000u64));

        let units = to_fixed_point(Asset::Hbar, dec!(1.5)).unwrap();
        assert_eq!(units, U256::from(150_000_000u64));

        let units = to_fixed_point(Asset::Dai, dec!(1)).unwrap();
        assert_eq!(units, U256::from(10u128.pow(18)));
    }

    #[test]
    fn fixed_point_truncates_sub_unit_dust() {
        // 0.0000001 USDC is below 6 decimals and must truncate to zero.
        let units = to_fixed_point(Asset::Usdc, dec!(0.0000001)).unwrap();
        assert_eq!(units, U256::ZERO);
    }

    #[test]
    fn fixed_point_rejects_negative() {
        assert!(to_fixed_point(Asset::Usdc, dec!(-1)).is_err());
    }

    #[test]
    fn from_fixed_point_round_trips() {
        let amount = dec!(123.456789);
        let units = to_fixed_point(Asset::Usdc, amount).unwrap();
        let back = from_fixed_point(Asset::Usdc, units).unwrap();
        assert_eq!(back.normalize(), amount.normalize());
    }
}
