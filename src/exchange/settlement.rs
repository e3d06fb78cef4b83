// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Settlement ledger adapter: admin-signed payouts from the exchange vault.
//!
//! Human-readable amounts are scaled to each asset's registered fixed-point
//! representation before call encoding (6 for USDC/USDT, 18 for DAI, 8 for
//! HBAR). Any contract-call failure — non-success receipt, RPC error, gas
//! exhaustion — surfaces as an explicit failed settlement leg; the
//! orchestrator decides on compensation.

use std::str::FromStr;
use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assets::{to_fixed_point, AmountError, Asset, TokenRegistry};

use super::contract::IExchangeVault;

/// How long to await a settlement receipt before declaring the outcome
/// unknown. A timeout is NOT a failure: the orchestrator re-checks the
/// idempotency key before retrying.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settlement failure.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no token contract registered for {0}")]
    MissingTokenContract(Asset),

    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("settlement transaction {tx_id} reverted")]
    Reverted { tx_id: String },

    #[error("timed out awaiting receipt for {tx_id}; outcome unknown")]
    ReceiptTimeout { tx_id: String },
}

/// Result of a dispatched settlement leg.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// On-chain transaction id (settlement-leg identifier).
    pub tx_id: String,
    /// Receipt status.
    pub success: bool,
}

/// The on-chain payout seam the orchestrator settles through.
#[async_trait]
pub trait SettlementLeg: Send + Sync {
    /// Transfer `amount` of `asset` from the vault's pooled balance to
    /// `recipient`, signed with the admin key.
    async fn pay_out(
        &self,
        asset: Asset,
        recipient: Address,
        amount: Decimal,
    ) -> Result<SettlementOutcome, SettlementError>;
}

/// Ledger-native contract reference derived from an EVM address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRef(pub String);

impl std::fmt::Display for ContractRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Translate an EVM address into the ledger's contract-reference format.
///
/// Pure and total: strips the `0x` prefix and reinterprets the hex as the
/// ledger-native reference. No network call.
pub fn contract_ref(evm_address: &str) -> ContractRef {
    let stripped = evm_address
        .strip_prefix("0x")
        .or_else(|| evm_address.strip_prefix("0X"))
        .unwrap_or(evm_address);
    ContractRef(stripped.to_lowercase())
}

/// Admin-signed settlement adapter over the exchange vault contract.
pub struct ExchangeSettlement {
    vault_address: Address,
    registry: TokenRegistry,
    provider: alloy::providers::fillers::FillProvider<
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::JoinFill<
                alloy::providers::Identity,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::GasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::BlobGasFiller,
                        alloy::providers::fillers::JoinFill<
                            alloy::providers::fillers::NonceFiller,
                            alloy::providers::fillers::ChainIdFiller,
                        >,
                    >,
                >,
            >,
            alloy::providers::fillers::WalletFiller<EthereumWallet>,
        >,
        alloy::providers::RootProvider<alloy::network::Ethereum>,
    >,
}

impl ExchangeSettlement {
    /// Build the adapter from the configured RPC endpoint, admin key and
    /// vault contract address.
    pub fn new(
        rpc_url: &str,
        admin_key_hex: &str,
        vault_address: &str,
        registry: TokenRegistry,
    ) -> Result<Self, SettlementError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| SettlementError::Rpc(e.to_string()))?;

        let signer = PrivateKeySigner::from_str(admin_key_hex)
            .map_err(|e| SettlementError::InvalidAddress(format!("admin key: {e}")))?;
        let wallet = EthereumWallet::from(signer);

        let vault_address = Address::from_str(vault_address)
            .map_err(|e| SettlementError::InvalidAddress(e.to_string()))?;

        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self {
            vault_address,
            registry,
            provider,
        })
    }
}

#[async_trait]
impl SettlementLeg for ExchangeSettlement {
    async fn pay_out(
        &self,
        asset: Asset,
        recipient: Address,
        amount: Decimal,
    ) -> Result<SettlementOutcome, SettlementError> {
        let units = to_fixed_point(asset, amount)?;
        let vault = IExchangeVault::new(self.vault_address, self.provider.clone());

        let pending = match asset {
            Asset::Hbar => vault
                .transferHbar(recipient, units)
                .send()
                .await
                .map_err(|e| SettlementError::Rpc(e.to_string()))?,
            Asset::Ngn => {
                return Err(SettlementError::MissingTokenContract(asset));
            }
            token => {
                let token_address = self
                    .registry
                    .address_of(token)
                    .ok_or(SettlementError::MissingTokenContract(token))?;
                vault
                    .transferToken(token_address, recipient, units)
                    .send()
                    .await
                    .map_err(|e| SettlementError::Rpc(e.to_string()))?
            }
        };

        let tx_id = format!("{:#x}", *pending.tx_hash());

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|_| SettlementError::ReceiptTimeout {
                tx_id: tx_id.clone(),
            })?;

        Ok(SettlementOutcome {
            tx_id,
            success: receipt.status(),
        })
    }
}
