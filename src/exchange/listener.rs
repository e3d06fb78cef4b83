// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Deposit Listener
//!
//! Background task that watches the exchange vault contract for deposit
//! events and feeds each one into the orchestrator's inbound handler —
//! the same idempotency-checked code path used for synchronous swaps.
//!
//! ## Strategy
//!
//! 1. Polls `eth_getLogs` for the vault's `TokenDeposited` and
//!    `HbarDeposited` events in chunked block ranges.
//! 2. Persists the last processed block in redb (`listener_state` table);
//!    on restart it resumes from the checkpoint instead of rescanning.
//! 3. Zero-address depositors (liquidity/admin seeding) are filtered out.
//! 4. Events already recorded as settled in the Activity Ledger are
//!    skipped, so redelivered or rescanned events are processed once.
//!
//! ## Failure Handling
//!
//! RPC failures back off exponentially up to a ceiling and reset after the
//! next successful step. Shutdown uses the CancellationToken pattern shared
//! with the oracle refresher.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assets::{Asset, TokenRegistry};
use crate::storage::{ActivityLedger, Store};

use super::contract::IExchangeVault;

/// Default block chunk size per `eth_getLogs` query.
const DEFAULT_CHUNK_SIZE: u64 = 2000;

/// Default poll interval when caught up to chain head.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Backoff ceiling after repeated RPC failures.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How far back to look when starting fresh (no checkpoint).
const INITIAL_LOOKBACK_BLOCKS: u64 = 10_000;

/// Checkpoint key in the `listener_state` table.
const CHECKPOINT_KEY: &str = "exchange_deposits";

/// A detected vault deposit, normalized across the token and native variants.
#[derive(Debug, Clone)]
pub struct DepositEvent {
    /// Depositing wallet address.
    pub depositor: Address,
    /// Deposited asset.
    pub asset: Asset,
    /// Amount in the asset's fixed-point units.
    pub amount_units: U256,
    /// On-chain transaction id: the idempotency key for this event.
    pub tx_id: String,
    /// Block the event landed in.
    pub block_number: u64,
}

/// Consumer of detected deposits (the orchestrator's inbound handler).
#[async_trait]
pub trait DepositSink: Send + Sync {
    async fn handle_deposit(&self, deposit: DepositEvent);
}

/// Vault deposit-event listener running as a background tokio task.
pub struct DepositListener {
    store: Arc<Store>,
    activities: ActivityLedger,
    registry: TokenRegistry,
    sink: Arc<dyn DepositSink>,
    rpc_url: String,
    vault_address: Address,
    poll_interval: Duration,
    chunk_size: u64,
}

/// Listener step failure.
#[derive(Debug, thiserror::Error)]
enum ListenerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("store error: {0}")]
    Store(#[from] crate::storage::StoreError),
}

impl DepositListener {
    pub fn new(
        store: Arc<Store>,
        activities: ActivityLedger,
        registry: TokenRegistry,
        sink: Arc<dyn DepositSink>,
        rpc_url: String,
        vault_address: Address,
    ) -> Self {
        Self {
            store,
            activities,
            registry,
            sink,
            rpc_url,
            vault_address,
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Run the listener loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(listener.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            vault = %self.vault_address,
            "Deposit listener starting"
        );

        let url = match self.rpc_url.parse() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Deposit listener has an invalid RPC URL, exiting");
                return;
            }
        };
        let provider = ProviderBuilder::new().connect_http(url);

        let mut backoff = self.poll_interval;
        loop {
            if shutdown.is_cancelled() {
                info!("Deposit listener shutting down");
                return;
            }

            let delay = match self.index_step(&provider).await {
                Ok(()) => {
                    backoff = self.poll_interval;
                    self.poll_interval
                }
                Err(e) => {
                    warn!(error = %e, "Listener step failed, backing off");
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown.cancelled() => {
                    info!("Deposit listener shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one indexing step: fetch deposit logs from checkpoint to head.
    async fn index_step<P: Provider + Clone>(&self, provider: &P) -> Result<(), ListenerError> {
        let checkpoint = self.store.listener_checkpoint(CHECKPOINT_KEY)?;

        let head = provider
            .get_block_number()
            .await
            .map_err(|e| ListenerError::Rpc(e.to_string()))?;

        let start = if checkpoint == 0 {
            head.saturating_sub(INITIAL_LOOKBACK_BLOCKS)
        } else {
            checkpoint + 1
        };

        if start > head {
            // Already caught up
            return Ok(());
        }

        let mut from = start;
        while from <= head {
            let to = (from + self.chunk_size - 1).min(head);

            let delivered = self.fetch_and_deliver(provider, from, to).await?;
            if delivered > 0 {
                info!(
                    from_block = from,
                    to_block = to,
                    events = delivered,
                    "Delivered vault deposit events"
                );
            }

            self.store.set_listener_checkpoint(CHECKPOINT_KEY, to)?;
            from = to + 1;
        }

        Ok(())
    }

    /// Fetch deposit logs for a block range and deliver new ones to the sink.
    async fn fetch_and_deliver<P: Provider + Clone>(
        &self,
        provider: &P,
        from_block: u64,
        to_block: u64,
    ) -> Result<usize, ListenerError> {
        let filter = Filter::new()
            .address(self.vault_address)
            .event_signature(vec![
                IExchangeVault::TokenDeposited::SIGNATURE_HASH,
                IExchangeVault::HbarDeposited::SIGNATURE_HASH,
            ])
            .from_block(from_block)
            .to_block(to_block);

        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| ListenerError::Rpc(e.to_string()))?;

        let mut count = 0;

        for log in &logs {
            let Some(topic0) = log.topics().first().copied() else {
                continue;
            };

            let tx_id = log
                .transaction_hash
                .map(|h| format!("{h:#x}"))
                .unwrap_or_default();
            if tx_id.is_empty() {
                continue;
            }

            let deposit = if topic0 == IExchangeVault::TokenDeposited::SIGNATURE_HASH {
                let Ok(decoded) = log.log_decode::<IExchangeVault::TokenDeposited>() else {
                    warn!(tx_id = %tx_id, "Undecodable TokenDeposited log, skipping");
                    continue;
                };
                let event = decoded.inner.data;
                let Some(asset) = self.registry.asset_at(event.token) else {
                    // Deposit of an unregistered token; nothing to settle.
                    continue;
                };
                DepositEvent {
                    depositor: event.depositor,
                    asset,
                    amount_units: event.amount,
                    tx_id: tx_id.clone(),
                    block_number: log.block_number.unwrap_or_default(),
                }
            } else {
                let Ok(decoded) = log.log_decode::<IExchangeVault::HbarDeposited>() else {
                    warn!(tx_id = %tx_id, "Undecodable HbarDeposited log, skipping");
                    continue;
                };
                let event = decoded.inner.data;
                DepositEvent {
                    depositor: event.depositor,
                    asset: Asset::Hbar,
                    amount_units: event.amount,
                    tx_id: tx_id.clone(),
                    block_number: log.block_number.unwrap_or_default(),
                }
            };

            // Liquidity/admin seeding events carry the zero address.
            if deposit.depositor == Address::ZERO {
                continue;
            }

            // Dedup on rescan: already-settled events are done.
            if self.activities.already_settled(&deposit.tx_id)?.is_some() {
                continue;
            }

            self.sink.handle_deposit(deposit).await;
            count += 1;
        }

        Ok(count)
    }
}
