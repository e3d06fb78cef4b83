// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Exchange Orchestrator
//!
//! Coordinates the price oracle, the on-chain settlement adapter and the
//! fiat rail to execute swaps as multi-step sagas with compensating
//! actions. Every completed or failed settlement leg is recorded as an
//! immutable [`Activity`].
//!
//! ## Saga Shapes
//!
//! - **Deposit-source** (token→fiat, HBAR→fiat, token→token): the source
//!   leg already happened on-chain, so there is no debit step. A failed
//!   payout leg records `Activity(failed)` and is left for manual
//!   reconciliation — automatically reversing a blockchain deposit is not
//!   a safe operation and is deliberately not attempted.
//! - **Fiat-source** (fiat→token, fiat→HBAR): debit first (the
//!   compensating-action checkpoint), settle second; a failed settlement
//!   refunds the exact debited amount. Webhook-triggered buys skip the
//!   local debit because the fiat was collected externally.
//!
//! ## Invariants
//!
//! - Idempotency: before executing any leg, the Activity Ledger is checked
//!   for a `success` record under the same idempotency key; replays return
//!   the existing record without re-executing anything.
//! - Rate lock: the oracle snapshot is captured once per attempt and
//!   reused for every computation in that attempt.
//! - A receipt timeout is an *unknown* outcome, not a failure: the attempt
//!   is recorded `pending` and no refund is issued until reconciled.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assets::{from_fixed_point, Asset};
use crate::exchange::{DepositEvent, DepositSink, SettlementError, SettlementLeg};
use crate::fiat::FiatRail;
use crate::oracle::PriceOracle;
use crate::rates;
use crate::storage::{
    Activity, ActivityLedger, ActivityMetadata, ActivityStatus, ActivityType, BankLedger,
    StoreError, WalletDirectory,
};

/// Swap failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// Rate unavailable; rejected before any side effect, no Activity.
    #[error("no conversion rate available for {from} -> {to}")]
    RateUnavailable { from: Asset, to: Asset },

    /// Debit precheck failed; rejected before any side effect, no Activity.
    #[error("insufficient balance: have {balance_kobo} kobo, attempted {attempted_kobo} kobo")]
    InsufficientBalance {
        balance_kobo: i64,
        attempted_kobo: i64,
    },

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("user {0} has no bank account")]
    NoBankAccount(String),

    #[error("user {0} has no registered wallet")]
    NoWallet(String),

    #[error("no user registered for deposit address {0}")]
    UnknownDepositor(String),

    /// Settlement leg failed; an `Activity(failed)` was recorded and, for
    /// debit-first sagas, the debit was refunded.
    #[error("settlement leg failed: {0}")]
    SettlementFailed(String),

    /// Fiat payout leg failed; an `Activity(failed)` was recorded.
    #[error("fiat payout failed: {0}")]
    FiatPayoutFailed(String),

    /// Outcome unknown (receipt timeout). Recorded `pending`; no refund
    /// issued until the attempt is reconciled.
    #[error("settlement outcome unknown for {tx_id}; pending reconciliation")]
    SettlementPending { tx_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a saga: the recorded activity, plus whether this call was a
/// replay of an already-settled event.
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    pub activity: Activity,
    /// Target-asset amount delivered.
    pub output_amount: Decimal,
    /// Rate applied (locked for the whole attempt).
    pub rate: Decimal,
    pub replayed: bool,
}

/// Saga coordinator across the three ledgers.
pub struct ExchangeOrchestrator {
    oracle: Arc<PriceOracle>,
    settlement: Arc<dyn SettlementLeg>,
    fiat: Arc<dyn FiatRail>,
    activities: ActivityLedger,
    bank_ledger: BankLedger,
    wallets: WalletDirectory,
}

impl ExchangeOrchestrator {
    pub fn new(
        oracle: Arc<PriceOracle>,
        settlement: Arc<dyn SettlementLeg>,
        fiat: Arc<dyn FiatRail>,
        activities: ActivityLedger,
        bank_ledger: BankLedger,
        wallets: WalletDirectory,
    ) -> Self {
        Self {
            oracle,
            settlement,
            fiat,
            activities,
            bank_ledger,
            wallets,
        }
    }

    /// Price a conversion without executing it.
    pub async fn quote(
        &self,
        from: Asset,
        to: Asset,
        amount: Decimal,
    ) -> Result<rates::Quote, SwapError> {
        if amount <= Decimal::ZERO {
            return Err(SwapError::NonPositiveAmount);
        }
        let snapshot = self.oracle.snapshot().await;
        let quote = rates::convert(&snapshot, from, to, amount);
        if quote.is_unavailable() {
            return Err(SwapError::RateUnavailable { from, to });
        }
        Ok(quote)
    }

    // =========================================================================
    // Deposit-source sagas (token→fiat, HBAR→fiat)
    // =========================================================================

    /// Cash out a detected or user-referenced vault deposit to the fiat
    /// ledger. `deposit_tx` is the idempotency key and the recorded
    /// transaction hash; the payout transfer code lands in the metadata.
    pub async fn cash_out_deposit(
        &self,
        user_id: &str,
        asset: Asset,
        amount: Decimal,
        deposit_tx: &str,
    ) -> Result<SwapReceipt, SwapError> {
        if amount <= Decimal::ZERO {
            return Err(SwapError::NonPositiveAmount);
        }
        if let Some(existing) = self.activities.already_settled(deposit_tx)? {
            return Ok(replay_receipt(existing));
        }

        let account = self
            .bank_ledger
            .get(user_id)?
            .ok_or_else(|| SwapError::NoBankAccount(user_id.to_string()))?;

        // Rate lock: one snapshot for the whole attempt.
        let snapshot = self.oracle.snapshot().await;
        let quote = rates::convert(&snapshot, asset, Asset::Ngn, amount);
        if quote.is_unavailable() {
            return Err(SwapError::RateUnavailable {
                from: asset,
                to: Asset::Ngn,
            });
        }
        let fiat_kobo = rates::to_kobo_floor(quote.output).ok_or(SwapError::NonPositiveAmount)?;

        let recipient_code = self
            .fiat
            .ensure_transfer_recipient(&account)
            .await
            .map_err(|e| SwapError::FiatPayoutFailed(e.to_string()))?;

        let narration = format!("{} {} cash-out", amount, asset.symbol());
        let payout = self
            .fiat
            .pay_out(&recipient_code, fiat_kobo, &narration)
            .await;

        match payout {
            Ok(receipt) => {
                let activity = self.record_activity(
                    user_id,
                    asset,
                    Asset::Ngn,
                    amount,
                    deposit_tx,
                    ActivityStatus::Success,
                    deposit_metadata(asset, deposit_tx, fiat_kobo, quote.rate, Some(receipt.transfer_code)),
                )?;
                info!(
                    user_id = %user_id,
                    deposit_tx = %deposit_tx,
                    fiat_kobo,
                    "Cash-out settled"
                );
                Ok(SwapReceipt {
                    activity,
                    output_amount: rates::kobo_to_ngn(fiat_kobo),
                    rate: quote.rate,
                    replayed: false,
                })
            }
            Err(e) => {
                // No automatic reversal of an on-chain deposit: record the
                // failure and leave the funds for manual reconciliation.
                self.record_activity(
                    user_id,
                    asset,
                    Asset::Ngn,
                    amount,
                    deposit_tx,
                    ActivityStatus::Failed,
                    deposit_metadata(asset, deposit_tx, fiat_kobo, quote.rate, None),
                )?;
                warn!(
                    user_id = %user_id,
                    deposit_tx = %deposit_tx,
                    error = %e,
                    "Cash-out payout failed; deposit held for manual reconciliation"
                );
                Err(SwapError::FiatPayoutFailed(e.to_string()))
            }
        }
    }

    /// Token→token swap of an already-made deposit. Pricing routes through
    /// NGN without touching the fiat ledger's persisted balance.
    pub async fn swap_token_to_token(
        &self,
        user_id: &str,
        from: Asset,
        to: Asset,
        amount: Decimal,
        deposit_tx: &str,
    ) -> Result<SwapReceipt, SwapError> {
        if amount <= Decimal::ZERO {
            return Err(SwapError::NonPositiveAmount);
        }
        if let Some(existing) = self.activities.already_settled(deposit_tx)? {
            return Ok(replay_receipt(existing));
        }

        let recipient = self.wallet_address(user_id)?;

        let snapshot = self.oracle.snapshot().await;
        let quote = rates::convert(&snapshot, from, to, amount);
        if quote.is_unavailable() {
            return Err(SwapError::RateUnavailable { from, to });
        }

        let metadata = ActivityMetadata::TokenToToken {
            deposit_tx: deposit_tx.to_string(),
            output_amount: quote.output.to_string(),
            rate: quote.rate,
        };

        match self.settlement.pay_out(to, recipient, quote.output).await {
            Ok(outcome) if outcome.success => {
                let activity = self.record_activity(
                    user_id,
                    from,
                    to,
                    amount,
                    deposit_tx,
                    ActivityStatus::Success,
                    metadata,
                )?;
                Ok(SwapReceipt {
                    activity,
                    output_amount: quote.output,
                    rate: quote.rate,
                    replayed: false,
                })
            }
            Ok(outcome) => {
                self.record_activity(
                    user_id,
                    from,
                    to,
                    amount,
                    deposit_tx,
                    ActivityStatus::Failed,
                    metadata,
                )?;
                warn!(
                    user_id = %user_id,
                    deposit_tx = %deposit_tx,
                    tx_id = %outcome.tx_id,
                    "Token swap payout reverted; deposit held for manual reconciliation"
                );
                Err(SwapError::SettlementFailed(format!(
                    "payout {} reverted",
                    outcome.tx_id
                )))
            }
            Err(SettlementError::ReceiptTimeout { tx_id }) => {
                self.record_activity(
                    user_id,
                    from,
                    to,
                    amount,
                    deposit_tx,
                    ActivityStatus::Pending,
                    metadata,
                )?;
                Err(SwapError::SettlementPending { tx_id })
            }
            Err(e) => {
                self.record_activity(
                    user_id,
                    from,
                    to,
                    amount,
                    deposit_tx,
                    ActivityStatus::Failed,
                    metadata,
                )?;
                Err(SwapError::SettlementFailed(e.to_string()))
            }
        }
    }

    // =========================================================================
    // Fiat-source sagas (fiat→token, fiat→HBAR)
    // =========================================================================

    /// Spend existing fiat balance on a token/HBAR payout. Debit-first: the
    /// debit is the compensating-action checkpoint, refunded exactly when
    /// the settlement leg fails.
    pub async fn swap_fiat_to_asset(
        &self,
        user_id: &str,
        target: Asset,
        amount_kobo: i64,
    ) -> Result<SwapReceipt, SwapError> {
        if amount_kobo <= 0 {
            return Err(SwapError::NonPositiveAmount);
        }
        let recipient = self.wallet_address(user_id)?;

        // Rate lock before the debit so a quote failure has no side effect.
        let snapshot = self.oracle.snapshot().await;
        let ngn_amount = rates::kobo_to_ngn(amount_kobo);
        let quote = rates::convert(&snapshot, Asset::Ngn, target, ngn_amount);
        if quote.is_unavailable() {
            return Err(SwapError::RateUnavailable {
                from: Asset::Ngn,
                to: target,
            });
        }

        // Atomic conditional debit: the compensation checkpoint.
        match self.bank_ledger.debit_if_sufficient(user_id, amount_kobo) {
            Ok(_) => {}
            Err(StoreError::InsufficientBalance {
                balance_kobo,
                attempted_kobo,
            }) => {
                return Err(SwapError::InsufficientBalance {
                    balance_kobo,
                    attempted_kobo,
                });
            }
            Err(StoreError::NotFound(_)) => {
                return Err(SwapError::NoBankAccount(user_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        self.settle_fiat_purchase(user_id, target, ngn_amount, quote, recipient, None, Some(amount_kobo))
            .await
    }

    /// Webhook-triggered buy: the fiat was collected externally, so there
    /// is no local debit and no refund leg. `reference` is the processor's
    /// payment reference and the idempotency key.
    pub async fn swap_external_payment(
        &self,
        user_id: &str,
        target: Asset,
        amount_kobo: i64,
        reference: &str,
    ) -> Result<SwapReceipt, SwapError> {
        if amount_kobo <= 0 {
            return Err(SwapError::NonPositiveAmount);
        }
        if let Some(existing) = self.activities.already_settled(reference)? {
            return Ok(replay_receipt(existing));
        }
        let recipient = self.wallet_address(user_id)?;

        let snapshot = self.oracle.snapshot().await;
        let ngn_amount = rates::kobo_to_ngn(amount_kobo);
        let quote = rates::convert(&snapshot, Asset::Ngn, target, ngn_amount);
        if quote.is_unavailable() {
            return Err(SwapError::RateUnavailable {
                from: Asset::Ngn,
                to: target,
            });
        }

        self.settle_fiat_purchase(
            user_id,
            target,
            ngn_amount,
            quote,
            recipient,
            Some(reference.to_string()),
            None,
        )
        .await
    }

    /// Shared settle-and-record tail of the fiat-source sagas.
    ///
    /// `debited_kobo` is `Some` for the debit-first path and drives the
    /// refund compensation; `reference` is `Some` for the webhook path and
    /// becomes the recorded transaction hash.
    #[allow(clippy::too_many_arguments)]
    async fn settle_fiat_purchase(
        &self,
        user_id: &str,
        target: Asset,
        ngn_amount: Decimal,
        quote: rates::Quote,
        recipient: Address,
        reference: Option<String>,
        debited_kobo: Option<i64>,
    ) -> Result<SwapReceipt, SwapError> {
        let outcome = self.settlement.pay_out(target, recipient, quote.output).await;

        match outcome {
            Ok(outcome) if outcome.success => {
                let tx_hash = reference.clone().unwrap_or_else(|| outcome.tx_id.clone());
                let activity = self.record_activity(
                    user_id,
                    Asset::Ngn,
                    target,
                    ngn_amount,
                    &tx_hash,
                    ActivityStatus::Success,
                    purchase_metadata(target, reference, quote, debited_kobo),
                )?;
                info!(
                    user_id = %user_id,
                    tx_id = %outcome.tx_id,
                    target = %target,
                    output = %quote.output,
                    "Fiat purchase settled"
                );
                Ok(SwapReceipt {
                    activity,
                    output_amount: quote.output,
                    rate: quote.rate,
                    replayed: false,
                })
            }
            Ok(outcome) => {
                self.compensate_and_record(
                    user_id,
                    target,
                    ngn_amount,
                    quote,
                    reference,
                    debited_kobo,
                    &outcome.tx_id,
                )?;
                Err(SwapError::SettlementFailed(format!(
                    "payout {} reverted",
                    outcome.tx_id
                )))
            }
            Err(SettlementError::ReceiptTimeout { tx_id }) => {
                // Unknown outcome: no refund until reconciled, else a slow
                // but successful payout would double-pay.
                let tx_hash = reference.clone().unwrap_or_else(|| tx_id.clone());
                self.record_activity(
                    user_id,
                    Asset::Ngn,
                    target,
                    ngn_amount,
                    &tx_hash,
                    ActivityStatus::Pending,
                    purchase_metadata(target, reference, quote, debited_kobo),
                )?;
                Err(SwapError::SettlementPending { tx_id })
            }
            Err(e) => {
                let fallback_id = format!("swap-{}", Uuid::new_v4());
                self.compensate_and_record(
                    user_id,
                    target,
                    ngn_amount,
                    quote,
                    reference,
                    debited_kobo,
                    &fallback_id,
                )?;
                Err(SwapError::SettlementFailed(e.to_string()))
            }
        }
    }

    /// Refund the debit (when one was taken) and record the failed attempt.
    fn compensate_and_record(
        &self,
        user_id: &str,
        target: Asset,
        ngn_amount: Decimal,
        quote: rates::Quote,
        reference: Option<String>,
        debited_kobo: Option<i64>,
        settlement_id: &str,
    ) -> Result<(), SwapError> {
        if let Some(kobo) = debited_kobo {
            let restored = self.bank_ledger.credit(user_id, kobo)?;
            info!(user_id = %user_id, refunded_kobo = kobo, balance_kobo = restored, "Refunded failed swap debit");
        }
        let tx_hash = reference
            .clone()
            .unwrap_or_else(|| settlement_id.to_string());
        self.record_activity(
            user_id,
            Asset::Ngn,
            target,
            ngn_amount,
            &tx_hash,
            ActivityStatus::Failed,
            purchase_metadata(target, reference, quote, debited_kobo),
        )?;
        Ok(())
    }

    // =========================================================================
    // Fiat credits and peer transfers
    // =========================================================================

    /// Credit a confirmed external payment (plain deposit, no exchange
    /// intent). Idempotent on the payment reference.
    pub async fn credit_external_payment(
        &self,
        user_id: &str,
        amount_kobo: i64,
        reference: &str,
        channel: Option<String>,
    ) -> Result<SwapReceipt, SwapError> {
        if amount_kobo <= 0 {
            return Err(SwapError::NonPositiveAmount);
        }
        if let Some(existing) = self.activities.already_settled(reference)? {
            return Ok(replay_receipt(existing));
        }

        let balance = self.bank_ledger.credit(user_id, amount_kobo);
        let balance = match balance {
            Ok(b) => b,
            Err(StoreError::NotFound(_)) => {
                return Err(SwapError::NoBankAccount(user_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let ngn_amount = rates::kobo_to_ngn(amount_kobo);
        let mut activity = base_activity(
            user_id,
            Asset::Ngn,
            Asset::Ngn,
            ngn_amount,
            reference,
            ActivityStatus::Success,
            ActivityMetadata::FiatDeposit {
                reference: reference.to_string(),
                channel,
            },
        );
        activity.activity_type = ActivityType::Transfer;
        self.activities.record(&activity)?;
        info!(user_id = %user_id, reference = %reference, balance_kobo = balance, "Credited external payment");
        Ok(SwapReceipt {
            activity,
            output_amount: ngn_amount,
            rate: Decimal::ONE,
            replayed: false,
        })
    }

    /// Internal user-to-user fiat transfer: both balance updates commit
    /// atomically; each side gets its own activity record.
    pub async fn transfer_fiat(
        &self,
        from_user: &str,
        to_user: &str,
        amount_kobo: i64,
    ) -> Result<(), SwapError> {
        if amount_kobo <= 0 {
            return Err(SwapError::NonPositiveAmount);
        }
        match self.bank_ledger.transfer(from_user, to_user, amount_kobo) {
            Ok(()) => {}
            Err(StoreError::InsufficientBalance {
                balance_kobo,
                attempted_kobo,
            }) => {
                return Err(SwapError::InsufficientBalance {
                    balance_kobo,
                    attempted_kobo,
                });
            }
            Err(StoreError::NotFound(what)) => {
                return Err(SwapError::NoBankAccount(what));
            }
            Err(e) => return Err(e.into()),
        }

        let transfer_id = Uuid::new_v4();
        let ngn_amount = rates::kobo_to_ngn(amount_kobo);
        for (user, counterparty, sent, suffix) in [
            (from_user, to_user, true, "out"),
            (to_user, from_user, false, "in"),
        ] {
            let mut activity = base_activity(
                user,
                Asset::Ngn,
                Asset::Ngn,
                ngn_amount,
                &format!("trf-{transfer_id}-{suffix}"),
                ActivityStatus::Success,
                ActivityMetadata::PeerTransfer {
                    counterparty: counterparty.to_string(),
                    sent,
                },
            );
            activity.activity_type = ActivityType::Transfer;
            self.activities.record(&activity)?;
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn wallet_address(&self, user_id: &str) -> Result<Address, SwapError> {
        let wallet = self
            .wallets
            .get(user_id)?
            .ok_or_else(|| SwapError::NoWallet(user_id.to_string()))?;
        Address::from_str(&wallet.evm_address)
            .map_err(|_| SwapError::NoWallet(user_id.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_activity(
        &self,
        user_id: &str,
        from: Asset,
        to: Asset,
        amount: Decimal,
        tx_hash: &str,
        status: ActivityStatus,
        metadata: ActivityMetadata,
    ) -> Result<Activity, SwapError> {
        let activity = base_activity(user_id, from, to, amount, tx_hash, status, metadata);
        self.activities.record(&activity)?;
        Ok(activity)
    }
}

#[async_trait::async_trait]
impl DepositSink for ExchangeOrchestrator {
    /// Inbound handler for detected vault deposits: the event-driven
    /// trigger of the cash-out saga. Errors are logged, never bubbled —
    /// the listener loop must keep running.
    async fn handle_deposit(&self, deposit: DepositEvent) {
        let depositor = format!("{:#x}", deposit.depositor);
        let user_id = match self.wallets.find_user_by_address(&depositor) {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                warn!(depositor = %depositor, tx_id = %deposit.tx_id, "Deposit from unknown address, skipping");
                return;
            }
            Err(e) => {
                warn!(error = %e, tx_id = %deposit.tx_id, "Wallet lookup failed for deposit");
                return;
            }
        };

        let amount = match from_fixed_point(deposit.asset, deposit.amount_units) {
            Ok(amount) => amount,
            Err(e) => {
                warn!(error = %e, tx_id = %deposit.tx_id, "Unrepresentable deposit amount");
                return;
            }
        };

        match self
            .cash_out_deposit(&user_id, deposit.asset, amount, &deposit.tx_id)
            .await
        {
            Ok(receipt) if receipt.replayed => {
                info!(tx_id = %deposit.tx_id, "Deposit already settled, skipping");
            }
            Ok(_) => {
                // A deposit from this address proves the account is live.
                if let Err(e) = self.wallets.mark_activated(&user_id) {
                    warn!(user_id = %user_id, error = %e, "Failed to mark wallet activated");
                }
            }
            Err(e) => {
                warn!(tx_id = %deposit.tx_id, error = %e, "Deposit cash-out failed");
            }
        }
    }
}

fn base_activity(
    user_id: &str,
    from: Asset,
    to: Asset,
    amount: Decimal,
    tx_hash: &str,
    status: ActivityStatus,
    metadata: ActivityMetadata,
) -> Activity {
    Activity {
        user_id: user_id.to_string(),
        activity_type: ActivityType::Swap,
        amount: amount.to_string(),
        from_token: from.symbol().to_string(),
        to_token: to.symbol().to_string(),
        transaction_hash: tx_hash.to_string(),
        status,
        metadata,
        created_at: Utc::now(),
    }
}

fn deposit_metadata(
    asset: Asset,
    deposit_tx: &str,
    fiat_kobo: i64,
    rate: Decimal,
    transfer_code: Option<String>,
) -> ActivityMetadata {
    if asset == Asset::Hbar {
        ActivityMetadata::HbarToFiat {
            deposit_tx: deposit_tx.to_string(),
            fiat_kobo,
            rate,
            transfer_code,
        }
    } else {
        ActivityMetadata::TokenToFiat {
            deposit_tx: deposit_tx.to_string(),
            fiat_kobo,
            rate,
            transfer_code,
        }
    }
}

fn purchase_metadata(
    target: Asset,
    reference: Option<String>,
    quote: rates::Quote,
    debited_kobo: Option<i64>,
) -> ActivityMetadata {
    if target == Asset::Hbar {
        ActivityMetadata::FiatToHbar {
            reference,
            hbar_amount: quote.output.to_string(),
            rate: quote.rate,
            debited_kobo,
        }
    } else {
        ActivityMetadata::FiatToToken {
            reference,
            token_amount: quote.output.to_string(),
            rate: quote.rate,
            debited_kobo,
        }
    }
}

fn replay_receipt(activity: Activity) -> SwapReceipt {
    SwapReceipt {
        activity,
        output_amount: Decimal::ZERO,
        rate: Decimal::ZERO,
        replayed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use crate::fiat::paystack::{PaystackError, TransferReceipt};
    use crate::oracle::{FeedQuote, OracleError, RateFeed};
    use crate::storage::{BankAccount, Store, WalletLedgerRef};
    use crate::storage::test_support::temp_store;

    const USER: &str = "user-1";
    const USER_ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    struct StaticFeed {
        hbar_usd: Decimal,
        usd_ngn: Decimal,
    }

    #[async_trait::async_trait]
    impl RateFeed for StaticFeed {
        async fn fetch(&self) -> Result<FeedQuote, OracleError> {
            Ok(FeedQuote {
                hbar_usd: self.hbar_usd,
                usd_ngn: self.usd_ngn,
            })
        }
    }

    #[derive(Clone, Copy)]
    enum SettleBehavior {
        Succeed,
        Revert,
        RpcError,
        Timeout,
    }

    struct MockSettlement {
        behavior: SettleBehavior,
        calls: Mutex<Vec<(Asset, Address, Decimal)>>,
    }

    impl MockSettlement {
        fn new(behavior: SettleBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl SettlementLeg for MockSettlement {
        async fn pay_out(
            &self,
            asset: Asset,
            recipient: Address,
            amount: Decimal,
        ) -> Result<crate::exchange::SettlementOutcome, SettlementError> {
            self.calls.lock().unwrap().push((asset, recipient, amount));
            match self.behavior {
                SettleBehavior::Succeed => Ok(crate::exchange::SettlementOutcome {
                    tx_id: "0xsettled".to_string(),
                    success: true,
                }),
                SettleBehavior::Revert => Ok(crate::exchange::SettlementOutcome {
                    tx_id: "0xreverted".to_string(),
                    success: false,
                }),
                SettleBehavior::RpcError => {
                    Err(SettlementError::Rpc("connection refused".to_string()))
                }
                SettleBehavior::Timeout => Err(SettlementError::ReceiptTimeout {
                    tx_id: "0xslow".to_string(),
                }),
            }
        }
    }

    struct MockRail {
        fail_payouts: bool,
        payouts: Mutex<Vec<(String, i64)>>,
    }

    impl MockRail {
        fn new(fail_payouts: bool) -> Arc<Self> {
            Arc::new(Self {
                fail_payouts,
                payouts: Mutex::new(Vec::new()),
            })
        }

        fn payout_count(&self) -> usize {
            self.payouts.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl FiatRail for MockRail {
        async fn ensure_transfer_recipient(
            &self,
            _account: &BankAccount,
        ) -> Result<String, PaystackError> {
            Ok("RCP_test".to_string())
        }

        async fn pay_out(
            &self,
            recipient_code: &str,
            amount_kobo: i64,
            _narration: &str,
        ) -> Result<TransferReceipt, PaystackError> {
            self.payouts
                .lock()
                .unwrap()
                .push((recipient_code.to_string(), amount_kobo));
            if self.fail_payouts {
                return Err(PaystackError::Api("503: transfers unavailable".to_string()));
            }
            Ok(TransferReceipt {
                transfer_code: "TRF_test".to_string(),
                status: "success".to_string(),
            })
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<Store>,
        settlement: Arc<MockSettlement>,
        rail: Arc<MockRail>,
        orchestrator: ExchangeOrchestrator,
    }

    /// Oracle at HBAR = 0.2 USD, USD/NGN = 1650: stables price at N1,650.
    fn harness(settle: SettleBehavior, fail_payouts: bool) -> Harness {
        harness_with_rates(settle, fail_payouts, dec!(0.2), dec!(1650))
    }

    fn harness_with_rates(
        settle: SettleBehavior,
        fail_payouts: bool,
        hbar_usd: Decimal,
        usd_ngn: Decimal,
    ) -> Harness {
        let (dir, store) = temp_store();
        let oracle = Arc::new(PriceOracle::new(
            Arc::new(StaticFeed { hbar_usd, usd_ngn }),
            Duration::from_secs(3600),
        ));
        let settlement = MockSettlement::new(settle);
        let rail = MockRail::new(fail_payouts);
        let orchestrator = ExchangeOrchestrator::new(
            oracle,
            settlement.clone(),
            rail.clone(),
            ActivityLedger::new(store.clone()),
            BankLedger::new(store.clone()),
            WalletDirectory::new(store.clone()),
        );
        Harness {
            _dir: dir,
            store,
            settlement,
            rail,
            orchestrator,
        }
    }

    fn provision_user(h: &Harness, balance_kobo: i64) {
        let ledger = BankLedger::new(h.store.clone());
        ledger
            .create(&BankAccount::new(
                USER.to_string(),
                "CUS_1".to_string(),
                "0123456789".to_string(),
                "Test User".to_string(),
                "Wema Bank".to_string(),
                "035".to_string(),
            ))
            .unwrap();
        if balance_kobo > 0 {
            ledger.credit(USER, balance_kobo).unwrap();
        }
        WalletDirectory::new(h.store.clone())
            .register(&WalletLedgerRef {
                user_id: USER.to_string(),
                ledger_account_id: "0.0.12345".to_string(),
                evm_address: USER_ADDRESS.to_string(),
                encrypted_key: "sealed".to_string(),
                is_activated: true,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    fn balance(h: &Harness) -> i64 {
        BankLedger::new(h.store.clone())
            .get(USER)
            .unwrap()
            .unwrap()
            .balance_kobo
    }

    #[tokio::test]
    async fn fiat_to_token_debits_settles_and_records() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 2_000_000); // N20,000

        // N16,500 at 1,650 NGN/USDC buys exactly 10 USDC.
        let receipt = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Usdc, 1_650_000)
            .await
            .unwrap();

        assert_eq!(receipt.output_amount, dec!(10));
        assert_eq!(receipt.rate, dec!(1650));
        assert!(!receipt.replayed);
        assert_eq!(balance(&h), 350_000); // N3,500 remaining

        let calls = h.settlement.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Asset::Usdc);
        assert_eq!(calls[0].2, dec!(10));
        drop(calls);

        let recorded = ActivityLedger::new(h.store.clone())
            .already_settled("0xsettled")
            .unwrap()
            .unwrap();
        assert_eq!(recorded.from_token, "NGN");
        assert_eq!(recorded.to_token, "USDC");
    }

    #[tokio::test]
    async fn failed_settlement_refunds_exact_debit() {
        let h = harness(SettleBehavior::Revert, false);
        provision_user(&h, 2_000_000);

        let err = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Usdc, 1_650_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SettlementFailed(_)));

        // Balance restored to exactly the pre-debit amount.
        assert_eq!(balance(&h), 2_000_000);

        let (activities, total) = ActivityLedger::new(h.store.clone())
            .list_for_user(USER, 1, 10, None)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(activities[0].status, ActivityStatus::Failed);
    }

    #[tokio::test]
    async fn rpc_failure_also_refunds() {
        let h = harness(SettleBehavior::RpcError, false);
        provision_user(&h, 2_000_000);

        let err = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Dai, 500_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SettlementFailed(_)));
        assert_eq!(balance(&h), 2_000_000);
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_before_any_side_effect() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 100_000);

        let err = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Usdc, 1_650_000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientBalance {
                balance_kobo: 100_000,
                attempted_kobo: 1_650_000
            }
        ));

        assert_eq!(balance(&h), 100_000);
        assert_eq!(h.settlement.call_count(), 0);
        let (_, total) = ActivityLedger::new(h.store.clone())
            .list_for_user(USER, 1, 10, None)
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn unavailable_rate_rejects_with_no_side_effects() {
        let h = harness_with_rates(SettleBehavior::Succeed, false, Decimal::ZERO, Decimal::ZERO);
        provision_user(&h, 2_000_000);

        let err = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Hbar, 100_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::RateUnavailable { .. }));
        assert_eq!(balance(&h), 2_000_000);
        assert_eq!(h.settlement.call_count(), 0);
    }

    #[tokio::test]
    async fn receipt_timeout_records_pending_and_holds_the_debit() {
        let h = harness(SettleBehavior::Timeout, false);
        provision_user(&h, 2_000_000);

        let err = h
            .orchestrator
            .swap_fiat_to_asset(USER, Asset::Usdc, 1_650_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SettlementPending { .. }));

        // No refund until the unknown outcome is reconciled.
        assert_eq!(balance(&h), 350_000);
        let recorded = ActivityLedger::new(h.store.clone())
            .find_by_transaction_hash("0xslow")
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status, ActivityStatus::Pending);
    }

    #[tokio::test]
    async fn external_payment_swap_is_idempotent_by_reference() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        let first = h
            .orchestrator
            .swap_external_payment(USER, Asset::Usdc, 1_650_000, "ref123")
            .await
            .unwrap();
        assert!(!first.replayed);
        assert_eq!(first.output_amount, dec!(10));

        // Redelivered webhook: same reference must not settle twice.
        let second = h
            .orchestrator
            .swap_external_payment(USER, Asset::Usdc, 1_650_000, "ref123")
            .await
            .unwrap();
        assert!(second.replayed);
        assert_eq!(h.settlement.call_count(), 1);
    }

    #[tokio::test]
    async fn external_payment_swap_failure_records_without_refund_leg() {
        let h = harness(SettleBehavior::Revert, false);
        provision_user(&h, 0);

        let err = h
            .orchestrator
            .swap_external_payment(USER, Asset::Usdc, 1_650_000, "ref456")
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SettlementFailed(_)));

        // Fiat was collected externally: nothing to refund locally.
        assert_eq!(balance(&h), 0);
        let recorded = ActivityLedger::new(h.store.clone())
            .find_by_transaction_hash("ref456")
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status, ActivityStatus::Failed);
    }

    #[tokio::test]
    async fn cash_out_deposit_pays_out_floored_kobo() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        let receipt = h
            .orchestrator
            .cash_out_deposit(USER, Asset::Usdc, dec!(10), "0xdeposit1")
            .await
            .unwrap();
        assert_eq!(receipt.output_amount, dec!(16500));

        let payouts = h.rail.payouts.lock().unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].1, 1_650_000);
        drop(payouts);

        let recorded = ActivityLedger::new(h.store.clone())
            .already_settled("0xdeposit1")
            .unwrap()
            .unwrap();
        assert!(matches!(
            recorded.metadata,
            ActivityMetadata::TokenToFiat {
                fiat_kobo: 1_650_000,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cash_out_is_idempotent_on_deposit_tx() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        h.orchestrator
            .cash_out_deposit(USER, Asset::Usdc, dec!(10), "0xdeposit1")
            .await
            .unwrap();
        let replay = h
            .orchestrator
            .cash_out_deposit(USER, Asset::Usdc, dec!(10), "0xdeposit1")
            .await
            .unwrap();
        assert!(replay.replayed);
        assert_eq!(h.rail.payout_count(), 1);
    }

    #[tokio::test]
    async fn cash_out_payout_failure_holds_deposit_for_reconciliation() {
        let h = harness(SettleBehavior::Succeed, true);
        provision_user(&h, 0);

        let err = h
            .orchestrator
            .cash_out_deposit(USER, Asset::Hbar, dec!(50), "0xdeposit2")
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::FiatPayoutFailed(_)));

        let ledger = ActivityLedger::new(h.store.clone());
        let recorded = ledger
            .find_by_transaction_hash("0xdeposit2")
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status, ActivityStatus::Failed);
        // A failed record does not block a retry.
        assert!(ledger.already_settled("0xdeposit2").unwrap().is_none());
    }

    #[tokio::test]
    async fn token_to_token_at_equal_rates_is_one_to_one() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        // USDT and DAI both price at N1,650: 100 in must yield 100 out.
        let receipt = h
            .orchestrator
            .swap_token_to_token(USER, Asset::Usdt, Asset::Dai, dec!(100), "0xdeposit3")
            .await
            .unwrap();
        assert_eq!(receipt.output_amount, dec!(100));
        assert_eq!(receipt.rate, Decimal::ONE);

        let calls = h.settlement.calls.lock().unwrap();
        assert_eq!(calls[0].0, Asset::Dai);
        assert_eq!(calls[0].2, dec!(100));
    }

    #[tokio::test]
    async fn token_to_token_failure_records_and_holds_for_reconciliation() {
        let h = harness(SettleBehavior::Revert, false);
        provision_user(&h, 0);

        let err = h
            .orchestrator
            .swap_token_to_token(USER, Asset::Usdt, Asset::Dai, dec!(100), "0xdeposit4")
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SettlementFailed(_)));

        let recorded = ActivityLedger::new(h.store.clone())
            .find_by_transaction_hash("0xdeposit4")
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status, ActivityStatus::Failed);
    }

    #[tokio::test]
    async fn deposit_sink_skips_unknown_depositors() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        h.orchestrator
            .handle_deposit(DepositEvent {
                depositor: Address::repeat_byte(0x99),
                asset: Asset::Usdc,
                amount_units: alloy::primitives::U256::from(10_000_000u64),
                tx_id: "0xunknown".to_string(),
                block_number: 1,
            })
            .await;

        assert_eq!(h.rail.payout_count(), 0);
        assert!(ActivityLedger::new(h.store.clone())
            .find_by_transaction_hash("0xunknown")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deposit_sink_cashes_out_registered_depositors() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        // 10 USDC at 6 decimals.
        h.orchestrator
            .handle_deposit(DepositEvent {
                depositor: Address::from_str(USER_ADDRESS).unwrap(),
                asset: Asset::Usdc,
                amount_units: alloy::primitives::U256::from(10_000_000u64),
                tx_id: "0xevent1".to_string(),
                block_number: 42,
            })
            .await;

        let payouts = h.rail.payouts.lock().unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].1, 1_650_000);
    }

    #[tokio::test]
    async fn plain_credit_is_idempotent_and_moves_the_balance() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 0);

        h.orchestrator
            .credit_external_payment(USER, 500_000, "dep-1", Some("bank_transfer".to_string()))
            .await
            .unwrap();
        assert_eq!(balance(&h), 500_000);

        let replay = h
            .orchestrator
            .credit_external_payment(USER, 500_000, "dep-1", None)
            .await
            .unwrap();
        assert!(replay.replayed);
        assert_eq!(balance(&h), 500_000);
    }

    #[tokio::test]
    async fn peer_transfer_records_both_sides() {
        let h = harness(SettleBehavior::Succeed, false);
        provision_user(&h, 100_000);
        BankLedger::new(h.store.clone())
            .create(&BankAccount::new(
                "user-2".to_string(),
                "CUS_2".to_string(),
                "9876543210".to_string(),
                "Other User".to_string(),
                "Wema Bank".to_string(),
                "035".to_string(),
            ))
            .unwrap();

        h.orchestrator
            .transfer_fiat(USER, "user-2", 40_000)
            .await
            .unwrap();

        assert_eq!(balance(&h), 60_000);
        let ledger = ActivityLedger::new(h.store.clone());
        let (sender_side, _) = ledger
            .list_for_user(USER, 1, 10, Some(ActivityType::Transfer))
            .unwrap();
        assert_eq!(sender_side.len(), 1);
        let (recipient_side, _) = ledger
            .list_for_user("user-2", 1, 10, Some(ActivityType::Transfer))
            .unwrap();
        assert_eq!(recipient_side.len(), 1);
    }

    #[tokio::test]
    async fn quote_prices_without_executing() {
        let h = harness(SettleBehavior::Succeed, false);
        let quote = h
            .orchestrator
            .quote(Asset::Ngn, Asset::Usdc, dec!(16500))
            .await
            .unwrap();
        assert_eq!(quote.output, dec!(10));
        assert_eq!(h.settlement.call_count(), 0);
    }
}
