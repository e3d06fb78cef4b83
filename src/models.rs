// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! API request/response models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::assets::Asset;
use crate::storage::{Activity, ActivityType};

/// Request body for pricing a conversion without executing it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuoteRequest {
    /// Source asset symbol (`NGN` for the fiat ledger).
    pub from: Asset,
    /// Target asset symbol.
    pub to: Asset,
    /// Source-asset amount as a decimal string.
    pub amount: Decimal,
}

/// Priced conversion preview.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub from: Asset,
    pub to: Asset,
    /// Source-asset amount echoed back.
    pub amount: Decimal,
    /// Target-asset amount this conversion would deliver.
    pub output: Decimal,
    /// Applied conversion rate.
    pub rate: Decimal,
}

/// Request body for executing a swap.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SwapRequest {
    /// Owning user.
    pub user_id: String,
    /// Source asset symbol.
    pub from: Asset,
    /// Target asset symbol.
    pub to: Asset,
    /// Source-asset amount as a decimal string (NGN amounts in naira).
    pub amount: Decimal,
    /// On-chain deposit transaction id. Required when the source asset is
    /// a token or HBAR; it references the vault deposit being swapped.
    #[serde(default)]
    pub deposit_tx: Option<String>,
}

/// Executed swap result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SwapResponse {
    /// Settlement-leg identifier of the recorded activity.
    pub transaction_hash: String,
    /// Recorded outcome (`success` for fresh settlements and replays).
    pub status: String,
    /// Target-asset amount delivered. Zero on an idempotent replay (the
    /// original activity carries the settled amounts).
    pub output: Decimal,
    /// Rate applied.
    pub rate: Decimal,
    /// True when this call replayed an already-settled event.
    pub replayed: bool,
}

/// Per-asset NGN rate in the current oracle snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetRate {
    pub asset: Asset,
    /// NGN per unit. Zero means unavailable.
    pub ngn_per_unit: Decimal,
}

/// Oracle snapshot exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatesResponse {
    pub rates: Vec<AssetRate>,
    /// USD/NGN pivot rate behind the snapshot.
    pub ngn_per_usd: Decimal,
    /// Snapshot capture time.
    pub captured_at: DateTime<Utc>,
}

/// Fiat balance of a user's bank ledger.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: String,
    /// Balance in kobo.
    pub balance_kobo: i64,
    /// Balance in naira as a decimal string.
    pub balance_ngn: Decimal,
    /// Dedicated virtual account number receiving bank deposits.
    pub account_number: String,
    pub bank_name: String,
}

/// Query parameters for the activity listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ActivityListQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<usize>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<usize>,
    /// Optional activity-type filter.
    pub activity_type: Option<ActivityType>,
}

/// Paginated activity listing, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<Activity>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Per-type activity counts for a user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityStatsResponse {
    pub counts: HashMap<ActivityType, u64>,
}

/// Request body for provisioning a dedicated virtual account.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateVirtualAccountRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    /// Bank verification number, when the processor requires one.
    #[serde(default)]
    pub bvn: Option<String>,
}

/// Provisioned virtual account details.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VirtualAccountResponse {
    pub user_id: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
}

/// Request body for initializing a card payment.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    pub user_id: String,
    pub email: String,
    /// Amount in naira as a decimal string.
    pub amount_ngn: Decimal,
    /// When present, the confirmed payment buys this asset instead of
    /// crediting the fiat balance.
    #[serde(default)]
    pub target_asset: Option<Asset>,
}

/// Card payment initialization result; the user completes the payment at
/// the authorization URL and the webhook settles it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitializePaymentResponse {
    pub authorization_url: String,
    pub reference: String,
}

/// Result of reconciling a payment by reference against the processor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentVerifyResponse {
    pub reference: String,
    /// Processor-side payment status (`success`, `abandoned`, `failed`).
    pub status: String,
    /// True when this call settled (or had already settled) the payment.
    pub settled: bool,
    /// True when the payment was already settled by an earlier delivery.
    pub replayed: bool,
}

/// Request body for an internal user-to-user fiat transfer.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferRequest {
    pub from_user_id: String,
    pub to_user_id: String,
    /// Amount in naira as a decimal string.
    pub amount_ngn: Decimal,
}

/// Completed internal transfer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferResponse {
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount_kobo: i64,
}

/// Request body for registering a user's on-chain wallet reference.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterWalletRequest {
    /// Ledger-native account id (e.g. `0.0.12345`).
    pub ledger_account_id: String,
    /// Derived EVM address, `0x`-prefixed.
    pub evm_address: String,
    /// Hex-encoded signing key; sealed by the key vault before persistence
    /// and never returned.
    pub private_key_hex: String,
}

/// Registered wallet reference. Key material is never included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletResponse {
    pub user_id: String,
    pub ledger_account_id: String,
    pub evm_address: String,
    pub is_activated: bool,
}

/// Health probe response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
