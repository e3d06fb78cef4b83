// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Per-user resources: activities, fiat balance, virtual accounts.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use chrono::Utc;

use crate::{
    error::ApiError,
    models::{
        ActivityListQuery, ActivityListResponse, ActivityStatsResponse, BalanceResponse,
        CreateVirtualAccountRequest, RegisterWalletRequest, VirtualAccountResponse,
        WalletResponse,
    },
    rates,
    state::AppState,
    storage::{BankAccount, StoreError, WalletLedgerRef},
};

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

/// Newest-first activity listing for a user.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/activities",
    tag = "Users",
    params(
        ("user_id" = String, Path, description = "User id"),
        ActivityListQuery
    ),
    responses(
        (status = 200, description = "Paginated activities", body = ActivityListResponse)
    )
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<ActivityListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let (activities, total) = state
        .activities
        .list_for_user(&user_id, page, limit, query.activity_type)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(ActivityListResponse {
        activities,
        total,
        page,
        limit,
    }))
}

/// Per-type activity counts for a user.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/activities/stats",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Activity counts by type", body = ActivityStatsResponse)
    )
)]
pub async fn activity_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ActivityStatsResponse>, ApiError> {
    let counts = state
        .activities
        .stats(&user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(ActivityStatsResponse { counts }))
}

/// Fiat balance and virtual-account details.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/balance",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Fiat balance", body = BalanceResponse),
        (status = 404, description = "No bank account for this user")
    )
)]
pub async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state
        .bank_ledger
        .get(&user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("no bank account for user {user_id}")))?;

    Ok(Json(BalanceResponse {
        user_id,
        balance_kobo: account.balance_kobo,
        balance_ngn: rates::kobo_to_ngn(account.balance_kobo),
        account_number: account.account_number,
        bank_name: account.bank_name,
    }))
}

/// Provision a dedicated virtual account for a user. One per user; the
/// existence check happens here, before any processor call.
#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/virtual-account",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    request_body = CreateVirtualAccountRequest,
    responses(
        (status = 200, description = "Provisioned virtual account", body = VirtualAccountResponse),
        (status = 409, description = "User already has a bank account"),
        (status = 502, description = "Payment processor rejected the call")
    )
)]
pub async fn create_virtual_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateVirtualAccountRequest>,
) -> Result<Json<VirtualAccountResponse>, ApiError> {
    let existing = state
        .bank_ledger
        .get(&user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::conflict(format!(
            "user {user_id} already has a bank account"
        )));
    }

    let customer_code = state
        .paystack
        .ensure_customer(&req.email, &req.first_name, &req.last_name, &req.phone)
        .await
        .map_err(|e| ApiError::new(axum::http::StatusCode::BAD_GATEWAY, e.to_string()))?;

    let details = state
        .paystack
        .create_virtual_account(&customer_code, req.bvn.as_deref())
        .await
        .map_err(|e| ApiError::new(axum::http::StatusCode::BAD_GATEWAY, e.to_string()))?;

    let account = BankAccount::new(
        user_id.clone(),
        customer_code,
        details.account_number.clone(),
        details.account_name.clone(),
        details.bank_name.clone(),
        details.bank_code.clone(),
    );
    state
        .bank_ledger
        .create(&account)
        .map_err(|e| ApiError::conflict(e.to_string()))?;

    info!(user_id = %user_id, account_number = %details.account_number, "Provisioned virtual account");
    Ok(Json(VirtualAccountResponse {
        user_id,
        account_number: details.account_number,
        account_name: details.account_name,
        bank_name: details.bank_name,
    }))
}

/// Register a user's on-chain wallet reference. One per user; the signing
/// key is sealed by the vault before it touches disk.
#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/wallet",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    request_body = RegisterWalletRequest,
    responses(
        (status = 200, description = "Registered wallet reference", body = WalletResponse),
        (status = 400, description = "Invalid address or key material"),
        (status = 409, description = "User already has a wallet")
    )
)]
pub async fn register_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<RegisterWalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let evm_address = req.evm_address.trim();
    if !evm_address.starts_with("0x") || evm_address.len() != 42 {
        return Err(ApiError::bad_request(
            "evm_address must be a 0x-prefixed 20-byte hex address",
        ));
    }
    let key_bytes = hex::decode(req.private_key_hex.trim_start_matches("0x"))
        .map_err(|_| ApiError::bad_request("private_key_hex must be valid hex"))?;

    let wallet = WalletLedgerRef {
        user_id: user_id.clone(),
        ledger_account_id: req.ledger_account_id,
        evm_address: evm_address.to_string(),
        encrypted_key: state.vault.encrypt(&key_bytes),
        is_activated: false,
        created_at: Utc::now(),
    };

    match state.wallets.register(&wallet) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists(_)) => {
            return Err(ApiError::conflict(format!(
                "user {user_id} already has a wallet"
            )));
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    }

    info!(user_id = %user_id, evm_address = %wallet.evm_address, "Registered wallet reference");
    Ok(Json(WalletResponse {
        user_id,
        ledger_account_id: wallet.ledger_account_id,
        evm_address: wallet.evm_address,
        is_activated: wallet.is_activated,
    }))
}
