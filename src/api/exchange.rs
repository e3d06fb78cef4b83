// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Swap execution, quote preview and oracle rates.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::{AssetRate, QuoteRequest, QuoteResponse, RatesResponse, SwapRequest, SwapResponse},
    orchestrator::{SwapError, SwapReceipt},
    rates,
    state::AppState,
    storage::ActivityStatus,
};

use crate::assets::Asset;

/// Map a saga failure onto the HTTP boundary.
pub(super) fn map_swap_error(e: SwapError) -> ApiError {
    match e {
        SwapError::RateUnavailable { .. } | SwapError::NonPositiveAmount => {
            ApiError::unprocessable(e.to_string())
        }
        SwapError::InsufficientBalance { .. } => ApiError::unprocessable(e.to_string()),
        SwapError::NoBankAccount(_) | SwapError::NoWallet(_) | SwapError::UnknownDepositor(_) => {
            ApiError::not_found(e.to_string())
        }
        SwapError::SettlementFailed(_) | SwapError::FiatPayoutFailed(_) => {
            ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
        }
        SwapError::SettlementPending { .. } => {
            ApiError::new(StatusCode::GATEWAY_TIMEOUT, e.to_string())
        }
        SwapError::Store(_) => ApiError::internal(e.to_string()),
    }
}

fn status_str(status: ActivityStatus) -> String {
    match status {
        ActivityStatus::Pending => "pending",
        ActivityStatus::Success => "success",
        ActivityStatus::Failed => "failed",
    }
    .to_string()
}

fn swap_response(receipt: SwapReceipt) -> SwapResponse {
    SwapResponse {
        transaction_hash: receipt.activity.transaction_hash.clone(),
        status: status_str(receipt.activity.status),
        output: receipt.output_amount,
        rate: receipt.rate,
        replayed: receipt.replayed,
    }
}

/// Execute a swap between any two registered assets.
#[utoipa::path(
    post,
    path = "/v1/swap",
    tag = "Exchange",
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Swap settled", body = SwapResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown user, wallet or bank account"),
        (status = 422, description = "Insufficient balance or rate unavailable"),
        (status = 502, description = "Settlement leg failed"),
        (status = 504, description = "Settlement outcome unknown")
    )
)]
pub async fn execute_swap(
    State(state): State<AppState>,
    Json(req): Json<SwapRequest>,
) -> Result<Json<SwapResponse>, ApiError> {
    if req.from == req.to {
        return Err(ApiError::bad_request("from and to must differ"));
    }

    let receipt = match (req.from, req.to) {
        (Asset::Ngn, target) => {
            let kobo = rates::to_kobo_floor(req.amount)
                .filter(|k| *k > 0)
                .ok_or_else(|| ApiError::bad_request("amount must be a positive NGN amount"))?;
            state
                .orchestrator
                .swap_fiat_to_asset(&req.user_id, target, kobo)
                .await
        }
        (source, Asset::Ngn) => {
            let deposit_tx = req
                .deposit_tx
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("deposit_tx is required for token-source swaps"))?;
            state
                .orchestrator
                .cash_out_deposit(&req.user_id, source, req.amount, deposit_tx)
                .await
        }
        (source, target) => {
            let deposit_tx = req
                .deposit_tx
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("deposit_tx is required for token-source swaps"))?;
            state
                .orchestrator
                .swap_token_to_token(&req.user_id, source, target, req.amount, deposit_tx)
                .await
        }
    }
    .map_err(map_swap_error)?;

    Ok(Json(swap_response(receipt)))
}

/// Price a conversion without executing it.
#[utoipa::path(
    post,
    path = "/v1/quote",
    tag = "Exchange",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Priced quote", body = QuoteResponse),
        (status = 422, description = "Rate unavailable")
    )
)]
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .orchestrator
        .quote(req.from, req.to, req.amount)
        .await
        .map_err(map_swap_error)?;

    // Fiat outputs round half-up to the kobo for display.
    let output = if req.to == Asset::Ngn {
        rates::round_quote(quote.output)
    } else {
        quote.output
    };

    Ok(Json(QuoteResponse {
        from: req.from,
        to: req.to,
        amount: req.amount,
        output,
        rate: quote.rate,
    }))
}

/// Current oracle rates for all registered assets.
#[utoipa::path(
    get,
    path = "/v1/rates",
    tag = "Exchange",
    responses(
        (status = 200, description = "Current rate snapshot", body = RatesResponse)
    )
)]
pub async fn current_rates(State(state): State<AppState>) -> Json<RatesResponse> {
    let snapshot = state.oracle.snapshot().await;
    let rates = Asset::ALL
        .iter()
        .map(|&asset| AssetRate {
            asset,
            ngn_per_unit: snapshot.rate(asset),
        })
        .collect();

    Json(RatesResponse {
        rates,
        ngn_per_usd: snapshot.ngn_per_usd,
        captured_at: snapshot.captured_at,
    })
}
