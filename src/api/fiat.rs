// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Card-payment initialization and internal fiat transfers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{
    error::ApiError,
    fiat::webhook::{credited_user_from, exchange_intent_from},
    models::{
        InitializePaymentRequest, InitializePaymentResponse, PaymentVerifyResponse,
        TransferRequest, TransferResponse,
    },
    rates,
    state::AppState,
};

use super::exchange::map_swap_error;

/// Initialize a card payment. The metadata carries the user id, plus the
/// exchange intent when the payment funds a buy; the webhook settles the
/// confirmed payment either way.
#[utoipa::path(
    post,
    path = "/v1/payments/initialize",
    tag = "Fiat",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Payment initialized", body = InitializePaymentResponse),
        (status = 400, description = "Invalid amount"),
        (status = 502, description = "Payment processor rejected the call")
    )
)]
pub async fn initialize_payment(
    State(state): State<AppState>,
    Json(req): Json<InitializePaymentRequest>,
) -> Result<Json<InitializePaymentResponse>, ApiError> {
    let kobo = rates::to_kobo_floor(req.amount_ngn)
        .filter(|k| *k > 0)
        .ok_or_else(|| ApiError::bad_request("amount_ngn must be a positive NGN amount"))?;

    let metadata = match req.target_asset {
        Some(asset) => json!({
            "user_id": req.user_id,
            "exchange_type": "buy",
            "target_asset": asset.symbol(),
        }),
        None => json!({ "user_id": req.user_id }),
    };

    let init = state
        .paystack
        .initialize_card_payment(&req.email, kobo, metadata)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(InitializePaymentResponse {
        authorization_url: init.authorization_url,
        reference: init.reference,
    }))
}

/// Reconcile a payment by reference. Covers webhooks the service missed:
/// the payment is re-verified against the processor and settled exactly as
/// the webhook would have settled it. Idempotent on the reference.
#[utoipa::path(
    get,
    path = "/v1/payments/{reference}/verify",
    tag = "Fiat",
    params(("reference" = String, Path, description = "Processor payment reference")),
    responses(
        (status = 200, description = "Verification result", body = PaymentVerifyResponse),
        (status = 404, description = "Unknown user, wallet or bank account"),
        (status = 422, description = "Payment carries no user id"),
        (status = 502, description = "Processor rejected the call or settlement failed")
    )
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentVerifyResponse>, ApiError> {
    let details = state
        .paystack
        .verify_payment(&reference)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;

    if details.status != "success" || details.amount_kobo <= 0 {
        return Ok(Json(PaymentVerifyResponse {
            reference,
            status: details.status,
            settled: false,
            replayed: false,
        }));
    }

    let metadata = details.metadata.as_ref();
    let receipt = if let Some(intent) = metadata.and_then(|m| exchange_intent_from(m)) {
        state
            .orchestrator
            .swap_external_payment(
                &intent.user_id,
                intent.target_asset,
                details.amount_kobo,
                &reference,
            )
            .await
            .map_err(map_swap_error)?
    } else if let Some(user_id) = metadata.and_then(|m| credited_user_from(m)) {
        state
            .orchestrator
            .credit_external_payment(&user_id, details.amount_kobo, &reference, details.channel)
            .await
            .map_err(map_swap_error)?
    } else {
        return Err(ApiError::unprocessable(
            "confirmed payment carries no user id",
        ));
    };

    if !receipt.replayed {
        info!(reference = %reference, "Reconciled a confirmed payment");
    }
    Ok(Json(PaymentVerifyResponse {
        reference,
        status: details.status,
        settled: true,
        replayed: receipt.replayed,
    }))
}

/// Internal user-to-user fiat transfer.
#[utoipa::path(
    post,
    path = "/v1/transfers",
    tag = "Fiat",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer completed", body = TransferResponse),
        (status = 400, description = "Invalid amount or same-account transfer"),
        (status = 404, description = "Unknown sender or recipient"),
        (status = 422, description = "Insufficient balance")
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    if req.from_user_id == req.to_user_id {
        return Err(ApiError::bad_request("cannot transfer to the same account"));
    }
    let kobo = rates::to_kobo_floor(req.amount_ngn)
        .filter(|k| *k > 0)
        .ok_or_else(|| ApiError::bad_request("amount_ngn must be a positive NGN amount"))?;

    state
        .orchestrator
        .transfer_fiat(&req.from_user_id, &req.to_user_id, kobo)
        .await
        .map_err(map_swap_error)?;

    Ok(Json(TransferResponse {
        from_user_id: req.from_user_id,
        to_user_id: req.to_user_id,
        amount_kobo: kobo,
    }))
}
