// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Inbound Paystack webhook.
//!
//! The signature is verified over the raw body before any parsing. A bad
//! or missing signature is the only 401; every other outcome returns 200
//! so the processor does not retry events that failed for internal
//! reasons — those are logged and reconciled out of band.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{info, warn};

use crate::{
    error::ApiError,
    fiat::webhook::{verify_signature, WebhookEnvelope, SIGNATURE_HEADER},
    state::AppState,
};

/// Receive and settle a Paystack webhook event.
#[utoipa::path(
    post,
    path = "/webhook/paystack",
    tag = "Webhooks",
    request_body = String,
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Invalid webhook signature")
    )
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing webhook signature"))?;

    if !verify_signature(&state.webhook_secret, &body, signature) {
        warn!("Webhook rejected: signature mismatch");
        return Err(ApiError::unauthorized("invalid webhook signature"));
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Webhook carried an unparseable payload");
            return Ok(StatusCode::OK);
        }
    };

    match envelope.event.as_str() {
        "charge.success" => handle_charge_success(&state, &envelope).await,
        "transfer.success" | "transfer.failed" | "transfer.reversed" => {
            info!(
                event = %envelope.event,
                transfer_code = envelope.data.transfer_code.as_deref().unwrap_or(""),
                "Transfer status event"
            );
        }
        "dedicatedaccount.assign.success" | "dedicatedaccount.assign.failed" => {
            info!(event = %envelope.event, "Virtual account assignment event");
        }
        other => {
            info!(event = %other, "Ignoring unhandled webhook event");
        }
    }

    Ok(StatusCode::OK)
}

/// Settle a confirmed payment: a buy when the metadata carries an exchange
/// intent, a plain balance credit otherwise.
async fn handle_charge_success(state: &AppState, envelope: &WebhookEnvelope) {
    let data = &envelope.data;
    let Some(reference) = data.reference.as_deref() else {
        warn!("charge.success without a reference, skipping");
        return;
    };
    if data.amount <= 0 {
        warn!(reference = %reference, "charge.success with non-positive amount, skipping");
        return;
    }

    if let Some(intent) = data.exchange_intent() {
        match state
            .orchestrator
            .swap_external_payment(&intent.user_id, intent.target_asset, data.amount, reference)
            .await
        {
            Ok(receipt) if receipt.replayed => {
                info!(reference = %reference, "Payment already settled, skipping");
            }
            Ok(_) => {
                info!(
                    reference = %reference,
                    user_id = %intent.user_id,
                    target = %intent.target_asset,
                    "Webhook-funded buy settled"
                );
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Webhook-funded buy failed");
            }
        }
        return;
    }

    let Some(user_id) = data.credited_user_id() else {
        warn!(reference = %reference, "charge.success without a user id, skipping");
        return;
    };
    match state
        .orchestrator
        .credit_external_payment(&user_id, data.amount, reference, data.channel.clone())
        .await
    {
        Ok(receipt) if receipt.replayed => {
            info!(reference = %reference, "Credit already recorded, skipping");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(reference = %reference, error = %e, "Failed to credit confirmed payment");
        }
    }
}
