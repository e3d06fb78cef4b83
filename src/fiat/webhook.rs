// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Paystack webhook authentication and envelope parsing.
//!
//! Every inbound webhook is authenticated by recomputing an HMAC-SHA512
//! over the raw payload with the shared secret and comparing it to the
//! `x-paystack-signature` header. Verification happens before any parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use crate::assets::Asset;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex-encoded HMAC signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Verify the webhook signature over the raw body.
///
/// Comparison is constant-time via HMAC verification.
pub fn verify_signature(secret: &str, raw_body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&signature).is_ok()
}

/// Inbound webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: WebhookData,
}

/// Payload common to the events this system consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub reference: Option<String>,
    /// Amount in minor units (kobo).
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<WebhookCustomer>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Present on transfer events.
    #[serde(default)]
    pub transfer_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

/// Exchange intent carried in `charge.success` metadata. When present, the
/// payment is a funded buy, not a plain balance credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeIntent {
    pub user_id: String,
    pub target_asset: Asset,
}

impl WebhookData {
    /// Parse the exchange intent out of the metadata bag, if any.
    pub fn exchange_intent(&self) -> Option<ExchangeIntent> {
        exchange_intent_from(self.metadata.as_ref()?)
    }

    /// The user id for plain balance credits, carried in metadata.
    pub fn credited_user_id(&self) -> Option<String> {
        credited_user_from(self.metadata.as_ref()?)
    }
}

/// Parse an exchange intent out of a payment metadata bag. Shared by the
/// webhook path and the verify-by-reference reconciliation path.
pub fn exchange_intent_from(metadata: &Value) -> Option<ExchangeIntent> {
    // `exchange_type` marks the payment as a buy.
    metadata.get("exchange_type").and_then(Value::as_str)?;
    let user_id = metadata
        .get("user_id")
        .and_then(Value::as_str)?
        .to_string();
    let target_asset = metadata
        .get("target_asset")
        .and_then(Value::as_str)
        .and_then(Asset::from_symbol)?;
    Some(ExchangeIntent {
        user_id,
        target_asset,
    })
}

/// The user id for plain balance credits, carried in metadata.
pub fn credited_user_from(metadata: &Value) -> Option<String> {
    metadata
        .get("user_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}
