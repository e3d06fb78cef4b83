// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Paystack API client.
//!
//! Every call authenticates with the secret key as a bearer token. Paystack
//! wraps responses in a `{ status, message, data }` envelope; a `false`
//! status or a non-2xx response surfaces as [`PaystackError::Api`] — no
//! call ever reports "it probably worked".

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CURRENCY: &str = "NGN";
const PREFERRED_VIRTUAL_BANK: &str = "wema-bank";

/// Fiat rail failure.
#[derive(Debug, thiserror::Error)]
pub enum PaystackError {
    #[error("Paystack request failed: {0}")]
    Request(String),

    #[error("Paystack rejected the call: {0}")]
    Api(String),

    #[error("Paystack response was invalid: {0}")]
    InvalidResponse(String),
}

/// Provisioned dedicated virtual account.
#[derive(Debug, Clone)]
pub struct VirtualAccountDetails {
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
    pub bank_code: String,
}

/// Accepted outbound transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// Settlement-leg identifier for fiat payouts.
    pub transfer_code: String,
    /// Raw processor status (`success`, `pending`, `otp`).
    pub status: String,
}

/// Initialized card payment.
#[derive(Debug, Clone)]
pub struct CardPaymentInit {
    pub authorization_url: String,
    pub reference: String,
}

/// Verified payment details. Callers must check `status == "success"`
/// before crediting anything.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub status: String,
    pub amount_kobo: i64,
    pub currency: String,
    pub channel: Option<String>,
    pub paid_at: Option<String>,
    pub metadata: Option<Value>,
}

/// Paystack HTTP client.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    base_url: String,
    secret_key: String,
    http: Client,
}

impl PaystackClient {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, PaystackError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaystackError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            http,
        })
    }

    /// Idempotent create-or-fetch of a Paystack customer.
    pub async fn ensure_customer(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        phone: &str,
    ) -> Result<String, PaystackError> {
        // Fetch-by-email first; Paystack returns 404 for unknown customers.
        if let Ok(existing) = self.get_json(&format!("/customer/{email}")).await {
            if let Some(code) = existing.get("customer_code").and_then(Value::as_str) {
                return Ok(code.to_string());
            }
        }

        let payload = json!({
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
            "phone": phone,
        });
        let data = self.post_json("/customer", &payload).await?;
        data.get("customer_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PaystackError::InvalidResponse("missing customer_code in response".to_string())
            })
    }

    /// One-time provisioning of a dedicated virtual account. The existence
    /// check lives upstream; calling twice for the same customer fails
    /// loudly with the processor's error.
    pub async fn create_virtual_account(
        &self,
        customer_code: &str,
        bvn: Option<&str>,
    ) -> Result<VirtualAccountDetails, PaystackError> {
        let mut payload = json!({
            "customer": customer_code,
            "preferred_bank": PREFERRED_VIRTUAL_BANK,
        });
        if let Some(bvn) = bvn {
            payload["bvn"] = Value::String(bvn.to_string());
        }

        let data = self.post_json("/dedicated_account", &payload).await?;

        let account_number = extract_str(&data, "/account_number")?;
        let account_name = extract_str(&data, "/account_name")?;
        let bank_name = extract_str(&data, "/bank/name")?;
        let bank_code = data
            .pointer("/bank/id")
            .map(|v| v.to_string())
            .unwrap_or_default();

        Ok(VirtualAccountDetails {
            account_number,
            account_name,
            bank_name,
            bank_code,
        })
    }

    /// Create a payout recipient for a bank account.
    pub async fn create_transfer_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
    ) -> Result<String, PaystackError> {
        let payload = json!({
            "type": "nuban",
            "name": name,
            "account_number": account_number,
            "bank_code": bank_code,
            "currency": CURRENCY,
        });
        let data = self.post_json("/transferrecipient", &payload).await?;
        data.get("recipient_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PaystackError::InvalidResponse("missing recipient_code in response".to_string())
            })
    }

    /// Initiate a payout to a recipient. Amount is in kobo.
    pub async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount_kobo: i64,
        narration: &str,
    ) -> Result<TransferReceipt, PaystackError> {
        let payload = json!({
            "source": "balance",
            "amount": amount_kobo,
            "recipient": recipient_code,
            "reason": narration,
            "currency": CURRENCY,
        });

        info!(recipient = %recipient_code, amount_kobo, "Paystack: initiating transfer");
        let data = self.post_json("/transfer", &payload).await?;

        let transfer_code = data
            .get("transfer_code")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PaystackError::InvalidResponse("missing transfer_code in response".to_string())
            })?
            .to_string();
        let status = data
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_string();

        Ok(TransferReceipt {
            transfer_code,
            status,
        })
    }

    /// Initialize a card payment; the user completes it at the returned URL.
    pub async fn initialize_card_payment(
        &self,
        email: &str,
        amount_kobo: i64,
        metadata: Value,
    ) -> Result<CardPaymentInit, PaystackError> {
        let payload = json!({
            "email": email,
            "amount": amount_kobo,
            "currency": CURRENCY,
            "metadata": metadata,
        });
        let data = self.post_json("/transaction/initialize", &payload).await?;

        Ok(CardPaymentInit {
            authorization_url: extract_str(&data, "/authorization_url")?,
            reference: extract_str(&data, "/reference")?,
        })
    }

    /// Reconcile a card payment by reference.
    pub async fn verify_payment(&self, reference: &str) -> Result<PaymentDetails, PaystackError> {
        let data = self
            .get_json(&format!("/transaction/verify/{reference}"))
            .await?;

        Ok(PaymentDetails {
            status: extract_str(&data, "/status")?,
            amount_kobo: data.get("amount").and_then(Value::as_i64).unwrap_or(0),
            currency: data
                .get("currency")
                .and_then(Value::as_str)
                .unwrap_or(CURRENCY)
                .to_string(),
            channel: data
                .get("channel")
                .and_then(Value::as_str)
                .map(str::to_string),
            paid_at: data
                .get("paid_at")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data.get("metadata").cloned(),
        })
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, PaystackError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.secret_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| PaystackError::Request(e.to_string()))?;
        unwrap_envelope(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, PaystackError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaystackError::Request(e.to_string()))?;
        unwrap_envelope(response).await
    }
}

/// Unwrap the `{ status, message, data }` envelope, failing on either a
/// non-2xx response or `status: false`.
async fn unwrap_envelope(response: reqwest::Response) -> Result<Value, PaystackError> {
    let http_status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PaystackError::InvalidResponse(e.to_string()))?;

    let ok = body.get("status").and_then(Value::as_bool).unwrap_or(false);
    if !http_status.is_success() || !ok {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(PaystackError::Api(format!("{http_status}: {message}")));
    }

    Ok(body.get("data").cloned().unwrap_or(Value::Null))
}

fn extract_str(data: &Value, pointer: &str) -> Result<String, PaystackError> {
    data.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PaystackError::InvalidResponse(format!("missing {pointer} in response")))
}
