// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Fiat rail integration (Paystack).
//!
//! Wraps the payment processor's customer / dedicated-account /
//! transfer-recipient / transfer primitives, with recipient-code caching
//! and sandbox bank-code fallback, plus webhook signature verification.

pub mod paystack;
pub mod recipients;
pub mod webhook;

pub use paystack::{
    CardPaymentInit, PaymentDetails, PaystackClient, PaystackError, TransferReceipt,
    VirtualAccountDetails,
};
pub use recipients::{FiatRail, PaystackRail};
pub use webhook::{verify_signature, ExchangeIntent, WebhookData, WebhookEnvelope};
