// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

use std::sync::Arc;

use crate::fiat::PaystackClient;
use crate::oracle::PriceOracle;
use crate::orchestrator::ExchangeOrchestrator;
use crate::storage::{ActivityLedger, BankLedger, WalletDirectory};
use crate::vault::KeyVault;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub oracle: Arc<PriceOracle>,
    pub orchestrator: Arc<ExchangeOrchestrator>,
    pub activities: ActivityLedger,
    pub bank_ledger: BankLedger,
    pub wallets: WalletDirectory,
    pub paystack: PaystackClient,
    pub vault: Arc<dyn KeyVault>,
    /// Shared secret verifying inbound webhook signatures.
    pub webhook_secret: String,
}
