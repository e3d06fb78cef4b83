// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! NairaBridge - Naira⇄Token Exchange-Settlement Service
//!
//! This crate bridges three ledgers: a custodial on-chain exchange vault
//! (EVM-compatible, HBAR native), a Naira banking rail (Paystack), and an
//! append-only activity ledger, settling swaps between them with
//! exactly-once recording.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `oracle` - NGN rate snapshots from the upstream price feed
//! - `exchange` - Vault contract payouts and deposit-event listening
//! - `fiat` - Paystack integration and webhook verification
//! - `orchestrator` - Swap sagas with compensating actions
//! - `storage` - Embedded redb persistence (activities, balances, wallets)

pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod exchange;
pub mod fiat;
pub mod models;
pub mod oracle;
pub mod orchestrator;
pub mod rates;
pub mod state;
pub mod storage;
pub mod vault;
