// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! On-chain exchange integration.
//!
//! This module wraps the exchange vault contract behind a uniform
//! settlement interface:
//! - Admin-signed outbound transfers from the vault's pooled balance
//! - Deposit-event detection (token and native-asset variants)
//! - Address-format translation between EVM and ledger-native references

pub mod contract;
pub mod listener;
pub mod settlement;

pub use contract::IExchangeVault;
pub use listener::{DepositEvent, DepositListener, DepositSink};
pub use settlement::{
    contract_ref, ContractRef, ExchangeSettlement, SettlementError, SettlementLeg,
    SettlementOutcome,
};
