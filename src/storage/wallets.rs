// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! On-chain wallet references.
//!
//! One record per user: the ledger account id, its derived EVM address and
//! the vault-encrypted signing key material. The account id and address are
//! immutable once registered (the address is a cryptographic derivation).
//! A reverse index from lowercase EVM address to user id serves deposit
//! event attribution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Store, StoreError, StoreResult};

/// Table: user_id → serialized WalletLedgerRef (JSON bytes).
pub(crate) const WALLET_REFS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallet_refs");

/// Index: lowercase EVM address → user_id.
pub(crate) const WALLET_ADDRESS_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("wallet_address_index");

/// Persisted reference to a user's on-chain ledger account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletLedgerRef {
    /// Owning user.
    pub user_id: String,
    /// Ledger-native account id (opaque string, e.g. `0.0.12345`).
    pub ledger_account_id: String,
    /// Derived EVM address, `0x`-prefixed.
    pub evm_address: String,
    /// Signing key material, encrypted by the key vault. Never exposed.
    pub encrypted_key: String,
    /// Whether the account has been activated on the ledger.
    pub is_activated: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Typed view over the wallet tables.
#[derive(Clone)]
pub struct WalletDirectory {
    store: Arc<Store>,
}

impl WalletDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Register a wallet reference. One per user; account id and address
    /// are immutable afterwards.
    pub fn register(&self, wallet: &WalletLedgerRef) -> StoreResult<()> {
        let json = serde_json::to_vec(wallet)?;
        let address_key = wallet.evm_address.to_lowercase();

        let write_txn = self.store.db().begin_write()?;
        {
            let mut refs = write_txn.open_table(WALLET_REFS)?;
            let exists = refs.get(wallet.user_id.as_str())?.is_some();
            if exists {
                return Err(StoreError::AlreadyExists(format!(
                    "wallet for user {}",
                    wallet.user_id
                )));
            }
            refs.insert(wallet.user_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(WALLET_ADDRESS_INDEX)?;
            index.insert(address_key.as_str(), wallet.user_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a user's wallet reference.
    pub fn get(&self, user_id: &str) -> StoreResult<Option<WalletLedgerRef>> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(WALLET_REFS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Deposit-event attribution: EVM address → user id.
    pub fn find_user_by_address(&self, evm_address: &str) -> StoreResult<Option<String>> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(WALLET_ADDRESS_INDEX)?;
        match table.get(evm_address.to_lowercase().as_str())? {
            Some(value) => Ok(Some(value.value().to_string())),
            None => Ok(None),
        }
    }

    /// Flip the activation flag after the ledger confirms the account.
    pub fn mark_activated(&self, user_id: &str) -> StoreResult<()> {
        let write_txn = self.store.db().begin_write()?;
        {
            let mut table = write_txn.open_table(WALLET_REFS)?;
            let mut wallet: WalletLedgerRef = match table.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("wallet for user {user_id}"))),
            };
            wallet.is_activated = true;
            let json = serde_json::to_vec(&wallet)?;
            table.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;

    fn sample(user: &str, address: &str) -> WalletLedgerRef {
        WalletLedgerRef {
            user_id: user.to_string(),
            ledger_account_id: "0.0.12345".to_string(),
            evm_address: address.to_string(),
            encrypted_key: "sealed".to_string(),
            is_activated: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn register_and_lookup_by_address() {
        let (_dir, store) = temp_store();
        let wallets = WalletDirectory::new(store);

        wallets
            .register(&sample("user-1", "0xAbC0000000000000000000000000000000000001"))
            .unwrap();

        // Address lookups are case-insensitive.
        let user = wallets
            .find_user_by_address("0xabc0000000000000000000000000000000000001")
            .unwrap();
        assert_eq!(user.as_deref(), Some("user-1"));

        let wallet = wallets.get("user-1").unwrap().unwrap();
        assert_eq!(wallet.ledger_account_id, "0.0.12345");
        assert!(!wallet.is_activated);
    }

    #[test]
    fn register_twice_is_rejected() {
        let (_dir, store) = temp_store();
        let wallets = WalletDirectory::new(store);

        wallets
            .register(&sample("user-1", "0x0000000000000000000000000000000000000001"))
            .unwrap();
        let err = wallets
            .register(&sample("user-1", "0x0000000000000000000000000000000000000002"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn mark_activated_flips_flag() {
        let (_dir, store) = temp_store();
        let wallets = WalletDirectory::new(store);

        wallets
            .register(&sample("user-1", "0x0000000000000000000000000000000000000001"))
            .unwrap();
        wallets.mark_activated("user-1").unwrap();
        assert!(wallets.get("user-1").unwrap().unwrap().is_activated);
    }
}
