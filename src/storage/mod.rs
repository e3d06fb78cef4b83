// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Embedded Storage
//!
//! Persistence backed by redb (pure Rust, ACID). redb serializes write
//! transactions, which is what makes every balance mutation an atomic
//! read-modify-write: two concurrent debits can never both pass the
//! sufficient-balance check against a stale balance.
//!
//! ## Table Layout
//!
//! - `activities`: transaction_hash → serialized Activity (JSON bytes)
//! - `user_activity_index`: composite key (user_id|!timestamp|hash) → type
//! - `bank_accounts`: user_id → serialized BankAccount
//! - `wallet_refs`: user_id → serialized WalletLedgerRef
//! - `wallet_address_index`: lowercase EVM address → user_id
//! - `listener_state`: key → value bytes (deposit-listener checkpoint)

pub mod activity;
pub mod bank_ledger;
pub mod wallets;

pub use activity::{
    Activity, ActivityLedger, ActivityMetadata, ActivityStatus, ActivityType,
};
pub use bank_ledger::{BankAccount, BankLedger};
pub use wallets::{WalletDirectory, WalletLedgerRef};

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};

/// Deposit-listener checkpoint table: key → value bytes (u64 big-endian).
const LISTENER_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("listener_state");

/// Storage error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("activity {0} already recorded as success")]
    AlreadyRecorded(String),

    #[error("insufficient balance: have {balance_kobo} kobo, attempted {attempted_kobo} kobo")]
    InsufficientBalance {
        balance_kobo: i64,
        attempted_kobo: i64,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the embedded database.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Arc<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(activity::ACTIVITIES)?;
            let _ = write_txn.open_table(activity::USER_ACTIVITY_INDEX)?;
            let _ = write_txn.open_table(bank_ledger::BANK_ACCOUNTS)?;
            let _ = write_txn.open_table(wallets::WALLET_REFS)?;
            let _ = write_txn.open_table(wallets::WALLET_ADDRESS_INDEX)?;
            let _ = write_txn.open_table(LISTENER_STATE)?;
        }
        write_txn.commit()?;

        Ok(Arc::new(Self { db }))
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Last ledger block processed by the deposit listener.
    pub fn listener_checkpoint(&self, key: &str) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LISTENER_STATE)?;
        match table.get(key)? {
            Some(value) => {
                let bytes = value.value();
                if bytes.len() == 8 {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Ok(u64::from_be_bytes(buf))
                } else {
                    Ok(0)
                }
            }
            None => Ok(0),
        }
    }

    /// Persist the deposit-listener checkpoint.
    pub fn set_listener_checkpoint(&self, key: &str, block: u64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(LISTENER_STATE)?;
            table.insert(key, block.to_be_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Open a throwaway store in a temp directory. The TempDir must outlive
    /// the store handle.
    pub fn temp_store() -> (TempDir, Arc<Store>) {
        let dir = TempDir::new().expect("create temp dir");
        let store = Store::open(&dir.path().join("bridge.redb")).expect("open store");
        (dir, store)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_store;

    #[test]
    fn checkpoint_round_trips() {
        let (_dir, store) = temp_store();
        assert_eq!(store.listener_checkpoint("deposits").unwrap(), 0);
        store.set_listener_checkpoint("deposits", 4242).unwrap();
        assert_eq!(store.listener_checkpoint("deposits").unwrap(), 4242);
    }
}
