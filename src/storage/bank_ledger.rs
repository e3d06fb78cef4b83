// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Fiat-side balance ledger.
//!
//! Balances are integer kobo. Every mutation — credit, conditional debit,
//! refund, peer transfer — runs inside a single redb write transaction, so
//! the sufficient-balance check and the write commit as one atomic unit at
//! every call site. The balance can never go negative.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Store, StoreError, StoreResult};

/// Table: user_id → serialized BankAccount (JSON bytes).
pub(crate) const BANK_ACCOUNTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("bank_accounts");

/// Persisted fiat bank-account record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BankAccount {
    /// Owning user.
    pub user_id: String,
    /// Balance in kobo. Never negative.
    pub balance_kobo: i64,
    /// Paystack customer code.
    pub customer_code: String,
    /// Dedicated virtual account number.
    pub account_number: String,
    /// Account holder name as provisioned.
    pub account_name: String,
    /// Bank name of the virtual account.
    pub bank_name: String,
    /// Bank code used for payout recipients.
    pub bank_code: String,
    /// Cached payout recipient code, created lazily on first payout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_code: Option<String>,
    /// Provisioning time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl BankAccount {
    /// Fresh zero-balance account.
    pub fn new(
        user_id: String,
        customer_code: String,
        account_number: String,
        account_name: String,
        bank_name: String,
        bank_code: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance_kobo: 0,
            customer_code,
            account_number,
            account_name,
            bank_name,
            bank_code,
            recipient_code: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Typed view over the bank-account table.
#[derive(Clone)]
pub struct BankLedger {
    store: Arc<Store>,
}

impl BankLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Provision a new account. One per user.
    pub fn create(&self, account: &BankAccount) -> StoreResult<()> {
        let json = serde_json::to_vec(account)?;
        let write_txn = self.store.db().begin_write()?;
        {
            let mut table = write_txn.open_table(BANK_ACCOUNTS)?;
            let exists = table.get(account.user_id.as_str())?.is_some();
            if exists {
                return Err(StoreError::AlreadyExists(format!(
                    "bank account for user {}",
                    account.user_id
                )));
            }
            table.insert(account.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a user's account.
    pub fn get(&self, user_id: &str) -> StoreResult<Option<BankAccount>> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(BANK_ACCOUNTS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Credit a deposit or refund. Returns the new balance.
    pub fn credit(&self, user_id: &str, amount_kobo: i64) -> StoreResult<i64> {
        self.mutate(user_id, |account| {
            account.balance_kobo = account.balance_kobo.saturating_add(amount_kobo);
            Ok(())
        })
    }

    /// Atomic conditional debit: rejects (with the current balance) when the
    /// account would go negative, before any side effect. Returns the new
    /// balance on success.
    pub fn debit_if_sufficient(&self, user_id: &str, amount_kobo: i64) -> StoreResult<i64> {
        self.mutate(user_id, |account| {
            if account.balance_kobo < amount_kobo {
                return Err(StoreError::InsufficientBalance {
                    balance_kobo: account.balance_kobo,
                    attempted_kobo: amount_kobo,
                });
            }
            account.balance_kobo -= amount_kobo;
            Ok(())
        })
    }

    /// Peer transfer: debit sender, credit recipient, one write transaction.
    /// Both commit or neither does.
    pub fn transfer(&self, from_user: &str, to_user: &str, amount_kobo: i64) -> StoreResult<()> {
        if from_user == to_user {
            return Err(StoreError::AlreadyExists(
                "cannot transfer to the same account".to_string(),
            ));
        }
        let write_txn = self.store.db().begin_write()?;
        {
            let mut table = write_txn.open_table(BANK_ACCOUNTS)?;

            let mut sender: BankAccount = match table.get(from_user)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("bank account {from_user}"))),
            };
            let mut recipient: BankAccount = match table.get(to_user)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("bank account {to_user}"))),
            };

            if sender.balance_kobo < amount_kobo {
                return Err(StoreError::InsufficientBalance {
                    balance_kobo: sender.balance_kobo,
                    attempted_kobo: amount_kobo,
                });
            }

            let now = Utc::now();
            sender.balance_kobo -= amount_kobo;
            sender.updated_at = now;
            recipient.balance_kobo += amount_kobo;
            recipient.updated_at = now;

            let sender_json = serde_json::to_vec(&sender)?;
            let recipient_json = serde_json::to_vec(&recipient)?;
            table.insert(from_user, sender_json.as_slice())?;
            table.insert(to_user, recipient_json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Cache the lazily created payout recipient code.
    pub fn set_recipient_code(&self, user_id: &str, recipient_code: &str) -> StoreResult<()> {
        self.mutate(user_id, |account| {
            account.recipient_code = Some(recipient_code.to_string());
            Ok(())
        })?;
        Ok(())
    }

    /// Read-modify-write inside one write transaction.
    fn mutate(
        &self,
        user_id: &str,
        apply: impl FnOnce(&mut BankAccount) -> StoreResult<()>,
    ) -> StoreResult<i64> {
        let write_txn = self.store.db().begin_write()?;
        let balance;
        {
            let mut table = write_txn.open_table(BANK_ACCOUNTS)?;
            let mut account: BankAccount = match table.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("bank account {user_id}"))),
            };
            apply(&mut account)?;
            account.updated_at = Utc::now();
            balance = account.balance_kobo;
            let json = serde_json::to_vec(&account)?;
            table.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(balance)
    }
}
