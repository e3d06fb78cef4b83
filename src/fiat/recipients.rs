// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Payout recipient resolution with caching and sandbox fallback.
//!
//! Recipient codes are created lazily on the first payout for a user, then
//! cached in the bank-account record and an in-process LRU. Sandbox
//! virtual accounts carry bank codes the transfer API does not accept;
//! creation failures fall back to a small fixed list of known-good sandbox
//! bank code / account number pairs before giving up.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use tracing::{info, warn};

use crate::storage::{BankAccount, BankLedger};

use super::paystack::{PaystackClient, PaystackError, TransferReceipt};

/// Known-good sandbox bank code / account number pairs.
const SANDBOX_FALLBACK_BANKS: &[(&str, &str)] = &[
    ("057", "0000000000"), // Zenith test bank
    ("058", "0000000000"), // GTBank test bank
    ("044", "0000000000"), // Access test bank
];

const RECIPIENT_CACHE_CAPACITY: usize = 256;

/// The fiat payout seam the orchestrator settles through.
#[async_trait]
pub trait FiatRail: Send + Sync {
    /// Lazily create (and cache) the payout recipient for a bank account.
    async fn ensure_transfer_recipient(
        &self,
        account: &BankAccount,
    ) -> Result<String, PaystackError>;

    /// Execute a payout. Amount is in kobo.
    async fn pay_out(
        &self,
        recipient_code: &str,
        amount_kobo: i64,
        narration: &str,
    ) -> Result<TransferReceipt, PaystackError>;
}

/// Production fiat rail: Paystack client plus recipient caching.
pub struct PaystackRail {
    client: PaystackClient,
    bank_ledger: BankLedger,
    cache: Mutex<LruCache<String, String>>,
}

impl PaystackRail {
    pub fn new(client: PaystackClient, bank_ledger: BankLedger) -> Self {
        Self {
            client,
            bank_ledger,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(RECIPIENT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn cached(&self, user_id: &str) -> Option<String> {
        self.cache.lock().ok()?.get(user_id).cloned()
    }

    fn remember(&self, user_id: &str, code: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(user_id.to_string(), code.to_string());
        }
    }

    /// Create the recipient, trying the account's own bank first and the
    /// sandbox fallback list on failure.
    async fn create_with_fallback(&self, account: &BankAccount) -> Result<String, PaystackError> {
        let attempt = self
            .client
            .create_transfer_recipient(
                &account.account_name,
                &account.account_number,
                &account.bank_code,
            )
            .await;

        match attempt {
            Ok(code) => Ok(code),
            Err(primary_err) => {
                warn!(
                    user_id = %account.user_id,
                    error = %primary_err,
                    "Recipient creation failed, trying sandbox fallback banks"
                );
                for (bank_code, account_number) in SANDBOX_FALLBACK_BANKS {
                    match self
                        .client
                        .create_transfer_recipient(
                            &account.account_name,
                            account_number,
                            bank_code,
                        )
                        .await
                    {
                        Ok(code) => {
                            info!(
                                user_id = %account.user_id,
                                bank_code = %bank_code,
                                "Created recipient via sandbox fallback bank"
                            );
                            return Ok(code);
                        }
                        Err(e) => {
                            warn!(bank_code = %bank_code, error = %e, "Fallback bank rejected");
                        }
                    }
                }
                Err(primary_err)
            }
        }
    }
}

#[async_trait]
impl FiatRail for PaystackRail {
    async fn ensure_transfer_recipient(
        &self,
        account: &BankAccount,
    ) -> Result<String, PaystackError> {
        if let Some(code) = self.cached(&account.user_id) {
            return Ok(code);
        }
        if let Some(code) = &account.recipient_code {
            self.remember(&account.user_id, code);
            return Ok(code.clone());
        }

        let code = self.create_with_fallback(account).await?;

        if let Err(e) = self.bank_ledger.set_recipient_code(&account.user_id, &code) {
            warn!(user_id = %account.user_id, error = %e, "Failed to persist recipient code");
        }
        self.remember(&account.user_id, &code);
        Ok(code)
    }

    async fn pay_out(
        &self,
        recipient_code: &str,
        amount_kobo: i64,
        narration: &str,
    ) -> Result<TransferReceipt, PaystackError> {
        self.client
            .initiate_transfer(recipient_code, amount_kobo, narration)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;
    use chrono::Utc;

    fn account(user: &str, recipient_code: Option<&str>) -> BankAccount {
        BankAccount {
            user_id: user.to_string(),
            balance_kobo: 0,
            customer_code: "CUS_1".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "Test User".to_string(),
            bank_name: "Wema Bank".to_string(),
            bank_code: "035".to_string(),
            recipient_code: recipient_code.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn persisted_recipient_code_is_reused_without_api_calls() {
        let (_dir, store) = temp_store();
        // Client pointed at a dead endpoint: any real call would error.
        let client = PaystackClient::new("http://127.0.0.1:1", "sk_test_x").unwrap();
        let rail = PaystackRail::new(client, BankLedger::new(store));

        let code = rail
            .ensure_transfer_recipient(&account("user-1", Some("RCP_cached")))
            .await
            .unwrap();
        assert_eq!(code, "RCP_cached");

        // Second resolution hits the LRU.
        assert_eq!(rail.cached("user-1").as_deref(), Some("RCP_cached"));
    }

    #[test]
    fn fallback_bank_list_is_nonempty() {
        assert!(!SANDBOX_FALLBACK_BANKS.is_empty());
        for (code, number) in SANDBOX_FALLBACK_BANKS {
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_eq!(number.len(), 10);
        }
    }
}
