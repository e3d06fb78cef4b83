// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Append-only activity ledger.
//!
//! Every settlement attempt is recorded here, keyed by its settlement-leg
//! identifier (on-chain tx id or fiat transfer code/reference). The ledger
//! doubles as the idempotency guard: a `success` record for a transaction
//! hash means that real-world event has been fully processed and must never
//! be processed again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Store, StoreError, StoreResult};

/// Primary table: transaction_hash → serialized Activity (JSON bytes).
pub(crate) const ACTIVITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("activities");

/// Index: composite key → activity type string.
/// Key format: `user_id|!timestamp_be|transaction_hash` for newest-first scans.
pub(crate) const USER_ACTIVITY_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("user_activity_index");

/// Category of a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Swap,
    Transfer,
    Stake,
    Invest,
    Withdrawal,
}

impl ActivityType {
    fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Swap => "swap",
            ActivityType::Transfer => "transfer",
            ActivityType::Stake => "stake",
            ActivityType::Invest => "invest",
            ActivityType::Withdrawal => "withdrawal",
        }
    }

    fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "swap" => Some(ActivityType::Swap),
            "transfer" => Some(ActivityType::Transfer),
            "stake" => Some(ActivityType::Stake),
            "invest" => Some(ActivityType::Invest),
            "withdrawal" => Some(ActivityType::Withdrawal),
            _ => None,
        }
    }
}

/// Terminality: `Pending` may move to `Success` or `Failed`; terminal
/// records never move backward, and `Success` records are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    Success,
    Failed,
}

/// Typed per-direction audit detail, replacing a free-form metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityMetadata {
    /// Token deposit cashed out to the fiat ledger.
    TokenToFiat {
        deposit_tx: String,
        fiat_kobo: i64,
        rate: Decimal,
        transfer_code: Option<String>,
    },
    /// HBAR deposit cashed out to the fiat ledger.
    HbarToFiat {
        deposit_tx: String,
        fiat_kobo: i64,
        rate: Decimal,
        transfer_code: Option<String>,
    },
    /// Fiat spent for a token payout.
    FiatToToken {
        reference: Option<String>,
        token_amount: String,
        rate: Decimal,
        debited_kobo: Option<i64>,
    },
    /// Fiat spent for an HBAR payout.
    FiatToHbar {
        reference: Option<String>,
        hbar_amount: String,
        rate: Decimal,
        debited_kobo: Option<i64>,
    },
    /// Token deposit swapped into a different token.
    TokenToToken {
        deposit_tx: String,
        output_amount: String,
        rate: Decimal,
    },
    /// Plain fiat balance credit from a confirmed payment.
    FiatDeposit {
        reference: String,
        channel: Option<String>,
    },
    /// Internal user-to-user fiat transfer.
    PeerTransfer { counterparty: String, sent: bool },
}

/// One recorded settlement attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    /// Owning user.
    pub user_id: String,
    /// Category.
    pub activity_type: ActivityType,
    /// Source-asset-denominated amount, string-encoded decimal.
    pub amount: String,
    /// Source asset symbol (`"NGN"` denotes the fiat ledger).
    pub from_token: String,
    /// Target asset symbol.
    pub to_token: String,
    /// Settlement-leg identifier; the natural idempotency key.
    pub transaction_hash: String,
    /// Outcome.
    pub status: ActivityStatus,
    /// Per-direction audit detail.
    pub metadata: ActivityMetadata,
    /// Record time.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Format: `user_id | inverted_timestamp_be_bytes | transaction_hash`.
/// The inverted timestamp yields newest-first ordering on forward scans.
fn make_index_key(user_id: &str, timestamp: i64, tx_hash: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1 + 8 + 1 + tx_hash.len());
    key.extend_from_slice(user_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

fn make_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

fn make_prefix_end(user_id: &str) -> Vec<u8> {
    let mut end = make_prefix(user_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// ActivityLedger
// =============================================================================

/// Append-only view over the activity tables.
#[derive(Clone)]
pub struct ActivityLedger {
    store: Arc<Store>,
}

impl ActivityLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append an activity.
    ///
    /// An existing `success` record for the same transaction hash is
    /// immutable: attempting to record over it fails with
    /// [`StoreError::AlreadyRecorded`]. A prior `pending` or `failed`
    /// record is superseded (a new attempt for the same leg).
    pub fn record(&self, activity: &Activity) -> StoreResult<()> {
        let json = serde_json::to_vec(activity)?;
        let timestamp = activity.created_at.timestamp();

        let write_txn = self.store.db().begin_write()?;
        {
            let mut activities = write_txn.open_table(ACTIVITIES)?;

            let superseded = match activities.get(activity.transaction_hash.as_str())? {
                Some(existing) => {
                    let existing: Activity = serde_json::from_slice(existing.value())?;
                    if existing.status == ActivityStatus::Success {
                        return Err(StoreError::AlreadyRecorded(
                            activity.transaction_hash.clone(),
                        ));
                    }
                    Some(existing)
                }
                None => None,
            };

            activities.insert(activity.transaction_hash.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(USER_ACTIVITY_INDEX)?;
            if let Some(old) = superseded {
                // The superseded attempt's index entry keys on its own
                // timestamp; remove it so the activity stays one row.
                let old_key = make_index_key(
                    &old.user_id,
                    old.created_at.timestamp(),
                    &old.transaction_hash,
                );
                index.remove(old_key.as_slice())?;
            }
            let key = make_index_key(&activity.user_id, timestamp, &activity.transaction_hash);
            index.insert(key.as_slice(), activity.activity_type.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The idempotency check: look up a record by settlement-leg identifier.
    pub fn find_by_transaction_hash(&self, tx_hash: &str) -> StoreResult<Option<Activity>> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(ACTIVITIES)?;
        match table.get(tx_hash)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// True when the event behind `tx_hash` has already fully settled.
    pub fn already_settled(&self, tx_hash: &str) -> StoreResult<Option<Activity>> {
        Ok(self
            .find_by_transaction_hash(tx_hash)?
            .filter(|a| a.status == ActivityStatus::Success))
    }

    /// Newest-first paginated listing. `page` is 1-based.
    ///
    /// Returns `(activities, total_matching)`.
    pub fn list_for_user(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
        type_filter: Option<ActivityType>,
    ) -> StoreResult<(Vec<Activity>, usize)> {
        let read_txn = self.store.db().begin_read()?;
        let index = read_txn.open_table(USER_ACTIVITY_INDEX)?;
        let activities = read_txn.open_table(ACTIVITIES)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut hashes = Vec::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, type_str) = {
                let entry = entry?;
                (entry.0.value().to_vec(), entry.1.value().to_string())
            };
            if let Some(filter) = type_filter {
                match ActivityType::from_str(&type_str) {
                    Some(t) if t == filter => {}
                    _ => continue,
                }
            }
            // Hash is everything after the second separator.
            if let Some(hash) = split_index_key(&key) {
                hashes.push(hash);
            }
        }

        let total = hashes.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(limit);

        let mut results = Vec::new();
        for hash in hashes.into_iter().skip(start).take(limit) {
            if let Some(value) = activities.get(hash.as_str())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok((results, total))
    }

    /// Per-type counts for a user.
    pub fn stats(&self, user_id: &str) -> StoreResult<HashMap<ActivityType, u64>> {
        let read_txn = self.store.db().begin_read()?;
        let index = read_txn.open_table(USER_ACTIVITY_INDEX)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut counts = HashMap::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            if let Some(activity_type) = ActivityType::from_str(entry.1.value()) {
                *counts.entry(activity_type).or_insert(0u64) += 1;
            }
        }
        Ok(counts)
    }
}

/// Extract the transaction hash from a composite index key.
fn split_index_key(key: &[u8]) -> Option<String> {
    let first = key.iter().position(|&b| b == b'|')?;
    // 8 timestamp bytes follow, then the second separator.
    let hash_start = first + 1 + 8 + 1;
    if key.len() <= hash_start {
        return None;
    }
    String::from_utf8(key[hash_start..].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_store;
    use rust_decimal_macros::dec;

    fn sample(user: &str, hash: &str, status: ActivityStatus) -> Activity {
        Activity {
            user_id: user.to_string(),
            activity_type: ActivityType::Swap,
            amount: "10".to_string(),
            from_token: "USDC".to_string(),
            to_token: "NGN".to_string(),
            transaction_hash: hash.to_string(),
            status,
            metadata: ActivityMetadata::TokenToFiat {
                deposit_tx: hash.to_string(),
                fiat_kobo: 1_650_000,
                rate: dec!(1650),
                transfer_code: Some("TRF_1".to_string()),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn record_and_find_by_hash() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        let activity = sample("user-1", "0xabc", ActivityStatus::Success);
        ledger.record(&activity).unwrap();

        let found = ledger.find_by_transaction_hash("0xabc").unwrap().unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.status, ActivityStatus::Success);
        assert!(ledger.find_by_transaction_hash("0xdef").unwrap().is_none());
    }

    #[test]
    fn success_records_are_immutable() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        ledger
            .record(&sample("user-1", "ref123", ActivityStatus::Success))
            .unwrap();

        let err = ledger
            .record(&sample("user-1", "ref123", ActivityStatus::Failed))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRecorded(_)));
    }

    #[test]
    fn pending_record_can_move_to_terminal() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        ledger
            .record(&sample("user-1", "0xaaa", ActivityStatus::Pending))
            .unwrap();
        ledger
            .record(&sample("user-1", "0xaaa", ActivityStatus::Success))
            .unwrap();

        let found = ledger.find_by_transaction_hash("0xaaa").unwrap().unwrap();
        assert_eq!(found.status, ActivityStatus::Success);
    }

    #[test]
    fn failed_attempt_can_be_retried_to_success() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        ledger
            .record(&sample("user-1", "0xbbb", ActivityStatus::Failed))
            .unwrap();
        ledger
            .record(&sample("user-1", "0xbbb", ActivityStatus::Success))
            .unwrap();

        let found = ledger.already_settled("0xbbb").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn superseding_replaces_the_index_entry() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        let mut failed = sample("user-1", "0xddd", ActivityStatus::Failed);
        failed.created_at = Utc::now() - chrono::Duration::seconds(30);
        ledger.record(&failed).unwrap();
        ledger
            .record(&sample("user-1", "0xddd", ActivityStatus::Success))
            .unwrap();

        let (listed, total) = ledger.list_for_user("user-1", 1, 10, None).unwrap();
        assert_eq!(total, 1);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ActivityStatus::Success);

        let stats = ledger.stats("user-1").unwrap();
        assert_eq!(stats.get(&ActivityType::Swap), Some(&1));
    }

    #[test]
    fn already_settled_ignores_non_success() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        ledger
            .record(&sample("user-1", "0xccc", ActivityStatus::Failed))
            .unwrap();
        assert!(ledger.already_settled("0xccc").unwrap().is_none());
    }

    #[test]
    fn list_is_newest_first_and_paginated() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        for i in 0..5 {
            let mut a = sample("user-1", &format!("0x{i}"), ActivityStatus::Success);
            a.created_at = Utc::now() - chrono::Duration::seconds(100 - i as i64);
            ledger.record(&a).unwrap();
        }
        // Another user's record must not leak in.
        ledger
            .record(&sample("user-2", "0xother", ActivityStatus::Success))
            .unwrap();

        let (page1, total) = ledger.list_for_user("user-1", 1, 2, None).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        // Newest first: the most recent timestamp is 0x4.
        assert_eq!(page1[0].transaction_hash, "0x4");

        let (page3, _) = ledger.list_for_user("user-1", 3, 2, None).unwrap();
        assert_eq!(page3.len(), 1);
    }

    #[test]
    fn list_honors_type_filter_and_stats_count_by_type() {
        let (_dir, store) = temp_store();
        let ledger = ActivityLedger::new(store);

        ledger
            .record(&sample("user-1", "0x1", ActivityStatus::Success))
            .unwrap();
        let mut transfer = sample("user-1", "0x2", ActivityStatus::Success);
        transfer.activity_type = ActivityType::Transfer;
        transfer.metadata = ActivityMetadata::PeerTransfer {
            counterparty: "user-2".to_string(),
            sent: true,
        };
        ledger.record(&transfer).unwrap();

        let (swaps, total) = ledger
            .list_for_user("user-1", 1, 10, Some(ActivityType::Swap))
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(swaps[0].activity_type, ActivityType::Swap);

        let stats = ledger.stats("user-1").unwrap();
        assert_eq!(stats.get(&ActivityType::Swap), Some(&1));
        assert_eq!(stats.get(&ActivityType::Transfer), Some(&1));
    }
}
