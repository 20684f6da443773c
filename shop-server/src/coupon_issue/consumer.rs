//! Issue consumer (批量落库)
//!
//! Periodically drains every registered coupon's queue into `user_coupon`
//! rows. Safe to run on several instances at once: the pop hands each
//! record to one consumer, and pairs that already have a row are skipped.

use super::keys;
use super::kv::KvStore;
use super::record::AdmissionRecord;
use crate::core::{ShopError, ShopResult};
use crate::db::repository::{coupon, user_coupon};
use crate::db::with_fresh_tx;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default records popped per coupon per pass
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default failed persistence attempts before a record is dead-lettered
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub popped: usize,
    pub inserted: u64,
    /// Records whose (user, coupon) pair already had a row
    pub skipped: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl DrainReport {
    pub fn is_idle(&self) -> bool {
        self.popped == 0
    }
}

#[derive(Clone)]
pub struct IssueConsumer {
    pool: SqlitePool,
    kv: Arc<dyn KvStore>,
    batch_size: usize,
    max_attempts: u32,
}

impl IssueConsumer {
    pub fn new(pool: SqlitePool, kv: Arc<dyn KvStore>, batch_size: usize, max_attempts: u32) -> Self {
        Self {
            pool,
            kv,
            batch_size: batch_size.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `drain_once` every `period` until `shutdown` fires
    pub async fn run(self, period: Duration, shutdown: CancellationToken) {
        tracing::info!(
            period_ms = period.as_millis() as u64,
            batch_size = self.batch_size,
            "Issue consumer started"
        );
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Issue consumer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.drain_once().await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => tracing::debug!(?report, "Issue consumer pass"),
                        Err(e) => tracing::error!(error = %e, "Issue consumer pass failed"),
                    }
                }
            }
        }
    }

    /// One pass over every registered coupon
    pub async fn drain_once(&self) -> ShopResult<DrainReport> {
        let mut report = DrainReport::default();
        for raw_id in self.kv.set_members(keys::COUPON_REGISTRY).await? {
            let Ok(coupon_id) = raw_id.parse::<i64>() else {
                tracing::warn!(member = %raw_id, "Ignoring malformed coupon registry entry");
                continue;
            };
            if let Err(e) = self.drain_coupon(coupon_id, &mut report).await {
                tracing::error!(coupon_id, error = %e, "Failed to drain coupon queue");
            }
        }
        Ok(report)
    }

    async fn drain_coupon(&self, coupon_id: i64, report: &mut DrainReport) -> ShopResult<()> {
        let queue_key = keys::queue(coupon_id);
        let raw = self.kv.list_pop(&queue_key, self.batch_size).await?;
        if raw.is_empty() {
            return Ok(());
        }
        report.popped += raw.len();

        let mut groups: BTreeMap<i64, Vec<AdmissionRecord>> = BTreeMap::new();
        for entry in raw {
            match AdmissionRecord::decode(&entry) {
                Ok(record) => groups.entry(record.coupon_id).or_default().push(record),
                Err(e) => {
                    tracing::error!(coupon_id, error = %e, raw = %entry, "Undecodable admission record, dead-lettering");
                    self.kv
                        .list_push(&keys::dead_letter(coupon_id), &[entry])
                        .await?;
                    report.dead_lettered += 1;
                }
            }
        }

        for (group_coupon_id, records) in groups {
            match self.persist_group(group_coupon_id, &records).await {
                Ok((inserted, skipped)) => {
                    report.inserted += inserted;
                    report.skipped += skipped;
                    if inserted > 0 {
                        tracing::info!(coupon_id = group_coupon_id, inserted, skipped, "Issued coupons persisted");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        coupon_id = group_coupon_id,
                        count = records.len(),
                        error = %e,
                        "Failed to persist admission group, re-queueing"
                    );
                    self.requeue(group_coupon_id, records, report).await?;
                }
            }
        }
        Ok(())
    }

    /// Insert rows for users that do not have one yet and bump `issued_quantity`
    /// by the number inserted, all in one transaction. The coupon refuses the
    /// whole group if it would pass its total quantity.
    async fn persist_group(&self, coupon_id: i64, records: &[AdmissionRecord]) -> ShopResult<(u64, usize)> {
        let user_ids: Vec<i64> = records
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let duplicates_in_batch = records.len() - user_ids.len();

        let (inserted, existing) = with_fresh_tx::<_, ShopError, _>(&self.pool, move |conn| {
            Box::pin(async move {
                let mut target = coupon::find_by_id(&mut *conn, coupon_id)
                    .await?
                    .ok_or(ShopError::not_found("coupon", coupon_id))?;
                let existing = user_coupon::existing_user_ids(&mut *conn, coupon_id, &user_ids).await?;
                let fresh: Vec<i64> = user_ids
                    .into_iter()
                    .filter(|id| !existing.contains(id))
                    .collect();
                if !fresh.is_empty() {
                    target.issue(fresh.len() as i64)?;
                }

                let inserted =
                    user_coupon::insert_issued(&mut *conn, coupon_id, &fresh, shared::util::now_millis())
                        .await?;
                if inserted > 0 {
                    coupon::add_issued_quantity(&mut *conn, coupon_id, inserted as i64).await?;
                }
                Ok((inserted, existing.len()))
            })
        })
        .await?;

        Ok((inserted, existing + duplicates_in_batch))
    }

    /// Put the whole group back with one more attempt; records past the
    /// attempt limit go to the dead-letter list instead.
    async fn requeue(
        &self,
        coupon_id: i64,
        records: Vec<AdmissionRecord>,
        report: &mut DrainReport,
    ) -> ShopResult<()> {
        let mut retry = Vec::new();
        let mut dead = Vec::new();
        for record in records {
            let next = record.retried();
            let encoded = next.encode()?;
            if next.attempts >= self.max_attempts {
                tracing::error!(
                    user_id = next.user_id,
                    coupon_id,
                    attempts = next.attempts,
                    "Max delivery attempts exceeded, moving to dead letter queue"
                );
                dead.push(encoded);
            } else {
                retry.push(encoded);
            }
        }

        if !retry.is_empty() {
            self.kv.list_push(&keys::queue(coupon_id), &retry).await?;
            report.requeued += retry.len();
        }
        if !dead.is_empty() {
            self.kv.list_push(&keys::dead_letter(coupon_id), &dead).await?;
            report.dead_lettered += dead.len();
        }
        Ok(())
    }

    /// Move dead-lettered records of `coupon_id` back onto its queue with a
    /// fresh attempt budget; returns how many were moved.
    pub async fn recover_dead_letters(&self, coupon_id: i64) -> ShopResult<usize> {
        let dead_key = keys::dead_letter(coupon_id);
        let mut moved = 0;
        loop {
            let batch = self.kv.list_pop(&dead_key, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let mut revived = Vec::with_capacity(batch.len());
            for raw in batch {
                match AdmissionRecord::decode(&raw) {
                    Ok(record) => revived.push(
                        AdmissionRecord {
                            attempts: 0,
                            ..record
                        }
                        .encode()?,
                    ),
                    Err(e) => tracing::warn!(coupon_id, error = %e, "Dropping undecodable dead letter"),
                }
            }
            moved += revived.len();
            self.kv.list_push(&keys::queue(coupon_id), &revived).await?;
        }
        if moved > 0 {
            tracing::info!(coupon_id, count = moved, "Recovered dead letter entries to queue");
        }
        Ok(moved)
    }
}
