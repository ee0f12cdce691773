use super::ledger_repository::{LedgerCommit, LedgerRepository};
use crate::domain::billing::{PaygPurchase, PurchaseStatus, Subscription, SubscriptionStatus};
use crate::domain::usage::UsageRecord;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    subscriptions: HashMap<Uuid, Subscription>,
    usage: Vec<UsageRecord>,
    purchases: Vec<PaygPurchase>,
}

impl LedgerState {
    fn usage_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> impl Iterator<Item = &UsageRecord> + '_ {
        self.usage.iter().filter(move |r| {
            r.subscription_id == subscription_id && r.date >= cycle_start && r.date < cycle_end
        })
    }
}

/// Process-local ledger used when no database is configured.
///
/// A single lock guards all tables, so commits are trivially atomic; the
/// version check still applies so callers observe the same conflicts as with
/// PostgreSQL.
#[derive(Default)]
pub struct InMemoryLedgerRepository {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_subscription(&self, subscription_id: Uuid) -> AppResult<Option<Subscription>> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.get(&subscription_id).cloned())
    }

    async fn find_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        let state = self.state.lock().await;
        let mut subscriptions: Vec<Subscription> = state.subscriptions.values().cloned().collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscriptions)
    }

    async fn list_due_for_rollover(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let state = self.state.lock().await;
        let mut due: Vec<Subscription> = state
            .subscriptions
            .values()
            .filter(|s| s.status != SubscriptionStatus::Expired && s.billing_cycle.end_date <= now)
            .cloned()
            .collect();
        due.sort_by_key(|s| s.billing_cycle.end_date);
        Ok(due)
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let mut state = self.state.lock().await;

        let has_live = state
            .subscriptions
            .values()
            .any(|s| s.user_id == subscription.user_id && s.is_live());
        if has_live && subscription.is_live() {
            return Err(AppError::Conflict(
                "User already has a live subscription".to_string(),
            ));
        }
        if state.subscriptions.contains_key(&subscription.id) {
            return Err(AppError::Conflict(format!(
                "Subscription {} already exists",
                subscription.id
            )));
        }

        state
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn commit(&self, change: &LedgerCommit) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let sub = &change.subscription;

        let current_version = state
            .subscriptions
            .get(&sub.id)
            .map(|s| s.version)
            .ok_or_else(|| AppError::NotFound(format!("Subscription {}", sub.id)))?;
        if current_version != change.expected_version {
            return Err(AppError::Conflict(format!(
                "Subscription {} was modified concurrently",
                sub.id
            )));
        }

        state.subscriptions.insert(sub.id, sub.clone());
        if let Some(usage) = &change.usage {
            state.usage.push(usage.clone());
        }
        if let Some(purchase) = &change.purchase {
            match state.purchases.iter_mut().find(|p| p.id == purchase.id) {
                Some(existing) => existing.status = purchase.status,
                None => state.purchases.push(purchase.clone()),
            }
        }

        Ok(())
    }

    async fn list_usage_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<Vec<UsageRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<UsageRecord> = state
            .usage_in_cycle(subscription_id, cycle_start, cycle_end)
            .cloned()
            .collect();
        // stable, so same-instant records keep insertion order
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn sum_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .usage_in_cycle(subscription_id, cycle_start, cycle_end)
            .map(|r| i64::from(r.minutes_used))
            .sum())
    }

    async fn sum_plan_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .usage_in_cycle(subscription_id, cycle_start, cycle_end)
            .map(|r| i64::from(r.plan_minutes))
            .sum())
    }

    async fn list_payg_purchases(&self, user_id: Uuid) -> AppResult<Vec<PaygPurchase>> {
        let state = self.state.lock().await;
        let mut purchases: Vec<PaygPurchase> = state
            .purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
        Ok(purchases)
    }

    async fn update_purchase_status(&self, purchase_id: Uuid, status: PurchaseStatus) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let purchase = state
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .ok_or_else(|| AppError::NotFound(format!("Purchase {}", purchase_id)))?;
        purchase.status = status;
        Ok(())
    }
}
