use crate::domain::billing::{PaygPurchase, PurchaseStatus, Subscription};
use crate::domain::usage::UsageRecord;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One atomic write against a subscription.
///
/// `subscription` is the next state of the record; it is stored only if the
/// persisted version still equals `expected_version`. The optional usage
/// record is appended in the same transaction. The optional purchase is
/// inserted, or has its status updated if it was committed earlier as pending.
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    pub subscription: Subscription,
    pub expected_version: i64,
    pub usage: Option<UsageRecord>,
    pub purchase: Option<PaygPurchase>,
}

impl LedgerCommit {
    pub fn new(subscription: Subscription, expected_version: i64) -> Self {
        Self {
            subscription,
            expected_version,
            usage: None,
            purchase: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageRecord) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_purchase(mut self, purchase: PaygPurchase) -> Self {
        self.purchase = Some(purchase);
        self
    }
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn find_subscription(&self, subscription_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Most recently created subscription for the user, whatever its status
    async fn find_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;

    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>>;

    /// Non-expired subscriptions whose cycle ended at or before `now`
    async fn list_due_for_rollover(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;

    /// Fails with `AppError::Conflict` if the user already has a trial or active subscription
    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()>;

    /// Fails with `AppError::Conflict` on a version mismatch
    async fn commit(&self, change: &LedgerCommit) -> AppResult<()>;

    /// Records with `cycle_start <= date < cycle_end`, oldest first
    async fn list_usage_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<Vec<UsageRecord>>;

    async fn sum_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64>;

    /// Like `sum_minutes_in_cycle` but only the share covered by plan credits
    async fn sum_plan_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64>;

    async fn list_payg_purchases(&self, user_id: Uuid) -> AppResult<Vec<PaygPurchase>>;

    /// Resolve a purchase outside of a subscription commit, e.g. when the
    /// commit that should have settled it failed
    async fn update_purchase_status(&self, purchase_id: Uuid, status: PurchaseStatus) -> AppResult<()>;
}
