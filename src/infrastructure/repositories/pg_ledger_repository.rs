use super::ledger_repository::{LedgerCommit, LedgerRepository};
use crate::domain::billing::{PaygPurchase, PurchaseStatus, Subscription};
use crate::domain::usage::UsageRecord;
use crate::error::{AppError, AppResult};
use crate::infrastructure::db::{check_connection, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, plan_id, status, start_date, end_date, renews_on, anchor_date,
    credits_remaining_minutes, payg_credits_minutes, trial_started_at,
    total_spent_usd, version, created_at, updated_at
"#;

pub struct PgLedgerRepository {
    pool: Arc<DbPool>,
}

impl PgLedgerRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn ping(&self) -> AppResult<()> {
        check_connection(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn find_subscription(&self, subscription_id: Uuid) -> AppResult<Option<Subscription>> {
        let pool = self.pool.as_ref();
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?;

        Ok(subscription)
    }

    async fn find_latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let pool = self.pool.as_ref();
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(subscription)
    }

    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        let pool = self.pool.as_ref();
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(pool)
        .await?;

        Ok(subscriptions)
    }

    async fn list_due_for_rollover(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let pool = self.pool.as_ref();
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE status <> 'expired' AND end_date <= $1
            ORDER BY end_date ASC
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(subscriptions)
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let pool = self.pool.as_ref();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, status, start_date, end_date, renews_on, anchor_date,
                credits_remaining_minutes, payg_credits_minutes, trial_started_at,
                total_spent_usd, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.status)
        .bind(subscription.billing_cycle.start_date)
        .bind(subscription.billing_cycle.end_date)
        .bind(subscription.billing_cycle.renews_on)
        .bind(subscription.billing_cycle.anchor_date)
        .bind(subscription.credits_remaining_minutes)
        .bind(subscription.payg_credits_minutes)
        .bind(subscription.trial_started_at)
        .bind(subscription.total_spent_usd)
        .bind(subscription.version)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "User already has a live subscription".to_string(),
                    );
                }
            }
            AppError::Database(e)
        })?;

        Ok(())
    }

    async fn commit(&self, change: &LedgerCommit) -> AppResult<()> {
        let sub = &change.subscription;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan_id = $1,
                status = $2,
                start_date = $3,
                end_date = $4,
                renews_on = $5,
                anchor_date = $6,
                credits_remaining_minutes = $7,
                payg_credits_minutes = $8,
                total_spent_usd = $9,
                version = $10,
                updated_at = $11
            WHERE id = $12 AND version = $13
            "#,
        )
        .bind(sub.plan_id)
        .bind(sub.status)
        .bind(sub.billing_cycle.start_date)
        .bind(sub.billing_cycle.end_date)
        .bind(sub.billing_cycle.renews_on)
        .bind(sub.billing_cycle.anchor_date)
        .bind(sub.credits_remaining_minutes)
        .bind(sub.payg_credits_minutes)
        .bind(sub.total_spent_usd)
        .bind(sub.version)
        .bind(sub.updated_at)
        .bind(sub.id)
        .bind(change.expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Subscription {} was modified concurrently",
                sub.id
            )));
        }

        if let Some(usage) = &change.usage {
            sqlx::query(
                r#"
                INSERT INTO usage_records (
                    id, subscription_id, date, minutes_used, session_type,
                    plan_minutes, payg_minutes, cost_usd
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(usage.id)
            .bind(usage.subscription_id)
            .bind(usage.date)
            .bind(usage.minutes_used)
            .bind(usage.session_type)
            .bind(usage.plan_minutes)
            .bind(usage.payg_minutes)
            .bind(usage.cost_usd)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(purchase) = &change.purchase {
            sqlx::query(
                r#"
                INSERT INTO payg_purchases (
                    id, user_id, subscription_id, plan_id, minutes_purchased,
                    rate_per_minute, total_cost_usd, purchase_date, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
                "#,
            )
            .bind(purchase.id)
            .bind(purchase.user_id)
            .bind(purchase.subscription_id)
            .bind(purchase.plan_id)
            .bind(purchase.minutes_purchased)
            .bind(purchase.rate_per_minute)
            .bind(purchase.total_cost_usd)
            .bind(purchase.purchase_date)
            .bind(purchase.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn list_usage_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<Vec<UsageRecord>> {
        let pool = self.pool.as_ref();
        let records = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT id, subscription_id, date, minutes_used, session_type,
                   plan_minutes, payg_minutes, cost_usd
            FROM usage_records
            WHERE subscription_id = $1 AND date >= $2 AND date < $3
            ORDER BY date ASC, id ASC
            "#,
        )
        .bind(subscription_id)
        .bind(cycle_start)
        .bind(cycle_end)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    async fn sum_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(minutes_used), 0)::BIGINT
            FROM usage_records
            WHERE subscription_id = $1 AND date >= $2 AND date < $3
            "#,
        )
        .bind(subscription_id)
        .bind(cycle_start)
        .bind(cycle_end)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    async fn sum_plan_minutes_in_cycle(
        &self,
        subscription_id: Uuid,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(plan_minutes), 0)::BIGINT
            FROM usage_records
            WHERE subscription_id = $1 AND date >= $2 AND date < $3
            "#,
        )
        .bind(subscription_id)
        .bind(cycle_start)
        .bind(cycle_end)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    async fn list_payg_purchases(&self, user_id: Uuid) -> AppResult<Vec<PaygPurchase>> {
        let pool = self.pool.as_ref();
        let purchases = sqlx::query_as::<_, PaygPurchase>(
            r#"
            SELECT id, user_id, subscription_id, plan_id, minutes_purchased,
                   rate_per_minute, total_cost_usd, purchase_date, status
            FROM payg_purchases
            WHERE user_id = $1
            ORDER BY purchase_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(purchases)
    }

    async fn update_purchase_status(&self, purchase_id: Uuid, status: PurchaseStatus) -> AppResult<()> {
        let pool = self.pool.as_ref();
        let result = sqlx::query("UPDATE payg_purchases SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(purchase_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Purchase {}", purchase_id)));
        }

        Ok(())
    }
}
