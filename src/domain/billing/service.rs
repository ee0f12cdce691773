use super::error::BillingError;
use super::model::{BillingCycle, PaygPurchase, PurchaseStatus, Subscription, SubscriptionStatus};
use super::state;
use crate::domain::plan::{get_plan, PlanId};
use crate::domain::usage::{record_usage, SessionType, UsageRecord};
use crate::error::AppError;
use crate::infrastructure::payments::PaymentGateway;
use crate::infrastructure::repositories::{LedgerCommit, LedgerRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 3;

/// A finished session to charge against the user's credits
#[derive(Debug, Clone)]
pub struct RecordUsageCommand {
    pub minutes: i32,
    pub session_type: SessionType,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UsageInCycle {
    pub billing_cycle: BillingCycle,
    pub records: Vec<UsageRecord>,
    pub total_minutes: i64,
}

/// Inputs a transition may need besides the subscription itself
struct TransitionContext {
    now: DateTime<Utc>,
    plan_minutes_used_this_cycle: i64,
}

pub struct BillingService {
    repo: Arc<dyn LedgerRepository>,
    payments: Arc<dyn PaymentGateway>,
    max_write_retries: u32,
}

impl BillingService {
    pub fn new(
        repo: Arc<dyn LedgerRepository>,
        payments: Arc<dyn PaymentGateway>,
        max_write_retries: u32,
    ) -> Self {
        Self {
            repo,
            payments,
            max_write_retries: max_write_retries.max(1),
        }
    }
}

#[async_trait]
pub trait BillingServiceApi: Send + Sync {
    /// Current subscription of the user, with any ended cycle rolled over
    async fn get_subscription(&self, user_id: Uuid) -> Result<Subscription, BillingError>;

    async fn start_trial(&self, user_id: Uuid) -> Result<Subscription, BillingError>;

    /// Start a paid plan. The first month is charged up front.
    async fn subscribe(&self, user_id: Uuid, plan_id: PlanId) -> Result<Subscription, BillingError>;

    async fn switch_plan(&self, user_id: Uuid, plan_id: PlanId) -> Result<Subscription, BillingError>;

    async fn cancel(&self, user_id: Uuid) -> Result<Subscription, BillingError>;

    /// Charge for and credit extra minutes.
    ///
    /// The purchase is stored as pending before the charge and settled after
    /// it. A declined charge is recorded as failed before `PaymentDeclined` is
    /// returned, as is an approved one that could not be credited.
    async fn purchase_payg(
        &self,
        user_id: Uuid,
        minutes: i32,
    ) -> Result<(Subscription, PaygPurchase), BillingError>;

    /// Deduct a session's minutes and append it to the usage ledger
    async fn record_usage(
        &self,
        user_id: Uuid,
        command: RecordUsageCommand,
    ) -> Result<(Subscription, UsageRecord), BillingError>;

    async fn usage_in_current_cycle(&self, user_id: Uuid) -> Result<UsageInCycle, BillingError>;

    async fn list_payg_purchases(&self, user_id: Uuid) -> Result<Vec<PaygPurchase>, BillingError>;

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, BillingError>;

    /// Persist rollover or expiry for every subscription whose cycle has ended.
    /// Returns how many were settled.
    async fn run_rollover_sweep(&self) -> Result<usize, BillingError>;
}

#[async_trait]
impl BillingServiceApi for BillingService {
    async fn get_subscription(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        let current = self.find_latest(user_id).await?;
        state::rollover_cycle(&current, Utc::now())
    }

    async fn start_trial(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        if self.repo.find_latest_for_user(user_id).await?.is_some() {
            return Err(BillingError::Conflict(
                "Trial is only available to new users".to_string(),
            ));
        }

        let subscription = Subscription::new_trial(user_id, Utc::now());
        self.repo.insert_subscription(&subscription).await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            ends_at = %subscription.billing_cycle.end_date,
            "Trial started"
        );

        Ok(subscription)
    }

    async fn subscribe(&self, user_id: Uuid, plan_id: PlanId) -> Result<Subscription, BillingError> {
        if let Some(existing) = self.repo.find_latest_for_user(user_id).await? {
            let existing = self.settle_rollover(existing).await?;
            if existing.is_live() {
                return Err(BillingError::Conflict(format!(
                    "User already has a {} subscription; switch plans instead",
                    existing.status
                )));
            }
        }

        let subscription = Subscription::new_paid(user_id, plan_id, Utc::now())?;
        let plan = subscription.plan();
        self.charge(user_id, plan.price_usd_per_month, &format!("{} plan, first month", plan.name))
            .await?;

        self.repo
            .insert_subscription(&subscription)
            .await
            .map_err(|e| {
                let e = BillingError::from(e);
                log_orphaned_charge(user_id, plan.price_usd_per_month, "subscribe", &e);
                e
            })?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            plan_id = %plan_id,
            "Subscription created"
        );

        Ok(subscription)
    }

    async fn switch_plan(&self, user_id: Uuid, plan_id: PlanId) -> Result<Subscription, BillingError> {
        let current = self.find_latest(user_id).await?;
        let now = Utc::now();
        let view = state::rollover_cycle(&current, now)?;
        // reject before charging; the proration figure does not matter here
        state::switch_plan(&view, plan_id, 0, now)?;

        let old_plan = view.plan();
        let new_plan = get_plan(plan_id);
        let amount = if view.status == SubscriptionStatus::Trial {
            new_plan.price_usd_per_month
        } else {
            (new_plan.price_usd_per_month - old_plan.price_usd_per_month).max(Decimal::ZERO)
        };
        if amount > Decimal::ZERO {
            self.charge(
                user_id,
                amount,
                &format!("switch from {} to {}", old_plan.name, new_plan.name),
            )
            .await?;
        }

        let change = self
            .mutate(view.id, move |sub, ctx| {
                let mut next =
                    state::switch_plan(sub, plan_id, ctx.plan_minutes_used_this_cycle, ctx.now)?;
                next.total_spent_usd += amount;
                Ok(LedgerCommit::new(next, sub.version))
            })
            .await
            .map_err(|e| {
                if amount > Decimal::ZERO {
                    log_orphaned_charge(user_id, amount, "switch_plan", &e);
                }
                e
            })?;

        tracing::info!(
            user_id = %user_id,
            from = %old_plan.id,
            to = %plan_id,
            credits_remaining = change.subscription.credits_remaining_minutes,
            "Plan switched"
        );

        Ok(change.subscription)
    }

    async fn cancel(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        let current = self.find_latest(user_id).await?;
        let change = self
            .mutate(current.id, |sub, ctx| {
                let next = state::cancel(sub, ctx.now)?;
                Ok(LedgerCommit::new(next, sub.version))
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %change.subscription.id,
            usable_until = %change.subscription.billing_cycle.end_date,
            "Subscription cancelled"
        );

        Ok(change.subscription)
    }

    async fn purchase_payg(
        &self,
        user_id: Uuid,
        minutes: i32,
    ) -> Result<(Subscription, PaygPurchase), BillingError> {
        let current = self.find_latest(user_id).await?;

        // the purchase exists as pending before any money moves
        let reserved = self
            .mutate(current.id, move |sub, ctx| {
                let pending = state::quote_purchase(sub, minutes, ctx.now)?;
                Ok(LedgerCommit::new(sub.clone(), sub.version).with_purchase(pending))
            })
            .await?;
        let pending = reserved
            .purchase
            .ok_or_else(|| BillingError::Dependency("purchase missing from commit".to_string()))?;

        let outcome = self
            .payments
            .charge(
                user_id,
                pending.total_cost_usd,
                &format!("{} pay-as-you-go minutes", minutes),
            )
            .await;
        let approved = match outcome {
            Ok(outcome) => outcome.is_approved(),
            Err(e) => {
                let e = BillingError::from(e);
                self.abandon_purchase(&pending, false, &e).await;
                return Err(e);
            }
        };

        let settled = self
            .mutate(current.id, |sub, ctx| {
                let (next, purchase) = state::settle_purchase(sub, &pending, approved, ctx.now)?;
                Ok(LedgerCommit::new(next, sub.version).with_purchase(purchase))
            })
            .await;
        let change = match settled {
            Ok(change) => change,
            Err(e) => {
                self.abandon_purchase(&pending, approved, &e).await;
                return Err(e);
            }
        };

        if !approved {
            tracing::warn!(
                user_id = %user_id,
                minutes = minutes,
                amount_usd = %pending.total_cost_usd,
                "PAYG purchase declined"
            );
            return Err(BillingError::PaymentDeclined);
        }

        let purchase = change
            .purchase
            .ok_or_else(|| BillingError::Dependency("purchase missing from commit".to_string()))?;

        tracing::info!(
            user_id = %user_id,
            minutes = minutes,
            amount_usd = %purchase.total_cost_usd,
            payg_balance = change.subscription.payg_credits_minutes,
            "PAYG minutes purchased"
        );

        Ok((change.subscription, purchase))
    }

    async fn record_usage(
        &self,
        user_id: Uuid,
        command: RecordUsageCommand,
    ) -> Result<(Subscription, UsageRecord), BillingError> {
        let current = self.find_latest(user_id).await?;
        let change = self
            .mutate(current.id, |sub, ctx| {
                let (next, split) = state::apply_usage(sub, command.minutes, ctx.now)?;

                let at = command.timestamp.unwrap_or(ctx.now);
                if at > ctx.now || !sub.billing_cycle.contains(at) {
                    return Err(BillingError::InvalidUsage(
                        "usage timestamp must fall within the current billing cycle".to_string(),
                    ));
                }

                let mut record = record_usage(sub.id, command.minutes, command.session_type, at)?;
                record.plan_minutes = split.plan_minutes;
                record.payg_minutes = split.payg_minutes;

                Ok(LedgerCommit::new(next, sub.version).with_usage(record))
            })
            .await?;

        let record = change
            .usage
            .ok_or_else(|| BillingError::Dependency("usage missing from commit".to_string()))?;
        let subscription = change.subscription;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            minutes = record.minutes_used,
            plan_minutes = record.plan_minutes,
            payg_minutes = record.payg_minutes,
            credits_remaining = subscription.credits_remaining_minutes,
            payg_remaining = subscription.payg_credits_minutes,
            "Usage recorded"
        );

        Ok((subscription, record))
    }

    async fn usage_in_current_cycle(&self, user_id: Uuid) -> Result<UsageInCycle, BillingError> {
        let subscription = self.get_subscription(user_id).await?;
        let cycle = subscription.billing_cycle;

        let records = self
            .repo
            .list_usage_in_cycle(subscription.id, cycle.start_date, cycle.end_date)
            .await?;
        let total_minutes = self
            .repo
            .sum_minutes_in_cycle(subscription.id, cycle.start_date, cycle.end_date)
            .await?;

        Ok(UsageInCycle {
            billing_cycle: cycle,
            records,
            total_minutes,
        })
    }

    async fn list_payg_purchases(&self, user_id: Uuid) -> Result<Vec<PaygPurchase>, BillingError> {
        Ok(self.repo.list_payg_purchases(user_id).await?)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, BillingError> {
        let now = Utc::now();
        self.repo
            .list_subscriptions()
            .await?
            .iter()
            .map(|s| state::rollover_cycle(s, now))
            .collect()
    }

    async fn run_rollover_sweep(&self) -> Result<usize, BillingError> {
        let due = self.repo.list_due_for_rollover(Utc::now()).await?;
        let mut settled = 0;

        for subscription in due {
            let subscription_id = subscription.id;
            match self.settle_rollover(subscription).await {
                Ok(next) => {
                    settled += 1;
                    tracing::info!(
                        subscription_id = %subscription_id,
                        status = %next.status,
                        cycle_end = %next.billing_cycle.end_date,
                        "Billing cycle settled"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        subscription_id = %subscription_id,
                        error = %e,
                        "Failed to settle billing cycle"
                    );
                }
            }
        }

        Ok(settled)
    }
}

impl BillingService {
    async fn find_latest(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        self.repo
            .find_latest_for_user(user_id)
            .await?
            .ok_or(BillingError::NotFound)
    }

    async fn charge(&self, user_id: Uuid, amount: Decimal, description: &str) -> Result<(), BillingError> {
        let outcome = self.payments.charge(user_id, amount, description).await?;
        if !outcome.is_approved() {
            tracing::warn!(
                user_id = %user_id,
                amount_usd = %amount,
                description = %description,
                "Payment declined"
            );
            return Err(BillingError::PaymentDeclined);
        }
        Ok(())
    }

    /// Mark a purchase that could not be settled as failed.
    ///
    /// `charged` means the processor approved the payment, so the customer was
    /// billed for minutes they did not get.
    async fn abandon_purchase(&self, purchase: &PaygPurchase, charged: bool, error: &BillingError) {
        if charged {
            log_orphaned_charge(purchase.user_id, purchase.total_cost_usd, "purchase_payg", error);
        }
        if let Err(e) = self
            .repo
            .update_purchase_status(purchase.id, PurchaseStatus::Failed)
            .await
        {
            tracing::error!(
                purchase_id = %purchase.id,
                error = %e,
                "Failed to mark PAYG purchase as failed; it stays pending"
            );
        }
    }

    /// Write back a rollover that is due, otherwise return the record unchanged
    async fn settle_rollover(&self, subscription: Subscription) -> Result<Subscription, BillingError> {
        if Utc::now() < subscription.billing_cycle.end_date {
            return Ok(subscription);
        }
        let change = self
            .mutate(subscription.id, |sub, _| {
                Ok(LedgerCommit::new(sub.clone(), sub.version))
            })
            .await?;
        Ok(change.subscription)
    }

    /// Read-modify-write of one subscription under optimistic concurrency.
    ///
    /// Each attempt reloads the record, applies any due rollover, runs
    /// `transition` and commits against the loaded version. Version conflicts
    /// are retried up to `max_write_retries` times.
    async fn mutate<F>(&self, subscription_id: Uuid, mut transition: F) -> Result<LedgerCommit, BillingError>
    where
        F: FnMut(&Subscription, &TransitionContext) -> Result<LedgerCommit, BillingError> + Send,
    {
        for attempt in 1..=self.max_write_retries {
            let current = self
                .repo
                .find_subscription(subscription_id)
                .await?
                .ok_or(BillingError::NotFound)?;
            let now = Utc::now();
            let rolled = state::rollover_cycle(&current, now)?;
            let plan_minutes_used_this_cycle = self
                .repo
                .sum_plan_minutes_in_cycle(
                    rolled.id,
                    rolled.billing_cycle.start_date,
                    rolled.billing_cycle.end_date,
                )
                .await?;

            let ctx = TransitionContext {
                now,
                plan_minutes_used_this_cycle,
            };
            let mut change = transition(&rolled, &ctx)?;
            change.expected_version = current.version;
            change.subscription.version = current.version + 1;

            match self.repo.commit(&change).await {
                Ok(()) => return Ok(change),
                Err(AppError::Conflict(msg)) => {
                    tracing::warn!(
                        subscription_id = %subscription_id,
                        attempt = attempt,
                        reason = %msg,
                        "Concurrent subscription update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::Conflict(format!(
            "Subscription {} is being updated concurrently, try again",
            subscription_id
        )))
    }
}

/// A payment was captured but the change it paid for was not stored.
fn log_orphaned_charge(user_id: Uuid, amount: Decimal, operation: &str, error: &BillingError) {
    tracing::error!(
        user_id = %user_id,
        amount_usd = %amount,
        operation = operation,
        error = %error,
        refund_required = true,
        "Charge captured but not applied"
    );
}
