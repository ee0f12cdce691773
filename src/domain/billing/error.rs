use super::model::SubscriptionStatus;
use crate::domain::plan::PlanId;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("pay-as-you-go minutes are not available on the {0} plan")]
    PaygNotAvailable(PlanId),
    #[error("invalid usage: {0}")]
    InvalidUsage(String),
    #[error("insufficient credits: {requested} minutes requested, {available} available")]
    InsufficientCredits { requested: i32, available: i32 },
    #[error("subscription is {0}")]
    SubscriptionInactive(SubscriptionStatus),
    #[error("invalid plan change: {0}")]
    InvalidTransition(String),
    #[error("payment declined")]
    PaymentDeclined,
    #[error("subscription not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for BillingError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => BillingError::NotFound,
            AppError::Conflict(msg) => BillingError::Conflict(msg),
            _ => BillingError::Dependency(err.to_string()),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::UnknownPlan(_)
            | BillingError::InvalidUsage(_)
            | BillingError::InvalidTransition(_) => AppError::BadRequest(err.to_string()),
            BillingError::PaygNotAvailable(_) | BillingError::SubscriptionInactive(_) => {
                AppError::Forbidden(err.to_string())
            }
            BillingError::InsufficientCredits { .. } | BillingError::PaymentDeclined => {
                AppError::PaymentRequired(err.to_string())
            }
            BillingError::NotFound => AppError::NotFound("Subscription not found".to_string()),
            BillingError::Conflict(msg) => AppError::Conflict(msg),
            BillingError::Dependency(msg) => AppError::Internal(msg),
            BillingError::Other(e) => AppError::ExternalService(e.to_string()),
        }
    }
}
