pub mod dto;
pub mod error;
pub mod metrics;
pub mod model;
pub mod service;
pub mod state;

pub use dto::{
    CreateSubscriptionRequest, PaygPurchaseResponse, PaygQuoteQuery, PaygQuoteResponse,
    PurchasePaygRequest, RecordUsageRequest, RecordUsageResponse, SubscriptionResponse,
    SwitchPlanRequest, UsageResponse,
};
pub use error::BillingError;
pub use metrics::SubscriptionMetrics;
pub use model::{BillingCycle, PaygPurchase, PurchaseStatus, Subscription, SubscriptionStatus};
pub use service::{BillingService, BillingServiceApi, RecordUsageCommand, UsageInCycle};
