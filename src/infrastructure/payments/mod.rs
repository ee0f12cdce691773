use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved,
    Declined,
}

impl PaymentOutcome {
    pub fn is_approved(self) -> bool {
        self == PaymentOutcome::Approved
    }
}

/// Card processor used for PAYG top-ups and paid plan changes.
///
/// A transport failure is an `Err`; a processed-but-refused charge is
/// `Ok(PaymentOutcome::Declined)`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        user_id: Uuid,
        amount_usd: Decimal,
        description: &str,
    ) -> anyhow::Result<PaymentOutcome>;
}

/// Settles every charge with a fixed verdict, for deployments without a processor.
pub struct AutoApprovePaymentGateway {
    approve: bool,
}

impl AutoApprovePaymentGateway {
    pub fn new(approve: bool) -> Self {
        Self { approve }
    }
}

#[async_trait]
impl PaymentGateway for AutoApprovePaymentGateway {
    async fn charge(
        &self,
        user_id: Uuid,
        amount_usd: Decimal,
        description: &str,
    ) -> anyhow::Result<PaymentOutcome> {
        let outcome = if self.approve {
            PaymentOutcome::Approved
        } else {
            PaymentOutcome::Declined
        };

        tracing::info!(
            user_id = %user_id,
            amount_usd = %amount_usd,
            description = %description,
            outcome = ?outcome,
            "Payment settled without processor"
        );

        Ok(outcome)
    }
}
