use std::sync::Arc;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;
use wellness_billing::domain::billing::{BillingService, BillingServiceApi};
use wellness_billing::infrastructure::http::build_router;
use wellness_billing::infrastructure::payments::AutoApprovePaymentGateway;
use wellness_billing::infrastructure::repositories::InMemoryLedgerRepository;

pub mod api_client;

use api_client::TestClient;
use fixtures::TestFixtures;

const TEST_MAX_WRITE_RETRIES: u32 = 5;

pub struct TestContext {
    pub client: TestClient,
    pub fixtures: TestFixtures,
    #[allow(dead_code)]
    pub service: Arc<dyn BillingServiceApi>,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        spawn_app(true)
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

/// Same app, but the payment gateway declines every charge
pub struct DecliningPaymentsContext {
    pub client: TestClient,
    pub fixtures: TestFixtures,
}

impl AsyncTestContext for DecliningPaymentsContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let ctx = spawn_app(false).await;
            Self {
                client: ctx.client,
                fixtures: ctx.fixtures,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

async fn spawn_app(approve_payments: bool) -> TestContext {
    let repo = Arc::new(InMemoryLedgerRepository::new());
    let service: Arc<dyn BillingServiceApi> = Arc::new(BillingService::new(
        repo.clone(),
        Arc::new(AutoApprovePaymentGateway::new(approve_payments)),
        TEST_MAX_WRITE_RETRIES,
    ));
    let app = build_router(repo.clone(), service.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestContext {
        client: TestClient::new(&format!("http://{}", addr)),
        fixtures: TestFixtures::new(repo),
        service,
    }
}
