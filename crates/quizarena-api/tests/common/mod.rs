//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use http_body_util::BodyExt;
use quizarena_core::clock::Clock;
use quizarena_core::error::DomainError;
use quizarena_payments::application::http_gateway::PaymentGateway;
use quizarena_payments::domain::gateway::{GatewayStatus, TransactionVerification};
use quizarena_payments::domain::join::Currency;
use quizarena_store::InMemorySettlementRepository;
use quizarena_test_support::{ManualClock, RecordingTransferExecutor, fixed_now};
use tower::ServiceExt;

use quizarena_api::routes;
use quizarena_api::state::AppState;
use quizarena_api::ticker;

/// Operator wallet configured in every test app.
pub const DESTINATION: &str = "0xOperator";

/// Explorer prefix configured in every test app.
pub const EXPLORER: &str = "https://worldchain.explorer/tx/";

/// Gateway double that serves whatever the test last configured.
#[derive(Debug, Default)]
pub struct StubGateway {
    transactions: Mutex<HashMap<String, TransactionVerification>>,
}

impl StubGateway {
    /// Records `transaction_id` as a WLD payment of `amount` to the operator.
    pub fn set(&self, transaction_id: &str, status: GatewayStatus, amount: u64) {
        self.transactions.lock().unwrap().insert(
            transaction_id.to_owned(),
            TransactionVerification {
                transaction_id: transaction_id.to_owned(),
                status,
                amount,
                currency: Currency::Wld,
                destination: DESTINATION.to_owned(),
                hash: Some(format!("0xhash-{transaction_id}")),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionVerification, DomainError> {
        self.transactions
            .lock()
            .unwrap()
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| DomainError::External("gateway responded with status 404".to_owned()))
    }
}

/// An in-memory app whose clock and collaborators the test controls.
pub struct TestApp {
    /// Shared state behind the router.
    pub state: AppState,
    /// Clock read by every handler and the ticker.
    pub clock: Arc<ManualClock>,
    /// Payment gateway double.
    pub gateway: Arc<StubGateway>,
    /// Transfer executor double.
    pub transfer: Arc<RecordingTransferExecutor>,
}

impl TestApp {
    /// The full router, mounted as in `main.rs`.
    pub fn router(&self) -> Router {
        routes::api_router().with_state(self.state.clone())
    }

    /// Moves the clock forward by `seconds`, runs one scheduler tick and
    /// waits for any settlement it started.
    pub async fn advance_and_tick(&self, seconds: i64) -> usize {
        self.clock.advance(Duration::seconds(seconds));
        let events = ticker::run_tick(&self.state, self.clock.now()).await;
        self.state.scheduler.wait_for_settlements().await;
        events
    }

    /// Moves the clock forward by `millis` without ticking.
    pub fn advance_ms(&self, millis: i64) {
        self.clock.advance(Duration::milliseconds(millis));
    }
}

/// Build the full app with an in-memory store, a clock at
/// 2026-01-15 10:00:00 UTC and transfers that always succeed.
pub fn build_test_app() -> TestApp {
    build_test_app_with_transfer(RecordingTransferExecutor::new())
}

/// Build the full app with a custom transfer executor.
pub fn build_test_app_with_transfer(transfer: RecordingTransferExecutor) -> TestApp {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let gateway = Arc::new(StubGateway::default());
    let transfer = Arc::new(transfer);
    let state = AppState::new(
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(InMemorySettlementRepository::new()),
        Arc::clone(&transfer) as _,
        Arc::clone(&gateway) as _,
        EXPLORER.to_owned(),
        Some(DESTINATION.to_owned()),
    );
    TestApp {
        state,
        clock,
        gateway,
        transfer,
    }
}

/// A two-question tournament starting 60 seconds after the test clock,
/// with a 100 entry fee and 10% rake.
pub fn two_question_tournament() -> serde_json::Value {
    serde_json::json!({
        "name": "Friday Night Trivia",
        "entry_fee": 100,
        "rake_bps": 1000,
        "start_at": "2026-01-15T10:01:00Z",
        "questions": [
            {
                "id": "q1",
                "text": "Largest planet?",
                "options": ["Mars", "Jupiter", "Venus"],
                "correct_option": 1,
                "timeout_seconds": 10
            },
            {
                "id": "q2",
                "text": "Chemical symbol for gold?",
                "options": ["Au", "Ag"],
                "correct_option": 0,
                "timeout_seconds": 10
            }
        ]
    })
}

/// Creates `two_question_tournament` and returns its id.
pub async fn create_tournament(app: &TestApp) -> String {
    let (status, json) = post_json(
        app.router(),
        "/api/v1/tournaments",
        &two_question_tournament(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["tournament_id"].as_str().unwrap().to_owned()
}

/// Pays the entry fee for `participant_id` through the gateway double and
/// returns the payment callback's response. The gateway transaction id is
/// `tx-<participant_id>`.
pub async fn pay_and_join(app: &TestApp, id: &str, participant_id: &str) -> (StatusCode, serde_json::Value) {
    let wallet = format!("0x{participant_id}-wallet");
    let (status, _) = post_json(
        app.router(),
        &format!("/api/v1/tournaments/{id}/payment-intent"),
        &serde_json::json!({
            "worldId": participant_id,
            "walletAddress": wallet,
            "amount": 100,
            "currency": "WLD"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let transaction_id = format!("tx-{participant_id}");
    app.gateway.set(&transaction_id, GatewayStatus::Completed, 100);
    post_json(
        app.router(),
        &format!("/api/v1/tournaments/{id}/payment-callback"),
        &serde_json::json!({
            "transactionId": transaction_id,
            "worldId": participant_id,
            "walletAddress": wallet,
        }),
    )
    .await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
