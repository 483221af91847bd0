//! Integration tests for operator payout maintenance.

mod common;

use axum::http::StatusCode;
use quizarena_test_support::RecordingTransferExecutor;
use serde_json::Value;

use common::TestApp;

/// Runs a one-question tournament that alice wins and bob places second
/// in, and returns the payouts as listed by the API.
async fn settle_two_player_tournament(app: &TestApp) -> Vec<Value> {
    let id = common::create_tournament(app).await;
    for participant in ["alice", "bob"] {
        let (status, _) = common::pay_and_join(app, &id, participant).await;
        assert_eq!(status, StatusCode::OK);
    }
    app.advance_and_tick(60).await;
    app.advance_ms(1_000);
    for (participant, option) in [("alice", 1), ("bob", 0)] {
        common::post_json(
            app.router(),
            &format!("/api/v1/tournaments/{id}/answer"),
            &serde_json::json!({ "participant_id": participant, "option_index": option }),
        )
        .await;
    }
    app.advance_and_tick(9).await;
    app.advance_and_tick(10).await;

    let (status, json) =
        common::get_json(app.router(), &format!("/api/v1/tournaments/{id}/payouts")).await;
    assert_eq!(status, StatusCode::OK);
    json.as_array().unwrap().clone()
}

fn payout_for<'a>(payouts: &'a [Value], participant_id: &str) -> &'a Value {
    payouts
        .iter()
        .find(|p| p["participant_id"] == participant_id)
        .unwrap()
}

#[tokio::test]
async fn test_confirm_submitted_payout() {
    // Arrange
    let app = common::build_test_app();
    let payouts = settle_two_player_tournament(&app).await;
    let payout_id = payout_for(&payouts, "alice")["id"].as_str().unwrap().to_owned();

    // Act
    let (status, json) = common::post_json(
        app.router(),
        &format!("/api/v1/payouts/{payout_id}/status"),
        &serde_json::json!({ "status": "confirmed" }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["tx_hash"], format!("0x{payout_id}"));
}

#[tokio::test]
async fn test_confirmed_payout_cannot_move_again() {
    let app = common::build_test_app();
    let payouts = settle_two_player_tournament(&app).await;
    let payout_id = payout_for(&payouts, "alice")["id"].as_str().unwrap().to_owned();
    let uri = format!("/api/v1/payouts/{payout_id}/status");
    common::post_json(app.router(), &uri, &serde_json::json!({ "status": "confirmed" })).await;

    let (status, json) =
        common::post_json(app.router(), &uri, &serde_json::json!({ "status": "failed" })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_state");
}

#[tokio::test]
async fn test_unknown_status_is_validation_error() {
    let app = common::build_test_app();
    let payouts = settle_two_player_tournament(&app).await;
    let payout_id = payout_for(&payouts, "alice")["id"].as_str().unwrap().to_owned();

    let (status, json) = common::post_json(
        app.router(),
        &format!("/api/v1/payouts/{payout_id}/status"),
        &serde_json::json!({ "status": "lost" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_payout_is_not_found() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        app.router(),
        "/api/v1/payouts/payout_missing/status",
        &serde_json::json!({ "status": "confirmed" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_failed_transfer_leaves_payout_failed_and_retry_reports_gateway_error() {
    // Arrange
    let app = common::build_test_app_with_transfer(RecordingTransferExecutor::failing_for(&["bob"]));
    let payouts = settle_two_player_tournament(&app).await;
    let bob = payout_for(&payouts, "bob");
    assert_eq!(bob["status"], "failed");
    assert_eq!(payout_for(&payouts, "alice")["status"], "submitted");
    let payout_id = bob["id"].as_str().unwrap().to_owned();

    // Act
    let (status, json) = common::post_json(
        app.router(),
        &format!("/api/v1/payouts/{payout_id}/retry"),
        &serde_json::json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "external_error");
    let sent_to_bob = app
        .transfer
        .sent()
        .iter()
        .filter(|p| p.participant_id == "bob")
        .count();
    assert_eq!(sent_to_bob, 2);
}

#[tokio::test]
async fn test_retry_of_submitted_payout_is_rejected() {
    let app = common::build_test_app();
    let payouts = settle_two_player_tournament(&app).await;
    let payout_id = payout_for(&payouts, "alice")["id"].as_str().unwrap().to_owned();

    let (status, json) = common::post_json(
        app.router(),
        &format!("/api/v1/payouts/{payout_id}/retry"),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_state");
}

#[tokio::test]
async fn test_failed_payout_can_be_resubmitted_by_the_operator() {
    // Arrange
    let app = common::build_test_app_with_transfer(RecordingTransferExecutor::failing_for(&["bob"]));
    let payouts = settle_two_player_tournament(&app).await;
    let payout_id = payout_for(&payouts, "bob")["id"].as_str().unwrap().to_owned();

    // Act
    let (status, json) = common::post_json(
        app.router(),
        &format!("/api/v1/payouts/{payout_id}/status"),
        &serde_json::json!({ "status": "submitted", "tx_hash": "0xmanual" }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "submitted");
    assert_eq!(json["tx_hash"], "0xmanual");
    assert_eq!(
        json["explorer_url"],
        format!("{}0xmanual", common::EXPLORER)
    );
}
