//! Routes for question rooms: state, responses, fraud flags and the live
//! event stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::{
    Json, Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use quizarena_core::clock::Clock;
use quizarena_core::error::DomainError;
use quizarena_room::application::registry::Room;
use quizarena_room::domain::fraud::FraudFlag;
use quizarena_room::domain::response::{ResponsePayload, TournamentResponse};
use quizarena_room::domain::room::{NewQuestion, RoomEvent, RoomStatus};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, interval_at};
use tracing::{instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Interval between keep-alive events on an idle stream.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(15);

/// Request body for POST /{room_id}/state.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomStateRequest {
    /// `close` closes the room; anything else activates a question.
    pub action: Option<String>,
    /// Question identifier.
    pub question_id: Option<String>,
    /// Prompt shown to players.
    pub prompt: Option<String>,
    /// End of the window, RFC 3339.
    pub deadline: Option<String>,
    /// Start of the window, RFC 3339; defaults to now.
    pub opened_at: Option<String>,
    /// Close reason.
    pub reason: Option<String>,
}

/// Request body for POST /{room_id}/response.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    /// Question being answered.
    pub question_id: String,
    /// Who is answering.
    pub participant_id: String,
    /// Answer text.
    pub answer: String,
    /// Client nonce.
    pub nonce: Option<String>,
    /// Client send time.
    pub client_timestamp: Option<String>,
}

/// Response body for GET /{room_id}/fraud.
#[derive(Debug, Serialize)]
pub struct FraudFlagsResponse {
    /// Every flag raised in the room, oldest first.
    pub flags: Vec<FraudFlag>,
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DomainError::Validation(format!("{field} must be an RFC 3339 timestamp")))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, DomainError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::Validation(format!("missing {field}")))
}

impl RoomStateRequest {
    fn into_question(self) -> Result<NewQuestion, DomainError> {
        let id = required("questionId", self.question_id.as_deref())?.to_owned();
        let prompt = required("prompt", self.prompt.as_deref())?.to_owned();
        let deadline = parse_timestamp("deadline", required("deadline", self.deadline.as_deref())?)?;
        let opened_at = self
            .opened_at
            .as_deref()
            .map(|raw| parse_timestamp("openedAt", raw))
            .transpose()?;
        Ok(NewQuestion {
            id,
            prompt,
            deadline,
            opened_at,
        })
    }
}

impl SubmitResponseRequest {
    fn into_payload(self) -> Result<ResponsePayload, DomainError> {
        if self.question_id.trim().is_empty()
            || self.participant_id.trim().is_empty()
            || self.answer.trim().is_empty()
        {
            return Err(DomainError::Validation(
                "missing questionId, participantId or answer".to_owned(),
            ));
        }
        Ok(ResponsePayload {
            question_id: self.question_id,
            participant_id: self.participant_id,
            answer: self.answer,
            nonce: self.nonce,
            client_timestamp: self.client_timestamp,
        })
    }
}

/// Rooms are created by the scheduler tick and by POST /{room_id}/state;
/// every other route only reads them.
fn existing_room(state: &AppState, room_id: &str) -> Result<Arc<Room>, DomainError> {
    state
        .rooms
        .get(room_id)?
        .ok_or_else(|| DomainError::not_found("room", room_id))
}

/// GET /{room_id}/state
async fn get_state(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStatus>, ApiError> {
    let room = existing_room(&state, &room_id)?;
    Ok(Json(room.status()?))
}

/// POST /{room_id}/state
#[instrument(skip(state, request))]
async fn update_state(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<RoomStateRequest>,
) -> Result<Json<RoomStatus>, ApiError> {
    let room = state.rooms.get_or_create(&room_id)?;
    let status = if request.action.as_deref() == Some("close") {
        room.close(request.reason)?
    } else {
        room.set_active_question(request.into_question()?)?
    };
    Ok(Json(status))
}

/// POST /{room_id}/response
async fn submit_response(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<SubmitResponseRequest>,
) -> Result<(StatusCode, Json<TournamentResponse>), ApiError> {
    let payload = request.into_payload()?;
    let room = existing_room(&state, &room_id)?;
    let response = room.submit_response(payload)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /{room_id}/fraud
async fn fraud_flags(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<FraudFlagsResponse>, ApiError> {
    let flags = existing_room(&state, &room_id)?.fraud_flags()?;
    Ok(Json(FraudFlagsResponse { flags }))
}

fn to_sse(event: &RoomEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!(error = %e, "room event could not be encoded");
            Event::default().comment("encoding failed")
        })
}

/// GET /{room_id}/events
///
/// Streams the room's replay, then live events, with a heartbeat while idle.
async fn events(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let room = existing_room(&state, &room_id)?;
    let subscription = room.subscribe()?;
    let heartbeat = interval_at(Instant::now() + HEARTBEAT_PERIOD, HEARTBEAT_PERIOD);
    let clock: Arc<dyn Clock> = Arc::clone(&state.clock);

    let stream = stream::unfold(
        (subscription, heartbeat, clock),
        |(mut subscription, mut heartbeat, clock)| async move {
            let event = tokio::select! {
                event = subscription.recv() => event?,
                _ = heartbeat.tick() => RoomEvent::Heartbeat { at: clock.now() },
            };
            Some((event, (subscription, heartbeat, clock)))
        },
    )
    .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(stream))
}

/// Returns the router for question rooms.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/state", get(get_state).post(update_state))
        .route("/{room_id}/response", post(submit_response))
        .route("/{room_id}/fraud", get(fraud_flags))
        .route("/{room_id}/events", get(events))
}
