//! The scheduler tick loop and the bridge from tournament events to rooms.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quizarena_room::application::registry::RoomRegistry;
use quizarena_room::domain::room::NewQuestion;
use quizarena_tournament::domain::events::{TournamentEvent, TournamentEventKind, TournamentState};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::state::AppState;

/// Close reason broadcast when a tournament runs out of questions.
pub const FINISHED_CLOSE_REASON: &str = "tournament_finished";

/// Applies tournament events to their rooms: a started question becomes the
/// room's active question, and finishing the tournament closes the room.
pub fn forward_events(rooms: &RoomRegistry, events: &[TournamentEvent]) {
    for event in events {
        let result = match &event.kind {
            TournamentEventKind::QuestionStarted(started) => rooms
                .get_or_create(&started.tournament_id.to_string())
                .and_then(|room| {
                    room.set_active_question(NewQuestion {
                        id: started.question_id.clone(),
                        prompt: started.text.clone(),
                        deadline: started.deadline,
                        opened_at: Some(started.started_at),
                    })
                })
                .map(|_| ()),
            TournamentEventKind::PhaseChanged(changed) if changed.to == TournamentState::Finished => {
                rooms
                    .get_or_create(&changed.tournament_id.to_string())
                    .and_then(|room| room.close(Some(FINISHED_CLOSE_REASON.to_owned())))
                    .map(|_| ())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!(event_type = event.kind.event_type(), error = %e, "could not forward event to room");
        }
    }
}

/// Runs one tick at `now` and forwards its events. Returns the event count.
pub async fn run_tick(state: &AppState, now: DateTime<Utc>) -> usize {
    let events = state.scheduler.tick(now).await;
    forward_events(&state.rooms, &events);
    events.len()
}

/// Spawns the background tick loop.
pub fn spawn(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "scheduler tick loop started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            run_tick(&state, state.clock.now()).await;
        }
    })
}
