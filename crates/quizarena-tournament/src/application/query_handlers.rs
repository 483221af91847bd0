//! Query handlers for the Tournament context.
//!
//! Reads never advance phases; they report the state as of the last tick or
//! command.

use chrono::{DateTime, Utc};
use quizarena_core::aggregate::AggregateRoot;
use quizarena_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use crate::application::scheduler::TournamentScheduler;
use crate::domain::aggregates::{PlayerEntry, Pot, Tournament};
use crate::domain::events::{TournamentPayout, TournamentState};

/// Read-only view of a tournament.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentView {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Display name.
    pub name: String,
    /// Current phase.
    pub state: TournamentState,
    /// Default contribution per player.
    pub entry_fee: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Announcement time.
    pub scheduled_at: DateTime<Utc>,
    /// When joins open.
    pub open_at: DateTime<Utc>,
    /// When play starts.
    pub start_at: DateTime<Utc>,
    /// When joins closed.
    pub locked_at: Option<DateTime<Utc>>,
    /// When the last question timed out.
    pub finished_at: Option<DateTime<Utc>>,
    /// When settlement completed.
    pub settled_at: Option<DateTime<Utc>>,
    /// Index of the active question while in progress.
    pub current_question_index: Option<usize>,
    /// Number of questions.
    pub question_count: usize,
    /// Entries.
    pub players: Vec<PlayerEntry>,
    /// Accepted answers so far.
    pub answer_count: usize,
    /// Current pot.
    pub pot: Pot,
    /// Payouts once settled.
    pub payouts: Vec<TournamentPayout>,
    /// Merkle root over the final ranking once settled.
    pub merkle_root: Option<String>,
    /// Current version (event count).
    pub version: i64,
}

impl From<&Tournament> for TournamentView {
    fn from(t: &Tournament) -> Self {
        Self {
            tournament_id: t.id,
            name: t.name.clone(),
            state: t.state,
            entry_fee: t.entry_fee,
            rake_bps: t.rake_bps,
            created_at: t.created_at,
            scheduled_at: t.scheduled_at,
            open_at: t.open_at,
            start_at: t.start_at,
            locked_at: t.locked_at,
            finished_at: t.finished_at,
            settled_at: t.settled_at,
            current_question_index: t.current_question().map(|(index, _, _)| index),
            question_count: t.questions.len(),
            players: t.players.clone(),
            answer_count: t.answers.len(),
            pot: t.pot,
            payouts: t.payouts.clone(),
            merkle_root: t.merkle_root.clone(),
            version: t.version(),
        }
    }
}

/// Listing entry for an active tournament.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentSummary {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Display name.
    pub name: String,
    /// Current phase.
    pub state: TournamentState,
    /// When play starts.
    pub start_at: DateTime<Utc>,
    /// Current pot.
    pub pot: Pot,
    /// Number of questions.
    pub question_count: usize,
}

/// The active question as players see it. Never includes the answer.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentQuestionView {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Zero-based position in the question set.
    pub index: usize,
    /// Question identifier.
    pub question_id: String,
    /// Prompt.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// When the question opened.
    pub started_at: DateTime<Utc>,
    /// When its window closes.
    pub deadline: DateTime<Utc>,
}

impl TournamentScheduler {
    /// Retrieves a tournament.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no tournament has the id.
    pub async fn get_tournament(&self, tournament_id: Uuid) -> Result<TournamentView, DomainError> {
        let handle = self.handle(tournament_id).await?;
        let tournament = handle.lock().await;
        Ok(TournamentView::from(&*tournament))
    }

    /// Retrieves a tournament's phase.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no tournament has the id.
    pub async fn state(&self, tournament_id: Uuid) -> Result<TournamentState, DomainError> {
        let handle = self.handle(tournament_id).await?;
        let tournament = handle.lock().await;
        Ok(tournament.state())
    }

    /// Retrieves the active question, if the tournament is in progress.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no tournament has the id.
    pub async fn current_question(
        &self,
        tournament_id: Uuid,
    ) -> Result<Option<CurrentQuestionView>, DomainError> {
        let handle = self.handle(tournament_id).await?;
        let tournament = handle.lock().await;
        Ok(tournament
            .current_question()
            .map(|(index, question, started_at)| CurrentQuestionView {
                tournament_id,
                index,
                question_id: question.id.clone(),
                text: question.text.clone(),
                options: question.options.clone(),
                started_at,
                deadline: started_at + question.window(),
            }))
    }

    /// Retrieves payouts of a settled tournament.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no tournament has the id and
    /// `DomainError::InvalidState` if it is not settled yet.
    pub async fn result(&self, tournament_id: Uuid) -> Result<Vec<TournamentPayout>, DomainError> {
        let handle = self.handle(tournament_id).await?;
        let tournament = handle.lock().await;
        if tournament.state() != TournamentState::Settled {
            return Err(DomainError::InvalidState(format!(
                "tournament is not settled yet; it is {}",
                tournament.state()
            )));
        }
        Ok(tournament.payouts.clone())
    }

    /// Lists tournaments that are not settled, soonest start first.
    pub async fn active_tournaments(&self) -> Vec<TournamentSummary> {
        let mut summaries = Vec::new();
        for handle in self.handles().await {
            let t = handle.lock().await;
            if t.state() == TournamentState::Settled {
                continue;
            }
            summaries.push(TournamentSummary {
                tournament_id: t.id,
                name: t.name.clone(),
                state: t.state(),
                start_at: t.start_at,
                pot: t.pot(),
                question_count: t.questions.len(),
            });
        }
        summaries.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.name.cmp(&b.name)));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use quizarena_core::transfer::UnconfiguredTransferExecutor;
    use quizarena_settlement::application::worker::SettlementWorker;
    use quizarena_store::InMemorySettlementRepository;
    use quizarena_test_support::{ManualClock, fixed_now};

    use super::*;
    use crate::domain::commands::CreateTournament;
    use crate::domain::events::Question;

    fn scheduler(clock: Arc<ManualClock>) -> TournamentScheduler {
        TournamentScheduler::new(
            clock,
            SettlementWorker::new(
                Arc::new(InMemorySettlementRepository::new()),
                "https://worldchain.explorer/tx/".to_owned(),
            ),
            Arc::new(UnconfiguredTransferExecutor),
        )
    }

    fn command(name: &str, start_in_seconds: i64) -> CreateTournament {
        let now = fixed_now();
        CreateTournament {
            correlation_id: Uuid::new_v4(),
            name: name.to_owned(),
            entry_fee: 10,
            rake_bps: 1_000,
            scheduled_at: now,
            open_at: now,
            start_at: now + Duration::seconds(start_in_seconds),
            questions: vec![Question {
                id: "q1".to_owned(),
                text: "Red planet?".to_owned(),
                options: vec!["Mars".to_owned(), "Venus".to_owned()],
                correct_option: 0,
                timeout_seconds: Some(10),
            }],
        }
    }

    #[tokio::test]
    async fn test_get_tournament_unknown_id_returns_not_found() {
        let scheduler = scheduler(Arc::new(ManualClock::new(fixed_now())));

        let result = scheduler.get_tournament(Uuid::new_v4()).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reads_do_not_advance_phases() {
        // Arrange
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let scheduler = scheduler(clock.clone());
        let id = scheduler
            .create_tournament(&command("Quiz", 30))
            .await
            .unwrap()
            .tournament_id;
        clock.advance(Duration::seconds(45));

        // Act
        let state = scheduler.state(id).await.unwrap();
        let question = scheduler.current_question(id).await.unwrap();

        // Assert
        assert_eq!(state, TournamentState::Open);
        assert!(question.is_none());
    }

    #[tokio::test]
    async fn test_current_question_hides_correct_option_and_reports_deadline() {
        // Arrange
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let scheduler = scheduler(clock);
        let id = scheduler
            .create_tournament(&command("Quiz", 30))
            .await
            .unwrap()
            .tournament_id;
        let start = fixed_now() + Duration::seconds(30);
        scheduler.tick(start).await;

        // Act
        let question = scheduler.current_question(id).await.unwrap().unwrap();

        // Assert
        assert_eq!(question.question_id, "q1");
        assert_eq!(question.deadline, start + Duration::seconds(10));
        let json = serde_json::to_value(&question).unwrap();
        assert!(json.get("correct_option").is_none());
    }

    #[tokio::test]
    async fn test_result_before_settlement_is_invalid_state() {
        let scheduler = scheduler(Arc::new(ManualClock::new(fixed_now())));
        let id = scheduler
            .create_tournament(&command("Quiz", 30))
            .await
            .unwrap()
            .tournament_id;

        let result = scheduler.result(id).await;

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_active_tournaments_sorted_by_start_and_excludes_settled() {
        // Arrange
        let scheduler = scheduler(Arc::new(ManualClock::new(fixed_now())));
        scheduler.create_tournament(&command("Late", 600)).await.unwrap();
        scheduler.create_tournament(&command("Early", 60)).await.unwrap();
        let settled = scheduler
            .create_tournament(&command("Done", 30))
            .await
            .unwrap()
            .tournament_id;
        let start = fixed_now() + Duration::seconds(30);
        scheduler.tick(start).await;
        scheduler.tick(start + Duration::seconds(10)).await;
        scheduler.wait_for_settlements().await;

        // Act
        let active = scheduler.active_tournaments().await;

        // Assert
        let names: Vec<&str> = active.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Early", "Late"]);
        assert_eq!(
            scheduler.state(settled).await.unwrap(),
            TournamentState::Settled
        );
        assert!(scheduler.result(settled).await.unwrap().is_empty());
    }
}
