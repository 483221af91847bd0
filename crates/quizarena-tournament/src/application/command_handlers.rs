//! Command handlers for the Tournament context.
//!
//! Each handler locks the target tournament, advances it to the current
//! clock reading so admission matches wall-clock time between ticks, then
//! executes the command. Events stay on the aggregate until the next tick
//! drains them.

use quizarena_core::command::Command;
use quizarena_core::error::DomainError;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::query_handlers::TournamentView;
use crate::application::scheduler::TournamentScheduler;
use crate::domain::aggregates::Tournament;
use crate::domain::commands::{CreateTournament, JoinTournament, SubmitAnswer, WithdrawEntry};
use crate::domain::events::{Answer, TournamentState};

impl TournamentScheduler {
    /// Handles the `CreateTournament` command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the command is malformed.
    #[instrument(skip(self, command), fields(command_type = command.command_type(), correlation_id = %command.correlation_id))]
    pub async fn create_tournament(
        &self,
        command: &CreateTournament,
    ) -> Result<TournamentView, DomainError> {
        let now = self.clock.now();
        let mut tournament = Tournament::create(Uuid::new_v4(), command, now)?;
        tournament.advance(command.correlation_id, now);
        let view = TournamentView::from(&tournament);
        self.insert(tournament).await;

        info!(
            tournament_id = %view.tournament_id,
            name = %view.name,
            questions = view.question_count,
            "tournament created"
        );
        Ok(view)
    }

    /// Handles the `JoinTournament` command. Joining twice returns the
    /// tournament unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown tournament,
    /// `DomainError::InvalidState` unless it is `open`, and
    /// `DomainError::Validation` for a bad participant or contribution.
    #[instrument(skip(self, command), fields(command_type = command.command_type(), correlation_id = %command.correlation_id, tournament_id = %command.tournament_id))]
    pub async fn join(&self, command: &JoinTournament) -> Result<TournamentView, DomainError> {
        let handle = self.handle(command.tournament_id).await?;
        let mut tournament = handle.lock().await;
        let now = self.clock.now();
        tournament.advance(command.correlation_id, now);

        let joined = tournament.join(
            &command.participant_id,
            command.contribution,
            command.correlation_id,
            now,
        )?;
        if joined {
            info!(
                participant_id = %command.participant_id,
                gross = tournament.pot().gross(),
                net = tournament.pot().net(),
                "player joined"
            );
        }
        Ok(TournamentView::from(&*tournament))
    }

    /// Handles the `SubmitAnswer` command. The first answer per participant
    /// and question wins.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown tournament,
    /// `DomainError::InvalidState` outside `in_progress`, and
    /// `DomainError::Validation` for a non-player or an option out of range.
    #[instrument(skip(self, command), fields(command_type = command.command_type(), correlation_id = %command.correlation_id, tournament_id = %command.tournament_id))]
    pub async fn submit_answer(&self, command: &SubmitAnswer) -> Result<Answer, DomainError> {
        let handle = self.handle(command.tournament_id).await?;
        let mut tournament = handle.lock().await;
        let now = self.clock.now();
        tournament.advance(command.correlation_id, now);

        let answer = tournament.submit_answer(
            &command.participant_id,
            command.option_index,
            command.correlation_id,
            now,
        )?;
        info!(
            participant_id = %answer.participant_id,
            question_id = %answer.question_id,
            latency_ms = answer.latency_ms,
            "answer accepted"
        );
        Ok(answer)
    }

    /// Handles the `WithdrawEntry` command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown tournament or entry and
    /// `DomainError::InvalidState` unless the tournament is `open`.
    #[instrument(skip(self, command), fields(command_type = command.command_type(), correlation_id = %command.correlation_id, tournament_id = %command.tournament_id))]
    pub async fn withdraw(&self, command: &WithdrawEntry) -> Result<TournamentView, DomainError> {
        let handle = self.handle(command.tournament_id).await?;
        let mut tournament = handle.lock().await;
        let now = self.clock.now();
        tournament.advance(command.correlation_id, now);

        let refunded = tournament.withdraw(&command.participant_id, command.correlation_id, now)?;
        info!(
            participant_id = %command.participant_id,
            refunded,
            "player withdrawn"
        );
        Ok(TournamentView::from(&*tournament))
    }

    /// Confirms the tournament is `open` at the current clock reading.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown tournament and
    /// `DomainError::InvalidState` unless it is `open`.
    pub async fn ensure_accepting_joins(
        &self,
        tournament_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<TournamentView, DomainError> {
        let handle = self.handle(tournament_id).await?;
        let mut tournament = handle.lock().await;
        tournament.advance(correlation_id, self.clock.now());
        if tournament.state() != TournamentState::Open {
            return Err(DomainError::InvalidState(format!(
                "tournament is not accepting new players; it is {}",
                tournament.state()
            )));
        }
        Ok(TournamentView::from(&*tournament))
    }
}
