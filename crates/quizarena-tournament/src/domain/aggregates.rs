//! Aggregate roots for the Tournament context.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use quizarena_core::aggregate::AggregateRoot;
use quizarena_core::clock::elapsed_ms;
use quizarena_core::error::DomainError;
use quizarena_core::event::EventMetadata;
use quizarena_core::money::{BPS_DENOMINATOR, net_of};
use quizarena_core::repository::{EntryAnswer, TournamentEntry, TournamentRecord};
use quizarena_settlement::application::worker::SettlementOutcome;
use quizarena_settlement::domain::ranking::TournamentResults;
use serde::Serialize;
use uuid::Uuid;

use super::commands::CreateTournament;
use super::events::{
    Answer, AnswerRecorded, PhaseChanged, PlayerJoined, PlayerWithdrawn, Question,
    QuestionStarted, TournamentCreated, TournamentEvent, TournamentEventKind, TournamentPayout,
    TournamentSettled, TournamentState,
};

/// Answer window used when a question does not set its own.
pub const DEFAULT_QUESTION_WINDOW_SECONDS: u32 = 14;

impl Question {
    /// How long this question accepts answers.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::from(
            self.timeout_seconds.unwrap_or(DEFAULT_QUESTION_WINDOW_SECONDS),
        ))
    }
}

/// Contributions collected for a tournament. `net` is recomputed on every
/// change, so it always equals `gross − floor(gross × rake_bps / 10_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pot {
    gross: u64,
    rake_bps: u32,
    net: u64,
}

impl Pot {
    /// An empty pot with the given rake.
    #[must_use]
    pub fn new(rake_bps: u32) -> Self {
        Self {
            gross: 0,
            rake_bps,
            net: 0,
        }
    }

    /// Sum of contributions.
    #[must_use]
    pub fn gross(&self) -> u64 {
        self.gross
    }

    /// Operator rake in basis points.
    #[must_use]
    pub fn rake_bps(&self) -> u32 {
        self.rake_bps
    }

    /// Distributable amount.
    #[must_use]
    pub fn net(&self) -> u64 {
        self.net
    }

    fn credit(&mut self, amount: u64) {
        self.gross = self.gross.saturating_add(amount);
        self.net = net_of(self.gross, self.rake_bps);
    }

    fn debit(&mut self, amount: u64) {
        self.gross = self.gross.saturating_sub(amount);
        self.net = net_of(self.gross, self.rake_bps);
    }
}

/// A participant's place in a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    /// Participant identifier.
    pub participant_id: String,
    /// When they joined.
    pub joined_at: DateTime<Utc>,
    /// Amount they put in the pot.
    pub contribution: u64,
}

/// The aggregate root for a tournament.
#[derive(Debug)]
pub struct Tournament {
    /// Aggregate identifier.
    pub id: Uuid,
    pub(crate) version: i64,
    pub(crate) name: String,
    pub(crate) state: TournamentState,
    pub(crate) entry_fee: u64,
    pub(crate) rake_bps: u32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) scheduled_at: DateTime<Utc>,
    pub(crate) open_at: DateTime<Utc>,
    pub(crate) start_at: DateTime<Utc>,
    pub(crate) locked_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) settled_at: Option<DateTime<Utc>>,
    pub(crate) current_question_index: Option<usize>,
    pub(crate) current_question_start: Option<DateTime<Utc>>,
    pub(crate) questions: Vec<Question>,
    pub(crate) players: Vec<PlayerEntry>,
    pub(crate) answers: Vec<Answer>,
    pub(crate) pot: Pot,
    pub(crate) payouts: Vec<TournamentPayout>,
    pub(crate) merkle_root: Option<String>,
    /// Set while the scheduler is running settlement outside the lock.
    pub(crate) settlement_in_flight: bool,
    uncommitted_events: Vec<TournamentEvent>,
}

fn validate(command: &CreateTournament) -> Result<(), DomainError> {
    if command.name.trim().is_empty() {
        return Err(DomainError::Validation("name must not be empty".to_owned()));
    }
    if command.entry_fee == 0 {
        return Err(DomainError::Validation("entry_fee must be positive".to_owned()));
    }
    if command.rake_bps > BPS_DENOMINATOR {
        return Err(DomainError::Validation(format!(
            "rake_bps must be at most {BPS_DENOMINATOR}"
        )));
    }
    if command.scheduled_at > command.open_at || command.open_at > command.start_at {
        return Err(DomainError::Validation(
            "expected scheduled_at <= open_at <= start_at".to_owned(),
        ));
    }
    if command.questions.is_empty() {
        return Err(DomainError::Validation(
            "at least one question is required".to_owned(),
        ));
    }

    let mut seen = HashSet::new();
    for question in &command.questions {
        if question.id.is_empty() || !seen.insert(question.id.as_str()) {
            return Err(DomainError::Validation(format!(
                "question ids must be unique and non-empty: {:?}",
                question.id
            )));
        }
        if question.options.len() < 2 {
            return Err(DomainError::Validation(format!(
                "question {} needs at least two options",
                question.id
            )));
        }
        if usize::try_from(question.correct_option).map_or(true, |i| i >= question.options.len())
        {
            return Err(DomainError::Validation(format!(
                "question {} correct_option out of range",
                question.id
            )));
        }
        if question.timeout_seconds == Some(0) {
            return Err(DomainError::Validation(format!(
                "question {} timeout must be positive",
                question.id
            )));
        }
    }
    Ok(())
}

fn wrong_phase(action: &str, required: TournamentState, current: TournamentState) -> DomainError {
    DomainError::InvalidState(format!(
        "{action}: tournament must be {required}, but is {current}"
    ))
}

impl Tournament {
    fn empty(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 0,
            name: String::new(),
            state: TournamentState::Scheduled,
            entry_fee: 0,
            rake_bps: 0,
            created_at: now,
            scheduled_at: now,
            open_at: now,
            start_at: now,
            locked_at: None,
            finished_at: None,
            settled_at: None,
            current_question_index: None,
            current_question_start: None,
            questions: Vec::new(),
            players: Vec::new(),
            answers: Vec::new(),
            pot: Pot::new(0),
            payouts: Vec::new(),
            merkle_root: None,
            settlement_in_flight: false,
            uncommitted_events: Vec::new(),
        }
    }

    /// Creates a `scheduled` tournament with an empty pot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank, the entry fee is
    /// zero, the rake exceeds 10 000 bps, the schedule is out of order, or any
    /// question is malformed.
    pub fn create(
        id: Uuid,
        command: &CreateTournament,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate(command)?;

        let mut tournament = Self::empty(id, now);
        tournament.record(
            TournamentEventKind::TournamentCreated(TournamentCreated {
                tournament_id: id,
                name: command.name.trim().to_owned(),
                entry_fee: command.entry_fee,
                rake_bps: command.rake_bps,
                scheduled_at: command.scheduled_at,
                open_at: command.open_at,
                start_at: command.start_at,
                questions: command.questions.clone(),
            }),
            command.correlation_id,
            now,
        );
        Ok(tournament)
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> TournamentState {
        self.state
    }

    /// Current pot.
    #[must_use]
    pub fn pot(&self) -> Pot {
        self.pot
    }

    /// Whether `participant_id` holds an entry.
    #[must_use]
    pub fn has_player(&self, participant_id: &str) -> bool {
        self.players.iter().any(|p| p.participant_id == participant_id)
    }

    /// The active question, its index, and when it started. `None` outside
    /// `in_progress`.
    #[must_use]
    pub fn current_question(&self) -> Option<(usize, &Question, DateTime<Utc>)> {
        if self.state != TournamentState::InProgress {
            return None;
        }
        let index = self.current_question_index?;
        let question = self.questions.get(index)?;
        let started_at = self.current_question_start?;
        Some((index, question, started_at))
    }

    fn record(&mut self, kind: TournamentEventKind, correlation_id: Uuid, now: DateTime<Utc>) {
        let event = TournamentEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.version + 1,
                correlation_id,
                occurred_at: now,
            },
            kind,
        };
        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    fn change_phase(&mut self, to: TournamentState, correlation_id: Uuid, now: DateTime<Utc>) {
        self.record(
            TournamentEventKind::PhaseChanged(PhaseChanged {
                tournament_id: self.id,
                from: self.state,
                to,
                at: now,
            }),
            correlation_id,
            now,
        );
    }

    fn start_question(&mut self, index: usize, correlation_id: Uuid, now: DateTime<Utc>) {
        let Some(question) = self.questions.get(index) else {
            return;
        };
        let kind = TournamentEventKind::QuestionStarted(QuestionStarted {
            tournament_id: self.id,
            index,
            question_id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            started_at: now,
            deadline: now + question.window(),
        });
        self.record(kind, correlation_id, now);
    }

    /// Applies one phase step if one is due at `now`. Returns whether
    /// anything changed.
    fn step(&mut self, correlation_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.state {
            TournamentState::Scheduled if now >= self.open_at => {
                self.change_phase(TournamentState::Open, correlation_id, now);
                true
            }
            TournamentState::Open if now >= self.start_at => {
                self.change_phase(TournamentState::Locked, correlation_id, now);
                true
            }
            TournamentState::Locked if now >= self.start_at => {
                self.change_phase(TournamentState::InProgress, correlation_id, now);
                self.start_question(0, correlation_id, now);
                true
            }
            TournamentState::InProgress => {
                let Some((index, question, started_at)) = self.current_question() else {
                    self.start_question(0, correlation_id, now);
                    return self.current_question_index.is_some();
                };
                if now - started_at < question.window() {
                    return false;
                }
                if index + 1 < self.questions.len() {
                    self.start_question(index + 1, correlation_id, now);
                } else {
                    self.change_phase(TournamentState::Finished, correlation_id, now);
                }
                true
            }
            _ => false,
        }
    }

    /// Applies every phase step due at `now`, so one call catches up across
    /// several phases. Settlement is not part of this; see the scheduler.
    ///
    /// Returns whether the tournament changed.
    pub fn advance(&mut self, correlation_id: Uuid, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        while self.step(correlation_id, now) {
            changed = true;
        }
        changed
    }

    /// Joins `participant_id`, adding `contribution` (default: the entry fee)
    /// to the pot. Re-joining is a no-op.
    ///
    /// Every entry pays exactly the entry fee, so the pot gross always equals
    /// entries times the buy-in that settlement charges.
    ///
    /// Returns whether a new entry was created.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the tournament is `open`,
    /// and `DomainError::Validation` for a blank participant, a contribution
    /// other than the entry fee, or a pot that would overflow.
    pub fn join(
        &mut self,
        participant_id: &str,
        contribution: Option<u64>,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        if self.state != TournamentState::Open {
            return Err(wrong_phase("join", TournamentState::Open, self.state));
        }
        if participant_id.trim().is_empty() {
            return Err(DomainError::Validation(
                "participant_id must not be empty".to_owned(),
            ));
        }
        if self.has_player(participant_id) {
            return Ok(false);
        }

        let contribution = contribution.unwrap_or(self.entry_fee);
        if contribution == 0 {
            return Err(DomainError::Validation(
                "contribution must be positive".to_owned(),
            ));
        }
        if contribution != self.entry_fee {
            return Err(DomainError::Validation(format!(
                "contribution must equal the entry fee of {}, got {contribution}",
                self.entry_fee
            )));
        }
        if self.pot.gross().checked_add(contribution).is_none() {
            return Err(DomainError::Validation("pot would overflow".to_owned()));
        }

        self.record(
            TournamentEventKind::PlayerJoined(PlayerJoined {
                tournament_id: self.id,
                participant_id: participant_id.to_owned(),
                contribution,
                joined_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(true)
    }

    /// Removes `participant_id`'s entry and takes their contribution back out
    /// of the pot. Returns the amount removed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the tournament is `open`,
    /// and `DomainError::NotFound` if the participant has no entry.
    pub fn withdraw(
        &mut self,
        participant_id: &str,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        if self.state != TournamentState::Open {
            return Err(wrong_phase("withdraw", TournamentState::Open, self.state));
        }
        let contribution = self
            .players
            .iter()
            .find(|p| p.participant_id == participant_id)
            .map(|p| p.contribution)
            .ok_or_else(|| DomainError::not_found("entry", participant_id))?;

        self.record(
            TournamentEventKind::PlayerWithdrawn(PlayerWithdrawn {
                tournament_id: self.id,
                participant_id: participant_id.to_owned(),
                contribution,
            }),
            correlation_id,
            now,
        );
        Ok(contribution)
    }

    /// Answers the active question. The first answer per participant and
    /// question wins; a repeat returns the stored answer unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the tournament is
    /// `in_progress` with an active question, and `DomainError::Validation`
    /// for a participant without an entry or an option out of range.
    pub fn submit_answer(
        &mut self,
        participant_id: &str,
        option_index: u32,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Answer, DomainError> {
        if self.state != TournamentState::InProgress {
            return Err(wrong_phase(
                "submit answer",
                TournamentState::InProgress,
                self.state,
            ));
        }
        let Some((_, question, started_at)) = self.current_question() else {
            return Err(DomainError::InvalidState("no active question".to_owned()));
        };
        if !self.has_player(participant_id) {
            return Err(DomainError::Validation(format!(
                "participant {participant_id} has not joined this tournament"
            )));
        }
        if usize::try_from(option_index).map_or(true, |i| i >= question.options.len()) {
            return Err(DomainError::Validation(format!(
                "option_index {option_index} out of range for question {}",
                question.id
            )));
        }

        if let Some(existing) = self
            .answers
            .iter()
            .find(|a| a.participant_id == participant_id && a.question_id == question.id)
        {
            return Ok(existing.clone());
        }

        let answer = Answer {
            tournament_id: self.id,
            question_id: question.id.clone(),
            participant_id: participant_id.to_owned(),
            option_index,
            submitted_at: now,
            latency_ms: elapsed_ms(started_at, now),
        };
        self.record(
            TournamentEventKind::AnswerRecorded(AnswerRecorded {
                answer: answer.clone(),
            }),
            correlation_id,
            now,
        );
        Ok(answer)
    }

    /// Whether settlement should run now.
    #[must_use]
    pub fn awaiting_settlement(&self) -> bool {
        self.state == TournamentState::Finished
            && self.settled_at.is_none()
            && !self.settlement_in_flight
    }

    /// Snapshot handed to the settlement repository.
    #[must_use]
    pub fn settlement_record(&self) -> TournamentRecord {
        let entries = self
            .players
            .iter()
            .map(|player| TournamentEntry {
                participant_id: player.participant_id.clone(),
                answers: self
                    .answers
                    .iter()
                    .filter(|a| a.participant_id == player.participant_id)
                    .map(|a| EntryAnswer {
                        question_id: a.question_id.clone(),
                        option_index: a.option_index,
                        latency_ms: a.latency_ms,
                    })
                    .collect(),
            })
            .collect();

        TournamentRecord {
            id: self.id,
            buy_in: self.entry_fee,
            rake_bps: self.rake_bps,
            entries,
        }
    }

    /// Answer key for settlement.
    #[must_use]
    pub fn answer_key(&self) -> TournamentResults {
        TournamentResults {
            correct_options: self
                .questions
                .iter()
                .map(|q| (q.id.clone(), q.correct_option))
                .collect(),
        }
    }

    /// Records a completed settlement and moves to `settled`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the tournament is
    /// `finished` and not yet settled.
    pub fn mark_settled(
        &mut self,
        outcome: &SettlementOutcome,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.state != TournamentState::Finished || self.settled_at.is_some() {
            return Err(wrong_phase("settle", TournamentState::Finished, self.state));
        }

        let payouts = outcome
            .payouts
            .iter()
            .map(|payout| {
                let stats = outcome
                    .ranking
                    .iter()
                    .find(|row| row.participant_id == payout.participant_id);
                TournamentPayout {
                    participant_id: payout.participant_id.clone(),
                    amount: payout.amount,
                    rank: payout.rank,
                    correct_count: stats.map_or(0, |r| r.correct_count),
                    average_latency_ms: stats.map_or(0, |r| r.average_latency_ms),
                }
            })
            .collect();

        self.record(
            TournamentEventKind::TournamentSettled(TournamentSettled {
                tournament_id: self.id,
                payouts,
                merkle_root: outcome.merkle_root.clone(),
                settled_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }
}

impl AggregateRoot for Tournament {
    type Event = TournamentEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            TournamentEventKind::TournamentCreated(payload) => {
                self.name.clone_from(&payload.name);
                self.entry_fee = payload.entry_fee;
                self.rake_bps = payload.rake_bps;
                self.created_at = event.metadata.occurred_at;
                self.scheduled_at = payload.scheduled_at;
                self.open_at = payload.open_at;
                self.start_at = payload.start_at;
                self.questions.clone_from(&payload.questions);
                self.state = TournamentState::Scheduled;
                self.pot = Pot::new(payload.rake_bps);
            }
            TournamentEventKind::PhaseChanged(payload) => {
                self.state = payload.to;
                match payload.to {
                    TournamentState::Locked => self.locked_at = Some(payload.at),
                    TournamentState::Finished => self.finished_at = Some(payload.at),
                    _ => {}
                }
            }
            TournamentEventKind::QuestionStarted(payload) => {
                self.current_question_index = Some(payload.index);
                self.current_question_start = Some(payload.started_at);
            }
            TournamentEventKind::PlayerJoined(payload) => {
                self.players.push(PlayerEntry {
                    participant_id: payload.participant_id.clone(),
                    joined_at: payload.joined_at,
                    contribution: payload.contribution,
                });
                self.pot.credit(payload.contribution);
            }
            TournamentEventKind::PlayerWithdrawn(payload) => {
                self.players
                    .retain(|p| p.participant_id != payload.participant_id);
                self.pot.debit(payload.contribution);
            }
            TournamentEventKind::AnswerRecorded(payload) => {
                self.answers.push(payload.answer.clone());
            }
            TournamentEventKind::TournamentSettled(payload) => {
                self.state = TournamentState::Settled;
                self.settled_at = Some(payload.settled_at);
                self.payouts.clone_from(&payload.payouts);
                self.merkle_root = Some(payload.merkle_root.clone());
                self.settlement_in_flight = false;
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
