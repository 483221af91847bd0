//! Room handles and the process-wide room registry.
//!
//! Lock order is room state, then hub. A mutation publishes its event while
//! still holding the room lock, so subscribers observe events in the order
//! the room applied them, and a subscriber's replay can never interleave
//! with a concurrent broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use quizarena_core::clock::Clock;
use quizarena_core::error::DomainError;
use tracing::{info, instrument, warn};

use super::broadcast::{BroadcastHub, Subscription};
use crate::domain::fraud::FraudFlag;
use crate::domain::response::{ResponsePayload, TournamentResponse};
use crate::domain::room::{NewQuestion, QuestionRoom, RoomEvent, RoomStatus};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DomainError> {
    mutex
        .lock()
        .map_err(|_| DomainError::Infrastructure("room lock poisoned".to_owned()))
}

/// A room with its subscribers. Every mutation is serialized by the room
/// lock.
pub struct Room {
    id: String,
    state: Mutex<QuestionRoom>,
    hub: Arc<Mutex<BroadcastHub>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Room {
    /// Creates an empty room.
    #[must_use]
    pub fn new(id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(QuestionRoom::new()),
            hub: Arc::new(Mutex::new(BroadcastHub::default())),
            clock,
        }
    }

    /// Room identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn broadcast(&self, event: &RoomEvent) -> Result<(), DomainError> {
        let delivered = lock(&self.hub)?.publish(event);
        info!(room_id = %self.id, event = event.name(), delivered, "room event broadcast");
        Ok(())
    }

    /// Activates a question and broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a deadline before the opening
    /// time.
    pub fn set_active_question(&self, question: NewQuestion) -> Result<RoomStatus, DomainError> {
        let mut room = lock(&self.state)?;
        let event = room.set_active_question(question, self.clock.now())?;
        self.broadcast(&event)?;
        Ok(room.status())
    }

    /// Closes the room and broadcasts the reason.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a lock is poisoned.
    pub fn close(&self, reason: Option<String>) -> Result<RoomStatus, DomainError> {
        let mut room = lock(&self.state)?;
        let event = room.close(reason);
        self.broadcast(&event)?;
        Ok(room.status())
    }

    /// Current status.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn status(&self) -> Result<RoomStatus, DomainError> {
        Ok(lock(&self.state)?.status())
    }

    /// Copy of the fraud log.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn fraud_flags(&self) -> Result<Vec<FraudFlag>, DomainError> {
        Ok(lock(&self.state)?.fraud_flags())
    }

    /// Copy of the accepted responses for the active question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn responses(&self) -> Result<Vec<TournamentResponse>, DomainError> {
        Ok(lock(&self.state)?.responses())
    }

    /// Validates and records a response at the current server time.
    ///
    /// # Errors
    ///
    /// See [`QuestionRoom::submit_response`].
    #[instrument(skip(self, payload), fields(room_id = %self.id, participant_id = %payload.participant_id))]
    pub fn submit_response(
        &self,
        payload: ResponsePayload,
    ) -> Result<TournamentResponse, DomainError> {
        let mut room = lock(&self.state)?;
        let flags_before = room.fraud_flags().len();
        let result = room.submit_response(payload, self.clock.now());
        for flag in room.fraud_flags().iter().skip(flags_before) {
            warn!(
                reason = ?flag.reason,
                severity = ?flag.severity,
                question_id = flag.question_id.as_deref().unwrap_or_default(),
                detail = %flag.detail,
                "fraud flag raised"
            );
        }
        let response = result?;
        info!(
            question_id = %response.question_id,
            latency_ms = response.latency_ms,
            "response accepted"
        );
        Ok(response)
    }

    /// Subscribes to room events. The current question and closed state
    /// are delivered first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a lock is poisoned.
    pub fn subscribe(&self) -> Result<Subscription, DomainError> {
        let room = lock(&self.state)?;
        let (id, receiver) = lock(&self.hub)?.register(room.replay());
        Ok(Subscription::new(id, receiver, Arc::downgrade(&self.hub)))
    }

    /// Number of live subscribers.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn subscriber_count(&self) -> Result<usize, DomainError> {
        Ok(lock(&self.hub)?.subscriber_count())
    }
}

/// All rooms of the process, keyed by room id.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry").finish_non_exhaustive()
    }
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the room with `id`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank id.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<Room>, DomainError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DomainError::Validation("room id must not be empty".to_owned()));
        }
        if let Some(room) = self.get(id)? {
            return Ok(room);
        }
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| DomainError::Infrastructure("room registry lock poisoned".to_owned()))?;
        let room = rooms
            .entry(id.to_owned())
            .or_insert_with(|| Arc::new(Room::new(id, Arc::clone(&self.clock))));
        Ok(Arc::clone(room))
    }

    /// Returns the room with `id` if it exists.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Room>>, DomainError> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| DomainError::Infrastructure("room registry lock poisoned".to_owned()))?;
        Ok(rooms.get(id).cloned())
    }
}
