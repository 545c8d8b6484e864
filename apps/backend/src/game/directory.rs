use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, info};

use super::member::Member;
use super::room::RoomSession;
use super::rules::GameRules;
use crate::error::AppError;
use crate::store::CoordinationStore;
use crate::words::WordService;

/// Attempts at joining before giving up on a room that keeps closing
/// underneath the caller.
const JOIN_ATTEMPTS: usize = 3;

/// Process-local registry of active room sessions.
pub struct Directory {
    rooms: DashMap<String, Arc<RoomSession>>,
    store: Arc<dyn CoordinationStore>,
    words: Arc<dyn WordService>,
    rules: GameRules,
    this: Weak<Directory>,
}

impl Directory {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        words: Arc<dyn WordService>,
        rules: GameRules,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            rooms: DashMap::new(),
            store,
            words,
            rules,
            this: this.clone(),
        })
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    pub fn words(&self) -> &Arc<dyn WordService> {
        &self.words
    }

    pub fn get(&self, room: &str) -> Option<Arc<RoomSession>> {
        self.rooms.get(room).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Cached session for `room`, created and subscribed on first use.
    pub async fn find_or_create(&self, room: &str) -> Result<Arc<RoomSession>, AppError> {
        let session = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| {
                debug!(room, "[ROOM] Creating session");
                Arc::new(RoomSession::new(
                    room,
                    self.store.clone(),
                    self.words.clone(),
                    self.rules.clone(),
                    self.this.clone(),
                ))
            })
            .value()
            .clone();

        if let Err(err) = session.ensure_started().await {
            if session.local_count() == 0 {
                self.remove(room, &session);
            }
            return Err(err);
        }
        Ok(session)
    }

    /// Drop the entry for `room` only if it still maps to `session`.
    pub fn remove(&self, room: &str, session: &Arc<RoomSession>) -> bool {
        let removed = self
            .rooms
            .remove_if(room, |_, current| Arc::ptr_eq(current, session))
            .is_some();
        if removed {
            info!(room, "[ROOM] Session removed from directory");
        }
        removed
    }

    /// Join `member` to `room`, retrying when the session found was torn
    /// down before the join got in.
    pub async fn join(&self, room: &str, member: Member) -> Result<Arc<RoomSession>, AppError> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let session = self.find_or_create(room).await?;
            match session.join(member.clone()).await {
                Ok(()) => return Ok(session),
                Err(err) if err.is_room_closed() => {
                    debug!(room, attempt, "[ROOM] Session closed during join, retrying");
                    self.remove(room, &session);
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::room_closed(room))
    }
}
