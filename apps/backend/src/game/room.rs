//! Per-room session: local members, the relay task, the round timer, and
//! every game-state decision for the room.
//!
//! Authoritative state lives in the coordination store. A session only
//! caches which connections are local and relays published events to them.
//! Decisions taken on this process, from a command or from a relayed event,
//! run under the session's decision lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::directory::Directory;
use super::keys::RoomKeys;
use super::member::Member;
use super::rules::{skip_majority, GameRules};
use crate::error::AppError;
use crate::store::{CoordinationStore, Subscription};
use crate::words::WordService;
use crate::ws::protocol::{Envelope, Verb, CORRECT, END_TIME, GUESSER, SCORE, WORD};

pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Trimmed, case-insensitive comparison of a guess with the secret word.
pub fn guess_matches(word: &str, guess: &str) -> bool {
    word.trim().to_lowercase() == guess.trim().to_lowercase()
}

pub struct RoomSession {
    name: String,
    keys: RoomKeys,
    store: Arc<dyn CoordinationStore>,
    words: Arc<dyn WordService>,
    rules: GameRules,
    members: Mutex<Vec<Member>>,
    decision: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    started: OnceCell<()>,
    shutdown: CancellationToken,
    directory: Weak<Directory>,
}

impl RoomSession {
    pub fn new(
        name: &str,
        store: Arc<dyn CoordinationStore>,
        words: Arc<dyn WordService>,
        rules: GameRules,
        directory: Weak<Directory>,
    ) -> Self {
        Self {
            name: name.to_string(),
            keys: RoomKeys::new(name),
            store,
            words,
            rules,
            members: Mutex::new(Vec::new()),
            decision: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            started: OnceCell::new(),
            shutdown: CancellationToken::new(),
            directory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &RoomKeys {
        &self.keys
    }

    pub fn local_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn has_local(&self, player: &str) -> bool {
        self.members.lock().iter().any(|m| m.name == player)
    }

    pub fn has_connection(&self, conn_id: Uuid) -> bool {
        self.members.lock().iter().any(|m| m.conn_id == conn_id)
    }

    fn take_member(&self, conn_id: Uuid) -> Option<Member> {
        let mut members = self.members.lock();
        let pos = members.iter().position(|m| m.conn_id == conn_id)?;
        Some(members.remove(pos))
    }

    /// Subscribe to the room channel and start the relay and timer tasks.
    /// Runs once; later calls return immediately.
    pub async fn ensure_started(self: &Arc<Self>) -> Result<(), AppError> {
        self.started
            .get_or_try_init(|| async {
                let subscription = self.store.subscribe(&self.keys.channel).await?;

                let relay = Arc::clone(self);
                tokio::spawn(async move { relay.run_relay(subscription).await });
                let timer = Arc::clone(self);
                tokio::spawn(async move { timer.run_timer().await });

                info!(room = %self.name, "[ROOM] Session started");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    // ----- store reads -----

    async fn artist(&self) -> Result<Option<String>, AppError> {
        let head = self.store.rank_range(&self.keys.turns, 0, 0).await?;
        Ok(head.into_iter().next())
    }

    async fn deadline(&self) -> Result<Option<i64>, AppError> {
        Ok(self
            .store
            .get(&self.keys.deadline)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok()))
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), AppError> {
        let payload = envelope.to_json()?;
        self.store.publish(&self.keys.channel, &payload).await?;
        Ok(())
    }

    /// Current word, drawing one on first use. First writer wins.
    async fn ensure_word(&self) -> Result<String, AppError> {
        if let Some(word) = self.store.get(&self.keys.word).await? {
            return Ok(word);
        }
        let candidate = self.words.next_word(&HashSet::new()).await?;
        if self.store.set_if_absent(&self.keys.word, &candidate).await? {
            return Ok(candidate);
        }
        self.store
            .get(&self.keys.word)
            .await?
            .ok_or_else(|| AppError::internal(format!("word for room '{}' vanished", self.name)))
    }

    // ----- commands -----

    pub async fn join(self: &Arc<Self>, member: Member) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        if self.is_closed() {
            return Err(AppError::room_closed(&self.name));
        }
        if self.has_connection(member.conn_id) {
            debug!(room = %self.name, player = %member.name, "[ROOM] Already joined");
            return Ok(());
        }

        self.publish(&Envelope::joined(&member.name)).await?;
        self.members.lock().push(member.clone());

        for (player, _) in self.store.map_all(&self.keys.roster).await? {
            if player != member.name {
                member.deliver(Envelope::joined(&player));
            }
        }

        if self
            .store
            .map_set_if_absent(&self.keys.roster, &member.name, 0)
            .await?
        {
            let seq = self.store.incr(&self.keys.seq, 1).await?;
            self.store
                .rank_add(&self.keys.turns, &member.name, seq)
                .await?;
        }

        let Some(artist) = self.artist().await? else {
            return Ok(());
        };

        if artist == member.name {
            let word = self.ensure_word().await?;
            let end_time = now_ms() + self.rules.turn_duration.as_millis() as i64;
            if self
                .store
                .set_if_absent(&self.keys.deadline, &end_time.to_string())
                .await?
            {
                self.publish(&Envelope::passed(&artist, end_time)).await?;
            } else {
                let end_time = self.deadline().await?.unwrap_or(end_time);
                member.deliver(Envelope::passed(&artist, end_time).with(WORD, word));
            }
        } else if let Some(end_time) = self.deadline().await? {
            member.deliver(Envelope::passed(&artist, end_time));
        }

        info!(room = %self.name, player = %member.name, conn_id = %member.conn_id, "[ROOM] Player joined");
        Ok(())
    }

    pub async fn leave(self: &Arc<Self>, conn_id: Uuid) -> Result<(), AppError> {
        self.depart(conn_id, false).await
    }

    pub async fn disconnect(self: &Arc<Self>, conn_id: Uuid) -> Result<(), AppError> {
        self.depart(conn_id, true).await
    }

    async fn depart(self: &Arc<Self>, conn_id: Uuid, disconnected: bool) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        let Some(member) = self.take_member(conn_id) else {
            return Ok(());
        };
        let result = self.depart_locked(&member.name, disconnected).await;
        self.close_if_empty();
        result
    }

    async fn depart_locked(self: &Arc<Self>, player: &str, disconnected: bool) -> Result<(), AppError> {
        if self.has_local(player) {
            debug!(room = %self.name, player, "[ROOM] Identity still held by another local connection");
            return Ok(());
        }

        if self.artist().await?.as_deref() == Some(player)
            && self.store.rank_len(&self.keys.turns).await? > 1
        {
            self.advance_turn_locked(None).await?;
        }

        self.store.rank_remove(&self.keys.turns, player).await?;
        self.store.map_remove(&self.keys.roster, player).await?;
        self.store.set_remove(&self.keys.skips, player).await?;
        if self.store.rank_len(&self.keys.turns).await? == 0 {
            self.store.delete(&self.keys.round_state()).await?;
            debug!(room = %self.name, "[ROOM] Turn order empty, cleared round state");
        }

        self.publish(&Envelope::departed(player, disconnected)).await?;
        info!(room = %self.name, player, disconnected, "[ROOM] Player departed");
        Ok(())
    }

    fn close_if_empty(self: &Arc<Self>) {
        if self.local_count() > 0 {
            return;
        }
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
        if let Some(directory) = self.directory.upgrade() {
            directory.remove(&self.name, self);
        }
        info!(room = %self.name, "[ROOM] No local players left, session closed");
    }

    pub async fn pass_turn(self: &Arc<Self>, player: &str) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        if self.artist().await?.as_deref() != Some(player) {
            warn!(room = %self.name, player, "[ROOM] PASS rejected, not the artist");
            return Ok(());
        }
        self.advance_turn_locked(None).await
    }

    pub async fn skip_vote(&self, player: &str) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        match self.artist().await? {
            None => {
                warn!(room = %self.name, player, "[ROOM] SKIP rejected, no round running");
                return Ok(());
            }
            Some(artist) if artist == player => {
                warn!(room = %self.name, player, "[ROOM] SKIP rejected, artist cannot vote");
                return Ok(());
            }
            Some(_) => {}
        }
        self.store.set_add(&self.keys.skips, player).await?;
        self.publish(&Envelope::skipped(player)).await
    }

    pub async fn draw(&self, player: &str, points: Value) -> Result<(), AppError> {
        if self.artist().await?.as_deref() != Some(player) {
            warn!(room = %self.name, player, "[ROOM] DRAW rejected, not the artist");
            return Ok(());
        }
        self.publish(&Envelope::drawn(points)).await
    }

    pub async fn guess(&self, player: &str, word: &str) -> Result<(), AppError> {
        if self.artist().await?.as_deref() == Some(player) {
            warn!(room = %self.name, player, "[ROOM] GUESS rejected, artist cannot guess");
            return Ok(());
        }
        self.publish(&Envelope::guessed(player, word)).await
    }

    /// Move the artist to the tail of turn order and start the next round.
    ///
    /// The next word is fetched before anything is written, so a word
    /// service failure leaves the room untouched.
    async fn advance_turn_locked(&self, guess: Option<(&str, i64)>) -> Result<(), AppError> {
        let Some(artist) = self.artist().await? else {
            return Ok(());
        };
        let excluding: HashSet<String> = self
            .store
            .get(&self.keys.word)
            .await?
            .into_iter()
            .collect();
        let word = self.words.next_word(&excluding).await?;

        let seq = self.store.incr(&self.keys.seq, 1).await?;
        self.store.rank_add(&self.keys.turns, &artist, seq).await?;
        let next = self.artist().await?.unwrap_or(artist);

        self.store.set(&self.keys.word, &word).await?;
        self.store.delete(&[&self.keys.skips]).await?;
        let end_time = now_ms() + self.rules.turn_duration.as_millis() as i64;
        self.store
            .set(&self.keys.deadline, &end_time.to_string())
            .await?;

        let mut passed = Envelope::passed(&next, end_time);
        if let Some((guesser, score)) = guess {
            passed.set(GUESSER, guesser);
            passed.set(SCORE, score);
        }
        self.publish(&passed).await?;
        info!(room = %self.name, artist = %next, "[ROOM] Turn passed");

        if let Some((guesser, score)) = guess {
            if score >= self.rules.win_score {
                self.store.map_reset(&self.keys.roster, 0).await?;
                self.publish(&Envelope::won(guesser)).await?;
                info!(room = %self.name, player = guesser, score, "[ROOM] Game won");
            }
        }
        Ok(())
    }

    // ----- relay -----

    async fn run_relay(self: Arc<Self>, mut subscription: Subscription) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = subscription.next() => match next {
                    Some(payload) => self.on_published(&payload).await,
                    None => {
                        error!(room = %self.name, "[ROOM] Room subscription ended, relay stopped");
                        break;
                    }
                },
            }
        }
        debug!(room = %self.name, "[ROOM] Relay task exited");
    }

    async fn on_published(self: &Arc<Self>, payload: &str) {
        let envelope = match Envelope::from_json(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(room = %self.name, error = %err, "[ROOM] Dropping undecodable room event");
                return;
            }
        };
        let verb = envelope.verb;
        if let Err(err) = self.relay(envelope).await {
            error!(room = %self.name, verb = %verb, error = %err, "[ROOM] Relay failed");
        }
    }

    async fn relay(self: &Arc<Self>, mut envelope: Envelope) -> Result<(), AppError> {
        match envelope.verb {
            Verb::Guessed => self.relay_guess(envelope).await,
            Verb::Skipped => {
                self.fan_out(&envelope, None);
                self.adjudicate_skip().await
            }
            Verb::Ended => {
                self.fan_out(&envelope, None);
                match envelope.player_name() {
                    Some(artist) => self.adjudicate_end(artist).await,
                    None => Ok(()),
                }
            }
            Verb::Passed => {
                envelope.remove(WORD);
                self.relay_passed(envelope).await
            }
            Verb::Joined => {
                let joiner = envelope.player_name().map(str::to_string);
                self.fan_out(&envelope, joiner.as_deref());
                Ok(())
            }
            _ => {
                self.fan_out(&envelope, None);
                Ok(())
            }
        }
    }

    /// Judge a guess on the artist's host and relay it. Other processes
    /// relay GUESSED without `correct`; their clients learn the outcome from
    /// the PASSED that follows a correct guess.
    async fn relay_guess(self: &Arc<Self>, mut envelope: Envelope) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        let artist = self.artist().await?;
        let guesser = envelope.player_name().map(str::to_string);
        let guess = envelope.str_field(WORD).map(str::to_string);
        // only the artist's host judges, and never a guess by the artist itself
        let judged_here = match (&artist, &guesser) {
            (Some(artist), Some(guesser)) => artist != guesser && self.has_local(artist),
            _ => false,
        };

        let (true, Some(guesser), Some(guess)) = (judged_here, guesser, guess) else {
            self.fan_out(&envelope, None);
            return Ok(());
        };

        let word = self.store.get(&self.keys.word).await?;
        let correct = word.as_deref().is_some_and(|w| guess_matches(w, &guess));
        envelope.set(CORRECT, correct);
        if !correct {
            self.fan_out(&envelope, None);
            return Ok(());
        }

        let score = self.store.map_incr(&self.keys.roster, &guesser, 1).await?;
        if let Some(word) = &word {
            self.words.record_win(word).await?;
        }
        self.fan_out(&envelope, None);
        info!(room = %self.name, player = %guesser, score, "[ROOM] Correct guess");
        self.advance_turn_locked(Some((&guesser, score))).await
    }

    async fn adjudicate_skip(&self) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        let Some(artist) = self.artist().await? else {
            return Ok(());
        };
        if !self.has_local(&artist) {
            return Ok(());
        }
        let votes = self.store.set_len(&self.keys.skips).await?;
        let roster = self.store.rank_len(&self.keys.turns).await?;
        if skip_majority(votes, roster) {
            info!(room = %self.name, artist = %artist, votes, roster, "[ROOM] Artist skipped by vote");
            self.advance_turn_locked(None).await?;
        }
        Ok(())
    }

    async fn adjudicate_end(&self, named: &str) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        if self.artist().await?.as_deref() != Some(named) || !self.has_local(named) {
            return Ok(());
        }
        // a stale ENDED must not cut a fresh round short
        if self.deadline().await?.is_some_and(|deadline| deadline > now_ms()) {
            return Ok(());
        }
        info!(room = %self.name, artist = named, "[ROOM] Round time is up");
        self.advance_turn_locked(None).await
    }

    /// Relay PASSED, injecting the word for the named artist's connections
    /// only while that round is still the current one. A PASSED overtaken by
    /// a later pass goes out without the word.
    async fn relay_passed(self: &Arc<Self>, envelope: Envelope) -> Result<(), AppError> {
        let _decision = self.decision.lock().await;
        let artist = envelope.player_name().map(str::to_string);
        let mut word = None;
        if let Some(a) = artist.as_deref() {
            if self.has_local(a) && self.is_current_round(a, &envelope).await? {
                word = self.store.get(&self.keys.word).await?;
            }
        }
        self.fan_out_each(|member| {
            match (&word, artist.as_deref()) {
                (Some(word), Some(artist)) if member.name == artist => {
                    Some(envelope.clone().with(WORD, word.clone()))
                }
                _ => Some(envelope.clone()),
            }
        });
        Ok(())
    }

    async fn is_current_round(&self, artist: &str, passed: &Envelope) -> Result<bool, AppError> {
        if self.artist().await?.as_deref() != Some(artist) {
            return Ok(false);
        }
        let end_time = passed.i64_field(END_TIME);
        Ok(end_time.is_some() && self.deadline().await? == end_time)
    }

    fn fan_out(self: &Arc<Self>, envelope: &Envelope, except: Option<&str>) {
        self.fan_out_each(|member| {
            if except == Some(member.name.as_str()) {
                None
            } else {
                Some(envelope.clone())
            }
        });
    }

    /// Deliver a per-member envelope to every local connection. Closed
    /// mailboxes are detached as disconnects.
    fn fan_out_each(self: &Arc<Self>, envelope_for: impl Fn(&Member) -> Option<Envelope>) {
        let members = self.members.lock().clone();
        for member in members {
            let Some(envelope) = envelope_for(&member) else {
                continue;
            };
            if !member.deliver(envelope) {
                warn!(room = %self.name, player = %member.name, conn_id = %member.conn_id, "[ROOM] Mailbox closed, detaching");
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = session.disconnect(member.conn_id).await {
                        error!(room = %session.name, error = %err, "[ROOM] Detaching dead connection failed");
                    }
                });
            }
        }
    }

    // ----- round timer -----

    async fn run_timer(self: Arc<Self>) {
        let mut fired_for: Option<i64> = None;
        loop {
            let pause = match self.timer_tick(&mut fired_for).await {
                Ok(pause) => pause,
                Err(err) => {
                    warn!(room = %self.name, error = %err, "[ROOM] Round timer check failed");
                    self.rules.timer_poll_interval
                }
            };
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        debug!(room = %self.name, "[ROOM] Timer task exited");
    }

    /// One timer check. Returns how long to sleep before the next one.
    async fn timer_tick(&self, fired_for: &mut Option<i64>) -> Result<Duration, AppError> {
        let Some(deadline) = self.deadline().await? else {
            return Ok(self.rules.timer_poll_interval);
        };
        let now = now_ms();
        if now < deadline {
            let half = Duration::from_millis(((deadline - now) / 2) as u64);
            return Ok(half.max(self.rules.timer_min_step));
        }
        if *fired_for == Some(deadline) {
            return Ok(self.rules.timer_poll_interval);
        }
        let Some(artist) = self.artist().await? else {
            return Ok(self.rules.timer_poll_interval);
        };
        if !self.has_local(&artist) {
            return Ok(self.rules.timer_poll_interval);
        }
        self.publish(&Envelope::ended(&artist)).await?;
        *fired_for = Some(deadline);
        debug!(room = %self.name, artist = %artist, deadline, "[ROOM] Published ENDED");
        Ok(self.rules.timer_poll_interval)
    }
}
