//! Match session
//!
//! The one explicitly owned object holding all per-match state: the clock,
//! the note schedule, the input router, the scoreboard and the queue of
//! messages waiting to go out. Every event (driver tick, server message, key
//! edge, pause toggle) is a `&mut self` call, so no consumer can observe a
//! half-updated clock and there is exactly one copy of "now minus paused time".

use std::collections::VecDeque;

use serde::Serialize;

use super::animator::{CrossingLatch, NoteVisualState, visual_state_at};
use super::clock::MatchClock;
use super::input::{InputRouter, KeyEdge, Pose, RoutedKey};
use super::schedule::{NoteId, NoteSchedule, Track};
use super::tunables::Tunables;
use crate::Millis;
use crate::error::{ProtocolError, StartError, TransportError};
use crate::protocol::{GameOverReport, Judgement, MatchStartPayload, OutboundMessage, ServerMessage};
use crate::settings::Settings;

/// Link state shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Where the match-start handshake is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStage {
    #[default]
    Idle,
    CheckingHealth,
    OpeningSocket,
    /// Socket acknowledged open; the start request may be sent
    RequestingStart,
    /// Start payload received, match running
    Started,
    Failed,
}

/// Score display state; last received message wins
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoreboard {
    pub last_judgement: Option<Judgement>,
    pub total_score: Option<f64>,
    pub current_streak: u32,
    pub max_streak: u32,
}

/// Song metadata from the start payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub bpm: Option<f64>,
    pub song_name: Option<String>,
    pub song_path: Option<String>,
    pub duration: Option<f64>,
}

/// How an inbound message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    GameOver,
    /// Arrived after the match ended, or not understood
    Ignored,
}

/// A spawned note as the renderer sees it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: NoteId,
    pub target_time: Millis,
    pub track: Track,
    pub progress: f64,
    pub spawned: bool,
    pub has_crossed_line: bool,
}

/// Read-only per-tick view for the renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// None until the match is running
    pub effective_elapsed_ms: Option<Millis>,
    pub paused: bool,
    /// Spawned, unretired notes only
    pub notes: Vec<NoteView>,
    pub pose: Pose,
    pub connection_status: ConnectionStatus,
    pub scoreboard: Scoreboard,
    pub game_over: bool,
}

/// Per-match state
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    clock: MatchClock,
    schedule: NoteSchedule,
    tunables: Tunables,
    crossed: CrossingLatch,
    retired: Vec<bool>,
    input: InputRouter,
    scoreboard: Scoreboard,
    info: MatchInfo,
    report: Option<GameOverReport>,
    connection: ConnectionStatus,
    stage: HandshakeStage,
    outbound: VecDeque<OutboundMessage>,
    running: bool,
    game_over: bool,
    ended: bool,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let input = InputRouter::new(settings.keys.clone());
        Self {
            settings,
            clock: MatchClock::new(),
            schedule: NoteSchedule::empty(),
            tunables: Tunables::default(),
            crossed: CrossingLatch::default(),
            retired: Vec::new(),
            input,
            scoreboard: Scoreboard::default(),
            info: MatchInfo::default(),
            report: None,
            connection: ConnectionStatus::Disconnected,
            stage: HandshakeStage::Idle,
            outbound: VecDeque::new(),
            running: false,
            game_over: false,
            ended: false,
        }
    }

    // === Accessors ===

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn schedule(&self) -> &NoteSchedule {
        &self.schedule
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn info(&self) -> &MatchInfo {
        &self.info
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn report(&self) -> Option<&GameOverReport> {
        self.report.as_ref()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    pub fn pose(&self) -> Pose {
        self.input.pose()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Length of the pause in progress, read from the match clock
    pub fn paused_for(&self, now: Millis) -> Millis {
        self.clock.current_pause(now)
    }

    // === Handshake ===

    pub fn begin_handshake(&mut self) {
        log::info!("Checking backend health...");
        self.stage = HandshakeStage::CheckingHealth;
    }

    /// Returns whether the handshake advanced to opening the socket
    pub fn health_ok(&mut self) -> bool {
        if self.stage != HandshakeStage::CheckingHealth {
            log::warn!("Health result ignored in stage {:?}", self.stage);
            return false;
        }
        log::info!("Backend health check passed");
        self.stage = HandshakeStage::OpeningSocket;
        self.connection = ConnectionStatus::Connecting;
        true
    }

    /// Returns whether the handshake advanced to requesting the start
    pub fn socket_opened(&mut self) -> bool {
        if self.stage != HandshakeStage::OpeningSocket {
            log::warn!("Socket open ignored in stage {:?}", self.stage);
            return false;
        }
        log::info!("WebSocket connected");
        self.stage = HandshakeStage::RequestingStart;
        self.connection = ConnectionStatus::Connected;
        true
    }

    /// True once the socket is acknowledged open and no match has started yet
    pub fn may_request_start(&self) -> bool {
        self.stage == HandshakeStage::RequestingStart
    }

    /// Any handshake or socket failure. The match does not start.
    pub fn transport_failed(&mut self, err: &TransportError) {
        log::error!("Connection error: {}", err);
        self.connection = ConnectionStatus::Error;
        if self.stage != HandshakeStage::Started {
            self.stage = HandshakeStage::Failed;
        }
        self.running = false;
    }

    pub fn socket_closed(&mut self) {
        log::info!("WebSocket closed");
        if self.connection != ConnectionStatus::Error {
            self.connection = ConnectionStatus::Disconnected;
        }
        self.running = false;
    }

    /// Load the schedule and start the clock at `now`. A payload arriving
    /// out of order leaves the session untouched; any other error fails the
    /// handshake.
    pub fn start_match(&mut self, payload: &MatchStartPayload, now: Millis) -> Result<(), StartError> {
        if !self.may_request_start() {
            log::warn!("Start payload ignored in stage {:?}", self.stage);
            return Err(StartError::SocketNotReady);
        }
        let started = Tunables::resolve(
            &[self.settings.fall_duration_ms, payload.fall_duration],
            &[self.settings.lead_delay_ms, payload.delay],
            &[self.settings.reaction_time_ms, payload.reaction_time],
        )
        .map_err(StartError::from)
        .and_then(|t| self.clock.start(now).map(|()| t).map_err(StartError::from));
        let tunables = match started {
            Ok(t) => t,
            Err(e) => {
                log::error!("Match could not start: {}", e);
                self.stage = HandshakeStage::Failed;
                self.running = false;
                return Err(e);
            }
        };

        self.tunables = tunables;
        self.schedule = payload.schedule();
        self.crossed = CrossingLatch::new(self.schedule.len());
        self.retired = vec![false; self.schedule.len()];
        self.info = MatchInfo {
            bpm: payload.bpm,
            song_name: payload.song_name.clone(),
            song_path: payload.song_path.clone(),
            duration: payload.duration,
        };
        self.stage = HandshakeStage::Started;
        self.running = true;
        log::info!(
            "Match started: {} notes, fall {} ms",
            self.schedule.len(),
            self.tunables.fall_duration()
        );
        Ok(())
    }

    // === Driver ===

    /// Effective elapsed time, or None when nothing should render
    fn elapsed(&self, now: Millis) -> Option<Millis> {
        if !self.running {
            return None;
        }
        match self.clock.effective_elapsed(now) {
            Ok(e) => Some(e),
            Err(e) => {
                log::error!("Running session with unusable clock: {}", e);
                None
            }
        }
    }

    /// Pure projection of the session at `now`
    pub fn snapshot(&self, now: Millis) -> Snapshot {
        let elapsed = self.elapsed(now);
        let notes = match elapsed {
            Some(elapsed) => self
                .schedule
                .iter()
                .filter(|(id, _)| !self.is_retired(*id))
                .filter_map(|(id, note)| {
                    let NoteVisualState {
                        spawned,
                        progress,
                        has_crossed_line,
                    } = visual_state_at(elapsed, note, &self.tunables);
                    spawned.then_some(NoteView {
                        id,
                        target_time: note.target_time,
                        track: note.track,
                        progress,
                        spawned,
                        has_crossed_line,
                    })
                })
                .collect(),
            None => Vec::new(),
        };
        Snapshot {
            effective_elapsed_ms: elapsed,
            paused: self.clock.is_paused(),
            notes,
            pose: self.input.pose(),
            connection_status: self.connection,
            scoreboard: self.scoreboard.clone(),
            game_over: self.game_over,
        }
    }

    /// One driver tick: latch hit-line crossings (queuing `super_detected`
    /// once per super note) and return the snapshot.
    pub fn tick(&mut self, now: Millis) -> Snapshot {
        if let Some(elapsed) = self.elapsed(now) {
            for id in self.crossed.newly_crossed(&self.schedule, &self.tunables, elapsed) {
                if let Some(note) = self.schedule.get(id) {
                    if note.track == Track::Super {
                        log::debug!("Super note at {} ms reached the line", note.target_time);
                        self.outbound
                            .push_back(OutboundMessage::super_detected(note.target_time));
                    }
                }
            }
        }
        self.snapshot(now)
    }

    /// Hide a note whose judgement has been resolved
    pub fn retire(&mut self, id: NoteId) {
        if let Some(flag) = self.retired.get_mut(id.0) {
            *flag = true;
        }
    }

    pub fn is_retired(&self, id: NoteId) -> bool {
        self.retired.get(id.0).copied().unwrap_or(false)
    }

    // === Pause ===

    pub fn pause(&mut self, now: Millis) -> bool {
        if !self.running {
            return false;
        }
        let changed = self.clock.pause(now).unwrap_or(false);
        if changed {
            log::info!("Paused");
            self.outbound.push_back(OutboundMessage::toggle_pause());
        }
        changed
    }

    pub fn resume(&mut self, now: Millis) -> bool {
        if !self.running {
            return false;
        }
        let changed = self.clock.resume(now).unwrap_or(false);
        if changed {
            log::info!("Resumed (total paused {} ms)", self.clock.total_paused());
            self.outbound.push_back(OutboundMessage::toggle_pause());
        }
        changed
    }

    /// Flip pause state. Returns the new paused flag, or None if not running.
    pub fn toggle_pause(&mut self, now: Millis) -> Option<bool> {
        if !self.running {
            return None;
        }
        if self.clock.is_paused() {
            self.resume(now);
        } else {
            self.pause(now);
        }
        Some(self.clock.is_paused())
    }

    // === Input ===

    /// Route a raw key edge. Returns the pose to render, or None for keys
    /// with no binding.
    pub fn on_key(&mut self, key: &str, edge: KeyEdge, now: Millis) -> Option<Pose> {
        match self.input.bindings().route(key)? {
            RoutedKey::Pause => {
                if self.input.on_pause(edge) {
                    self.toggle_pause(now);
                }
            }
            RoutedKey::Lane(lane) => {
                let gated = self.clock.is_paused() || !self.running;
                let outcome = self.input.on_lane(lane, edge, gated);
                if let Some(msg) = outcome.outbound {
                    self.outbound.push_back(msg);
                }
            }
        }
        Some(self.input.pose())
    }

    /// Drop all held lanes (focus lost)
    pub fn release_keys(&mut self) -> Pose {
        self.input.release_all()
    }

    // === Server messages ===

    pub fn apply(&mut self, msg: ServerMessage) -> Applied {
        if self.game_over {
            log::debug!("Ignoring message after game over: {:?}", msg);
            return Applied::Ignored;
        }
        match msg {
            ServerMessage::HitRegistered {
                last_judgement,
                total_score,
                current_streak,
                max_streak,
            } => {
                if last_judgement.is_some() {
                    self.scoreboard.last_judgement = last_judgement;
                }
                if total_score.is_some() {
                    self.scoreboard.total_score = total_score;
                }
                if let Some(streak) = current_streak {
                    self.scoreboard.current_streak = streak;
                }
                if let Some(max) = max_streak {
                    self.scoreboard.max_streak = max;
                }
                Applied::Updated
            }
            ServerMessage::NoteMissed {
                judgement,
                total_score,
            } => {
                self.scoreboard.last_judgement = Some(judgement.unwrap_or(Judgement::Miss));
                if total_score.is_some() {
                    self.scoreboard.total_score = total_score;
                }
                self.scoreboard.current_streak = 0;
                Applied::Updated
            }
            ServerMessage::GameOver {
                scores,
                last_judgement,
                total_score,
                max_streak,
            } => {
                if last_judgement.is_some() {
                    self.scoreboard.last_judgement = last_judgement.clone();
                }
                if total_score.is_some() {
                    self.scoreboard.total_score = total_score;
                }
                if let Some(max) = max_streak {
                    self.scoreboard.max_streak = max;
                }
                self.report = Some(GameOverReport {
                    scores: scores.unwrap_or_default(),
                    last_judgement,
                    total_score,
                    max_streak,
                });
                self.game_over = true;
                self.stop();
                log::info!("Game over, total score {:?}", self.scoreboard.total_score);
                Applied::GameOver
            }
            ServerMessage::Unknown => Applied::Ignored,
        }
    }

    /// Decode and apply one socket frame
    pub fn apply_text(&mut self, text: &str) -> Result<Applied, ProtocolError> {
        Ok(self.apply(ServerMessage::decode(text)?))
    }

    // === Teardown ===

    fn stop(&mut self) {
        self.running = false;
        self.schedule = NoteSchedule::empty();
        self.crossed = CrossingLatch::default();
        self.retired.clear();
        self.input.release_all();
    }

    /// End the match from the client side. Queues at most one `end_game`
    /// over the session's lifetime; returns whether it was queued.
    pub fn end_game(&mut self) -> bool {
        if self.ended {
            return false;
        }
        self.ended = true;
        let notify = self.clock.is_started() && !self.game_over;
        self.stop();
        if notify {
            log::info!("Ending match");
            self.outbound.push_back(OutboundMessage::end_game());
        }
        notify
    }

    /// Take everything queued for the backend, in order
    pub fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        self.outbound.drain(..).collect()
    }
}
