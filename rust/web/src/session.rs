use crate::errors::IntoErrorResponse;
use crate::events::{LastMove, RoomEvent, RoomTransport};
use crate::rooms::{GameMode, RegistryError, RoomDescriptor, RoomDirectory, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tictac_ai::{create_bot, BotPlayer};
use tictac_engine::board::Board;
use tictac_engine::errors::GameError;
use tictac_engine::mark::Mark;
use tictac_engine::rules::{evaluate, Outcome};

/// Identity string reserved for the bot seat. Never accepted from the
/// outside: the bot's moves are applied internally by the manager.
pub const BOT_IDENTITY: &str = "__bot__";

/// Mapping from mark to seat holder. A seat holds a human identity, the
/// bot sentinel, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlots {
    pub x: Option<String>,
    pub o: Option<String>,
}

impl PlayerSlots {
    pub fn holder(&self, mark: Mark) -> Option<&str> {
        match mark {
            Mark::X => self.x.as_deref(),
            Mark::O => self.o.as_deref(),
        }
    }

    pub fn mark_of(&self, identity: &str) -> Option<Mark> {
        if self.x.as_deref() == Some(identity) {
            Some(Mark::X)
        } else if self.o.as_deref() == Some(identity) {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// First unoccupied seat in X, O order.
    pub fn first_free(&self) -> Option<Mark> {
        if self.x.is_none() {
            Some(Mark::X)
        } else if self.o.is_none() {
            Some(Mark::O)
        } else {
            None
        }
    }

    fn assign(&mut self, mark: Mark, identity: &str) {
        match mark {
            Mark::X => self.x = Some(identity.to_string()),
            Mark::O => self.o = Some(identity.to_string()),
        }
    }
}

/// Terminal result of a game.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    X,
    O,
    Draw,
}

impl From<Mark> for GameResult {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => GameResult::X,
            Mark::O => GameResult::O,
        }
    }
}

fn terminal_result(outcome: Outcome) -> Option<GameResult> {
    match outcome {
        Outcome::InProgress => None,
        Outcome::Win(mark) => Some(mark.into()),
        Outcome::Draw => Some(GameResult::Draw),
    }
}

#[derive(Debug, Clone, Default)]
struct RematchState {
    requested: bool,
    votes: Vec<Mark>,
    // Identities that have answered; kept for log output only.
    responded: Vec<String>,
}

impl RematchState {
    fn clear(&mut self) {
        self.requested = false;
        self.votes.clear();
        self.responded.clear();
    }

    fn record(&mut self, mark: Mark, identity: &str) {
        if !self.votes.contains(&mark) {
            self.votes.push(mark);
        }
        if !self.responded.iter().any(|r| r == identity) {
            self.responded.push(identity.to_string());
        }
    }

    fn is_unanimous(&self) -> bool {
        self.votes.contains(&Mark::X) && self.votes.contains(&Mark::O)
    }
}

/// Mutable per-room state. Guarded by a single mutex so every operation
/// on one room is atomic while distinct rooms proceed in parallel.
#[derive(Debug)]
struct SessionState {
    members: Vec<String>,
    players: PlayerSlots,
    board: Board,
    turn: Mark,
    winner: Option<GameResult>,
    rematch: RematchState,
}

impl SessionState {
    fn new(players: PlayerSlots) -> Self {
        Self {
            members: Vec::new(),
            players,
            board: Board::new(),
            turn: Mark::X,
            winner: None,
            rematch: RematchState::default(),
        }
    }
}

/// Live in-memory state for one active room.
pub struct RoomSession {
    id: RoomId,
    mode: GameMode,
    created_by: String,
    bot: Option<Box<dyn BotPlayer>>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("created_by", &self.created_by)
            .field(
                "bot",
                &self.bot.as_ref().map(|bot| bot.name()).unwrap_or("none"),
            )
            .finish()
    }
}

impl RoomSession {
    fn new(descriptor: &RoomDescriptor) -> Self {
        let (bot, players) = match descriptor.mode {
            GameMode::PlayerVsBot => {
                // The bot takes the O seat up front; the first human gets X.
                let mut players = PlayerSlots::default();
                players.assign(Mark::O, BOT_IDENTITY);
                (Some(create_bot("random")), players)
            }
            GameMode::PlayerVsPlayer => (None, PlayerSlots::default()),
        };

        tracing::info!(
            room_id = %descriptor.id,
            mode = ?descriptor.mode,
            created_by = %descriptor.created_by,
            "game session created"
        );

        Self {
            id: descriptor.id.clone(),
            mode: descriptor.mode,
            created_by: descriptor.created_by.clone(),
            bot,
            state: Mutex::new(SessionState::new(players)),
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    fn human_capacity(&self) -> usize {
        match self.mode {
            GameMode::PlayerVsPlayer => 2,
            GameMode::PlayerVsBot => 1,
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, RoomError> {
        self.state.lock().map_err(|_| RoomError::StoragePoisoned)
    }

    fn snapshot_for(&self, state: &SessionState, identity: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            mode: self.mode,
            created_by: self.created_by.clone(),
            members: state.members.clone(),
            players: state.players.clone(),
            board: state.board.clone(),
            turn: state.winner.is_none().then_some(state.turn),
            winner: state.winner,
            your_mark: state.players.mark_of(identity),
            is_creator: identity == self.created_by,
        }
    }
}

/// Full view of a session, sent to a connection when it joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub mode: GameMode,
    pub created_by: String,
    pub members: Vec<String>,
    pub players: PlayerSlots,
    pub board: Board,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<Mark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<GameResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_mark: Option<Mark>,
    pub is_creator: bool,
}

/// Orchestrates room sessions: join/leave, move validation, the bot's
/// reply turn, rematch voting, and dissolution.
///
/// Sessions are created lazily on the first join of a room known to the
/// directory and destroyed when the last member leaves or the creator
/// dissolves the room. Destruction also deletes the directory entry.
pub struct SessionManager {
    rooms: RwLock<HashMap<RoomId, Arc<RoomSession>>>,
    directory: Arc<dyn RoomDirectory>,
    transport: Arc<dyn RoomTransport>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active_rooms", &self.active_rooms().len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(directory: Arc<dyn RoomDirectory>, transport: Arc<dyn RoomTransport>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            directory,
            transport,
        }
    }

    /// Joins a room, assigning a free mark to new identities and letting
    /// known identities reconnect to their seat.
    pub fn join(
        &self,
        room_id: &str,
        identity: &str,
        password: Option<&str>,
    ) -> Result<RoomSnapshot, RoomError> {
        if identity == BOT_IDENTITY {
            return Err(RoomError::InvalidInput(format!(
                "`{BOT_IDENTITY}` is a reserved name"
            )));
        }

        let descriptor = self
            .directory
            .lookup(room_id)?
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if !descriptor.allows(identity, password) {
            tracing::warn!(room_id = %room_id, player = %identity, "join rejected: bad password");
            return Err(RoomError::AccessDenied(room_id.to_string()));
        }

        let session = self.get_or_create(&descriptor)?;
        let mut state = session.lock_state()?;

        let is_member = state.members.iter().any(|m| m == identity);
        if state.players.mark_of(identity).is_none() {
            // Capacity only gates identities without a seat; rejoins pass.
            if !is_member && state.members.len() >= session.human_capacity() {
                return Err(RoomError::RoomFull(room_id.to_string()));
            }
            let free = state
                .players
                .first_free()
                .ok_or_else(|| RoomError::RoomFull(room_id.to_string()))?;
            state.players.assign(free, identity);
            tracing::info!(room_id = %room_id, player = %identity, mark = %free, "seat assigned");
        }
        if !is_member {
            state.members.push(identity.to_string());
        }

        self.transport.broadcast(
            room_id,
            RoomEvent::MembersUpdate {
                room_id: room_id.to_string(),
                members: state.members.clone(),
                players: state.players.clone(),
            },
        );

        Ok(session.snapshot_for(&state, identity))
    }

    /// Applies a move for `identity`, then lets the bot answer when the
    /// next turn is its seat. The bot's reply happens synchronously inside
    /// this call and produces its own board update.
    pub fn make_move(
        &self,
        room_id: &str,
        identity: &str,
        cell: usize,
    ) -> Result<RoomEvent, RoomError> {
        let session = self.get_session(room_id)?;
        let mut state = session.lock_state()?;

        if identity == BOT_IDENTITY {
            return Err(RoomError::Spectator);
        }
        if state.winner.is_some() {
            return Err(RoomError::InvalidState(
                "the game is already finished".into(),
            ));
        }
        let mark = state
            .players
            .mark_of(identity)
            .ok_or(RoomError::Spectator)?;
        if state.turn != mark {
            return Err(RoomError::InvalidState(format!(
                "it is {}'s turn",
                state.turn
            )));
        }

        let event = Self::apply_move(
            &self.transport,
            room_id,
            &mut state,
            cell,
            mark,
            identity,
        )?;

        tracing::debug!(room_id = %room_id, player = %identity, cell, "move applied");

        // Bot reply: same placement/evaluate/broadcast sequence, second
        // broadcast, within this request.
        if state.winner.is_none() {
            if let Some(bot) = &session.bot {
                if state.players.holder(state.turn) == Some(BOT_IDENTITY) {
                    if let Some(bot_cell) = bot.choose_cell(&state.board) {
                        let bot_mark = state.turn;
                        Self::apply_move(
                            &self.transport,
                            room_id,
                            &mut state,
                            bot_cell,
                            bot_mark,
                            BOT_IDENTITY,
                        )?;
                        tracing::debug!(room_id = %room_id, cell = bot_cell, "bot replied");
                    }
                }
            }
        }

        Ok(event)
    }

    /// Opens a rematch vote. Creator only, and only on a finished game.
    pub fn request_rematch(&self, room_id: &str, identity: &str) -> Result<RoomEvent, RoomError> {
        let session = self.get_session(room_id)?;
        if identity != session.created_by {
            return Err(RoomError::NotAuthorized);
        }

        let mut state = session.lock_state()?;
        if state.winner.is_none() {
            return Err(RoomError::InvalidState("the game is not finished".into()));
        }
        let mark = state
            .players
            .mark_of(identity)
            .ok_or(RoomError::Spectator)?;

        state.rematch.requested = true;
        state.rematch.votes.clear();
        state.rematch.responded.clear();
        state.rematch.record(mark, identity);

        let event = RoomEvent::RematchRequested {
            room_id: room_id.to_string(),
            requested_by: identity.to_string(),
            votes: state.rematch.votes.clone(),
        };
        self.transport.broadcast(room_id, event.clone());
        tracing::info!(room_id = %room_id, player = %identity, "rematch requested");

        // A bot opponent cannot answer, so its vote counts immediately.
        let other = mark.opponent();
        if state.players.holder(other) == Some(BOT_IDENTITY) {
            state.rematch.record(other, BOT_IDENTITY);
            self.reset_game(room_id, &mut state);
        }

        Ok(event)
    }

    /// Records the opponent's answer to an open rematch vote.
    pub fn respond_rematch(
        &self,
        room_id: &str,
        identity: &str,
        accept: bool,
    ) -> Result<RoomEvent, RoomError> {
        let session = self.get_session(room_id)?;
        let mut state = session.lock_state()?;

        if identity == BOT_IDENTITY {
            return Err(RoomError::Spectator);
        }
        if !state.rematch.requested {
            return Err(RoomError::InvalidState(
                "no rematch request is active".into(),
            ));
        }
        // The creator's vote was cast by the request itself.
        if identity == session.created_by {
            return Err(RoomError::NotAuthorized);
        }
        let mark = state
            .players
            .mark_of(identity)
            .ok_or(RoomError::Spectator)?;

        if !accept {
            state.rematch.clear();
            let event = RoomEvent::RematchDeclined {
                room_id: room_id.to_string(),
                declined_by: identity.to_string(),
            };
            self.transport.broadcast(room_id, event.clone());
            tracing::info!(room_id = %room_id, player = %identity, "rematch declined");
            return Ok(event);
        }

        state.rematch.record(mark, identity);
        tracing::debug!(
            room_id = %room_id,
            votes = ?state.rematch.votes,
            responded = ?state.rematch.responded,
            "rematch vote recorded"
        );
        if state.rematch.is_unanimous() {
            let event = self.reset_game(room_id, &mut state);
            return Ok(event);
        }

        let event = RoomEvent::RematchStatus {
            room_id: room_id.to_string(),
            votes: state.rematch.votes.clone(),
        };
        self.transport.broadcast(room_id, event.clone());
        Ok(event)
    }

    /// Tears the room down on the creator's request.
    pub fn dissolve(&self, room_id: &str, identity: &str) -> Result<(), RoomError> {
        let session = self.get_session(room_id)?;
        if identity != session.created_by {
            return Err(RoomError::NotAuthorized);
        }
        self.teardown(room_id, "dissolved by creator")
    }

    /// Drops `identity` from the room's member set. The last member out
    /// tears the room down with no authorization check.
    pub fn leave(&self, room_id: &str, identity: &str) -> Result<(), RoomError> {
        let session = self.get_session(room_id)?;

        let (removed, members, players) = {
            let mut state = session.lock_state()?;
            let before = state.members.len();
            state.members.retain(|m| m != identity);
            (
                state.members.len() != before,
                state.members.clone(),
                state.players.clone(),
            )
        };

        if !removed {
            return Ok(());
        }

        tracing::info!(room_id = %room_id, player = %identity, "player left");

        if members.is_empty() {
            return self.teardown(room_id, "abandoned");
        }

        self.transport.broadcast(
            room_id,
            RoomEvent::MembersUpdate {
                room_id: room_id.to_string(),
                members,
                players,
            },
        );
        Ok(())
    }

    pub fn get_session(&self, room_id: &str) -> Result<Arc<RoomSession>, RoomError> {
        let guard = self.rooms.read().map_err(|_| RoomError::StoragePoisoned)?;
        guard
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))
    }

    /// Room ids with a live session.
    pub fn active_rooms(&self) -> Vec<RoomId> {
        match self.rooms.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn get_or_create(&self, descriptor: &RoomDescriptor) -> Result<Arc<RoomSession>, RoomError> {
        {
            let guard = self.rooms.read().map_err(|_| RoomError::StoragePoisoned)?;
            if let Some(session) = guard.get(&descriptor.id) {
                return Ok(Arc::clone(session));
            }
        }

        let mut guard = self.rooms.write().map_err(|_| RoomError::StoragePoisoned)?;
        let session = guard
            .entry(descriptor.id.clone())
            .or_insert_with(|| Arc::new(RoomSession::new(descriptor)));
        Ok(Arc::clone(session))
    }

    /// Places a mark, re-evaluates the board, advances the turn on an
    /// unresolved game, and broadcasts the update.
    fn apply_move(
        transport: &Arc<dyn RoomTransport>,
        room_id: &str,
        state: &mut SessionState,
        cell: usize,
        mark: Mark,
        player: &str,
    ) -> Result<RoomEvent, RoomError> {
        state.board.place(cell, mark).map_err(|err| match err {
            GameError::OutOfRange { .. } => RoomError::InvalidInput(err.to_string()),
            GameError::CellOccupied { .. } => RoomError::InvalidState(err.to_string()),
        })?;

        state.winner = terminal_result(evaluate(&state.board));
        if state.winner.is_none() {
            state.turn = mark.opponent();
        }

        let event = RoomEvent::BoardUpdate {
            room_id: room_id.to_string(),
            board: state.board.clone(),
            turn: state.winner.is_none().then_some(state.turn),
            winner: state.winner,
            last_move: LastMove {
                cell,
                mark,
                player: player.to_string(),
            },
        };
        transport.broadcast(room_id, event.clone());
        Ok(event)
    }

    /// Starts the next game in place. The seat that made the finishing
    /// move hands the opening move to its opponent.
    fn reset_game(&self, room_id: &str, state: &mut SessionState) -> RoomEvent {
        let opener = state.turn.opponent();
        state.board.clear();
        state.winner = None;
        state.turn = opener;
        state.rematch.clear();

        let event = RoomEvent::RoomReset {
            room_id: room_id.to_string(),
            board: state.board.clone(),
            turn: opener,
        };
        self.transport.broadcast(room_id, event.clone());
        tracing::info!(room_id = %room_id, opener = %opener, "board reset for rematch");
        event
    }

    fn teardown(&self, room_id: &str, reason: &str) -> Result<(), RoomError> {
        {
            let mut guard = self.rooms.write().map_err(|_| RoomError::StoragePoisoned)?;
            guard.remove(room_id);
        }
        self.directory.delete(room_id)?;

        let event = RoomEvent::RoomDissolved {
            room_id: room_id.to_string(),
            reason: reason.to_string(),
        };
        self.transport.broadcast(room_id, event.clone());
        self.transport.broadcast_lobby(event);
        self.transport.drop_room(room_id);

        tracing::info!(room_id = %room_id, reason = %reason, "room dissolved");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room `{0}` was not found")]
    NotFound(RoomId),
    #[error("invalid or missing password for room `{0}`")]
    AccessDenied(RoomId),
    #[error("room `{0}` is full")]
    RoomFull(RoomId),
    #[error("only the room creator may do that")]
    NotAuthorized,
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("you hold no mark in this room")]
    Spectator,
    #[error("session storage poisoned")]
    StoragePoisoned,
    #[error(transparent)]
    Directory(#[from] RegistryError),
}

impl IntoErrorResponse for RoomError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            RoomError::NotFound(_) => StatusCode::NOT_FOUND,
            RoomError::AccessDenied(_) => StatusCode::FORBIDDEN,
            RoomError::RoomFull(_) => StatusCode::CONFLICT,
            RoomError::NotAuthorized => StatusCode::FORBIDDEN,
            RoomError::InvalidState(_) => StatusCode::CONFLICT,
            RoomError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RoomError::Spectator => StatusCode::FORBIDDEN,
            RoomError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            RoomError::Directory(err) => err.status_code(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "room_not_found",
            RoomError::AccessDenied(_) => "access_denied",
            RoomError::RoomFull(_) => "room_full",
            RoomError::NotAuthorized => "not_authorized",
            RoomError::InvalidState(_) => "invalid_state",
            RoomError::InvalidInput(_) => "invalid_input",
            RoomError::Spectator => "spectator",
            RoomError::StoragePoisoned => "session_storage_error",
            RoomError::Directory(err) => err.error_code(),
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            RoomError::NotFound(id) | RoomError::RoomFull(id) | RoomError::AccessDenied(id) => {
                Some(serde_json::json!({ "room_id": id }))
            }
            _ => None,
        }
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        match self {
            RoomError::StoragePoisoned => crate::errors::ErrorSeverity::Critical,
            RoomError::Directory(err) => err.severity(),
            _ => crate::errors::ErrorSeverity::Client,
        }
    }
}
