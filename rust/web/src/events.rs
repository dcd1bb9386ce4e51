use crate::rooms::{RoomId, RoomListing};
use crate::session::{GameResult, PlayerSlots};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tictac_engine::board::Board;
use tictac_engine::mark::Mark;
use tokio::sync::mpsc;

// Bounded channel per subscriber; events for slow consumers are dropped
// rather than letting one stalled SSE stream back up a whole room.
const EVENT_CHANNEL_BUFFER: usize = 256;

/// Channel name reserved for lobby-wide announcements.
pub const LOBBY_CHANNEL: &str = "lobby";

pub type EventSender = mpsc::Sender<RoomEvent>;
pub type EventReceiver = mpsc::Receiver<RoomEvent>;

/// Delivery port the session manager publishes through.
///
/// Point-to-point replies to the acting connection travel back as the
/// operation's own response; everything room- or lobby-scoped goes through
/// this trait, so the core stays testable against an in-memory bus.
pub trait RoomTransport: Send + Sync {
    /// Deliver `event` to every connection subscribed to `room_id`.
    fn broadcast(&self, room_id: &str, event: RoomEvent);

    /// Deliver `event` to every connection watching the lobby.
    fn broadcast_lobby(&self, event: RoomEvent);

    /// Forget all subscriptions for a torn-down room.
    fn drop_room(&self, room_id: &str);
}

pub struct EventSubscription {
    bus: EventBus,
    channel: String,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.channel, self.subscriber_id);
    }
}

/// In-memory fan-out bus keyed by room id (plus the lobby channel).
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    channels: RwLock<HashMap<String, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room's event stream. Dropping the subscription
    /// unsubscribes.
    pub fn subscribe(&self, channel: impl Into<String>) -> EventSubscription {
        let channel = channel.into();
        let (subscriber_id, receiver) = self.subscribe_raw(&channel);
        EventSubscription {
            bus: self.clone(),
            channel,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, channel: &str) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .inner
            .channels
            .write()
            .expect("subscriber lock poisoned");
        guard.entry(channel.to_string()).or_default().push((id, tx));

        tracing::info!(
            channel = %channel,
            subscriber_id = id,
            "client subscribed to events"
        );

        (id, rx)
    }

    pub fn unsubscribe(&self, channel: &str, subscriber_id: usize) {
        self.remove_subscribers(channel, &[subscriber_id]);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .channels
            .read()
            .expect("subscriber lock poisoned");
        guard.values().map(|list| list.len()).sum()
    }

    fn publish(&self, channel: &str, event: RoomEvent) {
        tracing::debug!(channel = %channel, event = ?event, "broadcasting event");

        let subscribers = {
            let guard = self
                .inner
                .channels
                .read()
                .expect("subscriber lock poisoned");
            guard.get(channel).cloned()
        };

        let Some(list) = subscribers else {
            tracing::trace!(channel = %channel, "no subscribers");
            return;
        };

        let mut failed = Vec::new();
        for (id, sender) in list {
            // try_send keeps broadcasts non-blocking; a full or closed
            // channel marks the subscriber for removal.
            if let Err(err) = sender.try_send(event.clone()) {
                tracing::warn!(
                    channel = %channel,
                    subscriber_id = id,
                    error = ?err,
                    "failed to deliver event to subscriber"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(channel, &failed);
        }
    }

    fn remove_subscribers(&self, channel: &str, ids: &[usize]) {
        let mut guard = self
            .inner
            .channels
            .write()
            .expect("subscriber lock poisoned");
        if let Some(list) = guard.get_mut(channel) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(channel);
            }
        }
    }
}

impl RoomTransport for EventBus {
    fn broadcast(&self, room_id: &str, event: RoomEvent) {
        self.publish(room_id, event);
    }

    fn broadcast_lobby(&self, event: RoomEvent) {
        self.publish(LOBBY_CHANNEL, event);
    }

    fn drop_room(&self, room_id: &str) {
        let mut guard = self
            .inner
            .channels
            .write()
            .expect("subscriber lock poisoned");
        guard.remove(room_id);
    }
}

/// The last move applied to a board, as carried by board updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMove {
    pub cell: usize,
    pub mark: Mark,
    pub player: String,
}

/// Events delivered over room and lobby streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    MembersUpdate {
        room_id: RoomId,
        members: Vec<String>,
        players: PlayerSlots,
    },
    BoardUpdate {
        room_id: RoomId,
        board: Board,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<Mark>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<GameResult>,
        last_move: LastMove,
    },
    RematchRequested {
        room_id: RoomId,
        requested_by: String,
        votes: Vec<Mark>,
    },
    RematchStatus {
        room_id: RoomId,
        votes: Vec<Mark>,
    },
    RematchDeclined {
        room_id: RoomId,
        declined_by: String,
    },
    RoomReset {
        room_id: RoomId,
        board: Board,
        turn: Mark,
    },
    RoomDissolved {
        room_id: RoomId,
        reason: String,
    },
    RoomCreated {
        room: RoomListing,
    },
    Error {
        room_id: RoomId,
        message: String,
    },
}
