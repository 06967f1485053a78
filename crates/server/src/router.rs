//! Broadcast router: one bus, two delivery modes.
//!
//! Accepted world and session events are turned into [`ServerMessage`]s and
//! published to a shared `tokio::sync::broadcast` channel. Each joined
//! connection holds a [`Subscription`] that yields only the envelopes
//! addressed to it. Which connections an event reaches is decided in one
//! place, [`Delivery::of`].

use std::sync::Arc;

use craftsync_engine::world::{WorldChange, WorldObserver};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::player_registry::{ConnectionId, SessionEvent};
use crate::protocol::{
    BlockRecord, Coords, PlayerLeave, PlayerUpdate, ServerMessage, SessionRecord, WorldReset,
};

/// Default bus capacity. A subscriber more than this many envelopes behind
/// is resynchronized from scratch.
pub const BUS_CAPACITY: usize = 1024;

/// Who receives a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Every connection, the originator included (world mutations: clients
    /// must see the authoritative outcome of their own prediction).
    Everyone,
    /// Every connection except the originator (session deltas: the
    /// originator already knows its own state).
    OthersOnly,
}

impl Delivery {
    /// Delivery mode for a message, or `None` for direct replies that must
    /// never go over the bus.
    pub fn of(message: &ServerMessage) -> Option<Delivery> {
        match message {
            ServerMessage::Build(_) | ServerMessage::Remove(_) | ServerMessage::WorldReset(_) => {
                Some(Delivery::Everyone)
            }
            ServerMessage::PlayerJoin(_)
            | ServerMessage::PlayerUpdate(_)
            | ServerMessage::PlayerLeave(_) => Some(Delivery::OthersOnly),
            ServerMessage::Init(_)
            | ServerMessage::WorldSaved(_)
            | ServerMessage::Authenticated(_)
            | ServerMessage::Error(_) => None,
        }
    }
}

/// One published message plus its addressing.
///
/// The message sits behind an `Arc` so cloning per subscriber is a refcount
/// bump.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub origin: Option<ConnectionId>,
    pub delivery: Delivery,
    pub message: Arc<ServerMessage>,
}

impl Envelope {
    pub fn is_for(&self, recipient: ConnectionId) -> bool {
        match self.delivery {
            Delivery::Everyone => true,
            Delivery::OthersOnly => self.origin != Some(recipient),
        }
    }
}

/// What a subscriber gets next.
#[derive(Clone, Debug)]
pub enum Inbound {
    Message(Arc<ServerMessage>),
    /// The subscriber fell behind and `skipped` envelopes were lost; it must
    /// be sent full state again.
    Resync { skipped: u64 },
}

/// Cloneable handle to the bus.
#[derive(Clone)]
pub struct Router {
    tx: broadcast::Sender<Envelope>,
}

impl Router {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish `message` with the delivery mode its type calls for. Returns
    /// the number of subscribers it was queued for (zero is not an error).
    pub fn publish(&self, origin: Option<ConnectionId>, message: ServerMessage) -> usize {
        let Some(delivery) = Delivery::of(&message) else {
            tracing::error!("Refusing to broadcast direct-only message '{}'", message.name());
            return 0;
        };
        let envelope = Envelope {
            origin,
            delivery,
            message: Arc::new(message),
        };
        self.tx.send(envelope).unwrap_or(0)
    }

    /// Translate a committed session change into its broadcast.
    pub fn session_changed(&self, event: &SessionEvent) -> usize {
        let message = match event {
            SessionEvent::Joined(session) => ServerMessage::PlayerJoin(SessionRecord::from(session)),
            SessionEvent::Moved { id, delta } => ServerMessage::PlayerUpdate(PlayerUpdate {
                id: *id,
                pose: *delta,
                name: None,
            }),
            SessionEvent::Renamed { id, name } => ServerMessage::PlayerUpdate(PlayerUpdate {
                id: *id,
                pose: Default::default(),
                name: Some(name.clone()),
            }),
            SessionEvent::Left { id } => ServerMessage::PlayerLeave(PlayerLeave { id: *id }),
        };
        self.publish(Some(event.origin()), message)
    }

    /// Start receiving on behalf of `id`. Only envelopes published after
    /// this call are seen.
    pub fn subscribe(&self, id: ConnectionId) -> Subscription {
        Subscription {
            id,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl WorldObserver for Router {
    fn on_change(&self, change: WorldChange<'_>) {
        let message = match change {
            WorldChange::Built(block) => ServerMessage::Build(BlockRecord::from(block)),
            WorldChange::Removed(block) => ServerMessage::Remove(Coords::from(block.pos)),
            WorldChange::Replaced(blocks) => ServerMessage::WorldReset(WorldReset {
                blocks: blocks.iter().map(BlockRecord::from).collect(),
            }),
        };
        let receivers = self.publish(None, message);
        tracing::trace!("World change fanned out to {} subscribers", receivers);
    }
}

/// A connection's filtered view of the bus, FIFO in publish order.
pub struct Subscription {
    id: ConnectionId,
    rx: broadcast::Receiver<Envelope>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next envelope addressed to this connection. `None` once
    /// the bus is gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.is_for(self.id) => {
                    return Some(Inbound::Message(envelope.message));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(Inbound::Resync { skipped }),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking [`Subscription::recv`]; `None` when nothing is pending.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if envelope.is_for(self.id) => {
                    return Some(Inbound::Message(envelope.message));
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => return Some(Inbound::Resync { skipped }),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
