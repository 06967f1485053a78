//! Per-connection state machine, independent of the transport.
//!
//! `Connected -> (Authenticated) -> Joined -> Disconnected`
//!
//! [`Connection::handle`] applies one client event and returns the replies
//! meant for this connection alone; everything other connections must see
//! goes through the router as a side effect of the world/registry commit.
//! [`Connection::next_outbound`] yields what the router addressed to this
//! connection. The terminal transition runs exactly once, from
//! [`Connection::disconnect`] or from `Drop`, whichever comes first.

use std::sync::Arc;

use craftsync_engine::world::{BuildOutcome, RemoveOutcome};

use crate::accounts::{AccountError, AccountId};
use crate::error::ClientError;
use crate::player_registry::{ConnectionId, PoseDelta, RegistryError};
use crate::protocol::{
    self, Authenticated, BuildRequest, ClientMessage, Coords, Credentials, JoinRequest,
    ServerMessage, WorldSaved,
};
use crate::router::{Inbound, Subscription};
use crate::state::ServerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connected,
    Authenticated,
    Joined,
    Disconnected,
}

enum AccountAction {
    Login,
    Signup,
}

pub struct Connection {
    id: ConnectionId,
    state: Arc<ServerState>,
    phase: Phase,
    account: Option<AccountId>,
    subscription: Option<Subscription>,
}

impl Connection {
    /// A fresh connection in the `Connected` phase with a newly allocated id.
    pub fn open(state: Arc<ServerState>) -> Self {
        let id = state.allocate_connection_id();
        state.metrics.connection_opened();
        Self {
            id,
            state,
            phase: Phase::Connected,
            account: None,
            subscription: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// Decode and apply one text frame. Malformed frames are dropped and
    /// reported to the sender only.
    pub async fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        match protocol::decode(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => self.reject("frame", e),
        }
    }

    /// Apply one client event. Returns the direct replies for this
    /// connection (possibly none).
    pub async fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        if self.phase == Phase::Disconnected {
            tracing::debug!("Dropping '{}' from closed connection {}", message.name(), self.id);
            return Vec::new();
        }

        let name = message.name();
        let result = match message {
            ClientMessage::Login(creds) => self.authenticate(creds, AccountAction::Login).await,
            ClientMessage::Signup(creds) => self.authenticate(creds, AccountAction::Signup).await,
            ClientMessage::Join(req) => self.join(req),
            ClientMessage::Move(delta) => Ok(self.move_to(delta)),
            ClientMessage::NameChange(change) => Ok(self.rename(change.name)),
            ClientMessage::Build(req) => self.build(req),
            ClientMessage::Remove(coords) => self.remove(coords),
            ClientMessage::SaveWorld => self.save().await,
            ClientMessage::LoadWorld => self.load().await,
        };

        match result {
            Ok(replies) => replies,
            Err(e) => self.reject(name, e),
        }
    }

    fn reject(&self, event: &str, error: ClientError) -> Vec<ServerMessage> {
        self.state.metrics.event_rejected();
        tracing::debug!("Rejected '{}' from {}: {}", event, self.id, error);
        vec![error.to_message()]
    }

    fn require_joined(&self) -> Result<(), ClientError> {
        if self.phase == Phase::Joined {
            Ok(())
        } else {
            Err(ClientError::NotJoined)
        }
    }

    // ── Authentication ──────────────────────────────────────────────────

    async fn authenticate(
        &mut self,
        creds: Credentials,
        action: AccountAction,
    ) -> Result<Vec<ServerMessage>, ClientError> {
        if self.phase != Phase::Connected {
            return Err(ClientError::AlreadyAuthenticated);
        }
        let accounts = Arc::clone(self.state.accounts().ok_or(AccountError::Disabled)?);

        let account = tokio::task::spawn_blocking(move || match action {
            AccountAction::Login => accounts.login(&creds.email, &creds.password),
            AccountAction::Signup => accounts.signup(&creds.email, &creds.password),
        })
        .await
        .map_err(|e| AccountError::Unavailable(e.to_string()))??;

        tracing::info!("Connection {} authenticated as {}", self.id, account.0);
        self.account = Some(account);
        self.phase = Phase::Authenticated;
        Ok(vec![ServerMessage::Authenticated(Authenticated { account })])
    }

    // ── Session ─────────────────────────────────────────────────────────

    fn join(&mut self, req: JoinRequest) -> Result<Vec<ServerMessage>, ClientError> {
        match self.phase {
            Phase::Joined => {
                return Err(RegistryError::AlreadyJoined(self.id).into());
            }
            Phase::Connected if self.state.require_auth() => return Err(ClientError::Unauthenticated),
            _ => {}
        }

        // Subscribe before snapshotting: anything committed after the
        // snapshot is guaranteed to arrive on the bus.
        let subscription = self.state.router.subscribe(self.id);
        let session = self.state.players.join(self.id, req.pose, req.name)?;
        self.subscription = Some(subscription);
        self.phase = Phase::Joined;

        tracing::info!(
            "{} joined as '{}' at ({}, {}, {})",
            self.id,
            session.name,
            session.pose.x,
            session.pose.y,
            session.pose.z,
        );
        Ok(vec![self.state.init_for(self.id)])
    }

    fn move_to(&mut self, delta: PoseDelta) -> Vec<ServerMessage> {
        if self.state.players.update_pose(self.id, delta).is_none() {
            tracing::trace!("Ignoring move from unjoined connection {}", self.id);
        }
        Vec::new()
    }

    fn rename(&mut self, name: String) -> Vec<ServerMessage> {
        match self.state.players.rename(self.id, name) {
            Some(session) => tracing::debug!("{} is now '{}'", self.id, session.name),
            None => tracing::trace!("Ignoring name-change from unjoined connection {}", self.id),
        }
        Vec::new()
    }

    // ── World ───────────────────────────────────────────────────────────

    fn build(&mut self, req: BuildRequest) -> Result<Vec<ServerMessage>, ClientError> {
        self.require_joined()?;
        match self.state.world.build(req.pos(), req.color()) {
            BuildOutcome::Created(_) => {
                self.state.metrics.block_built();
                Ok(Vec::new())
            }
            BuildOutcome::AlreadyOccupied(existing) => Err(ClientError::Occupied(existing.pos)),
        }
    }

    fn remove(&mut self, coords: Coords) -> Result<Vec<ServerMessage>, ClientError> {
        self.require_joined()?;
        match self.state.world.remove(coords.into()) {
            RemoveOutcome::Removed(_) => {
                self.state.metrics.block_removed();
                Ok(Vec::new())
            }
            RemoveOutcome::NotFound => Ok(Vec::new()),
            RemoveOutcome::Protected(block) => Err(ClientError::Protected(block.pos)),
        }
    }

    async fn save(&mut self) -> Result<Vec<ServerMessage>, ClientError> {
        self.require_joined()?;
        let blocks = self.state.persistence.save(&self.state.world).await?;
        self.state.metrics.saved();
        Ok(vec![ServerMessage::WorldSaved(WorldSaved { blocks })])
    }

    async fn load(&mut self) -> Result<Vec<ServerMessage>, ClientError> {
        self.require_joined()?;
        let blocks = self.state.persistence.load(&self.state.world).await?;
        self.state.metrics.loaded();
        tracing::info!("{} reloaded the world ({} blocks)", self.id, blocks.len());
        // Every client, this one included, gets the world-reset broadcast.
        Ok(Vec::new())
    }

    // ── Outbound ────────────────────────────────────────────────────────

    fn deliver(&self, inbound: Inbound) -> Arc<ServerMessage> {
        match inbound {
            Inbound::Message(message) => message,
            Inbound::Resync { skipped } => {
                tracing::warn!("{} lagged by {} events, resending full state", self.id, skipped);
                self.state.metrics.resynced();
                Arc::new(self.state.init_for(self.id))
            }
        }
    }

    /// Next broadcast addressed to this connection. Pends forever before
    /// join; `None` once disconnected or the bus is gone. Cancel safe.
    pub async fn next_outbound(&mut self) -> Option<Arc<ServerMessage>> {
        let Some(subscription) = self.subscription.as_mut() else {
            if self.phase == Phase::Disconnected {
                return None;
            }
            return std::future::pending().await;
        };
        let inbound = subscription.recv().await?;
        Some(self.deliver(inbound))
    }

    /// Non-blocking [`Connection::next_outbound`].
    pub fn try_next_outbound(&mut self) -> Option<Arc<ServerMessage>> {
        let inbound = self.subscription.as_mut()?.try_recv()?;
        Some(self.deliver(inbound))
    }

    // ── Teardown ────────────────────────────────────────────────────────

    /// Terminal transition. Removes the session (announcing `player-leave`
    /// to everyone else) and stops outbound delivery. Returns `true` only
    /// for the call that actually performed it.
    pub fn disconnect(&mut self) -> bool {
        if self.phase == Phase::Disconnected {
            return false;
        }
        let was_joined = self.phase == Phase::Joined;
        self.phase = Phase::Disconnected;
        self.subscription = None;

        if was_joined {
            if let Some(session) = self.state.players.leave(self.id) {
                tracing::info!("{} ('{}') left", self.id, session.name);
            }
        }
        self.state.metrics.connection_closed();
        true
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
