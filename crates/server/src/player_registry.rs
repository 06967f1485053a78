//! Session registry: every joined connection's pose and name.
//!
//! Each successful join/move/rename/leave is handed to the [`Router`] while
//! the registry lock is held, so all subscribers see session events in the
//! order they were committed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::router::Router;

/// Transport-assigned connection identity. Allocated from a monotonic
/// counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position and heading of a player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f64,
}

/// Partial pose update. Only present fields are applied and re-broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
}

impl PoseDelta {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.yaw.is_none()
    }

    pub fn apply_to(&self, pose: &mut Pose) {
        if let Some(x) = self.x {
            pose.x = x;
        }
        if let Some(y) = self.y {
            pose.y = y;
        }
        if let Some(z) = self.z {
            pose.z = z;
        }
        if let Some(yaw) = self.yaw {
            pose.yaw = yaw;
        }
    }
}

/// A joined player.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: ConnectionId,
    pub pose: Pose,
    pub name: String,
}

/// Committed session changes, as handed to the router.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined(Session),
    Moved { id: ConnectionId, delta: PoseDelta },
    Renamed { id: ConnectionId, name: String },
    Left { id: ConnectionId },
}

impl SessionEvent {
    /// The connection the event is about (and originated from).
    pub fn origin(&self) -> ConnectionId {
        match self {
            Self::Joined(session) => session.id,
            Self::Moved { id, .. } | Self::Renamed { id, .. } | Self::Left { id } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} has already joined")]
    AlreadyJoined(ConnectionId),
}

/// Thread-safe registry of joined players.
///
/// Uses `std::sync::RwLock` because every operation is brief (no awaits while
/// the lock is held) and snapshots must be consistent.
pub struct PlayerRegistry {
    players: RwLock<HashMap<ConnectionId, Session>>,
    router: Router,
}

impl PlayerRegistry {
    pub fn new(router: Router) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            router,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Session>> {
        self.players.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Session>> {
        self.players.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session and announce it to everyone else.
    pub fn join(&self, id: ConnectionId, pose: Pose, name: String) -> Result<Session, RegistryError> {
        let mut players = self.write();
        if players.contains_key(&id) {
            return Err(RegistryError::AlreadyJoined(id));
        }
        let session = Session { id, pose, name };
        players.insert(id, session.clone());
        self.router.session_changed(&SessionEvent::Joined(session.clone()));
        Ok(session)
    }

    /// Apply a partial pose update. `None` if `id` has no session, in which
    /// case nothing is broadcast.
    pub fn update_pose(&self, id: ConnectionId, delta: PoseDelta) -> Option<Pose> {
        let mut players = self.write();
        let session = players.get_mut(&id)?;
        delta.apply_to(&mut session.pose);
        let pose = session.pose;
        if !delta.is_empty() {
            self.router.session_changed(&SessionEvent::Moved { id, delta });
        }
        Some(pose)
    }

    /// Rename a session. `None` if `id` has no session.
    pub fn rename(&self, id: ConnectionId, name: String) -> Option<Session> {
        let mut players = self.write();
        let session = players.get_mut(&id)?;
        session.name = name.clone();
        let renamed = session.clone();
        self.router.session_changed(&SessionEvent::Renamed { id, name });
        Some(renamed)
    }

    /// Remove a session and announce its departure. Calling it again for the
    /// same id returns `None` and broadcasts nothing.
    pub fn leave(&self, id: ConnectionId) -> Option<Session> {
        let mut players = self.write();
        let session = players.remove(&id)?;
        self.router.session_changed(&SessionEvent::Left { id });
        Some(session)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Session> {
        self.read().get(&id).cloned()
    }

    /// Consistent copy of all sessions, ordered by connection id.
    pub fn snapshot(&self) -> BTreeMap<ConnectionId, Session> {
        self.read()
            .iter()
            .map(|(id, session)| (*id, session.clone()))
            .collect()
    }

    /// Number of currently joined players.
    pub fn player_count(&self) -> usize {
        self.read().len()
    }
}
