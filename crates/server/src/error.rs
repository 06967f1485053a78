//! Per-caller error reporting.
//!
//! [`ClientError`] covers every way a single inbound event can fail. None of
//! them are fatal: the failing event is dropped and, where useful, the
//! sender gets an `error` frame. Other connections never see them.

use craftsync_engine::world::position::BlockPos;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountError;
use crate::persistence::PersistError;
use crate::player_registry::RegistryError;
use crate::protocol::{ErrorReport, ServerMessage};

/// Machine-readable error category carried in `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Protected,
    Io,
    NotJoined,
    Unauthenticated,
    Auth,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("malformed message: {0}")]
    Validation(String),

    #[error("block at {0} is already occupied")]
    Occupied(BlockPos),

    #[error("block at {0} is indestructible")]
    Protected(BlockPos),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("join the world first")]
    NotJoined,

    #[error("log in or sign up before joining")]
    Unauthenticated,

    #[error("already authenticated")]
    AlreadyAuthenticated,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Occupied(_) | Self::Registry(_) | Self::AlreadyAuthenticated => ErrorKind::Conflict,
            Self::Protected(_) => ErrorKind::Protected,
            Self::Persist(PersistError::NotFound(_)) => ErrorKind::NotFound,
            Self::Persist(_) => ErrorKind::Io,
            Self::Account(AccountError::AlreadyExists) => ErrorKind::Conflict,
            Self::Account(_) => ErrorKind::Auth,
            Self::NotJoined => ErrorKind::NotJoined,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    /// The `error` frame reported back to the caller.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error(ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        })
    }
}
