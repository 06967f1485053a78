//! Account collaborator seam.
//!
//! Credential storage and hashing live outside this server. A deployment
//! that wants logins plugs an [`AccountService`] into
//! [`ServerState::with_accounts`](crate::state::ServerState::with_accounts).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("an account with that email already exists")]
    AlreadyExists,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("accounts are not enabled on this server")]
    Disabled,
    #[error("account service unavailable: {0}")]
    Unavailable(String),
}

/// External account store. Calls may block; the server runs them on the
/// blocking pool.
pub trait AccountService: Send + Sync + 'static {
    fn signup(&self, email: &str, password: &str) -> Result<AccountId, AccountError>;

    fn login(&self, email: &str, password: &str) -> Result<AccountId, AccountError>;
}
