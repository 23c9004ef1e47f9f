// Session management over the key-value store
// A session is the (user, authToken) pair; anything partial counts as logged out

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};
use crate::types::{Session, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
}

pub struct AuthManager<S> {
    store: S,
    clock: Rc<dyn Clock>,
}

impl<S: KeyValueStore> AuthManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Rc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// True only when a user with non-empty `id`/`email` AND a non-empty
    /// token are both stored
    pub async fn is_authenticated(&self) -> Result<bool, StorageError> {
        Ok(self.session().await?.is_some())
    }

    /// Stored session, if complete
    pub async fn session(&self) -> Result<Option<Session>, StorageError> {
        let user = self.get_current_user().await?;
        let token = self.get_auth_token().await?;

        Ok(match (user, token) {
            (Some(user), Some(token)) if user.has_identity() => Some(Session { user, token }),
            _ => None,
        })
    }

    /// Stored user regardless of token presence. An unreadable record is
    /// treated as absent.
    pub async fn get_current_user(&self) -> Result<Option<User>, StorageError> {
        match self.store.get_json::<User>(keys::USER).await {
            Ok(user) => Ok(user),
            Err(StorageError::Decode { reason, .. }) => {
                log::warn!("Discarding unreadable stored user: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_auth_token(&self) -> Result<Option<String>, StorageError> {
        let token = match self.store.get_json::<String>(keys::AUTH_TOKEN).await {
            Ok(token) => token,
            Err(StorageError::Decode { .. }) => None,
            Err(e) => return Err(e),
        };
        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Sequential writes with no rollback: user, token, then `lastLogin`
    pub async fn set_user(&self, user: &User, token: &str) -> Result<(), StorageError> {
        self.store.set_json(keys::USER, user).await?;
        self.store.set_json(keys::AUTH_TOKEN, token).await?;
        self.store
            .set_json(keys::LAST_LOGIN, &self.clock.now_millis())
            .await?;
        log::info!("Session stored for {}", user.email);
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), StorageError> {
        self.store.remove(&keys::SESSION).await?;
        log::info!("Session cleared");
        Ok(())
    }

    /// `{isAuthenticated, user}`; user only when authenticated
    pub async fn check_status(&self) -> Result<AuthStatus, StorageError> {
        let session = self.session().await?;
        Ok(AuthStatus {
            is_authenticated: session.is_some(),
            user: session.map(|s| s.user),
        })
    }

    /// Presence check only; the backend offers no refresh endpoint and a
    /// token is assumed valid for the whole session.
    pub async fn refresh_token(&self) -> bool {
        match (self.get_current_user().await, self.get_auth_token().await) {
            (Ok(Some(_)), Ok(Some(_))) => true,
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Error refreshing auth token: {}", e);
                false
            }
            _ => false,
        }
    }

    pub async fn last_login(&self) -> Option<u64> {
        self.store.get_json(keys::LAST_LOGIN).await.ok().flatten()
    }
}
