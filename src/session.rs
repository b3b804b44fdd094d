//! Login session.
//!
//! Authentication is a single hardcoded credential pair. It gates the board
//! view and nothing else.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::storage::{self, SharedStorage, SESSION_KEY};

pub const DEMO_EMAIL: &str = "intern@demo.com";
pub const DEMO_PASSWORD: &str = "intern123";
pub const DEMO_NAME: &str = "Intern User";

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
}

/// Current identity. `loading` is set until the startup restore has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(User),
    Declined { message: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }
}

pub struct SessionStore {
    storage: SharedStorage,
    session: Session,
}

impl SessionStore {
    /// A store that has not restored yet.
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            session: Session {
                user: None,
                loading: true,
            },
        }
    }

    /// Create the store and restore any remembered login.
    pub fn open(storage: SharedStorage) -> Self {
        let mut store = Self::new(storage);
        store.restore();
        store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.user.is_some()
    }

    /// Adopt the persisted user record, if any. Presence alone is enough.
    pub fn restore(&mut self) {
        self.session.user = storage::load_json::<User>(self.storage.as_ref(), SESSION_KEY);
        self.session.loading = false;
        if let Some(user) = &self.session.user {
            tracing::debug!("Restored session for {}", user.email);
        }
    }

    /// Check the credential. With `remember`, the user is persisted so it
    /// survives a restart; otherwise the session lives only in memory.
    pub fn login(
        &mut self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginOutcome, SessionError> {
        if email != DEMO_EMAIL || password != DEMO_PASSWORD {
            tracing::info!("Login declined for {}", email);
            return Ok(LoginOutcome::Declined {
                message: INVALID_CREDENTIALS.to_string(),
            });
        }

        let user = User {
            email: email.to_string(),
            name: DEMO_NAME.to_string(),
        };
        if remember {
            storage::save_json(self.storage.as_ref(), SESSION_KEY, &user)?;
        }
        self.session.user = Some(user.clone());
        tracing::info!("Logged in as {}", user.email);
        Ok(LoginOutcome::Success(user))
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.storage.remove(SESSION_KEY)?;
        if let Some(user) = self.session.user.take() {
            tracing::info!("Logged out {}", user.email);
        }
        Ok(())
    }
}
