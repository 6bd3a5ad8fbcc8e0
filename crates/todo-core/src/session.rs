//! Session Management
//!
//! Keeps the current auth session in memory and on disk (`session.json` in
//! the app data dir) so a restart lands on the list instead of the sign-in
//! form. Sessions close to expiry are refreshed on access.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{Session, SignUpOutcome, User};
use crate::error::{AuthError, ConfigError};
use crate::remote::{AuthApi, TokenProvider};

pub const SESSION_FILE_NAME: &str = "session.json";

const RESEND_WITHOUT_EMAIL: &str = "Unable to resend verification email. Please try signing up again.";

/// JSON file holding the last session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, session: &Session) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

pub struct SessionManager {
    auth: Arc<dyn AuthApi>,
    store: SessionStore,
    current: RwLock<Option<Session>>,
    /// Address of a sign-up still waiting for its verification mail
    pending_email: RwLock<Option<String>>,
    /// Held while a refresh is in flight; refresh tokens are single-use
    refreshing: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Restores a previously stored session, if readable
    pub fn new(auth: Arc<dyn AuthApi>, store: SessionStore) -> Self {
        let restored = store.load().unwrap_or_else(|e| {
            log::warn!("[SESSION] Ignoring unreadable {}: {}", store.path().display(), e);
            None
        });
        if let Some(session) = &restored {
            log::info!("[SESSION] Restored session for {}", session.user_id());
        }
        Self {
            auth,
            store,
            current: RwLock::new(restored),
            pending_email: RwLock::new(None),
            refreshing: tokio::sync::Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set(&self, session: Option<Session>) {
        let stored = match &session {
            Some(session) => self.store.save(session),
            None => self.store.clear(),
        };
        if let Err(e) = stored {
            log::warn!("[SESSION] Failed to persist session: {}", e);
        }
        *self.write() = session;
    }

    /// Session as held in memory, without refreshing
    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn pending_verification(&self) -> Option<String> {
        self.pending_email
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_pending(&self, email: Option<String>) {
        *self.pending_email.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = email;
    }

    /// Current session, refreshed first if it is about to expire.
    ///
    /// A refresh the service rejects ends the session.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let _refreshing = self.refreshing.lock().await;
        // Someone else may have refreshed (or signed out) while we waited
        let Some(session) = self.current() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        log::info!("[SESSION] Refreshing session for {}", session.user_id());
        match self.auth.refresh_session(&session.refresh_token).await {
            Ok(fresh) => {
                self.set(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                log::warn!("[SESSION] Refresh failed, signing out: {}", e);
                self.set(None);
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.auth.sign_in_with_password(email.trim(), password).await?;
        log::info!("[SESSION] Signed in {}", session.user_id());
        self.set_pending(None);
        self.set(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.auth.sign_up(email.trim(), password).await?;
        match &outcome {
            SignUpOutcome::SignedIn { session } => {
                self.set_pending(None);
                self.set(Some(session.clone()));
            }
            SignUpOutcome::NeedsVerification { email } => {
                log::info!("[SESSION] Verification mail sent to {}", email);
                self.set_pending(Some(email.clone()));
            }
        }
        Ok(outcome)
    }

    /// Ends the session locally no matter what; a remote failure is still reported
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.write().take();
        if let Err(e) = self.store.clear() {
            log::warn!("[SESSION] Failed to remove stored session: {}", e);
        }
        match previous {
            Some(session) => {
                log::info!("[SESSION] Signing out {}", session.user_id());
                self.auth.sign_out(&session.access_token).await
            }
            None => Ok(()),
        }
    }

    /// Resend the sign-up mail to `email`, or else to the known address
    pub async fn resend_verification(&self, email: Option<&str>) -> Result<(), AuthError> {
        let target = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or_else(|| self.current().and_then(|s| s.user.email))
            .or_else(|| self.pending_verification())
            .ok_or_else(|| AuthError::Unavailable(RESEND_WITHOUT_EMAIL.to_string()))?;
        self.auth.resend_verification(&target).await
    }

    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().await?.ok_or(AuthError::NoSession)?;
        self.auth.get_user(&session.access_token).await
    }
}

#[async_trait]
impl TokenProvider for SessionManager {
    async fn access_token(&self) -> Option<String> {
        match self.get_session().await {
            Ok(session) => session.map(|s| s.access_token),
            Err(e) => {
                log::warn!("[SESSION] No token available: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;

    fn manager(dir: &Path, backend: &MemoryBackend) -> SessionManager {
        SessionManager::new(Arc::new(backend.clone()), SessionStore::in_dir(dir))
    }

    #[tokio::test]
    async fn test_sign_in_persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.add_user("m@example.com", "pw", true);

        let session = manager(dir.path(), &backend)
            .sign_in(" m@example.com ", "pw")
            .await
            .unwrap();

        let restarted = manager(dir.path(), &backend);
        assert_eq!(restarted.get_session().await.unwrap(), Some(session.clone()));
        assert_eq!(restarted.access_token().await, Some(session.access_token));
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.add_user("m@example.com", "pw", true);
        let mut session = backend.sign_in_with_password("m@example.com", "pw").await.unwrap();
        session.expires_at = chrono::Utc::now().timestamp() + 30;
        SessionStore::in_dir(dir.path()).save(&session).unwrap();

        let manager = manager(dir.path(), &backend);
        let fresh = manager.get_session().await.unwrap().unwrap();

        assert_ne!(fresh.access_token, session.access_token);
        assert!(!fresh.is_expired());
        assert_eq!(SessionStore::in_dir(dir.path()).load().unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_use() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.add_user("m@example.com", "pw", true);
        let mut session = backend.sign_in_with_password("m@example.com", "pw").await.unwrap();
        session.expires_at = chrono::Utc::now().timestamp() - 600;
        SessionStore::in_dir(dir.path()).save(&session).unwrap();
        let manager = manager(dir.path(), &backend);

        let token = manager.access_token().await.unwrap();

        assert_ne!(token, session.access_token);
        assert!(backend.is_token_active(&token));
        assert!(!manager.current().unwrap().is_expired());
        // A fresh token is handed out as is
        assert_eq!(manager.access_token().await, Some(token));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_refresh_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.add_user("m@example.com", "pw", true);
        let mut session = backend.sign_in_with_password("m@example.com", "pw").await.unwrap();
        session.expires_at = 0;
        SessionStore::in_dir(dir.path()).save(&session).unwrap();
        let manager = Arc::new(manager(dir.path(), &backend));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.access_token().await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.access_token().await }
        });
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert!(first.is_some());
        assert_eq!(first, second);
        assert!(manager.current().is_some());
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let user = backend.add_user("m@example.com", "pw", true);
        let stale = Session {
            access_token: "old".into(),
            refresh_token: "unknown".into(),
            token_type: "bearer".into(),
            expires_at: 0,
            user,
        };
        SessionStore::in_dir(dir.path()).save(&stale).unwrap();

        let manager = manager(dir.path(), &backend);
        assert_eq!(manager.get_session().await.unwrap(), None);
        assert!(!dir.path().join(SESSION_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.add_user("m@example.com", "pw", true);
        let manager = manager(dir.path(), &backend);
        let session = manager.sign_in("m@example.com", "pw").await.unwrap();

        manager.sign_out().await.unwrap();

        assert_eq!(manager.current(), None);
        assert_eq!(manager.access_token().await, None);
        assert!(!backend.is_token_active(&session.access_token));
        assert!(!dir.path().join(SESSION_FILE_NAME).exists());
        // Signing out twice is harmless
        manager.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_up_then_resend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let manager = manager(dir.path(), &backend);

        let outcome = manager.sign_up("new@example.com", "pw").await.unwrap();
        assert_eq!(
            outcome,
            SignUpOutcome::NeedsVerification {
                email: "new@example.com".into()
            }
        );
        assert_eq!(manager.current(), None);

        manager.resend_verification(None).await.unwrap();
        assert_eq!(backend.verification_mails(), vec!["new@example.com", "new@example.com"]);
    }

    #[tokio::test]
    async fn test_auto_confirmed_sign_up_signs_in() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        backend.set_auto_confirm(true);
        let manager = manager(dir.path(), &backend);

        let outcome = manager.sign_up("new@example.com", "pw").await.unwrap();
        let SignUpOutcome::SignedIn { session } = outcome else {
            panic!("expected a session");
        };
        assert_eq!(manager.current(), Some(session));
    }

    #[tokio::test]
    async fn test_resend_without_any_email() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), &MemoryBackend::new());

        let err = manager.resend_verification(Some("  ")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resend verification email. Please try signing up again."
        );
    }

    #[tokio::test]
    async fn test_get_user_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), &MemoryBackend::new());
        assert_eq!(manager.get_user().await, Err(AuthError::NoSession));
    }
}
