//! Session lifecycle management
//!
//! Orchestrates login, refresh, and logout over the JWT service, the user
//! directory, and the refresh token blacklist. Refresh is single-use: every
//! successful refresh rotates the token pair and revokes the jti that was
//! just presented, before the new tokens are handed out.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::jwt::{JwtService, TokenKind};
use crate::models::{User, UserSummary};

/// Identity and credential lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    fn check_password(&self, user: &User, password: &str) -> bool;
}

/// Persistent store of revoked refresh token identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Idempotent insert; returns true iff the jti was newly recorded
    async fn revoke(
        &self,
        jti: Uuid,
        user_id: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    async fn is_revoked(&self, jti: Uuid) -> Result<bool>;

    /// Delete records whose expiry has passed; returns the number deleted
    async fn prune(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Tokens and user summary returned on login
#[derive(Debug)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Rotated token pair returned on refresh
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session manager orchestrating the auth flows
#[derive(Clone)]
pub struct SessionManager {
    jwt: JwtService,
    users: Arc<dyn UserDirectory>,
    blacklist: Arc<dyn RevocationStore>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        jwt: JwtService,
        users: Arc<dyn UserDirectory>,
        blacklist: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            jwt,
            users,
            blacklist,
        }
    }

    /// Authenticate a user and issue an access/refresh token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let user = self.users.find_by_email(email).await.map_err(|e| {
            error!("Failed to look up user: {}", e);
            AuthError::Internal
        })?;

        // Absent user and wrong password produce the same error so login
        // cannot be used to enumerate accounts
        let Some(user) = user else {
            info!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.users.check_password(&user, password) {
            info!("Login attempt with wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();

        let access_token = self.jwt.issue_access(user.id, now).map_err(|e| {
            error!("Failed to issue access token: {}", e);
            AuthError::Internal
        })?;

        let (refresh_token, _) = self.jwt.issue_refresh(user.id, now).map_err(|e| {
            error!("Failed to issue refresh token: {}", e);
            AuthError::Internal
        })?;

        info!("User {} logged in", user.id);

        Ok(LoginTokens {
            access_token,
            refresh_token,
            user: UserSummary::from(&user),
        })
    }

    /// Rotate a refresh token, revoking the one just used
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .jwt
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::Unauthenticated)?;

        let jti = claims.jti.ok_or(AuthError::Unauthenticated)?;

        let revoked = self.blacklist.is_revoked(jti).await.map_err(|e| {
            error!("Failed to check blacklist: {}", e);
            AuthError::Internal
        })?;

        if revoked {
            info!("Rejected refresh with revoked jti {}", jti);
            return Err(AuthError::Unauthenticated);
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(|e| {
                error!("Failed to look up user: {}", e);
                AuthError::Internal
            })?
            .ok_or(AuthError::Unauthenticated)?;

        let now = Utc::now();

        let access_token = self.jwt.issue_access(user.id, now).map_err(|e| {
            error!("Failed to issue access token: {}", e);
            AuthError::Internal
        })?;

        let (new_refresh_token, _) = self.jwt.issue_refresh(user.id, now).map_err(|e| {
            error!("Failed to issue refresh token: {}", e);
            AuthError::Internal
        })?;

        // Revoke the presented jti before returning the new pair. The insert
        // is idempotent; when two refresh calls race on the same token only
        // the first insert wins and the loser is turned away.
        let old_expires_at = DateTime::from_timestamp(claims.exp as i64, 0);
        let inserted = self
            .blacklist
            .revoke(jti, Some(user.id), old_expires_at)
            .await
            .map_err(|e| {
                error!("Failed to revoke rotated refresh token: {}", e);
                AuthError::Internal
            })?;

        if !inserted {
            info!("Lost rotation race for jti {}", jti);
            return Err(AuthError::Unauthenticated);
        }

        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    /// Best-effort logout: revoke the refresh token's jti if one can be read
    ///
    /// Expiry is not checked here and decode failures are swallowed; logout
    /// never fails because of a malformed cookie.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token else {
            return;
        };

        let Ok(claims) = self.jwt.decode_ignoring_expiry(token) else {
            return;
        };

        let Some(jti) = claims.jti else {
            return;
        };

        let expires_at = DateTime::from_timestamp(claims.exp as i64, 0);
        match self
            .blacklist
            .revoke(jti, Some(claims.sub), expires_at)
            .await
        {
            Ok(_) => info!("Revoked refresh token on logout for user {}", claims.sub),
            Err(e) => warn!("Failed to revoke refresh token on logout: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDirectory {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
            Ok(self.users.iter().find(|u| u.email == email).cloned())
        }

        fn check_password(&self, user: &User, password: &str) -> bool {
            user.password_hash == password
        }
    }

    #[derive(Default)]
    struct FakeBlacklist {
        entries: Mutex<HashMap<Uuid, Option<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl RevocationStore for FakeBlacklist {
        async fn revoke(
            &self,
            jti: Uuid,
            _user_id: Option<Uuid>,
            expires_at: Option<DateTime<Utc>>,
        ) -> Result<bool> {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(&jti) {
                return Ok(false);
            }
            entries.insert(jti, expires_at);
            Ok(true)
        }

        async fn is_revoked(&self, jti: Uuid) -> Result<bool> {
            Ok(self.entries.lock().unwrap().contains_key(&jti))
        }

        async fn prune(&self, now: DateTime<Utc>) -> Result<u64> {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|_, expires_at| match expires_at {
                Some(expiry) => *expiry >= now,
                None => true,
            });
            Ok((before - entries.len()) as u64)
        }
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            role: "user".to_string(),
            password_hash: "correct-horse".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn manager_with(users: Vec<User>) -> (SessionManager, Arc<FakeBlacklist>) {
        let jwt = JwtService::new(JwtConfig {
            access_secret: "access".to_string(),
            refresh_secret: "refresh".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
        });
        let blacklist = Arc::new(FakeBlacklist::default());
        let manager = SessionManager::new(
            jwt,
            Arc::new(FakeDirectory { users }),
            blacklist.clone(),
        );
        (manager, blacklist)
    }

    #[tokio::test]
    async fn login_returns_token_pair_and_summary() {
        let user = test_user();
        let (manager, _) = manager_with(vec![user.clone()]);

        let tokens = manager
            .login("alice@example.com", "correct-horse")
            .await
            .unwrap();

        assert_eq!(tokens.user.id, user.id);
        assert_eq!(tokens.user.email, "alice@example.com");
        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (manager, _) = manager_with(vec![test_user()]);

        let wrong_password = manager
            .login("alice@example.com", "wrong")
            .await
            .unwrap_err();
        let unknown_email = manager
            .login("nobody@example.com", "correct-horse")
            .await
            .unwrap_err();

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(unknown_email, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn refresh_rotates_and_is_single_use() {
        let (manager, _) = manager_with(vec![test_user()]);

        let tokens = manager
            .login("alice@example.com", "correct-horse")
            .await
            .unwrap();

        let rotated = manager.refresh(&tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        // The presented token was revoked on rotation and cannot be replayed
        let replay = manager.refresh(&tokens.refresh_token).await.unwrap_err();
        assert_eq!(replay, AuthError::Unauthenticated);

        // But the rotated token works
        manager.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_and_access_tokens() {
        let (manager, _) = manager_with(vec![test_user()]);

        let tokens = manager
            .login("alice@example.com", "correct-horse")
            .await
            .unwrap();

        assert_eq!(
            manager.refresh("not-a-token").await.unwrap_err(),
            AuthError::Unauthenticated
        );
        assert_eq!(
            manager.refresh(&tokens.access_token).await.unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn refresh_fails_when_subject_is_gone() {
        let user = test_user();
        let (manager, _) = manager_with(vec![user.clone()]);
        let tokens = manager
            .login("alice@example.com", "correct-horse")
            .await
            .unwrap();

        // Same secrets, but the directory no longer knows the user
        let (empty_manager, _) = manager_with(vec![]);
        let err = empty_manager
            .refresh(&tokens.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated);
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let (manager, blacklist) = manager_with(vec![test_user()]);

        let tokens = manager
            .login("alice@example.com", "correct-horse")
            .await
            .unwrap();

        manager.logout(Some(&tokens.refresh_token)).await;

        let err = manager.refresh(&tokens.refresh_token).await.unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated);
        assert_eq!(blacklist.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn logout_swallows_missing_and_malformed_tokens() {
        let (manager, blacklist) = manager_with(vec![test_user()]);

        manager.logout(None).await;
        manager.logout(Some("garbage")).await;

        assert!(blacklist.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_is_idempotent() {
        let (_, blacklist) = manager_with(vec![]);
        let now = Utc::now();

        blacklist
            .revoke(Uuid::new_v4(), None, Some(now - chrono::Duration::hours(1)))
            .await
            .unwrap();
        blacklist
            .revoke(Uuid::new_v4(), None, Some(now + chrono::Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(blacklist.prune(now).await.unwrap(), 1);
        assert_eq!(blacklist.prune(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn revoke_is_first_write_wins() {
        let (_, blacklist) = manager_with(vec![]);
        let jti = Uuid::new_v4();

        assert!(blacklist.revoke(jti, None, None).await.unwrap());
        assert!(!blacklist.revoke(jti, None, None).await.unwrap());
    }
}
