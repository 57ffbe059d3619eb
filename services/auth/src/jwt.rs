//! JWT service for token generation and validation
//!
//! Access and refresh tokens are signed with two independent HS256 secrets,
//! so an access token can never be replayed as a refresh token or vice
//! versa. Every refresh token carries a freshly generated `jti` which the
//! blacklist uses as its revocation key.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret used to sign access tokens
    pub access_secret: String,
    /// Secret used to sign refresh tokens
    pub refresh_secret: String,
    /// Access token expiration time in seconds (default: 1 hour)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_ACCESS_SECRET`: Secret for signing access tokens
    /// - `JWT_REFRESH_SECRET`: Secret for signing refresh tokens
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 3600)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let access_secret = std::env::var("JWT_ACCESS_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_ACCESS_SECRET environment variable not set"))?;

        let refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_REFRESH_SECRET environment variable not set"))?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "3600".to_string()) // 1 hour
            .parse()
            .unwrap_or(3600);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            access_secret,
            refresh_secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenKind,
    /// Unique token identifier, present on refresh tokens only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub jti: Option<Uuid>,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// Errors produced by token verification
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("wrong token kind")]
    WrongKind,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        JwtService {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
        }
    }

    /// Generate an access token for a user
    pub fn issue_access(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp() as u64,
            exp: (now + Duration::seconds(self.config.access_token_expiry as i64)).timestamp()
                as u64,
            token_type: TokenKind::Access,
            jti: None,
        };

        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        Ok(token)
    }

    /// Generate a refresh token for a user, returning the token and its jti
    pub fn issue_refresh(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(String, Uuid)> {
        let jti = Uuid::new_v4();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp() as u64,
            exp: (now + Duration::seconds(self.config.refresh_token_expiry as i64)).timestamp()
                as u64,
            token_type: TokenKind::Refresh,
            jti: Some(jti),
        };

        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        Ok((token, jti))
    }

    /// Validate a token of the expected kind and return its claims
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongKind);
        }

        Ok(data.claims)
    }

    /// Decode a refresh token without checking its expiry
    ///
    /// Used by logout, which revokes the token's jti even when the token has
    /// already expired.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.refresh_decoding, &validation)
            .map_err(|_| TokenError::Malformed)?;

        if data.claims.token_type != TokenKind::Refresh {
            return Err(TokenError::WrongKind);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_from_env_with_defaults() {
        unsafe {
            std::env::set_var("JWT_ACCESS_SECRET", "env-access");
            std::env::set_var("JWT_REFRESH_SECRET", "env-refresh");
        }

        let config = JwtConfig::from_env().unwrap();
        assert_eq!(config.access_secret, "env-access");
        assert_eq!(config.refresh_secret, "env-refresh");
        assert_eq!(config.access_token_expiry, 3600);
        assert_eq!(config.refresh_token_expiry, 604800);

        unsafe {
            std::env::remove_var("JWT_ACCESS_SECRET");
            std::env::remove_var("JWT_REFRESH_SECRET");
        }
    }

    #[test]
    #[serial]
    fn config_from_env_requires_secrets() {
        unsafe {
            std::env::remove_var("JWT_ACCESS_SECRET");
            std::env::remove_var("JWT_REFRESH_SECRET");
        }

        assert!(JwtConfig::from_env().is_err());
    }

    fn test_service() -> JwtService {
        JwtService::new(JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
        })
    }

    #[test]
    fn access_token_round_trip() {
        let service = test_service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let token = service.issue_access(user_id, now).unwrap();
        let claims = service.verify(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.jti, None);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn refresh_token_carries_fresh_jti() {
        let service = test_service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let (token_a, jti_a) = service.issue_refresh(user_id, now).unwrap();
        let (token_b, jti_b) = service.issue_refresh(user_id, now).unwrap();

        assert_ne!(jti_a, jti_b);

        let claims = service.verify(&token_a, TokenKind::Refresh).unwrap();
        assert_eq!(claims.jti, Some(jti_a));
        assert_ne!(token_a, token_b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = test_service();
        let issued = Utc::now() - Duration::hours(2);

        let token = service.issue_access(Uuid::new_v4(), issued).unwrap();
        let err = service.verify(&token, TokenKind::Access).unwrap_err();

        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn access_token_cannot_be_used_as_refresh() {
        let service = test_service();
        let now = Utc::now();

        // Different signing secrets, so the signature check already fails
        let token = service.issue_access(Uuid::new_v4(), now).unwrap();
        let err = service.verify(&token, TokenKind::Refresh).unwrap_err();

        assert_eq!(err, TokenError::Malformed);
    }

    #[test]
    fn kind_mismatch_is_detected_even_with_shared_secret() {
        let service = JwtService::new(JwtConfig {
            access_secret: "shared".to_string(),
            refresh_secret: "shared".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
        });

        let (token, _) = service.issue_refresh(Uuid::new_v4(), Utc::now()).unwrap();
        let err = service.verify(&token, TokenKind::Access).unwrap_err();

        assert_eq!(err, TokenError::WrongKind);
    }

    #[test]
    fn garbage_token_is_malformed() {
        let service = test_service();
        let err = service
            .verify("not-a-jwt-at-all", TokenKind::Access)
            .unwrap_err();

        assert_eq!(err, TokenError::Malformed);
    }

    #[test]
    fn logout_decode_accepts_expired_refresh_token() {
        let service = test_service();
        let issued = Utc::now() - Duration::days(30);

        let (token, jti) = service.issue_refresh(Uuid::new_v4(), issued).unwrap();

        assert_eq!(
            service.verify(&token, TokenKind::Refresh).unwrap_err(),
            TokenError::Expired
        );

        let claims = service.decode_ignoring_expiry(&token).unwrap();
        assert_eq!(claims.jti, Some(jti));
    }
}
