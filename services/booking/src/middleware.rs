//! Authentication middleware for JWT access token validation

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::env;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Claims carried by tokens issued by the auth service
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: u64,
    pub exp: u64,
    pub token_type: TokenKind,
    #[serde(default)]
    pub jti: Option<Uuid>,
}

/// Token type, must match the auth service's serialization
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Authenticated user id extracted from a valid access token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Verifies access tokens with the shared HS256 secret
///
/// Built once at startup and stored in the application state, so request
/// handling never touches the environment.
#[derive(Clone)]
pub struct AccessTokenVerifier {
    decoding_key: DecodingKey,
}

impl AccessTokenVerifier {
    pub fn from_env() -> Result<Self, String> {
        let secret = env::var("JWT_ACCESS_SECRET")
            .map_err(|_| "JWT_ACCESS_SECRET environment variable not set".to_string())?;
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Validate a bearer token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| ApiError::Unauthenticated)?;

        if data.claims.token_type != TokenKind::Access {
            return Err(ApiError::Unauthenticated);
        }

        Ok(data.claims)
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state.verifier.verify(token)?;

    req.extensions_mut().insert(AuthUser { id: claims.sub });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde::Serialize;
    use serial_test::serial;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Serialize)]
    struct TestClaims {
        sub: Uuid,
        iat: u64,
        exp: u64,
        token_type: &'static str,
    }

    fn verifier(secret: &str) -> AccessTokenVerifier {
        AccessTokenVerifier {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn token(secret: &str, token_type: &'static str, expires_in: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = TestClaims {
            sub: Uuid::new_v4(),
            iat: now as u64,
            exp: (now + expires_in) as u64,
            token_type,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    #[serial]
    fn verifier_from_env_requires_secret() {
        unsafe {
            std::env::remove_var("JWT_ACCESS_SECRET");
        }
        assert!(AccessTokenVerifier::from_env().is_err());

        unsafe {
            std::env::set_var("JWT_ACCESS_SECRET", "env-secret");
        }
        let verifier = AccessTokenVerifier::from_env().unwrap();
        assert!(verifier.verify(&token("env-secret", "Access", 3600)).is_ok());

        unsafe {
            std::env::remove_var("JWT_ACCESS_SECRET");
        }
    }

    #[test]
    fn accepts_valid_access_token() {
        let verifier = verifier("secret");
        let claims = verifier.verify(&token("secret", "Access", 3600)).unwrap();
        assert_eq!(claims.token_type, TokenKind::Access);
    }

    #[test]
    fn rejects_refresh_token() {
        let verifier = verifier("secret");
        assert!(verifier.verify(&token("secret", "Refresh", 3600)).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = verifier("secret");
        assert!(verifier.verify(&token("secret", "Access", -120)).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = verifier("secret");
        assert!(verifier.verify(&token("other", "Access", 3600)).is_err());
    }
}
