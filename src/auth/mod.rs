pub mod jwt;
pub mod middleware;

use thiserror::Error;

/// Why a connection credential was rejected. Distinguished so the gateway
/// can close with the matching WebSocket close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Verifies credential material before a connection becomes active.
pub trait Authenticator: Send + Sync {
    fn verify(&self, credential: &str) -> Result<String, AuthError>;
}

/// HS256 JWT authenticator backed by the server's signing secret.
pub struct JwtAuthenticator {
    secret: Vec<u8>,
}

impl JwtAuthenticator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl Authenticator for JwtAuthenticator {
    fn verify(&self, credential: &str) -> Result<String, AuthError> {
        match jwt::validate_access_token(&self.secret, credential) {
            Ok(claims) => Ok(claims.sub),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => Err(AuthError::Invalid),
            },
        }
    }
}
