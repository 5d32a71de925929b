//! HS256 access-token issuing and validation.

use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

/// Access tokens are valid for 24 hours.
const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Raw byte length of the signing secret.
const SECRET_LEN: usize = 32;

/// Read the signing secret from `data_dir/jwt_secret`, generating a fresh
/// 256-bit random one on first boot. A file of the wrong size is replaced
/// rather than trusted.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let path = Path::new(data_dir).join("jwt_secret");

    if path.exists() {
        let secret = std::fs::read(&path)?;
        if secret.len() == SECRET_LEN {
            tracing::info!("JWT signing secret loaded from {}", path.display());
            return Ok(secret);
        }
        tracing::warn!(
            "JWT secret file has unexpected size {}, generating a new one",
            secret.len()
        );
    }

    let secret: [u8; SECRET_LEN] = rand::rng().random();
    std::fs::write(&path, secret)?;
    tracing::info!("JWT signing secret written to {}", path.display());
    Ok(secret.to_vec())
}

/// Issue an access token for `user_id`.
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Decode and verify an access token, returning its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}
