use crate::config::ConfigError;
use crate::models::user::Claims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

/// Tokens live for exactly one hour. The cookie expiry mirrors this.
pub const TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// The only algorithm we sign with and the only one we accept.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, expired, garbage, non-UUID subject...
    /// The real reason is only logged.
    #[error("invalid token")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// A freshly signed credential plus the moment it stops working.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies identity tokens.
///
/// Built once at startup from the configured secret and shared read-only afterwards.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Fails if the secret is empty. A server that can't sign tokens has no business starting.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSigningKey);
        }

        // `Validation::new` pins the accepted algorithm list to exactly HS256.
        let mut validation = Validation::new(ALGORITHM);
        // Expired means expired. The default 60s grace period is not wanted here.
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issues a token for `identity`, valid from now for `TOKEN_LIFETIME_SECS`.
    pub fn issue(&self, identity: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Same as `issue` but with an explicit issue time. Lets tests mint tokens that are
    /// already expired without sleeping for an hour.
    pub fn issue_at(&self, identity: Uuid, issued_at: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = issued_at + Duration::seconds(TOKEN_LIFETIME_SECS);

        let claims = Claims {
            sub: identity.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Encode)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies the token and returns the identity it was issued for.
    ///
    /// This says nothing about whether the identity still exists. That check belongs
    /// to the resolver, which has a store handle.
    pub fn parse(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected token");
            TokenError::Invalid
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| {
            tracing::debug!("token subject is not a valid identity");
            TokenError::Invalid
        })
    }
}
