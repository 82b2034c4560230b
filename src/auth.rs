use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::io::Store;
use crate::{proceeds, Payload};

/// Store key holding the serialized credential.
pub const AUTH_TOKEN_KEY: &str = "authToken";

const SIGNATURE_PLACEHOLDER: &str = "secret-signature";

#[derive(Debug, Clone, Eq, Ord, PartialOrd, PartialEq)]
pub enum AuthResult {
    Success,
    SessionExpired,
    InvalidSession,
}

impl Serialize for AuthResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:?}", self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    subject: String,
    exp: i64,
}

/// Session-continuity marker shaped like a JWT.
///
/// This is not a security boundary. The signature segment is a fixed
/// placeholder that nobody can verify, because there is no trusted party
/// holding a key. A credential only tells the application that this device
/// completed login recently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    subject: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has {0} segments, expected 3")]
    WrongSegmentCount(usize),
    #[error("token {segment} is not base64")]
    Base64 { segment: &'static str },
    #[error("token {segment} is not valid JSON")]
    Json { segment: &'static str },
    #[error("token expiry {0} is out of range")]
    ExpiryOutOfRange(i64),
}

impl Credential {
    pub fn new(subject: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            expires_at,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// `base64(header).base64(payload).base64(signature)`
    pub fn to_token(&self) -> String {
        let header = TokenHeader {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let claims = TokenClaims {
            subject: self.subject.clone(),
            exp: self.expires_at.timestamp_millis(),
        };
        // plain structs of strings and integers always serialize
        let header = serde_json::to_string(&header).unwrap_or_default();
        let claims = serde_json::to_string(&claims).unwrap_or_default();
        format!(
            "{}.{}.{}",
            STANDARD.encode(header),
            STANDARD.encode(claims),
            STANDARD.encode(SIGNATURE_PLACEHOLDER)
        )
    }

    /// Decodes the three segments. The signature is never checked.
    pub fn from_token(raw: &str) -> Result<Self, TokenError> {
        let parts: Vec<&str> = raw.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(TokenError::WrongSegmentCount(parts.len()));
        };

        let _: serde_json::Value = decode_segment(header, "header")?;
        let claims: TokenClaims = decode_segment(payload, "payload")?;
        STANDARD
            .decode(signature)
            .map_err(|_| TokenError::Base64 {
                segment: "signature",
            })?;

        let expires_at = Utc
            .timestamp_millis_opt(claims.exp)
            .single()
            .ok_or(TokenError::ExpiryOutOfRange(claims.exp))?;
        Ok(Self::new(claims.subject, expires_at))
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    name: &'static str,
) -> Result<T, TokenError> {
    let bytes = STANDARD
        .decode(segment)
        .map_err(|_| TokenError::Base64 { segment: name })?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Json { segment: name })
}

/// Issues, stores, checks and revokes the operator's credential.
pub struct SessionManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock + Send + Sync>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock + Send + Sync>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn issue(&self, subject: &str) -> Credential {
        let credential = Credential::new(subject, self.clock.utc() + self.ttl);
        log::info!(
            "issued credential for `{}` valid until {}",
            subject,
            credential.expires_at()
        );
        credential
    }

    pub fn persist(&self, credential: &Credential) -> Payload<()> {
        self.store.put(AUTH_TOKEN_KEY, &credential.to_token())
    }

    pub fn check(&self, raw: Option<&str>) -> AuthResult {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return AuthResult::InvalidSession,
        };
        match Credential::from_token(raw) {
            Ok(credential) if credential.is_expired_at(self.clock.utc()) => {
                AuthResult::SessionExpired
            }
            Ok(_) => AuthResult::Success,
            Err(err) => {
                log::debug!("rejecting malformed credential: {}", err);
                AuthResult::InvalidSession
            }
        }
    }

    pub fn validate(&self, raw: Option<&str>) -> bool {
        self.check(raw) == AuthResult::Success
    }

    /// Checks the stored credential, dropping it once it has expired.
    pub fn ensure_authenticated(&self) -> Payload<AuthResult> {
        let raw = self.store.get(AUTH_TOKEN_KEY)?;
        let result = self.check(raw.as_deref());
        if result == AuthResult::SessionExpired {
            log::info!("stored credential expired, removing it");
            self.revoke()?;
        }
        proceeds(result)
    }

    pub fn revoke(&self) -> Payload<()> {
        self.store.delete(AUTH_TOKEN_KEY)
    }
}
