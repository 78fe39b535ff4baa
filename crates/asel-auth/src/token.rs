//! Compact signed tokens for same-origin requests.
//!
//! Wire form is `base64url(payload_json) "." base64url(hmac_sha256(payload_json))`
//! with padding stripped. The payload binds the token to a single method, path,
//! origin and body so that a leaked header cannot be replayed elsewhere.

use std::sync::Arc;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::clock::{Clock, SystemClock};
use crate::config::InternalAuthConfig;
use crate::error::AuthError;

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

/// URL-safe alphabet, no padding on encode, padding tolerated on decode.
const TOKEN_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Signed claims carried by a token. Field order is the canonical encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub uid: String,
    pub exp: i64,
    pub nonce: String,
    #[serde(default)]
    pub m: Option<String>,
    #[serde(default)]
    pub p: Option<String>,
    #[serde(default)]
    pub h: Option<String>,
    #[serde(default)]
    pub bh: Option<String>,
    #[serde(default)]
    pub perms: Vec<String>,
}

/// Request attributes a new token is scoped to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBinding {
    pub method: String,
    pub path: String,
    pub host: Option<String>,
    pub body_hash: Option<String>,
    pub perms: Vec<String>,
}

impl Default for TokenBinding {
    fn default() -> Self {
        Self {
            method: "GET".into(),
            path: "/".into(),
            host: None,
            body_hash: None,
            perms: Vec::new(),
        }
    }
}

impl TokenBinding {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn body_hash(mut self, hash: impl Into<String>) -> Self {
        self.body_hash = Some(hash.into());
        self
    }

    pub fn perms(mut self, perms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.perms = perms.into_iter().map(Into::into).collect();
        self
    }
}

/// Issues and verifies tokens under the configured secrets.
#[derive(Clone)]
pub struct TokenCodec {
    config: InternalAuthConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("config", &self.config)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(config: InternalAuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: InternalAuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &InternalAuthConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn can_issue(&self) -> bool {
        self.config.has_secret()
    }

    pub fn issue(&self, uid: impl Into<String>, binding: TokenBinding) -> Result<String, AuthError> {
        if !self.config.has_secret() {
            return Err(AuthError::MissingSecret);
        }
        let payload = TokenPayload {
            uid: uid.into(),
            exp: self.clock.now() + TOKEN_TTL_SECS,
            nonce: uuid::Uuid::new_v4().to_string(),
            m: Some(binding.method),
            p: Some(binding.path),
            h: binding.host,
            bh: binding.body_hash,
            perms: binding.perms,
        };
        self.encode(&payload)
    }

    /// Sign an arbitrary payload with the current secret.
    pub fn encode(&self, payload: &TokenPayload) -> Result<String, AuthError> {
        let json = serde_json::to_vec(payload)?;
        let mut mac = mac_for(&self.config.secret)?;
        mac.update(&json);
        let sig = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            TOKEN_B64.encode(&json),
            TOKEN_B64.encode(sig)
        ))
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let (p64, s64) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        let payload_json = TOKEN_B64.decode(p64).map_err(|_| AuthError::CorruptToken)?;
        let sig = TOKEN_B64.decode(s64).map_err(|_| AuthError::CorruptToken)?;

        let secrets = self.config.valid_secrets();
        if secrets.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        let signed = secrets.into_iter().any(|secret| {
            mac_for(secret)
                .map(|mut mac| {
                    mac.update(&payload_json);
                    mac.verify_slice(&sig).is_ok()
                })
                .unwrap_or(false)
        });
        if !signed {
            return Err(AuthError::InvalidSignature);
        }

        let payload: TokenPayload =
            serde_json::from_slice(&payload_json).map_err(|_| AuthError::CorruptToken)?;

        let now = self.clock.now();
        if now > payload.exp {
            return Err(AuthError::ExpiredToken);
        }
        let horizon = now + TOKEN_TTL_SECS + self.config.skew.as_secs() as i64;
        if payload.exp > horizon {
            return Err(AuthError::IssuedInFuture { exp: payload.exp });
        }
        Ok(payload)
    }
}

fn mac_for(secret: &str) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::MissingSecret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    const NOW: i64 = 1_700_000_000;

    fn codec(config: InternalAuthConfig, clock: &FixedClock) -> TokenCodec {
        TokenCodec::with_clock(config, Arc::new(clock.clone()))
    }

    fn binding() -> TokenBinding {
        TokenBinding::new("GET", "/api/users")
            .host("https://app.test")
            .body_hash("abc123")
            .perms(["users.view"])
    }

    #[test]
    fn round_trip_recovers_every_field() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        let token = codec.issue("42", binding()).unwrap();

        assert!(!token.contains('='));
        let payload = codec.verify(&token).unwrap();
        assert_eq!(payload.uid, "42");
        assert_eq!(payload.exp, NOW + TOKEN_TTL_SECS);
        assert_eq!(payload.m.as_deref(), Some("GET"));
        assert_eq!(payload.p.as_deref(), Some("/api/users"));
        assert_eq!(payload.h.as_deref(), Some("https://app.test"));
        assert_eq!(payload.bh.as_deref(), Some("abc123"));
        assert_eq!(payload.perms, vec!["users.view".to_string()]);
        assert!(uuid::Uuid::parse_str(&payload.nonce).is_ok());
    }

    #[test]
    fn nonces_differ_between_tokens() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        let a = codec.verify(&codec.issue("1", TokenBinding::default()).unwrap()).unwrap();
        let b = codec.verify(&codec.issue("1", TokenBinding::default()).unwrap()).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn rotation_accepts_previous_secret_only() {
        let clock = FixedClock::new(NOW);
        let old = codec(InternalAuthConfig::new("s1"), &clock);
        let token = old.issue("7", TokenBinding::default()).unwrap();

        let rotated = codec(InternalAuthConfig::new("s2").with_previous_secret("s1"), &clock);
        assert_eq!(rotated.verify(&token).unwrap().uid, "7");

        let other = codec(InternalAuthConfig::new("s3"), &clock);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn expired_token_fails_despite_valid_signature() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        let token = codec.issue("7", TokenBinding::default()).unwrap();

        clock.advance(TOKEN_TTL_SECS);
        assert!(codec.verify(&token).is_ok());
        clock.advance(1);
        assert!(matches!(codec.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn far_future_expiry_is_rejected() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        let payload = TokenPayload {
            uid: "7".into(),
            exp: NOW + 3600,
            nonce: "n".into(),
            m: None,
            p: None,
            h: None,
            bh: None,
            perms: Vec::new(),
        };
        let token = codec.encode(&payload).unwrap();
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::IssuedInFuture { .. })
        ));
    }

    #[test]
    fn structural_failures_are_classified() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        assert!(matches!(codec.verify("no-separator"), Err(AuthError::MalformedToken)));
        assert!(matches!(codec.verify("!!!.abc"), Err(AuthError::CorruptToken)));

        let token = codec.issue("7", TokenBinding::default()).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", TOKEN_B64.encode(br#"{"uid":"1"}"#), sig);
        assert!(matches!(codec.verify(&forged), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn padded_segments_are_tolerated() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::new("s1"), &clock);
        let token = codec.issue("7", TokenBinding::default()).unwrap();
        let (p, s) = token.split_once('.').unwrap();
        let pad = |seg: &str| format!("{seg}{}", "=".repeat((4 - seg.len() % 4) % 4));
        assert!(codec.verify(&format!("{}.{}", pad(p), pad(s))).is_ok());
    }

    #[test]
    fn issuing_without_secret_fails() {
        let clock = FixedClock::new(NOW);
        let codec = codec(InternalAuthConfig::default(), &clock);
        assert!(!codec.can_issue());
        assert!(matches!(
            codec.issue("7", TokenBinding::default()),
            Err(AuthError::MissingSecret)
        ));
    }
}
