use std::time::Duration;

/// Secrets and timing windows for internal request tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct InternalAuthConfig {
    /// Key used to sign new tokens. Empty disables issuing.
    pub secret: String,
    /// Key accepted during rotation. Empty means none.
    pub previous_secret: String,
    /// How long a seen nonce is remembered.
    pub nonce_ttl: Duration,
    /// Tolerance for expiry timestamps set ahead of the verifier's clock.
    pub skew: Duration,
}

impl std::fmt::Debug for InternalAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalAuthConfig")
            .field("secret", &(!self.secret.is_empty()))
            .field("previous_secret", &(!self.previous_secret.is_empty()))
            .field("nonce_ttl", &self.nonce_ttl)
            .field("skew", &self.skew)
            .finish()
    }
}

impl Default for InternalAuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            previous_secret: String::new(),
            nonce_ttl: Duration::from_secs(120),
            skew: Duration::from_secs(60),
        }
    }
}

impl InternalAuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn with_previous_secret(mut self, previous: impl Into<String>) -> Self {
        self.previous_secret = previous.into();
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable numbers keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(secret) = lookup("ASYNC_SELECT_INTERNAL_SECRET") {
            config.secret = secret;
        }
        if let Some(previous) = lookup("ASYNC_SELECT_INTERNAL_PREVIOUS_SECRET") {
            config.previous_secret = previous;
        }
        if let Some(ttl) = lookup("ASYNC_SELECT_INTERNAL_NONCE_TTL").and_then(|v| v.trim().parse().ok()) {
            config.nonce_ttl = Duration::from_secs(ttl);
        }
        if let Some(skew) = lookup("ASYNC_SELECT_INTERNAL_SKEW").and_then(|v| v.trim().parse().ok()) {
            config.skew = Duration::from_secs(skew);
        }
        config
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Keys accepted during verification, current first.
    pub fn valid_secrets(&self) -> Vec<&str> {
        [self.secret.as_str(), self.previous_secret.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }
}
