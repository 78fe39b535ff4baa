use thiserror::Error;

/// Request attribute a token can be bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextField {
    Method,
    Path,
    Host,
    BodyHash,
}

impl ContextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextField::Method => "method",
            ContextField::Path => "path",
            ContextField::Host => "host",
            ContextField::BodyHash => "body hash",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("internal auth secret is not configured")]
    MissingSecret,
    #[error("malformed token")]
    MalformedToken,
    #[error("corrupt token")]
    CorruptToken,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("expired token")]
    ExpiredToken,
    #[error("token expiry {exp} lies beyond the allowed skew")]
    IssuedInFuture { exp: i64 },
    #[error("replay detected")]
    ReplayDetected,
    #[error("{} mismatch", field.as_str())]
    ContextMismatch { field: ContextField },
    #[error("encode token payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AuthError {
    /// True when the token itself is unusable, as opposed to a valid token
    /// presented against the wrong request.
    pub fn is_token_invalid(&self) -> bool {
        !matches!(self, AuthError::ContextMismatch { .. })
    }
}
