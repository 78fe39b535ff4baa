//! Inbound verification of `X-Internal-User` tokens as axum middleware.
//!
//! Requests without the header pass through untouched so that the regular
//! authentication stack applies. Requests carrying it are authenticated by the
//! token alone: the signature, expiry and nonce must hold and the token must
//! have been issued for this exact method, path, origin and body.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::endpoint::Origin;
use crate::error::{AuthError, ContextField};
use crate::headers::{INTERNAL_USER_HEADER, body_hash};
use crate::replay::{MemoryNonceStore, NonceStore};
use crate::token::{TokenCodec, TokenPayload};

/// Identity attached to requests authenticated by an internal token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalUser {
    pub uid: String,
    pub perms: Vec<String>,
}

/// Authorization hook for the permissions a token demands.
pub trait PermissionChecker: Send + Sync {
    fn allows(&self, uid: &str, permission: &str) -> bool;
}

#[derive(Clone)]
pub struct InternalAuthState {
    codec: TokenCodec,
    nonces: Option<Arc<dyn NonceStore>>,
    permissions: Option<Arc<dyn PermissionChecker>>,
    default_scheme: String,
    trust_forwarded_proto: bool,
    max_body_bytes: usize,
}

impl std::fmt::Debug for InternalAuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalAuthState")
            .field("codec", &self.codec)
            .field("replay_protection", &self.nonces.is_some())
            .field("permissions", &self.permissions.is_some())
            .field("default_scheme", &self.default_scheme)
            .field("trust_forwarded_proto", &self.trust_forwarded_proto)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl InternalAuthState {
    pub fn new(codec: TokenCodec) -> Self {
        Self {
            codec,
            nonces: Some(Arc::new(MemoryNonceStore::new())),
            permissions: None,
            default_scheme: "http".into(),
            trust_forwarded_proto: false,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }

    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonces = Some(store);
        self
    }

    pub fn without_replay_protection(mut self) -> Self {
        self.nonces = None;
        self
    }

    pub fn with_permissions(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = Some(checker);
        self
    }

    /// Scheme assumed when the request URI carries none.
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Honor `X-Forwarded-Proto` when running behind a proxy.
    pub fn trust_forwarded_proto(mut self, trust: bool) -> Self {
        self.trust_forwarded_proto = trust;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn request_origin(&self, req: &Request) -> Option<Origin> {
        let forwarded = self
            .trust_forwarded_proto
            .then(|| req.headers().get("x-forwarded-proto"))
            .flatten()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim);
        let scheme = req
            .uri()
            .scheme_str()
            .or(forwarded)
            .unwrap_or(self.default_scheme.as_str());
        let authority = req.uri().authority().map(|a| a.as_str()).or_else(|| {
            req.headers()
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
        })?;
        Origin::from_host_header(scheme, authority)
    }
}

#[derive(Debug)]
enum Rejection {
    Invalid(AuthError),
    Mismatch(ContextField),
    Forbidden(String),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Rejection::Invalid(err) => (
                StatusCode::UNAUTHORIZED,
                "token_invalid",
                format!("Internal auth failed: {err}"),
            ),
            Rejection::Mismatch(field) => (
                StatusCode::UNAUTHORIZED,
                "context_mismatch",
                AuthError::ContextMismatch { field }.to_string(),
            ),
            Rejection::Forbidden(perm) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("Forbidden (permission: {perm})"),
            ),
        };
        let body = serde_json::json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

/// Use with `axum::middleware::from_fn_with_state`.
pub async fn internal_authenticate(
    State(state): State<InternalAuthState>,
    req: Request,
    next: Next,
) -> Response {
    let token = match req.headers().get(INTERNAL_USER_HEADER) {
        None => return next.run(req).await,
        Some(value) => match value.to_str() {
            Ok(token) => token.to_string(),
            Err(_) => return Rejection::Invalid(AuthError::MalformedToken).into_response(),
        },
    };

    match authenticate(&state, req, &token).await {
        Ok(req) => next.run(req).await,
        Err(rejection) => {
            tracing::warn!(?rejection, "internal auth rejected request");
            rejection.into_response()
        }
    }
}

async fn authenticate(
    state: &InternalAuthState,
    req: Request,
    token: &str,
) -> Result<Request, Rejection> {
    let payload = state.codec.verify(token).map_err(Rejection::Invalid)?;
    let mut req = check_context(state, req, &payload).await?;

    if let Some(nonces) = &state.nonces {
        nonces
            .check_and_record(
                &payload.nonce,
                state.codec.now(),
                state.codec.config().nonce_ttl,
            )
            .map_err(Rejection::Invalid)?;
    }

    if let Some(checker) = &state.permissions {
        if let Some(denied) = payload.perms.iter().find(|p| !checker.allows(&payload.uid, p)) {
            return Err(Rejection::Forbidden(denied.clone()));
        }
    }

    tracing::debug!(uid = %payload.uid, "internal auth accepted");
    req.extensions_mut().insert(InternalUser {
        uid: payload.uid,
        perms: payload.perms,
    });
    Ok(req)
}

async fn check_context(
    state: &InternalAuthState,
    req: Request,
    payload: &TokenPayload,
) -> Result<Request, Rejection> {
    if let Some(method) = &payload.m {
        if !method.eq_ignore_ascii_case(req.method().as_str()) {
            return Err(Rejection::Mismatch(ContextField::Method));
        }
    }
    if let Some(path) = &payload.p {
        if path != req.uri().path() {
            return Err(Rejection::Mismatch(ContextField::Path));
        }
    }
    if let Some(host) = &payload.h {
        let expected = Origin::parse(host);
        if expected.is_none() || expected != state.request_origin(&req) {
            return Err(Rejection::Mismatch(ContextField::Host));
        }
    }

    let Some(expected) = payload.bh.as_deref().filter(|bh| !bh.is_empty()) else {
        return Ok(req);
    };
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| Rejection::Mismatch(ContextField::BodyHash))?;
    if !body_hash(&bytes).eq_ignore_ascii_case(expected) {
        return Err(Rejection::Mismatch(ContextField::BodyHash));
    }
    Ok(axum::http::Request::from_parts(parts, Body::from(bytes)))
}
