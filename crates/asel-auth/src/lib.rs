//! Self-issued request tokens for same-origin widget traffic.
//!
//! The issuing side ([`OutboundAuth`]) decides whether a request may carry a
//! token and binds it to the request; the verifying side
//! ([`internal_authenticate`]) checks signature, expiry, replay and request
//! context before attaching an [`InternalUser`].

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod replay;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::InternalAuthConfig;
pub use endpoint::{Origin, is_internal_endpoint, resolve_endpoint};
pub use error::{AuthError, ContextField};
pub use headers::{INTERNAL_USER_HEADER, OutboundAuth, RequestContext, body_hash};
pub use middleware::{InternalAuthState, InternalUser, PermissionChecker, internal_authenticate};
pub use replay::{MemoryNonceStore, NonceStore};
pub use token::{TOKEN_TTL_SECS, TokenBinding, TokenCodec, TokenPayload};
