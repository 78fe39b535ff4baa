//! Outbound header assembly for widget-issued requests.

use sha2::{Digest, Sha256};
use url::Url;

use crate::endpoint::{Origin, is_internal_endpoint};
use crate::token::{TokenBinding, TokenCodec};

pub const INTERNAL_USER_HEADER: &str = "X-Internal-User";

/// Who is making the outbound request and from where.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Origin of the page the widget is serving, if known.
    pub origin: Option<Origin>,
    /// Authenticated user the token is issued for.
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(origin: Option<Origin>, user_id: Option<String>) -> Self {
        Self { origin, user_id }
    }

    pub fn anonymous(origin: Origin) -> Self {
        Self {
            origin: Some(origin),
            user_id: None,
        }
    }

    pub fn is_internal(&self, endpoint: &str) -> bool {
        match &self.origin {
            Some(origin) => is_internal_endpoint(endpoint, origin),
            None => !endpoint.trim().is_empty() && Url::parse(endpoint.trim()).is_err(),
        }
    }
}

/// Lowercase hex SHA-256 of a request body.
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Decides which credentials accompany an outbound request.
#[derive(Clone, Debug)]
pub struct OutboundAuth {
    codec: TokenCodec,
    enabled: bool,
}

impl OutboundAuth {
    pub fn new(codec: TokenCodec, enabled: bool) -> Self {
        Self { codec, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Merge caller headers with the internal token when the target qualifies.
    ///
    /// With internal auth on, any caller `Authorization` header is dropped so a
    /// single credential is ever sent. The token is only attached to internal
    /// endpoints, for an authenticated user, when a signing secret exists and the
    /// caller did not supply their own.
    pub fn headers_for(
        &self,
        ctx: &RequestContext,
        endpoint: &str,
        method: &str,
        body: Option<&[u8]>,
        custom: &[(String, String)],
    ) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = custom
            .iter()
            .filter(|(name, _)| !(self.enabled && name.eq_ignore_ascii_case("authorization")))
            .cloned()
            .collect();

        if !self.enabled {
            return headers;
        }
        let has_token = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(INTERNAL_USER_HEADER));
        if has_token || !ctx.is_internal(endpoint) || !self.codec.can_issue() {
            return headers;
        }
        let Some(uid) = ctx.user_id.as_deref() else {
            return headers;
        };

        let mut binding = endpoint_binding(endpoint, method);
        if let Some(body) = body {
            binding = binding.body_hash(body_hash(body));
        }
        match self.codec.issue(uid, binding) {
            Ok(token) => headers.push((INTERNAL_USER_HEADER.to_string(), token)),
            Err(err) => tracing::warn!(endpoint, "internal auth token not issued: {err}"),
        }
        headers
    }
}

fn endpoint_binding(endpoint: &str, method: &str) -> TokenBinding {
    let method = method.to_ascii_uppercase();
    match Url::parse(endpoint) {
        Ok(url) => {
            let mut binding = TokenBinding::new(method, url.path());
            if let Some(origin) = Origin::from_url(&url) {
                binding = binding.host(origin.to_string());
            }
            binding
        }
        Err(_) => {
            let path = Url::parse("http://localhost/")
                .and_then(|base| base.join(endpoint))
                .map(|url| url.path().to_string())
                .unwrap_or_else(|_| "/".to_string());
            TokenBinding::new(method, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InternalAuthConfig;

    fn auth(enabled: bool, secret: &str) -> OutboundAuth {
        OutboundAuth::new(TokenCodec::new(InternalAuthConfig::new(secret)), enabled)
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Origin::parse("https://app.test"), Some("42".into()))
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn internal_endpoint_gets_token_bound_to_path() {
        let auth = auth(true, "s1");
        let headers = auth.headers_for(&ctx(), "/api/users?x=1", "get", None, &[]);
        let token = header(&headers, INTERNAL_USER_HEADER).expect("token header");
        let payload = TokenCodec::new(InternalAuthConfig::new("s1")).verify(token).unwrap();
        assert_eq!(payload.uid, "42");
        assert_eq!(payload.m.as_deref(), Some("GET"));
        assert_eq!(payload.p.as_deref(), Some("/api/users"));
        assert_eq!(payload.h, None);
        assert_eq!(payload.bh, None);
    }

    #[test]
    fn absolute_same_origin_binds_host_and_body() {
        let auth = auth(true, "s1");
        let headers = auth.headers_for(&ctx(), "https://app.test/api/tags", "POST", Some(b"{}"), &[]);
        let token = header(&headers, INTERNAL_USER_HEADER).unwrap();
        let payload = TokenCodec::new(InternalAuthConfig::new("s1")).verify(token).unwrap();
        assert_eq!(payload.h.as_deref(), Some("https://app.test"));
        assert_eq!(payload.bh, Some(body_hash(b"{}")));
    }

    #[test]
    fn external_endpoint_never_receives_token() {
        let auth = auth(true, "s1");
        let custom = vec![("Authorization".to_string(), "Bearer abc".to_string())];
        let headers = auth.headers_for(&ctx(), "https://api.other.test/users", "GET", None, &custom);
        assert!(header(&headers, INTERNAL_USER_HEADER).is_none());
        assert!(header(&headers, "authorization").is_none());
    }

    #[test]
    fn disabled_mode_passes_caller_headers_through() {
        let auth = auth(false, "s1");
        let custom = vec![
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Tenant".to_string(), "acme".to_string()),
        ];
        let headers = auth.headers_for(&ctx(), "/api/users", "GET", None, &custom);
        assert_eq!(headers, custom);
    }

    #[test]
    fn custom_headers_survive_and_authorization_is_replaced() {
        let auth = auth(true, "s1");
        let custom = vec![
            ("authorization".to_string(), "Bearer abc".to_string()),
            ("X-Tenant".to_string(), "acme".to_string()),
        ];
        let headers = auth.headers_for(&ctx(), "/api/users", "GET", None, &custom);
        assert_eq!(header(&headers, "X-Tenant"), Some("acme"));
        assert!(header(&headers, "Authorization").is_none());
        assert!(header(&headers, INTERNAL_USER_HEADER).is_some());
    }

    #[test]
    fn no_token_without_user_secret_or_when_caller_supplied_one() {
        let anonymous = RequestContext::anonymous(Origin::parse("https://app.test").unwrap());
        let headers = auth(true, "s1").headers_for(&anonymous, "/api/users", "GET", None, &[]);
        assert!(header(&headers, INTERNAL_USER_HEADER).is_none());

        let headers = auth(true, "").headers_for(&ctx(), "/api/users", "GET", None, &[]);
        assert!(header(&headers, INTERNAL_USER_HEADER).is_none());

        let custom = vec![("x-internal-user".to_string(), "given".to_string())];
        let headers = auth(true, "s1").headers_for(&ctx(), "/api/users", "GET", None, &custom);
        assert_eq!(headers, custom);
    }
}
