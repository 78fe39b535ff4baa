//! Origin handling and internal endpoint classification.

use url::{ParseError, Url};

/// Scheme, host and explicit port of a request target. Default ports are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    pub fn new(scheme: &str, host: &str, port: Option<u16>) -> Self {
        let scheme = scheme.to_ascii_lowercase();
        let port = port.filter(|p| Some(*p) != default_port(&scheme));
        Self {
            host: host.to_ascii_lowercase(),
            scheme,
            port,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Url::parse(input).ok().and_then(|url| Self::from_url(&url))
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self::new(url.scheme(), host, url.port()))
    }

    /// Build from a `Host` header value such as `app.test:8080`.
    pub fn from_host_header(scheme: &str, host: &str) -> Option<Self> {
        let host = host.trim();
        if host.is_empty() {
            return None;
        }
        Self::parse(&format!("{scheme}://{host}"))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| default_port(&self.scheme))
    }

    /// Base URL for resolving relative endpoints.
    pub fn to_url(&self) -> Option<Url> {
        Url::parse(&format!("{self}/")).ok()
    }

    fn same_site(&self, url: &Url) -> bool {
        match Self::from_url(url) {
            Some(other) => other == *self,
            None => false,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// True when `endpoint` targets the `current` origin: a relative path, or an
/// absolute URL whose scheme, host (case-insensitive) and port match.
pub fn is_internal_endpoint(endpoint: &str, current: &Origin) -> bool {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return false;
    }
    match Url::parse(endpoint) {
        Ok(url) => current.same_site(&url),
        Err(ParseError::RelativeUrlWithoutBase) => {
            if endpoint.starts_with("//") {
                // scheme-relative: inherits the current scheme
                Url::parse(&format!("{}:{endpoint}", current.scheme()))
                    .map(|url| current.same_site(&url))
                    .unwrap_or(false)
            } else {
                true
            }
        }
        Err(_) => false,
    }
}

/// Resolve `endpoint` against `base`, leaving absolute URLs untouched.
pub fn resolve_endpoint(endpoint: &str, base: Option<&Origin>) -> Result<Url, ParseError> {
    match Url::parse(endpoint) {
        Ok(url) => Ok(url),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = base
                .and_then(Origin::to_url)
                .ok_or(ParseError::RelativeUrlWithoutBase)?;
            base.join(endpoint)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> Origin {
        Origin::parse("https://App.Test").unwrap()
    }

    #[test]
    fn relative_and_same_origin_are_internal() {
        let origin = current();
        assert!(is_internal_endpoint("/api/users", &origin));
        assert!(is_internal_endpoint("api/users?x=1", &origin));
        assert!(is_internal_endpoint("https://app.test/api/users", &origin));
        assert!(is_internal_endpoint("HTTPS://APP.TEST:443/api", &origin));
        assert!(is_internal_endpoint("//app.test/api", &origin));
    }

    #[test]
    fn foreign_targets_are_external() {
        let origin = current();
        assert!(!is_internal_endpoint("https://evil.test/api/users", &origin));
        assert!(!is_internal_endpoint("http://app.test/api/users", &origin));
        assert!(!is_internal_endpoint("https://app.test:8443/api", &origin));
        assert!(!is_internal_endpoint("//evil.test/api", &origin));
        assert!(!is_internal_endpoint("", &origin));
    }

    #[test]
    fn origin_display_keeps_only_explicit_ports() {
        assert_eq!(current().to_string(), "https://app.test");
        let local = Origin::from_host_header("http", "127.0.0.1:8080").unwrap();
        assert_eq!(local.to_string(), "http://127.0.0.1:8080");
        assert_eq!(local.effective_port(), Some(8080));
        assert!(Origin::from_host_header("http", " ").is_none());
    }

    #[test]
    fn relative_endpoints_resolve_against_origin() {
        let origin = current();
        let url = resolve_endpoint("/api/users", Some(&origin)).unwrap();
        assert_eq!(url.as_str(), "https://app.test/api/users");
        assert!(resolve_endpoint("/api/users", None).is_err());
        let abs = resolve_endpoint("https://other.test/x", Some(&origin)).unwrap();
        assert_eq!(abs.host_str(), Some("other.test"));
    }
}
