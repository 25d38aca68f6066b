//! Session cookie configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default lifetime of a permanent session (31 days).
pub const DEFAULT_PERMANENT_LIFETIME_SECS: u64 = 31 * 24 * 60 * 60;

/// `SameSite` attribute for the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

/// Cookie and lifetime settings applied by the session lifecycle.
///
/// The lifecycle never computes these attributes itself; it copies them onto
/// the cookie it issues or removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
    /// Cookie `Domain` attribute.
    pub cookie_domain: Option<String>,
    /// Cookie `Path` attribute.
    pub cookie_path: String,
    /// Cookie `HttpOnly` attribute.
    pub cookie_http_only: bool,
    /// Cookie `Secure` attribute.
    pub cookie_secure: bool,
    /// Cookie `SameSite` attribute, omitted when unset.
    pub cookie_same_site: Option<SameSitePolicy>,
    /// Lifetime of permanent sessions, in seconds.
    pub permanent_lifetime_secs: u64,
    /// Re-issue the cookie of a permanent session on every response.
    pub refresh_each_request: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_http_only: true,
            cookie_secure: false,
            cookie_same_site: None,
            permanent_lifetime_secs: DEFAULT_PERMANENT_LIFETIME_SECS,
            refresh_each_request: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    #[must_use]
    pub const fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub const fn with_same_site(mut self, same_site: SameSitePolicy) -> Self {
        self.cookie_same_site = Some(same_site);
        self
    }

    #[must_use]
    pub const fn with_permanent_lifetime(mut self, lifetime: Duration) -> Self {
        self.permanent_lifetime_secs = lifetime.as_secs();
        self
    }

    #[must_use]
    pub const fn with_refresh_each_request(mut self, refresh: bool) -> Self {
        self.refresh_each_request = refresh;
        self
    }

    /// Lifetime of permanent sessions.
    #[must_use]
    pub const fn permanent_lifetime(&self) -> Duration {
        Duration::from_secs(self.permanent_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "session");
        assert_eq!(config.cookie_path, "/");
        assert!(config.cookie_http_only);
        assert!(!config.cookie_secure);
        assert!(config.refresh_each_request);
        assert_eq!(config.permanent_lifetime(), Duration::from_secs(2_678_400));
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"cookie_name":"sid","cookie_same_site":"lax"}"#).unwrap();
        assert_eq!(config.cookie_name, "sid");
        assert_eq!(config.cookie_same_site, Some(SameSitePolicy::Lax));
        assert_eq!(config.cookie_path, "/");
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .with_cookie_name("app.sid")
            .with_cookie_domain("example.com")
            .with_secure(true)
            .with_permanent_lifetime(Duration::from_secs(60));
        assert_eq!(config.cookie_name, "app.sid");
        assert_eq!(config.cookie_domain.as_deref(), Some("example.com"));
        assert!(config.cookie_secure);
        assert_eq!(config.permanent_lifetime_secs, 60);
    }
}
