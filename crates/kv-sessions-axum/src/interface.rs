//! Session lifecycle: recover a session from the request cookie, then persist
//! it and set or clear the cookie on the way out.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use kv_sessions_core::{
    ServerSideSession, SessionConfig, SessionId, SessionStore, config::SameSitePolicy,
};
use time::{Duration, OffsetDateTime};

const fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Opens and saves sessions held in a [`SessionStore`].
///
/// Holds no per-request state; one instance is shared by all requests.
pub struct ServerSideSessionInterface<S>
where
    S: SessionStore,
{
    store: S,
    config: SessionConfig,
}

impl<S> ServerSideSessionInterface<S>
where
    S: SessionStore,
{
    /// Create a new session interface.
    #[must_use]
    pub const fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Recover the session named by the request cookie, or start a new one.
    ///
    /// Without a cookie a fresh id is minted and the store is not contacted.
    /// With a cookie the id is kept even when the store has nothing for it,
    /// including when the store cannot be reached.
    pub async fn open(&self, jar: &CookieJar) -> ServerSideSession {
        let Some(sid) = jar
            .get(&self.config.cookie_name)
            .and_then(|cookie| SessionId::parse(cookie.value()))
        else {
            return ServerSideSession::new(SessionId::generate());
        };

        match self.store.get(&sid).await {
            Ok(Some(data)) if !data.is_empty() => {
                tracing::debug!(%sid, keys = data.len(), "session recovered");
                ServerSideSession::with_data(sid, data)
            }
            Ok(_) => {
                tracing::debug!(%sid, "no stored data for session");
                ServerSideSession::new(sid)
            }
            Err(e) => {
                tracing::warn!(%sid, error = %e, "session store read failed, starting empty");
                ServerSideSession::new(sid)
            }
        }
    }

    /// Persist `session` and return `jar` with the cookie change applied.
    ///
    /// - empty and modified: the record is deleted and the cookie cleared
    /// - empty and untouched: nothing happens
    /// - otherwise, when [`Self::should_set_cookie`] holds: the whole mapping
    ///   is written and the cookie (re)issued
    pub async fn save(&self, session: &ServerSideSession, jar: CookieJar) -> CookieJar {
        if session.is_empty() {
            if session.is_modified() {
                return self.delete_session(session.id(), jar).await;
            }
            return jar;
        }

        if !self.should_set_cookie(session) {
            return jar;
        }

        if let Err(e) = self.store.set(session.id(), session.data()).await {
            tracing::warn!(sid = %session.id(), error = %e, "session store write failed");
        }

        jar.add(self.session_cookie(session))
    }

    /// Whether the cookie should be (re)issued for `session`.
    ///
    /// True when the session changed, or when it is permanent and the
    /// configuration refreshes permanent cookies on every request.
    #[must_use]
    pub fn should_set_cookie(&self, session: &ServerSideSession) -> bool {
        session.is_modified() || (session.is_permanent() && self.config.refresh_each_request)
    }

    /// Expiry of the cookie for `session`: `None` for a browser-session
    /// cookie, otherwise now plus the permanent lifetime.
    #[must_use]
    pub fn expiration_time(&self, session: &ServerSideSession) -> Option<OffsetDateTime> {
        if !session.is_permanent() {
            return None;
        }
        let secs = i64::try_from(self.config.permanent_lifetime_secs).unwrap_or(i64::MAX);
        OffsetDateTime::now_utc().checked_add(Duration::seconds(secs))
    }

    async fn delete_session(&self, sid: &SessionId, jar: CookieJar) -> CookieJar {
        if let Err(e) = self.store.delete(sid).await {
            tracing::warn!(%sid, error = %e, "session store delete failed");
        }

        let mut removal = Cookie::build((self.config.cookie_name.clone(), ""))
            .path(self.config.cookie_path.clone())
            .build();
        if let Some(domain) = &self.config.cookie_domain {
            removal.set_domain(domain.clone());
        }
        removal.make_removal();
        jar.add(removal)
    }

    fn session_cookie(&self, session: &ServerSideSession) -> Cookie<'static> {
        let mut cookie = Cookie::build((
            self.config.cookie_name.clone(),
            session.id().as_str().to_string(),
        ))
        .path(self.config.cookie_path.clone())
        .http_only(self.config.cookie_http_only)
        .secure(self.config.cookie_secure)
        .build();

        if let Some(domain) = &self.config.cookie_domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(policy) = self.config.cookie_same_site {
            cookie.set_same_site(same_site(policy));
        }
        if let Some(expires) = self.expiration_time(session) {
            cookie.set_expires(expires);
        }
        cookie
    }
}
