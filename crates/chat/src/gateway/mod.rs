//! Network gateway: every backend call goes through here
//!
//! Attaches credentials, detects session expiry (401/403), suspends further
//! calls until the session is re-armed, and serves idempotent metadata GETs
//! from a short-lived cache.

mod cache;
pub mod rate_limit;
mod session;
mod transport;

pub use cache::{cache_key, RequestCache};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use session::{SessionGuard, SessionState, LOGIN_REDIRECT};
pub use transport::{HttpRequest, HttpResponse, Method, Transport, TransportError, UreqTransport};

use chrono::Duration;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::clock::Clock;
use crate::error::{ChatError, ChatResult};

pub struct Gateway {
    transport: Arc<dyn Transport>,
    base_url: Url,
    auth_token: Option<String>,
    session: SessionGuard,
    cache: RequestCache,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: Url,
        auth_token: Option<String>,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            base_url,
            auth_token,
            session: SessionGuard::new(),
            cache: RequestCache::new(cache_ttl),
            clock,
        }
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    /// Consume the one-shot login-required signal raised by a 401/403
    pub fn take_login_required(&mut self) -> bool {
        self.session.take_login_required()
    }

    /// Resume after re-authentication, optionally with a new token
    pub fn rearm(&mut self, auth_token: Option<String>) {
        if auth_token.is_some() {
            self.auth_token = auth_token;
        }
        self.cache.clear();
        self.session.rearm();
        debug!("Session re-armed");
    }

    /// Build an absolute URL from path segments and query pairs
    ///
    /// Segments are percent-encoded individually, so conversation ids may
    /// contain reserved characters.
    pub fn url(&self, segments: &[&str], query: &[(&str, String)]) -> ChatResult<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::data(format!("base URL cannot hold a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    pub fn get(&mut self, segments: &[&str], query: &[(&str, String)]) -> ChatResult<HttpResponse> {
        let url = self.url(segments, query)?;
        self.execute(Method::Get, url, None)
    }

    /// GET through the metadata cache
    pub fn get_cached(
        &mut self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ChatResult<HttpResponse> {
        let url = self.url(segments, query)?;
        let key = cache_key(&url, self.authorization().as_deref());
        let now = self.clock.now();

        if let Some(body) = self.cache.get(&key, now) {
            debug!("Cache hit for {}", url);
            return Ok(HttpResponse::new(200, body));
        }

        let response = self.execute(Method::Get, url, None)?;
        if response.is_success() {
            self.cache.insert(key, response.body.clone(), now);
        }
        self.cache.cleanup(now);
        Ok(response)
    }

    pub fn post<B: Serialize + ?Sized>(&mut self, segments: &[&str], body: &B) -> ChatResult<HttpResponse> {
        let url = self.url(segments, &[])?;
        let body = serde_json::to_string(body)
            .map_err(|e| ChatError::data(format!("failed to encode request body: {}", e)))?;
        self.execute(Method::Post, url, Some(body))
    }

    /// Drop cached responses for an endpoint (e.g. `auth/me` on manual refresh)
    pub fn invalidate(&mut self, fragment: &str) {
        let removed = self.cache.invalidate(fragment);
        if removed > 0 {
            debug!("Invalidated {} cached response(s) matching {}", removed, fragment);
        }
    }

    fn authorization(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }

    fn execute(
        &mut self,
        method: Method,
        url: String,
        body: Option<String>,
    ) -> ChatResult<HttpResponse> {
        if self.session.is_suspended() {
            debug!("Session suspended, skipping {:?} {}", method, url);
            return Err(ChatError::SessionSuspended);
        }

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(auth) = self.authorization() {
            headers.push(("Authorization".to_string(), auth));
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            body,
        };

        let response = self
            .transport
            .execute(&request)
            .map_err(|e| ChatError::network(e.message))?;

        if response.status == 401 || response.status == 403 {
            if self.session.expire(response.status) {
                warn!(
                    "Session expired (HTTP {}) on {:?} {}",
                    response.status,
                    request.method,
                    request.path()
                );
            }
            self.cache.clear();
            return Err(ChatError::SessionExpired {
                status: response.status,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CountingTransport {
        status: u16,
        calls: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for CountingTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(HttpResponse::new(self.status, r#"{"success":true}"#))
        }
    }

    fn gateway(status: u16) -> (Arc<CountingTransport>, Arc<ManualClock>, Gateway) {
        let transport = Arc::new(CountingTransport {
            status,
            calls: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Gateway::new(
            transport.clone(),
            Url::parse("https://chat.example.com/api").unwrap(),
            Some("secret-token".to_string()),
            Duration::minutes(5),
            clock.clone(),
        );
        (transport, clock, gateway)
    }

    #[test]
    fn test_url_encodes_segments_and_query() {
        let (_, _, gateway) = gateway(200);
        let url = gateway
            .url(
                &["chat", "messages", "55 11@s.whatsapp.net"],
                &[("page", "2".to_string()), ("limit", "20".to_string())],
            )
            .unwrap();
        assert_eq!(
            url,
            "https://chat.example.com/api/chat/messages/55%2011@s.whatsapp.net?page=2&limit=20"
        );
    }

    #[test]
    fn test_attaches_bearer_token() {
        let (transport, _, mut gateway) = gateway(200);
        gateway.get(&["contacts"], &[]).unwrap();
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].header("Authorization"), Some("Bearer secret-token"));
    }

    #[test]
    fn test_cached_get_hits_network_once_within_ttl() {
        let (transport, clock, mut gateway) = gateway(200);
        gateway.get_cached(&["auth", "me"], &[]).unwrap();
        gateway.get_cached(&["auth", "me"], &[]).unwrap();
        assert_eq!(transport.calls.lock().unwrap().len(), 1);

        clock.advance(Duration::minutes(6));
        gateway.get_cached(&["auth", "me"], &[]).unwrap();
        assert_eq!(transport.calls.lock().unwrap().len(), 2);

        gateway.invalidate("/auth/me");
        gateway.get_cached(&["auth", "me"], &[]).unwrap();
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_session_expiry_suspends_calls() {
        let (transport, _, mut gateway) = gateway(401);

        let err = gateway.get(&["contacts"], &[]).unwrap_err();
        assert_eq!(err, ChatError::SessionExpired { status: 401 });
        assert!(gateway.take_login_required());

        let err = gateway.get(&["contacts"], &[]).unwrap_err();
        assert_eq!(err, ChatError::SessionSuspended);
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
        assert!(!gateway.take_login_required());

        gateway.rearm(Some("fresh".to_string()));
        assert!(!gateway.session().is_suspended());
    }
}
