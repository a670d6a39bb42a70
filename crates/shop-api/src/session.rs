//! # Sessions
//!
//! Cookie-identified server-side sessions. The only value a session carries is
//! the id of the visitor's current cart.
//!
//! The `sessionid` cookie holds `<uuid>.<hex hmac-sha256(secret, uuid)>`; a
//! cookie whose signature does not verify is ignored and a fresh session is
//! started.
//!
//! Entries idle for longer than the store's TTL are dropped. Expired entries
//! are swept whenever a session is written, and a session whose cart is
//! cleared is removed outright.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    response::{IntoResponseParts, ResponseParts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shop_core::OrderId;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sessionid";

/// Idle time after which a session is forgotten (two weeks)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct SessionData {
    cart_id: OrderId,
    last_seen: Instant,
}

impl SessionData {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= ttl
    }
}

/// Server-side session table plus the cookie signing key
#[derive(Clone)]
pub struct SessionStore {
    mac: HmacSha256,
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<Uuid, SessionData>>>,
}

impl SessionStore {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("Session secret must not be empty");
        }

        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;

        Ok(Self {
            mac,
            ttl: DEFAULT_SESSION_TTL,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Set the idle timeout
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of sessions currently held
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cookie value for a session id
    pub fn sign(&self, id: Uuid) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.to_string().as_bytes());
        format!("{}.{}", id, hex::encode(mac.finalize().into_bytes()))
    }

    /// Session id from a cookie value, if the signature checks out
    pub fn verify(&self, value: &str) -> Option<Uuid> {
        let (raw_id, signature) = value.split_once('.')?;
        let id = Uuid::parse_str(raw_id).ok()?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(raw_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id)
    }

    /// Cart id of a live session; refreshes its idle timer
    async fn cart_id(&self, id: Uuid) -> Option<OrderId> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let data = sessions.get_mut(&id)?;

        if data.is_expired(now, self.ttl) {
            sessions.remove(&id);
            debug!(session_id = %id, "Session expired");
            return None;
        }

        data.last_seen = now;
        Some(data.cart_id)
    }

    async fn set_cart_id(&self, id: Uuid, cart_id: OrderId) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, data| !data.is_expired(now, self.ttl));
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "Swept expired sessions");
        }

        sessions.insert(
            id,
            SessionData {
                cart_id,
                last_seen: now,
            },
        );
    }

    async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }
}

/// The visitor's session, extracted from the request cookie.
///
/// Returning it from a handler sets the cookie when the session is new.
pub struct Session {
    id: Uuid,
    cart_id: Option<OrderId>,
    is_new: bool,
    store: SessionStore,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the session's current cart
    pub fn cart_id(&self) -> Option<OrderId> {
        self.cart_id
    }

    pub async fn set_cart_id(&mut self, cart_id: OrderId) {
        if self.cart_id != Some(cart_id) {
            self.cart_id = Some(cart_id);
            self.store.set_cart_id(self.id, cart_id).await;
        }
    }

    /// Forget the cart. The cart is all a session holds, so its entry goes
    /// with it.
    pub async fn remove_cart_id(&mut self) {
        self.cart_id = None;
        self.store.remove(self.id).await;
    }

    /// `Set-Cookie` value for this session
    pub fn cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            self.store.sign(self.id)
        )
    }
}

/// Value of a named cookie in the request headers
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

impl<S> FromRequestParts<S> for Session
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SessionStore::from_ref(state);

        let existing = cookie_value(&parts.headers, SESSION_COOKIE).and_then(|v| store.verify(v));

        match existing {
            Some(id) => {
                let cart_id = store.cart_id(id).await;
                Ok(Session {
                    id,
                    cart_id,
                    is_new: false,
                    store,
                })
            }
            None => {
                let id = Uuid::new_v4();
                debug!(session_id = %id, "Starting new session");
                Ok(Session {
                    id,
                    cart_id: None,
                    is_new: true,
                    store,
                })
            }
        }
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.is_new {
            if let Ok(value) = HeaderValue::from_str(&self.cookie()) {
                res.headers_mut().append(SET_COOKIE, value);
            }
        }
        Ok(res)
    }
}
