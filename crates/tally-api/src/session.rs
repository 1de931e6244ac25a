//! Short-lived sessions backing the success page.
//!
//! A successful submission stores `(form id, category)` under a random
//! session id and hands the id to the browser in the `tally_session` cookie.
//! `/form-success` takes the entry out (one view per submission) and expired
//! entries are dropped lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use tally_core::{Clock, SystemClock};
use ulid::Ulid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "tally_session";

/// What the success page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessView {
    /// Allocated ticket, e.g. `O17`.
    pub form_id: String,
    /// Order category.
    pub category: String,
}

#[derive(Debug)]
struct Entry {
    view: SuccessView,
    expires_at: DateTime<Utc>,
}

/// In-process session store.
#[derive(Debug)]
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Creates a store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a store reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `view` and returns the new session id.
    pub fn insert(&self, view: SuccessView) -> String {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let id = Ulid::new().to_string();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(id.clone(), Entry { view, expires_at });
        id
    }

    /// Removes and returns the entry for `id` if it has not expired.
    pub fn take(&self, id: &str) -> Option<SuccessView> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .remove(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.view)
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the `Set-Cookie` value carrying session `id`.
#[must_use]
pub fn session_cookie(id: &str, ttl: Duration) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    ))
    .ok()
}

/// Builds the `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("tally_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Returns the value of cookie `name` from the request headers.
#[must_use]
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
