//! Browser storage capabilities: cookies and local storage.
//!
//! The tracker never touches `document.cookie` or `window.localStorage`
//! directly; the hosting application injects implementations of these
//! traits. In-memory implementations are provided for tests and for hosts
//! that keep state elsewhere.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Cookie access scoped to the current document.
pub trait CookieJar: Send + Sync {
    /// Value of the named cookie, if present and unexpired.
    fn get(&self, name: &str) -> Option<String>;
    /// Set a cookie with the given lifetime.
    fn set(&self, name: &str, value: &str, ttl: Duration);
    /// Expire the named cookie immediately.
    fn expire(&self, name: &str);
}

/// Local-storage access for the current origin.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Attribute string for a `document.cookie` assignment.
///
/// The session cookie is path-wide and same-site-lax; browser-backed
/// [`CookieJar`] implementations can write this string verbatim.
pub fn format_set_cookie(name: &str, value: &str, ttl: Duration) -> String {
    format!(
        "{name}={value}; Max-Age={}; Path=/; SameSite=Lax",
        ttl.as_secs()
    )
}

/// In-memory [`CookieJar`].
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie, e.g. a pre-existing session id in a test.
    pub fn insert(&self, name: &str, value: &str) {
        self.cookies.lock().insert(name.to_string(), value.to_string());
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str, _ttl: Duration) {
        self.cookies.lock().insert(name.to_string(), value.to_string());
    }

    fn expire(&self, name: &str) {
        self.cookies.lock().remove(name);
    }
}

/// In-memory [`LocalStorage`].
#[derive(Default)]
pub struct MemoryLocalStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
