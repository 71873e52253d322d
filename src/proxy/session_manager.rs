use crate::constants::{SESSION_TOKEN_BYTES, SESSION_TTL_SECS};
use crate::proxy::common::utils::generate_hex_token;
use dashmap::DashMap;
use std::time::{Duration, Instant};

// Admin-surface credentials only; translation clients authenticate with the
// local API key and never hold sessions.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

#[derive(Debug, Clone)]
struct Session {
    created_at: Instant,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::from_secs(SESSION_TTL_SECS),
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn issue(&self) -> String {
        let token = generate_hex_token(SESSION_TOKEN_BYTES);
        self.sessions.insert(
            token.clone(),
            Session {
                created_at: Instant::now(),
            },
        );
        token
    }

    // Expired entries are swept on every validation pass.
    pub fn validate(&self, token: &str) -> bool {
        let ttl = self.ttl;
        self.sessions.retain(|_, s| s.created_at.elapsed() < ttl);
        self.sessions.contains_key(token)
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    // Password changes invalidate every outstanding token.
    pub fn clear_all(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        if count > 0 {
            tracing::info!("Cleared {} admin session(s)", count);
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
