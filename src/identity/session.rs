use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

pub type SessionToken = String;

/// State machine per request: anonymous -> (login) -> authenticated(user_id)
/// -> (logout or expiry) -> anonymous. The session records only the user id;
/// the principal is re-resolved from the store on every request so a stale
/// session degrades to anonymous.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: i64,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Issues, validates and revokes sessions. Maps are instance-owned so the
/// manager is explicit context passed into the application, not a global;
/// sessions are independent across concurrent requests.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionToken, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60 * 60), sessions: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, ..Self::default() }
    }

    pub fn issue(&self, user_id: i64) -> Session {
        let now = Instant::now();
        let token = gen_token();
        let sess = Session {
            token: token.clone(),
            user_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token, sess.clone());
        tprintln!("session.issue user_id={} ttl_secs={}", user_id, self.ttl.as_secs());
        sess
    }

    /// Resolve a token to its user id. Expired entries are pruned on access.
    pub fn validate(&self, token: &str) -> Option<i64> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(sess) = map.get(token) {
                if sess.expires_at > now {
                    Some(sess.user_id)
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else {
                None
            }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(sess) = &removed {
            tprintln!("session.logout user_id={}", sess.user_id);
        }
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_validate_logout() {
        let sm = SessionManager::default();
        let sess = sm.issue(7);
        assert_eq!(sm.validate(&sess.token), Some(7));
        assert!(sm.logout(&sess.token));
        assert_eq!(sm.validate(&sess.token), None);
        assert!(!sm.logout(&sess.token), "second logout is a no-op");
    }

    #[test]
    fn unknown_token_is_anonymous() {
        let sm = SessionManager::default();
        assert_eq!(sm.validate("no-such-token"), None);
    }

    #[test]
    fn expired_sessions_degrade_to_anonymous() {
        let sm = SessionManager::with_ttl(Duration::from_secs(0));
        let sess = sm.issue(7);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sm.validate(&sess.token), None);
    }

    #[test]
    fn tokens_are_unique_per_session() {
        let sm = SessionManager::default();
        let a = sm.issue(1);
        let b = sm.issue(1);
        assert_ne!(a.token, b.token);
        assert_eq!(sm.validate(&a.token), Some(1));
        assert_eq!(sm.validate(&b.token), Some(1));
    }
}
