use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::attributes::IdentityAttributes;

/// Per-user session state, keyed by the session cookie.
///
/// Created empty on first unauthenticated contact; `redirect_target` is set
/// when a protected route bounces the user to CAS; the whole record is
/// replaced on a successful validation and deleted on logout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    #[serde(default)]
    pub redirect_target: Option<String>,
    #[serde(default)]
    pub identity: Option<IdentityAttributes>,
}

/// Seam to the session persistence. The gateway only reads and writes
/// records through this interface; persistence across the CAS redirect round
/// trip is the store's responsibility.
pub trait SessionStore: Send + Sync {
    fn get(&self, sid: &str) -> Option<SessionRecord>;
    fn set(&self, sid: &str, record: SessionRecord);
    fn delete(&self, sid: &str);
}

/// Default single-process store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self, sid: &str) -> Option<SessionRecord> {
        self.inner.read().get(sid).cloned()
    }

    fn set(&self, sid: &str, record: SessionRecord) {
        self.inner.write().insert(sid.to_string(), record);
    }

    fn delete(&self, sid: &str) {
        self.inner.write().remove(sid);
    }
}

/// 128-bit random session id, hex-encoded.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom::getrandom(&mut bytes);
    let mut sid = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut sid, "{:02x}", b);
    }
    sid
}
