//! Scoped session checkout.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::debug;

use super::{PoolError, Session, SessionPool};
use crate::observability::metrics;

/// A RAII guard that checks the session back in when dropped.
///
/// The reload flag only ever goes from `false` to `true`. A panic while the
/// guard is alive also forces a reload.
pub struct PooledSession {
    pool: Arc<dyn SessionPool>,
    key: String,
    session: Option<Box<dyn Session>>,
    reload: bool,
}

impl PooledSession {
    pub fn acquire(pool: Arc<dyn SessionPool>, key: &str) -> Result<Self, PoolError> {
        let session = pool.acquire(key)?;
        debug!(key = %key, "Session checked out");
        Ok(Self { pool, key: key.to_string(), session: Some(session), reload: false })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ask the pool to discard this session on release.
    pub fn request_reload(&mut self) {
        self.reload = true;
    }

    pub fn reload_requested(&self) -> bool {
        self.reload
    }
}

impl Deref for PooledSession {
    type Target = dyn Session;
    fn deref(&self) -> &Self::Target {
        self.session.as_deref().expect("session is present until drop")
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_deref_mut().expect("session is present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let reload = self.reload || std::thread::panicking();
        if reload {
            metrics::record_session_reload();
        }
        debug!(key = %self.key, reload, "Session released");
        self.pool.release(&self.key, session, reload);
    }
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("key", &self.key)
            .field("reload", &self.reload)
            .finish()
    }
}
