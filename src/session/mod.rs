//! Playback session machinery: the per-quality RTP/master session
//! arena and the player thread's tick-driven session.

pub mod driver;
pub mod player;
pub mod rtp;

use std::collections::HashMap;
use std::sync::Arc;

use crate::quality::MediaQuality;
use rtp::MasterSession;

/// Key identifying a distinct master session: quality plus whether
/// its audio is encrypted (§3 `MasterSession`: "one master session
/// per distinct (quality, encrypt) pair").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MasterSessionKey {
    /// Negotiated quality.
    pub quality: MediaQuality,
    /// Whether payloads are AES-CBC encrypted.
    pub encrypt: bool,
}

/// Arena of master sessions keyed by `(quality, encrypt)` instead of
/// the original's pointer graph (§9 design note: "arena-of-sessions
/// keyed by id"). Device sessions hold an `Arc<MasterSession>`
/// clone; the entry is freed from the arena once no device session
/// still references it.
#[derive(Default)]
pub struct MasterSessionArena {
    sessions: HashMap<MasterSessionKey, Arc<MasterSession>>,
}

impl MasterSessionArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the existing master session for `key`, or create one with
    /// `make` and insert it.
    pub fn get_or_create(
        &mut self,
        key: MasterSessionKey,
        make: impl FnOnce() -> MasterSession,
    ) -> Arc<MasterSession> {
        self.sessions.entry(key).or_insert_with(|| Arc::new(make())).clone()
    }

    /// Drop the arena's own reference to `key`'s session. If no
    /// device session still holds a clone, the session is freed here;
    /// Rust's `Arc` refcounting gives the "last reference wins"
    /// semantics the original reference-counted by hand.
    pub fn release(&mut self, key: &MasterSessionKey) {
        if let Some(session) = self.sessions.get(key) {
            if Arc::strong_count(session) <= 1 {
                self.sessions.remove(key);
            }
        }
    }

    /// Number of live master sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the arena holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_session_for_same_key() {
        let mut arena = MasterSessionArena::new();
        let key = MasterSessionKey { quality: MediaQuality::default(), encrypt: true };

        let a = arena.get_or_create(key, || MasterSession::new_raop(MediaQuality::default(), true, 2));
        let b = arena.get_or_create(key, || MasterSession::new_raop(MediaQuality::default(), true, 2));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn release_frees_once_last_reference_drops() {
        let mut arena = MasterSessionArena::new();
        let key = MasterSessionKey { quality: MediaQuality::default(), encrypt: false };

        let handle = arena.get_or_create(key, || MasterSession::new_raop(MediaQuality::default(), false, 2));
        arena.release(&key);
        assert_eq!(arena.len(), 1, "still referenced by `handle`");

        drop(handle);
        arena.release(&key);
        assert_eq!(arena.len(), 0);
    }
}
