use crate::session::ClientSession;
use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Entry {
    sequence: u64,
    session: Arc<ClientSession>,
}

/// Live sessions keyed by identity id. An identity has at most one session:
/// registering a second one force-closes the first.
#[derive(Default)]
pub struct ClientRegistry {
    sessions: DashMap<String, Entry>,
    next_sequence: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session under its identity id, closing and evicting any
    /// session previously stored there.
    pub fn register(&self, session: Arc<ClientSession>) {
        let identity_id = session.identity_id().to_string();
        let entry = Entry {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            session,
        };

        if let Some(previous) = self.sessions.insert(identity_id, entry) {
            info!(
                "Replacing stream {} of {}",
                previous.session.connection_id().as_str(),
                previous.session.identity_id()
            );
            previous.session.close();
        }
    }

    /// Removes the entry for `identity_id` only while it still holds `session`.
    /// A stale session going away never evicts its replacement.
    pub fn unregister(&self, identity_id: &str, session: &ClientSession) -> bool {
        self.sessions
            .remove_if(identity_id, |_, entry| {
                entry.session.connection_id() == session.connection_id()
            })
            .is_some()
    }

    pub fn get(&self, identity_id: &str) -> Option<Arc<ClientSession>> {
        self.sessions
            .get(identity_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Every registered session, oldest registration first.
    pub fn snapshot(&self) -> Vec<Arc<ClientSession>> {
        let mut entries: Vec<(u64, Arc<ClientSession>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.sequence, Arc::clone(&entry.session)))
            .collect();
        entries.sort_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, session)| session).collect()
    }

    pub fn count_live(&self) -> usize {
        self.sessions.len()
    }

    pub fn close_all(&self) {
        for session in self.snapshot() {
            session.close();
        }
    }
}
