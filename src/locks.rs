use dashmap::DashMap;
use log::{debug, info};
use uuid::Uuid;

/// An exclusive write lock held on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    /// Opaque `urn:uuid:<uuid>` token handed to the client
    pub token: String,

    /// Whatever the client sent as `Owner`, or "unknown"
    pub owner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Released,
    TokenMismatch,
}

/// In-memory lock table keyed by resource href.
///
/// There is no conflict detection: a new LOCK replaces whatever lock the resource held.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: DashMap<String, LockEntry>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `href`, replacing any previous lock, and return the new entry.
    pub fn lock(&self, href: &str, owner: Option<&str>) -> LockEntry {
        let entry = LockEntry {
            token: format!("urn:uuid:{}", Uuid::new_v4()),
            owner: owner.unwrap_or("unknown").to_string(),
        };

        if let Some(previous) = self.locks.insert(href.to_string(), entry.clone()) {
            debug!(target: "dav", "Lock {} on {href} replaced", previous.token);
        }
        info!(target: "dav", "Locked {href} for {} with {}", entry.owner, entry.token);
        entry
    }

    /// Release the lock on `href` if `presented` names it.
    ///
    /// `presented` may be wrapped in `<...>` as in the `Lock-Token` header. Beyond
    /// that, tokens compare byte for byte.
    pub fn unlock(&self, href: &str, presented: &str) -> UnlockOutcome {
        let token = strip_token_delimiters(presented);
        match self.locks.remove_if(href, |_, entry| entry.token == token) {
            Some(_) => {
                info!(target: "dav", "Unlocked {href}");
                UnlockOutcome::Released
            }
            None => UnlockOutcome::TokenMismatch,
        }
    }

    pub fn get(&self, href: &str) -> Option<LockEntry> {
        self.locks.get(href).map(|entry| entry.clone())
    }

    /// Drop the locks of `href` and everything below it.
    pub fn purge(&self, href: &str) {
        let before = self.locks.len();
        self.locks.retain(|key, _| !is_same_or_descendant(key, href));
        let purged = before.saturating_sub(self.locks.len());
        if purged > 0 {
            debug!(target: "dav", "Purged {purged} lock(s) under {href}");
        }
    }
}

fn strip_token_delimiters(token: &str) -> &str {
    let token = token.strip_prefix('<').unwrap_or(token);
    token.strip_suffix('>').unwrap_or(token)
}

/// Whether `key` is `href` itself or lies below it.
pub fn is_same_or_descendant(key: &str, href: &str) -> bool {
    if href == "/" {
        return true;
    }
    key == href
        || key
            .strip_prefix(href)
            .is_some_and(|rest| rest.starts_with('/'))
}
