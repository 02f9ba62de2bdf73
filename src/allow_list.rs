// src/allow_list.rs
// In-memory set of UIDs currently granted access at this edge (spec.md §4.4).
//
// Backed by an ordered set rather than a plain hash set: SPEC_FULL.md §9
// calls out that "pad with remaining cache uids in iteration order" is only
// well-defined with stable insertion order, which a `HashSet` does not give.

use crate::signing::SigningService;
use crate::types::SignedUidList;
use indexmap::IndexSet;
use parking_lot::RwLock;

pub struct AllowList {
    uids: RwLock<IndexSet<String>>,
}

impl AllowList {
    pub fn new() -> Self {
        Self {
            uids: RwLock::new(IndexSet::new()),
        }
    }

    /// Atomically replace the cache with `uids`, preserving the order given.
    pub fn replace(&self, uids: Vec<String>) {
        let mut guard = self.uids.write();
        *guard = uids.into_iter().collect();
    }

    /// Remove a single uid; no-op if absent.
    pub fn remove(&self, uid: &str) {
        self.uids.write().shift_remove(uid);
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.uids.read().contains(uid)
    }

    pub fn len(&self) -> usize {
        self.uids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.uids.read().iter().cloned().collect()
    }

    /// Compute the publication view: `ranked` restricted to uids currently
    /// in the cache, then padded with any remaining cache uids in
    /// iteration order until `limit` (or the cache is exhausted), signed by
    /// `signer`.
    pub fn publish_view(&self, ranked: &[String], limit: usize, signer: &SigningService) -> SignedUidList {
        let guard = self.uids.read();
        let mut selected: IndexSet<String> = IndexSet::new();

        for uid in ranked {
            if selected.len() >= limit {
                break;
            }
            if guard.contains(uid) {
                selected.insert(uid.clone());
            }
        }

        if selected.len() < limit {
            for uid in guard.iter() {
                if selected.len() >= limit {
                    break;
                }
                selected.insert(uid.clone());
            }
        }

        let uids: Vec<String> = selected.into_iter().collect();
        let payload = canonical_payload(&uids);
        let signature = signer.sign(payload.as_bytes());
        SignedUidList { uids, signature }
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical bytes signed over a uid list: comma-joined, no surrounding
/// brackets or whitespace, in the order presented. Callers that need to
/// verify a `SignedUidList` reconstruct this same byte string from its
/// `uids` field.
pub fn canonical_payload(uids: &[String]) -> String {
    uids.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;

    fn test_signer() -> SigningService {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, pem.as_bytes()).unwrap();
        let service = SigningService::load(&path).unwrap();
        std::mem::forget(dir); // keep file alive for the duration of the test process
        service
    }

    #[test]
    fn replace_then_contains() {
        let list = AllowList::new();
        list.replace(vec!["A".into(), "B".into()]);
        assert!(list.contains("A"));
        assert!(!list.contains("Z"));
    }

    #[test]
    fn remove_is_noop_if_absent() {
        let list = AllowList::new();
        list.replace(vec!["A".into()]);
        list.remove("Z");
        assert_eq!(list.len(), 1);
        list.remove("A");
        assert!(list.is_empty());
    }

    #[test]
    fn publish_view_caps_and_pads_in_iteration_order() {
        let list = AllowList::new();
        list.replace(vec!["A".into(), "B".into(), "C".into(), "D".into()]);
        let signer = test_signer();

        // Ranked only names "C"; the rest should be padded in cache order.
        let view = list.publish_view(&["C".to_string()], 3, &signer);
        assert_eq!(view.uids, vec!["C", "A", "B"]);
    }

    #[test]
    fn publish_view_enforces_cap() {
        let list = AllowList::new();
        list.replace((0..150).map(|i| format!("U{i}")).collect());
        let signer = test_signer();

        let view = list.publish_view(&[], 100, &signer);
        assert_eq!(view.uids.len(), 100);
    }
}
