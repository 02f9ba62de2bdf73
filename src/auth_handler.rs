// src/auth_handler.rs
// Decision policy for inbound `/authenticate` events (spec.md §4.6).
//
// Grounded on `edge_server.py::process_authentication` for the branching
// shape (override path, relay-if-connected) and on the teacher's pattern of
// a pure decision function invoked from inside the single-writer loop
// (`batch_writer`'s `flush_batch`).

use crate::allow_list::{canonical_payload, AllowList};
use crate::lockout::{LockoutCheck, LockoutEngine};
use crate::signing::SigningService;
use crate::types::{AuthDecision, AuthEvent, RelayedAccessEvent, RemoveUid};

/// Side effects to be carried out, in this order, by the caller:
/// 1. append to the Access-Log Store
/// 2. publish `remove_uid` (if present)
/// 3. publish `auth_decision` (if present)
/// 4. relay to the origin (if present)
pub struct HandlerOutput {
    pub auth_decision: Option<AuthDecision>,
    pub remove_uid: Option<RemoveUid>,
    pub log_result: bool,
    pub relay: Option<RelayedAccessEvent>,
}

pub fn handle(
    event: &AuthEvent,
    allow_list: &AllowList,
    lockout: &LockoutEngine,
    signer: &SigningService,
    api_key: &str,
    cloud_reachable: bool,
) -> HandlerOutput {
    let mut remove_uid = None;
    let mut auth_decision = None;
    let log_result;

    if event.result {
        // Node already granted access locally; no override needed. Still
        // subject to cross-node replay detection since this is an
        // affirmative outcome (spec.md §4.5 uniform update).
        if let LockoutCheck::Triggered = lockout.check_and_update(&event.uid, &event.node_id, event.date) {
            allow_list.remove(&event.uid);
            remove_uid = Some(sign_remove_uid(&event.uid, signer));
            log_result = false;
        } else {
            log_result = true;
        }
    } else if allow_list.contains(&event.uid) {
        // Origin override: the node denied, but the cached allow-list
        // grants this uid.
        if let LockoutCheck::Triggered = lockout.check_and_update(&event.uid, &event.node_id, event.date) {
            allow_list.remove(&event.uid);
            remove_uid = Some(sign_remove_uid(&event.uid, signer));
            auth_decision = Some(sign_decision(&event.uid, &event.node_id, false, signer));
            log_result = false;
        } else {
            auth_decision = Some(sign_decision(&event.uid, &event.node_id, true, signer));
            log_result = true;
        }
    } else {
        auth_decision = Some(sign_decision(&event.uid, &event.node_id, false, signer));
        log_result = false;
    }

    let relay = if cloud_reachable {
        Some(RelayedAccessEvent::new(&event.uid, &event.node_id, event.date, log_result, api_key))
    } else {
        None
    };

    HandlerOutput {
        auth_decision,
        remove_uid,
        log_result,
        relay,
    }
}

fn sign_decision(uid: &str, node_id: &str, result: bool, signer: &SigningService) -> AuthDecision {
    let payload = format!("{uid}|{node_id}|{result}");
    let signature = signer.sign(payload.as_bytes());
    AuthDecision {
        uid: uid.to_string(),
        node_id: node_id.to_string(),
        result,
        signature,
    }
}

fn sign_remove_uid(uid: &str, signer: &SigningService) -> RemoveUid {
    let signature = signer.sign(canonical_payload(&[uid.to_string()]).as_bytes());
    RemoveUid {
        uid: uid.to_string(),
        signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDateTime};
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn test_signer() -> SigningService {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, pem.as_bytes()).unwrap();
        let service = SigningService::load(&path).unwrap();
        std::mem::forget(dir);
        service
    }

    fn event(uid: &str, node_id: &str, date: &str, result: bool) -> AuthEvent {
        AuthEvent {
            uid: uid.to_string(),
            node_id: node_id.to_string(),
            date: ts(date),
            result,
        }
    }

    // S1 — override path.
    #[test]
    fn override_grants_when_uid_cached() {
        let allow_list = AllowList::new();
        allow_list.replace(vec!["U1".into()]);
        let lockout = LockoutEngine::new(ChronoDuration::seconds(10));
        let signer = test_signer();

        let ev = event("U1", "N1", "2024-05-30 12:00:00", false);
        let output = handle(&ev, &allow_list, &lockout, &signer, "key123", false);

        let decision = output.auth_decision.expect("expected an allow_authentication decision");
        assert!(decision.result);
        assert_eq!(decision.uid, "U1");
        assert!(output.log_result);
        assert!(output.remove_uid.is_none());
    }

    #[test]
    fn deny_published_when_uid_not_cached() {
        let allow_list = AllowList::new();
        let lockout = LockoutEngine::new(ChronoDuration::seconds(10));
        let signer = test_signer();

        let ev = event("U1", "N1", "2024-05-30 12:00:00", false);
        let output = handle(&ev, &allow_list, &lockout, &signer, "key123", false);

        let decision = output.auth_decision.expect("expected a deny decision");
        assert!(!decision.result);
        assert!(!output.log_result);
    }

    // S2 — lockout.
    #[test]
    fn second_node_within_window_triggers_lockout() {
        let allow_list = AllowList::new();
        allow_list.replace(vec!["U1".into()]);
        let lockout = LockoutEngine::new(ChronoDuration::seconds(10));
        let signer = test_signer();

        let first = event("U1", "N1", "2024-05-30 12:00:00", false);
        let first_out = handle(&first, &allow_list, &lockout, &signer, "key123", false);
        assert!(first_out.auth_decision.unwrap().result);
        assert!(allow_list.contains("U1"));

        let second = event("U1", "N2", "2024-05-30 12:00:05", false);
        let second_out = handle(&second, &allow_list, &lockout, &signer, "key123", false);

        let remove = second_out.remove_uid.expect("expected a remove_uid broadcast");
        assert_eq!(remove.uid, "U1");
        let decision = second_out.auth_decision.expect("expected a denied decision");
        assert!(!decision.result);
        assert!(!allow_list.contains("U1"));
    }

    #[test]
    fn affirmative_result_from_node_still_runs_lockout() {
        let allow_list = AllowList::new();
        allow_list.replace(vec!["U1".into()]);
        let lockout = LockoutEngine::new(ChronoDuration::seconds(10));
        let signer = test_signer();

        let first = event("U1", "N1", "2024-05-30 12:00:00", true);
        handle(&first, &allow_list, &lockout, &signer, "key123", false);

        let second = event("U1", "N2", "2024-05-30 12:00:05", true);
        let second_out = handle(&second, &allow_list, &lockout, &signer, "key123", false);

        assert!(second_out.remove_uid.is_some());
        assert!(!allow_list.contains("U1"));
    }

    #[test]
    fn relay_only_happens_when_cloud_reachable() {
        let allow_list = AllowList::new();
        allow_list.replace(vec!["U1".into()]);
        let lockout = LockoutEngine::new(ChronoDuration::seconds(10));
        let signer = test_signer();
        let ev = event("U1", "N1", "2024-05-30 12:00:00", false);

        let not_reachable = handle(&ev, &allow_list, &lockout, &signer, "key123", false);
        assert!(not_reachable.relay.is_none());

        let lockout2 = LockoutEngine::new(ChronoDuration::seconds(10));
        let reachable = handle(&ev, &allow_list, &lockout2, &signer, "key123", true);
        assert!(reachable.relay.is_some());
        assert_eq!(reachable.relay.unwrap().result, "True");
    }
}
