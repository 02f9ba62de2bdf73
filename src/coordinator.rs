// src/coordinator.rs
// The single-writer event loop (spec.md §5, §9 "global mutable state").
//
// Every mutation of the Allow-List, Lockout table, cloud_reachable flag, and
// the in-flight voting round happens only here. Inbound MQTT frames, timer
// results, and peer votes all arrive as `Event`s over one `mpsc` channel and
// are drained in a `tokio::select!` loop — the same shape as the teacher's
// `batch_writer::batch_processor`, generalized from a fixed-size flush batch
// to a small dispatch table of spec-defined reactions.

use crate::allow_list::AllowList;
use crate::auth_handler;
use crate::lockout::LockoutEngine;
use crate::log_store::AccessLogStore;
use crate::majority_vote::{MajorityVoteCoordinator, TallyOutcome};
use crate::mqtt::{LocalPublisher, RemoteRelay};
use crate::signing::SigningService;
use crate::types::{AuthEvent, SignedUidList};
use crate::{config::Config, frequency};
use chrono::Duration as ChronoDuration;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub enum Event {
    Auth(AuthEvent),
    RequestAccessList,
    /// A peer's `/majority_vote` broadcast; we respond with our own cache on
    /// `/vote_response` without treating the payload as a candidate.
    PeerMajorityVote,
    /// A ballot for our own in-flight voting round.
    VoteResponse(Vec<u8>),
    /// Result of one Reconciler HTTP tick.
    ReconcileResult(Result<Vec<String>, ()>),
    VoteRoundTimeout,
    HeartbeatResult(bool),
}

pub struct Coordinator {
    pub allow_list: Arc<AllowList>,
    pub lockout: Arc<LockoutEngine>,
    pub cloud_reachable: Arc<AtomicBool>,
    pub log_store: Arc<AccessLogStore>,
    pub signer: Arc<SigningService>,
    pub config: Arc<Config>,
    pub local: Arc<LocalPublisher>,
    pub remote: Arc<RemoteRelay>,
    majority_vote: MajorityVoteCoordinator,
    events: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
}

/// Channel capacity for the coordinator's event queue. Exposed so `main`
/// can create the pair before the coordinator exists (the local mqtt
/// session needs a sender to forward frames into, but construction
/// order requires the publisher it feeds into to already be running).
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

impl Coordinator {
    pub fn channel() -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(EVENT_CHANNEL_CAPACITY)
    }

    pub fn new(
        allow_list: Arc<AllowList>,
        lockout: Arc<LockoutEngine>,
        cloud_reachable: Arc<AtomicBool>,
        log_store: Arc<AccessLogStore>,
        signer: Arc<SigningService>,
        config: Arc<Config>,
        local: Arc<LocalPublisher>,
        remote: Arc<RemoteRelay>,
        event_tx: mpsc::Sender<Event>,
        events: mpsc::Receiver<Event>,
    ) -> Self {
        Self {
            allow_list,
            lockout,
            cloud_reachable,
            log_store,
            signer,
            config,
            local,
            remote,
            majority_vote: MajorityVoteCoordinator::new(),
            events,
            event_tx,
        }
    }

    pub async fn run(mut self) {
        info!("coordinator loop started");
        while let Some(event) = self.events.recv().await {
            self.dispatch(event).await;
        }
        info!("coordinator loop stopped");
    }

    async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Auth(auth_event) => self.handle_auth(auth_event).await,
            Event::RequestAccessList => self.publish_access_list("/response_access_list").await,
            Event::PeerMajorityVote => self.respond_to_peer_vote().await,
            Event::VoteResponse(payload) => self.majority_vote.submit_ballot(payload),
            Event::ReconcileResult(Ok(uids)) => self.install_cache(uids).await,
            Event::ReconcileResult(Err(())) => self.start_vote_round(),
            Event::VoteRoundTimeout => self.finish_vote_round().await,
            Event::HeartbeatResult(reachable) => {
                self.cloud_reachable.store(reachable, Ordering::SeqCst);
            }
        }
    }

    async fn handle_auth(&mut self, event: AuthEvent) {
        let cloud_reachable = self.cloud_reachable.load(Ordering::SeqCst);
        let output = auth_handler::handle(
            &event,
            &self.allow_list,
            &self.lockout,
            &self.signer,
            &self.config.edge_api_key,
            cloud_reachable,
        );

        if let Err(e) = self.log_store.append(
            event.date,
            &event.uid,
            &event.node_id,
            output.log_result,
            &self.config.edge_api_key,
        ) {
            warn!("failed to append access log: {e}");
        }

        // A `/remove_uid` for a uid is always emitted before the denied
        // decision for the same event that triggered it (spec.md §5).
        if let Some(remove_uid) = output.remove_uid {
            self.local.publish_remove_uid(&remove_uid).await;
        }
        if let Some(decision) = output.auth_decision {
            self.local.publish_decision(&decision).await;
        }
        if let Some(relay) = output.relay {
            self.remote.publish_access(&relay).await;
        }
    }

    async fn respond_to_peer_vote(&mut self) {
        let uids = self.allow_list.snapshot();
        self.local.publish_vote_response(&uids).await;
    }

    fn start_vote_round(&mut self) {
        if !self.majority_vote.start_round() {
            // A round is already in flight; spec.md §4.8 forbids a second.
            return;
        }
        info!("origin unreachable, starting majority-vote round");

        let uids = self.allow_list.snapshot();
        let local = self.local.clone();
        tokio::spawn(async move {
            local.publish_majority_vote(&uids).await;
        });

        let tx = self.event_tx.clone();
        let timeout = self.config.vote_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Event::VoteRoundTimeout).await;
        });
    }

    async fn finish_vote_round(&mut self) {
        match self.majority_vote.finish_round() {
            TallyOutcome::NoVotes => {
                info!("no votes received, allow-list unchanged");
            }
            TallyOutcome::Installed(uids) => {
                self.install_cache(uids).await;
            }
        }
    }

    async fn install_cache(&mut self, uids: Vec<String>) {
        self.allow_list.replace(uids);
        self.publish_access_list("/access_list").await;
    }

    async fn publish_access_list(&self, topic: &str) {
        let now = chrono::Utc::now().naive_utc();
        let ranked = frequency::top_uids(
            &self.log_store,
            now,
            ChronoDuration::days(frequency::DEFAULT_WINDOW_DAYS),
            frequency::DEFAULT_TOP_K,
        );
        let view: SignedUidList = self
            .allow_list
            .publish_view(&ranked, self.config.publish_limit, &self.signer);
        self.local.publish_uid_list(topic, &view).await;
    }
}
