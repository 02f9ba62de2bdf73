// src/reconciler.rs
// Periodic pull of the authoritative allow-list from the origin (spec.md
// §4.7). Grounded on `edge_server.py::update_access_list` for the period
// and fallback-on-failure shape, and on the teacher's
// `subchain::rent_collector::RentCollector` for the `Arc<Self>::start()`
// background-task idiom.

use crate::coordinator::Event;
use crate::origin_client::OriginClient;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

pub struct Reconciler {
    origin: OriginClient,
    event_tx: mpsc::Sender<Event>,
    period: Duration,
}

impl Reconciler {
    pub fn new(origin: OriginClient, event_tx: mpsc::Sender<Event>, period: Duration) -> Self {
        Self { origin, event_tx, period }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("reconciler started (period: {}s)", self.period.as_secs());
            let mut ticker = interval(self.period);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    async fn tick(&self) {
        match self.origin.get_access_list().await {
            Ok(uids) => {
                info!("reconciled {} uids from origin", uids.len());
                let _ = self.event_tx.send(Event::ReconcileResult(Ok(uids))).await;
            }
            Err(e) => {
                warn!("failed to reach origin for reconciliation, falling back to majority vote: {e}");
                let _ = self.event_tx.send(Event::ReconcileResult(Err(()))).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S4's trigger: origin unreachable falls back to a majority-vote round.
    #[tokio::test]
    async fn tick_on_unreachable_origin_emits_reconcile_err() {
        let (tx, mut rx) = mpsc::channel(4);
        let reconciler = Reconciler::new(OriginClient::new("http://127.0.0.1:1"), tx, Duration::from_secs(1));

        reconciler.tick().await;

        match rx.try_recv().unwrap() {
            Event::ReconcileResult(Err(())) => {}
            _ => panic!("expected ReconcileResult(Err(()))"),
        }
    }
}
