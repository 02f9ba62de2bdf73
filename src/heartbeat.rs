// src/heartbeat.rs
// Periodic origin liveness probe (spec.md §4.10). Grounded on
// `edge_server.py::heartbeat_cloud` / `api_bridge.py::check_cloud_connection`
// and `send_edge_heartbeat`.

use crate::coordinator::Event;
use crate::origin_client::OriginClient;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

pub struct HeartbeatReporter {
    origin: OriginClient,
    api_key: String,
    event_tx: mpsc::Sender<Event>,
    period: Duration,
}

impl HeartbeatReporter {
    pub fn new(origin: OriginClient, api_key: String, event_tx: mpsc::Sender<Event>, period: Duration) -> Self {
        Self {
            origin,
            api_key,
            event_tx,
            period,
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("heartbeat reporter started (period: {}s)", self.period.as_secs());
            let mut ticker = interval(self.period);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    async fn tick(&self) {
        let reachable = self.origin.health_check().await.unwrap_or(false);
        let _ = self.event_tx.send(Event::HeartbeatResult(reachable)).await;

        if reachable {
            info!("origin reachable, sending heartbeat");
            if let Err(e) = self.origin.send_heartbeat(&self.api_key).await {
                warn!("failed to send edge heartbeat: {e}");
            }
        } else {
            info!("origin unreachable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tick_reports_unreachable_and_emits_result() {
        let (tx, mut rx) = mpsc::channel(4);
        let reporter = HeartbeatReporter::new(
            OriginClient::new("http://127.0.0.1:1"),
            "key123".to_string(),
            tx,
            Duration::from_secs(1),
        );

        reporter.tick().await;

        match rx.try_recv().unwrap() {
            Event::HeartbeatResult(reachable) => assert!(!reachable),
            _ => panic!("expected a HeartbeatResult event"),
        }
    }
}
