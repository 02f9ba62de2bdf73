// src/uploader.rs
// Periodic deferred batch upload of the local access log (spec.md §4.9).
// Grounded on `edge_server.py::update_logs_to_cloud` /
// `api_bridge.py::upload_log_file` (truncate only on success) and the
// teacher's `subchain::relayer::Relayer` (reqwest wrapper, non-2xx handling).

use crate::log_store::AccessLogStore;
use crate::origin_client::OriginClient;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub struct CloudUploader {
    origin: OriginClient,
    log_store: Arc<AccessLogStore>,
    cloud_reachable: Arc<AtomicBool>,
    period: Duration,
}

impl CloudUploader {
    pub fn new(
        origin: OriginClient,
        log_store: Arc<AccessLogStore>,
        cloud_reachable: Arc<AtomicBool>,
        period: Duration,
    ) -> Self {
        Self {
            origin,
            log_store,
            cloud_reachable,
            period,
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("cloud uploader started (period: {}s)", self.period.as_secs());
            let mut ticker = interval(self.period);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    async fn tick(&self) {
        if let Err(e) = self.log_store.ensure_exists() {
            warn!("failed to ensure access log exists before upload: {e}");
            return;
        }

        if !self.cloud_reachable.load(Ordering::SeqCst) {
            info!("origin unreachable, keeping local log for next upload window");
            return;
        }

        let origin = self.origin.clone();
        let result = self
            .log_store
            .take_for_upload(|contents| async move { origin.upload_log("access_log.csv", contents).await })
            .await;

        match result {
            Ok(true) => info!("logs uploaded, local file truncated"),
            Ok(false) => warn!("log upload rejected by origin, keeping local file"),
            Err(e) => warn!("failed to upload logs to origin: {e}"),
        }
    }
}
