// src/main.rs
// Process entrypoint. Grounded on the teacher's startup sequence
// (`dotenvy::dotenv()`, `env_logger::init()`, `validate_config().print_summary()`,
// fatal-on-missing-key checks) reused as the skeleton for a daemon instead
// of a blockchain node.

use clap::Parser;
use log::{error, info};
use nexxgate_edge::alerts::{send_alert, Alert};
use nexxgate_edge::allow_list::AllowList;
use nexxgate_edge::config::{self, Config};
use nexxgate_edge::coordinator::Coordinator;
use nexxgate_edge::heartbeat::HeartbeatReporter;
use nexxgate_edge::lockout::LockoutEngine;
use nexxgate_edge::log_store::AccessLogStore;
use nexxgate_edge::mqtt;
use nexxgate_edge::origin_client::OriginClient;
use nexxgate_edge::reconciler::Reconciler;
use nexxgate_edge::signing::SigningService;
use nexxgate_edge::uploader::CloudUploader;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "nexxgate-edge", about = "Edge coordinator for the Nexxgate access-control fleet")]
struct Cli {
    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    config_check: bool,

    /// Override RUST_LOG for this run.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(level) = &cli.log_level {
        std::env::set_var("RUST_LOG", level);
    }
    let _ = dotenvy::dotenv();
    env_logger::init();

    let config = Config::from_env();
    let validation = config::validate_config(&config);
    validation.print_summary();

    if !validation.valid {
        error!("refusing to start with invalid configuration");
        return ExitCode::FAILURE;
    }

    if cli.config_check {
        info!("configuration OK");
        return ExitCode::SUCCESS;
    }

    let config = Arc::new(config);

    let signer = match SigningService::load(std::path::Path::new(&config.signing_key_path)) {
        Ok(signer) => Arc::new(signer),
        Err(e) => {
            error!("fatal: failed to load signing key: {e}");
            send_alert(Alert::critical("signing", "failed to load signing key").with_details(e.to_string())).await;
            return ExitCode::FAILURE;
        }
    };

    let allow_list = Arc::new(AllowList::new());
    let lockout = Arc::new(LockoutEngine::new(chrono::Duration::from_std(config.lockout_window).unwrap()));
    let cloud_reachable = Arc::new(AtomicBool::new(false));
    let log_store = Arc::new(AccessLogStore::new(config.log_file_path.clone()));

    let (event_tx, events) = Coordinator::channel();

    let local = match mqtt::start_local_session(config.clone(), event_tx.clone()).await {
        Ok(publisher) => publisher,
        Err(e) => {
            error!("fatal: failed to start local mqtt session: {e}");
            send_alert(Alert::critical("mqtt", "failed to start local broker session").with_details(e.to_string())).await;
            return ExitCode::FAILURE;
        }
    };
    let remote = match mqtt::start_remote_session(config.clone()).await {
        Ok(relay) => relay,
        Err(e) => {
            error!("fatal: failed to start remote mqtt session: {e}");
            send_alert(Alert::critical("mqtt", "failed to start remote broker session").with_details(e.to_string())).await;
            return ExitCode::FAILURE;
        }
    };

    let local_shutdown = local.clone();
    let remote_shutdown = remote.clone();

    let coordinator = Coordinator::new(
        allow_list,
        lockout,
        cloud_reachable.clone(),
        log_store.clone(),
        signer,
        config.clone(),
        local,
        remote,
        event_tx.clone(),
        events,
    );

    let origin = OriginClient::new(&config.origin_base_url);

    let reconciler = Arc::new(Reconciler::new(origin.clone(), event_tx.clone(), config.reconcile_period));
    let uploader = Arc::new(CloudUploader::new(
        origin.clone(),
        log_store.clone(),
        cloud_reachable.clone(),
        config.upload_period,
    ));
    let heartbeat = Arc::new(HeartbeatReporter::new(
        origin,
        config.edge_api_key.clone(),
        event_tx.clone(),
        config.heartbeat_period,
    ));

    let reconciler_handle = reconciler.start();
    let uploader_handle = uploader.start();
    let heartbeat_handle = heartbeat.start();
    let coordinator_handle = tokio::spawn(coordinator.run());

    info!("nexxgate-edge running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = coordinator_handle => {
            error!("coordinator loop exited unexpectedly");
        }
    }

    reconciler_handle.abort();
    uploader_handle.abort();
    heartbeat_handle.abort();

    info!("disconnecting mqtt sessions");
    local_shutdown.disconnect().await;
    remote_shutdown.disconnect().await;

    ExitCode::SUCCESS
}
