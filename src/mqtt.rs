// src/mqtt.rs
// Two independent MQTT sessions (spec.md §4.11).
//
// No crate in the retrieval corpus talks MQTT at all — `rumqttc` is
// introduced here as a necessary, idiomatic enrichment dependency, not a
// grounded one (see DESIGN.md). The session-pair shape (one task owns one
// connection, forwards decoded frames over a channel) and the
// exponential-backoff reconnect loop follow the teacher's general pattern
// for long-running background tasks (`Arc<Self>::start() -> JoinHandle`)
// and its use of the `backoff` crate for retry.

use crate::config::Config;
use crate::coordinator::Event;
use crate::error::{EdgeError, Result};
use crate::types::{AuthDecision, AuthEvent, RemoveUid, SignedUidList};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use log::{error, info, warn};
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const LOCAL_TOPICS: &[&str] = &[
    "/request_access_list",
    "/authenticate",
    "/vote_response",
    "/majority_vote",
];

pub struct LocalPublisher {
    client: AsyncClient,
}

impl LocalPublisher {
    async fn publish_json(&self, topic: &str, payload: &impl serde::Serialize) {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.publish_raw(topic, bytes).await,
            Err(e) => warn!("failed to encode payload for {topic}: {e}"),
        }
    }

    async fn publish_raw(&self, topic: &str, bytes: Vec<u8>) {
        if let Err(e) = self.client.publish(topic, QoS::AtMostOnce, false, bytes).await {
            warn!("failed to publish to {topic}: {e}");
        }
    }

    pub async fn publish_decision(&self, decision: &AuthDecision) {
        self.publish_json("/allow_authentication", decision).await;
    }

    pub async fn publish_remove_uid(&self, remove_uid: &RemoveUid) {
        self.publish_json("/remove_uid", remove_uid).await;
    }

    pub async fn publish_uid_list(&self, topic: &str, view: &SignedUidList) {
        self.publish_json(topic, view).await;
    }

    pub async fn publish_vote_response(&self, uids: &[String]) {
        self.publish_json("/vote_response", &uids).await;
    }

    pub async fn publish_majority_vote(&self, uids: &[String]) {
        self.publish_json("/majority_vote", &uids).await;
    }

    /// Send an MQTT DISCONNECT so the broker sees a clean session end
    /// instead of a dropped TCP connection (spec.md §5 cancellation).
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("error disconnecting local mqtt session: {e}");
        }
    }
}

pub struct RemoteRelay {
    client: AsyncClient,
}

impl RemoteRelay {
    pub async fn publish_access(&self, event: &crate::types::RelayedAccessEvent) {
        match serde_json::to_vec(event) {
            Ok(bytes) => {
                if let Err(e) = self
                    .client
                    .publish("/nexxgate/access", QoS::AtMostOnce, false, bytes)
                    .await
                {
                    warn!("failed to relay access event to origin: {e}");
                }
            }
            Err(e) => warn!("failed to encode relayed access event: {e}"),
        }
    }

    /// Send an MQTT DISCONNECT so the broker sees a clean session end
    /// instead of a dropped TCP connection (spec.md §5 cancellation).
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("error disconnecting remote mqtt session: {e}");
        }
    }
}

fn local_mqtt_options(config: &Config) -> Result<MqttOptions> {
    let mut options = MqttOptions::new("nexxgate-edge-local", &config.local_broker_host, config.local_broker_port);
    options.set_keep_alive(Duration::from_secs(30));

    if !config.local_ca_path.is_empty() {
        let ca = std::fs::read(&config.local_ca_path).map_err(EdgeError::LogStore)?;
        let client_cert = std::fs::read(&config.local_client_cert_path).map_err(EdgeError::LogStore)?;
        let client_key = std::fs::read(&config.local_client_key_path).map_err(EdgeError::LogStore)?;
        options.set_transport(Transport::tls(ca, Some((client_cert, client_key)), None));
    }

    Ok(options)
}

fn remote_mqtt_options(config: &Config) -> MqttOptions {
    let mut options = MqttOptions::new("nexxgate-edge-remote", &config.remote_broker_host, config.remote_broker_port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_credentials(&config.remote_broker_username, &config.remote_broker_password);
    options.set_transport(Transport::Tls(Default::default()));
    options
}

/// Start the local broker session: subscribes to all door-node-facing
/// topics and forwards decoded frames onto `event_tx`. Reconnects with
/// exponential backoff on handshake/connect failure (spec.md §7).
pub async fn start_local_session(config: Arc<Config>, event_tx: mpsc::Sender<Event>) -> Result<Arc<LocalPublisher>> {
    let options = local_mqtt_options(&config)?;
    let (client, mut eventloop) = AsyncClient::new(options, 64);

    for topic in LOCAL_TOPICS {
        if let Err(e) = client.subscribe(*topic, QoS::AtMostOnce).await {
            warn!("failed to subscribe to {topic}: {e}");
        }
    }

    let publisher = Arc::new(LocalPublisher { client: client.clone() });

    tokio::spawn(async move {
        loop {
            let result: std::result::Result<(), backoff::Error<rumqttc::ConnectionError>> = retry(
                ExponentialBackoff {
                    max_elapsed_time: None,
                    ..Default::default()
                },
                || async {
                    loop {
                        match eventloop.poll().await {
                            Ok(MqttEvent::Incoming(Packet::Publish(publish))) => {
                                handle_local_publish(&publish.topic, &publish.payload, &event_tx).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("local mqtt session error, reconnecting: {e}");
                                return Err(backoff::Error::transient(e));
                            }
                        }
                    }
                },
            )
            .await;

            if let Err(e) = result {
                error!("local mqtt session permanently failed: {e}");
            }
        }
    });

    Ok(publisher)
}

/// Start the remote (origin) broker session. Publish-only; subscribes to
/// nothing (spec.md §4.11).
pub async fn start_remote_session(config: Arc<Config>) -> Result<Arc<RemoteRelay>> {
    if config.remote_broker_host.is_empty() {
        warn!("REMOTE_BROKER_HOST unset, remote relay session disabled");
    }

    let options = remote_mqtt_options(&config);
    let (client, mut eventloop) = AsyncClient::new(options, 64);
    let relay = Arc::new(RemoteRelay { client });

    tokio::spawn(async move {
        loop {
            let result: std::result::Result<(), backoff::Error<rumqttc::ConnectionError>> = retry(
                ExponentialBackoff {
                    max_elapsed_time: None,
                    ..Default::default()
                },
                || async {
                    loop {
                        match eventloop.poll().await {
                            Ok(_) => {}
                            Err(e) => {
                                warn!("remote mqtt session error, reconnecting: {e}");
                                return Err(backoff::Error::transient(e));
                            }
                        }
                    }
                },
            )
            .await;

            if let Err(e) = result {
                error!("remote mqtt session permanently failed: {e}");
            }
        }
    });

    Ok(relay)
}

async fn handle_local_publish(topic: &str, payload: &[u8], event_tx: &mpsc::Sender<Event>) {
    let event = match topic {
        "/authenticate" => match serde_json::from_slice::<AuthEvent>(payload) {
            Ok(auth_event) => Event::Auth(auth_event),
            Err(e) => {
                info!("dropping malformed /authenticate payload: {e}");
                return;
            }
        },
        "/request_access_list" => {
            if payload == b"update" {
                Event::RequestAccessList
            } else {
                return;
            }
        }
        "/majority_vote" => Event::PeerMajorityVote,
        "/vote_response" => Event::VoteResponse(payload.to_vec()),
        _ => return,
    };

    if event_tx.send(event).await.is_err() {
        warn!("coordinator channel closed, dropping inbound mqtt frame");
    }
}

/// Test-only constructors: build a publisher/relay around a client whose
/// eventloop is never polled, so `publish`/`disconnect` calls enqueue onto
/// the client's internal request channel and return without needing a live
/// broker connection. Used so `coordinator.rs`'s tests can exercise real
/// publish call sites instead of stubbing them out.
#[cfg(test)]
pub(crate) fn unconnected_local_publisher() -> Arc<LocalPublisher> {
    let options = MqttOptions::new("test-local", "127.0.0.1", 1);
    let (client, _eventloop) = AsyncClient::new(options, 64);
    Arc::new(LocalPublisher { client })
}

#[cfg(test)]
pub(crate) fn unconnected_remote_relay() -> Arc<RemoteRelay> {
    let options = MqttOptions::new("test-remote", "127.0.0.1", 1);
    let (client, _eventloop) = AsyncClient::new(options, 64);
    Arc::new(RemoteRelay { client })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticate_payload_decodes_into_auth_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = br#"{"uid":"U1","node_id":"N1","date":"2024-05-30 12:00:00","result":false}"#;
        handle_local_publish("/authenticate", payload, &tx).await;

        match rx.try_recv().unwrap() {
            Event::Auth(AuthEvent { uid, node_id, result, .. }) => {
                assert_eq!(uid, "U1");
                assert_eq!(node_id, "N1");
                assert!(!result);
            }
            _ => panic!("expected an Auth event"),
        }
    }

    #[tokio::test]
    async fn malformed_authenticate_payload_is_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        handle_local_publish("/authenticate", b"not json", &tx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_access_list_requires_update_marker() {
        let (tx, mut rx) = mpsc::channel(4);
        handle_local_publish("/request_access_list", b"update", &tx).await;
        assert!(matches!(rx.try_recv().unwrap(), Event::RequestAccessList));

        handle_local_publish("/request_access_list", b"noise", &tx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unconnected_publisher_enqueues_without_a_broker() {
        let publisher = unconnected_local_publisher();
        publisher.publish_vote_response(&["A".to_string()]).await;
        publisher.disconnect().await;
    }
}
