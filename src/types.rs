// src/types.rs
// Wire and in-process data shapes shared across the coordinator.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inbound credential read from a door node, as published on `/authenticate`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthEvent {
    pub uid: String,
    pub node_id: String,
    #[serde(with = "date_format")]
    pub date: NaiveDateTime,
    pub result: bool,
}

/// Outbound allow/deny decision, published on `/allow_authentication`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthDecision {
    pub uid: String,
    pub node_id: String,
    pub result: bool,
    pub signature: String,
}

/// A signed snapshot of (a subset of) the allow-list, published on
/// `/access_list` / `/response_access_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUidList {
    pub uids: Vec<String>,
    pub signature: String,
}

/// A signed cross-node revocation, published on `/remove_uid`.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveUid {
    pub uid: String,
    pub signature: String,
}

/// Raw payload bytes of one peer's response during a voting round.
pub type VoteBallot = Vec<u8>;

/// Outcome of running the authentication policy for one `AuthEvent`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub uid: String,
    pub node_id: String,
    pub date: NaiveDateTime,
    /// Final, post-override, post-lockout result.
    pub granted: bool,
    /// Whether an `/allow_authentication` response must be published.
    pub respond: bool,
    /// Set when the lockout engine revoked the uid as part of this decision.
    pub lockout_fired: bool,
}

/// Payload relayed to the origin's MQTT bus on `/nexxgate/access`.
///
/// `result` is serialized as the capitalized strings `"True"`/`"False"` to
/// match the origin's pattern-matching ingest (see DESIGN.md).
#[derive(Debug, Clone, Serialize)]
pub struct RelayedAccessEvent {
    pub uid: String,
    pub node_id: String,
    pub date: String,
    pub result: String,
    pub api_key: String,
}

impl RelayedAccessEvent {
    pub fn new(uid: &str, node_id: &str, date: NaiveDateTime, result: bool, api_key: &str) -> Self {
        Self {
            uid: uid.to_string(),
            node_id: node_id.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            result: if result { "True" } else { "False" }.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// One element of the origin's `GET /access_list/` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessListResponseItem {
    pub uid: String,
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

mod date_format {
    use super::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
