//! Edge coordinator for the Nexxgate access-control fleet.
//!
//! Sits between low-power door nodes and the remote origin service: it
//! overrides local deny decisions from a cached allow-list, detects
//! cross-node credential replay, reconciles its cache with the origin over
//! HTTP, and falls back to peer majority voting when the origin is
//! unreachable. See `SPEC_FULL.md` for the full component design.

pub mod alerts;
pub mod allow_list;
pub mod auth_handler;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod frequency;
pub mod heartbeat;
pub mod lockout;
pub mod log_store;
pub mod majority_vote;
pub mod mqtt;
pub mod origin_client;
pub mod reconciler;
pub mod signing;
pub mod types;
pub mod uploader;
