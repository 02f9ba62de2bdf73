// src/origin_client.rs
// Thin HTTP client over the origin's small REST surface (spec.md §6).
//
// Grounded on `ouro_sdk::client::OuroClient` (base-url-plus-client struct,
// one method per endpoint, errors propagated via `?`) and on
// `api_bridge.py` (one function per origin endpoint: health-check,
// heartbeat, access-list pull, log upload).

use crate::types::AccessListResponseItem;
use anyhow::{bail, Result};
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct OriginClient {
    base_url: String,
    client: Client,
}

impl OriginClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health-check/", self.base_url);
        let response = self.client.get(&url).timeout(REQUEST_TIMEOUT).send().await?;
        Ok(response.status().is_success())
    }

    pub async fn send_heartbeat(&self, api_key: &str) -> Result<bool> {
        let url = format!("{}/edge_heartbeat/{}", self.base_url, api_key);
        let response = self.client.get(&url).timeout(REQUEST_TIMEOUT).send().await?;
        Ok(response.status().is_success())
    }

    /// Pull the authoritative allow-list. Returns `Err` on network failure
    /// or non-2xx (Reconciler treats both as "origin unreachable").
    pub async fn get_access_list(&self) -> Result<Vec<String>> {
        let url = format!("{}/access_list/", self.base_url);
        let response = self.client.get(&url).timeout(REQUEST_TIMEOUT).send().await?;

        if !response.status().is_success() {
            bail!("access_list fetch failed: {}", response.status());
        }

        let items: Vec<AccessListResponseItem> = response.json().await?;
        Ok(items.into_iter().map(|item| item.uid).collect())
    }

    /// Upload the raw log file contents. Returns `true` only on 201, per
    /// spec.md §4.9 (anything else means the caller must keep the file).
    pub async fn upload_log(&self, file_name: &str, contents: Vec<u8>) -> Result<bool> {
        let url = format!("{}/upload-log/", self.base_url);
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Ok(response.status().as_u16() == 201)
    }
}
