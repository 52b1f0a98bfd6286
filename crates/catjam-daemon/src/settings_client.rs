//! Settings handle client

use anyhow::{Context, Result};
use catjam_proto::config::SettingsSourceConfig;
use catjam_proto::settings::{parse_handle_payload, SettingsMap};
use serde_json::Value;
use tracing::warn;

/// Fetch the add-on's settings snapshot from the handle endpoint.
pub async fn fetch_settings(
    client: &reqwest::Client,
    source: &SettingsSourceConfig,
) -> Result<SettingsMap> {
    let response = client
        .get(&source.handle_url)
        .query(&[("name", source.addon_name.as_str())])
        .header("Accept", "application/json")
        .send()
        .await
        .context("Failed to reach settings handle")?;

    if !response.status().is_success() {
        anyhow::bail!("Settings handle returned status: {}", response.status());
    }

    let payload: Value = response
        .json()
        .await
        .context("Failed to parse settings handle response")?;

    parse_handle_payload(&payload)
}

/// Like [`fetch_settings`], but a failure only warns; the caller keeps the
/// previous settings.
pub async fn fetch_or_keep(
    client: &reqwest::Client,
    source: &SettingsSourceConfig,
) -> Option<SettingsMap> {
    match fetch_settings(client, source).await {
        Ok(map) => Some(map),
        Err(e) => {
            warn!("settings: keeping previous values: {:#}", e);
            None
        }
    }
}
