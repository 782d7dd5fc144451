//! Transport seam to the remote cache store and its HTTP implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::types::{CacheKey, MetadataResult};
use crate::config::ApiConfig;
use crate::installments::Installment;

pub const UPDATE_STATUSES_PATH: &str = "/api/cache/installments/update-statuses";
pub const METADATA_PATH: &str = "/api/cache/metadata";
pub const INVALIDATE_PATH: &str = "/api/cache/invalidate";
pub const INSTALLMENTS_PATH: &str = "/api/cache/installments";
pub const METADATA_UPDATE_PATH: &str = "/api/cache/metadata/update";

/// Operations offered by the remote cache store.
///
/// Implementations report every failure as an error; turning failures into
/// best-effort outcomes is the coordinator's job.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
  /// Fetch metadata for every cache key.
  async fn metadata(&self) -> Result<MetadataResult>;

  /// Discard the cached value of `key`.
  async fn invalidate(&self, key: CacheKey) -> Result<()>;

  /// Replace the cached installment records.
  async fn put_installments(&self, installments: &[Installment]) -> Result<()>;

  /// Record the source hash for `key`; the store stamps time and version.
  async fn update_metadata(&self, key: CacheKey, source_data_hash: &str) -> Result<()>;

  /// Recompute time-based statuses as of `current_date`, returning how many changed.
  async fn update_statuses(&self, current_date: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
struct UpdateStatusesResponse {
  #[serde(default)]
  updated: u64,
}

/// Remote store reached over HTTP JSON endpoints.
#[derive(Clone)]
pub struct HttpStore {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpStore {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let mut base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid cache store URL '{}': {}", config.base_url, e))?;

    // Keep any path prefix when joining endpoint paths
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
    let url = self.endpoint(path)?;
    tracing::debug!("POST {}", url);

    self
      .client
      .post(url)
      .json(body)
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request to {} rejected: {}", path, e))
  }

  /// POST and check the acknowledgement body.
  ///
  /// Any 2xx is accepted unless the body is JSON carrying `"success": false`.
  async fn post_ack(&self, path: &str, body: &Value) -> Result<()> {
    let response = self.post(path, body).await?;
    let text = response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", path, e))?;

    if let Ok(ack) = serde_json::from_str::<Value>(&text) {
      if ack.get("success").and_then(Value::as_bool) == Some(false) {
        let message = ack
          .get("error")
          .and_then(Value::as_str)
          .unwrap_or("no error message");
        return Err(eyre!("{} reported failure: {}", path, message));
      }
    }

    Ok(())
  }
}

impl RemoteStore for HttpStore {
  async fn metadata(&self) -> Result<MetadataResult> {
    let url = self.endpoint(METADATA_PATH)?;
    tracing::debug!("GET {}", url);

    self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch cache metadata: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Cache metadata request rejected: {}", e))?
      .json::<MetadataResult>()
      .await
      .map_err(|e| eyre!("Failed to parse cache metadata: {}", e))
  }

  async fn invalidate(&self, key: CacheKey) -> Result<()> {
    self
      .post_ack(INVALIDATE_PATH, &json!({ "cacheKey": key.as_str() }))
      .await
  }

  async fn put_installments(&self, installments: &[Installment]) -> Result<()> {
    self
      .post_ack(INSTALLMENTS_PATH, &json!({ "installments": installments }))
      .await
  }

  async fn update_metadata(&self, key: CacheKey, source_data_hash: &str) -> Result<()> {
    let body = json!({
      "cacheKey": key.as_str(),
      "sourceDataHash": source_data_hash,
    });
    self.post_ack(METADATA_UPDATE_PATH, &body).await
  }

  async fn update_statuses(&self, current_date: DateTime<Utc>) -> Result<u64> {
    let body = json!({
      "currentDate": current_date.to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    let response: UpdateStatusesResponse = self
      .post(UPDATE_STATUSES_PATH, &body)
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse status update response: {}", e))?;

    Ok(response.updated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::installments::InstallmentStatus;
  use chrono::TimeZone;
  use httpmock::prelude::*;

  fn store_for(server: &MockServer) -> HttpStore {
    HttpStore::new(&ApiConfig {
      base_url: server.base_url(),
      timeout_secs: Some(5),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_fetch_metadata() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(GET).path(METADATA_PATH);
        then.status(200).json_body(json!({
          "success": true,
          "data": {
            "installments": {
              "sourceDataHash": "H1",
              "calculatedAt": "2024-03-01T10:00:00.000Z",
              "dataVersion": 2
            },
            "bankStatements": null,
            "ordenTiendaMap": null
          }
        }));
      })
      .await;

    let result = store_for(&server).metadata().await.unwrap();
    mock.assert_async().await;

    assert!(result.success);
    assert_eq!(
      result.entry(CacheKey::Installments).unwrap().source_data_hash,
      "H1"
    );
    assert!(result.entry(CacheKey::BankStatements).is_none());
  }

  #[tokio::test]
  async fn test_invalidate_payload() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path(INVALIDATE_PATH)
          .json_body(json!({ "cacheKey": "installments" }));
        then.status(200).json_body(json!({ "success": true }));
      })
      .await;

    store_for(&server)
      .invalidate(CacheKey::Installments)
      .await
      .unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_put_installments_payload() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(POST).path(INSTALLMENTS_PATH).json_body(json!({
          "installments": [{ "estadoCuota": "done", "monto": 100.0, "tienda": "Centro" }]
        }));
        then.status(200).body("ok");
      })
      .await;

    let installments = vec![Installment {
      status: InstallmentStatus::Done,
      amount: 100.0,
      due_date: None,
      order: None,
      store: Some("Centro".to_string()),
    }];

    store_for(&server)
      .put_installments(&installments)
      .await
      .unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_update_metadata_payload() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(POST).path(METADATA_UPDATE_PATH).json_body(json!({
          "cacheKey": "installments",
          "sourceDataHash": "2_2_150_nodate"
        }));
        then.status(200).json_body(json!({ "success": true }));
      })
      .await;

    store_for(&server)
      .update_metadata(CacheKey::Installments, "2_2_150_nodate")
      .await
      .unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_update_statuses() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path(UPDATE_STATUSES_PATH)
          .json_body(json!({ "currentDate": "2024-03-01T10:30:00.000Z" }));
        then.status(200).json_body(json!({ "updated": 7 }));
      })
      .await;

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
    let updated = store_for(&server).update_statuses(now).await.unwrap();
    mock.assert_async().await;
    assert_eq!(updated, 7);
  }

  #[tokio::test]
  async fn test_server_error_is_reported() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path(INVALIDATE_PATH);
        then.status(500);
      })
      .await;

    assert!(store_for(&server)
      .invalidate(CacheKey::Installments)
      .await
      .is_err());
  }

  #[tokio::test]
  async fn test_negative_ack_is_reported() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path(METADATA_UPDATE_PATH);
        then
          .status(200)
          .json_body(json!({ "success": false, "error": "unknown cache key" }));
      })
      .await;

    let err = store_for(&server)
      .update_metadata(CacheKey::OrdenTiendaMap, "H")
      .await
      .unwrap_err();
    assert!(err.to_string().contains("unknown cache key"));
  }

  #[test]
  fn test_base_url_path_prefix_is_kept() {
    let store = HttpStore::new(&ApiConfig {
      base_url: "http://localhost:3000/dashboard".to_string(),
      timeout_secs: None,
    })
    .unwrap();

    assert_eq!(
      store.endpoint(METADATA_PATH).unwrap().as_str(),
      "http://localhost:3000/dashboard/api/cache/metadata"
    );
  }
}
