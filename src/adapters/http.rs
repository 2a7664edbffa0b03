use crate::config::toml_config::ApiSource;
use crate::domain::model::RawRecord;
use crate::domain::ports::{DocumentStore, Extractor};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// One GET per run against an upstream JSON API.
pub struct HttpExtractor {
    source: ApiSource,
    client: Client,
}

impl HttpExtractor {
    pub fn new(source: ApiSource) -> Result<Self> {
        let timeout = Duration::from_secs(source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { source, client })
    }

    fn fail(&self, reason: impl Into<String>) -> EtlError {
        EtlError::extract(&self.source.endpoint, reason)
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn describe(&self) -> String {
        format!("GET {}", self.source.endpoint)
    }

    async fn extract(&self, _store: &dyn DocumentStore) -> Result<Vec<RawRecord>> {
        let mut request = self.client.get(&self.source.endpoint);
        if let Some(params) = &self.source.parameters {
            request = request.query(params);
        }
        if let Some(headers) = &self.source.headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        tracing::debug!("Making API request to: {}", self.source.endpoint);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                self.fail(format!(
                    "request timed out after {}s",
                    self.source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
                ))
            } else {
                self.fail(format!("transport error: {}", e))
            }
        })?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);
        if !status.is_success() {
            return Err(self.fail(format!("upstream returned HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.fail(format!("malformed JSON body: {}", e)))?;

        records_from_payload(body, &self.source).map_err(|reason| self.fail(reason))
    }
}

/// Locates the record array in an upstream payload and applies windowing.
pub fn records_from_payload(
    body: Value,
    source: &ApiSource,
) -> std::result::Result<Vec<RawRecord>, String> {
    if let Some(pointer) = &source.success_pointer {
        match body.pointer(pointer) {
            Some(Value::Bool(true)) => {}
            Some(Value::Bool(false)) => return Err("upstream refused the request".to_string()),
            _ => return Err(format!("success flag '{}' missing from payload", pointer)),
        }
    }

    let records = match &source.records_pointer {
        Some(pointer) => body
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| format!("no value at '{}' in payload", pointer))?,
        None => body,
    };

    let Value::Array(items) = records else {
        return Err("expected a JSON array of records".to_string());
    };

    let mut raw = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(RawRecord::new(map)),
            other => Err(format!("record {} is not an object: {}", index, other)),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(keep) = source.keep_last {
        let excess = raw.len().saturating_sub(keep);
        raw.drain(..excess);
    }
    if source.newest_first.unwrap_or(false) {
        raw.reverse();
    }

    Ok(raw)
}
