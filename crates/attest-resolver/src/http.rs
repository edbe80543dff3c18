//! Document backend served over HTTP: `GET/PUT {base}/dids/{did}`.

use std::time::Duration;

use async_trait::async_trait;
use attest_core::Did;
use reqwest::StatusCode;

use crate::backend::{BackendError, DocumentBackend};

/// Talks to a document host over HTTP: `GET` to fetch, `PUT` to publish.
pub struct HttpBackend {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, did: &Did) -> String {
        format!("{}/dids/{}", self.base_url, did)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else {
        BackendError::Unavailable(err.to_string())
    }
}

fn status_error(status: StatusCode) -> BackendError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BackendError::Unavailable(format!("HTTP {}", status))
    } else {
        BackendError::Rejected(format!("HTTP {}", status))
    }
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, did: &Did) -> Result<Option<Vec<u8>>, BackendError> {
        let response = self
            .client
            .get(self.url(did))
            .send()
            .await
            .map_err(transport_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.bytes().await.map_err(transport_error)?;
                Ok(Some(body.to_vec()))
            }
            status => Err(status_error(status)),
        }
    }

    async fn publish(&self, did: &Did, version: u64, document: Vec<u8>) -> Result<(), BackendError> {
        let response = self
            .client
            .put(self.url(did))
            .query(&[("version", version)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(document)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(backend = %self.name, did = %did, version, "document published");
            Ok(())
        } else {
            Err(status_error(status))
        }
    }
}
