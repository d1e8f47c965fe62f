use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ReportError;

/// 成绩上报 HTTP 客户端
#[derive(Clone)]
pub struct ReportClient {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl ReportClient {
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, endpoint }
    }

    /// POST 一条 JSON 记录
    pub async fn post_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ReportError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ReportError::MissingEndpoint)?;

        debug!("上报成绩到: {}", endpoint);

        let response = self
            .http
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|source| ReportError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_endpoint_is_an_error() {
        let client = ReportClient::new(None);
        let err = client.post_json(&serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ReportError::MissingEndpoint));
    }
}
