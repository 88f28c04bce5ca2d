use crate::download::orchestrator::Directory;
use crate::models::wire::{ErrorResponse, QueryResponse, RegisterRequest};
use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// HTTP client for a tracker's `/register` and `/query` endpoints
pub struct TrackerClient {
    client: reqwest::Client,
    base_url: Url,
}

impl TrackerClient {
    pub fn new(tracker_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(tracker_url).context(format!("Invalid tracker URL '{}'", tracker_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Advertise that a peer holds a file
    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        let url = self.base_url.join("register").context("Failed to build register URL")?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .context("Failed to send register request to tracker")?;

        let status = response.status();
        if !status.is_success() {
            let reason = error_message(response).await;
            bail!("Tracker rejected registration ({}): {}", status, reason);
        }

        Ok(())
    }

    /// Look up a file, `None` when the tracker does not know it
    pub async fn query(&self, file_hash: &str) -> Result<Option<QueryResponse>> {
        let url = self
            .base_url
            .join(&format!("query/{}", file_hash))
            .context("Failed to build query URL")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send query to tracker")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<QueryResponse>()
                    .await
                    .context("Failed to parse query response from tracker")?;
                Ok(Some(body))
            }
            status => {
                let reason = error_message(response).await;
                bail!("Tracker query failed ({}): {}", status, reason)
            }
        }
    }
}

impl Directory for TrackerClient {
    async fn lookup(&self, file_hash: &str) -> Result<Option<QueryResponse>> {
        self.query(file_hash).await
    }
}

async fn error_message(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => body.error,
            Err(_) => text,
        },
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = TrackerClient::new("http://127.0.0.1:5000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.base_url().join("register").unwrap().as_str(),
            "http://127.0.0.1:5000/register"
        );

        let client = TrackerClient::new("http://tracker.local/swarm", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.base_url().join("query/abc").unwrap().as_str(),
            "http://tracker.local/swarm/query/abc"
        );
    }

    #[test]
    fn test_invalid_tracker_url() {
        assert!(TrackerClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_tracker_is_an_error() {
        // Port 9 (discard) is not expected to run an HTTP server
        let client = TrackerClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(client.query(&"a".repeat(40)).await.is_err());
    }
}
