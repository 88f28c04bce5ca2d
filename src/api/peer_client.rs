use crate::core::error::FetchError;
use crate::download::orchestrator::ChunkFetcher;
use crate::validation::params::parse_peer_address;
use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// Fetches chunks from other peers' `/download` endpoints
#[derive(Clone)]
pub struct HttpChunkFetcher {
    client: reqwest::Client,
}

impl HttpChunkFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

/// `{peer}/download/{file_hash}/{index}`
pub fn chunk_url(peer: &str, file_hash: &str, index: u32) -> Result<Url, FetchError> {
    let base = parse_peer_address(peer).map_err(|e| FetchError::Transport(e.to_string()))?;
    base.join(&format!("download/{}/{}", file_hash, index))
        .map_err(|e| FetchError::Transport(e.to_string()))
}

impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch_chunk(&self, peer: &str, file_hash: &str, index: u32) -> Result<Bytes, FetchError> {
        let url = chunk_url(peer, file_hash, index)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .bytes()
                .await
                .map_err(|e| FetchError::Transport(e.to_string())),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            status => Err(FetchError::Status(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_chunk_url() {
        assert_eq!(
            chunk_url("http://10.0.0.1:5001", HASH, 2).unwrap().as_str(),
            format!("http://10.0.0.1:5001/download/{}/2", HASH)
        );
        assert_eq!(
            chunk_url("10.0.0.1:5001", HASH, 0).unwrap().as_str(),
            format!("http://10.0.0.1:5001/download/{}/0", HASH)
        );
    }

    #[test]
    fn test_chunk_url_rejects_bad_peer() {
        assert!(matches!(
            chunk_url("ftp://10.0.0.1:5001", HASH, 0),
            Err(FetchError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_error() {
        let fetcher = HttpChunkFetcher::new(Duration::from_secs(2)).unwrap();
        let result = fetcher.fetch_chunk("127.0.0.1:9", HASH, 0).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
