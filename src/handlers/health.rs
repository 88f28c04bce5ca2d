use crate::utils::time::current_timestamp;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
}

/// GET /health, served by trackers and peers alike
pub async fn health_handler() -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".to_string(),
        timestamp: current_timestamp(),
    };

    (StatusCode::OK, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_health_reports_ok_with_timestamp() {
        let (parts, body) = health_handler().await.into_response().into_parts();
        assert_eq!(parts.status, StatusCode::OK);

        let bytes = Body::new(body).collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(health.status, "ok");
        assert!(health.timestamp > 0);
    }
}
