use serde::{Deserialize, Serialize};

/// Body of `POST /register`
///
/// Every field is optional at the serde level so that missing fields are
/// reported as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub peer_address: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub num_chunks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

/// Body of a successful `GET /query/{file_hash}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub peers: Vec<String>,
    pub file_size: u64,
    pub num_chunks: u32,
    pub chunk_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_tolerates_missing_fields() {
        let req: RegisterRequest = serde_json::from_str(r#"{"file_hash": "abc"}"#).unwrap();
        assert_eq!(req.file_hash.as_deref(), Some("abc"));
        assert!(req.peer_address.is_none());
        assert!(req.file_size.is_none());
    }

    #[test]
    fn test_register_request_omits_absent_chunk_size() {
        let req = RegisterRequest {
            file_hash: Some("abc".into()),
            peer_address: Some("http://127.0.0.1:5001".into()),
            file_size: Some(10),
            num_chunks: Some(1),
            chunk_size: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("chunk_size").is_none());
        assert_eq!(json["num_chunks"], 1);
    }
}
