use crate::core::error::ValidationError;
use crate::models::file_record::chunk_count;
use crate::models::wire::RegisterRequest;
use crate::utils::hex::normalize_fingerprint;
use url::Url;

/// Largest accepted peer address, in bytes
const MAX_ADDRESS_LEN: usize = 255;

/// A registration whose every field has been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    /// Lowercase hex SHA-1
    pub file_hash: String,
    /// Address as supplied, trimmed
    pub peer_address: String,
    pub file_size: u64,
    pub chunk_size: u64,
}

impl ValidatedRegistration {
    pub fn new(
        file_hash: &str,
        peer_address: &str,
        file_size: u64,
        chunk_size: u64,
    ) -> Result<Self, ValidationError> {
        let file_hash = normalize_fingerprint(file_hash)?;
        let peer_address = validate_peer_address(peer_address)?;
        validate_layout(file_size, chunk_size)?;

        Ok(Self {
            file_hash,
            peer_address,
            file_size,
            chunk_size,
        })
    }

    pub fn num_chunks(&self) -> u64 {
        chunk_count(self.file_size, self.chunk_size)
    }
}

impl RegisterRequest {
    /// Validate a wire registration.
    ///
    /// `chunk_size` falls back to `default_chunk_size` when the client only
    /// sent `num_chunks`; when both are present they must agree.
    pub fn validate(self, default_chunk_size: u64) -> Result<ValidatedRegistration, ValidationError> {
        let file_hash = self
            .file_hash
            .ok_or_else(|| ValidationError::MissingParameter("file_hash".to_string()))?;
        let peer_address = self
            .peer_address
            .ok_or_else(|| ValidationError::MissingParameter("peer_address".to_string()))?;
        let file_size = self
            .file_size
            .ok_or_else(|| ValidationError::MissingParameter("file_size".to_string()))?;

        if self.num_chunks.is_none() && self.chunk_size.is_none() {
            return Err(ValidationError::MissingParameter("num_chunks".to_string()));
        }

        let chunk_size = self.chunk_size.unwrap_or(default_chunk_size);
        let validated = ValidatedRegistration::new(&file_hash, &peer_address, file_size, chunk_size)?;

        if let Some(num_chunks) = self.num_chunks {
            let expected = validated.num_chunks();
            if num_chunks != expected {
                return Err(ValidationError::InvalidFormat(format!(
                    "num_chunks {} does not match {} bytes in {}-byte chunks (expected {})",
                    num_chunks, file_size, chunk_size, expected
                )));
            }
        }

        Ok(validated)
    }
}

/// Check that `size`/`chunk_size` describe a non-empty, indexable file
pub fn validate_layout(size: u64, chunk_size: u64) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::OutOfRange("file_size must be greater than 0".to_string()));
    }

    if chunk_size == 0 {
        return Err(ValidationError::OutOfRange("chunk_size must be greater than 0".to_string()));
    }

    if chunk_count(size, chunk_size) > u32::MAX as u64 {
        return Err(ValidationError::OutOfRange(format!(
            "{} bytes in {}-byte chunks exceeds the maximum chunk count",
            size, chunk_size
        )));
    }

    Ok(())
}

/// Check a peer address and return it trimmed.
///
/// Accepted forms are `host:port` and `http(s)://host[:port][/]`.
pub fn validate_peer_address(address: &str) -> Result<String, ValidationError> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::MissingParameter("peer_address".to_string()));
    }

    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(ValidationError::OutOfRange(format!(
            "peer_address longer than {} bytes",
            MAX_ADDRESS_LEN
        )));
    }

    parse_peer_address(trimmed)?;

    Ok(trimmed.to_string())
}

/// Parse a peer address into the base URL chunk requests are sent to
pub fn parse_peer_address(address: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat(format!("peer_address {}: {}", address, reason));

    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("contains whitespace"));
    }

    let has_scheme = address.contains("://");
    let url = if has_scheme {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{}", address))
    }
    .map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }

    if !has_scheme && url.port().is_none() {
        return Err(invalid("missing port"));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("credentials are not allowed"));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not contain a path, query or fragment"));
    }

    Ok(url)
}
