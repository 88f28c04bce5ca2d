use crate::core::error::ValidationError;

/// Length of a hex-encoded SHA-1 fingerprint
pub const FINGERPRINT_HEX_LEN: usize = 40;

/// Normalize a hex fingerprint to its canonical lowercase form
/// 
/// # Arguments
/// * `hex_str` - 40 hexadecimal characters (0-9, a-f, A-F)
/// 
/// # Returns
/// * `Result<String, ValidationError>` - The lowercase fingerprint or an error if the input is malformed
pub fn normalize_fingerprint(hex_str: &str) -> Result<String, ValidationError> {
    let trimmed = hex_str.trim();

    if trimmed.len() != FINGERPRINT_HEX_LEN {
        return Err(ValidationError::InvalidLength {
            expected: FINGERPRINT_HEX_LEN,
            actual: trimmed.len(),
        });
    }

    if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidHex(trimmed.to_string()));
    }

    Ok(trimmed.to_ascii_lowercase())
}

/// Convert bytes to a hexadecimal string (lowercase)
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fingerprint() {
        let hash = "2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED";
        assert_eq!(
            normalize_fingerprint(hash).unwrap(),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );

        // Surrounding whitespace is ignored
        let padded = format!("  {}\n", hash.to_lowercase());
        assert_eq!(normalize_fingerprint(&padded).unwrap(), hash.to_lowercase());
    }

    #[test]
    fn test_normalize_fingerprint_invalid() {
        assert!(matches!(
            normalize_fingerprint("abc"),
            Err(ValidationError::InvalidLength { expected: 40, actual: 3 })
        ));
        assert!(matches!(
            normalize_fingerprint(&"g".repeat(40)),
            Err(ValidationError::InvalidHex(_))
        ));
        // Path separators must never pass, fingerprints end up in file names
        assert!(normalize_fingerprint(&format!("../{}", "a".repeat(37))).is_err());
        assert!(normalize_fingerprint("").is_err());
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(b"Hello"), "48656c6c6f");
        assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(bytes_to_hex(&[]), "");
    }
}
