//! API key validation for the HTTP boundary.
//!
//! Keys arrive in the `X-API-Key` header and are compared in constant time.

/// Validates a provided API key against the expected key using constant-time comparison.
///
/// This prevents timing attacks by ensuring the comparison takes the same amount
/// of time regardless of where (or if) the keys differ.
///
/// Returns `false` if either key is empty.
pub fn validate_api_key(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    // Empty keys are never valid
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    // Length mismatch - still compare to maintain constant time
    // We compare all bytes of the shorter string, then account for length diff
    let len_match = provided.len() == expected.len();

    // XOR accumulator: if any byte differs, result will be non-zero
    let mut diff: u8 = 0;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }

    // Both conditions must be true: same length AND all bytes match
    len_match && diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key_matching() {
        assert!(validate_api_key("secret123", "secret123"));
        assert!(validate_api_key("a", "a"));
        assert!(validate_api_key(
            "very-long-key-with-special-chars!@#$%",
            "very-long-key-with-special-chars!@#$%"
        ));
    }

    #[test]
    fn test_validate_api_key_mismatch() {
        assert!(!validate_api_key("secret123", "secret124"));
        assert!(!validate_api_key("secret123", "SECRET123"));
        assert!(!validate_api_key("short", "longer"));
        assert!(!validate_api_key("longer", "short"));
    }

    #[test]
    fn test_validate_api_key_empty() {
        assert!(!validate_api_key("", ""));
        assert!(!validate_api_key("", "secret"));
        assert!(!validate_api_key("secret", ""));
    }
}
