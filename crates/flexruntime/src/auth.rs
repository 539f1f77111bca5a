use subtle::ConstantTimeEq;

/// Check an `Authorization` header against the shared API secret.
///
/// The token comparison is constant-time. An empty secret never matches.
pub fn verify_bearer(header: Option<&str>, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => bool::from(token.trim().as_bytes().ct_eq(secret.as_bytes())),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_secret() {
        assert!(verify_bearer(Some("Bearer s3cret"), "s3cret"));
    }

    #[test]
    fn rejects_wrong_or_missing_token() {
        assert!(!verify_bearer(Some("Bearer nope"), "s3cret"));
        assert!(!verify_bearer(Some("s3cret"), "s3cret"));
        assert!(!verify_bearer(None, "s3cret"));
        assert!(!verify_bearer(Some("Bearer "), ""));
    }
}
