// =============================================================================
// Subscriber Token Check
// =============================================================================
//
// The broadcast stream is open unless `TICKSCOPE_SUBSCRIBER_TOKEN` is set, in
// which case clients must pass it as `?token=` on the WebSocket upgrade.
// Comparison is performed in constant time.
// =============================================================================

/// Compare two byte slices in constant time. Returns `true` if they are
/// identical.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // A length mismatch is observable anyway; only the contents are hidden.
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check a presented token against the configured one.
///
/// With no token configured every client is admitted. With one configured, a
/// missing or different token is rejected.
pub fn validate_token(expected: Option<&str>, presented: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => presented
            .map(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
            .unwrap_or(false),
    }
}

// =============================================================================
// Tests
// =============================================================================
