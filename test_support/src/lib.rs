//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Common recipient and payload fixtures for all crates

use std::collections::HashMap;

/// Generate `n` distinct recipient tokens: `token-0`, `token-1`, ...
pub fn tokens(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("token-{}", i)).collect()
}

/// Minimal key/value payload used across tests
pub fn sample_data() -> HashMap<String, String> {
    HashMap::from([("key".to_string(), "value".to_string())])
}
