//! API key secret generation and comparison

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Minimum number of random bytes behind every issued secret.
pub const MIN_SECRET_BYTES: usize = 32;

/// Generate a URL-safe bearer token from `num_bytes` bytes of OS randomness.
///
/// The output is unpadded base64url, so 32 bytes yield a 43 character token.
/// Requests below [`MIN_SECRET_BYTES`] are raised to the minimum.
pub fn generate_api_key(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes.max(MIN_SECRET_BYTES)];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Compare two secrets without short-circuiting on the first differing byte.
///
/// Unequal lengths return early; only the length can leak.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key(32);

        assert_eq!(key.len(), 43);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(URL_SAFE_NO_PAD.decode(&key).unwrap().len(), 32);
    }

    #[test]
    fn short_lengths_are_raised_to_minimum() {
        let key = generate_api_key(4);
        assert_eq!(URL_SAFE_NO_PAD.decode(&key).unwrap().len(), MIN_SECRET_BYTES);
    }

    #[test]
    fn generated_keys_do_not_collide() {
        let keys: HashSet<String> = (0..10_000).map(|_| generate_api_key(32)).collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn constant_time_eq_matches_equality() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
