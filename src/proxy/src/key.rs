//! Opaque API key generation and validation (§3 `ProxySite.api_key`, §4.6
//! step 1, §8 invariant 4: `^wts_[A-Za-z0-9]{40}$`).

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

const PREFIX: &str = "wts_";
const BODY_LEN: usize = 40;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub static API_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^wts_[A-Za-z0-9]{40}$").unwrap());

/// Generates a fresh opaque API key matching [`API_KEY_RE`].
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..BODY_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{PREFIX}{body}")
}

/// Extracts a bearer token matching `wts_[A-Za-z0-9]{40}` from an
/// `Authorization: Bearer <token>` header value (§4.6 step 1).
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if API_KEY_RE.is_match(token) {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_match_the_contract_regex() {
        for _ in 0..50 {
            let key = generate();
            assert!(API_KEY_RE.is_match(&key), "{key} did not match contract regex");
        }
    }

    #[test]
    fn extract_bearer_rejects_malformed_tokens() {
        assert_eq!(extract_bearer("Bearer not-a-key"), None);
        assert_eq!(extract_bearer("Basic wts_abc"), None);
    }

    #[test]
    fn extract_bearer_accepts_well_formed_token() {
        let key = generate();
        let header = format!("Bearer {key}");
        assert_eq!(extract_bearer(&header), Some(key.as_str()));
    }
}
