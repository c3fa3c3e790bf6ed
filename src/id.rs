//! Short, URL-safe identifiers for content, groups, sessions and tokens.
//!
//! Every id is [`ID_LENGTH`] characters drawn uniformly from a 64-symbol
//! alphabet, giving 72 bits of entropy. Anything a client sends back
//! (path segment, cookie) goes through [`is_valid`] before it reaches a store.

use rand::Rng;

/// Length of every generated id.
pub const ID_LENGTH: usize = 12;

/// URL-safe alphabet ids are drawn from.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Generate a new random id.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// Check that a string could have been produced by [`generate`].
pub fn is_valid(s: &str) -> bool {
    s.len() == ID_LENGTH && s.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..1000 {
            let id = generate();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(is_valid(&id), "{id} should be valid");
        }
    }

    #[test]
    fn test_generated_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..20_000).map(|_| generate()).collect();
        assert_eq!(ids.len(), 20_000);
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(!is_valid(""));
        assert!(!is_valid("abc"));
        assert!(!is_valid("abcdefghijklm"));
    }

    #[test]
    fn test_rejects_foreign_characters() {
        assert!(!is_valid("abcdefghijk/"));
        assert!(!is_valid("abcdefghijk."));
        assert!(!is_valid("abc' OR 1=1-"));
        assert!(!is_valid("ãbcdefghijk"));
    }

    #[test]
    fn test_accepts_full_alphabet() {
        assert!(is_valid("AZaz09_-AZaz"));
    }
}
