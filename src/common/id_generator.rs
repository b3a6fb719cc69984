// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Generates human-readable, prefixed IDs using Crockford Base32 encoding.
//! Format: PREFIX_XXXXXX (e.g., U_K7NP3X for users)
//!
//! - No ambiguous characters (excludes I, L, O, U)
//! - Case-insensitive

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// User (U_)
    User,
    /// Note (N_)
    Note,
    /// One-time code (K_) - K for Key
    OneTimeCode,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Note => "N",
            EntityPrefix::OneTimeCode => "K",
        }
    }

    /// Random characters after the prefix. One-time codes accumulate forever
    /// (they are kept for rate-limit lookback) so they get a wider space.
    fn random_len(&self) -> usize {
        match self {
            EntityPrefix::OneTimeCode => 12,
            _ => 6,
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID using Crockford Base32 encoding
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!(
        "{}_{}",
        prefix.as_str(),
        generate_crockford_string(prefix.random_len())
    )
}

/// Generate a User ID (U_XXXXXX)
pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

/// Generate a Note ID (N_XXXXXX)
pub fn generate_note_id() -> String {
    generate_id(EntityPrefix::Note)
}

/// Generate a one-time code record ID (K_XXXXXXXXXXXX)
pub fn generate_otp_id() -> String {
    generate_id(EntityPrefix::OneTimeCode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_format() {
        let user_id = generate_user_id();
        assert!(user_id.starts_with("U_"));
        assert_eq!(user_id.len(), 8); // "U_" + 6 chars

        let otp_id = generate_otp_id();
        assert!(otp_id.starts_with("K_"));
        assert_eq!(otp_id.len(), 14);
    }

    #[test]
    fn test_crockford_alphabet_only() {
        let id = generate_note_id();
        let random_part = &id[2..];

        for c in random_part.chars() {
            assert!(
                CROCKFORD_ALPHABET.contains(&(c as u8)),
                "Character '{}' not in Crockford alphabet",
                c
            );
        }

        assert!(!random_part.contains('I'));
        assert!(!random_part.contains('L'));
        assert!(!random_part.contains('O'));
        assert!(!random_part.contains('U'));
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = generate_otp_id();
            assert!(ids.insert(id), "Duplicate ID generated");
        }
    }
}
