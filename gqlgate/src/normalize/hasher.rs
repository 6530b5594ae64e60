// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! 64-bit operation identities

use xxhash_rust::xxh64::Xxh64;

/// Identity of a normalized operation: operation name bytes followed by the
/// canonical printed bytes, fed through one streaming hash.
pub fn identity_hash(operation_name: Option<&str>, canonical: &str) -> u64 {
    let mut hasher = Xxh64::new(0);
    if let Some(name) = operation_name {
        hasher.update(name.as_bytes());
    }
    hasher.update(canonical.as_bytes());
    hasher.digest()
}

/// Key of the normalization cache: the raw query text as received, so a hit
/// skips parsing entirely. A separator byte keeps `("ab", "c")` and `("a", "bc")` apart.
pub fn request_key(operation_name: Option<&str>, raw_query: &str) -> u64 {
    let mut hasher = Xxh64::new(0);
    if let Some(name) = operation_name {
        hasher.update(name.as_bytes());
    }
    hasher.update(&[0]);
    hasher.update(raw_query.as_bytes());
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_includes_operation_name() {
        let canonical = "query A { a }";
        assert_ne!(
            identity_hash(Some("A"), canonical),
            identity_hash(None, canonical)
        );
        assert_eq!(
            identity_hash(Some("A"), canonical),
            identity_hash(Some("A"), canonical)
        );
    }

    #[test]
    fn test_identity_is_streamed_concatenation() {
        let whole = xxhash_rust::xxh64::xxh64(b"Aquery A { a }", 0);
        assert_eq!(identity_hash(Some("A"), "query A { a }"), whole);
    }

    #[test]
    fn test_request_key_separates_name_and_query() {
        assert_ne!(request_key(Some("ab"), "c"), request_key(Some("a"), "bc"));
        assert_ne!(request_key(None, "{ a }"), request_key(None, "{a}"));
    }
}
