//! Mod identifier validation.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[a-z][a-z0-9_-]{1,63}$").unwrap();
}

/// Check if a string is a valid mod identifier.
///
/// Identifiers start with a lowercase letter followed by lowercase letters,
/// digits, `-` or `_`, and are 2 to 64 characters long.
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("ab"));
        assert!(is_valid_identifier("fabric-api"));
        assert!(is_valid_identifier("mod_menu2"));
        assert!(is_valid_identifier(&format!("a{}", "b".repeat(63))));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a"));
        assert!(!is_valid_identifier("Fabric"));
        assert!(!is_valid_identifier("1mod"));
        assert!(!is_valid_identifier("my.mod"));
        assert!(!is_valid_identifier(&format!("a{}", "b".repeat(64))));
    }
}
