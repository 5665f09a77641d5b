use once_cell::sync::Lazy;
use regex::Regex;

static ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?\d+$").unwrap());

/// Whether `token` is an integer literal, optionally sign-prefixed.
/// Sign and range checks happen later; this only vets the shape of the
/// token.
pub fn is_id_literal(token: &str) -> bool {
    ID_REGEX.is_match(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_integers() {
        assert!(is_id_literal("0"));
        assert!(is_id_literal("42"));
        assert!(is_id_literal("-7"));
        assert!(is_id_literal("+5"));
        assert!(is_id_literal("-0"));
    }

    #[test]
    fn rejects_non_integers() {
        assert!(!is_id_literal(""));
        assert!(!is_id_literal("abc"));
        assert!(!is_id_literal("1.5"));
        assert!(!is_id_literal("1e3"));
        assert!(!is_id_literal("7th"));
        assert!(!is_id_literal("+-3"));
    }
}
