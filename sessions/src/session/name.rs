//! Cookie name validation.

/// Whether `name` can be used as a cookie name: a non-empty token with no
/// control characters and none of the HTTP separators.
pub fn is_cookie_name_valid(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_byte)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_tokens() {
        for name in ["session", "SID", "my-session_2", "a.b", "x!#$%&'*+^`|~"] {
            assert!(is_cookie_name_valid(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_rejects_separators_and_controls() {
        for name in [
            "", "has space", "semi;colon", "tab\there", "a(b", "a)b", "a<b", "a>b", "a@b", "a,b",
            "a:b", "a\\b", "a\"b", "a/b", "a[b", "a]b", "a?b", "a=b", "a{b", "a}b", "nul\0",
            "del\x7f", "caf\u{e9}",
        ] {
            assert!(!is_cookie_name_valid(name), "{name:?} should be invalid");
        }
    }
}
