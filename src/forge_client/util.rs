//! Shared helpers for the forge-client submodules.

/// Percent-encodes everything except unreserved characters, for embedding a
/// search/query string in a URL's query component.
pub(crate) fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_reserved_characters_when_encoding_then_percent_escaped() {
        assert_eq!(urlencode("is:pr org:acme"), "is%3Apr%20org%3Aacme");
    }

    #[test]
    fn given_unreserved_characters_when_encoding_then_left_untouched() {
        assert_eq!(urlencode("abc-123_x.y~z"), "abc-123_x.y~z");
    }
}
