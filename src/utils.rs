/// CSS selector for elements tagged with a `data-testid` attribute
pub fn test_id(id: &str) -> String {
    format!("[data-testid=\"{}\"]", id.replace('"', "\\\""))
}

/// Collapse runs of whitespace (including newlines) into single spaces and trim
pub fn squish_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_id() {
        assert_eq!(test_id("product_title"), "[data-testid=\"product_title\"]");
    }

    #[test]
    fn test_squish_whitespace() {
        assert_eq!(squish_whitespace("  $120\n\t  USD "), "$120 USD");
        assert_eq!(squish_whitespace("\n \n"), "");
    }
}
