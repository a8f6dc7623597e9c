//! Client-side validation and sanitization of outgoing text

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;

pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Script-injection shapes rejected outright
static DANGEROUS_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)javascript:|data:|vbscript:|on\w+\s*=|expression\s*\(|eval\s*\(")
        .expect("denylist pattern is valid")
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,15}$").expect("phone pattern is valid"));

pub fn contains_dangerous_pattern(input: &str) -> bool {
    DANGEROUS_PATTERNS.is_match(input)
}

/// Strip control characters, escape angle brackets and trim
pub fn sanitize_content(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

/// Validate a draft and return the sanitized text to send
pub fn validate_message(input: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::TooLong { max: max_len });
    }
    if contains_dangerous_pattern(trimmed) {
        return Err(ValidationError::Forbidden);
    }

    let sanitized = sanitize_content(trimmed);
    if sanitized.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(sanitized)
}

/// Accept 10 to 15 digits; spaces, dashes, dots, parentheses and a leading `+` are ignored
pub fn validate_phone(input: &str) -> Result<String, ValidationError> {
    let digits: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '+'))
        .collect();
    if PHONE.is_match(&digits) {
        Ok(digits)
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(validate_message("", 1000), Err(ValidationError::Empty));
        assert_eq!(validate_message("   \n\t ", 1000), Err(ValidationError::Empty));
        assert_eq!(validate_message("\u{0001}\u{0002}", 1000), Err(ValidationError::Empty));
    }

    #[test]
    fn test_rejects_too_long() {
        let long = "a".repeat(1001);
        assert_eq!(
            validate_message(&long, 1000),
            Err(ValidationError::TooLong { max: 1000 })
        );
        assert!(validate_message(&"a".repeat(1000), 1000).is_ok());
        // Length counts characters, not bytes
        assert!(validate_message(&"é".repeat(1000), 1000).is_ok());
    }

    #[test]
    fn test_rejects_denylisted_content() {
        for input in [
            "click javascript:alert(1)",
            "DATA:text/html;base64,xx",
            "vbscript:msgbox",
            "<img onerror = run()>",
            "width: expression (1)",
            "eval(code)",
        ] {
            assert_eq!(
                validate_message(input, 1000),
                Err(ValidationError::Forbidden),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_sanitizes_markup_and_control_chars() {
        assert_eq!(
            validate_message("  <b>hi</b>\u{0007} ", 1000).unwrap(),
            "&lt;b&gt;hi&lt;/b&gt;"
        );
        assert_eq!(sanitize_content("a\u{009F}b"), "ab");
    }

    #[test]
    fn test_plain_text_passes() {
        assert_eq!(validate_message("Olá, tudo bem?", 1000).unwrap(), "Olá, tudo bem?");
        assert_eq!(validate_message("see you on monday", 1000).unwrap(), "see you on monday");
    }

    #[test]
    fn test_phone_validation() {
        assert_eq!(validate_phone("5511999998888").unwrap(), "5511999998888");
        assert_eq!(validate_phone("+55 (11) 99999-8888").unwrap(), "5511999998888");
        assert_eq!(validate_phone("123"), Err(ValidationError::InvalidPhone));
        assert_eq!(validate_phone("55119999988887777"), Err(ValidationError::InvalidPhone));
        assert_eq!(validate_phone("55abc99999888"), Err(ValidationError::InvalidPhone));
    }
}
