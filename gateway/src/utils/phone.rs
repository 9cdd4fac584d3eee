//! Phone number helpers.

/// Normalize a phone number for lookup.
///
/// Keeps a leading `+` and the digits, dropping spaces, dashes, dots and
/// parentheses. `"+1 (555) 010-0100"` becomes `"+15550100100"`.
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

/// Mask all but the last four digits of a number for logging.
pub fn mask_number(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}
