//! ISBN-10 / ISBN-13 checksum validation

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static ISBN10_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9}[0-9X]$").expect("static ISBN-10 pattern"));

/// Strip hyphens and spaces
pub fn normalize_isbn(value: &str) -> String {
    value.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

/// Check an ISBN-10 or ISBN-13.
///
/// Blank input counts as valid; whether the field is required is a separate rule.
pub fn is_valid_isbn(value: &str) -> bool {
    if value.trim().is_empty() {
        return true;
    }

    let isbn = normalize_isbn(value);
    match isbn.len() {
        10 => is_valid_isbn10(&isbn),
        13 => is_valid_isbn13(&isbn),
        _ => false,
    }
}

fn is_valid_isbn10(isbn: &str) -> bool {
    if !ISBN10_PATTERN.is_match(isbn) {
        return false;
    }

    let bytes = isbn.as_bytes();
    let mut sum: u32 = bytes[..9]
        .iter()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * (10 - i as u32))
        .sum();

    sum += match bytes[9] {
        b'X' => 10,
        b => u32::from(b - b'0'),
    };

    sum % 11 == 0
}

fn is_valid_isbn13(isbn: &str) -> bool {
    if !isbn.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = isbn.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();

    (10 - sum % 10) % 10 == digits[12]
}

/// `validator` hook for `#[validate(custom(function = ...))]`
pub fn validate_isbn(value: &str) -> Result<(), ValidationError> {
    if is_valid_isbn(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("isbn");
        err.message = Some("must be a valid ISBN-10 or ISBN-13".into());
        Err(err)
    }
}
