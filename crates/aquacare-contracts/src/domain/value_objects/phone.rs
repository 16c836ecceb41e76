//! Phone Value Object
//!
//! Customer phone numbers arrive in every shape imaginable: country codes,
//! trunk prefixes, dashes, spaces and trailing remarks such as "(home)".
//! Matching works on the national number, the last ten digits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a national subscriber number.
pub const NATIONAL_DIGITS: usize = 10;

/// Phone number as entered, with its digit-only form cached.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phone {
    raw: String,
    digits: String,
}

impl Phone {
    /// Create a phone number, keeping the raw text for display.
    pub fn new(raw: impl Into<String>) -> Result<Self, PhoneError> {
        let raw = raw.into().trim().to_string();
        let digits = digits_of(&raw);

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        if digits.len() < 7 || digits.len() > 15 {
            return Err(PhoneError::InvalidLength);
        }

        Ok(Self { raw, digits })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Last ten digits, or every digit when the number is shorter.
    pub fn national_number(&self) -> &str {
        national_suffix(&self.digits)
    }

    /// True when both numbers share the same national number.
    pub fn same_line(&self, other: &Phone) -> bool {
        self.national_number() == other.national_number()
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Strip everything that is not an ASCII digit.
pub fn digits_of(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn national_suffix(digits: &str) -> &str {
    if digits.len() > NATIONAL_DIGITS {
        &digits[digits.len() - NATIONAL_DIGITS..]
    } else {
        digits
    }
}

/// Tolerant matcher for stored phone strings.
///
/// A ten-digit national number becomes `d[^0-9]*d[^0-9]*...d[^0-9]*$`, so
/// separators between digits and trailing remarks are ignored while the
/// number must still end the digit sequence. Shorter inputs fall back to a
/// plain suffix match on their digits.
#[derive(Clone, Debug)]
pub struct PhonePattern {
    digits: String,
    regex: Regex,
}

impl PhonePattern {
    /// Build a pattern from raw input. `None` when the input has no digits.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let all = digits_of(raw);
        if all.is_empty() {
            return None;
        }
        let national = national_suffix(&all).to_string();

        let source = if national.len() == NATIONAL_DIGITS {
            let body = national
                .chars()
                .map(String::from)
                .collect::<Vec<_>>()
                .join("[^0-9]*");
            format!("{body}[^0-9]*$")
        } else {
            format!("{}$", regex::escape(&all))
        };

        // Only digits and a fixed character class go into the source.
        let regex = Regex::new(&source).ok()?;
        Some(Self { digits: national, regex })
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn is_fuzzy(&self) -> bool {
        self.digits.len() == NATIONAL_DIGITS
    }

    pub fn is_match(&self, stored: &str) -> bool {
        self.regex.is_match(stored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("Phone number cannot be empty")]
    Empty,
    #[error("Invalid phone number length")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_number_strips_country_code() {
        let phone = Phone::new("+91 98765-43210").unwrap();
        assert_eq!(phone.digits(), "919876543210");
        assert_eq!(phone.national_number(), "9876543210");
    }

    #[test]
    fn test_same_line_ignores_formatting() {
        let a = Phone::new("09876543210").unwrap();
        let b = Phone::new("98765 43210").unwrap();
        assert!(a.same_line(&b));
    }

    #[test]
    fn test_empty_phone() {
        assert!(matches!(Phone::new(" - "), Err(PhoneError::Empty)));
        assert!(matches!(Phone::new("12"), Err(PhoneError::InvalidLength)));
    }

    #[test]
    fn test_fuzzy_pattern_tolerates_noise() {
        let pattern = PhonePattern::from_raw("9876543210").unwrap();
        assert!(pattern.is_fuzzy());
        assert!(pattern.is_match("09876543210 (home)"));
        assert!(pattern.is_match("+91 98765-43210"));
        assert!(pattern.is_match("98 76 54 32 10"));
        assert!(!pattern.is_match("9876543211"));
        assert!(!pattern.is_match("98765432109"));
    }

    #[test]
    fn test_short_number_uses_suffix_match() {
        let pattern = PhonePattern::from_raw("54-321").unwrap();
        assert!(!pattern.is_fuzzy());
        assert!(pattern.is_match("0112254321"));
        assert!(!pattern.is_match("54-321"));
    }

    #[test]
    fn test_no_digits_no_pattern() {
        assert!(PhonePattern::from_raw("n/a").is_none());
    }
}
