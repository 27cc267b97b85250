//! Public order codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters used for the random part and the checksum of an order code.
pub const CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the day-of-year, random and checksum parts together.
const SUFFIX_LEN: usize = 3 + 2 + 1;

/// Short, human-legible order identifier customers use for tracking.
///
/// Layout: store prefix (up to two uppercase characters), zero-padded
/// day-of-year (3 digits), two random alphanumerics, one checksum character.
/// `AC29207K` for example.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(String);

/// Error returned when a string is not a well-formed order code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed order code: {0:?}")]
pub struct MalformedOrderCode(pub String);

impl OrderCode {
    /// Builds a code from its base (everything but the checksum) by appending
    /// the checksum character.
    pub fn with_checksum(base: &str) -> Self {
        let mut code = String::with_capacity(base.len() + 1);
        code.push_str(base);
        code.push(checksum(base));
        Self(code)
    }

    /// Wraps an already assigned code without validation.
    ///
    /// Used when reading codes back from storage.
    pub fn from_stored(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Parses customer input, normalising case and verifying the checksum.
    pub fn parse(input: &str) -> Result<Self, MalformedOrderCode> {
        let normalised = input.trim().to_uppercase();
        let chars: Vec<char> = normalised.chars().collect();
        let malformed = || MalformedOrderCode(input.to_string());

        if chars.len() < SUFFIX_LEN || chars.len() > SUFFIX_LEN + 2 {
            return Err(malformed());
        }

        let (base, check) = chars.split_at(chars.len() - 1);
        let base: String = base.iter().collect();
        let digits_start = base.chars().count() - (SUFFIX_LEN - 1);
        let day_ok = base
            .chars()
            .skip(digits_start)
            .take(3)
            .all(|c| c.is_ascii_digit());

        if !day_ok || check.first() != Some(&checksum(&base)) {
            return Err(malformed());
        }
        Ok(Self(normalised))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Typo-detecting checksum: the sum of the character codes of `base`,
/// modulo 36, mapped onto [`CODE_ALPHABET`].
pub fn checksum(base: &str) -> char {
    let sum: u64 = base.chars().map(|c| u64::from(u32::from(c))).sum();
    // sum % 36 is always a valid index into a 36-byte alphabet
    let index = (sum % 36) as usize;
    char::from(CODE_ALPHABET[index])
}

impl std::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_char_code_sum() {
        // 'A'(65) + 'C'(67) + '2'(50) + '9'(57) + '2'(50) + '0'(48) + '7'(55) = 392; 392 % 36 = 32 -> 'W'
        assert_eq!(checksum("AC29207"), 'W');
        assert_eq!(OrderCode::with_checksum("AC29207").as_str(), "AC29207W");
    }

    #[test]
    fn parse_accepts_valid_code_in_any_case() {
        let code = OrderCode::with_checksum("AC04251");
        let lower = code.as_str().to_lowercase();
        assert_eq!(OrderCode::parse(&lower).unwrap(), code);
        assert_eq!(OrderCode::parse(&format!("  {code} ")).unwrap(), code);
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        let code = OrderCode::with_checksum("AC04251");
        let mut chars: Vec<char> = code.as_str().chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(OrderCode::parse(&tampered).is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(OrderCode::parse("").is_err());
        assert!(OrderCode::parse("A1").is_err());
        assert!(OrderCode::parse("ABCD0010000").is_err());
    }

    #[test]
    fn parse_accepts_short_store_prefix() {
        let code = OrderCode::with_checksum("X001ZZ");
        assert_eq!(OrderCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn parse_rejects_non_numeric_day() {
        let code = OrderCode::with_checksum("ACX01ZZ");
        assert!(OrderCode::parse(code.as_str()).is_err());
    }
}
