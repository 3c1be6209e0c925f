//! Mobile number normalisation to E.164.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
  Empty,
  InvalidCharacter(char),
  /// Digit count outside 8..=15 after normalisation
  InvalidLength(usize),
}

impl fmt::Display for PhoneError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Empty => write!(f, "mobile number is empty"),
      Self::InvalidCharacter(c) => write!(f, "unexpected character '{}' in mobile number", c),
      Self::InvalidLength(n) => write!(f, "mobile number must have 8-15 digits, got {}", n),
    }
  }
}

impl std::error::Error for PhoneError {}

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

/// Normalise a user-entered number to `+<country><subscriber>`.
///
/// - spaces, dashes, dots and parentheses are ignored
/// - a `whatsapp:` prefix is ignored
/// - `00` international prefix becomes `+`
/// - 10 digits without prefix are national numbers: `default_cc` is prepended
/// - 11 digits with a leading `0` drop the trunk `0`, then get `default_cc`
pub fn normalize(input: &str, default_cc: &str) -> Result<String, PhoneError> {
  let trimmed = input.trim();
  let trimmed = trimmed.strip_prefix("whatsapp:").unwrap_or(trimmed).trim();
  if trimmed.is_empty() {
    return Err(PhoneError::Empty);
  }

  let mut has_plus = false;
  let mut digits = String::with_capacity(trimmed.len());
  for (i, c) in trimmed.chars().enumerate() {
    match c {
      '0'..='9' => digits.push(c),
      '+' if i == 0 => has_plus = true,
      ' ' | '-' | '.' | '(' | ')' => {}
      other => return Err(PhoneError::InvalidCharacter(other)),
    }
  }
  if digits.is_empty() {
    return Err(PhoneError::Empty);
  }

  let full = if has_plus {
    digits
  } else if let Some(rest) = digits.strip_prefix("00") {
    rest.to_string()
  } else if digits.len() == 10 {
    format!("{}{}", default_cc, digits)
  } else if digits.len() == 11 && digits.starts_with('0') {
    format!("{}{}", default_cc, &digits[1..])
  } else {
    digits
  };

  if !(MIN_DIGITS..=MAX_DIGITS).contains(&full.len()) || full.starts_with('0') {
    return Err(PhoneError::InvalidLength(full.len()));
  }
  Ok(format!("+{}", full))
}

/// Twilio WhatsApp address for an E.164 number
pub fn whatsapp_address(e164: &str) -> String {
  format!("whatsapp:{}", e164)
}
