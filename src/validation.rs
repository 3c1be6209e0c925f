//! Request field validation.
//!
//! Handlers collect every problem with a [`Validator`] and reject the request
//! once with all field errors, so forms can highlight each bad input.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field: &'static str,
  pub message: String,
}

/// Accumulates field errors
#[derive(Debug, Default)]
pub struct Validator {
  errors: Vec<FieldError>,
}

impl Validator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `message` for `field` unless `ok`
  pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) -> &mut Self {
    if !ok {
      self.errors.push(FieldError {
        field,
        message: message.into(),
      });
    }
    self
  }

  /// Length bounds in characters (not bytes)
  pub fn length(&mut self, value: &str, field: &'static str, min: usize, max: usize) -> &mut Self {
    let len = value.chars().count();
    let message = if min > 0 && len == 0 {
      format!("{} is required", field)
    } else {
      format!("{} must be between {} and {} characters", field, min, max)
    };
    self.check((min..=max).contains(&len), field, message)
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn finish(self) -> Result<(), Vec<FieldError>> {
    if self.errors.is_empty() {
      Ok(())
    } else {
      Err(self.errors)
    }
  }
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
  if email.len() > 254 || email.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
    && !domain.contains("..")
}

/// Normalised form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
  email.trim().to_ascii_lowercase()
}

/// ISO 3166 alpha-2 shape (two ASCII letters)
pub fn is_valid_country(country: &str) -> bool {
  country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parse `YYYY-MM-DD`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// UPI transaction reference (UTR): 10-35 ASCII alphanumerics
pub fn is_valid_transaction_id(value: &str) -> bool {
  (10..=35).contains(&value.len()) && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Promotion images are either our own uploads or absolute http(s) URLs
pub fn is_valid_image_url(value: &str) -> bool {
  value.len() <= 2048
    && !value.chars().any(char::is_whitespace)
    && (value.starts_with("/uploads/") || value.starts_with("https://") || value.starts_with("http://"))
}

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length; Argon2 input is bounded to keep hashing cheap
pub const MAX_PASSWORD_LEN: usize = 128;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_valid_emails() {
    assert!(is_valid_email("asha@example.com"));
    assert!(is_valid_email("a.b+promo@shop.co.in"));
  }

  #[test]
  fn test_invalid_emails() {
    assert!(!is_valid_email(""));
    assert!(!is_valid_email("asha"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("asha@localhost"));
    assert!(!is_valid_email("asha@@example.com"));
    assert!(!is_valid_email("asha @example.com"));
    assert!(!is_valid_email("asha@example..com"));
    assert!(!is_valid_email("asha@.example.com"));
  }

  #[test]
  fn test_normalize_email() {
    assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
  }

  #[test]
  fn test_country() {
    assert!(is_valid_country("IN"));
    assert!(is_valid_country("gb"));
    assert!(!is_valid_country("IND"));
    assert!(!is_valid_country("1N"));
  }

  #[test]
  fn test_parse_date() {
    assert!(parse_date("2026-10-17").is_some());
    assert!(parse_date("2026-02-30").is_none());
    assert!(parse_date("17/10/2026").is_none());
  }

  #[test]
  fn test_transaction_id() {
    assert!(is_valid_transaction_id("123456789012"));
    assert!(is_valid_transaction_id("AXISN12345678901"));
    assert!(!is_valid_transaction_id("12345"));
    assert!(!is_valid_transaction_id("1234-5678-9012"));
    assert!(!is_valid_transaction_id(&"1".repeat(36)));
  }

  #[test]
  fn test_image_url() {
    assert!(is_valid_image_url("/uploads/3/abc.png"));
    assert!(is_valid_image_url("https://cdn.example.com/a.jpg"));
    assert!(!is_valid_image_url("javascript:alert(1)"));
    assert!(!is_valid_image_url("/etc/passwd"));
  }

  #[test]
  fn test_validator_collects_all_errors() {
    let mut v = Validator::new();
    v.length("", "title", 1, 120)
      .length("ok", "description", 0, 10)
      .check(false, "end_date", "end_date must not be before start_date");
    let errors = v.finish().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].field, "title");
    assert_eq!(errors[0].message, "title is required");
    assert_eq!(errors[1].field, "end_date");
  }

  #[test]
  fn test_validator_counts_characters() {
    let mut v = Validator::new();
    v.length("दिवाली", "title", 1, 6);
    assert!(v.is_empty());
  }
}
