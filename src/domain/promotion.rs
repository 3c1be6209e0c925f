use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Promotion {
  pub id: i64,
  pub user_id: i64,
  pub title: String,
  pub description: String,
  /// Free text such as "20% off" or "Buy 1 get 1"
  pub discount: Option<String>,
  pub image_url: Option<String>,
  /// YYYY-MM-DD
  pub start_date: Option<String>,
  /// YYYY-MM-DD
  pub end_date: Option<String>,
  pub is_active: bool,
  pub created_at: String,
  pub updated_at: String,
}

impl Promotion {
  /// Human readable validity window, if any bound is set.
  pub fn validity(&self) -> Option<String> {
    match (&self.start_date, &self.end_date) {
      (Some(start), Some(end)) => Some(format!("Valid {} to {}", start, end)),
      (Some(start), None) => Some(format!("Valid from {}", start)),
      (None, Some(end)) => Some(format!("Valid until {}", end)),
      (None, None) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn promo(start: Option<&str>, end: Option<&str>) -> Promotion {
    Promotion {
      id: 1,
      user_id: 1,
      title: "Diwali sale".to_string(),
      description: String::new(),
      discount: None,
      image_url: None,
      start_date: start.map(String::from),
      end_date: end.map(String::from),
      is_active: true,
      created_at: String::new(),
      updated_at: String::new(),
    }
  }

  #[test]
  fn test_validity_variants() {
    assert_eq!(
      promo(Some("2026-11-01"), Some("2026-11-05")).validity().as_deref(),
      Some("Valid 2026-11-01 to 2026-11-05")
    );
    assert_eq!(promo(Some("2026-11-01"), None).validity().as_deref(), Some("Valid from 2026-11-01"));
    assert_eq!(promo(None, Some("2026-11-05")).validity().as_deref(), Some("Valid until 2026-11-05"));
    assert_eq!(promo(None, None).validity(), None);
  }
}
