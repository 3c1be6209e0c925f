use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Merchant,
  Superadmin,
}

impl Role {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "merchant" => Some(Self::Merchant),
      "superadmin" => Some(Self::Superadmin),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Merchant => "merchant",
      Self::Superadmin => "superadmin",
    }
  }
}

/// Billing region, derived from the merchant's country.
/// India pays by UPI, everyone else by WISE transfer against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
  India,
  International,
}

impl Region {
  pub fn from_country(country: &str) -> Self {
    if country.eq_ignore_ascii_case("IN") {
      Self::India
    } else {
      Self::International
    }
  }

  pub fn currency(&self) -> &'static str {
    match self {
      Self::India => "INR",
      Self::International => "USD",
    }
  }
}

/// A portal account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub id: i64,
  pub name: String,
  pub email: String,
  pub business_name: String,
  pub phone: Option<String>,
  /// ISO 3166 alpha-2, upper case
  pub country: String,
  pub region: Region,
  pub role: Role,
  pub created_at: String,
  pub last_login_at: Option<String>,
}

impl User {
  pub fn is_superadmin(&self) -> bool {
    self.role == Role::Superadmin
  }
}
