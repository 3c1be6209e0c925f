use serde::Serialize;

use super::Region;

/// Plan id every merchant falls back to without an active subscription
pub const FREE_PLAN_ID: &str = "free";

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
  pub id: String,
  pub name: String,
  pub monthly_campaign_limit: i64,
  pub max_contacts: i64,
  /// Paise
  pub price_inr: i64,
  /// Cents
  pub price_usd: i64,
  pub sort_order: i64,
}

impl Plan {
  pub fn is_free(&self) -> bool {
    self.price_inr == 0 && self.price_usd == 0
  }

  /// Price in minor units and currency code for a billing region
  pub fn price_for(&self, region: Region) -> (i64, &'static str) {
    match region {
      Region::India => (self.price_inr, "INR"),
      Region::International => (self.price_usd, "USD"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
  Active,
  Cancelled,
}

impl SubscriptionStatus {
  pub fn from_str(s: &str) -> Self {
    match s {
      "active" => Self::Active,
      _ => Self::Cancelled,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Cancelled => "cancelled",
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
  pub id: i64,
  pub user_id: i64,
  pub plan_id: String,
  pub status: SubscriptionStatus,
  pub payment_id: Option<i64>,
  pub started_at: String,
  pub expires_at: String,
  pub cancelled_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Upi,
  Wise,
}

impl PaymentMethod {
  pub fn for_region(region: Region) -> Self {
    match region {
      Region::India => Self::Upi,
      Region::International => Self::Wise,
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "upi" => Some(Self::Upi),
      "wise" => Some(Self::Wise),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Upi => "upi",
      Self::Wise => "wise",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Approved,
  Rejected,
}

impl PaymentStatus {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "pending" => Some(Self::Pending),
      "approved" => Some(Self::Approved),
      "rejected" => Some(Self::Rejected),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }
}

/// A manually settled payment: UPI transaction reference or WISE invoice.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
  pub id: i64,
  pub user_id: i64,
  pub plan_id: String,
  pub method: PaymentMethod,
  /// Minor units
  pub amount: i64,
  pub currency: String,
  /// UPI transaction id (UTR)
  pub transaction_ref: Option<String>,
  pub invoice_number: Option<String>,
  pub status: PaymentStatus,
  pub note: Option<String>,
  pub created_at: String,
  pub reviewed_at: Option<String>,
  pub reviewed_by: Option<i64>,
}

/// Format minor units as a decimal amount, e.g. 99900 INR -> "₹999.00"
pub fn format_amount(minor: i64, currency: &str) -> String {
  let symbol = match currency {
    "INR" => "₹",
    "USD" => "$",
    _ => "",
  };
  let sign = if minor < 0 { "-" } else { "" };
  let abs = minor.unsigned_abs();
  let formatted = format!("{}{}{}.{:02}", sign, symbol, abs / 100, abs % 100);
  if symbol.is_empty() {
    format!("{} {}", formatted, currency)
  } else {
    formatted
  }
}
