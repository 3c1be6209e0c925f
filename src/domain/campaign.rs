use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
  Sending,
  Completed,
  Failed,
}

impl CampaignStatus {
  pub fn from_str(s: &str) -> Self {
    match s {
      "completed" => Self::Completed,
      "failed" => Self::Failed,
      _ => Self::Sending,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sending => "sending",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  /// Final status once every recipient has been attempted
  pub fn settled(sent: i64) -> Self {
    if sent > 0 { Self::Completed } else { Self::Failed }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
  Sent,
  Failed,
}

impl MessageStatus {
  pub fn from_str(s: &str) -> Self {
    match s {
      "sent" => Self::Sent,
      _ => Self::Failed,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sent => "sent",
      Self::Failed => "failed",
    }
  }
}

/// One WhatsApp send operation, metered against the monthly limit.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
  pub id: i64,
  pub user_id: i64,
  pub promotion_id: Option<i64>,
  pub body: String,
  pub media_url: Option<String>,
  pub recipient_count: i64,
  pub sent_count: i64,
  pub failed_count: i64,
  pub skipped_count: i64,
  pub status: CampaignStatus,
  pub created_at: String,
  pub completed_at: Option<String>,
}

/// Outcome of a single recipient within a campaign
#[derive(Debug, Clone, Serialize)]
pub struct MessageLog {
  pub id: i64,
  pub campaign_id: i64,
  pub contact_id: Option<i64>,
  pub mobile_number: String,
  pub status: MessageStatus,
  pub provider_sid: Option<String>,
  pub error: Option<String>,
  pub created_at: String,
}
