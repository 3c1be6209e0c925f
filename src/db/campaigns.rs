//! Campaign rows and their per-recipient message log.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::now_str;
use crate::domain::{Campaign, CampaignStatus, MessageLog, MessageStatus};

/// Default page size for campaign listings
pub const CAMPAIGN_LIST_LIMIT: i64 = 100;

const CAMPAIGN_COLUMNS: &str = "id, user_id, promotion_id, body, media_url, recipient_count, \
  sent_count, failed_count, skipped_count, status, created_at, completed_at";

pub(crate) fn map_campaign(row: &Row) -> Result<Campaign> {
  let status: String = row.get(9)?;
  Ok(Campaign {
    id: row.get(0)?,
    user_id: row.get(1)?,
    promotion_id: row.get(2)?,
    body: row.get(3)?,
    media_url: row.get(4)?,
    recipient_count: row.get(5)?,
    sent_count: row.get(6)?,
    failed_count: row.get(7)?,
    skipped_count: row.get(8)?,
    status: CampaignStatus::from_str(&status),
    created_at: row.get(10)?,
    completed_at: row.get(11)?,
  })
}

pub struct NewCampaign<'a> {
  pub user_id: i64,
  pub promotion_id: Option<i64>,
  pub body: &'a str,
  pub media_url: Option<&'a str>,
  pub recipient_count: i64,
  pub skipped_count: i64,
}

/// Record a campaign in `sending` state. From here on it counts against the monthly limit.
pub fn create_campaign(conn: &Connection, campaign: &NewCampaign) -> Result<i64> {
  conn.execute(
    r#"INSERT INTO campaigns
       (user_id, promotion_id, body, media_url, recipient_count, skipped_count, status, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
    params![
      campaign.user_id,
      campaign.promotion_id,
      campaign.body,
      campaign.media_url,
      campaign.recipient_count,
      campaign.skipped_count,
      CampaignStatus::Sending.as_str(),
      now_str(),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn log_message(
  conn: &Connection,
  campaign_id: i64,
  contact_id: Option<i64>,
  mobile_number: &str,
  status: MessageStatus,
  provider_sid: Option<&str>,
  error: Option<&str>,
) -> Result<i64> {
  conn.execute(
    r#"INSERT INTO message_logs (campaign_id, contact_id, mobile_number, status, provider_sid, error, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    params![campaign_id, contact_id, mobile_number, status.as_str(), provider_sid, error, now_str()],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Store final counts and status
pub fn finish_campaign(conn: &Connection, id: i64, sent: i64, failed: i64) -> Result<CampaignStatus> {
  let status = CampaignStatus::settled(sent);
  conn.execute(
    r#"UPDATE campaigns SET sent_count = ?2, failed_count = ?3, status = ?4, completed_at = ?5
       WHERE id = ?1"#,
    params![id, sent, failed, status.as_str(), now_str()],
  )?;
  Ok(status)
}

/// Campaigns a user created at or after `since` (a db timestamp)
pub fn count_campaigns_since(conn: &Connection, user_id: i64, since: &str) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM campaigns WHERE user_id = ?1 AND created_at >= ?2",
    params![user_id, since],
    |row| row.get(0),
  )
}

pub fn list_campaigns(conn: &Connection, user_id: i64, limit: i64) -> Result<Vec<Campaign>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM campaigns WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
    CAMPAIGN_COLUMNS
  ))?;
  let campaigns = stmt
    .query_map(params![user_id, limit], map_campaign)?
    .collect::<Result<Vec<_>>>()?;
  Ok(campaigns)
}

pub fn get_campaign(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Campaign>> {
  conn
    .query_row(
      &format!("SELECT {} FROM campaigns WHERE id = ?1 AND user_id = ?2", CAMPAIGN_COLUMNS),
      params![id, user_id],
      map_campaign,
    )
    .optional()
}

pub fn list_message_logs(conn: &Connection, campaign_id: i64) -> Result<Vec<MessageLog>> {
  let mut stmt = conn.prepare(
    r#"SELECT id, campaign_id, contact_id, mobile_number, status, provider_sid, error, created_at
       FROM message_logs WHERE campaign_id = ?1 ORDER BY id"#,
  )?;
  let logs = stmt
    .query_map(params![campaign_id], |row| {
      let status: String = row.get(4)?;
      Ok(MessageLog {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        mobile_number: row.get(3)?,
        status: MessageStatus::from_str(&status),
        provider_sid: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(logs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;

  fn new_campaign(user_id: i64) -> NewCampaign<'static> {
    NewCampaign {
      user_id,
      promotion_id: None,
      body: "Hello",
      media_url: None,
      recipient_count: 2,
      skipped_count: 1,
    }
  }

  #[test]
  fn test_campaign_lifecycle() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let id = create_campaign(&env.conn, &new_campaign(user)).unwrap();

    let c = get_campaign(&env.conn, user, id).unwrap().unwrap();
    assert_eq!(c.status, CampaignStatus::Sending);
    assert_eq!(c.skipped_count, 1);

    log_message(&env.conn, id, None, "+911111111111", MessageStatus::Sent, Some("SM1"), None).unwrap();
    log_message(&env.conn, id, None, "+912222222222", MessageStatus::Failed, None, Some("bad")).unwrap();
    assert_eq!(finish_campaign(&env.conn, id, 1, 1).unwrap(), CampaignStatus::Completed);

    let c = get_campaign(&env.conn, user, id).unwrap().unwrap();
    assert_eq!((c.sent_count, c.failed_count), (1, 1));
    assert!(c.completed_at.is_some());

    let logs = list_message_logs(&env.conn, id).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].provider_sid.as_deref(), Some("SM1"));
    assert_eq!(logs[1].status, MessageStatus::Failed);
  }

  #[test]
  fn test_all_failed_campaign_is_failed() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let id = create_campaign(&env.conn, &new_campaign(user)).unwrap();
    assert_eq!(finish_campaign(&env.conn, id, 0, 2).unwrap(), CampaignStatus::Failed);
  }

  #[test]
  fn test_count_since_and_scoping() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let other = env.add_merchant("b@example.com");
    create_campaign(&env.conn, &new_campaign(user)).unwrap();
    create_campaign(&env.conn, &new_campaign(user)).unwrap();
    let foreign = create_campaign(&env.conn, &new_campaign(other)).unwrap();

    // Backdate one campaign into the previous year
    env
      .conn
      .execute("UPDATE campaigns SET created_at = '2000-01-15T00:00:00Z' WHERE id = 1", [])
      .unwrap();

    assert_eq!(count_campaigns_since(&env.conn, user, "2001-01-01T00:00:00Z").unwrap(), 1);
    assert_eq!(count_campaigns_since(&env.conn, user, "1999-01-01T00:00:00Z").unwrap(), 2);
    assert!(get_campaign(&env.conn, user, foreign).unwrap().is_none());
    assert_eq!(list_campaigns(&env.conn, user, 10).unwrap().len(), 2);
  }
}
