//! Cross-tenant aggregate queries for the superadmin reports.

use rusqlite::{params, Connection, Result};
use serde::Serialize;
use std::collections::HashMap;

use super::now_str;
use crate::domain::Campaign;

#[derive(Debug, Clone, Serialize)]
pub struct Revenue {
  pub currency: String,
  /// Minor units
  pub amount: i64,
  pub payments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
  pub merchants: i64,
  pub superadmins: i64,
  pub active_paid_subscriptions: i64,
  pub campaigns_total: i64,
  pub campaigns_this_month: i64,
  pub messages_sent: i64,
  pub messages_failed: i64,
  pub contacts_total: i64,
  pub contacts_opted_in: i64,
  pub pending_payments: i64,
  pub revenue: Vec<Revenue>,
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
  conn.query_row(sql, [], |row| row.get(0))
}

/// Headline numbers. `month_start` is the db timestamp of the current month's first instant.
pub fn overview(conn: &Connection, month_start: &str) -> Result<Overview> {
  let campaigns_this_month = conn.query_row(
    "SELECT COUNT(*) FROM campaigns WHERE created_at >= ?1",
    params![month_start],
    |row| row.get(0),
  )?;
  let active_paid_subscriptions = conn.query_row(
    r#"SELECT COUNT(DISTINCT s.user_id) FROM subscriptions s
       JOIN plans p ON p.id = s.plan_id
       WHERE s.status = 'active' AND s.expires_at > ?1 AND (p.price_inr > 0 OR p.price_usd > 0)"#,
    params![now_str()],
    |row| row.get(0),
  )?;

  let mut stmt = conn.prepare(
    r#"SELECT currency, COALESCE(SUM(amount), 0), COUNT(*) FROM payments
       WHERE status = 'approved' GROUP BY currency ORDER BY currency"#,
  )?;
  let revenue = stmt
    .query_map([], |row| {
      Ok(Revenue {
        currency: row.get(0)?,
        amount: row.get(1)?,
        payments: row.get(2)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;

  Ok(Overview {
    merchants: count(conn, "SELECT COUNT(*) FROM users WHERE role = 'merchant'")?,
    superadmins: count(conn, "SELECT COUNT(*) FROM users WHERE role = 'superadmin'")?,
    active_paid_subscriptions,
    campaigns_total: count(conn, "SELECT COUNT(*) FROM campaigns")?,
    campaigns_this_month,
    messages_sent: count(conn, "SELECT COUNT(*) FROM message_logs WHERE status = 'sent'")?,
    messages_failed: count(conn, "SELECT COUNT(*) FROM message_logs WHERE status = 'failed'")?,
    contacts_total: count(conn, "SELECT COUNT(*) FROM contacts")?,
    contacts_opted_in: count(conn, "SELECT COUNT(*) FROM contacts WHERE opted_in = 1")?,
    pending_payments: count(conn, "SELECT COUNT(*) FROM payments WHERE status = 'pending'")?,
    revenue,
  })
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantUsage {
  pub id: i64,
  pub name: String,
  pub business_name: String,
  pub email: String,
  pub country: String,
  pub plan_id: String,
  pub campaigns_this_month: i64,
  pub campaigns_total: i64,
  pub messages_sent: i64,
  pub contacts: i64,
  pub joined_at: String,
  pub last_login_at: Option<String>,
}

/// Per-merchant usage, newest merchants first
pub fn merchant_usage(conn: &Connection, month_start: &str) -> Result<Vec<MerchantUsage>> {
  let mut stmt = conn.prepare(
    r#"SELECT u.id, u.name, u.business_name, u.email, u.country,
         COALESCE((SELECT s.plan_id FROM subscriptions s
                   WHERE s.user_id = u.id AND s.status = 'active' AND s.expires_at > ?2
                   ORDER BY s.expires_at DESC LIMIT 1), 'free'),
         (SELECT COUNT(*) FROM campaigns c WHERE c.user_id = u.id AND c.created_at >= ?1),
         (SELECT COUNT(*) FROM campaigns c WHERE c.user_id = u.id),
         (SELECT COUNT(*) FROM message_logs m JOIN campaigns c ON c.id = m.campaign_id
            WHERE c.user_id = u.id AND m.status = 'sent'),
         (SELECT COUNT(*) FROM contacts ct WHERE ct.user_id = u.id),
         u.created_at, u.last_login_at
       FROM users u
       WHERE u.role = 'merchant'
       ORDER BY u.created_at DESC, u.id DESC"#,
  )?;
  let rows = stmt
    .query_map(params![month_start, now_str()], |row| {
      Ok(MerchantUsage {
        id: row.get(0)?,
        name: row.get(1)?,
        business_name: row.get(2)?,
        email: row.get(3)?,
        country: row.get(4)?,
        plan_id: row.get(5)?,
        campaigns_this_month: row.get(6)?,
        campaigns_total: row.get(7)?,
        messages_sent: row.get(8)?,
        contacts: row.get(9)?,
        joined_at: row.get(10)?,
        last_login_at: row.get(11)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReportRow {
  #[serde(flatten)]
  pub campaign: Campaign,
  pub merchant_email: String,
  pub business_name: String,
}

/// Maximum rows returned by the campaign report
pub const CAMPAIGN_REPORT_LIMIT: i64 = 500;

/// Campaigns across tenants with `from <= created_at < to_exclusive`, newest first
pub fn campaigns_between(conn: &Connection, from: &str, to_exclusive: &str) -> Result<Vec<CampaignReportRow>> {
  let mut stmt = conn.prepare(
    r#"SELECT c.id, c.user_id, c.promotion_id, c.body, c.media_url, c.recipient_count,
         c.sent_count, c.failed_count, c.skipped_count, c.status, c.created_at, c.completed_at,
         u.email, u.business_name
       FROM campaigns c JOIN users u ON u.id = c.user_id
       WHERE c.created_at >= ?1 AND c.created_at < ?2
       ORDER BY c.created_at DESC, c.id DESC
       LIMIT ?3"#,
  )?;
  let rows = stmt
    .query_map(params![from, to_exclusive, CAMPAIGN_REPORT_LIMIT], |row| {
      Ok(CampaignReportRow {
        campaign: super::campaigns::map_campaign(row)?,
        merchant_email: row.get(12)?,
        business_name: row.get(13)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyUsage {
  /// YYYY-MM
  pub month: String,
  pub campaigns: i64,
  pub messages_sent: i64,
  pub messages_failed: i64,
}

/// Usage per month for each `YYYY-MM` in `months` (ascending); months without activity are zero
pub fn monthly_usage(conn: &Connection, months: &[String]) -> Result<Vec<MonthlyUsage>> {
  let Some(first) = months.first() else {
    return Ok(Vec::new());
  };
  let since = format!("{}-01T00:00:00Z", first);

  let mut campaigns: HashMap<String, i64> = HashMap::new();
  let mut stmt = conn.prepare(
    "SELECT substr(created_at, 1, 7), COUNT(*) FROM campaigns WHERE created_at >= ?1 GROUP BY 1",
  )?;
  for row in stmt.query_map(params![since], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
    let (month, n) = row?;
    campaigns.insert(month, n);
  }

  let mut messages: HashMap<String, (i64, i64)> = HashMap::new();
  let mut stmt = conn.prepare(
    r#"SELECT substr(created_at, 1, 7),
         SUM(CASE WHEN status = 'sent' THEN 1 ELSE 0 END),
         SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END)
       FROM message_logs WHERE created_at >= ?1 GROUP BY 1"#,
  )?;
  for row in stmt.query_map(params![since], |row| {
    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
  })? {
    let (month, sent, failed) = row?;
    messages.insert(month, (sent, failed));
  }

  Ok(
    months
      .iter()
      .map(|month| {
        let (sent, failed) = messages.get(month).copied().unwrap_or((0, 0));
        MonthlyUsage {
          month: month.clone(),
          campaigns: campaigns.get(month).copied().unwrap_or(0),
          messages_sent: sent,
          messages_failed: failed,
        }
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::billing::{activate_subscription, create_payment, review_payment, NewPayment};
  use crate::db::campaigns::{create_campaign, log_message, NewCampaign};
  use crate::db::contacts::insert_contact;
  use crate::domain::{MessageStatus, PaymentMethod, PaymentStatus, Role};
  use crate::testing::TestEnv;

  fn seed(env: &TestEnv) -> (i64, i64) {
    let a = env.add_merchant("a@example.com");
    let b = env.add_user("b@example.com", "US", Role::Merchant);
    let admin = env.add_user("root@example.com", "IN", Role::Superadmin);

    insert_contact(&env.conn, a, "+911111111111", None, true, None).unwrap();
    insert_contact(&env.conn, a, "+912222222222", None, false, None).unwrap();
    insert_contact(&env.conn, b, "+15555550100", None, true, None).unwrap();

    let campaign = create_campaign(
      &env.conn,
      &NewCampaign {
        user_id: a,
        promotion_id: None,
        body: "Hi",
        media_url: None,
        recipient_count: 1,
        skipped_count: 0,
      },
    )
    .unwrap();
    log_message(&env.conn, campaign, None, "+911111111111", MessageStatus::Sent, Some("SM1"), None).unwrap();

    activate_subscription(&env.conn, b, "starter", None, 30).unwrap();
    let payment = create_payment(
      &env.conn,
      &NewPayment {
        user_id: b,
        plan_id: "starter",
        method: PaymentMethod::Wise,
        amount: 1500,
        currency: "USD",
        transaction_ref: None,
        invoice_number: Some("INV-1"),
      },
    )
    .unwrap();
    review_payment(&env.conn, payment, PaymentStatus::Approved, admin, None).unwrap();
    (a, b)
  }

  #[test]
  fn test_overview_counts() {
    let env = TestEnv::new().unwrap();
    seed(&env);
    let o = overview(&env.conn, "2000-01-01T00:00:00Z").unwrap();

    assert_eq!(o.merchants, 2);
    assert_eq!(o.superadmins, 1);
    assert_eq!(o.active_paid_subscriptions, 1);
    assert_eq!(o.campaigns_total, 1);
    assert_eq!(o.campaigns_this_month, 1);
    assert_eq!(o.messages_sent, 1);
    assert_eq!(o.messages_failed, 0);
    assert_eq!(o.contacts_total, 3);
    assert_eq!(o.contacts_opted_in, 2);
    assert_eq!(o.pending_payments, 0);
    assert_eq!(o.revenue.len(), 1);
    assert_eq!(o.revenue[0].currency, "USD");
    assert_eq!(o.revenue[0].amount, 1500);
  }

  #[test]
  fn test_merchant_usage() {
    let env = TestEnv::new().unwrap();
    let (a, b) = seed(&env);
    let rows = merchant_usage(&env.conn, "2000-01-01T00:00:00Z").unwrap();
    assert_eq!(rows.len(), 2);

    let row_a = rows.iter().find(|r| r.id == a).unwrap();
    assert_eq!(row_a.plan_id, "free");
    assert_eq!(row_a.campaigns_total, 1);
    assert_eq!(row_a.messages_sent, 1);
    assert_eq!(row_a.contacts, 2);

    let row_b = rows.iter().find(|r| r.id == b).unwrap();
    assert_eq!(row_b.plan_id, "starter");
    assert_eq!(row_b.country, "US");
  }

  #[test]
  fn test_campaigns_between() {
    let env = TestEnv::new().unwrap();
    seed(&env);
    let rows = campaigns_between(&env.conn, "2000-01-01T00:00:00Z", "9999-01-01T00:00:00Z").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].merchant_email, "a@example.com");
    assert!(campaigns_between(&env.conn, "2000-01-01T00:00:00Z", "2000-02-01T00:00:00Z")
      .unwrap()
      .is_empty());
  }

  #[test]
  fn test_monthly_usage_fills_gaps() {
    let env = TestEnv::new().unwrap();
    seed(&env);
    env
      .conn
      .execute("UPDATE campaigns SET created_at = '2026-02-10T10:00:00Z'", [])
      .unwrap();
    env
      .conn
      .execute("UPDATE message_logs SET created_at = '2026-02-10T10:00:01Z'", [])
      .unwrap();

    let months = vec!["2026-01".to_string(), "2026-02".to_string(), "2026-03".to_string()];
    let usage = monthly_usage(&env.conn, &months).unwrap();
    assert_eq!(usage.len(), 3);
    assert_eq!(usage[0].campaigns, 0);
    assert_eq!(usage[1].campaigns, 1);
    assert_eq!(usage[1].messages_sent, 1);
    assert_eq!(usage[2].messages_failed, 0);
    assert!(monthly_usage(&env.conn, &[]).unwrap().is_empty());
  }
}
