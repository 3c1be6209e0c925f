//! Plans, subscriptions and manually reviewed payments.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::{now_str, parse_db_time, to_db_time};
use crate::domain::{
  Payment, PaymentMethod, PaymentStatus, Plan, Subscription, SubscriptionStatus, FREE_PLAN_ID,
};

// ============================================================
// Plans
// ============================================================

const PLAN_COLUMNS: &str =
  "id, name, monthly_campaign_limit, max_contacts, price_inr, price_usd, sort_order";

fn map_plan(row: &Row) -> Result<Plan> {
  Ok(Plan {
    id: row.get(0)?,
    name: row.get(1)?,
    monthly_campaign_limit: row.get(2)?,
    max_contacts: row.get(3)?,
    price_inr: row.get(4)?,
    price_usd: row.get(5)?,
    sort_order: row.get(6)?,
  })
}

pub fn list_plans(conn: &Connection) -> Result<Vec<Plan>> {
  let mut stmt = conn.prepare(&format!("SELECT {} FROM plans ORDER BY sort_order", PLAN_COLUMNS))?;
  let plans = stmt.query_map([], map_plan)?.collect::<Result<Vec<_>>>()?;
  Ok(plans)
}

pub fn get_plan(conn: &Connection, plan_id: &str) -> Result<Option<Plan>> {
  conn
    .query_row(
      &format!("SELECT {} FROM plans WHERE id = ?1", PLAN_COLUMNS),
      params![plan_id],
      map_plan,
    )
    .optional()
}

// ============================================================
// Subscriptions
// ============================================================

const SUBSCRIPTION_COLUMNS: &str =
  "id, user_id, plan_id, status, payment_id, started_at, expires_at, cancelled_at";

fn map_subscription(row: &Row) -> Result<Subscription> {
  let status: String = row.get(3)?;
  Ok(Subscription {
    id: row.get(0)?,
    user_id: row.get(1)?,
    plan_id: row.get(2)?,
    status: SubscriptionStatus::from_str(&status),
    payment_id: row.get(4)?,
    started_at: row.get(5)?,
    expires_at: row.get(6)?,
    cancelled_at: row.get(7)?,
  })
}

/// Newest active, unexpired subscription of a user
pub fn get_active_subscription(conn: &Connection, user_id: i64) -> Result<Option<Subscription>> {
  conn
    .query_row(
      &format!(
        r#"SELECT {} FROM subscriptions
           WHERE user_id = ?1 AND status = 'active' AND expires_at > ?2
           ORDER BY expires_at DESC, id DESC LIMIT 1"#,
        SUBSCRIPTION_COLUMNS
      ),
      params![user_id, now_str()],
      map_subscription,
    )
    .optional()
}

/// The plan that currently governs a user's limits (free without an active subscription)
pub fn effective_plan(conn: &Connection, user_id: i64) -> Result<Plan> {
  let plan_id = get_active_subscription(conn, user_id)?
    .map(|s| s.plan_id)
    .unwrap_or_else(|| FREE_PLAN_ID.to_string());
  match get_plan(conn, &plan_id)? {
    Some(plan) => Ok(plan),
    None => get_plan(conn, FREE_PLAN_ID)?.ok_or(rusqlite::Error::QueryReturnedNoRows),
  }
}

/// Activate (or extend) a subscription after a payment was approved.
///
/// Renewing the plan that is already active extends its expiry by `days`;
/// switching plans cancels the current subscription and starts a new one now.
pub fn activate_subscription(
  conn: &Connection,
  user_id: i64,
  plan_id: &str,
  payment_id: Option<i64>,
  days: i64,
) -> Result<Subscription> {
  let now = Utc::now();

  if let Some(current) = get_active_subscription(conn, user_id)? {
    if current.plan_id == plan_id {
      let base = parse_db_time(&current.expires_at).filter(|t| *t > now).unwrap_or(now);
      conn.execute(
        "UPDATE subscriptions SET expires_at = ?2, payment_id = COALESCE(?3, payment_id) WHERE id = ?1",
        params![current.id, to_db_time(base + Duration::days(days)), payment_id],
      )?;
      return get_subscription(conn, current.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows);
    }
    cancel_subscription(conn, user_id)?;
  }

  conn.execute(
    r#"INSERT INTO subscriptions (user_id, plan_id, status, payment_id, started_at, expires_at)
       VALUES (?1, ?2, 'active', ?3, ?4, ?5)"#,
    params![user_id, plan_id, payment_id, to_db_time(now), to_db_time(now + Duration::days(days))],
  )?;
  get_subscription(conn, conn.last_insert_rowid())?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn get_subscription(conn: &Connection, id: i64) -> Result<Option<Subscription>> {
  conn
    .query_row(
      &format!("SELECT {} FROM subscriptions WHERE id = ?1", SUBSCRIPTION_COLUMNS),
      params![id],
      map_subscription,
    )
    .optional()
}

/// Cancel every active subscription of a user. Returns how many were cancelled.
pub fn cancel_subscription(conn: &Connection, user_id: i64) -> Result<usize> {
  conn.execute(
    r#"UPDATE subscriptions SET status = ?2, cancelled_at = ?3
       WHERE user_id = ?1 AND status = 'active'"#,
    params![user_id, SubscriptionStatus::Cancelled.as_str(), now_str()],
  )
}

// ============================================================
// Payments
// ============================================================

const PAYMENT_COLUMNS: &str = "p.id, p.user_id, p.plan_id, p.method, p.amount, p.currency, \
  p.transaction_ref, p.invoice_number, p.status, p.note, p.created_at, p.reviewed_at, p.reviewed_by";

fn map_payment(row: &Row) -> Result<Payment> {
  let method: String = row.get(3)?;
  let status: String = row.get(8)?;
  Ok(Payment {
    id: row.get(0)?,
    user_id: row.get(1)?,
    plan_id: row.get(2)?,
    method: PaymentMethod::from_str(&method).unwrap_or(PaymentMethod::Wise),
    amount: row.get(4)?,
    currency: row.get(5)?,
    transaction_ref: row.get(6)?,
    invoice_number: row.get(7)?,
    status: PaymentStatus::from_str(&status).unwrap_or(PaymentStatus::Pending),
    note: row.get(9)?,
    created_at: row.get(10)?,
    reviewed_at: row.get(11)?,
    reviewed_by: row.get(12)?,
  })
}

pub struct NewPayment<'a> {
  pub user_id: i64,
  pub plan_id: &'a str,
  pub method: PaymentMethod,
  pub amount: i64,
  pub currency: &'a str,
  pub transaction_ref: Option<&'a str>,
  pub invoice_number: Option<&'a str>,
}

/// Record a `pending` payment
pub fn create_payment(conn: &Connection, payment: &NewPayment) -> Result<i64> {
  conn.execute(
    r#"INSERT INTO payments
       (user_id, plan_id, method, amount, currency, transaction_ref, invoice_number, status, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)"#,
    params![
      payment.user_id,
      payment.plan_id,
      payment.method.as_str(),
      payment.amount,
      payment.currency,
      payment.transaction_ref,
      payment.invoice_number,
      now_str(),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Check if a UPI transaction reference was already submitted by anyone
pub fn transaction_ref_exists(conn: &Connection, transaction_ref: &str) -> Result<bool> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM payments WHERE transaction_ref = ?1",
    params![transaction_ref],
    |row| row.get(0),
  )?;
  Ok(count > 0)
}

/// Next invoice number for the given `YYYYMM` period, e.g. INV-202610-000042
pub fn next_invoice_number(conn: &Connection, period: &str) -> Result<String> {
  let issued: i64 = conn.query_row(
    "SELECT COUNT(*) FROM payments WHERE invoice_number IS NOT NULL",
    [],
    |row| row.get(0),
  )?;
  Ok(format!("INV-{}-{:06}", period, issued + 1))
}

pub fn get_payment(conn: &Connection, id: i64) -> Result<Option<Payment>> {
  conn
    .query_row(
      &format!("SELECT {} FROM payments p WHERE p.id = ?1", PAYMENT_COLUMNS),
      params![id],
      map_payment,
    )
    .optional()
}

pub fn list_user_payments(conn: &Connection, user_id: i64) -> Result<Vec<Payment>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM payments p WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.id DESC",
    PAYMENT_COLUMNS
  ))?;
  let payments = stmt
    .query_map(params![user_id], map_payment)?
    .collect::<Result<Vec<_>>>()?;
  Ok(payments)
}

/// Payment with the merchant it belongs to, for the review queue
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReviewRow {
  #[serde(flatten)]
  pub payment: Payment,
  pub merchant_email: String,
  pub business_name: String,
}

/// All payments (optionally by status), oldest first so the queue is worked in order
pub fn list_payments_for_review(
  conn: &Connection,
  status: Option<PaymentStatus>,
) -> Result<Vec<PaymentReviewRow>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {}, u.email, u.business_name
       FROM payments p JOIN users u ON u.id = p.user_id
       WHERE ?1 IS NULL OR p.status = ?1
       ORDER BY p.created_at ASC, p.id ASC"#,
    PAYMENT_COLUMNS
  ))?;
  let rows = stmt
    .query_map(params![status.map(|s| s.as_str())], |row| {
      Ok(PaymentReviewRow {
        payment: map_payment(row)?,
        merchant_email: row.get(13)?,
        business_name: row.get(14)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

/// Move a pending payment to `approved` or `rejected`.
/// Returns false if the payment is missing or was already reviewed.
pub fn review_payment(
  conn: &Connection,
  id: i64,
  status: PaymentStatus,
  reviewer_id: i64,
  note: Option<&str>,
) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE payments SET status = ?2, reviewed_at = ?3, reviewed_by = ?4, note = COALESCE(?5, note)
       WHERE id = ?1 AND status = 'pending'"#,
    params![id, status.as_str(), now_str(), reviewer_id, note],
  )?;
  Ok(changed > 0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;

  fn upi_payment<'a>(user_id: i64, plan_id: &'a str, utr: &'a str) -> NewPayment<'a> {
    NewPayment {
      user_id,
      plan_id,
      method: PaymentMethod::Upi,
      amount: 99900,
      currency: "INR",
      transaction_ref: Some(utr),
      invoice_number: None,
    }
  }

  #[test]
  fn test_effective_plan_defaults_to_free() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let plan = effective_plan(&env.conn, user).unwrap();
    assert_eq!(plan.id, FREE_PLAN_ID);
    assert_eq!(plan.monthly_campaign_limit, 2);
  }

  #[test]
  fn test_activate_and_cancel() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");

    let sub = activate_subscription(&env.conn, user, "starter", None, 30).unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(effective_plan(&env.conn, user).unwrap().id, "starter");

    assert_eq!(cancel_subscription(&env.conn, user).unwrap(), 1);
    assert!(get_active_subscription(&env.conn, user).unwrap().is_none());
    assert_eq!(effective_plan(&env.conn, user).unwrap().id, FREE_PLAN_ID);
  }

  #[test]
  fn test_renewal_extends_same_plan() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");

    let first = activate_subscription(&env.conn, user, "starter", None, 30).unwrap();
    let renewed = activate_subscription(&env.conn, user, "starter", None, 30).unwrap();
    assert_eq!(first.id, renewed.id);

    let first_exp = parse_db_time(&first.expires_at).unwrap();
    let renewed_exp = parse_db_time(&renewed.expires_at).unwrap();
    assert_eq!((renewed_exp - first_exp).num_days(), 30);
  }

  #[test]
  fn test_plan_switch_replaces_subscription() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");

    let starter = activate_subscription(&env.conn, user, "starter", None, 30).unwrap();
    let growth = activate_subscription(&env.conn, user, "growth", None, 30).unwrap();
    assert_ne!(starter.id, growth.id);

    let active_count: i64 = env
      .conn
      .query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND status = 'active'",
        params![user],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(active_count, 1);
    assert_eq!(effective_plan(&env.conn, user).unwrap().id, "growth");
  }

  #[test]
  fn test_expired_subscription_is_ignored() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    activate_subscription(&env.conn, user, "growth", None, 30).unwrap();
    env
      .conn
      .execute("UPDATE subscriptions SET expires_at = '2000-01-01T00:00:00Z'", [])
      .unwrap();
    assert_eq!(effective_plan(&env.conn, user).unwrap().id, FREE_PLAN_ID);
  }

  #[test]
  fn test_transaction_ref_unique() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    create_payment(&env.conn, &upi_payment(user, "starter", "123456789012")).unwrap();

    assert!(transaction_ref_exists(&env.conn, "123456789012").unwrap());
    assert!(create_payment(&env.conn, &upi_payment(user, "starter", "123456789012")).is_err());
  }

  #[test]
  fn test_review_only_once() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let admin = env.add_user("root@example.com", "IN", crate::domain::Role::Superadmin);
    let id = create_payment(&env.conn, &upi_payment(user, "starter", "UTR0000000001")).unwrap();

    assert!(review_payment(&env.conn, id, PaymentStatus::Approved, admin, None).unwrap());
    assert!(!review_payment(&env.conn, id, PaymentStatus::Rejected, admin, Some("late")).unwrap());

    let payment = get_payment(&env.conn, id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Approved);
    assert_eq!(payment.reviewed_by, Some(admin));
  }

  #[test]
  fn test_review_queue_filter() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    let admin = env.add_user("root@example.com", "IN", crate::domain::Role::Superadmin);
    let p1 = create_payment(&env.conn, &upi_payment(user, "starter", "UTR0000000001")).unwrap();
    create_payment(&env.conn, &upi_payment(user, "growth", "UTR0000000002")).unwrap();
    review_payment(&env.conn, p1, PaymentStatus::Rejected, admin, Some("no such UTR")).unwrap();

    let pending = list_payments_for_review(&env.conn, Some(PaymentStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payment.plan_id, "growth");
    assert_eq!(pending[0].merchant_email, "a@example.com");
    assert_eq!(list_payments_for_review(&env.conn, None).unwrap().len(), 2);
  }

  #[test]
  fn test_invoice_numbers_increment() {
    let env = TestEnv::new().unwrap();
    let user = env.add_user("a@example.com", "GB", crate::domain::Role::Merchant);
    let first = next_invoice_number(&env.conn, "202610").unwrap();
    assert_eq!(first, "INV-202610-000001");

    create_payment(
      &env.conn,
      &NewPayment {
        user_id: user,
        plan_id: "starter",
        method: PaymentMethod::Wise,
        amount: 1500,
        currency: "USD",
        transaction_ref: None,
        invoice_number: Some(&first),
      },
    )
    .unwrap();
    assert_eq!(next_invoice_number(&env.conn, "202610").unwrap(), "INV-202610-000002");
  }
}
