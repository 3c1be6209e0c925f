//! Manual subscription payments.
//!
//! Indian merchants pay the portal's UPI VPA and submit the transaction
//! reference; everyone else receives an emailed invoice settled by WISE
//! transfer. A superadmin approves or rejects each pending payment.

use askama::Template;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::BillingConfig;
use crate::db::{self, billing};
use crate::domain::{
    format_amount, Payment, PaymentMethod, PaymentStatus, Plan, Region, Subscription, User,
};
use crate::error::{ApiError, ApiResult};
use crate::mail::Email;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Serialize)]
pub struct UpiDetails {
    pub plan_id: String,
    pub vpa: String,
    pub payee_name: String,
    /// Paise
    pub amount: i64,
    pub amount_display: String,
    pub currency: &'static str,
    pub upi_link: String,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResult {
    pub payment: Payment,
    pub emailed: bool,
    pub instructions: WiseInstructions,
}

#[derive(Debug, Serialize)]
pub struct WiseInstructions {
    pub account_name: String,
    pub account_details: String,
    pub email: String,
    pub reference: String,
    pub amount_display: String,
    pub due_on: String,
}

#[derive(Template)]
#[template(path = "email/invoice.html")]
struct InvoiceEmail<'a> {
    invoice_number: &'a str,
    issued_on: &'a str,
    due_on: &'a str,
    customer_name: &'a str,
    business_name: &'a str,
    customer_email: &'a str,
    plan_name: &'a str,
    period_days: i64,
    amount: &'a str,
    wise_account_name: &'a str,
    wise_account_details: &'a str,
    wise_email: &'a str,
}

/// `upi://pay` deep link understood by Indian UPI apps
pub fn upi_link(vpa: &str, payee_name: &str, amount_paise: i64, note: &str) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={}.{:02}&cu=INR&tn={}",
        urlencoding::encode(vpa),
        urlencoding::encode(payee_name),
        amount_paise / 100,
        amount_paise % 100,
        urlencoding::encode(note)
    )
}

/// A plan that can be bought: exists and is not free
pub fn purchasable_plan(conn: &Connection, plan_id: &str) -> ApiResult<Plan> {
    let plan = billing::get_plan(conn, plan_id)?.ok_or(ApiError::NotFound("plan"))?;
    if plan.is_free() {
        return Err(ApiError::bad_request("the free plan cannot be purchased"));
    }
    Ok(plan)
}

fn require_method(user: &User, method: PaymentMethod) -> ApiResult<()> {
    if PaymentMethod::for_region(user.region) == method {
        return Ok(());
    }
    Err(ApiError::forbidden(match method {
        PaymentMethod::Upi => "UPI payments are only available to merchants in India",
        PaymentMethod::Wise => "merchants in India pay by UPI",
    }))
}

pub fn upi_details(
    conn: &Connection,
    config: &BillingConfig,
    user: &User,
    plan_id: &str,
) -> ApiResult<UpiDetails> {
    require_method(user, PaymentMethod::Upi)?;
    let plan = purchasable_plan(conn, plan_id)?;
    let (amount, currency) = plan.price_for(Region::India);
    let note = format!("{} plan - {}", plan.name, user.email);
    Ok(UpiDetails {
        upi_link: upi_link(&config.upi_vpa, &config.upi_payee_name, amount, &note),
        plan_id: plan.id,
        vpa: config.upi_vpa.clone(),
        payee_name: config.upi_payee_name.clone(),
        amount,
        amount_display: format_amount(amount, currency),
        currency,
    })
}

/// Record a UPI payment awaiting review
pub fn submit_upi(conn: &Connection, user: &User, plan_id: &str, transaction_id: &str) -> ApiResult<Payment> {
    require_method(user, PaymentMethod::Upi)?;
    let transaction_id = transaction_id.trim().to_ascii_uppercase();
    if !validation::is_valid_transaction_id(&transaction_id) {
        return Err(ApiError::Validation(vec![validation::FieldError {
            field: "transaction_id",
            message: "transaction id must be 10-35 letters or digits".into(),
        }]));
    }
    let plan = purchasable_plan(conn, plan_id)?;
    if billing::transaction_ref_exists(conn, &transaction_id)? {
        return Err(ApiError::Conflict("this transaction id has already been submitted".into()));
    }

    let (amount, currency) = plan.price_for(Region::India);
    let id = billing::create_payment(
        conn,
        &billing::NewPayment {
            user_id: user.id,
            plan_id: &plan.id,
            method: PaymentMethod::Upi,
            amount,
            currency,
            transaction_ref: Some(&transaction_id),
            invoice_number: None,
        },
    )?;
    tracing::info!(user_id = user.id, payment_id = id, plan = %plan.id, "UPI payment submitted");
    billing::get_payment(conn, id)?.ok_or(ApiError::NotFound("payment"))
}

/// Create a WISE invoice and email it. The invoice survives a mail failure.
pub async fn create_invoice(state: &AppState, user: &User, plan_id: &str) -> ApiResult<InvoiceResult> {
    require_method(user, PaymentMethod::Wise)?;
    let config = &state.config.billing;

    let (payment, plan) = {
        let conn = db::try_lock(&state.db)?;
        let plan = purchasable_plan(&conn, plan_id)?;
        let (amount, currency) = plan.price_for(Region::International);
        let period = Utc::now().format("%Y%m").to_string();
        let invoice_number = billing::next_invoice_number(&conn, &period)?;
        let id = billing::create_payment(
            &conn,
            &billing::NewPayment {
                user_id: user.id,
                plan_id: &plan.id,
                method: PaymentMethod::Wise,
                amount,
                currency,
                transaction_ref: None,
                invoice_number: Some(&invoice_number),
            },
        )?;
        let payment = billing::get_payment(&conn, id)?.ok_or(ApiError::NotFound("payment"))?;
        (payment, plan)
    };
    let invoice_number = payment.invoice_number.clone().unwrap_or_default();
    tracing::info!(user_id = user.id, invoice = %invoice_number, plan = %plan.id, "Invoice created");

    let today = Utc::now().date_naive();
    let issued_on = today.format("%Y-%m-%d").to_string();
    let due_on = (today + Duration::days(config.invoice_due_days))
        .format("%Y-%m-%d")
        .to_string();
    let amount_display = format_amount(payment.amount, &payment.currency);

    let html = InvoiceEmail {
        invoice_number: &invoice_number,
        issued_on: &issued_on,
        due_on: &due_on,
        customer_name: &user.name,
        business_name: &user.business_name,
        customer_email: &user.email,
        plan_name: &plan.name,
        period_days: config.subscription_days,
        amount: &amount_display,
        wise_account_name: &config.wise_account_name,
        wise_account_details: &config.wise_account_details,
        wise_email: &config.wise_email,
    }
    .render()
    .map_err(|e| ApiError::Internal(format!("invoice template failed: {}", e)))?;

    let email = Email {
        to: user.email.clone(),
        subject: format!("Invoice {} for the {} plan", invoice_number, plan.name),
        html,
    };
    let emailed = match state.mailer.send(&email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(invoice = %invoice_number, "Failed to email invoice: {}", e);
            false
        }
    };

    Ok(InvoiceResult {
        instructions: WiseInstructions {
            account_name: config.wise_account_name.clone(),
            account_details: config.wise_account_details.clone(),
            email: config.wise_email.clone(),
            reference: invoice_number,
            amount_display,
            due_on,
        },
        payment,
        emailed,
    })
}

/// Approve a pending payment and activate (or extend) the paid plan
pub fn approve_payment(
    conn: &Connection,
    payment_id: i64,
    reviewer_id: i64,
    days: i64,
) -> ApiResult<(Payment, Subscription)> {
    let payment = billing::get_payment(conn, payment_id)?.ok_or(ApiError::NotFound("payment"))?;
    let tx = conn.unchecked_transaction()?;
    if !billing::review_payment(&tx, payment_id, PaymentStatus::Approved, reviewer_id, None)? {
        return Err(ApiError::Conflict(format!(
            "payment is already {}",
            payment.status.as_str()
        )));
    }
    let subscription =
        billing::activate_subscription(&tx, payment.user_id, &payment.plan_id, Some(payment_id), days)?;
    tx.commit()?;

    tracing::info!(
        payment_id,
        reviewer_id,
        user_id = payment.user_id,
        plan = %payment.plan_id,
        expires_at = %subscription.expires_at,
        "Payment approved"
    );
    let payment = billing::get_payment(conn, payment_id)?.ok_or(ApiError::NotFound("payment"))?;
    Ok((payment, subscription))
}

pub fn reject_payment(
    conn: &Connection,
    payment_id: i64,
    reviewer_id: i64,
    reason: Option<&str>,
) -> ApiResult<Payment> {
    let payment = billing::get_payment(conn, payment_id)?.ok_or(ApiError::NotFound("payment"))?;
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    if !billing::review_payment(conn, payment_id, PaymentStatus::Rejected, reviewer_id, reason)? {
        return Err(ApiError::Conflict(format!(
            "payment is already {}",
            payment.status.as_str()
        )));
    }
    tracing::info!(payment_id, reviewer_id, user_id = payment.user_id, "Payment rejected");
    billing::get_payment(conn, payment_id)?.ok_or(ApiError::NotFound("payment"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::users;
    use crate::domain::Role;
    use crate::testing::TestEnv;

    fn user(env: &TestEnv, id: i64) -> User {
        users::get_user_by_id(&env.conn, id).unwrap().unwrap()
    }

    #[test]
    fn test_upi_link_encodes_parameters() {
        let link = upi_link("shop@okaxis", "Promo Portal", 99900, "Starter plan");
        assert_eq!(
            link,
            "upi://pay?pa=shop%40okaxis&pn=Promo%20Portal&am=999.00&cu=INR&tn=Starter%20plan"
        );
    }

    #[test]
    fn test_free_plan_not_purchasable() {
        let env = TestEnv::new().unwrap();
        assert!(matches!(purchasable_plan(&env.conn, "free"), Err(ApiError::BadRequest(_))));
        assert!(matches!(purchasable_plan(&env.conn, "platinum"), Err(ApiError::NotFound("plan"))));
        assert_eq!(purchasable_plan(&env.conn, "starter").unwrap().price_inr, 99900);
    }

    #[test]
    fn test_upi_details_for_indian_merchant() {
        let env = TestEnv::new().unwrap();
        let merchant = user(&env, env.add_merchant("a@example.com"));
        let config = AppConfig::with_data_dir(env.path()).billing;
        let details = upi_details(&env.conn, &config, &merchant, "starter").unwrap();
        assert_eq!(details.amount, 99900);
        assert_eq!(details.amount_display, "₹999.00");
        assert!(details.upi_link.starts_with("upi://pay?pa="));
    }

    #[test]
    fn test_upi_rejected_outside_india() {
        let env = TestEnv::new().unwrap();
        let merchant = user(&env, env.add_user("b@example.com", "GB", Role::Merchant));
        let err = submit_upi(&env.conn, &merchant, "starter", "123456789012").err().unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_submit_upi_duplicate_conflicts() {
        let env = TestEnv::new().unwrap();
        let a = user(&env, env.add_merchant("a@example.com"));
        let b = user(&env, env.add_merchant("b@example.com"));

        let payment = submit_upi(&env.conn, &a, "starter", "axis123456789").unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.transaction_ref.as_deref(), Some("AXIS123456789"));
        assert_eq!(payment.currency, "INR");

        let err = submit_upi(&env.conn, &b, "starter", "AXIS123456789").err().unwrap();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_submit_upi_validates_transaction_id() {
        let env = TestEnv::new().unwrap();
        let a = user(&env, env.add_merchant("a@example.com"));
        let err = submit_upi(&env.conn, &a, "starter", "12-34").err().unwrap();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_approve_activates_and_is_final() {
        let env = TestEnv::new().unwrap();
        let admin = env.add_user("admin@example.com", "IN", Role::Superadmin);
        let a = user(&env, env.add_merchant("a@example.com"));
        let payment = submit_upi(&env.conn, &a, "growth", "UTR0000000001").unwrap();

        let (approved, subscription) = approve_payment(&env.conn, payment.id, admin, 30).unwrap();
        assert_eq!(approved.status, PaymentStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(admin));
        assert_eq!(subscription.plan_id, "growth");
        assert_eq!(billing::effective_plan(&env.conn, a.id).unwrap().id, "growth");

        assert!(matches!(
            approve_payment(&env.conn, payment.id, admin, 30),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            reject_payment(&env.conn, payment.id, admin, Some("late")),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn test_reject_keeps_free_plan() {
        let env = TestEnv::new().unwrap();
        let admin = env.add_user("admin@example.com", "IN", Role::Superadmin);
        let a = user(&env, env.add_merchant("a@example.com"));
        let payment = submit_upi(&env.conn, &a, "starter", "UTR0000000002").unwrap();

        let rejected = reject_payment(&env.conn, payment.id, admin, Some(" not received ")).unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.note.as_deref(), Some("not received"));
        assert_eq!(billing::effective_plan(&env.conn, a.id).unwrap().id, "free");
    }

    #[test]
    fn test_review_missing_payment() {
        let env = TestEnv::new().unwrap();
        assert!(matches!(
            approve_payment(&env.conn, 999, 1, 30),
            Err(ApiError::NotFound("payment"))
        ));
    }
}
