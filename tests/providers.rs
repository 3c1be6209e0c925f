//! Twilio and mail provider behaviour against a mocked HTTP API.

mod twilio_tests {
  use promo_portal::config::TwilioConfig;
  use promo_portal::messaging::{MessageSender, OutboundMessage, SendError, TwilioSender};
  use serde_json::json;
  use wiremock::matchers::{basic_auth, body_string_contains, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const MESSAGES_PATH: &str = "/2010-04-01/Accounts/AC123/Messages.json";

  fn sender(server: &MockServer) -> TwilioSender {
    TwilioSender::new(TwilioConfig {
      account_sid: "AC123".into(),
      auth_token: "secret".into(),
      whatsapp_from: "+14155238886".into(),
      api_base: server.uri(),
    })
  }

  fn message() -> OutboundMessage {
    OutboundMessage {
      to: "+919876543210".into(),
      body: "Diwali sale".into(),
      media_url: None,
    }
  }

  #[tokio::test]
  async fn test_send_returns_message_sid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(MESSAGES_PATH))
      .and(basic_auth("AC123", "secret"))
      .and(body_string_contains("To=whatsapp%3A%2B919876543210"))
      .respond_with(
        ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM0123456789", "status": "queued" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let sid = sender(&server).send(&message()).await.unwrap();
    assert_eq!(sid, "SM0123456789");
  }

  #[tokio::test]
  async fn test_rejection_carries_twilio_message_and_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(MESSAGES_PATH))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "code": 21211,
        "message": "The 'To' number is not a valid phone number.",
        "status": 400,
      })))
      .mount(&server)
      .await;

    match sender(&server).send(&message()).await {
      Err(SendError::Rejected { status, message }) => {
        assert_eq!(status, 400);
        assert_eq!(message, "The 'To' number is not a valid phone number. (code 21211)");
      }
      other => panic!("expected rejection, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_rejection_without_body_uses_status_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(MESSAGES_PATH))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    match sender(&server).send(&message()).await {
      Err(SendError::Rejected { status, message }) => {
        assert_eq!(status, 401);
        assert_eq!(message, "Unauthorized");
      }
      other => panic!("expected rejection, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_success_with_unexpected_body_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(MESSAGES_PATH))
      .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
      .mount(&server)
      .await;

    assert!(matches!(
      sender(&server).send(&message()).await,
      Err(SendError::Transport(_))
    ));
  }
}

mod mail_tests {
  use promo_portal::mail::{Email, HttpMailer, MailError, Mailer};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn mailer(server: &MockServer) -> HttpMailer {
    HttpMailer::new(
      format!("{}/v3/mail/send", server.uri()),
      "SG.key".into(),
      "billing@portal.test".into(),
    )
  }

  fn email() -> Email {
    Email {
      to: "sam@example.co.uk".into(),
      subject: "Invoice INV-202610-000001 for the Starter plan".into(),
      html: "<p>Invoice</p>".into(),
    }
  }

  #[tokio::test]
  async fn test_send_posts_json_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v3/mail/send"))
      .and(header("authorization", "Bearer SG.key"))
      .and(body_partial_json(json!({
        "from": { "email": "billing@portal.test" },
        "subject": "Invoice INV-202610-000001 for the Starter plan",
      })))
      .respond_with(ResponseTemplate::new(202))
      .expect(1)
      .mount(&server)
      .await;

    mailer(&server).send(&email()).await.unwrap();
  }

  #[tokio::test]
  async fn test_error_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v3/mail/send"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "errors": [{ "message": "The from address does not match a verified Sender Identity." }]
      })))
      .mount(&server)
      .await;

    assert!(matches!(
      mailer(&server).send(&email()).await,
      Err(MailError::Rejected(400))
    ));
  }

  #[tokio::test]
  async fn test_error_status_without_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v3/mail/send"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    assert!(matches!(
      mailer(&server).send(&email()).await,
      Err(MailError::Rejected(401))
    ));
  }
}
