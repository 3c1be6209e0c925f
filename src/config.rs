//! Application configuration.
//!
//! Every setting is resolved with priority: config.toml > environment
//! (including `.env`) > built-in default. The file path can be moved with
//! `PORTAL_CONFIG`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::paths;

// ==================== File structure ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerSection,
    database: DatabaseSection,
    auth: AuthSection,
    twilio: TwilioSection,
    mail: MailSection,
    billing: BillingSection,
    uploads: UploadsSection,
    admin: AdminSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    client_dir: Option<String>,
    cors_origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    data_dir: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthSection {
    session_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TwilioSection {
    account_sid: Option<String>,
    auth_token: Option<String>,
    whatsapp_from: Option<String>,
    api_base: Option<String>,
    default_country_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MailSection {
    api_url: Option<String>,
    api_key: Option<String>,
    from: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BillingSection {
    upi_vpa: Option<String>,
    upi_payee_name: Option<String>,
    wise_account_name: Option<String>,
    wise_account_details: Option<String>,
    wise_email: Option<String>,
    subscription_days: Option<i64>,
    invoice_due_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadsSection {
    max_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdminSection {
    email: Option<String>,
    password: Option<String>,
}

// ==================== Resolved configuration ====================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute base used to turn `/uploads/..` paths into media URLs
    pub public_base_url: String,
    /// Prebuilt SPA bundle served as fallback (optional)
    pub client_dir: Option<PathBuf>,
    pub cors_origin: Option<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Twilio WhatsApp credentials. Absent means dry-run sending.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164, without the `whatsapp:` prefix
    pub whatsapp_from: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub upi_vpa: String,
    pub upi_payee_name: String,
    pub wise_account_name: String,
    pub wise_account_details: String,
    pub wise_email: String,
    pub subscription_days: i64,
    pub invoice_due_days: i64,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub session_hours: i64,
    pub twilio: Option<TwilioConfig>,
    /// Country calling code applied to national numbers (digits only)
    pub default_country_code: String,
    pub mail: MailConfig,
    pub billing: BillingConfig,
    pub max_upload_bytes: usize,
    pub admin: Option<AdminSeed>,
}

// ==================== Defaults ====================

/// Server address to bind to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Server port
pub const DEFAULT_PORT: u16 = 5000;

/// Session lifetime in hours (1 week)
pub const DEFAULT_SESSION_HOURS: i64 = 24 * 7;

/// India
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// Upload size limit (5 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Length of a paid subscription period
pub const DEFAULT_SUBSCRIPTION_DAYS: i64 = 30;

/// Days until an emailed invoice is due
pub const DEFAULT_INVOICE_DUE_DAYS: i64 = 7;

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

impl AppConfig {
    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
                client_dir: None,
                cors_origin: None,
            },
            database_path: data_dir.join("portal.db"),
            data_dir,
            session_hours: DEFAULT_SESSION_HOURS,
            twilio: None,
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from: "billing@localhost".to_string(),
            },
            billing: BillingConfig {
                upi_vpa: "merchant@upi".to_string(),
                upi_payee_name: "Promo Portal".to_string(),
                wise_account_name: "Promo Portal".to_string(),
                wise_account_details: String::new(),
                wise_email: "billing@localhost".to_string(),
                subscription_days: DEFAULT_SUBSCRIPTION_DAYS,
                invoice_due_days: DEFAULT_INVOICE_DUE_DAYS,
            },
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin: None,
        }
    }

    /// Load configuration with priority: config.toml > .env > default
    pub fn load() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config_path =
            std::env::var("PORTAL_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let file = read_file_config(Path::new(&config_path));

        let data_dir = pick(file.database.data_dir, "DATA_DIR")
            .unwrap_or_else(|| paths::data_dir().to_string());
        let mut config = Self::with_data_dir(&data_dir);

        if let Some(path) = pick(file.database.path, "DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        tracing::info!("Using database at {}", config.database_path.display());

        let server = &mut config.server;
        if let Some(host) = pick(file.server.host, "HOST") {
            server.host = host;
        }
        if let Some(port) = pick(file.server.port, "PORT") {
            server.port = port;
            server.public_base_url = format!("http://localhost:{}", port);
        }
        if let Some(url) = pick(file.server.public_base_url, "PUBLIC_BASE_URL") {
            server.public_base_url = url.trim_end_matches('/').to_string();
        }
        server.client_dir = pick(file.server.client_dir, "CLIENT_DIR").map(PathBuf::from);
        server.cors_origin = pick(file.server.cors_origin, "CORS_ORIGIN");

        if let Some(hours) = pick(file.auth.session_hours, "SESSION_HOURS") {
            config.session_hours = hours.max(1);
        }

        let sid = pick(file.twilio.account_sid, "TWILIO_ACCOUNT_SID");
        let token = pick(file.twilio.auth_token, "TWILIO_AUTH_TOKEN");
        let from = pick(file.twilio.whatsapp_from, "TWILIO_WHATSAPP_FROM");
        config.twilio = match (sid, token, from) {
            (Some(account_sid), Some(auth_token), Some(whatsapp_from)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                whatsapp_from: whatsapp_from.trim_start_matches("whatsapp:").to_string(),
                api_base: pick(file.twilio.api_base, "TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            _ => None,
        };
        if let Some(code) = pick(file.twilio.default_country_code, "DEFAULT_COUNTRY_CODE") {
            config.default_country_code = code.trim_start_matches('+').to_string();
        }

        config.mail.api_url = pick(file.mail.api_url, "MAIL_API_URL");
        config.mail.api_key = pick(file.mail.api_key, "MAIL_API_KEY");
        if let Some(from) = pick(file.mail.from, "MAIL_FROM") {
            config.mail.from = from;
        }

        let billing = &mut config.billing;
        if let Some(vpa) = pick(file.billing.upi_vpa, "UPI_VPA") {
            billing.upi_vpa = vpa;
        }
        if let Some(name) = pick(file.billing.upi_payee_name, "UPI_PAYEE_NAME") {
            billing.upi_payee_name = name;
        }
        if let Some(name) = pick(file.billing.wise_account_name, "WISE_ACCOUNT_NAME") {
            billing.wise_account_name = name;
        }
        if let Some(details) = pick(file.billing.wise_account_details, "WISE_ACCOUNT_DETAILS") {
            billing.wise_account_details = details;
        }
        if let Some(email) = pick(file.billing.wise_email, "WISE_EMAIL") {
            billing.wise_email = email;
        }
        if let Some(days) = pick(file.billing.subscription_days, "SUBSCRIPTION_DAYS") {
            billing.subscription_days = days.max(1);
        }
        if let Some(days) = pick(file.billing.invoice_due_days, "INVOICE_DUE_DAYS") {
            billing.invoice_due_days = days.max(0);
        }

        if let Some(bytes) = pick(file.uploads.max_bytes, "MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes;
        }

        let admin_email = pick(file.admin.email, "SUPERADMIN_EMAIL");
        let admin_password = pick(file.admin.password, "SUPERADMIN_PASSWORD");
        if let (Some(email), Some(password)) = (admin_email, admin_password) {
            config.admin = Some(AdminSeed { email, password });
        }

        config
    }
}

fn read_file_config(path: &Path) -> FileConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };
    match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => {
            tracing::info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("Ignoring invalid {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

/// File value if present, otherwise a non-empty environment variable that parses.
fn pick<T: FromStr>(file_value: Option<T>, env_key: &str) -> Option<T> {
    file_value.or_else(|| {
        std::env::var(env_key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| v.trim().parse().ok())
    })
}
