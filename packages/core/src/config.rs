use std::env;
use std::net::SocketAddr;

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub app_url: String,
    pub institution_domain: String,
    pub mail: MailConfig,
    pub otp_ttl_minutes: i64,
    pub otp_throttle_seconds: i64,
    pub reset_token_ttl_minutes: i64,
    pub verification_ttl_minutes: i64,
    pub token_ttl_minutes: Option<i64>,
    pub prune_interval_seconds: u64,
    pub admin: Option<AdminCredentials>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from_address: String,
    pub from_name: String,
}

#[derive(Clone, PartialEq, Eq)]
pub enum MailTransport {
    Log,
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        encryption: MailEncryption,
    },
}

impl std::fmt::Debug for MailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailTransport::Log => f.write_str("Log"),
            MailTransport::Smtp {
                host,
                port,
                username,
                password,
                encryption,
            } => f
                .debug_struct("Smtp")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .field("encryption", encryption)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailEncryption {
    StartTls,
    None,
}

#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://student_portal.db".to_string());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|_| "BIND_ADDR must be a socket address like 127.0.0.1:8080")?;

        let app_url = var("APP_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let institution_domain = var("INSTITUTION_EMAIL_DOMAIN")
            .unwrap_or_else(|| "polban.ac.id".to_string())
            .trim_start_matches('@')
            .to_ascii_lowercase();

        let transport = match var("MAIL_TRANSPORT").as_deref().unwrap_or("log") {
            "log" => MailTransport::Log,
            "smtp" => {
                let host = var("MAIL_HOST").ok_or("MAIL_HOST is required when MAIL_TRANSPORT=smtp")?;
                let port = parse_number(&var, "MAIL_PORT", 587u16)?;
                let encryption = match var("MAIL_ENCRYPTION").as_deref().unwrap_or("starttls") {
                    "starttls" | "tls" => MailEncryption::StartTls,
                    "none" => MailEncryption::None,
                    other => return Err(format!("Invalid MAIL_ENCRYPTION: {}", other)),
                };
                MailTransport::Smtp {
                    host,
                    port,
                    username: var("MAIL_USERNAME"),
                    password: var("MAIL_PASSWORD"),
                    encryption,
                }
            }
            other => return Err(format!("Invalid MAIL_TRANSPORT: {}", other)),
        };

        let mail = MailConfig {
            transport,
            from_address: var("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|| format!("no-reply@{}", institution_domain)),
            from_name: var("MAIL_FROM_NAME").unwrap_or_else(|| "Student Portal".to_string()),
        };

        let otp_ttl_minutes = parse_positive(&var, "OTP_TTL_MINUTES", 15)?;
        let otp_throttle_seconds = parse_number(&var, "OTP_THROTTLE_SECONDS", 60i64)?;
        let reset_token_ttl_minutes = parse_positive(&var, "RESET_TOKEN_TTL_MINUTES", 60)?;
        let verification_ttl_minutes = parse_positive(&var, "VERIFICATION_TTL_MINUTES", 60)?;

        let token_ttl_minutes = match var("TOKEN_TTL_MINUTES") {
            Some(_) => Some(parse_positive(&var, "TOKEN_TTL_MINUTES", 0)?),
            None => None,
        };

        let prune_interval_seconds = parse_number(&var, "PRUNE_INTERVAL_SECONDS", 3600u64)?;
        if prune_interval_seconds == 0 {
            return Err("PRUNE_INTERVAL_SECONDS must be greater than zero".to_string());
        }

        let admin = var("ADMIN_PASSWORD").map(|password| AdminCredentials {
            username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password,
        });

        Ok(Self {
            database_url,
            bind_addr,
            app_url,
            institution_domain,
            mail,
            otp_ttl_minutes,
            otp_throttle_seconds,
            reset_token_ttl_minutes,
            verification_ttl_minutes,
            token_ttl_minutes,
            prune_interval_seconds,
            admin,
        })
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.otp_ttl_minutes)
    }

    pub fn otp_throttle(&self) -> Duration {
        Duration::seconds(self.otp_throttle_seconds)
    }

    pub fn reset_token_ttl(&self) -> Duration {
        Duration::minutes(self.reset_token_ttl_minutes)
    }

    pub fn verification_ttl(&self) -> Duration {
        Duration::minutes(self.verification_ttl_minutes)
    }

    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl_minutes.map(Duration::minutes)
    }

    /// Oldest a password reset row may get before the pruner removes it.
    pub fn password_reset_retention(&self) -> Duration {
        self.otp_ttl() + self.reset_token_ttl()
    }
}

fn parse_number<F, T>(var: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

fn parse_positive<F>(var: &F, key: &str, default: i64) -> Result<i64, String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_number(var, key, default)?;
    if value <= 0 {
        return Err(format!("{} must be greater than zero", key));
    }
    Ok(value)
}
