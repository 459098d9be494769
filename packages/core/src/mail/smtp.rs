use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailError, Mailer, OutgoingMail};
use crate::config::{MailConfig, MailEncryption, MailTransport};

const SMTP_TIMEOUT_SECS: u64 = 10;

/// Delivers mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let (host, port, username, password, encryption) = match &config.transport {
            MailTransport::Smtp {
                host,
                port,
                username,
                password,
                encryption,
            } => (host, *port, username, password, *encryption),
            MailTransport::Log => {
                return Err(MailError::Build("SMTP mailer needs an SMTP transport".to_string()))
            }
        };

        let from = parse_mailbox(&format!("{} <{}>", config.from_name, config.from_address))?;

        let mut builder = match encryption {
            MailEncryption::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
            MailEncryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };

        builder = builder
            .port(port)
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(std::time::Duration::from_secs(SMTP_TIMEOUT_SECS)));

        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail delivered");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
