//! Transactional email.
//!
//! Handlers talk to a [`Mailer`]; which transport backs it is decided once
//! at startup from [`MailConfig`](crate::config::MailConfig).

pub mod memory;
pub mod smtp;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{MailConfig, MailTransport};

pub use memory::{LogMailer, MemoryMailer};
pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Build the mailer selected by configuration.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Smtp { .. } => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}
