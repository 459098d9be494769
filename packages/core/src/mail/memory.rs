use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MailError, Mailer, OutgoingMail};

/// Writes mail to the log instead of delivering it. Useful in development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "Mail (log transport):\n{}",
            mail.body
        );
        Ok(())
    }
}

/// Keeps sent mail in memory. Can be told to fail, to exercise rollbacks.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().await.clone()
    }

    pub async fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("memory mailer set to fail".to_string()));
        }
        self.outbox.lock().await.push(mail);
        Ok(())
    }
}
