//! Mail delivery backends.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use nimbus_core::result::AppResult;

use super::message::MailMessage;

/// Delivers composed messages.
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Send a message. Returns the addresses that could not be delivered.
    async fn send(&self, message: &MailMessage) -> AppResult<Vec<String>>;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> AppResult<Vec<String>> {
        info!(
            from = ?message.from.as_ref().map(|m| m.address.as_str()),
            to = message.to.len(),
            bcc = message.bcc.len(),
            subject = %message.subject,
            template = ?message.template_id,
            "Mail delivery skipped, message logged"
        );
        Ok(Vec::new())
    }
}

/// Records messages in memory. Addresses listed as failing are reported
/// back instead of being recorded as delivered.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<MailMessage>>,
    failing: Vec<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Messages sent so far.
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &MailMessage) -> AppResult<Vec<String>> {
        let failed: Vec<String> = message
            .recipients()
            .filter(|r| self.failing.iter().any(|f| f == r))
            .map(str::to_string)
            .collect();
        self.sent.lock().await.push(message.clone());
        Ok(failed)
    }
}
