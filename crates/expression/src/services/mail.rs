//! Outbound mail seam

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ExpressionResult;

/// A mail to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub to_name: String,
    pub subject: String,
    /// Plain text body, or the HTML body when `alt_text` is set
    pub body: String,
    pub html: bool,
    /// Plain text alternative of an HTML mail
    pub alt_text: Option<String>,
}

/// Sends mail and returns the message id
pub trait MailService: Send + Sync {
    fn send(&self, message: &MailMessage) -> ExpressionResult<String>;
}

/// Keeps sent messages in memory instead of delivering them
#[derive(Debug, Default)]
pub struct MemoryMail {
    outbox: Mutex<Vec<MailMessage>>,
}

impl MemoryMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox.lock().clone()
    }
}

impl MailService for MemoryMail {
    fn send(&self, message: &MailMessage) -> ExpressionResult<String> {
        self.outbox.lock().push(message.clone());
        Ok(format!("<{}@structr>", uuid::Uuid::new_v4()))
    }
}
