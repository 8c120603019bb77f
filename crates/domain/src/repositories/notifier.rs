use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[automock]
#[async_trait]
pub trait Notifier {
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}
