use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, warn};

use domain::repositories::notifier::{Notifier, OutboundMessage};

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub sender: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers notifications through a transactional-mail HTTP endpoint.
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let body = MailRequest {
            from: &self.config.sender,
            to: &message.recipient,
            subject: &message.subject,
            text: &message.body,
        };

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {api_key}"));
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("mailer unreachable at {}", self.config.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(%status, recipient = %message.recipient, "mailer rejected message");
            bail!("mailer responded {status}: {detail}");
        }

        debug!(recipient = %message.recipient, subject = %message.subject, "mail sent");
        Ok(())
    }
}
