//! Error notifications.
//!
//! Every report is logged. When e-mail on error is enabled the report is
//! also posted as JSON to the configured relay webhook. Delivery is best
//! effort: failures are logged and never surface to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use validator::Validate;

/// Context attached to a reported error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorContext {
    pub component: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new(component: impl Into<String>, err: &Error) -> Self {
        Self {
            component: component.into(),
            message: err.to_string(),
            error_code: err.error_code().map(str::to_string),
            partition_id: None,
            offset: None,
            sequence_number: None,
            device_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn partition(mut self, partition_id: i32) -> Self {
        self.partition_id = Some(partition_id);
        self
    }

    pub fn position(mut self, offset: i64, sequence_number: i64) -> Self {
        self.offset = Some(offset);
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Failure-notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn report(&self, context: ErrorContext);
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationConfig {
    /// Forward reports to the relay webhook
    #[serde(default)]
    pub email_errors: bool,
    #[serde(default)]
    #[validate(url)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 100, max = 60000))]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_errors: false,
            webhook_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Notification channel.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationChannel {
    Log,
    Webhook { url: String },
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    environment: &'a str,
    #[serde(flatten)]
    context: &'a ErrorContext,
}

/// [`Notifier`] that logs and optionally relays to a webhook.
pub struct ErrorNotifier {
    channels: Vec<NotificationChannel>,
    environment: String,
    http: reqwest::Client,
}

impl ErrorNotifier {
    pub fn new(config: &NotificationConfig, environment: impl Into<String>) -> Self {
        let mut channels = vec![NotificationChannel::Log];
        match (&config.webhook_url, config.email_errors) {
            (Some(url), true) => channels.push(NotificationChannel::Webhook { url: url.clone() }),
            (None, true) => warn!("Error e-mails enabled without a webhook URL, logging only"),
            _ => {}
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            channels,
            environment: environment.into(),
            http,
        }
    }

    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    async fn post(&self, url: &str, context: &ErrorContext) {
        let body = WebhookBody {
            environment: &self.environment,
            context,
        };
        match self.http.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                info!(component = %context.component, "Error notification delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Error notification rejected by relay");
            }
            Err(e) => {
                warn!("Failed to deliver error notification: {}", e);
            }
        }
    }
}

#[async_trait]
impl Notifier for ErrorNotifier {
    async fn report(&self, context: ErrorContext) {
        for channel in &self.channels {
            match channel {
                NotificationChannel::Log => {
                    error!(
                        component = %context.component,
                        error_code = ?context.error_code,
                        partition = ?context.partition_id,
                        offset = ?context.offset,
                        sequence_number = ?context.sequence_number,
                        device_id = ?context.device_id,
                        "{}",
                        context.message
                    );
                }
                NotificationChannel::Webhook { url } => self.post(url, &context).await,
            }
        }
    }
}
