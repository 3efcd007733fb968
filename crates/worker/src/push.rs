//! Push ingress: MQTT messages into the dispatcher.

use crate::dispatcher::{Dispatcher, WriteSet};
use crate::notifications::{ErrorContext, Notifier};
use async_trait::async_trait;
use engine_core::Result;
use mqtt_client::{InboundMessage, MessageHandler};
use std::sync::Arc;
use tracing::debug;

/// Dispatches each pushed message as its own write set.
///
/// Store failures are reported with the message's device id.
pub struct DispatchHandler {
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn Notifier>,
}

impl DispatchHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            dispatcher,
            notifier,
        }
    }
}

#[async_trait]
impl MessageHandler for DispatchHandler {
    async fn handle(&self, message: InboundMessage) -> Result<()> {
        let mut write_set = WriteSet::new();
        self.dispatcher.stage(&mut write_set, &message.payload)?;

        let summary = match self.dispatcher.flush(&write_set).await {
            Ok(summary) => summary,
            Err(e) => {
                let mut context = ErrorContext::new("push-flush", &e);
                if let Some(record) = write_set.records().first() {
                    context = context.device(record.device_id());
                }
                self.notifier.report(context).await;
                return Err(e);
            }
        };
        debug!(
            topic = %message.topic,
            procedures = summary.procedures,
            records = summary.records,
            "Dispatched pushed message"
        );
        Ok(())
    }
}
