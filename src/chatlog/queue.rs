//! Remote queue sink (AMQP 0.9.1).

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tracing::{info, warn};

use super::sink::{LogSink, SinkError};
use super::LogEntry;

/// AMQP persistent delivery mode.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Publishes records to a durable AMQP queue with publisher confirms.
///
/// Connects lazily on first append and reconnects after connection loss.
/// Every append waits for the broker's confirm, so an `Ok` return means the
/// broker has accepted the record (the at-least-once half of the delivery
/// contract; duplicates are possible when a confirm is lost on reconnect,
/// loss is not).
///
/// Wire encoding: the same sorted-key JSON object a file sink writes per
/// line, `content-type: application/json`.
pub struct QueueSink {
    host: String,
    port: u16,
    username: String,
    password: String,
    queue_name: String,
    connection: Option<Connection>,
    channel: Option<lapin::Channel>,
}

impl QueueSink {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            queue_name: queue_name.into(),
            connection: None,
            channel: None,
        }
    }

    /// Ensure a live channel with the queue declared, reconnecting if the
    /// previous connection dropped.
    async fn ensure_channel(&mut self) -> Result<(), SinkError> {
        if let Some(channel) = &self.channel {
            if channel.status().connected() {
                return Ok(());
            }
            self.channel = None;
            self.connection = None;
        }

        let uri = format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.username, self.password, self.host, self.port
        );
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        info!(host = %self.host, port = self.port, queue = %self.queue_name, "connected to message queue");
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }
}

#[async_trait]
impl LogSink for QueueSink {
    async fn append(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        self.ensure_channel().await?;
        let payload = serde_json::to_vec(entry)?;
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| SinkError::Unavailable("channel lost".to_string()))?;

        let confirmation = channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        match confirmation {
            Confirmation::Nack(_) => Err(SinkError::Unavailable(
                "broker rejected publish (nack)".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        // Confirms are awaited per publish; nothing is buffered locally.
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.channel = None;
        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.close(200, "shutdown").await
        {
            warn!(error = %e, "error closing queue connection");
        }
        Ok(())
    }
}
