//! Instrument channels
//!
//! A channel turns one [`Operation`] into one request/response exchange and
//! an event. [`CommandChannel`] speaks a vendor wire family over a
//! [`Transport`]; the native channel lives in [`crate::native`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use spectro_core::{CommandSet, Operation, SpectroCommand};
use spectro_transport::Transport;
use spectro_types::{SpectroEvent, SpectroSettings};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Callback run once the request has left for the instrument
pub type OnSent<'a> = &'a (dyn Fn() + Send + Sync);

/// One request/response path to an instrument
#[async_trait]
pub trait Channel: Send {
    /// Acquire the underlying resource
    async fn open(&mut self) -> Result<()>;

    /// Release the underlying resource; closing twice is a no-op
    async fn close(&mut self) -> Result<()>;

    /// Check whether the channel can perform `operation` at all
    fn supports(&self, operation: Operation) -> bool;

    /// Perform one exchange
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be encoded, when the
    /// exchange does not complete within `timeout` (a transport
    /// [`ReadTimeout`](spectro_transport::Error::ReadTimeout)) or when the
    /// link fails. A response that arrives is always decoded into an event,
    /// whatever it contains.
    async fn execute(
        &mut self,
        operation: Operation,
        settings: &SpectroSettings,
        timeout: Duration,
        on_sent: OnSent<'_>,
    ) -> Result<SpectroEvent>;

    /// Peer description for logs
    fn describe(&self) -> String;
}

/// Exchange whose reply has not been read to completion
struct Outstanding {
    command: Box<dyn SpectroCommand>,
    received: BytesMut,
}

/// Channel speaking a command family over a byte transport
///
/// An exchange that times out, or whose future is dropped, leaves its reply
/// unread. Before the next request the channel waits up to that request's
/// timeout for the late reply to complete and discards it, then drops any
/// other unread input, so every response is matched to its own command.
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    commands: Arc<dyn CommandSet>,
    outstanding: Option<Outstanding>,
}

impl CommandChannel {
    pub fn new(transport: Box<dyn Transport>, commands: Arc<dyn CommandSet>) -> Self {
        Self {
            transport,
            commands,
            outstanding: None,
        }
    }

    /// Read and drop the rest of an abandoned reply, then any stray input
    async fn settle(&mut self, budget: Duration) -> Result<()> {
        if let Some(stale) = self.outstanding.as_mut() {
            let deadline = Instant::now() + budget;

            while !stale.command.is_complete(&stale.received) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                match self.transport.receive(remaining).await {
                    Ok(chunk) => stale.received.extend_from_slice(&chunk),
                    Err(e) if e.is_timeout() => break,
                    Err(e) => return Err(e.into()),
                }
            }

            if stale.command.is_complete(&stale.received) {
                debug!(command = stale.command.name(), bytes = stale.received.len(), "Discarded late reply");
            } else {
                warn!(command = stale.command.name(), "Late reply never completed");
            }
            self.outstanding = None;
        }

        self.transport.discard_input().await?;
        Ok(())
    }
}

#[async_trait]
impl Channel for CommandChannel {
    async fn open(&mut self) -> Result<()> {
        if !self.transport.is_connected() {
            self.transport.connect().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.outstanding = None;
        if self.transport.is_connected() {
            self.transport.disconnect().await?;
        }
        Ok(())
    }

    fn supports(&self, operation: Operation) -> bool {
        self.commands.supports(operation)
    }

    async fn execute(
        &mut self,
        operation: Operation,
        settings: &SpectroSettings,
        timeout: Duration,
        on_sent: OnSent<'_>,
    ) -> Result<SpectroEvent> {
        let command = self.commands.command(operation, settings)?;
        let request = command.construct();

        self.settle(timeout).await?;

        debug!(
            family = self.commands.family(),
            command = command.name(),
            "Sending {} bytes",
            request.len()
        );

        let deadline = Instant::now() + timeout;
        let pending = self.outstanding.insert(Outstanding {
            command,
            received: BytesMut::new(),
        });

        if let Err(e) = self.transport.send(&request).await {
            self.outstanding = None;
            return Err(e.into());
        }
        on_sent();

        while !pending.command.is_complete(&pending.received) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(spectro_transport::Error::ReadTimeout.into());
            }

            let chunk = match self.transport.receive(remaining).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Only a timed-out reply can still turn up later
                    if !e.is_timeout() {
                        self.outstanding = None;
                    }
                    return Err(e.into());
                }
            };
            pending.received.extend_from_slice(&chunk);
            trace!(received = pending.received.len(), "Response chunk");
        }

        let event = pending.command.interpret(&pending.received);
        debug!(command = pending.command.name(), status = %event.spectro_status(), "Response decoded");
        self.outstanding = None;

        Ok(event)
    }

    fn describe(&self) -> String {
        format!("{} via {}", self.commands.family(), self.transport.remote_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectro_core::families::{GretagCommands, MinoltaCommands};
    use spectro_transport::MockTransport;
    use spectro_types::StatusMessage;

    async fn open_channel(script: &MockTransport, commands: Arc<dyn CommandSet>) -> CommandChannel {
        let mut channel = CommandChannel::new(Box::new(script.clone()), commands);
        channel.open().await.unwrap();
        channel
    }

    #[tokio::test]
    async fn test_exchange_collects_chunks() {
        let script = MockTransport::new();
        script.push_reply(b"OK00,CM-2600d,");
        script.push_reply(b"1.10,10012345\r\n");

        let mut channel = open_channel(&script, Arc::new(MinoltaCommands)).await;
        let sent = std::sync::atomic::AtomicBool::new(false);
        let event = channel
            .execute(
                Operation::Identify,
                &SpectroSettings::default(),
                Duration::from_secs(1),
                &|| sent.store(true, std::sync::atomic::Ordering::SeqCst),
            )
            .await
            .unwrap();

        assert!(sent.load(std::sync::atomic::Ordering::SeqCst));
        assert!(event.is_success());
        assert_eq!(script.sent()[0].as_ref(), b"IDR\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_times_out_on_partial_reply() {
        let script = MockTransport::new();
        script.push_reply(b"OK00,1");

        let mut channel = open_channel(&script, Arc::new(MinoltaCommands)).await;
        let result = channel
            .execute(Operation::QueryStatus, &SpectroSettings::default(), Duration::from_secs(2), &|| {})
            .await;

        assert!(matches!(
            result,
            Err(crate::Error::Transport(spectro_transport::Error::ReadTimeout))
        ));
    }

    fn spectrum() -> String {
        let mut reply = String::from("OK00");
        for n in 0..31 {
            reply.push_str(&format!(",{}.00", 40 + n));
        }
        reply.push_str("\r\n");
        reply
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_not_taken_for_the_next_response() {
        let script = MockTransport::new();
        script.push_delayed_reply(spectrum(), Duration::from_millis(1500));

        let mut channel = open_channel(&script, Arc::new(MinoltaCommands)).await;
        let wait = Duration::from_secs(1);

        let result = channel
            .execute(Operation::Measure, &SpectroSettings::default(), wait, &|| {})
            .await;
        assert!(matches!(
            result,
            Err(crate::Error::Transport(spectro_transport::Error::ReadTimeout))
        ));

        script.push_reply(b"OK00,1,1,0,1,1,1,0,0\r\n");
        let event = channel
            .execute(Operation::QueryStatus, &SpectroSettings::default(), wait, &|| {})
            .await
            .unwrap();

        assert!(event.is_success(), "{}", event);
        assert!(event.settings_payload().is_some());
        assert_eq!(script.pending(), 0);
        assert_eq!(script.sent()[1].as_ref(), b"CPR\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_exchange_is_settled_before_next_request() {
        let script = MockTransport::new();
        script.push_delayed_reply(b"OK00\r\n", Duration::from_secs(3));

        let mut channel = open_channel(&script, Arc::new(MinoltaCommands)).await;
        let calibrate = Operation::Calibrate(spectro_types::CalibrationStep::White);

        let dropped = tokio::time::timeout(
            Duration::from_secs(1),
            channel.execute(calibrate, &SpectroSettings::default(), Duration::from_secs(5), &|| {}),
        )
        .await;
        assert!(dropped.is_err());

        script.push_reply(b"OK00,CM-2600d,1.10,10012345\r\n");
        let event = channel
            .execute(Operation::Identify, &SpectroSettings::default(), Duration::from_secs(5), &|| {})
            .await
            .unwrap();

        assert!(event.is_success(), "{}", event);
        assert!(matches!(event.payload(), spectro_types::EventPayload::Identity(_)));
    }

    #[tokio::test]
    async fn test_unsupported_operation_sends_nothing() {
        let script = MockTransport::new();
        let mut channel = open_channel(&script, Arc::new(GretagCommands)).await;

        assert!(!channel.supports(Operation::QueryStandards));
        let result = channel
            .execute(Operation::QueryStandards, &SpectroSettings::default(), Duration::from_secs(1), &|| {})
            .await;

        assert!(matches!(result, Err(crate::Error::NotSupported(_))));
        assert!(script.sent().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_reply_is_an_event() {
        let script = MockTransport::new();
        script.push_reply(b"??\r\n");

        let mut channel = open_channel(&script, Arc::new(MinoltaCommands)).await;
        let event = channel
            .execute(Operation::Measure, &SpectroSettings::default(), Duration::from_secs(1), &|| {})
            .await
            .unwrap();

        assert_eq!(event.spectro_status().errors(), &[StatusMessage::UnknownString]);
    }
}
