//! Scripted in-memory transport
//!
//! Replays queued replies in order and records every write. Clones share
//! the same script, so a test keeps one handle to script and inspect the
//! exchange while a driver owns the other.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::{error::*, Transport};

#[derive(Debug)]
enum Step {
    /// Not deliverable before `after_sends` writes; `due` is fixed by the
    /// first read that waits for it from then on
    Reply {
        data: Bytes,
        delay: Duration,
        after_sends: usize,
        due: Option<Instant>,
    },
    Close,
}

#[derive(Debug, Default)]
struct Script {
    connected: bool,
    fail_connect: bool,
    connects: usize,
    steps: VecDeque<Step>,
    sent: Vec<Bytes>,
}

/// Scripted transport for tests and demos
///
/// With nothing queued, `receive` waits for the full timeout and fails with
/// [`Error::ReadTimeout`], which is what a silent instrument looks like.
///
/// A queued reply answers the next `send`: it cannot arrive before that
/// write happened. A delayed reply starts its clock at the first `receive`
/// that waits for it and stays queued until it has been delivered, so a
/// reply that misses one read is still there for the next one.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use spectro_transport::{MockTransport, Transport};
///
/// # tokio_test_block(async {
/// let script = MockTransport::new();
/// script.push_reply(b"OK00\r\n");
///
/// let mut transport = script.clone();
/// transport.connect().await.unwrap();
/// transport.send(b"CWR\r\n").await.unwrap();
/// let reply = transport.receive(Duration::from_secs(1)).await.unwrap();
///
/// assert_eq!(&reply[..], b"OK00\r\n");
/// assert_eq!(script.sent()[0].as_ref(), b"CWR\r\n");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `connect` fail
    pub fn with_failing_connect(self) -> Self {
        self.script.lock().fail_connect = true;
        self
    }

    /// Queue a reply to the next `send`, delivered as soon as it is read
    pub fn push_reply(&self, data: impl AsRef<[u8]>) {
        self.push_delayed_reply(data, Duration::ZERO);
    }

    /// Queue a reply to the next `send`, delivered `delay` after the first
    /// read that waits for it
    pub fn push_delayed_reply(&self, data: impl AsRef<[u8]>, delay: Duration) {
        let mut script = self.script.lock();
        let after_sends = script.sent.len() + 1;
        script.steps.push_back(Step::Reply {
            data: Bytes::copy_from_slice(data.as_ref()),
            delay,
            after_sends,
            due: None,
        });
    }

    /// Queue the peer closing the connection
    pub fn push_close(&self) {
        self.script.lock().steps.push_back(Step::Close);
    }

    /// Everything written so far, one entry per `send`
    pub fn sent(&self) -> Vec<Bytes> {
        self.script.lock().sent.clone()
    }

    /// Number of successful `connect` calls
    pub fn connect_count(&self) -> usize {
        self.script.lock().connects
    }

    /// Number of replies still queued
    pub fn pending(&self) -> usize {
        self.script.lock().steps.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut script = self.script.lock();

        if script.fail_connect {
            return Err(Error::Injected("connect refused".into()));
        }
        if script.connected {
            return Err(Error::AlreadyConnected);
        }

        script.connected = true;
        script.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.script.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut script = self.script.lock();

        if !script.connected {
            return Err(Error::NotConnected);
        }

        trace!("Mock sent {} bytes", data.len());
        script.sent.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let deadline = Instant::now() + wait;

        let arrival = {
            let mut script = self.script.lock();

            if !script.connected {
                return Err(Error::NotConnected);
            }

            if matches!(script.steps.front(), Some(Step::Close)) {
                script.steps.pop_front();
                script.connected = false;
                return Err(Error::ConnectionClosed);
            }

            let sends = script.sent.len();
            match script.steps.front_mut() {
                Some(Step::Reply {
                    delay,
                    after_sends,
                    due,
                    ..
                }) if sends >= *after_sends => Some(*due.get_or_insert_with(|| Instant::now() + *delay)),
                _ => None,
            }
        };

        match arrival {
            Some(due) if due <= deadline => {
                tokio::time::sleep_until(due).await;

                let mut script = self.script.lock();
                match script.steps.pop_front() {
                    Some(Step::Reply { data, .. }) => Ok(BytesMut::from(&data[..])),
                    Some(other) => {
                        // Another handle rearranged the script meanwhile
                        script.steps.push_front(other);
                        Err(Error::ReadTimeout)
                    }
                    None => Err(Error::ReadTimeout),
                }
            }
            _ => {
                tokio::time::sleep_until(deadline).await;
                Err(Error::ReadTimeout)
            }
        }
    }

    async fn discard_input(&mut self) -> Result<usize> {
        let mut script = self.script.lock();

        if !script.connected {
            return Err(Error::NotConnected);
        }

        let now = Instant::now();
        let mut discarded = 0;
        loop {
            let arrived = match script.steps.front() {
                Some(Step::Reply { data, due: Some(due), .. }) if *due <= now => data.len(),
                _ => break,
            };
            discarded += arrived;
            script.steps.pop_front();
        }

        if discarded > 0 {
            trace!("Mock discarded {} bytes", discarded);
        }
        Ok(discarded)
    }

    fn remote_addr(&self) -> String {
        "mock".to_string()
    }
}
