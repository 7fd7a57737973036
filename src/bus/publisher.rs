use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::{Alert, AlertCategory};

// ---

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Fire-and-forget sender side of the alert bus.
///
/// Connects lazily and reconnects on the next publish after any failure.
/// A socket the notifier closed (for example across a notifier restart) is
/// noticed before writing and replaced, and a write that hits a reset
/// connection is retried once on a fresh one. Nothing is buffered: an alert
/// published while no listener is bound is dropped, as is one whose write
/// fails twice.
#[derive(Debug)]
pub struct AlertPublisher {
    // ---
    endpoint: String,
    stream: Option<TcpStream>,
}

impl AlertPublisher {
    // ---
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            stream: None,
        }
    }

    /// Create and try an initial connection. A missing listener is not an
    /// error here.
    pub async fn connect(endpoint: impl Into<String>) -> Self {
        // ---
        let mut publisher = Self::new(endpoint);
        if publisher.ensure_connected().await {
            tracing::info!("Connected to alert bus at {}", publisher.endpoint);
        }
        publisher
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn publish_text(&mut self, text: &str, category: AlertCategory) -> bool {
        self.publish(&Alert {
            category,
            text: text.to_string(),
        })
        .await
    }

    /// Send one alert line. Returns whether it was handed to the socket,
    /// which says nothing about whether anyone received it.
    pub async fn publish(&mut self, alert: &Alert) -> bool {
        // ---
        let mut line = match alert.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Could not encode alert {:?}: {}", alert.text, e);
                return false;
            }
        };
        line.push('\n');

        self.drop_if_peer_closed();
        if !self.ensure_connected().await {
            tracing::warn!(
                "Alert bus {} unreachable, dropping alert: {}",
                self.endpoint,
                alert.text
            );
            return false;
        }

        let result = match self.send_line(&line).await {
            Err(e) if is_disconnect(&e) => {
                tracing::debug!("Alert bus connection lost ({}), reconnecting", e);
                if self.ensure_connected().await {
                    self.send_line(&line).await
                } else {
                    Err(e)
                }
            }
            other => other,
        };

        match result {
            Ok(()) => {
                tracing::debug!("Published alert: {}", alert.text);
                true
            }
            Err(e) => {
                tracing::warn!("Alert bus send failed, dropping alert {:?}: {}", alert.text, e);
                false
            }
        }
    }

    /// Flush and release the socket.
    pub async fn close(&mut self) {
        // ---
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Alert bus shutdown: {}", e);
            }
            tracing::info!("Disconnected from alert bus at {}", self.endpoint);
        }
    }

    /// Write one line; any failure releases the socket.
    async fn send_line(&mut self, line: &str) -> io::Result<()> {
        // ---
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let result = match tokio::time::timeout(SEND_TIMEOUT, stream.write_all(line.as_bytes())).await
        {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out")),
        };
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    /// Release the socket if the listener has hung up on it.
    ///
    /// The bus is one-way, so the only thing a readable socket can report is
    /// end of stream or an error. Stray bytes are discarded.
    fn drop_if_peer_closed(&mut self) {
        // ---
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let mut buf = [0u8; 64];
        let closed = match stream.try_read(&mut buf) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                tracing::debug!("Alert bus socket error: {}", e);
                true
            }
        };
        if closed {
            tracing::info!("Alert bus at {} closed the connection, reconnecting", self.endpoint);
            self.stream = None;
        }
    }

    async fn ensure_connected(&mut self) -> bool {
        // ---
        if self.stream.is_some() {
            return true;
        }
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.endpoint)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("set_nodelay failed: {}", e);
                }
                self.stream = Some(stream);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("Alert bus connect to {} failed: {}", self.endpoint, e);
                false
            }
            Err(_) => {
                tracing::debug!("Alert bus connect to {} timed out", self.endpoint);
                false
            }
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    )
}
