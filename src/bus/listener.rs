use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::Alert;

// ---

/// Binding side of the alert bus. Any number of publishers may connect;
/// every line they send is forwarded, unfiltered, to one channel.
#[derive(Debug)]
pub struct BusListener {
    // ---
    listener: TcpListener,
}

impl BusListener {
    // ---
    pub async fn bind(endpoint: &str) -> io::Result<Self> {
        // ---
        let listener = TcpListener::bind(endpoint).await?;
        tracing::info!("Alert bus listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept publishers until `sink` is closed.
    ///
    /// Connection readers live in a `JoinSet` owned by this future, so
    /// dropping or aborting it closes every accepted socket as well.
    pub async fn run(self, sink: mpsc::Sender<Alert>) {
        // ---
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = sink.closed() => {
                    tracing::debug!("Alert sink closed, bus listener stopping");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!("Publisher connected from {}", peer);
                        connections.spawn(read_alerts(stream, peer, sink.clone()));
                    }
                    Err(e) => {
                        tracing::warn!("Alert bus accept failed: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }
}

async fn read_alerts(stream: TcpStream, peer: SocketAddr, sink: mpsc::Sender<Alert>) {
    // ---
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(alert) = Alert::from_line(&line) else {
                    continue;
                };
                if sink.send(alert).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                tracing::info!("Publisher {} disconnected", peer);
                return;
            }
            Err(e) => {
                tracing::warn!("Alert bus receive from {} failed: {}", peer, e);
                return;
            }
        }
    }
}
