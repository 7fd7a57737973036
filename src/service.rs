//! The notification process as one explicit service object.
//!
//! `start` binds the bus and spawns three tasks: the bus listener, the
//! broadcast worker draining it, and the subscriber command loop. `stop`
//! aborts them and waits, which closes the listening socket and every
//! accepted publisher connection. `serve_until` restarts the tasks whenever
//! one of them ends unexpectedly (error or panic), retries a failed bind, and
//! stops cleanly once its shutdown future resolves; `run_until_interrupted`
//! uses Ctrl-C as that future.

use std::future::Future;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::BusListener;
use crate::notify::{handle_command, AlertBroadcaster, Command, Inbox, Notifier};
use crate::registry::SubscriberRegistry;
use crate::Alert;

// ---

const ALERT_QUEUE: usize = 64;
const RESTART_DELAY: Duration = Duration::from_secs(1);
const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);

pub struct NotifierService<B> {
    // ---
    endpoint: String,
    poll_timeout: Duration,
    registry: Arc<SubscriberRegistry>,
    bot: Arc<B>,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    bus: JoinHandle<()>,
    broadcast: JoinHandle<()>,
    commands: JoinHandle<()>,
}

impl<B> NotifierService<B>
where
    B: Notifier + Inbox + 'static,
{
    // ---
    pub fn new(
        endpoint: impl Into<String>,
        poll_timeout: Duration,
        registry: Arc<SubscriberRegistry>,
        bot: Arc<B>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            poll_timeout,
            registry,
            bot,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address the bus is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn broadcaster(&self) -> AlertBroadcaster<B> {
        AlertBroadcaster::new(Arc::clone(&self.registry), Arc::clone(&self.bot))
    }

    /// Bind the bus and spawn the serving tasks. No-op when already running.
    pub async fn start(&mut self) -> io::Result<()> {
        // ---
        if self.running.is_some() {
            return Ok(());
        }

        let listener = BusListener::bind(&self.endpoint).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(ALERT_QUEUE);

        let bus = tokio::spawn(listener.run(tx));
        let broadcast = tokio::spawn(broadcast_worker(self.broadcaster(), rx));
        let commands = tokio::spawn(command_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.bot),
            self.poll_timeout,
        ));

        self.running = Some(Running {
            local_addr,
            bus,
            broadcast,
            commands,
        });
        tracing::info!("Notifier service started");
        Ok(())
    }

    /// Abort the serving tasks and release their sockets.
    pub async fn stop(&mut self) {
        // ---
        let Some(running) = self.running.take() else {
            return;
        };
        for handle in [running.bus, running.broadcast, running.commands] {
            // A finished handle may already have been awaited by `failed`
            if handle.is_finished() {
                continue;
            }
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!("Notifier task panicked: {}", e);
                }
            }
        }
        tracing::info!("Notifier service stopped");
    }

    /// Resolves when one of the serving tasks ends on its own. Pending
    /// forever while stopped.
    pub async fn failed(&mut self) -> String {
        // ---
        let Some(running) = self.running.as_mut() else {
            return std::future::pending().await;
        };
        let (task, result) = tokio::select! {
            r = &mut running.bus => ("bus listener", r),
            r = &mut running.broadcast => ("broadcast worker", r),
            r = &mut running.commands => ("command loop", r),
        };
        match result {
            Ok(()) => format!("{} exited", task),
            Err(e) => format!("{} failed: {}", task, e),
        }
    }

    /// Serve until Ctrl-C, restarting after failures. Sends `greeting` once,
    /// after the first successful start.
    pub async fn run_until_interrupted(self, greeting: Option<Alert>) {
        // ---
        self.serve_until(greeting, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for Ctrl-C: {}", e);
            }
        })
        .await;
    }

    /// Serve until `shutdown` resolves, restarting after failures and
    /// retrying a bind that failed. Sends `greeting` once, after the first
    /// successful start.
    pub async fn serve_until<F>(mut self, greeting: Option<Alert>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        // ---
        tokio::pin!(shutdown);
        let mut greeting = greeting;

        loop {
            tracing::info!("(Re)starting notifier service");
            if let Err(e) = self.start().await {
                tracing::error!("Could not bind alert bus at {}: {}", self.endpoint, e);
            } else if let Some(alert) = greeting.take() {
                self.broadcaster().broadcast(&alert).await;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping notifier");
                    self.stop().await;
                    return;
                }
                reason = self.failed() => {
                    tracing::error!("Serving loop ended unexpectedly ({}), restarting", reason);
                    self.stop().await;
                }
                _ = tokio::time::sleep(RESTART_DELAY), if !self.is_running() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping notifier");
                    return;
                }
                _ = tokio::time::sleep(RESTART_DELAY) => {}
            }
        }
    }
}

async fn broadcast_worker<B: Notifier>(broadcaster: AlertBroadcaster<B>, mut rx: mpsc::Receiver<Alert>) {
    // ---
    while let Some(alert) = rx.recv().await {
        broadcaster.broadcast(&alert).await;
    }
}

async fn command_loop<B: Notifier + Inbox>(
    registry: Arc<SubscriberRegistry>,
    bot: Arc<B>,
    poll_timeout: Duration,
) {
    // ---
    let mut offset = match bot.skip_pending().await {
        Ok(offset) => offset,
        Err(e) => {
            tracing::warn!("Could not skip pending commands: {}", e);
            0
        }
    };

    loop {
        let messages = match bot.poll(offset, poll_timeout).await {
            Ok((next, messages)) => {
                offset = next;
                messages
            }
            Err(e) => {
                tracing::warn!("Polling for commands failed: {}", e);
                tokio::time::sleep(POLL_ERROR_DELAY).await;
                continue;
            }
        };

        for message in messages {
            let Some(command) = Command::parse(&message.text) else {
                continue;
            };
            let reply = handle_command(&registry, &message.chat_id, command).await;
            if let Err(e) = bot.send(&message.chat_id, &reply).await {
                tracing::warn!("Reply to {} failed: {}", message.chat_id, e);
            }
        }
    }
}

/// Outbound interface address, found by routing a UDP socket towards a
/// public address. Nothing is sent.
pub fn local_ip_address() -> String {
    // ---
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

pub fn greeting() -> Alert {
    Alert::info(format!(
        "Hello! I'm up and running :)\nMy IP address is: {}",
        local_ip_address()
    ))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::bus::AlertPublisher;
    use crate::error::NotifyError;
    use crate::notify::IncomingMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// In-memory chat: messages keep increasing update ids and are never
    /// removed, so the offset alone decides what a poll sees.
    #[derive(Default)]
    struct FakeBot {
        inbox: Mutex<Vec<(i64, IncomingMessage)>>,
        sent: Mutex<Vec<(String, String)>>,
        polls: AtomicUsize,
        crash_next_poll: AtomicBool,
    }

    impl FakeBot {
        fn push(&self, chat_id: &str, text: &str) {
            let mut inbox = self.inbox.lock().unwrap();
            let id = inbox.len() as i64 + 100;
            inbox.push((
                id,
                IncomingMessage {
                    chat_id: chat_id.into(),
                    text: text.into(),
                },
            ));
        }

        fn sent_to(&self, chat_id: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == chat_id)
                .map(|(_, text)| text.clone())
                .collect()
        }

        /// Completed polls, counting the backlog skip at startup.
        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for FakeBot {
        async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push((chat_id.into(), text.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl Inbox for FakeBot {
        async fn poll(
            &self,
            offset: i64,
            _timeout: Duration,
        ) -> Result<(i64, Vec<IncomingMessage>), NotifyError> {
            if self.crash_next_poll.swap(false, Ordering::SeqCst) {
                panic!("chat backend crashed");
            }
            let batch: Vec<(i64, IncomingMessage)> = {
                let inbox = self.inbox.lock().unwrap();
                if offset < 0 {
                    inbox.last().cloned().into_iter().collect()
                } else {
                    inbox.iter().filter(|(id, _)| *id >= offset).cloned().collect()
                }
            };
            self.polls.fetch_add(1, Ordering::SeqCst);
            if batch.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let next = batch.last().map(|(id, _)| id + 1).unwrap_or(offset);
            Ok((next, batch.into_iter().map(|(_, m)| m).collect()))
        }
    }

    async fn eventually(mut cond: impl FnMut() -> bool) {
        // ---
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    async fn free_addr() -> SocketAddr {
        TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap()
    }

    /// Publish until a running notifier accepts the alert.
    async fn publish_when_bound(addr: SocketAddr, alert: &Alert) {
        // ---
        let mut publisher = AlertPublisher::new(addr.to_string());
        for _ in 0..100 {
            if publisher.publish(alert).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("notifier never bound {}", addr);
    }

    async fn service(dir: &TempDir, bot: Arc<FakeBot>) -> NotifierService<FakeBot> {
        // ---
        let registry = SubscriberRegistry::open(
            dir.path().join("subscribers.json"),
            dir.path().join("subscribers.txt"),
        )
        .await
        .unwrap();
        NotifierService::new("127.0.0.1:0", Duration::from_secs(1), Arc::new(registry), bot)
    }

    #[tokio::test]
    async fn test_subscribe_then_receive_alerts() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        let mut service = service(&dir, Arc::clone(&bot)).await;
        service.start().await.unwrap();
        let endpoint = service.local_addr().unwrap().to_string();

        eventually(|| bot.polls() >= 1).await;
        bot.push("100", "/subscribe");
        eventually(|| bot.sent_to("100") == vec!["Subscribed".to_string()]).await;

        let mut publisher = AlertPublisher::new(endpoint);
        assert!(publisher.publish(&Alert::warning("hot box")).await);
        assert!(publisher.publish(&Alert::info("shutting down")).await);

        eventually(|| bot.sent_to("100").len() == 2).await;
        assert_eq!(bot.sent_to("100"), vec!["Subscribed", "shutting down"]);

        service.stop().await;
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_restart_rebinds_same_endpoint() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        let mut service = service(&dir, Arc::clone(&bot)).await;
        service.start().await.unwrap();
        let addr = service.local_addr().unwrap();
        service.stop().await;

        let registry = Arc::clone(&service.registry);
        registry.set_subscribed("7", true).await.unwrap();
        let mut restarted = NotifierService::new(addr.to_string(), Duration::from_secs(1), registry, Arc::clone(&bot));
        restarted.start().await.unwrap();

        let mut publisher = AlertPublisher::new(addr.to_string());
        assert!(publisher.publish(&Alert::info("after restart")).await);
        eventually(|| bot.sent_to("7") == vec!["after restart".to_string()]).await;
        restarted.stop().await;
    }

    #[tokio::test]
    async fn test_commands_queued_while_down_are_skipped() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        bot.push("stale", "/subscribe");
        bot.push("stale", "/warnings_on");

        let mut service = service(&dir, Arc::clone(&bot)).await;
        service.start().await.unwrap();
        eventually(|| bot.polls() >= 1).await;

        bot.push("fresh", "/subscribe");
        eventually(|| bot.sent_to("fresh") == vec!["Subscribed".to_string()]).await;

        assert!(bot.sent_to("stale").is_empty());
        assert_eq!(service.registry.get("stale").await, None);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_serving_loop_restarts_after_task_panic() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        bot.crash_next_poll.store(true, Ordering::SeqCst);
        let addr = free_addr().await;

        let registry = SubscriberRegistry::open(
            dir.path().join("subscribers.json"),
            dir.path().join("subscribers.txt"),
        )
        .await
        .unwrap();
        registry.set_subscribed("5", true).await.unwrap();
        let service = NotifierService::new(
            addr.to_string(),
            Duration::from_secs(1),
            Arc::new(registry),
            Arc::clone(&bot),
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(service.serve_until(Some(Alert::info("hello")), async {
            let _ = stop_rx.await;
        }));

        // The first poll crashed the command loop; a completed poll means the
        // tasks were started again
        eventually(|| bot.polls() >= 1).await;
        assert!(!bot.crash_next_poll.load(Ordering::SeqCst));

        publish_when_bound(addr, &Alert::info("after crash")).await;
        eventually(|| bot.sent_to("5").len() == 2).await;
        assert_eq!(bot.sent_to("5"), vec!["hello", "after crash"]);

        stop_tx.send(()).unwrap();
        serving.await.unwrap();
        assert!(TcpListener::bind(addr).await.is_ok(), "bus socket must be released");
    }

    #[tokio::test]
    async fn test_failed_bind_is_retried() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = blocker.local_addr().unwrap();

        let registry = SubscriberRegistry::open(
            dir.path().join("subscribers.json"),
            dir.path().join("subscribers.txt"),
        )
        .await
        .unwrap();
        registry.set_subscribed("5", true).await.unwrap();
        let service = NotifierService::new(
            addr.to_string(),
            Duration::from_secs(1),
            Arc::new(registry),
            Arc::clone(&bot),
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(service.serve_until(Some(Alert::info("hello")), async {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(bot.sent_to("5").is_empty(), "no greeting before the bus is bound");
        assert_eq!(bot.polls(), 0);

        drop(blocker);
        eventually(|| bot.sent_to("5") == vec!["hello".to_string()]).await;

        publish_when_bound(addr, &Alert::info("bound at last")).await;
        eventually(|| bot.sent_to("5").len() == 2).await;

        stop_tx.send(()).unwrap();
        serving.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_during_bind_retry_returns() {
        // ---
        let dir = TempDir::new().unwrap();
        let bot = Arc::new(FakeBot::default());
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = blocker.local_addr().unwrap();
        let service = NotifierService::new(
            addr.to_string(),
            Duration::from_secs(1),
            Arc::new(
                SubscriberRegistry::open(
                    dir.path().join("subscribers.json"),
                    dir.path().join("subscribers.txt"),
                )
                .await
                .unwrap(),
            ),
            Arc::clone(&bot),
        );

        tokio::time::timeout(
            Duration::from_secs(3),
            service.serve_until(None, tokio::time::sleep(Duration::from_millis(100))),
        )
        .await
        .expect("shutdown must not wait for the bind to succeed");
        drop(blocker);
    }

    #[test]
    fn test_greeting_is_info() {
        // ---
        let alert = greeting();
        assert!(!alert.is_warning());
        assert!(alert.text.starts_with("Hello! I'm up and running :)"));
    }
}
