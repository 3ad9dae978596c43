//! Live build-status client: one connection, many build subscribers, bounded reconnects.
//!
//! [`LiveClient`] is a cheap handle. All state (registry, connection, backoff)
//! is owned by a single worker task that processes commands, handshake
//! results, reconnect timers and inbound frames one at a time, in arrival
//! order. Handshakes and timers run in their own tasks and report back through
//! the same queue, tagged with the generation they were started under;
//! `disconnect()` bumps the generation so anything still in flight is ignored.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{LiveError, LiveResult};
use crate::models::{
    generate_connection_id, BuildStatusUpdate, ClientSnapshot, ConnectionState, DisconnectReason,
    LifecycleEvent,
};
use crate::services::backoff::{ReconnectDecision, ReconnectPolicy};
use crate::services::registry::{Route, StatusCallback, SubscriberRegistry};
use crate::transport::{Connection, Connector, Inbound, WsConnector};

const LIFECYCLE_CHANNEL_CAPACITY: usize = 64;

enum Command {
    Connect,
    Disconnect,
    Subscribe {
        build_id: String,
        callback: StatusCallback,
    },
    Unsubscribe {
        build_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<ClientSnapshot>,
    },
    Shutdown,
    Opened {
        generation: u64,
        result: LiveResult<Box<dyn Connection>>,
    },
    Reconnect {
        generation: u64,
    },
}

/// Handle to a live-update client. Clones share the same worker.
#[derive(Clone)]
pub struct LiveClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl LiveClient {
    /// Client over the WebSocket transport. Must be called inside a tokio runtime.
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::with_connector(endpoint, policy, Arc::new(WsConnector))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoint.clone(), config.reconnect_policy())
    }

    /// Client over any transport.
    pub fn with_connector(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);

        let worker = Worker {
            endpoint: endpoint.into(),
            connector,
            registry: SubscriberRegistry::new(),
            policy,
            state: ConnectionState::Closed,
            conn: None,
            connection_id: None,
            generation: 0,
            reconnect_pending: false,
            connections_opened: 0,
            cmd_tx: cmd_tx.downgrade(),
            lifecycle_tx: lifecycle_tx.clone(),
        };
        let task = tokio::spawn(worker.run(cmd_rx));

        Self {
            cmd_tx,
            lifecycle_tx,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }

    /// Open the connection unless it is already open or opening.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and drop every subscriber.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Register `callback` for `build_id`, replacing any earlier one, and connect.
    pub fn subscribe<F>(&self, build_id: impl Into<String>, callback: F) -> LiveResult<()>
    where
        F: Fn(BuildStatusUpdate) + Send + Sync + 'static,
    {
        let build_id = build_id.into();
        if build_id.is_empty() {
            return Err(LiveError::InvalidJobId);
        }
        self.cmd_tx
            .send(Command::Subscribe {
                build_id,
                callback: Arc::new(callback),
            })
            .map_err(|_| LiveError::ClientStopped)
    }

    /// Subscribe and receive the updates on a channel instead of a callback.
    pub fn watch(
        &self,
        build_id: impl Into<String>,
    ) -> LiveResult<mpsc::UnboundedReceiver<BuildStatusUpdate>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(build_id, move |update| {
            let _ = tx.send(update);
        })?;
        Ok(rx)
    }

    /// Drop the subscriber for `build_id`; disconnects when none remain.
    pub fn unsubscribe(&self, build_id: &str) {
        self.send(Command::Unsubscribe {
            build_id: build_id.to_string(),
        });
    }

    /// Connection and registry state as of now.
    pub async fn snapshot(&self) -> LiveResult<ClientSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { reply })
            .map_err(|_| LiveError::ClientStopped)?;
        rx.await.map_err(|_| LiveError::ClientStopped)
    }

    /// Receiver for connection lifecycle notifications.
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    /// Close the connection and stop the worker. Other handles become inert.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown);
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "live client worker ended abnormally");
            }
        }
    }

    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("live client stopped; command ignored");
        }
    }
}

struct Worker {
    endpoint: String,
    connector: Arc<dyn Connector>,
    registry: SubscriberRegistry,
    policy: ReconnectPolicy,
    state: ConnectionState,
    conn: Option<Box<dyn Connection>>,
    connection_id: Option<String>,
    generation: u64,
    /// A reconnect timer for the current generation has not fired yet.
    reconnect_pending: bool,
    connections_opened: u64,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                inbound = next_inbound(&mut self.conn) => self.handle_inbound(inbound).await,
            }
        }
        self.generation += 1;
        self.close_connection().await;
        debug!(endpoint = %self.endpoint, "live client stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect().await,
            Command::Subscribe { build_id, callback } => {
                if self.registry.insert(build_id.clone(), callback) {
                    debug!(build_id = %build_id, "replaced build subscriber");
                } else {
                    debug!(build_id = %build_id, "subscribed");
                }
                self.connect();
            }
            Command::Unsubscribe { build_id } => {
                if self.registry.remove(&build_id) {
                    debug!(build_id = %build_id, "unsubscribed");
                }
                if self.registry.is_empty() {
                    self.disconnect().await;
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Opened { generation, result } => self.on_opened(generation, result).await,
            Command::Reconnect { generation } => {
                if generation != self.generation {
                    debug!(generation, "stale reconnect timer ignored");
                    return;
                }
                self.reconnect_pending = false;
                info!(
                    attempt = self.policy.attempts(),
                    max = self.policy.max_attempts(),
                    "attempting to reconnect"
                );
                self.connect();
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn connect(&mut self) {
        if self.state != ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Connecting;

        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let endpoint = self.endpoint.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = connector.open(&endpoint).await;
            match cmd_tx.upgrade() {
                Some(tx) => {
                    let _ = tx.send(Command::Opened { generation, result });
                }
                None => {
                    if let Ok(mut conn) = result {
                        conn.close().await;
                    }
                }
            }
        });
    }

    async fn disconnect(&mut self) {
        self.generation += 1;
        self.reconnect_pending = false;
        self.registry.clear();
        let was_live = self.state != ConnectionState::Closed;
        self.close_connection().await;
        if was_live {
            info!(endpoint = %self.endpoint, "build stream disconnected");
            self.emit(LifecycleEvent::Disconnected {
                reason: DisconnectReason::new("Client disconnected"),
            });
        }
    }

    async fn close_connection(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
        self.connection_id = None;
        self.state = ConnectionState::Closed;
    }

    async fn on_opened(&mut self, generation: u64, result: LiveResult<Box<dyn Connection>>) {
        if generation != self.generation {
            debug!(generation, "stale handshake result ignored");
            if let Ok(mut conn) = result {
                conn.close().await;
            }
            return;
        }

        match result {
            Ok(conn) => {
                let connection_id = generate_connection_id();
                self.conn = Some(conn);
                self.connection_id = Some(connection_id.clone());
                self.state = ConnectionState::Open;
                self.connections_opened += 1;
                self.policy.reset();
                info!(
                    connection_id = %connection_id,
                    endpoint = %self.endpoint,
                    "build stream connected"
                );
                self.emit(LifecycleEvent::Connected { connection_id });
            }
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "build stream transport error");
                self.emit(LifecycleEvent::TransportError {
                    message: e.to_string(),
                });
                self.state = ConnectionState::Closed;
                self.on_unexpected_close();
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Text(raw) => self.dispatch(&raw),
            Inbound::Error(message) => {
                error!(
                    connection_id = self.connection_id.as_deref().unwrap_or("-"),
                    error = %message,
                    "build stream transport error"
                );
                self.emit(LifecycleEvent::TransportError { message });
            }
            Inbound::Closed(reason) => {
                info!(
                    connection_id = self.connection_id.as_deref().unwrap_or("-"),
                    reason = %reason,
                    "build stream disconnected"
                );
                self.conn = None;
                self.connection_id = None;
                self.state = ConnectionState::Closed;
                self.emit(LifecycleEvent::Disconnected { reason });
                self.on_unexpected_close();
            }
        }
    }

    fn dispatch(&self, raw: &str) {
        match self.registry.route(raw) {
            Route::Deliver { callback, update } => {
                let build_id = update.build_id.clone();
                if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
                    error!(build_id = %build_id, "build subscriber panicked");
                }
            }
            Route::Unclaimed { build_id } => {
                debug!(build_id = %build_id, "no subscriber for build update; dropped");
            }
            Route::Malformed(e) => {
                warn!(error = %e, "failed to parse build status message");
                self.emit(LifecycleEvent::DecodeFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    fn on_unexpected_close(&mut self) {
        // A handshake started by subscribe() can fail while a timer is armed;
        // that timer already covers the retry.
        if self.reconnect_pending {
            debug!("reconnect already scheduled");
            return;
        }
        match self.policy.on_unexpected_close(self.registry.len()) {
            ReconnectDecision::Idle => debug!("no subscribers left; not reconnecting"),
            ReconnectDecision::Exhausted { attempts } => {
                error!(attempts, "max reconnection attempts reached");
                self.emit(LifecycleEvent::ReconnectsExhausted { attempts });
            }
            ReconnectDecision::Retry { attempt, delay } => {
                info!(
                    attempt,
                    max = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
                self.schedule_reconnect(delay);
                self.emit(LifecycleEvent::ReconnectScheduled { attempt, delay });
            }
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        self.reconnect_pending = true;
        let generation = self.generation;
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = cmd_tx.upgrade() {
                let _ = tx.send(Command::Reconnect { generation });
            }
        });
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            state: self.state,
            subscribers: self.registry.len(),
            reconnect_attempts: self.policy.attempts(),
            connections_opened: self.connections_opened,
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        // No receivers is fine.
        let _ = self.lifecycle_tx.send(event);
    }
}

async fn next_inbound(conn: &mut Option<Box<dyn Connection>>) -> Inbound {
    match conn {
        Some(conn) => conn.next().await,
        None => std::future::pending().await,
    }
}
