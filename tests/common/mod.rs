//! Scripted in-memory transport for driving a `LiveClient` from tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use zupfwatch::error::{LiveError, LiveResult};
use zupfwatch::models::{DisconnectReason, LifecycleEvent};
use zupfwatch::transport::{Connection, Connector, Inbound};

/// Outcome of one `open()` call.
#[derive(Debug, Clone, Copy)]
pub enum Handshake {
    Accept,
    Refuse,
}

/// Server side of one accepted fake connection.
#[derive(Clone)]
pub struct FakeServer {
    tx: mpsc::UnboundedSender<Inbound>,
    closed_by_client: Arc<AtomicBool>,
}

impl FakeServer {
    pub fn push(&self, raw: &str) {
        let _ = self.tx.send(Inbound::Text(raw.to_string()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Inbound::Error(message.to_string()));
    }

    pub fn drop_connection(&self) {
        let _ = self.tx.send(Inbound::Closed(DisconnectReason::with_code("going away", 1001)));
    }

    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Script {
    handshakes: VecDeque<Handshake>,
    opens: Vec<Instant>,
    servers: Vec<FakeServer>,
}

/// Connector whose handshakes follow a script; unscripted opens are accepted.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(&self, handshake: Handshake) -> &Self {
        self.script.lock().unwrap().handshakes.push_back(handshake);
        self
    }

    /// Number of `open()` calls so far, accepted or refused.
    pub fn opens(&self) -> usize {
        self.script.lock().unwrap().opens.len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.script.lock().unwrap().opens.clone()
    }

    /// Server side of the `n`th accepted connection.
    pub fn server(&self, n: usize) -> FakeServer {
        self.script.lock().unwrap().servers[n].clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _endpoint: &str) -> LiveResult<Box<dyn Connection>> {
        let mut script = self.script.lock().unwrap();
        script.opens.push(Instant::now());
        match script.handshakes.pop_front().unwrap_or(Handshake::Accept) {
            Handshake::Refuse => Err(LiveError::Transport("connection refused".to_string())),
            Handshake::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let closed_by_client = Arc::new(AtomicBool::new(false));
                script.servers.push(FakeServer {
                    tx,
                    closed_by_client: Arc::clone(&closed_by_client),
                });
                Ok(Box::new(FakeConnection {
                    rx,
                    closed_by_client,
                }))
            }
        }
    }
}

struct FakeConnection {
    rx: mpsc::UnboundedReceiver<Inbound>,
    closed_by_client: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn next(&mut self) -> Inbound {
        match self.rx.recv().await {
            Some(inbound) => inbound,
            None => Inbound::Closed(DisconnectReason::new("fake server gone")),
        }
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
    }
}

/// Wait for the first lifecycle event matching `pred`, returning everything seen up to it.
pub async fn events_until<F>(
    rx: &mut broadcast::Receiver<LifecycleEvent>,
    pred: F,
) -> Vec<LifecycleEvent>
where
    F: Fn(&LifecycleEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("timed out waiting for lifecycle event")
            .expect("lifecycle channel closed");
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub async fn wait_connected(rx: &mut broadcast::Receiver<LifecycleEvent>) {
    events_until(rx, |e| matches!(e, LifecycleEvent::Connected { .. })).await;
}

/// Let the worker drain everything queued so far.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
