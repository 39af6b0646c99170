//! Command/event plumbing between the adapter and one Chromium process.

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::launch;

const TARGET: &str = "cdp-transport";
const HEARTBEAT_REPLY_LIMIT: Duration = Duration::from_secs(5);

/// Protocol event as received from the browser connection.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Where a command is routed: the browser endpoint or an attached page session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Raw command/event channel to a browser. Implemented over a real connection by
/// [`ChromiumTransport`]; tests substitute scripted transports.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

type LinkFactory =
    Arc<dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<BrowserLink>, AdapterError>> + Send + Sync>;

/// Launches (or attaches to) Chromium on first use and relaunches it once the link is dead.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Arc<Mutex<Option<Arc<BrowserLink>>>>,
    connect: LinkFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let connect: LinkFactory =
            Arc::new(|cfg| Box::pin(async move { BrowserLink::open(cfg).await.map(Arc::new) }));
        Self::with_factory(cfg, connect)
    }

    fn with_factory(cfg: CdpConfig, connect: LinkFactory) -> Self {
        Self {
            cfg,
            link: Arc::new(Mutex::new(None)),
            connect,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    async fn live_link(&self) -> Result<Arc<BrowserLink>, AdapterError> {
        let mut slot = self.link.lock().await;
        match slot.as_ref() {
            Some(link) if link.is_alive() => Ok(Arc::clone(link)),
            stale => {
                if stale.is_some() {
                    warn!(target: TARGET, "browser link is dead, reconnecting");
                }
                let link = (self.connect)(self.cfg.clone()).await?;
                *slot = Some(Arc::clone(&link));
                Ok(link)
            }
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let link = self.live_link().await?;
        link.call(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
            self.deadline(),
        )
        .await
        .map(|_| ())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.live_link().await {
            Ok(link) => link.next_event().await,
            Err(err) => {
                warn!(target: TARGET, %err, "no browser link for events");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let link = self.live_link().await?;
        link.call(target, method, params, self.deadline()).await
    }
}

/// One websocket connection plus the tasks that service it.
struct BrowserLink {
    outgoing: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    alive: Arc<AtomicBool>,
    stop: CancellationToken,
    pump: JoinHandle<()>,
    child: Option<Child>,
}

impl BrowserLink {
    async fn open(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let (child, url) = launch::launch(&cfg).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::io(err.to_string()))?;
        info!(target: TARGET, url = %ws_url, "connected to chromium");

        let (outgoing, outgoing_rx) = mpsc::channel(128);
        let (events_tx, events) = mpsc::channel(512);
        let alive = Arc::new(AtomicBool::new(true));
        let stop = CancellationToken::new();

        let pump = tokio::spawn(Pump::new(conn, events_tx).run(outgoing_rx, Arc::clone(&alive)));
        if cfg.heartbeat_interval_ms > 0 {
            tokio::spawn(heartbeat(
                outgoing.clone(),
                Arc::clone(&alive),
                stop.clone(),
                Duration::from_millis(cfg.heartbeat_interval_ms),
                Duration::from_millis(cfg.default_deadline_ms).min(HEARTBEAT_REPLY_LIMIT),
            ));
        }

        Ok(Self {
            outgoing,
            events: Mutex::new(events),
            alive,
            stop,
            pump,
            child,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (reply, response) = oneshot::channel();
        self.outgoing
            .send(Outgoing {
                target,
                method: method.to_string(),
                params,
                reply,
            })
            .await
            .map_err(|_| AdapterError::io("command channel closed"))?;

        match timeout(deadline, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::io("connection dropped before the reply")),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{method} timed out"))),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for BrowserLink {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.stop.cancel();
        self.pump.abort();
        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: TARGET, %err, "failed to stop chromium");
                    }
                });
            }
            Err(_) => debug!(target: TARGET, "runtime gone, chromium left to exit on its own"),
        }
    }
}

/// Moves commands onto the socket and replies/events off it.
struct Pump {
    conn: Connection<CdpEventMessage>,
    events: mpsc::Sender<TransportEvent>,
    pending: HashMap<CallId, Reply>,
}

impl Pump {
    fn new(conn: Connection<CdpEventMessage>, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            conn,
            events,
            pending: HashMap::new(),
        }
    }

    async fn run(mut self, mut outgoing: mpsc::Receiver<Outgoing>, alive: Arc<AtomicBool>) {
        let closing = loop {
            tokio::select! {
                Some(command) = outgoing.recv() => self.submit(command),
                message = self.conn.next() => match message {
                    Some(Ok(Message::Response(response))) => self.resolve(response),
                    Some(Ok(Message::Event(event))) => self.forward(event).await,
                    Some(Err(err)) => break classify(err),
                    None => break AdapterError::io("cdp connection closed"),
                },
            }
        };
        alive.store(false, Ordering::Relaxed);
        warn!(target: TARGET, err = %closing, "browser link closed");
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(closing.clone()));
        }
    }

    fn submit(&mut self, command: Outgoing) {
        let session = match command.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
        };
        let method: MethodId = command.method.into();
        match self.conn.submit_command(method, session, command.params) {
            Ok(call) => {
                self.pending.insert(call, command.reply);
            }
            Err(err) => {
                let _ = command.reply.send(Err(AdapterError::io(err.to_string())));
            }
        }
    }

    fn resolve(&mut self, response: Response) {
        let Some(reply) = self.pending.remove(&response.id) else {
            debug!(target: TARGET, id = ?response.id, "reply for an unknown call");
            return;
        };
        let _ = reply.send(response_payload(response));
    }

    async fn forward(&mut self, event: CdpEventMessage) {
        let raw: CdpJsonEventMessage = match event.try_into() {
            Ok(raw) => raw,
            Err(err) => {
                warn!(target: TARGET, %err, "undecodable event dropped");
                return;
            }
        };
        let event = TransportEvent {
            method: raw.method.into_owned(),
            params: raw.params,
            session_id: raw.session_id,
        };
        if self.events.send(event).await.is_err() {
            debug!(target: TARGET, "event receiver gone");
        }
    }
}

fn response_payload(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))
            .retriable(error.code >= 500)),
        (None, None) => Err(AdapterError::internal("empty cdp response")),
    }
}

fn classify(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::Serde(_) | CdpError::JavascriptException(_) | CdpError::FrameNotFound(_) => {
            AdapterError::internal(hint)
        }
        _ => AdapterError::io(hint),
    }
}

/// Probes the browser with `Browser.getVersion`; the first failure marks the link dead so the
/// next command reconnects.
async fn heartbeat(
    outgoing: mpsc::Sender<Outgoing>,
    alive: Arc<AtomicBool>,
    stop: CancellationToken,
    every: Duration,
    reply_limit: Duration,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let (reply, response) = oneshot::channel();
        let probe = Outgoing {
            target: CommandTarget::Browser,
            method: "Browser.getVersion".to_string(),
            params: json!({}),
            reply,
        };
        if outgoing.send(probe).await.is_err() {
            return;
        }
        let failure = match timeout(reply_limit, response).await {
            Ok(Ok(Ok(_))) => continue,
            Ok(Ok(Err(err))) => err.to_string(),
            Ok(Err(_)) => "reply dropped".to_string(),
            Err(_) => "no reply".to_string(),
        };
        warn!(target: TARGET, %failure, "heartbeat failed");
        alive.store(false, Ordering::Relaxed);
        return;
    }
}
