//! Single-page controller on top of a [`CdpTransport`].

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pagewatch_core_types::location::same_location;
use pagewatch_core_types::LoadOutcome;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex, OnceCell};
use tokio::task::{spawn, JoinHandle};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::screencast::{ScreencastFrame, ScreencastFrameParams, ScreencastRecording};
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// The page target the adapter drives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSession {
    pub target_id: String,
    pub session_id: String,
}

pub struct CdpAdapter {
    cfg: CdpConfig,
    transport: Arc<dyn CdpTransport>,
    page: OnceCell<PageSession>,
    load_epoch: watch::Sender<u64>,
    screencast: Mutex<Option<ScreencastRecording>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl CdpAdapter {
    pub fn new(cfg: CdpConfig) -> Self {
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: CdpConfig, transport: Arc<dyn CdpTransport>) -> Self {
        let (load_epoch, _) = watch::channel(0);
        Self {
            cfg,
            transport,
            page: OnceCell::new(),
            load_epoch,
            screencast: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    /// Starts the transport and the event loop, then attaches to a page target. Idempotent.
    pub async fn start(self: &Arc<Self>) -> Result<(), AdapterError> {
        if self.page.initialized() {
            return Ok(());
        }
        self.transport.start().await?;
        {
            let mut tasks = self.tasks.lock().await;
            if tasks.is_empty() {
                tasks.push(spawn(Self::event_loop(Arc::clone(self))));
            }
        }

        let session = self
            .page
            .get_or_try_init(|| async { self.attach_page().await })
            .await?;
        self.page_command("Page.enable", json!({})).await?;
        self.page_command("Runtime.enable", json!({})).await?;
        info!(
            target: "cdp-adapter",
            target_id = %session.target_id,
            "attached to page target"
        );
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            handle.abort();
        }
    }

    pub fn session(&self) -> Option<&PageSession> {
        self.page.get()
    }

    pub fn target_id(&self) -> Option<String> {
        self.page.get().map(|page| page.target_id.clone())
    }

    async fn attach_page(&self) -> Result<PageSession, AdapterError> {
        let targets = self.browser_command("Target.getTargets", json!({})).await?;
        let existing = targets
            .get("targetInfos")
            .and_then(Value::as_array)
            .and_then(|infos| {
                infos.iter().find(|info| {
                    info.get("type").and_then(Value::as_str) == Some("page")
                        && info.get("attached").and_then(Value::as_bool) != Some(true)
                })
            })
            .and_then(|info| info.get("targetId").and_then(Value::as_str))
            .map(str::to_string);

        let target_id = match existing {
            Some(id) => id,
            None => {
                let created = self
                    .browser_command("Target.createTarget", json!({ "url": "about:blank" }))
                    .await?;
                string_field(&created, "targetId")?
            }
        };

        let attached = self
            .browser_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;
        Ok(PageSession {
            target_id,
            session_id,
        })
    }

    async fn event_loop(self: Arc<Self>) {
        debug!(target: "cdp-adapter", "event loop entered");
        const MIN_BACKOFF: Duration = Duration::from_millis(100);
        const MAX_BACKOFF: Duration = Duration::from_secs(5);
        let mut backoff = MIN_BACKOFF;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.transport.next_event() => match event {
                    Some(event) => {
                        backoff = MIN_BACKOFF;
                        if let Err(err) = self.handle_event(event).await {
                            warn!(target: "cdp-adapter", %err, "event handling failed");
                        }
                    }
                    None => {
                        debug!(target: "cdp-adapter", "transport returned no event, backing off");
                        sleep(backoff).await;
                        backoff = (backoff + MIN_BACKOFF).min(MAX_BACKOFF);
                    }
                },
            }
        }
        debug!(target: "cdp-adapter", "event loop exiting");
    }

    async fn handle_event(&self, event: TransportEvent) -> Result<(), AdapterError> {
        let ours = match (self.page.get(), event.session_id.as_deref()) {
            (Some(page), Some(session)) => page.session_id == session,
            _ => false,
        };

        match event.method.as_str() {
            "Page.loadEventFired" if ours => {
                metrics::record_load_event();
                self.load_epoch.send_modify(|epoch| *epoch += 1);
            }
            "Page.screencastFrame" if ours => {
                self.on_screencast_frame(event.params).await?;
            }
            "Target.detachedFromTarget" | "Inspector.detached" => {
                warn!(target: "cdp-adapter", method = %event.method, "page session detached");
            }
            _ => {
                trace!(target: "cdp-adapter", method = %event.method, "ignored cdp event");
            }
        }
        Ok(())
    }

    async fn on_screencast_frame(&self, params: Value) -> Result<(), AdapterError> {
        let frame: ScreencastFrameParams = serde_json::from_value(params)
            .map_err(|err| AdapterError::internal(format!("bad screencast frame: {err}")))?;

        let data = STANDARD
            .decode(frame.data.as_bytes())
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        metrics::record_screencast_frame();
        {
            let mut guard = self.screencast.lock().await;
            if let Some(recording) = guard.as_mut() {
                recording.frames.push(ScreencastFrame {
                    data,
                    timestamp: frame.metadata.timestamp,
                    width: frame.metadata.device_width.round() as u32,
                    height: frame.metadata.device_height.round() as u32,
                });
            }
        }

        // Chromium stops sending frames until the previous one is acknowledged.
        self.page_command(
            "Page.screencastFrameAck",
            json!({ "sessionId": frame.session_id }),
        )
        .await?;
        Ok(())
    }

    async fn browser_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.send(CommandTarget::Browser, method, params).await
    }

    async fn page_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let session = self
            .page
            .get()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::NotAttached))?;
        self.send(
            CommandTarget::Session(session.session_id.clone()),
            method,
            params,
        )
        .await
    }

    async fn send(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let start = Instant::now();
        match self.transport.send_command(target, method, params).await {
            Ok(value) => {
                metrics::record_command(method, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method);
                Err(err)
            }
        }
    }

    fn load_epoch(&self) -> u64 {
        *self.load_epoch.borrow()
    }

    /// Waits until a load event newer than `after` fires.
    async fn wait_for_load_event(&self, after: u64, limit: Duration) -> LoadOutcome {
        let mut rx = self.load_epoch.subscribe();
        let outcome = match timeout(limit, rx.wait_for(|epoch| *epoch > after)).await {
            Ok(Ok(_)) => LoadOutcome::Completed,
            Ok(Err(_)) => LoadOutcome::Failed("load event channel closed".to_string()),
            Err(_) => LoadOutcome::TimedOut,
        };
        outcome
    }

    /// Skips when already at the normalized URL, otherwise navigates and waits for the load event.
    pub async fn navigate(&self, url: &str, limit: Duration) -> Result<LoadOutcome, AdapterError> {
        let current = self.current_url().await?;
        if same_location(&current, url) {
            debug!(target: "cdp-adapter", %url, "already at location, skipping navigate");
            return Ok(LoadOutcome::Completed);
        }

        let epoch = self.load_epoch();
        let response = self
            .page_command("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = response
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            return Ok(LoadOutcome::Failed(error.to_string()));
        }
        // same-document navigations carry no loader and fire no load event
        if response.get("loaderId").is_none() {
            return Ok(LoadOutcome::Completed);
        }
        Ok(self.wait_for_load_event(epoch, limit).await)
    }

    /// History back. A client-side history entry never fires a load event and ends `TimedOut`.
    pub async fn go_back(&self, limit: Duration) -> Result<LoadOutcome, AdapterError> {
        let history = self
            .page_command("Page.getNavigationHistory", json!({}))
            .await?;
        let index = history
            .get("currentIndex")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if index <= 0 {
            return Ok(LoadOutcome::Failed("no previous history entry".to_string()));
        }
        let entry_id = history
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|entries| entries.get(index as usize - 1))
            .and_then(|entry| entry.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| AdapterError::internal("navigation history missing previous entry"))?;

        let epoch = self.load_epoch();
        self.page_command("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
            .await?;
        Ok(self.wait_for_load_event(epoch, limit).await)
    }

    pub async fn reload(&self, limit: Duration) -> Result<LoadOutcome, AdapterError> {
        let epoch = self.load_epoch();
        self.page_command("Page.reload", json!({ "ignoreCache": true }))
            .await?;
        Ok(self.wait_for_load_event(epoch, limit).await)
    }

    /// Polls `document.readyState` until `complete`. Evaluation errors count as not ready yet.
    pub async fn wait_ready(&self, limit: Duration) -> LoadOutcome {
        let deadline = Instant::now() + limit;
        loop {
            match self.evaluate("document.readyState").await {
                Ok(Value::String(state)) if state == "complete" => return LoadOutcome::Completed,
                Ok(_) => {}
                Err(err) => trace!(target: "cdp-adapter", %err, "readyState probe failed"),
            }
            if Instant::now() >= deadline {
                return LoadOutcome::TimedOut;
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    /// PNG bytes of the visible area.
    pub async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .page_command(
                "Page.captureScreenshot",
                json!({ "format": "png", "fromSurface": true }),
            )
            .await?;
        let data = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::internal("missing screenshot data"))?;
        STANDARD
            .decode(data)
            .map_err(|err| AdapterError::internal(err.to_string()))
    }

    /// Evaluates an expression in the page, awaiting promises, and returns its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .page_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("evaluation failed")
                .to_string();
            return Err(AdapterError::new(AdapterErrorKind::ScriptException)
                .with_hint(text)
                .with_data(details.clone()));
        }

        Ok(response
            .get("result")
            .and_then(|result| result.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn bring_to_front(&self) -> Result<(), AdapterError> {
        self.page_command("Page.bringToFront", json!({}))
            .await
            .map(|_| ())
    }

    pub async fn current_url(&self) -> Result<String, AdapterError> {
        let page = self
            .page
            .get()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::NotAttached))?;
        let info = self
            .browser_command(
                "Target.getTargetInfo",
                json!({ "targetId": page.target_id }),
            )
            .await?;
        Ok(info
            .pointer("/targetInfo/url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Begins collecting screencast frames. Fails if a screencast is already running.
    pub async fn start_screencast(&self) -> Result<(), AdapterError> {
        {
            let mut guard = self.screencast.lock().await;
            if guard.is_some() {
                return Err(AdapterError::internal("screencast already running"));
            }
            *guard = Some(ScreencastRecording::default());
        }
        let params = json!({
            "format": "jpeg",
            "quality": self.cfg.screencast_quality,
            "maxWidth": self.cfg.window_width,
            "maxHeight": self.cfg.window_height,
            "everyNthFrame": 1,
        });
        if let Err(err) = self.page_command("Page.startScreencast", params).await {
            self.screencast.lock().await.take();
            return Err(err);
        }
        Ok(())
    }

    /// Stops the screencast and hands over the collected frames.
    pub async fn stop_screencast(&self) -> Result<ScreencastRecording, AdapterError> {
        let stopped = self.page_command("Page.stopScreencast", json!({})).await;
        let recording = self.screencast.lock().await.take();
        stopped?;
        recording.ok_or_else(|| AdapterError::internal("no screencast running"))
    }

    /// Drops whatever a running screencast collected.
    pub async fn discard_screencast(&self) {
        if self.screencast.lock().await.take().is_some() {
            if let Err(err) = self.page_command("Page.stopScreencast", json!({})).await {
                debug!(target: "cdp-adapter", %err, "stopScreencast during discard failed");
            }
        }
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::internal(format!("response missing {field}")))
}
