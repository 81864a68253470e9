//! Single OKX WebSocket connection: connect, optional login, subscribe, heartbeat, read loop
//! and close.
//!
//! A [`FeedConnection`] never reconnects. Transport failures end its read loop and are
//! reported on the fault channel.

use crate::{
    config::FeedConfig,
    credentials::Credentials,
    error::FeedError,
    exchange::okx::{
        PING,
        message::{DecodeResult, OkxDataBatch, OkxEvent, OkxEventKind, decode},
        subscription::{OkxRequest, OkxSubArg},
    },
    fault::FaultSender,
};
use async_trait::async_trait;
use chrono::Utc;
use derive_more::Display;
use futures::{
    Sink, SinkExt, Stream, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::Serialize;
use smol_str::SmolStr;
use std::{ops::ControlFlow, sync::Arc, time::Duration};
use tokio::{
    net::TcpStream,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, warn};
use url::Url;

/// Convenient type alias for a TLS capable tungstenite stream.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a [`WsStream`].
pub type WsSink = SplitSink<WsStream, Message>;

/// Read half of a [`WsStream`].
pub type WsReader = SplitStream<WsStream>;

/// Lifecycle state of a [`FeedConnection`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display)]
pub enum FeedState {
    #[default]
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
    #[display("authenticating")]
    Authenticating,
    #[display("subscribed")]
    Subscribed,
    #[display("reading")]
    Reading,
    #[display("faulted")]
    Faulted,
    #[display("closed")]
    Closed,
}

impl FeedState {
    /// True once the connection can no longer deliver data.
    pub fn is_finished(&self) -> bool {
        matches!(self, FeedState::Faulted | FeedState::Closed)
    }
}

/// Shared, observable [`FeedState`], written by the read loop and the heartbeat task.
#[derive(Debug, Clone, Default)]
pub struct FeedStatus(Arc<parking_lot::Mutex<FeedState>>);

impl FeedStatus {
    pub fn new(state: FeedState) -> Self {
        Self(Arc::new(parking_lot::Mutex::new(state)))
    }

    pub fn get(&self) -> FeedState {
        *self.0.lock()
    }

    pub fn set(&self, state: FeedState) {
        let mut current = self.0.lock();
        // Terminal states are sticky
        if !current.is_finished() {
            *current = state;
        }
    }
}

#[derive(Debug)]
struct WriterInner<S> {
    sink: S,
    closed: bool,
}

/// Serialised write handle for one connection.
///
/// Every send holds the lock for that single send only. Cloned into the heartbeat task and,
/// for the market-data feed, into the trading feed's handler for re-subscription.
#[derive(Debug)]
pub struct FeedWriter<S = WsSink> {
    inner: Arc<tokio::sync::Mutex<WriterInner<S>>>,
}

impl<S> Clone for FeedWriter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> FeedWriter<S>
where
    S: Sink<Message> + Unpin + Send,
    FeedError: From<S::Error>,
{
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(WriterInner {
                sink,
                closed: false,
            })),
        }
    }

    /// Send a text frame. Fails with [`FeedError::Closed`] once [`Self::close`] has run.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), FeedError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(FeedError::Closed);
        }
        inner.sink.send(Message::text(text.into())).await?;
        Ok(())
    }

    /// Serialise `request` as JSON and send it as a text frame.
    pub async fn send_json<T>(&self, request: &T) -> Result<(), FeedError>
    where
        T: Serialize + Sync,
    {
        let text =
            serde_json::to_string(request).map_err(|error| FeedError::Serialise(error.to_string()))?;
        self.send_text(text).await
    }

    pub async fn subscribe(&self, args: Vec<OkxSubArg>) -> Result<(), FeedError> {
        if args.is_empty() {
            return Ok(());
        }
        self.send_json(&OkxRequest::subscribe(args)).await
    }

    pub async fn unsubscribe(&self, args: Vec<OkxSubArg>) -> Result<(), FeedError> {
        if args.is_empty() {
            return Ok(());
        }
        self.send_json(&OkxRequest::unsubscribe(args)).await
    }

    /// Close the underlying sink. Idempotent: only the first call touches the sink.
    pub async fn close(&self) -> Result<(), FeedError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner.sink.close().await?;
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

/// Periodic `"ping"` writer.
///
/// The first ping is sent one interval after spawning. A failed write is reported, closes the
/// writer and marks the connection [`FeedState::Faulted`].
#[derive(Debug)]
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn<S>(
        name: SmolStr,
        writer: FeedWriter<S>,
        interval: Duration,
        status: FeedStatus,
        faults: FaultSender,
    ) -> Self
    where
        S: Sink<Message> + Unpin + Send + 'static,
        FeedError: From<S::Error>,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                if writer.is_closed().await {
                    break;
                }

                match writer.send_text(PING).await {
                    Ok(()) => debug!(feed = %name, "sent heartbeat ping"),
                    Err(error) => {
                        error!(feed = %name, %error, "heartbeat failed");
                        faults
                            .error(format!("{name} heartbeat failed: {error}"))
                            .await;
                        status.set(FeedState::Faulted);
                        if let Err(error) = writer.close().await {
                            debug!(feed = %name, %error, "failed to close writer after heartbeat failure");
                        }
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Consumer of the push data batches read by [`FeedConnection::listen`].
#[async_trait]
pub trait FeedHandler: Send {
    /// Handle one batch, in wire order. [`ControlFlow::Break`] ends the read loop quietly,
    /// used once downstream receivers have gone away.
    async fn handle_batch(&mut self, batch: OkxDataBatch) -> ControlFlow<()>;
}

/// One WebSocket connection to [`Okx`](crate::exchange::okx::Okx).
#[derive(Debug)]
pub struct FeedConnection<S = WsSink, R = WsReader> {
    name: SmolStr,
    writer: FeedWriter<S>,
    reader: R,
    status: FeedStatus,
    pending: Option<Vec<OkxSubArg>>,
    heartbeat: Option<Heartbeat>,
    faults: FaultSender,
}

impl FeedConnection {
    /// Dial `config.url` and initialise the connection.
    ///
    /// With credentials a login request is sent and `subscriptions` are deferred until the
    /// login acknowledgement arrives, otherwise they are sent immediately.
    pub async fn connect(
        config: &FeedConfig,
        credentials: Option<&Credentials>,
        subscriptions: Vec<OkxSubArg>,
        faults: FaultSender,
    ) -> Result<Self, FeedError> {
        if config.ping_interval.is_zero() {
            return Err(FeedError::PingInterval);
        }

        let url = Url::parse(&config.url).map_err(|error| FeedError::Url {
            url: config.url.clone(),
            error: error.to_string(),
        })?;

        faults
            .info(format!("Connecting {} feed to {url}", config.name))
            .await;
        debug!(feed = %config.name, %url, state = %FeedState::Connecting, "dialling");

        let (websocket, _) = connect_async(url.as_str())
            .await
            .map_err(|error| FeedError::Connect {
                url: url.to_string(),
                error: error.to_string(),
            })?;

        info!(feed = %config.name, %url, "WebSocket connected");
        let (sink, reader) = websocket.split();

        Self::init(config, sink, reader, credentials, subscriptions, faults).await
    }
}

impl<S, R> FeedConnection<S, R>
where
    S: Sink<Message> + Unpin + Send + 'static,
    FeedError: From<S::Error>,
    R: Stream<Item = Result<Message, WsError>> + Unpin + Send,
{
    /// Initialise a connection over an already open transport.
    pub async fn init(
        config: &FeedConfig,
        sink: S,
        reader: R,
        credentials: Option<&Credentials>,
        subscriptions: Vec<OkxSubArg>,
        faults: FaultSender,
    ) -> Result<Self, FeedError> {
        if config.ping_interval.is_zero() {
            return Err(FeedError::PingInterval);
        }

        let writer = FeedWriter::new(sink);
        let status = FeedStatus::new(FeedState::Connected);

        let pending = match credentials {
            Some(credentials) => {
                status.set(FeedState::Authenticating);
                writer
                    .send_json(&OkxRequest::login(credentials, Utc::now()))
                    .await?;
                faults
                    .info(format!("{} feed login sent, awaiting response", config.name))
                    .await;
                Some(subscriptions)
            }
            None => {
                let channels = subscriptions.len();
                writer.subscribe(subscriptions).await?;
                status.set(FeedState::Subscribed);
                faults
                    .info(format!("{} feed subscribed to {channels} channels", config.name))
                    .await;
                None
            }
        };

        let heartbeat = Heartbeat::spawn(
            config.name.clone(),
            writer.clone(),
            config.ping_interval,
            status.clone(),
            faults.clone(),
        );

        Ok(Self {
            name: config.name.clone(),
            writer,
            reader,
            status,
            pending,
            heartbeat: Some(heartbeat),
            faults,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FeedState {
        self.status.get()
    }

    pub fn status(&self) -> FeedStatus {
        self.status.clone()
    }

    pub fn writer(&self) -> FeedWriter<S> {
        self.writer.clone()
    }

    /// Read frames until the connection ends, handing push data to `handler` in wire order.
    ///
    /// Returns `Ok` when the server closes the connection or `handler` breaks, and the
    /// transport error otherwise. Either way the fault channel carries the reason.
    pub async fn listen<H>(&mut self, handler: &mut H) -> Result<(), FeedError>
    where
        H: FeedHandler + ?Sized,
    {
        if self.pending.is_none() {
            self.status.set(FeedState::Reading);
        }

        while let Some(message) = self.reader.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_string())
                        .unwrap_or_default();
                    warn!(feed = %self.name, %reason, "connection closed by server");
                    self.faults
                        .error(format!("{} connection closed by server {reason}", self.name))
                        .await;
                    self.status.set(FeedState::Closed);
                    return Ok(());
                }
                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    continue;
                }
                Err(error) => {
                    let error = <FeedError as From<WsError>>::from(error);
                    error!(feed = %self.name, %error, "read failed");
                    self.faults
                        .error(format!("{} read failed: {error}", self.name))
                        .await;
                    self.status.set(FeedState::Faulted);
                    return Err(error);
                }
            };

            match decode(text.as_str()) {
                Ok(DecodeResult::Pong) => {}
                Ok(DecodeResult::Control(event)) => self.handle_event(event).await?,
                Ok(DecodeResult::Data(batch)) => {
                    if handler.handle_batch(batch).await.is_break() {
                        debug!(feed = %self.name, "handler finished, stopping read loop");
                        self.status.set(FeedState::Closed);
                        return Ok(());
                    }
                }
                Ok(DecodeResult::Unrecognised) => {
                    debug!(feed = %self.name, payload = %text.as_str(), "unrecognised frame");
                }
                Err(error) => {
                    self.faults
                        .error(format!("{} skipped frame: {error}", self.name))
                        .await;
                }
            }
        }

        warn!(feed = %self.name, "connection ended");
        self.faults
            .error(format!("{} connection ended", self.name))
            .await;
        self.status.set(FeedState::Closed);
        Err(FeedError::Closed)
    }

    async fn handle_event(&mut self, event: OkxEvent) -> Result<(), FeedError> {
        match &event.kind {
            OkxEventKind::Login if event.is_login_success() => {
                info!(feed = %self.name, "login successful");
                self.faults
                    .info(format!("{} login successful, subscribing", self.name))
                    .await;
                if let Some(args) = self.pending.take() {
                    if let Err(error) = self.writer.subscribe(args).await {
                        self.faults
                            .error(format!("{} subscription failed after login: {error}", self.name))
                            .await;
                        if error.is_terminal() {
                            self.status.set(FeedState::Faulted);
                            return Err(error);
                        }
                    }
                }
                self.status.set(FeedState::Reading);
            }
            OkxEventKind::Login => {
                self.faults
                    .error(format!(
                        "{} login failed: code={} msg={}",
                        self.name,
                        event.code.as_deref().unwrap_or_default(),
                        event.detail()
                    ))
                    .await;
            }
            OkxEventKind::Subscribe | OkxEventKind::Unsubscribe => {
                let arg = event.arg.as_ref();
                self.faults
                    .info(format!(
                        "{} {} {} {}",
                        self.name,
                        if event.kind == OkxEventKind::Subscribe {
                            "subscribed to"
                        } else {
                            "unsubscribed from"
                        },
                        arg.and_then(|arg| arg.channel.as_deref())
                            .unwrap_or_default(),
                        arg.and_then(|arg| arg.inst_id.as_deref())
                            .unwrap_or_default()
                    ))
                    .await;
            }
            OkxEventKind::Error => {
                self.faults
                    .error(format!(
                        "{} error: code={} msg={}",
                        self.name,
                        event.code.as_deref().unwrap_or_default(),
                        event.detail()
                    ))
                    .await;
            }
            OkxEventKind::Other(kind) => {
                self.faults
                    .info(format!("{} event {kind}: {}", self.name, event.detail()))
                    .await;
            }
        }

        Ok(())
    }

    /// Stop the heartbeat and close the writer. Idempotent.
    pub async fn close(&mut self) -> Result<(), FeedError> {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }

        let result = self.writer.close().await;
        if let Err(error) = &result {
            warn!(feed = %self.name, %error, "failed to close writer");
        }

        self.status.set(FeedState::Closed);
        result
    }
}
