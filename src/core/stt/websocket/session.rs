//! Streaming recognition session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  PumpItem (mpsc, 32)  ┌──────────────────┐  SessionEvent  ┌────────────┐
//! │  Audio pump  │──────────────────────▶│  Connection task │───────────────▶│ Dispatcher │──▶ RecognizeCallback
//! │ (AudioSource)│                       │   (WebSocket)    │  (unbounded)   │            │
//! └──────┬───────┘                       └────────┬─────────┘                └────────────┘
//!        │            shutdown token              │
//!        └◀───────────────────────────────────────┘
//! ```
//!
//! The pump reads the audio source, the connection task owns the socket and
//! the protocol state, and the dispatcher is the only caller of the
//! callback. Callbacks therefore never overlap and a slow callback never
//! blocks the socket.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::audio::{AudioChunk, AudioSource};
use super::callback::RecognizeCallback;
use super::messages::{InboundMessage, OutboundFrame, StartMessage, build_websocket_url};
use crate::config::{ClientConfig, Credentials, DEFAULT_CONNECT_TIMEOUT};
use crate::core::stt::models::SpeechRecognitionResults;
use crate::core::stt::options::RecognizeOptions;
use crate::errors::{SpeechToTextError, SttResult};
use crate::utils::tls::install_crypto_provider;

// =============================================================================
// Constants
// =============================================================================

/// Maximum bytes per binary audio frame.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Per-message idle timeout for WebSocket message reception.
/// Resets after each frame. Catches stuck/dead connections.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Chunks buffered between the audio pump and the connection task.
const AUDIO_CHANNEL_CAPACITY: usize = 32;

/// Bound on sending our close frame and on waiting for the server's reply.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause before polling a live source again after it produced no data.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of a recognition session.
///
/// ```text
/// Idle → Connecting → Listening ⇄ Streaming → Stopping → Closed
///                                                      ↘ Errored
/// ```
///
/// `Errored` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Handshake complete, the service accepts audio.
    Listening,
    /// Audio frames are being sent.
    Streaming,
    /// The stop frame was sent; waiting for the last results.
    Stopping,
    Closed,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// Move to `next` unless the session already ended.
pub(super) fn transition(state: &watch::Sender<SessionState>, next: SessionState) {
    state.send_if_modified(|current| {
        if current.is_terminal() || *current == next {
            return false;
        }
        debug!("Session state {:?} -> {:?}", current, next);
        *current = next;
        true
    });
}

/// Notifications queued for the dispatcher, in delivery order.
#[derive(Debug)]
enum SessionEvent {
    Connected,
    Listening,
    Transcription(SpeechRecognitionResults),
    TranscriptionComplete,
    Error(SpeechToTextError),
    InactivityTimeout(SpeechToTextError),
    Disconnected,
}

/// Why an outbound frame did not make it onto the socket.
#[derive(Debug)]
enum SendFailure {
    /// The session was cancelled while the send was pending.
    Cancelled,
    Failed(SpeechToTextError),
}

/// Items produced by the audio pump.
#[derive(Debug)]
pub(super) enum PumpItem {
    Chunk(Bytes),
    End,
    Failed(SpeechToTextError),
}

// =============================================================================
// Session Builder
// =============================================================================

/// Configures and starts a streaming recognition session.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use watson_stt::{BytesAudioSource, NoopCallback, RecognitionSession, RecognizeOptions};
///
/// # async fn run() -> watson_stt::SttResult<()> {
/// let url = url::Url::parse("https://stream.watsonplatform.net/speech-to-text/api").unwrap();
/// let handle = RecognitionSession::new(url)
///     .audio(BytesAudioSource::new(vec![0u8; 32_000]))
///     .options(RecognizeOptions::new("audio/l16; rate=16000"))
///     .callback(Arc::new(NoopCallback))
///     .start()?;
/// handle.wait().await;
/// # Ok(())
/// # }
/// ```
pub struct RecognitionSession {
    service_url: Url,
    authorization: Option<String>,
    headers: Vec<(String, String)>,
    audio: Option<Box<dyn AudioSource>>,
    options: Option<RecognizeOptions>,
    callback: Option<Arc<dyn RecognizeCallback>>,
    chunk_size: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl RecognitionSession {
    /// Session against `service_url` (the HTTP(S) base URL of the service).
    pub fn new(service_url: Url) -> Self {
        Self {
            service_url,
            authorization: None,
            headers: Vec::new(),
            audio: None,
            options: None,
            callback: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Session using the endpoint, credentials, headers and limits of
    /// `config`.
    pub fn from_config(config: &ClientConfig) -> SttResult<Self> {
        let mut session = Self::new(config.parsed_service_url()?)
            .credentials(&config.credentials)
            .chunk_size(config.chunk_size)
            .connect_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        for (name, value) in &config.default_headers {
            session = session.header(name.clone(), value.clone());
        }
        Ok(session)
    }

    pub fn credentials(mut self, credentials: &Credentials) -> Self {
        self.authorization = credentials.authorization_header();
        self
    }

    /// Extra handshake header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn audio(mut self, audio: impl AudioSource + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn options(mut self, options: RecognizeOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn callback(mut self, callback: Arc<dyn RecognizeCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Validate the configuration and start the session in the background.
    ///
    /// Returns as soon as the session tasks are spawned; everything that
    /// happens afterwards is reported through the callback.
    ///
    /// # Errors
    /// - [`SpeechToTextError::InvalidArgument`] when the audio source, the
    ///   options or the callback is missing;
    /// - [`SpeechToTextError::InvalidConfiguration`] when the options or
    ///   limits are invalid or no tokio runtime is running.
    ///
    /// No connection is attempted when an error is returned.
    pub fn start(self) -> SttResult<SessionHandle> {
        let audio = self
            .audio
            .ok_or_else(|| SpeechToTextError::InvalidArgument("audio source is required".into()))?;
        let options = self.options.ok_or_else(|| {
            SpeechToTextError::InvalidArgument("recognize options are required".into())
        })?;
        let callback = self
            .callback
            .ok_or_else(|| SpeechToTextError::InvalidArgument("callback is required".into()))?;

        options.validate()?;
        if self.chunk_size == 0 {
            return Err(SpeechToTextError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.idle_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(SpeechToTextError::InvalidConfiguration(
                "timeouts must be greater than zero".into(),
            ));
        }

        let url = build_websocket_url(&self.service_url, &options)?;
        let request = build_request(&url, self.authorization.as_deref(), &self.headers)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SpeechToTextError::InvalidConfiguration(
                "a tokio runtime is required to start a recognition session".into(),
            )
        })?;
        install_crypto_provider();

        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let state_tx = Arc::new(state_tx);
        let (finished_tx, finished_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let shutdown = cancel.child_token();

        info!("Starting recognition session: {}", url);

        runtime.spawn(dispatch_events(
            event_rx,
            callback,
            cancel.clone(),
            state_tx.clone(),
            finished_tx,
        ));
        runtime.spawn(pump_audio(audio, self.chunk_size, audio_tx, shutdown.clone()));

        let connection = ConnectionTask {
            start: StartMessage::from_options(&options),
            connect_timeout: self.connect_timeout,
            idle_timeout: self.idle_timeout,
            audio_rx,
            events: event_tx,
            state: state_tx,
            cancel: cancel.clone(),
            shutdown,
            listening: false,
            stop_sent: false,
            completed: false,
        };
        runtime.spawn(connection.run(request));

        Ok(SessionHandle {
            state: state_rx,
            finished: finished_rx,
            cancel,
        })
    }
}

pub(super) fn build_request(
    url: &Url,
    authorization: Option<&str>,
    headers: &[(String, String)],
) -> SttResult<Request> {
    let mut request = url.as_str().into_client_request().map_err(|e| {
        SpeechToTextError::InvalidConfiguration(format!("Invalid WebSocket URL {url}: {e}"))
    })?;
    let request_headers = request.headers_mut();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            SpeechToTextError::InvalidConfiguration(format!("Invalid header name {name}: {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            SpeechToTextError::InvalidConfiguration(format!("Invalid value for header {}: {e}", name.as_str()))
        })?;
        request_headers.insert(name, value);
    }
    if let Some(authorization) = authorization {
        let mut value = HeaderValue::from_str(authorization).map_err(|_| {
            SpeechToTextError::InvalidConfiguration("Invalid authorization header".into())
        })?;
        value.set_sensitive(true);
        request_headers.insert(http::header::AUTHORIZATION, value);
    }
    Ok(request)
}

// =============================================================================
// Session Handle
// =============================================================================

/// Control handle of a running session.
///
/// Dropping the handle does not stop the session. All methods are safe to
/// call from any task or thread, in any state, any number of times.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    finished: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Tear the session down. No `on_transcription` is delivered after
    /// this returns; `on_disconnected` still is, once.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Cancelling recognition session");
            self.cancel.cancel();
        }
    }

    /// Same as [`SessionHandle::cancel`]. To end the audio gracefully and
    /// still receive the final results, end the audio source instead.
    pub fn close(&self) {
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether `on_disconnected` has been delivered.
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until the session is over and `on_disconnected` has returned.
    pub async fn wait(&self) {
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }
}

// =============================================================================
// Audio Pump
// =============================================================================

pub(super) async fn pump_audio(
    mut source: Box<dyn AudioSource>,
    chunk_size: usize,
    tx: mpsc::Sender<PumpItem>,
    shutdown: CancellationToken,
) {
    loop {
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            read = source.read(chunk_size) => read,
        };

        let mut items = Vec::new();
        match read {
            Ok(AudioChunk::Data(data)) if data.is_empty() => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(EMPTY_READ_BACKOFF) => continue,
                }
            }
            Ok(AudioChunk::Data(mut data)) => {
                // sources may ignore the size hint
                while data.len() > chunk_size {
                    items.push(PumpItem::Chunk(data.split_to(chunk_size)));
                }
                items.push(PumpItem::Chunk(data));
            }
            Ok(AudioChunk::EndOfStream) => {
                debug!("Audio source reached end of stream");
                items.push(PumpItem::End);
            }
            Err(e) => {
                warn!("Audio source read failed: {}", e);
                items.push(PumpItem::Failed(e));
            }
        }

        for item in items {
            let last = !matches!(item, PumpItem::Chunk(_));
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                sent = tx.send(item) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
            if last {
                return;
            }
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

async fn dispatch_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    callback: Arc<dyn RecognizeCallback>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
    finished: watch::Sender<bool>,
) {
    let mut disconnected = false;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected => callback.on_connected().await,
            SessionEvent::Listening => callback.on_listening().await,
            SessionEvent::Transcription(results) => {
                if cancel.is_cancelled() {
                    debug!("Dropping transcription after cancellation");
                } else {
                    callback.on_transcription(results).await;
                }
            }
            SessionEvent::TranscriptionComplete => callback.on_transcription_complete().await,
            SessionEvent::Error(error) => callback.on_error(error).await,
            SessionEvent::InactivityTimeout(error) => callback.on_inactivity_timeout(error).await,
            SessionEvent::Disconnected => {
                if !disconnected {
                    disconnected = true;
                    callback.on_disconnected().await;
                }
            }
        }
    }

    if !disconnected {
        warn!("Connection task ended without a disconnect notification");
        transition(&state, SessionState::Errored);
        callback.on_disconnected().await;
    }

    drop(callback);
    finished.send_replace(true);
}

// =============================================================================
// Connection Task
// =============================================================================

/// What the receive loop does after a frame was handled.
enum Flow {
    Continue,
    /// End the session; the close handshake is already under way.
    Finish(SessionState),
    /// Send a close frame, then end the session.
    CloseAndFinish(SessionState),
}

struct ConnectionTask {
    start: StartMessage,
    connect_timeout: Duration,
    idle_timeout: Duration,
    audio_rx: mpsc::Receiver<PumpItem>,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
    /// Cancelled by the user.
    cancel: CancellationToken,
    /// Child of `cancel`; stops the audio pump on every exit path.
    shutdown: CancellationToken,
    listening: bool,
    stop_sent: bool,
    completed: bool,
}

impl ConnectionTask {
    async fn run(mut self, request: Request) {
        let outcome = self.drive(request).await;

        self.shutdown.cancel();
        transition(&self.state, outcome);
        info!("Recognition session ended: {:?}", outcome);
        self.emit(SessionEvent::Disconnected);
    }

    async fn drive(&mut self, request: Request) -> SessionState {
        transition(&self.state, SessionState::Connecting);
        let url = request.uri().to_string();

        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Session cancelled before the connection was established");
                return SessionState::Closed;
            }
            result = timeout(self.connect_timeout, connect_async(request)) => result,
        };

        let ws_stream = match connected {
            Ok(Ok((ws_stream, response))) => {
                info!("Connected to {} ({})", url, response.status());
                ws_stream
            }
            Ok(Err(e)) => {
                return self.fail(SpeechToTextError::ConnectionError(format!(
                    "Failed to connect to {url}: {e}"
                )));
            }
            Err(_) => {
                return self.fail(SpeechToTextError::ConnectionError(format!(
                    "Connection to {url} timed out after {:?}",
                    self.connect_timeout
                )));
            }
        };
        self.emit(SessionEvent::Connected);

        let (mut sink, mut stream) = ws_stream.split();

        let start = OutboundFrame::Start(self.start.clone());
        if let Err(failure) = self.send(&mut sink, start).await {
            return self.abort(failure, &mut sink, &mut stream).await;
        }
        debug!("Sent start message");

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Recognition session cancelled");
                    close_handshake(&mut sink, &mut stream).await;
                    break SessionState::Closed;
                }

                message = timeout(self.idle_timeout, stream.next()) => {
                    match message {
                        Ok(Some(Ok(message))) => match self.handle_message(message) {
                            Flow::Continue => {}
                            Flow::Finish(state) => break state,
                            Flow::CloseAndFinish(state) => {
                                close_handshake(&mut sink, &mut stream).await;
                                break state;
                            }
                        },
                        Ok(Some(Err(e))) => {
                            break self.fail(SpeechToTextError::ConnectionError(format!(
                                "WebSocket error: {e}"
                            )));
                        }
                        Ok(None) => break self.stream_ended(),
                        Err(_elapsed) => {
                            break self.fail(SpeechToTextError::ConnectionError(format!(
                                "WebSocket idle timeout - no message for {:?}",
                                self.idle_timeout
                            )));
                        }
                    }
                }

                item = self.audio_rx.recv(), if self.listening && !self.stop_sent => {
                    match item {
                        Some(PumpItem::Chunk(data)) => {
                            let len = data.len();
                            if let Err(failure) = self.send(&mut sink, OutboundFrame::Audio(data)).await {
                                break self.abort(failure, &mut sink, &mut stream).await;
                            }
                            trace!("Sent {} bytes of audio", len);
                            transition(&self.state, SessionState::Streaming);
                        }
                        Some(PumpItem::End) | None => {
                            if let Err(failure) = self.send(&mut sink, OutboundFrame::Stop).await {
                                break self.abort(failure, &mut sink, &mut stream).await;
                            }
                            self.stop_sent = true;
                            info!("Audio stream ended, sent stop message");
                            transition(&self.state, SessionState::Stopping);
                        }
                        Some(PumpItem::Failed(e)) => {
                            close_handshake(&mut sink, &mut stream).await;
                            break self.fail(e);
                        }
                    }
                }
            }
        };

        // flushes a pending close reply
        let _ = timeout(CLOSE_HANDSHAKE_TIMEOUT, sink.close()).await;
        outcome
    }

    /// Send one frame. Gives up when the session is cancelled or the
    /// server stops reading for longer than the idle timeout.
    async fn send(&self, sink: &mut WsSink, frame: OutboundFrame) -> Result<(), SendFailure> {
        let message = frame.into_message().map_err(SendFailure::Failed)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SendFailure::Cancelled),
            sent = timeout(self.idle_timeout, sink.send(message)) => match sent {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(SendFailure::Failed(SpeechToTextError::ConnectionError(
                    format!("Failed to send frame: {e}"),
                ))),
                Err(_elapsed) => Err(SendFailure::Failed(SpeechToTextError::ConnectionError(
                    format!("Send timed out after {:?}", self.idle_timeout),
                ))),
            },
        }
    }

    /// End the session after a send did not complete.
    async fn abort(
        &self,
        failure: SendFailure,
        sink: &mut WsSink,
        stream: &mut WsSource,
    ) -> SessionState {
        match failure {
            SendFailure::Cancelled => {
                info!("Recognition session cancelled during a pending send");
                close_handshake(sink, stream).await;
                SessionState::Closed
            }
            SendFailure::Failed(e) => self.fail(e),
        }
    }

    fn handle_message(&mut self, message: Message) -> Flow {
        match message {
            Message::Text(text) => {
                debug!("Received message: {}", text);
                match InboundMessage::parse(&text) {
                    Ok(inbound) => self.handle_inbound(inbound),
                    Err(e) => {
                        warn!("Failed to parse message: {} - raw: {}", e, text);
                        self.emit(SessionEvent::Error(e));
                        Flow::Continue
                    }
                }
            }
            Message::Binary(data) => {
                debug!("Ignoring binary message: {} bytes", data.len());
                Flow::Continue
            }
            Message::Ping(_) => {
                debug!("Received ping");
                Flow::Continue
            }
            Message::Pong(_) => {
                debug!("Received pong");
                Flow::Continue
            }
            Message::Close(frame) => self.remote_closed(frame),
            Message::Frame(_) => Flow::Continue,
        }
    }

    fn handle_inbound(&mut self, inbound: InboundMessage) -> Flow {
        match inbound {
            InboundMessage::StateUpdate(state) => {
                if self.stop_sent {
                    debug!("Service finished processing audio (state: {:?})", state);
                    self.complete();
                    Flow::CloseAndFinish(SessionState::Closed)
                } else if !self.listening {
                    info!("Service is listening");
                    self.listening = true;
                    transition(&self.state, SessionState::Listening);
                    self.emit(SessionEvent::Listening);
                    Flow::Continue
                } else {
                    debug!("Ignoring repeated state update: {:?}", state);
                    Flow::Continue
                }
            }
            InboundMessage::Results(results) | InboundMessage::SpeakerLabels(results) => {
                self.emit(SessionEvent::Transcription(results));
                Flow::Continue
            }
            InboundMessage::Error(notification) => {
                let error = SpeechToTextError::from(notification);
                error!("Service error: {}", error);
                self.emit(SessionEvent::Error(error));
                Flow::CloseAndFinish(SessionState::Errored)
            }
            InboundMessage::InactivityTimeout(message) => {
                warn!("Service inactivity timeout: {}", message);
                self.emit(SessionEvent::InactivityTimeout(
                    SpeechToTextError::InactivityTimeout(message),
                ));
                Flow::CloseAndFinish(SessionState::Closed)
            }
        }
    }

    fn remote_closed(&mut self, frame: Option<CloseFrame>) -> Flow {
        let clean = frame
            .as_ref()
            .is_none_or(|f| matches!(f.code, CloseCode::Normal | CloseCode::Away));
        let description = frame
            .as_ref()
            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
            .unwrap_or_else(|| "no close frame".to_string());
        info!("Server closed the connection: {}", description);

        if !clean {
            return Flow::Finish(self.fail(SpeechToTextError::ConnectionError(format!(
                "Connection closed by server: {description}"
            ))));
        }
        if self.stop_sent {
            self.complete();
        }
        Flow::Finish(SessionState::Closed)
    }

    fn stream_ended(&mut self) -> SessionState {
        if self.stop_sent {
            info!("WebSocket stream ended");
            self.complete();
            SessionState::Closed
        } else {
            self.fail(SpeechToTextError::ConnectionError(
                "Connection closed unexpectedly".to_string(),
            ))
        }
    }

    fn complete(&mut self) {
        if !self.completed {
            self.completed = true;
            self.emit(SessionEvent::TranscriptionComplete);
        }
    }

    fn fail(&self, error: SpeechToTextError) -> SessionState {
        error!("{}", error);
        self.emit(SessionEvent::Error(error));
        SessionState::Errored
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            warn!("Dispatcher is gone, dropping session event");
        }
    }
}

/// Send a normal close frame and wait briefly for the server's reply.
async fn close_handshake(sink: &mut WsSink, stream: &mut WsSource) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    match timeout(CLOSE_HANDSHAKE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!("Failed to send close frame: {}", e);
            return;
        }
        Err(_) => {
            debug!("Server is not reading, skipping close handshake");
            return;
        }
    }
    let drained = timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(message)) = stream.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        debug!("Server did not answer the close frame in time");
    }
}
