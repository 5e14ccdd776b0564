use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ChatClientConfig;
use crate::errors::{SessionError, TransportError};
use crate::exchange::{
    EMPTY_RESPONSE_TEXT, Effect, ExchangeStateMachine, NETWORK_FAILURE_TEXT,
};
use crate::frame::{Frame, FrameSplitter};
use crate::payload::parse_payload;
use crate::render::{RenderOp, Transcript};
use crate::transport::{ByteStream, ChatRequest, ChatTransport, ReqwestTransport};

/// Handle used to cancel a running exchange from outside.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The read loop stops at its next await point, including a send blocked
    /// on a full event buffer, releases the body stream and finishes with
    /// `ExchangeEnd::Cancelled`. Aborting an exchange that already ended has
    /// no effect.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// How an exchange ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeEnd {
    /// The body ended and the final text was classified.
    Completed,
    /// A protocol-level terminal signal stopped the stream.
    Terminated,
    /// Cancelled through an `AbortHandle` or by dropping the consumer.
    Cancelled,
    /// Status, missing body, connect or read failure.
    TransportFailed,
}

/// Events observed by the consumer of an `ExchangeStream`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ExchangeEvent {
    Render(RenderOp),
    ReportOpened,
    ReportDelta(String),
    ReportFinalized(String),
    /// Last event of an exchange. Dropped if the consumer is still not
    /// reading shortly after an abort.
    Finished(ExchangeEnd),
}

/// Everything an exchange produced, available after it ends.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    pub exchange_id: uuid::Uuid,
    pub end: ExchangeEnd,
    pub transcript: Transcript,
    /// Report text, present when a report surface was opened.
    pub report: Option<String>,
}

/// Runs query/response exchanges against one transport.
#[derive(Clone)]
pub struct StreamSession {
    transport: Arc<dyn ChatTransport>,
    stream_buffer_capacity: usize,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            stream_buffer_capacity: crate::config::DEFAULT_STREAM_BUFFER_CAPACITY,
        }
    }

    /// Creates a session over HTTP from client configuration.
    pub fn from_config(config: &ChatClientConfig) -> Result<Self, SessionError> {
        let transport =
            ReqwestTransport::new(config).map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(transport)).stream_buffer_capacity(config.stream_buffer_capacity))
    }

    /// Sets the bounded event buffer between the read loop and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    /// Validates the request and starts the exchange on the tokio runtime.
    ///
    /// Callers are expected to run one exchange at a time per session.
    pub async fn start(&self, request: ChatRequest) -> Result<ExchangeStream, SessionError> {
        if request.query.trim().is_empty() {
            return Err(SessionError::Validation("query must not be empty".into()));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(SessionError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        let exchange_id = uuid::Uuid::new_v4();

        tokio::spawn(run_task(
            self.transport.clone(),
            request,
            exchange_id,
            tx,
            final_tx,
            abort_rx,
        ));

        Ok(ExchangeStream {
            exchange_id,
            rx,
            final_rx,
            abort_handle: AbortHandle { tx: abort_tx },
            saw_terminal: false,
        })
    }

    /// Runs one exchange to its end and returns the outcome.
    pub async fn run(&self, request: ChatRequest) -> Result<ExchangeOutcome, SessionError> {
        self.start(request).await?.finish().await
    }
}

/// Streaming handle returned by `StreamSession::start`.
pub struct ExchangeStream {
    exchange_id: uuid::Uuid,
    rx: mpsc::Receiver<ExchangeEvent>,
    final_rx: oneshot::Receiver<ExchangeOutcome>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl ExchangeStream {
    pub fn exchange_id(&self) -> uuid::Uuid {
        self.exchange_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the exchange finished.
    pub async fn next_event(&mut self) -> Option<ExchangeEvent> {
        let event = self.rx.recv().await;
        if let Some(ExchangeEvent::Finished(_)) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events and returns the outcome.
    ///
    /// Safe to call after consuming events with `next_event()`.
    pub async fn finish(mut self) -> Result<ExchangeOutcome, SessionError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(ExchangeEvent::Finished(_)) => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }
        self.final_rx.await.map_err(|_| {
            SessionError::protocol_msg(format!(
                "exchange task ended without an outcome (exchange_id={})",
                self.exchange_id
            ))
        })
    }
}

/// How long the cancel notice and the `Finished` event may wait for a slow
/// consumer once the exchange was aborted.
const ABORT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Read-loop side of an exchange: the state machine plus everything its
/// effects feed.
struct ExchangeSink {
    exchange_id: uuid::Uuid,
    machine: ExchangeStateMachine,
    transcript: Transcript,
    report: Option<String>,
    tx: mpsc::Sender<ExchangeEvent>,
    abort_rx: watch::Receiver<bool>,
    consumer_gone: bool,
    /// Set by `Effect::Cancel`: the machine reached a terminal unit.
    cancel_requested: bool,
    /// Set once an `AbortHandle` fired, even mid-send.
    abort_requested: bool,
}

impl ExchangeSink {
    fn new(
        exchange_id: uuid::Uuid,
        tx: mpsc::Sender<ExchangeEvent>,
        abort_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            exchange_id,
            machine: ExchangeStateMachine::new(),
            transcript: Transcript::new(),
            report: None,
            tx,
            abort_rx,
            consumer_gone: false,
            cancel_requested: false,
            abort_requested: false,
        }
    }

    /// Forwards one event to the consumer.
    ///
    /// While the channel is full the send races the abort signal. If the
    /// abort wins, the pending event is dropped so the read loop can release
    /// the body without waiting for the consumer.
    async fn emit(&mut self, event: ExchangeEvent) {
        if self.consumer_gone {
            return;
        }
        if self.abort_requested {
            self.emit_after_abort(event).await;
            return;
        }
        let reserved = tokio::select! {
            biased;
            permit = self.tx.reserve() => Some(permit),
            _ = aborted(&mut self.abort_rx) => None,
        };
        match reserved {
            Some(Ok(permit)) => permit.send(event),
            Some(Err(_)) => {
                debug!(exchange_id = %self.exchange_id, "exchange consumer dropped");
                self.consumer_gone = true;
            }
            None => {
                debug!(exchange_id = %self.exchange_id, "abort requested while blocked on a full event buffer");
                self.abort_requested = true;
            }
        }
    }

    async fn emit_after_abort(&mut self, event: ExchangeEvent) {
        match tokio::time::timeout(ABORT_DRAIN_GRACE, self.tx.send(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => self.consumer_gone = true,
            Err(_) => {
                debug!(exchange_id = %self.exchange_id, "consumer idle after abort, dropping remaining events");
                self.consumer_gone = true;
            }
        }
    }

    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Render(op) => {
                    self.transcript.apply(op.clone());
                    self.emit(ExchangeEvent::Render(op)).await;
                }
                Effect::OpenReport => {
                    self.report = Some(String::new());
                    self.emit(ExchangeEvent::ReportOpened).await;
                }
                Effect::ReportDelta(text) => {
                    self.report.get_or_insert_with(String::new).push_str(&text);
                    self.emit(ExchangeEvent::ReportDelta(text)).await;
                }
                Effect::FinalizeReport(text) => {
                    self.report = Some(text.clone());
                    self.emit(ExchangeEvent::ReportFinalized(text)).await;
                }
                Effect::Cancel => {
                    debug!(exchange_id = %self.exchange_id, "state machine requested stream cancellation");
                    self.cancel_requested = true;
                }
            }
        }
    }

    /// Decodes and applies one frame. Undecodable frames are dropped.
    async fn dispatch(&mut self, frame: Frame) {
        match parse_payload(&frame.body) {
            Ok(payload) => {
                debug!(
                    exchange_id = %self.exchange_id,
                    payload_type = payload.type_name(),
                    frame_len = frame.body.len(),
                    "dispatching payload"
                );
                let effects = self.machine.apply(payload);
                self.apply_effects(effects).await;
            }
            Err(err) => {
                warn!(exchange_id = %self.exchange_id, frame_len = frame.body.len(), error = %err, "dropping undecodable frame");
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.consumer_gone || self.cancel_requested || self.abort_requested
    }

    async fn fail(&mut self, message: String) -> ExchangeEnd {
        let effects = self.machine.fail(message);
        self.apply_effects(effects).await;
        ExchangeEnd::TransportFailed
    }

    async fn cancel(&mut self) -> ExchangeEnd {
        info!(exchange_id = %self.exchange_id, "exchange cancelled");
        self.abort_requested = true;
        let effects = self.machine.abort();
        self.apply_effects(effects).await;
        ExchangeEnd::Cancelled
    }

    async fn close(mut self, end: ExchangeEnd, final_tx: oneshot::Sender<ExchangeOutcome>) {
        info!(exchange_id = %self.exchange_id, end = ?end, units = self.transcript.len(), "exchange finished");
        self.emit(ExchangeEvent::Finished(end)).await;
        let _ = final_tx.send(ExchangeOutcome {
            exchange_id: self.exchange_id,
            end,
            transcript: self.transcript,
            report: self.report,
        });
    }
}

enum Step {
    Aborted,
    ConsumerGone,
    Chunk(bytes::Bytes),
    ReadFailed(TransportError),
    EndOfData,
}

async fn run_task(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    exchange_id: uuid::Uuid,
    tx: mpsc::Sender<ExchangeEvent>,
    final_tx: oneshot::Sender<ExchangeOutcome>,
    abort_rx: watch::Receiver<bool>,
) {
    let mut sink = ExchangeSink::new(exchange_id, tx, abort_rx);
    debug!(exchange_id = %exchange_id, query_len = request.query.len(), "opening chat stream");

    let opened = tokio::select! {
        biased;
        _ = aborted(&mut sink.abort_rx) => None,
        opened = transport.open(&request) => Some(opened),
    };
    let end = match opened {
        None => sink.cancel().await,
        Some(Err(err)) => {
            warn!(exchange_id = %exchange_id, error = %err, "chat request failed");
            sink.fail(failure_text(&err)).await
        }
        Some(Ok(None)) => {
            warn!(exchange_id = %exchange_id, "chat endpoint returned no body");
            sink.fail(EMPTY_RESPONSE_TEXT.to_string()).await
        }
        Some(Ok(Some(body))) => read_body(&mut sink, body).await,
    };
    sink.close(end, final_tx).await;
}

/// Feeds the body through the splitter and state machine until the machine
/// terminates, the body ends, or the exchange is cancelled. The body stream
/// is dropped before any cancel notice is delivered.
async fn read_body(sink: &mut ExchangeSink, mut body: ByteStream) -> ExchangeEnd {
    let mut splitter = FrameSplitter::new();
    loop {
        let step = tokio::select! {
            biased;
            _ = aborted(&mut sink.abort_rx) => Step::Aborted,
            _ = sink.tx.closed() => Step::ConsumerGone,
            next = body.next() => match next {
                Some(Ok(chunk)) => Step::Chunk(chunk),
                Some(Err(err)) => Step::ReadFailed(err),
                None => Step::EndOfData,
            },
        };

        match step {
            Step::Aborted => {
                drop(body);
                return sink.cancel().await;
            }
            Step::ConsumerGone => {
                debug!(exchange_id = %sink.exchange_id, "consumer dropped, releasing stream");
                return ExchangeEnd::Cancelled;
            }
            Step::Chunk(chunk) => {
                for frame in splitter.push_chunk(&chunk) {
                    sink.dispatch(frame).await;
                    if sink.should_stop() {
                        break;
                    }
                }
                if sink.cancel_requested {
                    return ExchangeEnd::Terminated;
                }
                if sink.abort_requested {
                    drop(body);
                    return sink.cancel().await;
                }
                if sink.consumer_gone {
                    return ExchangeEnd::Cancelled;
                }
            }
            Step::ReadFailed(err) => {
                warn!(exchange_id = %sink.exchange_id, error = %err, "chat stream read failed");
                return sink.fail(NETWORK_FAILURE_TEXT.to_string()).await;
            }
            Step::EndOfData => {
                drop(body);
                if let Some(frame) = splitter.finish() {
                    sink.dispatch(frame).await;
                }
                if sink.cancel_requested {
                    return ExchangeEnd::Terminated;
                }
                if sink.abort_requested {
                    return sink.cancel().await;
                }
                let effects = sink.machine.finish();
                sink.apply_effects(effects).await;
                return ExchangeEnd::Completed;
            }
        }
    }
}

/// Resolves once cancellation was requested. Never resolves if every
/// `AbortHandle` was dropped without aborting.
async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn failure_text(err: &TransportError) -> String {
    match err {
        TransportError::Status { status, body } => {
            let body = if body.trim().is_empty() {
                "Failed to get response"
            } else {
                body.as_str()
            };
            format!("Error: {status} - {body}")
        }
        _ => NETWORK_FAILURE_TEXT.to_string(),
    }
}
