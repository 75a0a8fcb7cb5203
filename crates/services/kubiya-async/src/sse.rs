//! Server-Sent Events decoding for workflow streams.
//!
//! The platform multiplexes two producers onto one SSE connection. A generic
//! gateway terminates with `data: [DONE]`. The workflow engine wraps payloads
//! in a `<tag>:<json>` envelope and signals the end with tag `d` or with an
//! `end` / `finishReason` field. Heartbeat envelopes keep idle connections
//! open and are recorded on the [`StreamSession`].
//!
//! [`process_line`] is the pure state machine. [`decode_stream`] drives it
//! over a live byte stream.

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt::Display;
use std::num::FpCategory;
use std::pin::Pin;
use std::string::FromUtf8Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use crate::error::KubiyaError;
use crate::observability::{ErrorContext, ErrorSink, report};

/// Events decoded from a streaming call
///
/// Also records whether the platform ended the stream explicitly, which a
/// `[DONE]` sentinel does without producing an event.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent, KubiyaError>> + Send + 'static>>,
    ended: Arc<AtomicBool>,
}

impl EventStream {
    /// Whether an end signal or `[DONE]` has been seen
    #[must_use]
    pub fn ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent, KubiyaError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("ended", &self.ended())
            .finish_non_exhaustive()
    }
}

const DATA_PREFIX: &str = "data: ";
const RETRY_PREFIX: &str = "retry:";
const EVENT_PREFIX: &str = "event:";
const DONE_SENTINEL: &str = "[DONE]";
const END_ENVELOPE: char = 'd';

/// What kind of SSE line produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    /// A `data:` payload
    Data,
    /// A `retry:` line, passed through verbatim
    RetryDirective,
    /// An `event:` line, passed through verbatim
    EventTypeMarker,
}

/// Control signal carried by a data event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSignal {
    /// Keep-alive; the stream continues
    Heartbeat,
    /// Last event of the stream
    End,
}

/// Event payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// Parsed envelope body
    Json(Value),
    /// Payload text exactly as received
    Text(String),
}

impl StreamPayload {
    /// Payload as text; JSON bodies are re-serialized
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Json(v) => Cow::Owned(v.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }

    /// Payload as JSON, parsing text payloads on demand
    #[must_use]
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Json(v) => Some(v.clone()),
            Self::Text(s) => serde_json::from_str(s).ok(),
        }
    }
}

/// One normalized unit of a workflow stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Line kind
    pub kind: StreamEventKind,
    /// Decoded payload
    pub payload: StreamPayload,
    /// Original SSE line
    pub raw_line: String,
    /// Heartbeat or end marker, if the payload carried one
    pub signal: Option<StreamSignal>,
    /// Envelope tag character, if the payload was enveloped
    pub envelope_prefix: Option<char>,
}

impl StreamEvent {
    fn verbatim(kind: StreamEventKind, line: &str) -> Self {
        Self {
            kind,
            payload: StreamPayload::Text(line.to_string()),
            raw_line: line.to_string(),
            signal: None,
            envelope_prefix: None,
        }
    }

    /// Whether this event closed the stream
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.signal == Some(StreamSignal::End)
    }

    /// Whether this event is a keep-alive
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.signal == Some(StreamSignal::Heartbeat)
    }
}

/// Per-stream decoding state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSession {
    /// Set once; no event is produced afterwards
    pub ended: bool,
    /// Receipt time of the latest heartbeat
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Number of heartbeats seen
    pub heartbeats: u64,
    /// Number of lines handed to [`process_line`] before the end
    pub lines_processed: u64,
}

impl StreamSession {
    /// Fresh session in the open state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Classification of a single SSE line
#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
    Blank,
    Retry,
    EventType(&'a str),
    Done,
    Envelope {
        prefix: char,
        body: Value,
    },
    MalformedEnvelope(&'a str),
    Json {
        body: Value,
        payload: &'a str,
    },
    Text(&'a str),
    Ignored,
}

fn split_envelope(payload: &str) -> Option<(char, &str)> {
    let mut chars = payload.chars();
    let prefix = chars.next()?;
    if chars.next() != Some(':') {
        return None;
    }
    let body = chars.as_str();
    (!body.is_empty()).then_some((prefix, body))
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with(RETRY_PREFIX) {
        return Line::Retry;
    }
    if let Some(token) = line.strip_prefix(EVENT_PREFIX) {
        return Line::EventType(token.trim());
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Ignored;
    };
    if payload.trim() == DONE_SENTINEL {
        return Line::Done;
    }
    if let Some((prefix, body)) = split_envelope(payload) {
        return match serde_json::from_str(body) {
            Ok(body) => Line::Envelope { prefix, body },
            Err(_) => Line::MalformedEnvelope(payload),
        };
    }
    match serde_json::from_str(payload) {
        Ok(body) => Line::Json { body, payload },
        Err(_) => Line::Text(payload),
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n
            .as_f64()
            .is_some_and(|f| f.classify() != FpCategory::Zero),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Predicate deciding whether a decoded payload ends the stream
pub type TerminationRule = fn(Option<char>, &Value) -> bool;

/// Termination rules, checked in order; any match ends the stream
pub const TERMINATION_RULES: &[(&str, TerminationRule)] = &[
    ("envelope_prefix_d", |prefix, _| prefix == Some(END_ENVELOPE)),
    ("end_field", |_, body| truthy(body.get("end"))),
    ("finish_reason", |_, body| truthy(body.get("finishReason"))),
];

fn is_heartbeat(body: &Value) -> bool {
    body.get("type").and_then(Value::as_str) == Some("heartbeat")
}

/// Applies the termination and heartbeat rules to `session`
fn signal_for(session: &mut StreamSession, prefix: Option<char>, body: &Value) -> Option<StreamSignal> {
    if let Some((rule, _)) = TERMINATION_RULES.iter().find(|(_, r)| r(prefix, body)) {
        tracing::debug!(rule = *rule, "workflow stream end signal");
        session.ended = true;
        return Some(StreamSignal::End);
    }
    if is_heartbeat(body) {
        session.last_heartbeat = Some(Utc::now());
        session.heartbeats += 1;
        return Some(StreamSignal::Heartbeat);
    }
    None
}

/// Advances `session` by one SSE line
///
/// Returns the event the line produces, if any. Once the session has ended
/// every further line is ignored.
pub fn process_line(session: &mut StreamSession, line: &str) -> Option<StreamEvent> {
    if session.ended {
        return None;
    }
    session.lines_processed += 1;

    match classify(line) {
        Line::Blank => None,
        Line::Retry => Some(StreamEvent::verbatim(StreamEventKind::RetryDirective, line)),
        Line::EventType(token) => {
            tracing::trace!(token, "event type marker");
            Some(StreamEvent::verbatim(StreamEventKind::EventTypeMarker, line))
        }
        Line::Done => {
            session.ended = true;
            None
        }
        Line::Envelope { prefix, body } => {
            let signal = signal_for(session, Some(prefix), &body);
            Some(StreamEvent {
                kind: StreamEventKind::Data,
                payload: StreamPayload::Json(body),
                raw_line: line.to_string(),
                signal,
                envelope_prefix: Some(prefix),
            })
        }
        Line::Json { body, payload } => {
            let signal = signal_for(session, None, &body);
            Some(StreamEvent {
                kind: StreamEventKind::Data,
                payload: StreamPayload::Text(payload.to_string()),
                raw_line: line.to_string(),
                signal,
                envelope_prefix: None,
            })
        }
        Line::MalformedEnvelope(payload) | Line::Text(payload) => Some(StreamEvent {
            kind: StreamEventKind::Data,
            payload: StreamPayload::Text(payload.to_string()),
            raw_line: line.to_string(),
            signal: None,
            envelope_prefix: None,
        }),
        Line::Ignored => {
            tracing::trace!(line, "ignoring sse line");
            None
        }
    }
}

/// Runs the decoder over an in-memory sequence of lines
///
/// Lines after the end of the stream are not examined.
pub fn decode_lines<I, S>(lines: I) -> (Vec<StreamEvent>, StreamSession)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut session = StreamSession::new();
    let mut events = Vec::new();
    for line in lines {
        if session.ended {
            break;
        }
        events.extend(process_line(&mut session, line.as_ref()));
    }
    (events, session)
}

/// Assembles complete lines from arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    lines: VecDeque<Vec<u8>>,
    after_cr: bool,
}

impl LineBuffer {
    /// Creates an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk, splitting off every complete line it finishes
    ///
    /// `\n`, `\r` and `\r\n` all terminate a line, including a `\r\n`
    /// pair split across two chunks.
    pub fn push(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
            match byte {
                b'\n' if after_cr => {}
                b'\n' | b'\r' => self.lines.push_back(std::mem::take(&mut self.buf)),
                _ => self.buf.push(byte),
            }
        }
    }

    /// Takes the next complete line without its terminator
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not valid UTF-8.
    pub fn next_line(&mut self) -> Option<Result<String, FromUtf8Error>> {
        self.lines.pop_front().map(into_line)
    }

    /// Takes the unterminated tail left at end of input
    ///
    /// # Errors
    ///
    /// Returns an error if the tail is not valid UTF-8.
    pub fn finish(&mut self) -> Option<Result<String, FromUtf8Error>> {
        if self.buf.is_empty() {
            return None;
        }
        Some(into_line(std::mem::take(&mut self.buf)))
    }
}

fn into_line(bytes: Vec<u8>) -> Result<String, FromUtf8Error> {
    String::from_utf8(bytes)
}

struct Decoder<S> {
    body: Option<Pin<Box<S>>>,
    lines: LineBuffer,
    session: StreamSession,
    failed: bool,
    ended: Arc<AtomicBool>,
    sink: Arc<dyn ErrorSink>,
    context: ErrorContext,
}

impl<S, B, E> Decoder<S>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
{
    /// Drops the body exactly once
    fn release(&mut self) {
        if self.body.take().is_some() {
            tracing::debug!(
                lines = self.session.lines_processed,
                heartbeats = self.session.heartbeats,
                "released workflow stream"
            );
        }
    }

    fn fail(&mut self, cause: impl Display) -> KubiyaError {
        let err = KubiyaError::workflow_execution(cause);
        report(self.sink.as_ref(), &err, &self.context);
        self.failed = true;
        self.release();
        err
    }

    fn handle(&mut self, line: &str) -> Option<StreamEvent> {
        let event = process_line(&mut self.session, line);
        if self.session.ended {
            self.ended.store(true, Ordering::Release);
            self.release();
        }
        event
    }

    async fn next_event(&mut self) -> Option<Result<StreamEvent, KubiyaError>> {
        loop {
            if self.session.ended || self.failed {
                self.release();
                return None;
            }

            match self.lines.next_line() {
                Some(Ok(line)) => {
                    if let Some(event) = self.handle(&line) {
                        return Some(Ok(event));
                    }
                    continue;
                }
                Some(Err(e)) => return Some(Err(self.fail(e))),
                None => {}
            }

            let Some(body) = self.body.as_mut() else {
                return match self.lines.finish() {
                    Some(Ok(line)) => self.handle(&line).map(Ok),
                    Some(Err(e)) => Some(Err(self.fail(e))),
                    None => None,
                };
            };

            let next = body.next().await;
            match next {
                Some(Ok(chunk)) => self.lines.push(chunk.as_ref()),
                Some(Err(e)) => return Some(Err(self.fail(e))),
                None => self.release(),
            }
        }
    }
}

/// Decodes a live SSE byte stream into workflow events
///
/// The body is dropped as soon as the stream ends, fails, or the returned
/// stream itself is dropped. Failures are reported to `sink` and yielded once
/// as [`KubiyaError::WorkflowExecution`], after which the stream is finished.
pub fn decode_stream<S, B, E>(body: S, sink: Arc<dyn ErrorSink>, context: ErrorContext) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let ended = Arc::new(AtomicBool::new(false));
    let decoder = Decoder {
        body: Some(Box::pin(body)),
        lines: LineBuffer::new(),
        session: StreamSession::new(),
        failed: false,
        ended: Arc::clone(&ended),
        sink,
        context,
    };

    let inner = futures::stream::unfold(decoder, |mut decoder| async move {
        let item = decoder.next_event().await?;
        Some((item, decoder))
    });
    EventStream {
        inner: Box::pin(inner),
        ended,
    }
}

/// Decodes the body of a streaming response
pub fn event_stream_from_response(
    response: reqwest::Response,
    sink: Arc<dyn ErrorSink>,
    context: ErrorContext,
) -> EventStream {
    decode_stream(response.bytes_stream(), sink, context)
}
