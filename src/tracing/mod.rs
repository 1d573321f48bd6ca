/*!
 * Request tracing helpers
 *
 * Every request carries a [`RequestId`]. The id lives in a task-local for the
 * duration of the handler so error bodies can echo it, and it is attached to
 * the span opened by the HTTP trace layer.
 */

use axum::http::{HeaderValue, Request};
use std::{fmt, future::Future};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, OnFailure, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{Level, Span};
use uuid::Uuid;

/// Longest client-supplied id that is kept instead of replaced.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Identifier correlating logs and error bodies of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    /// Fresh random id.
    pub fn generate() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    /// Accepts a client header value when it is printable, non-empty and short.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let raw = value.to_str().ok()?.trim();
        if raw.is_empty() || raw.len() > MAX_REQUEST_ID_LEN {
            return None;
        }
        Some(RequestId::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static REQUEST_ID: RequestId;
}

/// Runs `future` with `request_id` visible through [`current_request_id`].
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<RequestId> {
    REQUEST_ID.try_with(RequestId::clone).ok()
}

/// Opens one span per request, tagged with its id and the matched path.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|rid| rid.to_string())
            .unwrap_or_default();

        tracing::info_span!(
            "http",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// Logs 5xx responses and dropped connections as errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFailure;

impl<E: fmt::Display> OnFailure<E> for LogFailure {
    fn on_failure(&mut self, failure: E, latency: std::time::Duration, _span: &Span) {
        tracing::error!(
            error = %failure,
            latency_ms = latency.as_millis() as u64,
            "request failed"
        );
    }
}

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpanMaker,
    DefaultOnRequest,
    DefaultOnResponse,
    (),
    (),
    LogFailure,
>;

/// Trace layer that logs every request at debug and every response at info.
pub fn configure_http_tracing() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpanMaker)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
        .on_body_chunk(())
        .on_eos(())
        .on_failure(LogFailure)
}
