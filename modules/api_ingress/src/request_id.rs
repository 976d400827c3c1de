use axum::http::{HeaderName, Request, Response};
use axum::{body::Body, middleware::Next};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::{field::Empty, Span};

/// Request id as seen by handlers, taken from the `x-request-id` header.
#[derive(Clone, Debug)]
pub struct XRequestId(pub String);

pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

fn header_value<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("n/a")
}

#[derive(Clone, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = nanoid::nanoid!();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Copies the request id into the request extensions for handlers.
pub async fn push_req_id_to_extensions(mut req: Request<Body>, next: Next) -> axum::response::Response {
    let rid = header_value(&req).to_owned();
    req.extensions_mut().insert(XRequestId(rid));
    next.run(req).await
}

/// Opens one `http_request` span per request.
#[derive(Clone, Debug, Default)]
pub struct HttpRequestSpan;

impl<B> MakeSpan<B> for HttpRequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %req.method(),
            path = %req.uri().path(),
            version = ?req.version(),
            request_id = %header_value(req),
            status = Empty,
            latency_ms = Empty
        )
    }
}

/// Records status and latency on the request span and logs completion.
#[derive(Clone, Debug, Default)]
pub struct RecordOutcome;

impl<B> OnResponse<B> for RecordOutcome {
    fn on_response(self, res: &Response<B>, latency: Duration, span: &Span) {
        let status = res.status();
        span.record("status", status.as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if status.is_server_error() {
            tracing::error!(parent: span, %status, "request failed");
        } else {
            tracing::debug!(parent: span, %status, "request completed");
        }
    }
}

pub type HttpTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, HttpRequestSpan, DefaultOnRequest, RecordOutcome>;

pub fn create_trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(HttpRequestSpan)
        .on_response(RecordOutcome)
}
