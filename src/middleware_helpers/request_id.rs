use crate::tracing::{scope_request_id, RequestId};
use axum::{extract::Request, http::header::HeaderName, middleware::Next, response::Response};

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an id, reusing a usable `x-request-id` from the
/// client and generating one otherwise. The id goes into the request
/// extensions (picked up by the trace span), the task-local read by error
/// responses and the response header.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = request
        .headers()
        .get(&header)
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    if let Some(value) = request_id.header_value() {
        request.headers_mut().insert(header.clone(), value);
    }
    request.extensions_mut().insert(request_id.clone());

    let mut response = scope_request_id(request_id.clone(), next.run(request)).await;
    if let Some(value) = request_id.header_value() {
        response.headers_mut().insert(header, value);
    }
    response
}
