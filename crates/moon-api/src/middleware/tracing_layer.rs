//! # Request/Response Tracing

/// `TraceLayer` for the agent API: one span per request with method, URI,
/// and status. 5xx responses are logged as failures.
pub fn layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    tower_http::trace::TraceLayer::new_for_http()
}
