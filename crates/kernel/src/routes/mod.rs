//! HTTP route handlers.

pub mod discovery;
pub mod health;
pub mod restaurant;
pub mod suggestion;

use crate::request::RequestContext;
use crate::state::AppState;

/// Context for one request, bounded by the configured timeout.
fn request_context(state: &AppState) -> RequestContext {
    RequestContext::with_timeout(state.config().request_timeout)
}

/// Lenient integer parse for query parameters; garbage means "not given".
fn parse_limit(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}
