use std::sync::Arc;

use crate::check::Checker;
use crate::store::KvStore;
use crate::usage::UsageLimiter;

/// Shared application state passed to all handlers and extractors.
/// Cloning is cheap: every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub checker: Checker,
    pub store: Arc<dyn KvStore>,
    pub usage: UsageLimiter,
    pub trust_proxy: bool,
}
