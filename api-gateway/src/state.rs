//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use chain::Chain;

/// Shared state held by the API and handed to request handlers via Axum's
/// `State` extractor.
///
/// Holds a read-only handle onto the node's chain; the node's own event
/// loop is the only task that ever mutates it, so concurrent reads from
/// HTTP handlers are always safe.
pub struct AppState {
    pub chain: Arc<Chain>,
    pub is_validator: bool,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
