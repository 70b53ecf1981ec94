//! crates/atlas_core/src/tunables.rs
//!
//! Timing and sizing constants for the controllers, grouped so the application
//! shell can override them from its configuration.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Rows per page in both pagination modes.
    pub page_size: usize,
    /// Freshness window of cached reads.
    pub cache_ttl: Duration,
    /// Post-settlement interval during which repeat vote toggles are ignored.
    pub vote_cooldown: Duration,
    /// Quiet period before typed search text is committed.
    pub search_debounce: Duration,
    /// How long the +1/-1 indicator stays visible after an optimistic flip.
    pub vote_delta_visible: Duration,
    /// Maximum results of the quick search menu.
    pub quick_search_limit: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            page_size: 10,
            cache_ttl: Duration::from_secs(5 * 60),
            vote_cooldown: Duration::from_millis(500),
            search_debounce: Duration::from_millis(300),
            vote_delta_visible: Duration::from_secs(1),
            quick_search_limit: 10,
        }
    }
}
