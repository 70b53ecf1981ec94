//! crates/atlas_core/src/quick_search.rs
//!
//! The command-menu lookup: a short, cached name search that runs alongside the list.

use crate::cache::ReadCaches;
use crate::debounce::{debounced, Debouncer};
use crate::domain::Tool;
use crate::ports::{GatewayResult, ToolGateway};
use crate::tunables::Tunables;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct QuickSearch {
    gateway: Arc<dyn ToolGateway>,
    caches: Arc<ReadCaches>,
    tunables: Tunables,
}

impl QuickSearch {
    pub fn new(gateway: Arc<dyn ToolGateway>, caches: Arc<ReadCaches>, tunables: Tunables) -> Self {
        Self {
            gateway,
            caches,
            tunables,
        }
    }

    /// Tools whose name contains `text`, or the top voted tools for empty input.
    pub async fn search(&self, text: &str) -> GatewayResult<Vec<Tool>> {
        let text = text.trim().to_string();
        let gateway = Arc::clone(&self.gateway);
        let limit = self.tunables.quick_search_limit;
        self.caches
            .quick
            .get_or_fetch(text.clone(), || async move {
                debug!(text = %text, limit, "Quick search.");
                gateway.quick_search(&text, limit).await
            })
            .await
    }

    /// Wires a debounced input to this search. Results arrive in input order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn input(
        self: &Arc<Self>,
    ) -> (Debouncer<String>, mpsc::UnboundedReceiver<GatewayResult<Vec<Tool>>>) {
        let (debouncer, mut settled) = debounced(String::new(), self.tunables.search_debounce);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let search = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(text) = settled.recv().await {
                if results_tx.send(search.search(&text).await).is_err() {
                    return;
                }
            }
        });
        (debouncer, results_rx)
    }
}
