//! crates/atlas_core/src/ports.rs
//!
//! Defines the contract between the catalog core and the hosted database.
//! The `ToolGateway` trait is the boundary of the hexagon: controllers only ever talk
//! to it, so the REST adapter and the in-memory store are interchangeable.

use crate::domain::{Category, License, NewSuggestion, Pricing, SortKey, Tool, ToolPage, VoteStatus};
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

//=========================================================================================
// Gateway Error and Result Types
//=========================================================================================

/// Errors surfaced by gateway operations.
///
/// `Clone` so a single in-flight read can hand the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Transport or query failure.
    #[error("Data access error: {0}")]
    DataAccess(String),
    /// The store refused the vote action (e.g. rate limiting).
    #[error("Vote rejected: {0}")]
    VoteRejected(String),
    /// No anonymous session could be obtained.
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),
}

impl GatewayError {
    /// The message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::VoteRejected(msg) => msg.clone(),
            GatewayError::DataAccess(_) | GatewayError::SessionUnavailable(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// A convenience type alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

//=========================================================================================
// Query Contract
//=========================================================================================

/// The filter and sort part of a listing read. `None` facets mean "All".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ToolQuery {
    pub search: String,
    pub category: Option<Category>,
    pub pricing: Option<Pricing>,
    pub license: Option<License>,
    pub sort: SortKey,
}

/// A zero-based, inclusive row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    /// The rows of page `page` for a fixed `page_size`.
    pub fn for_page(page: usize, page_size: usize) -> Self {
        let start = page * page_size;
        Self {
            start,
            end: start + page_size.max(1) - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

//=========================================================================================
// Service Port
//=========================================================================================

#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Applies the name, category, pricing and license filters, then the sort, then the
    /// row range. Returns the slice and the total number of matching rows.
    async fn list_tools(&self, query: &ToolQuery, range: RowRange) -> GatewayResult<ToolPage>;

    /// Up to `limit` tools whose name contains `text`; the top voted tools when `text`
    /// is empty.
    async fn quick_search(&self, text: &str, limit: usize) -> GatewayResult<Vec<Tool>>;

    /// Flips this session's vote on a tool, acquiring an anonymous session if needed.
    async fn toggle_vote(&self, tool_id: Uuid) -> GatewayResult<VoteStatus>;

    /// Tools the current session has voted for. Empty when there is no session.
    async fn user_votes(&self) -> GatewayResult<HashSet<Uuid>>;

    /// Writes a proposal to the moderation queue, acquiring a session if needed.
    async fn submit_suggestion(&self, suggestion: &NewSuggestion) -> GatewayResult<()>;
}
