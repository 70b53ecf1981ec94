//! crates/atlas_core/src/memory.rs
//!
//! In-memory `ToolGateway` for tests and offline fixtures.
//!
//! Implements the listing contract exactly (filters, then sort, then an inclusive
//! row range) and keeps vote records per anonymous session, so vote counts stay
//! consistent with the vote set the way the hosted store's `toggle_vote` does.

use crate::domain::{License, NewSuggestion, SortKey, Suggestion, Tool, ToolPage, Vote, VoteStatus};
use crate::ports::{GatewayError, GatewayResult, RowRange, ToolGateway, ToolQuery};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    tools: Vec<Tool>,
    votes: HashSet<Vote>,
    suggestions: Vec<Suggestion>,
    session: Option<Uuid>,
}

/// A self-contained catalog held in memory.
#[derive(Default)]
pub struct InMemoryGateway {
    store: Mutex<Store>,
}

impl InMemoryGateway {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            store: Mutex::new(Store {
                tools,
                ..Store::default()
            }),
        }
    }

    /// The current anonymous session, if one was issued.
    pub async fn session(&self) -> Option<Uuid> {
        self.store.lock().await.session
    }

    pub async fn tool(&self, id: Uuid) -> Option<Tool> {
        self.store.lock().await.tools.iter().find(|t| t.id == id).cloned()
    }

    pub async fn suggestions(&self) -> Vec<Suggestion> {
        self.store.lock().await.suggestions.clone()
    }
}

impl Store {
    fn ensure_session(&mut self) -> Uuid {
        *self.session.get_or_insert_with(Uuid::new_v4)
    }
}

fn matches(tool: &Tool, query: &ToolQuery) -> bool {
    if !query.search.is_empty()
        && !tool
            .name
            .to_lowercase()
            .contains(&query.search.to_lowercase())
    {
        return false;
    }
    if let Some(category) = query.category {
        if !tool.categories.contains(&category) {
            return false;
        }
    }
    if let Some(pricing) = query.pricing {
        if tool.pricing != pricing {
            return false;
        }
    }
    match query.license {
        Some(License::Open) => tool.github.is_some(),
        Some(License::Closed) => tool.github.is_none(),
        None => true,
    }
}

fn sort_tools(tools: &mut [Tool], sort: SortKey) {
    match sort {
        SortKey::Rank => tools.sort_by(|a, b| b.vote_count.cmp(&a.vote_count)),
        SortKey::Newest => tools.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Name => tools.sort_by(|a, b| a.name.cmp(&b.name)),
    }
}

#[async_trait]
impl ToolGateway for InMemoryGateway {
    async fn list_tools(&self, query: &ToolQuery, range: RowRange) -> GatewayResult<ToolPage> {
        let store = self.store.lock().await;
        let mut matching: Vec<Tool> = store
            .tools
            .iter()
            .filter(|t| matches(t, query))
            .cloned()
            .collect();
        sort_tools(&mut matching, query.sort);

        let total_count = matching.len() as u64;
        let tools = matching
            .into_iter()
            .skip(range.start)
            .take(range.len())
            .collect();
        Ok(ToolPage { tools, total_count })
    }

    async fn quick_search(&self, text: &str, limit: usize) -> GatewayResult<Vec<Tool>> {
        let store = self.store.lock().await;
        if text.is_empty() {
            let mut top = store.tools.clone();
            sort_tools(&mut top, SortKey::Rank);
            top.truncate(limit);
            return Ok(top);
        }
        let needle = text.to_lowercase();
        Ok(store
            .tools
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn toggle_vote(&self, tool_id: Uuid) -> GatewayResult<VoteStatus> {
        let mut store = self.store.lock().await;
        let session_id = store.ensure_session();
        let vote = Vote {
            session_id,
            tool_id,
        };
        let had_vote = store.votes.contains(&vote);

        let tool = store
            .tools
            .iter_mut()
            .find(|t| t.id == tool_id)
            .ok_or_else(|| GatewayError::VoteRejected("Tool not found".to_string()))?;
        let status = if had_vote {
            tool.vote_count = tool.vote_count.saturating_sub(1);
            VoteStatus::Removed
        } else {
            tool.vote_count += 1;
            VoteStatus::Added
        };

        if had_vote {
            store.votes.remove(&vote);
        } else {
            store.votes.insert(vote);
        }
        Ok(status)
    }

    async fn user_votes(&self) -> GatewayResult<HashSet<Uuid>> {
        let store = self.store.lock().await;
        let Some(session_id) = store.session else {
            return Ok(HashSet::new());
        };
        Ok(store
            .votes
            .iter()
            .filter(|v| v.session_id == session_id)
            .map(|v| v.tool_id)
            .collect())
    }

    async fn submit_suggestion(&self, suggestion: &NewSuggestion) -> GatewayResult<()> {
        let mut store = self.store.lock().await;
        let submitted_by = store.ensure_session();
        store.suggestions.push(Suggestion {
            submitted_by,
            proposal: suggestion.clone(),
        });
        Ok(())
    }
}


#[cfg(test)]
impl InMemoryGateway {
    pub(crate) async fn tool_ids(&self) -> Vec<Uuid> {
        self.store.lock().await.tools.iter().map(|t| t.id).collect()
    }
}
