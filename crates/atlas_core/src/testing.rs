//! Test fixtures: catalog builders and a scripted gateway wrapper that counts
//! calls, injects failures and can hold calls open until released.

use crate::domain::{Category, NewSuggestion, Pricing, Tool, ToolPage, VoteStatus};
use crate::memory::InMemoryGateway;
use crate::ports::{GatewayError, GatewayResult, RowRange, ToolGateway, ToolQuery};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

pub fn tool(name: &str, votes: u32) -> Tool {
    Tool {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{name} is an AI coding tool."),
        url: format!("https://{}.dev", name.to_lowercase().replace(' ', "-")),
        github: None,
        pricing: Pricing::Freemium,
        categories: vec![Category::Ide],
        tags: vec!["assistant".to_string()],
        vote_count: votes,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
            + ChronoDuration::days(votes as i64),
    }
}

pub fn catalog() -> Vec<Tool> {
    let mut aider = tool("Aider", 42);
    aider.github = Some("https://github.com/Aider-AI/aider".into());
    aider.pricing = Pricing::Free;
    aider.categories = vec![Category::Cli];

    let mut cursor = tool("Cursor", 120);
    cursor.pricing = Pricing::Paid;

    let mut cline = tool("Cline", 77);
    cline.github = Some("https://github.com/cline/cline".into());
    cline.pricing = Pricing::Free;
    cline.categories = vec![Category::Ide, Category::Cli];

    let mut bolt = tool("Bolt", 15);
    bolt.categories = vec![Category::Web];

    vec![aider, cursor, cline, bolt]
}

/// Wraps an `InMemoryGateway` with call accounting and failure injection.
pub struct ScriptedGateway {
    pub inner: InMemoryGateway,
    pub list_calls: AtomicUsize,
    pub toggle_calls: AtomicUsize,
    pub vote_set_calls: AtomicUsize,
    pub quick_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub list_log: Mutex<Vec<(ToolQuery, RowRange)>>,
    fail_toggle: Mutex<Option<GatewayError>>,
    fail_list: Mutex<Option<GatewayError>>,
    fail_submit: Mutex<Option<GatewayError>>,
    toggle_gate: Mutex<Option<Arc<Notify>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGateway {
    pub fn new(tools: Vec<Tool>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryGateway::new(tools),
            list_calls: AtomicUsize::new(0),
            toggle_calls: AtomicUsize::new(0),
            vote_set_calls: AtomicUsize::new(0),
            quick_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            list_log: Mutex::new(Vec::new()),
            fail_toggle: Mutex::new(None),
            fail_list: Mutex::new(None),
            fail_submit: Mutex::new(None),
            toggle_gate: Mutex::new(None),
            list_gate: Mutex::new(None),
        })
    }

    pub async fn fail_toggles_with(&self, error: GatewayError) {
        *self.fail_toggle.lock().await = Some(error);
    }

    pub async fn fail_lists_with(&self, error: GatewayError) {
        *self.fail_list.lock().await = Some(error);
    }

    pub async fn fail_submits_with(&self, error: GatewayError) {
        *self.fail_submit.lock().await = Some(error);
    }

    /// Holds every toggle open until the returned `Notify` is signalled once per call.
    pub async fn hold_toggles(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.toggle_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    /// Holds every listing read open until released.
    pub async fn hold_lists(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn toggles(&self) -> usize {
        self.toggle_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolGateway for ScriptedGateway {
    async fn list_tools(&self, query: &ToolQuery, range: RowRange) -> GatewayResult<ToolPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list_log.lock().await.push((query.clone(), range));
        let gate = self.list_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(error) = self.fail_list.lock().await.clone() {
            return Err(error);
        }
        self.inner.list_tools(query, range).await
    }

    async fn quick_search(&self, text: &str, limit: usize) -> GatewayResult<Vec<Tool>> {
        self.quick_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.quick_search(text, limit).await
    }

    async fn toggle_vote(&self, tool_id: Uuid) -> GatewayResult<VoteStatus> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.toggle_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(error) = self.fail_toggle.lock().await.clone() {
            return Err(error);
        }
        self.inner.toggle_vote(tool_id).await
    }

    async fn user_votes(&self) -> GatewayResult<HashSet<Uuid>> {
        self.vote_set_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.user_votes().await
    }

    async fn submit_suggestion(&self, suggestion: &NewSuggestion) -> GatewayResult<()> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_submit.lock().await.clone() {
            return Err(error);
        }
        self.inner.submit_suggestion(suggestion).await
    }
}
