//! services/atlas/src/adapters/rest.rs
//!
//! This module contains the REST adapter, which is the concrete implementation of
//! the `ToolGateway` port from the core crate. It speaks the PostgREST dialect of the
//! hosted database (`/rest/v1`) and its anonymous auth endpoints (`/auth/v1/signup`,
//! `/auth/v1/token`) using `reqwest`.

use crate::adapters::session::{AnonymousSession, SessionStore};
use crate::config::Config;
use atlas_core::domain::{Category, License, NewSuggestion, Pricing, SortKey, Tool, ToolPage, VoteStatus};
use atlas_core::ports::{GatewayError, GatewayResult, RowRange, ToolGateway, ToolQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A REST adapter that implements the `ToolGateway` port.
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    sessions: SessionStore,
}

impl RestGateway {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        session_path: impl Into<PathBuf>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            sessions: SessionStore::new(session_path),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(&config.api_url, &config.anon_key, &config.session_path)
    }

    pub async fn session(&self) -> Option<AnonymousSession> {
        self.sessions.current().await
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    /// Returns a usable session, refreshing an expiring one or signing up anonymously.
    async fn ensure_session(&self) -> GatewayResult<AnonymousSession> {
        let mut slot = self.sessions.lock().await;
        if let Some(session) = self.usable(&mut slot).await {
            return Ok(session);
        }
        self.sign_up(&mut slot).await
    }

    /// The slot's session, refreshed first when its token is about to expire.
    async fn usable(&self, slot: &mut Option<AnonymousSession>) -> Option<AnonymousSession> {
        let session = slot.clone()?;
        if !session.needs_refresh(Utc::now()) {
            return Some(session);
        }
        debug!("Access token expiring, refreshing.");
        self.refresh(slot, &session).await
    }

    /// Trades the refresh token of `stale` for a new session. A session that cannot
    /// be refreshed is forgotten.
    async fn refresh(
        &self,
        slot: &mut Option<AnonymousSession>,
        stale: &AnonymousSession,
    ) -> Option<AnonymousSession> {
        let granted = match stale.refresh_token.as_deref() {
            Some(token) => {
                self.grant(
                    self.post("/auth/v1/token")
                        .query(&[("grant_type", "refresh_token")])
                        .json(&serde_json::json!({ "refresh_token": token })),
                )
                .await
            }
            None => Err(GatewayError::SessionUnavailable("no refresh token".into())),
        };
        match granted {
            Ok(session) => {
                info!("Refreshed the anonymous session.");
                self.sessions.store(slot, session.clone()).await;
                Some(session)
            }
            Err(e) => {
                warn!("Dropping the anonymous session: {}", e);
                self.sessions.forget(slot).await;
                None
            }
        }
    }

    async fn sign_up(&self, slot: &mut Option<AnonymousSession>) -> GatewayResult<AnonymousSession> {
        info!("Signing up for an anonymous session.");
        let session = self
            .grant(self.post("/auth/v1/signup").json(&serde_json::json!({})))
            .await?;
        self.sessions.store(slot, session.clone()).await;
        Ok(session)
    }

    /// Sends an auth request and reads the session it grants.
    async fn grant(&self, request: RequestBuilder) -> GatewayResult<AnonymousSession> {
        let response = request.send().await.map_err(session_unavailable)?;
        let grant: SessionGrant = check_status(response)
            .await
            .map_err(session_unavailable)?
            .json()
            .await
            .map_err(session_unavailable)?;
        Ok(grant.into_session(Utc::now()))
    }

    /// After the server rejected the token of `stale`: a session another caller
    /// already renewed, a refreshed one, or none.
    async fn replace_rejected(
        &self,
        slot: &mut Option<AnonymousSession>,
        stale: &AnonymousSession,
    ) -> Option<AnonymousSession> {
        let current = slot.clone()?;
        if current.access_token != stale.access_token {
            return Some(current);
        }
        self.refresh(slot, &current).await
    }

    /// Sends a request made for the current session. A rejected token is renewed
    /// once, signing up again if it cannot be refreshed.
    async fn send_authorized<F>(&self, build: F) -> GatewayResult<Response>
    where
        F: Fn(&AnonymousSession) -> RequestBuilder + Send,
    {
        let session = self.ensure_session().await?;
        let response = build(&session).send().await.map_err(data_access)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!("Access token rejected, renewing the session.");
        let renewed = {
            let mut slot = self.sessions.lock().await;
            match self.replace_rejected(&mut slot, &session).await {
                Some(renewed) => renewed,
                None => self.sign_up(&mut slot).await?,
            }
        };
        build(&renewed).send().await.map_err(data_access)
    }

    async fn read_votes(&self, session: &AnonymousSession) -> GatewayResult<Response> {
        debug!(user_id = %session.user_id, "GET votes");
        self.get("/rest/v1/votes")
            .bearer_auth(&session.access_token)
            .query(&[
                ("select", "tool_id".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
            ])
            .send()
            .await
            .map_err(data_access)
    }

    async fn fetch_tools(&self, request: RequestBuilder) -> GatewayResult<Vec<Tool>> {
        let response = request.send().await.map_err(data_access)?;
        let records: Vec<ToolRecord> = check_status(response)
            .await?
            .json()
            .await
            .map_err(data_access)?;
        Ok(records.into_iter().map(ToolRecord::to_domain).collect())
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct ToolRecord {
    id: Uuid,
    name: String,
    #[serde(default)]
    description: String,
    url: String,
    github: Option<String>,
    pricing: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    vote_count: i64,
    created_at: DateTime<Utc>,
}
impl ToolRecord {
    fn to_domain(self) -> Tool {
        let pricing = Pricing::parse(&self.pricing).unwrap_or_else(|| {
            warn!(tool = %self.name, pricing = %self.pricing, "Unknown pricing value.");
            Pricing::default()
        });
        Tool {
            id: self.id,
            name: self.name,
            description: self.description,
            url: self.url,
            github: self.github.filter(|g| !g.is_empty()),
            pricing,
            categories: self.types.iter().filter_map(|t| Category::parse(t)).collect(),
            tags: self.tags,
            vote_count: u32::try_from(self.vote_count.max(0)).unwrap_or(u32::MAX),
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct VoteRecord {
    tool_id: Uuid,
}

#[derive(Serialize)]
struct SuggestionRecord<'a> {
    name: &'a str,
    url: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    github: Option<&'a str>,
    pricing: String,
    types: Vec<&'static str>,
    tags: &'a [String],
    user_id: Uuid,
}

/// Body of a sign-up or token refresh.
#[derive(Deserialize)]
struct SessionGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GrantUser,
}

#[derive(Deserialize)]
struct GrantUser {
    id: Uuid,
}

impl SessionGrant {
    fn into_session(self, now: DateTime<Utc>) -> AnonymousSession {
        AnonymousSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            expires_at: self
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

#[derive(Deserialize)]
struct ToggleResponse {
    status: Option<String>,
    error: Option<String>,
}

//=========================================================================================
// Query Encoding
//=========================================================================================

/// PostgREST filter and order parameters for a listing read.
fn listing_params(query: &ToolQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    if !query.search.is_empty() {
        params.push(("name", contains_pattern(&query.search)));
    }
    if let Some(category) = query.category {
        params.push(("types", format!("cs.{{{}}}", category.as_str())));
    }
    if let Some(pricing) = query.pricing {
        params.push(("pricing", format!("ilike.{}", pricing.as_str())));
    }
    match query.license {
        Some(License::Open) => params.push(("github", "not.is.null".to_string())),
        Some(License::Closed) => params.push(("github", "is.null".to_string())),
        None => {}
    }
    let order = match query.sort {
        SortKey::Rank => "vote_count.desc",
        SortKey::Newest => "created_at.desc",
        SortKey::Name => "name.asc",
    };
    params.push(("order", order.to_string()));
    params
}

/// An `ilike` filter matching `text` anywhere in the value.
///
/// LIKE metacharacters are escaped. PostgREST turns every `*` into `%` with no way
/// to escape it, so a typed `*` becomes `_` and matches any one character.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::from("ilike.*");
    for c in text.chars() {
        match c {
            '\\' | '%' | '_' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            c => pattern.push(c),
        }
    }
    pattern.push('*');
    pattern
}

/// Total row count from a `Content-Range: 0-9/45` (or `*/0`) header.
fn total_from_content_range(header: Option<&str>) -> Option<u64> {
    let (_, total) = header?.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn data_access(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::DataAccess(e.to_string())
}

fn session_unavailable(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::SessionUnavailable(e.to_string())
}

/// Turns a non-2xx response into a `DataAccess` error carrying its body.
async fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::DataAccess(format!("{}: {}", status, body)))
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl ToolGateway for RestGateway {
    async fn list_tools(&self, query: &ToolQuery, range: RowRange) -> GatewayResult<ToolPage> {
        debug!(search = %query.search, start = range.start, end = range.end, "GET tools");
        let response = self
            .get("/rest/v1/tools")
            .query(&listing_params(query))
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", range.start, range.end))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(data_access)?;
        let response = check_status(response).await?;

        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let records: Vec<ToolRecord> = response.json().await.map_err(data_access)?;
        let tools: Vec<Tool> = records.into_iter().map(ToolRecord::to_domain).collect();
        let total_count = total_from_content_range(content_range.as_deref())
            .unwrap_or((range.start + tools.len()) as u64);

        Ok(ToolPage { tools, total_count })
    }

    async fn quick_search(&self, text: &str, limit: usize) -> GatewayResult<Vec<Tool>> {
        debug!(text, limit, "GET tools (quick search)");
        let mut params = vec![("select", "*".to_string()), ("limit", limit.to_string())];
        if text.is_empty() {
            params.push(("order", "vote_count.desc".to_string()));
        } else {
            params.push(("name", contains_pattern(text)));
        }
        self.fetch_tools(self.get("/rest/v1/tools").query(&params)).await
    }

    async fn toggle_vote(&self, tool_id: Uuid) -> GatewayResult<VoteStatus> {
        debug!(%tool_id, "POST rpc/toggle_vote");
        let response = self
            .send_authorized(|session| {
                self.post("/rest/v1/rpc/toggle_vote")
                    .bearer_auth(&session.access_token)
                    .json(&serde_json::json!({ "target_tool_id": tool_id }))
            })
            .await?;
        let body: ToggleResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(data_access)?;

        if let Some(message) = body.error {
            return Err(GatewayError::VoteRejected(message));
        }
        match body.status.as_deref() {
            Some("added") => Ok(VoteStatus::Added),
            Some("removed") => Ok(VoteStatus::Removed),
            other => Err(GatewayError::DataAccess(format!(
                "unexpected toggle_vote status: {:?}",
                other
            ))),
        }
    }

    /// Never signs up. Without a usable session the vote set is empty.
    async fn user_votes(&self) -> GatewayResult<HashSet<Uuid>> {
        let session = {
            let mut slot = self.sessions.lock().await;
            self.usable(&mut slot).await
        };
        let Some(session) = session else {
            return Ok(HashSet::new());
        };

        let mut response = self.read_votes(&session).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            info!("Access token rejected, refreshing the session.");
            let renewed = {
                let mut slot = self.sessions.lock().await;
                self.replace_rejected(&mut slot, &session).await
            };
            let Some(renewed) = renewed else {
                return Ok(HashSet::new());
            };
            response = self.read_votes(&renewed).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                warn!("Renewed token rejected too, dropping the session.");
                let mut slot = self.sessions.lock().await;
                self.sessions.forget(&mut slot).await;
                return Ok(HashSet::new());
            }
        }

        let records: Vec<VoteRecord> = check_status(response)
            .await?
            .json()
            .await
            .map_err(data_access)?;
        Ok(records.into_iter().map(|r| r.tool_id).collect())
    }

    async fn submit_suggestion(&self, suggestion: &NewSuggestion) -> GatewayResult<()> {
        debug!(name = %suggestion.name, "POST suggestions");
        let response = self
            .send_authorized(|session| {
                let record = SuggestionRecord {
                    name: &suggestion.name,
                    url: &suggestion.url,
                    description: &suggestion.description,
                    github: suggestion.github.as_deref(),
                    pricing: suggestion.pricing.as_str().to_lowercase(),
                    types: suggestion.categories.iter().map(|c| c.as_str()).collect(),
                    tags: &suggestion.tags,
                    user_id: session.user_id,
                };
                self.post("/rest/v1/suggestions")
                    .bearer_auth(&session.access_token)
                    .json(&[record])
            })
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
