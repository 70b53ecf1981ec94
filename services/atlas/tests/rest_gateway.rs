//! Wire-contract tests for `RestGateway` against a mock PostgREST backend.

use atlas_core::domain::{Category, License, NewSuggestion, Pricing, SortKey, VoteStatus};
use atlas_core::ports::{GatewayError, RowRange, ToolGateway, ToolQuery};
use atlas_core::{ReadCaches, ToolListController, Tunables, UrlState};
use atlas_lib::adapters::RestGateway;
use atlas_lib::cli::{Command, ListArgs, Shell};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// Mock Backend
//=========================================================================================

#[derive(Debug, Clone)]
struct Recorded {
    params: Vec<(String, String)>,
    headers: HeaderMap,
}

impl Recorded {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct Backend {
    tools: Vec<Value>,
    tool_requests: Vec<Recorded>,
    signups: usize,
    refreshes: usize,
    tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    votes: HashMap<Uuid, HashSet<Uuid>>,
    suggestions: Vec<Value>,
    reject_votes_with: Option<String>,
    fail_lists: bool,
    fail_votes: bool,
}

impl Backend {
    /// Issues a fresh access token and refresh token for `user`.
    fn issue(&mut self, user: Uuid) -> Value {
        let serial = self.tokens.len() + 1;
        let access = format!("token-{}", serial);
        let refresh = format!("refresh-{}", serial);
        self.tokens.insert(access.clone(), user);
        self.refresh_tokens.insert(refresh.clone(), user);
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": user }
        })
    }
}

type Shared = Arc<Mutex<Backend>>;

fn bearer_user(backend: &Backend, headers: &HeaderMap) -> Option<Uuid> {
    let token = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    backend.tokens.get(token).copied()
}

async fn list_tools(
    State(backend): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let mut backend = backend.lock().await;
    let recorded = Recorded {
        params,
        headers: headers.clone(),
    };
    backend.tool_requests.push(recorded.clone());
    if backend.fail_lists {
        return (StatusCode::INTERNAL_SERVER_ERROR, "relation unavailable").into_response();
    }

    if let Some(limit) = recorded.param("limit").and_then(|l| l.parse::<usize>().ok()) {
        let tools: Vec<Value> = backend.tools.iter().take(limit).cloned().collect();
        return Json(tools).into_response();
    }

    let total = backend.tools.len();
    let (start, end) = recorded
        .header("range")
        .and_then(|r| r.split_once('-'))
        .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)))
        .unwrap_or((0, total.saturating_sub(1)));
    let page: Vec<Value> = backend
        .tools
        .iter()
        .skip(start)
        .take(end + 1 - start)
        .cloned()
        .collect();
    let content_range = if page.is_empty() {
        format!("*/{}", total)
    } else {
        format!("{}-{}/{}", start, start + page.len() - 1, total)
    };
    (StatusCode::OK, [("content-range", content_range)], Json(page)).into_response()
}

async fn signup(State(backend): State<Shared>) -> Json<Value> {
    let mut backend = backend.lock().await;
    backend.signups += 1;
    Json(backend.issue(Uuid::new_v4()))
}

async fn refresh_token(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock().await;
    if params.get("grant_type").map(String::as_str) != Some("refresh_token") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let presented = body["refresh_token"].as_str().unwrap_or_default().to_string();
    // Refresh tokens are single use.
    let Some(user) = backend.refresh_tokens.remove(&presented) else {
        return (StatusCode::BAD_REQUEST, "invalid refresh token").into_response();
    };
    backend.refreshes += 1;
    Json(backend.issue(user)).into_response()
}

async fn toggle_vote(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock().await;
    let Some(user) = bearer_user(&backend, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if let Some(message) = backend.reject_votes_with.clone() {
        return Json(json!({ "error": message })).into_response();
    }
    let Some(tool_id) = body["target_tool_id"].as_str().and_then(|s| s.parse::<Uuid>().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let votes = backend.votes.entry(user).or_default();
    let status = if votes.remove(&tool_id) {
        "removed"
    } else {
        votes.insert(tool_id);
        "added"
    };
    Json(json!({ "status": status })).into_response()
}

async fn user_votes(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let backend = backend.lock().await;
    let Some(user) = bearer_user(&backend, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if backend.fail_votes {
        return (StatusCode::INTERNAL_SERVER_ERROR, "votes unavailable").into_response();
    }
    if params.get("user_id") != Some(&format!("eq.{}", user)) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let rows: Vec<Value> = backend
        .votes
        .get(&user)
        .into_iter()
        .flatten()
        .map(|id| json!({ "tool_id": id }))
        .collect();
    Json(rows).into_response()
}

async fn insert_suggestion(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut backend = backend.lock().await;
    if bearer_user(&backend, &headers).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    backend.suggestions.push(body);
    StatusCode::CREATED
}

fn tool_json(name: &str, votes: u32) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "name": name,
        "description": format!("{name} writes code for you."),
        "url": format!("https://{}.dev", name.to_lowercase()),
        "github": null,
        "pricing": "freemium",
        "tags": ["agentic"],
        "types": ["IDE"],
        "vote_count": votes,
        "created_at": "2025-02-01T08:30:00Z"
    })
}

struct TestFixture {
    backend: Shared,
    base_url: String,
    session_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new(tools: Vec<Value>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let session_path = temp_dir.path().join("session.json");
        let backend: Shared = Arc::new(Mutex::new(Backend {
            tools,
            ..Backend::default()
        }));

        let app = Router::new()
            .route("/rest/v1/tools", get(list_tools))
            .route("/rest/v1/votes", get(user_votes))
            .route("/rest/v1/suggestions", post(insert_suggestion))
            .route("/rest/v1/rpc/toggle_vote", post(toggle_vote))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/token", post(refresh_token))
            .with_state(Arc::clone(&backend));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestFixture {
            backend,
            base_url: format!("http://{}", addr),
            session_path,
            _temp_dir: temp_dir,
        }
    }

    fn gateway(&self) -> RestGateway {
        RestGateway::new(&self.base_url, "anon-key", &self.session_path).unwrap()
    }

    /// Leaves a session file behind as an earlier run would have.
    async fn write_session(&self, session: Value) {
        tokio::fs::write(&self.session_path, session.to_string())
            .await
            .expect("Failed to write session file");
    }

    async fn stored_session(&self) -> Value {
        let bytes = tokio::fs::read(&self.session_path)
            .await
            .expect("Failed to read session file");
        serde_json::from_slice(&bytes).expect("Session file is not JSON")
    }

    async fn tool_id(&self, index: usize) -> Uuid {
        let backend = self.backend.lock().await;
        backend.tools[index]["id"].as_str().unwrap().parse().unwrap()
    }
}

//=========================================================================================
// Listing
//=========================================================================================

#[tokio::test]
async fn listing_sends_filters_range_and_count_preference() {
    let tools = (0..25).map(|i| tool_json(&format!("Tool{i:02}"), i)).collect();
    let fixture = TestFixture::new(tools).await;
    let gateway = fixture.gateway();

    let query = ToolQuery {
        search: "aider".into(),
        category: Some(Category::Cli),
        pricing: Some(Pricing::Free),
        license: Some(License::Open),
        sort: SortKey::Name,
    };
    let page = gateway
        .list_tools(&query, RowRange::for_page(1, 10))
        .await
        .unwrap();
    assert_eq!(page.tools.len(), 10);
    assert_eq!(page.total_count, 25);
    assert_eq!(page.tools[0].pricing, Pricing::Freemium);
    assert_eq!(page.tools[0].categories, vec![Category::Ide]);

    let backend = fixture.backend.lock().await;
    let request = &backend.tool_requests[0];
    assert_eq!(request.param("select"), Some("*"));
    assert_eq!(request.param("name"), Some("ilike.*aider*"));
    assert_eq!(request.param("types"), Some("cs.{CLI}"));
    assert_eq!(request.param("pricing"), Some("ilike.Free"));
    assert_eq!(request.param("github"), Some("not.is.null"));
    assert_eq!(request.param("order"), Some("name.asc"));
    assert_eq!(request.header("range"), Some("10-19"));
    assert_eq!(request.header("prefer"), Some("count=exact"));
    assert_eq!(request.header("apikey"), Some("anon-key"));
    assert_eq!(request.header("authorization"), None);
}

#[tokio::test]
async fn empty_listing_reports_zero_total() {
    let fixture = TestFixture::new(vec![]).await;
    let page = fixture
        .gateway()
        .list_tools(&ToolQuery::default(), RowRange::for_page(0, 10))
        .await
        .unwrap();
    assert!(page.tools.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn server_errors_surface_as_data_access() {
    let fixture = TestFixture::new(vec![]).await;
    fixture.backend.lock().await.fail_lists = true;
    let err = fixture
        .gateway()
        .list_tools(&ToolQuery::default(), RowRange::for_page(0, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::DataAccess(ref m) if m.contains("relation unavailable")));
    assert_eq!(err.user_message(), "Something went wrong. Please try again.");
}

#[tokio::test]
async fn quick_search_limits_and_orders() {
    let tools = (0..15).map(|i| tool_json(&format!("Tool{i:02}"), i)).collect();
    let fixture = TestFixture::new(tools).await;
    let gateway = fixture.gateway();

    assert_eq!(gateway.quick_search("", 10).await.unwrap().len(), 10);
    gateway.quick_search("cur", 10).await.unwrap();

    let backend = fixture.backend.lock().await;
    let top = &backend.tool_requests[0];
    assert_eq!(top.param("limit"), Some("10"));
    assert_eq!(top.param("order"), Some("vote_count.desc"));
    assert_eq!(top.param("name"), None);
    let named = &backend.tool_requests[1];
    assert_eq!(named.param("name"), Some("ilike.*cur*"));
    assert_eq!(named.param("order"), None);
}

#[tokio::test]
async fn controller_search_scenario_over_http() {
    let fixture = TestFixture::new(vec![tool_json("Aider", 42)]).await;
    let tunables = Tunables::default();
    let controller = ToolListController::new(
        Arc::new(fixture.gateway()),
        Arc::new(ReadCaches::new(tunables.cache_ttl)),
        tunables,
        UrlState::parse("search=aider"),
    );

    let snapshot = controller.load().await.unwrap();
    controller.load().await.unwrap();
    let nav = snapshot.nav.unwrap();
    assert_eq!(nav.total_pages, 1);
    assert!(!nav.can_prev && !nav.can_next);

    let backend = fixture.backend.lock().await;
    assert_eq!(backend.tool_requests.len(), 1, "second load is a cache hit");
    assert_eq!(backend.tool_requests[0].header("range"), Some("0-9"));
    assert_eq!(backend.tool_requests[0].param("order"), Some("vote_count.desc"));
}

//=========================================================================================
// Session, Votes and Suggestions
//=========================================================================================

#[tokio::test]
async fn no_session_means_no_votes_and_no_signup() {
    let fixture = TestFixture::new(vec![]).await;
    assert!(fixture.gateway().user_votes().await.unwrap().is_empty());
    assert_eq!(fixture.backend.lock().await.signups, 0);
}

#[tokio::test]
async fn voting_signs_up_once_and_the_session_survives_restarts() {
    let fixture = TestFixture::new(vec![tool_json("Cursor", 120)]).await;
    let tool_id = fixture.tool_id(0).await;

    let gateway = fixture.gateway();
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Added));
    assert_eq!(gateway.user_votes().await.unwrap(), HashSet::from([tool_id]));
    assert!(fixture.session_path.exists());

    let restarted = fixture.gateway();
    assert_eq!(restarted.user_votes().await.unwrap(), HashSet::from([tool_id]));
    assert_eq!(restarted.toggle_vote(tool_id).await, Ok(VoteStatus::Removed));
    assert!(restarted.user_votes().await.unwrap().is_empty());
    assert_eq!(fixture.backend.lock().await.signups, 1);
}

#[tokio::test]
async fn error_payload_is_a_rejected_vote() {
    let fixture = TestFixture::new(vec![tool_json("Bolt", 15)]).await;
    let tool_id = fixture.tool_id(0).await;
    fixture.backend.lock().await.reject_votes_with = Some("Rate limit exceeded".into());

    let err = fixture.gateway().toggle_vote(tool_id).await.unwrap_err();
    assert_eq!(err, GatewayError::VoteRejected("Rate limit exceeded".into()));
    assert_eq!(err.user_message(), "Rate limit exceeded");
}

#[tokio::test]
async fn suggestion_is_inserted_as_a_single_row() {
    let fixture = TestFixture::new(vec![]).await;
    let gateway = fixture.gateway();
    let suggestion = NewSuggestion {
        name: "Zed".into(),
        url: "https://zed.dev".into(),
        github: None,
        description: "A fast collaborative editor.".into(),
        pricing: Pricing::Freemium,
        categories: vec![Category::Ide, Category::Cli],
        tags: vec!["editor".into()],
    };
    gateway.submit_suggestion(&suggestion).await.unwrap();

    let session = gateway.session().await.unwrap();
    let backend = fixture.backend.lock().await;
    assert_eq!(backend.suggestions.len(), 1);
    let rows = backend.suggestions[0].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["name"], "Zed");
    assert_eq!(row["pricing"], "freemium");
    assert_eq!(row["types"], json!(["IDE", "CLI"]));
    assert_eq!(row["tags"], json!(["editor"]));
    assert_eq!(row["user_id"], json!(session.user_id));
    assert!(row.get("github").is_none());
}

//=========================================================================================
// Session Renewal
//=========================================================================================

#[tokio::test]
async fn revoked_session_without_refresh_token_is_replaced() {
    let fixture = TestFixture::new(vec![tool_json("Cursor", 120)]).await;
    let tool_id = fixture.tool_id(0).await;
    fixture
        .write_session(json!({ "access_token": "revoked", "user_id": Uuid::new_v4() }))
        .await;

    let gateway = fixture.gateway();
    assert!(gateway.user_votes().await.unwrap().is_empty());
    assert!(!fixture.session_path.exists(), "unusable session is forgotten");
    assert_eq!(fixture.backend.lock().await.signups, 0);

    fixture
        .write_session(json!({ "access_token": "revoked", "user_id": Uuid::new_v4() }))
        .await;
    let gateway = fixture.gateway();
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Added));
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Removed));
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Added));
    assert_eq!(gateway.user_votes().await.unwrap(), HashSet::from([tool_id]));
    assert_eq!(fixture.backend.lock().await.signups, 1);

    let session = gateway.session().await.unwrap();
    assert_ne!(session.access_token, "revoked");
    assert_eq!(fixture.stored_session().await["access_token"], json!(session.access_token));
}

#[tokio::test]
async fn rejected_token_is_refreshed_for_the_same_user() {
    let fixture = TestFixture::new(vec![tool_json("Cline", 30)]).await;
    let tool_id = fixture.tool_id(0).await;
    let user = Uuid::new_v4();
    {
        let mut backend = fixture.backend.lock().await;
        backend.refresh_tokens.insert("refresh-kept".into(), user);
        backend.votes.insert(user, HashSet::from([tool_id]));
    }
    fixture
        .write_session(json!({
            "access_token": "expired-jwt",
            "refresh_token": "refresh-kept",
            "user_id": user
        }))
        .await;

    let gateway = fixture.gateway();
    assert_eq!(gateway.user_votes().await.unwrap(), HashSet::from([tool_id]));
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Removed));

    let backend = fixture.backend.lock().await;
    assert_eq!((backend.refreshes, backend.signups), (1, 0));
    drop(backend);
    let stored = fixture.stored_session().await;
    assert_eq!(stored["user_id"], json!(user));
    assert_ne!(stored["refresh_token"], json!("refresh-kept"));
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_use() {
    let fixture = TestFixture::new(vec![tool_json("Bolt", 15)]).await;
    let tool_id = fixture.tool_id(0).await;
    let user = Uuid::new_v4();
    {
        let mut backend = fixture.backend.lock().await;
        backend.tokens.insert("still-accepted".into(), user);
        backend.refresh_tokens.insert("refresh-kept".into(), user);
    }
    fixture
        .write_session(json!({
            "access_token": "still-accepted",
            "refresh_token": "refresh-kept",
            "user_id": user,
            "expires_at": "2020-01-01T00:00:00Z"
        }))
        .await;

    let gateway = fixture.gateway();
    assert_eq!(gateway.toggle_vote(tool_id).await, Ok(VoteStatus::Added));
    let session = gateway.session().await.unwrap();
    assert_ne!(session.access_token, "still-accepted");
    assert!(session.expires_at.is_some_and(|at| at > chrono::Utc::now()));
    assert_eq!(fixture.backend.lock().await.refreshes, 1);
}

#[tokio::test]
async fn list_survives_a_failed_vote_read() {
    let fixture = TestFixture::new(vec![tool_json("Aider", 42), tool_json("Zed", 7)]).await;
    let tool_id = fixture.tool_id(0).await;
    let gateway = Arc::new(fixture.gateway());
    gateway.toggle_vote(tool_id).await.unwrap();
    fixture.backend.lock().await.fail_votes = true;

    let shell = Shell::new(gateway, Tunables::default());
    let out = shell
        .run(Command::List(ListArgs {
            pages: 1,
            ..ListArgs::default()
        }))
        .await
        .unwrap();
    assert!(out.contains("Aider"));
    assert!(out.contains("Zed"));
    assert!(!out.contains('*'), "no card is marked as voted");
}
