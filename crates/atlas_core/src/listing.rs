//! crates/atlas_core/src/listing.rs
//!
//! The query state controller behind the tool list.
//!
//! It owns the current `UrlState`, mirrors the typed search text, and exposes two
//! mutually exclusive read models over `ToolGateway::list_tools`: one bounded read per
//! discrete page, or a feed that accumulates pages as the sentinel at the bottom of
//! the list comes into view. Only the model selected by the view mode ever fetches.

use crate::cache::{ReadCaches, ToolsKey};
use crate::debounce::{debounced, Debouncer};
use crate::domain::{Tool, ToolPage, ViewMode};
use crate::ports::{GatewayResult, RowRange, ToolGateway, ToolQuery};
use crate::query::{QueryEvent, QueryState, UrlState};
use crate::tunables::Tunables;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// Read Model Snapshots
//=========================================================================================

/// `ceil(total_count / page_size)`.
pub fn total_pages(total_count: u64, page_size: usize) -> usize {
    let page_size = page_size.max(1) as u64;
    total_count.div_ceil(page_size) as usize
}

/// Previous/next affordances of the paginated footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNav {
    pub page: usize,
    pub total_pages: usize,
    pub can_prev: bool,
    pub can_next: bool,
}

impl PageNav {
    pub fn new(page: usize, total_count: u64, page_size: usize) -> Self {
        let total_pages = total_pages(total_count, page_size);
        Self {
            page,
            total_pages,
            can_prev: page > 0,
            can_next: page + 1 < total_pages,
        }
    }
}

/// What the list shows right now, in either mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub mode: ViewMode,
    pub tools: Vec<Tool>,
    pub total_count: u64,
    /// Present in paginated mode only.
    pub nav: Option<PageNav>,
    /// Always false in paginated mode.
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
}

/// Result of a sentinel-triggered request for the next feed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// A page was appended; `loaded` rows are now in the feed.
    Fetched { loaded: usize },
    /// Nothing to do: wrong mode, no next page, or a fetch is already in flight.
    Skipped,
    /// The filters or mode changed while the page was in flight; it was dropped.
    Superseded,
}

//=========================================================================================
// Controller State
//=========================================================================================

struct Feed {
    id: u64,
    query: ToolQuery,
    pages: Vec<ToolPage>,
    /// Cache epoch the pages were read under.
    epoch: u64,
    fetching_next: bool,
}

impl Feed {
    fn loaded_count(&self, page_size: usize) -> usize {
        self.pages.len() * page_size
    }

    fn total_count(&self) -> u64 {
        self.pages.last().map_or(0, |p| p.total_count)
    }

    fn has_next_page(&self, page_size: usize) -> bool {
        (self.loaded_count(page_size) as u64) < self.total_count()
    }
}

struct ListState {
    url: UrlState,
    query: QueryState,
    /// Undebounced text in the search box.
    search_input: String,
    feed: Option<Feed>,
    next_feed_id: u64,
}

impl ListState {
    /// Re-derives the query from the URL, discarding the feed if it no longer matches.
    fn rederive(&mut self) {
        let next = QueryState::from_url(&self.url);
        let feed_matches = next.view_mode == ViewMode::Continuous
            && self
                .feed
                .as_ref()
                .is_some_and(|f| f.query == next.tool_query());
        if !feed_matches && self.feed.take().is_some() {
            debug!("Discarded accumulated feed.");
        }
        self.query = next;
    }
}

/// Maps the URL to a validated query and serves the active read model.
pub struct ToolListController {
    gateway: Arc<dyn ToolGateway>,
    caches: Arc<ReadCaches>,
    tunables: Tunables,
    state: Mutex<ListState>,
}

impl ToolListController {
    pub fn new(
        gateway: Arc<dyn ToolGateway>,
        caches: Arc<ReadCaches>,
        tunables: Tunables,
        url: UrlState,
    ) -> Self {
        let query = QueryState::from_url(&url);
        Self {
            gateway,
            caches,
            tunables,
            state: Mutex::new(ListState {
                search_input: query.search.clone(),
                url,
                query,
                feed: None,
                next_feed_id: 0,
            }),
        }
    }

    pub async fn url(&self) -> UrlState {
        self.state.lock().await.url.clone()
    }

    pub async fn query_state(&self) -> QueryState {
        self.state.lock().await.query.clone()
    }

    pub async fn search_input(&self) -> String {
        self.state.lock().await.search_input.clone()
    }

    pub fn page_size(&self) -> usize {
        self.tunables.page_size
    }

    /// Applies an explicit state change and returns the resulting query.
    pub async fn dispatch(&self, event: QueryEvent) -> QueryState {
        let mut state = self.state.lock().await;
        state.url.apply(&event);
        if event == QueryEvent::Reset {
            state.search_input.clear();
        }
        state.rederive();
        debug!(url = %state.url, "Query state updated.");
        state.query.clone()
    }

    /// Restores every parameter to its default and discards the feed.
    pub async fn reset(&self) -> QueryState {
        self.dispatch(QueryEvent::Reset).await
    }

    /// Replaces the whole location, e.g. when following a deep link.
    pub async fn navigate(&self, url: UrlState) -> QueryState {
        let mut state = self.state.lock().await;
        let search = QueryState::from_url(&url).search;
        if search != state.query.search {
            state.search_input = search;
        }
        state.url = url;
        state.rederive();
        state.query.clone()
    }

    /// Records typed text without committing it to the URL.
    pub async fn type_search(&self, text: &str) {
        self.state.lock().await.search_input = text.to_string();
    }

    /// The tools the current session has voted for.
    pub async fn user_votes(&self) -> GatewayResult<HashSet<Uuid>> {
        let gateway = Arc::clone(&self.gateway);
        self.caches
            .votes
            .get_or_fetch((), || async move { gateway.user_votes().await })
            .await
    }

    /// Resolves the active read model.
    pub async fn load(&self) -> GatewayResult<ListSnapshot> {
        let query = self.query_state().await;
        let result = match query.view_mode {
            ViewMode::Paginated => self.load_page(&query).await,
            ViewMode::Continuous => self.load_feed(&query).await,
        };
        if let Err(e) = &result {
            warn!("Failed to load tools: {}", e);
        }
        result
    }

    async fn load_page(&self, query: &QueryState) -> GatewayResult<ListSnapshot> {
        let tool_query = query.tool_query();
        let key = ToolsKey::Page {
            query: tool_query.clone(),
            page: query.page,
        };
        let page = self
            .caches
            .tools
            .get_or_fetch(key, || self.fetch_page(tool_query, query.page))
            .await?;

        Ok(ListSnapshot {
            mode: ViewMode::Paginated,
            nav: Some(PageNav::new(query.page, page.total_count, self.page_size())),
            total_count: page.total_count,
            tools: page.tools,
            has_next_page: false,
            is_fetching_next_page: false,
        })
    }

    async fn load_feed(&self, query: &QueryState) -> GatewayResult<ListSnapshot> {
        let tool_query = query.tool_query();
        let epoch = self.caches.epoch();

        let pages_to_load = {
            let state = self.state.lock().await;
            match &state.feed {
                Some(feed) if feed.query == tool_query && feed.epoch == epoch => {
                    return Ok(self.feed_snapshot(feed));
                }
                // Same filters, stale data: revalidate every page loaded so far.
                Some(feed) if feed.query == tool_query => feed.pages.len().max(1),
                _ => 1,
            }
        };

        let mut pages = Vec::with_capacity(pages_to_load);
        for page in 0..pages_to_load {
            let key = ToolsKey::Feed {
                query: tool_query.clone(),
                page,
            };
            let fetched = self
                .caches
                .tools
                .get_or_fetch(key, || self.fetch_page(tool_query.clone(), page))
                .await?;
            let exhausted = ((page + 1) * self.page_size()) as u64 >= fetched.total_count;
            pages.push(fetched);
            if exhausted {
                break;
            }
        }

        let mut state = self.state.lock().await;
        if state.query.view_mode != ViewMode::Continuous || state.query.tool_query() != tool_query {
            // Superseded while loading; the pages stay cached under their own keys.
            let total_count = pages.first().map_or(0, |p| p.total_count);
            return Ok(ListSnapshot {
                mode: ViewMode::Continuous,
                total_count,
                tools: pages.into_iter().flat_map(|p| p.tools).collect(),
                nav: None,
                has_next_page: false,
                is_fetching_next_page: false,
            });
        }
        let keep_existing = state
            .feed
            .as_ref()
            .is_some_and(|f| f.query == tool_query && f.epoch == self.caches.epoch());
        if !keep_existing {
            let id = state.next_feed_id;
            state.next_feed_id += 1;
            state.feed = Some(Feed {
                id,
                query: tool_query,
                pages,
                epoch,
                fetching_next: false,
            });
        }
        let feed = state.feed.as_ref().map(|f| self.feed_snapshot(f));
        Ok(feed.unwrap_or_else(|| ListSnapshot {
            mode: ViewMode::Continuous,
            tools: Vec::new(),
            total_count: 0,
            nav: None,
            has_next_page: false,
            is_fetching_next_page: false,
        }))
    }

    fn feed_snapshot(&self, feed: &Feed) -> ListSnapshot {
        ListSnapshot {
            mode: ViewMode::Continuous,
            tools: feed.pages.iter().flat_map(|p| p.tools.iter().cloned()).collect(),
            total_count: feed.total_count(),
            nav: None,
            has_next_page: feed.has_next_page(self.page_size()),
            is_fetching_next_page: feed.fetching_next,
        }
    }

    /// Called when the sentinel below the feed approaches the viewport.
    ///
    /// Requests the next page only in continuous mode, only when one is known to
    /// exist, and never while another next-page request for this feed is in flight.
    pub async fn on_sentinel_visible(&self) -> GatewayResult<NextPage> {
        let (feed_id, query, next_page) = {
            let mut state = self.state.lock().await;
            let page_size = self.page_size();
            let Some(feed) = state.feed.as_mut() else {
                return Ok(NextPage::Skipped);
            };
            if feed.fetching_next || !feed.has_next_page(page_size) {
                return Ok(NextPage::Skipped);
            }
            feed.fetching_next = true;
            (feed.id, feed.query.clone(), feed.pages.len())
        };

        debug!(page = next_page, "Fetching next feed page.");
        let key = ToolsKey::Feed {
            query: query.clone(),
            page: next_page,
        };
        let result = self
            .caches
            .tools
            .get_or_fetch(key, || self.fetch_page(query, next_page))
            .await;

        let mut state = self.state.lock().await;
        let Some(feed) = state.feed.as_mut().filter(|f| f.id == feed_id) else {
            debug!("Next page arrived for a discarded feed.");
            return Ok(NextPage::Superseded);
        };
        feed.fetching_next = false;
        match result {
            Ok(page) => {
                feed.pages.push(page);
                Ok(NextPage::Fetched {
                    loaded: feed.pages.iter().map(|p| p.tools.len()).sum(),
                })
            }
            Err(e) => {
                warn!("Failed to fetch next page: {}", e);
                Err(e)
            }
        }
    }

    fn fetch_page(
        &self,
        query: ToolQuery,
        page: usize,
    ) -> impl Future<Output = GatewayResult<ToolPage>> + Send + 'static {
        let gateway = Arc::clone(&self.gateway);
        let range = RowRange::for_page(page, self.page_size());
        async move {
            debug!(search = %query.search, sort = query.sort.as_str(), page, "Listing tools.");
            gateway.list_tools(&query, range).await
        }
    }
}

//=========================================================================================
// Debounced Search Box
//=========================================================================================

/// Search input wired to the controller through a debouncer.
///
/// Keystrokes update the mirrored input immediately; the URL (and with it the query)
/// only changes once typing pauses, after which the new first page is prefetched.
pub struct SearchBox {
    controller: Arc<ToolListController>,
    debouncer: Debouncer<String>,
}

impl SearchBox {
    /// Must be called from within a tokio runtime.
    pub async fn new(controller: Arc<ToolListController>) -> Self {
        let initial = controller.query_state().await.search;
        let (debouncer, mut settled) = debounced(initial, controller.tunables.search_debounce);

        let committer = Arc::clone(&controller);
        tokio::spawn(async move {
            while let Some(text) = settled.recv().await {
                info!(search = %text, "Committing search.");
                committer.dispatch(QueryEvent::SetSearch(text)).await;
                // Errors are already logged by `load`.
                let _ = committer.load().await;
            }
        });

        Self {
            controller,
            debouncer,
        }
    }

    pub async fn type_text(&self, text: &str) {
        self.controller.type_search(text).await;
        self.debouncer.push(text.to_string());
    }
}
