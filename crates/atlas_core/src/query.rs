//! crates/atlas_core/src/query.rs
//!
//! The URL is the single source of truth for what the listing shows.
//!
//! `UrlState` is the raw, ordered set of query parameters (patched in place and
//! serialized back). `QueryState` is the validated view derived from it: every
//! parameter that is missing or malformed silently falls back to its default.

use crate::domain::{Category, License, Pricing, SortKey, ViewMode};
use crate::ports::ToolQuery;
use url::form_urlencoded;

pub const PARAM_SORT: &str = "sortBy";
pub const PARAM_SEARCH: &str = "search";
pub const PARAM_CATEGORY: &str = "activeType";
pub const PARAM_PRICING: &str = "activePricing";
pub const PARAM_LICENSE: &str = "activeLicense";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_VIEW_MODE: &str = "viewMode";

/// Wire value for an unfiltered facet.
pub const ALL: &str = "All";

//=========================================================================================
// Raw URL Parameters
//=========================================================================================

/// Ordered query parameters of the current location.
///
/// Unknown parameters are preserved untouched across patches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    params: Vec<(String, String)>,
}

impl UrlState {
    /// Parses an `application/x-www-form-urlencoded` query, with or without a leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            state.set(&key, value.into_owned());
        }
        state
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `key`, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.params.retain(|(k, _)| k != key);
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish()
    }
}

impl std::fmt::Display for UrlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

//=========================================================================================
// Validated Query State
//=========================================================================================

/// The effective filter, sort and pagination state of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryState {
    pub sort: SortKey,
    pub search: String,
    pub category: Option<Category>,
    pub pricing: Option<Pricing>,
    pub license: Option<License>,
    pub view_mode: ViewMode,
    /// Current page in paginated mode. Always 0 in continuous mode's URL writes.
    pub page: usize,
}

/// An explicit state change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    SetSort(SortKey),
    SetSearch(String),
    SetCategory(Option<Category>),
    SetPricing(Option<Pricing>),
    SetLicense(Option<License>),
    SetViewMode(ViewMode),
    /// Plain page advancement; the only event that keeps the page index.
    SetPage(usize),
    Reset,
}

impl QueryState {
    /// Derives the state from the URL, substituting defaults for any missing or
    /// invalid parameter.
    pub fn from_url(url: &UrlState) -> Self {
        Self {
            sort: url.get(PARAM_SORT).and_then(SortKey::parse).unwrap_or_default(),
            search: url.get(PARAM_SEARCH).unwrap_or_default().to_string(),
            category: url.get(PARAM_CATEGORY).and_then(Category::parse),
            pricing: url.get(PARAM_PRICING).and_then(Pricing::parse),
            license: url.get(PARAM_LICENSE).and_then(License::parse),
            view_mode: url
                .get(PARAM_VIEW_MODE)
                .and_then(ViewMode::parse)
                .unwrap_or_default(),
            page: url
                .get(PARAM_PAGE)
                .and_then(|p| p.trim().parse::<usize>().ok())
                .unwrap_or(0),
        }
    }

    /// The filter/sort tuple sent to the gateway.
    pub fn tool_query(&self) -> ToolQuery {
        ToolQuery {
            search: self.search.clone(),
            category: self.category,
            pricing: self.pricing,
            license: self.license,
            sort: self.sort,
        }
    }

    /// Pure transition: the state after `event`.
    pub fn apply(&self, event: &QueryEvent) -> QueryState {
        let mut next = self.clone();
        match event {
            QueryEvent::SetSort(sort) => next.sort = *sort,
            QueryEvent::SetSearch(search) => next.search = search.clone(),
            QueryEvent::SetCategory(category) => next.category = *category,
            QueryEvent::SetPricing(pricing) => next.pricing = *pricing,
            QueryEvent::SetLicense(license) => next.license = *license,
            QueryEvent::SetViewMode(mode) => next.view_mode = *mode,
            QueryEvent::SetPage(page) => {
                next.page = *page;
                return next;
            }
            QueryEvent::Reset => return QueryState::default(),
        }
        next.page = 0;
        next
    }
}

impl UrlState {
    /// Patches only the parameters touched by `event`, resetting `page` to 0 for
    /// everything except plain page advancement.
    pub fn apply(&mut self, event: &QueryEvent) {
        match event {
            QueryEvent::SetSort(sort) => self.set(PARAM_SORT, sort.as_str()),
            QueryEvent::SetSearch(search) => self.set(PARAM_SEARCH, search.as_str()),
            QueryEvent::SetCategory(category) => {
                self.set(PARAM_CATEGORY, category.map_or(ALL, |c| c.as_str()))
            }
            QueryEvent::SetPricing(pricing) => {
                self.set(PARAM_PRICING, pricing.map_or(ALL, |p| p.as_str()))
            }
            QueryEvent::SetLicense(license) => {
                self.set(PARAM_LICENSE, license.map_or(ALL, |l| l.as_str()))
            }
            QueryEvent::SetViewMode(mode) => self.set(PARAM_VIEW_MODE, mode.as_str()),
            QueryEvent::SetPage(page) => {
                self.set(PARAM_PAGE, page.to_string());
                return;
            }
            QueryEvent::Reset => {
                self.set(PARAM_SORT, SortKey::Rank.as_str());
                self.set(PARAM_SEARCH, "");
                self.set(PARAM_CATEGORY, ALL);
                self.set(PARAM_PRICING, ALL);
                self.set(PARAM_LICENSE, ALL);
                self.set(PARAM_VIEW_MODE, ViewMode::Paginated.as_str());
            }
        }
        self.set(PARAM_PAGE, "0");
    }

    /// A shareable deep link that searches for exactly `tool_name`.
    pub fn share_link(&self, tool_name: &str) -> UrlState {
        let mut shared = self.clone();
        shared.set(PARAM_SEARCH, tool_name);
        shared.remove(PARAM_PAGE);
        shared
    }
}
