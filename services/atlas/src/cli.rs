//! services/atlas/src/cli.rs
//!
//! The command-line front end: argument parsing, command execution against a
//! `ToolGateway`, and plain-text rendering of the list view models.

use crate::error::AppError;
use atlas_core::domain::{Category, License, Pricing, SortKey, Tool, ViewMode};
use atlas_core::listing::NextPage;
use atlas_core::presentation::{Footer, ListView, ToolCardView, EMPTY_HINT, EMPTY_TITLE, END_OF_REGISTRY};
use atlas_core::query::ALL;
use atlas_core::suggestion::SUBMITTED_MESSAGE;
use atlas_core::vote::VoteOutcome;
use atlas_core::{
    QueryEvent, QuickSearch, ReadCaches, SuggestionForm, ToolGateway,
    ToolListController, Tunables, UrlState, VoteController, VoteStatus,
};
use atlas_core::ports::{RowRange, ToolQuery};
use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rows fetched per request when resolving a tool id.
const RESOLVE_PAGE_SIZE: usize = 100;

#[derive(Debug, Parser)]
#[command(name = "atlas", version, about = "Browse, vote on and suggest AI coding tools.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tools, optionally starting from a shared link's query string.
    List(ListArgs),
    /// Quick name search; the top voted tools when no text is given.
    Search {
        #[arg(default_value = "")]
        text: String,
    },
    /// Toggle this session's vote on a tool, by exact name or by id.
    Vote { tool: String },
    /// Print the ids of tools this session voted for.
    Votes,
    /// Suggest a new tool for the catalog.
    Suggest(SuggestArgs),
    /// Print a shareable query string that searches for exactly one tool.
    Share {
        name: String,
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[derive(Debug, Args, Default)]
pub struct ListArgs {
    /// URL query string, e.g. "sortBy=newest&activeType=CLI".
    #[arg(long, default_value = "")]
    pub query: String,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortKey>,
    /// IDE, CLI, Web, API or All.
    #[arg(long, value_parser = parse_category)]
    pub category: Option<Facet<Category>>,
    /// Free, Freemium, Paid or All.
    #[arg(long, value_parser = parse_pricing)]
    pub pricing: Option<Facet<Pricing>>,
    /// open, closed or All.
    #[arg(long, value_parser = parse_license)]
    pub license: Option<Facet<License>>,
    /// Zero-based page index.
    #[arg(long)]
    pub page: Option<usize>,
    /// Use the accumulating feed instead of discrete pages.
    #[arg(long)]
    pub continuous: bool,
    /// Feed pages to load in continuous mode.
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub github: Option<String>,
    #[arg(long)]
    pub description: String,
    #[arg(long, value_parser = parse_plain_pricing, default_value = "Free")]
    pub pricing: Pricing,
    #[arg(long = "category", value_parser = parse_plain_category)]
    pub categories: Vec<Category>,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

/// A facet flag value: a concrete variant or "All".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facet<T>(pub Option<T>);

fn facet<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> Result<Facet<T>, String> {
    if raw.eq_ignore_ascii_case(ALL) {
        return Ok(Facet(None));
    }
    parse(raw)
        .map(|v| Facet(Some(v)))
        .ok_or_else(|| format!("unknown {what} '{raw}'"))
}

fn parse_sort(raw: &str) -> Result<SortKey, String> {
    SortKey::parse(raw).ok_or_else(|| format!("unknown sort '{raw}' (rank, newest, name)"))
}

fn parse_category(raw: &str) -> Result<Facet<Category>, String> {
    facet(raw, Category::parse, "category")
}

fn parse_pricing(raw: &str) -> Result<Facet<Pricing>, String> {
    facet(raw, Pricing::parse, "pricing")
}

fn parse_license(raw: &str) -> Result<Facet<License>, String> {
    facet(raw, License::parse, "license")
}

fn parse_plain_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| format!("unknown category '{raw}'"))
}

fn parse_plain_pricing(raw: &str) -> Result<Pricing, String> {
    Pricing::parse(raw).ok_or_else(|| format!("unknown pricing '{raw}'"))
}

//=========================================================================================
// Command Execution
//=========================================================================================

/// Everything a command needs, built once per process.
pub struct Shell {
    gateway: Arc<dyn ToolGateway>,
    caches: Arc<ReadCaches>,
    tunables: Tunables,
    votes: VoteController,
}

impl Shell {
    pub fn new(gateway: Arc<dyn ToolGateway>, tunables: Tunables) -> Self {
        let caches = Arc::new(ReadCaches::new(tunables.cache_ttl));
        let votes = VoteController::new(Arc::clone(&gateway), Arc::clone(&caches), tunables);
        Self {
            gateway,
            caches,
            tunables,
            votes,
        }
    }

    /// Runs one command and returns what it prints.
    pub async fn run(&self, command: Command) -> Result<String, AppError> {
        match command {
            Command::List(args) => self.list(args).await,
            Command::Search { text } => self.search(&text).await,
            Command::Vote { tool } => self.vote(&tool).await,
            Command::Votes => self.user_votes().await,
            Command::Suggest(args) => self.suggest(args).await,
            Command::Share { name, query } => {
                let link = UrlState::parse(&query).share_link(&name);
                Ok(format!("?{}", link.to_query_string()))
            }
        }
    }

    fn controller(&self, url: UrlState) -> ToolListController {
        ToolListController::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.caches),
            self.tunables,
            url,
        )
    }

    async fn list(&self, args: ListArgs) -> Result<String, AppError> {
        let controller = self.controller(UrlState::parse(&args.query));

        // Explicit flags go through the same setters a user would trigger.
        let mut events = Vec::new();
        if let Some(search) = args.search {
            events.push(QueryEvent::SetSearch(search));
        }
        if let Some(sort) = args.sort {
            events.push(QueryEvent::SetSort(sort));
        }
        if let Some(Facet(category)) = args.category {
            events.push(QueryEvent::SetCategory(category));
        }
        if let Some(Facet(pricing)) = args.pricing {
            events.push(QueryEvent::SetPricing(pricing));
        }
        if let Some(Facet(license)) = args.license {
            events.push(QueryEvent::SetLicense(license));
        }
        if args.continuous {
            events.push(QueryEvent::SetViewMode(ViewMode::Continuous));
        }
        if let Some(page) = args.page {
            events.push(QueryEvent::SetPage(page));
        }
        for event in events {
            controller.dispatch(event).await;
        }
        let state = controller.query_state().await;
        debug!(?state, "Listing tools.");

        let mut snapshot = controller.load().await?;
        if state.view_mode == ViewMode::Continuous {
            for _ in 1..args.pages.max(1) {
                if controller.on_sentinel_visible().await? == NextPage::Skipped {
                    break;
                }
            }
            snapshot = controller.load().await?;
        }

        let voted = controller.user_votes().await.unwrap_or_else(|e| {
            warn!("Could not read this session's votes: {}", e);
            HashSet::new()
        });
        let mut cards = Vec::with_capacity(snapshot.tools.len());
        for tool in &snapshot.tools {
            let card = self.votes.card(tool, voted.contains(&tool.id)).await;
            cards.push(ToolCardView::new(tool, &card.view().await, &state.search));
        }
        Ok(render_list(&ListView::new(Some(&snapshot), cards)))
    }

    async fn search(&self, text: &str) -> Result<String, AppError> {
        let quick = QuickSearch::new(Arc::clone(&self.gateway), Arc::clone(&self.caches), self.tunables);
        let hits = quick.search(text).await?;
        if hits.is_empty() {
            return Ok("NO RECORDS MATCHING QUERY".to_string());
        }
        let mut out = String::new();
        for tool in hits {
            let _ = writeln!(out, "{}  ({} votes)  {}", tool.name, tool.vote_count, tool.id);
        }
        Ok(out.trim_end().to_string())
    }

    /// Finds a tool by exact name, or by id anywhere in the catalog.
    async fn resolve(&self, needle: &str) -> Result<Tool, AppError> {
        let quick = QuickSearch::new(Arc::clone(&self.gateway), Arc::clone(&self.caches), self.tunables);
        let Ok(id) = needle.parse::<Uuid>() else {
            return quick
                .search(needle)
                .await?
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(needle))
                .ok_or_else(|| AppError::Internal(format!("No tool named '{}'", needle)));
        };

        if let Some(tool) = quick.search("").await?.into_iter().find(|t| t.id == id) {
            return Ok(tool);
        }
        // Not among the top voted: walk the full listing.
        let query = ToolQuery::default();
        let mut page = 0;
        loop {
            let range = RowRange::for_page(page, RESOLVE_PAGE_SIZE);
            let batch = self.gateway.list_tools(&query, range).await?;
            if let Some(tool) = batch.tools.iter().find(|t| t.id == id) {
                return Ok(tool.clone());
            }
            if batch.tools.is_empty() || (range.end as u64) + 1 >= batch.total_count {
                return Err(AppError::Internal(format!("No tool with id {}", id)));
            }
            page += 1;
        }
    }

    /// Vote set for marking cards; a failed read only loses the markers.
    async fn voted_ids(&self) -> HashSet<Uuid> {
        self.gateway.user_votes().await.unwrap_or_else(|e| {
            warn!("Could not read this session's votes: {}", e);
            HashSet::new()
        })
    }

    async fn vote(&self, needle: &str) -> Result<String, AppError> {
        let tool = self.resolve(needle).await?;
        let voted = self.voted_ids().await;
        let card = self.votes.card(&tool, voted.contains(&tool.id)).await;

        match card.toggle().await? {
            VoteOutcome::Confirmed(status) => {
                let view = card.view().await;
                let verb = match status {
                    VoteStatus::Added => "Voted for",
                    VoteStatus::Removed => "Removed vote from",
                };
                info!(tool = %tool.name, ?status, "Vote settled.");
                Ok(format!("{} {} ({} votes)", verb, tool.name, view.count))
            }
            VoteOutcome::Suppressed => Ok(format!("A vote on {} is already in progress.", tool.name)),
        }
    }

    async fn user_votes(&self) -> Result<String, AppError> {
        let voted = self.gateway.user_votes().await?;
        if voted.is_empty() {
            return Ok("No votes yet.".to_string());
        }
        let mut ids: Vec<String> = voted.iter().map(|id| id.to_string()).collect();
        ids.sort();
        Ok(ids.join("\n"))
    }

    async fn suggest(&self, args: SuggestArgs) -> Result<String, AppError> {
        let mut form = SuggestionForm::new();
        form.set_name(args.name);
        form.set_url(args.url);
        form.set_github(args.github.unwrap_or_default());
        form.set_description(args.description);
        form.set_pricing(args.pricing);
        for category in args.categories {
            form.toggle_category(category);
        }
        for tag in &args.tags {
            form.toggle_tag(tag);
        }
        form.submit(self.gateway.as_ref()).await?;
        Ok(SUBMITTED_MESSAGE.to_string())
    }
}

//=========================================================================================
// Rendering
//=========================================================================================

pub fn render_list(view: &ListView) -> String {
    match view {
        ListView::Loading => "Loading...".to_string(),
        ListView::Empty => format!("{}\n{}\nRun with no filters to reset.", EMPTY_TITLE, EMPTY_HINT),
        ListView::Items { cards, footer } => {
            let mut out = String::new();
            for card in cards {
                render_card(&mut out, card);
            }
            match footer {
                Footer::None => {}
                Footer::Pages {
                    label,
                    can_prev,
                    can_next,
                } => {
                    let _ = writeln!(
                        out,
                        "{}   [{}PREV] [{}NEXT]",
                        label,
                        if *can_prev { "" } else { "-" },
                        if *can_next { "" } else { "-" }
                    );
                }
                Footer::Sentinel { label } => {
                    let _ = writeln!(out, "{}", label.unwrap_or("(more records available)"));
                }
                Footer::End => {
                    let _ = writeln!(out, "{}", END_OF_REGISTRY);
                }
            }
            out.trim_end().to_string()
        }
    }
}

fn render_card(out: &mut String, card: &ToolCardView) {
    let marker = if card.highlighted { "> " } else { "  " };
    let voted = if card.has_voted { "*" } else { " " };
    let delta = card.vote_delta.map(|d| format!(" {d}")).unwrap_or_default();
    let _ = writeln!(
        out,
        "{marker}{}  [{}]  {} | {}  {voted}{}{delta}",
        card.name,
        card.categories.join(", "),
        card.pricing,
        card.license,
        card.votes,
    );
    let _ = writeln!(out, "    {}", card.description);
    match &card.github {
        Some(github) => {
            let _ = writeln!(out, "    {}  {}", card.url, github);
        }
        None => {
            let _ = writeln!(out, "    {}", card.url);
        }
    }
    if !card.tags.is_empty() {
        let tags: Vec<String> = card.tags.iter().map(|t| format!("#{t}")).collect();
        let _ = writeln!(out, "    {}", tags.join(" "));
    }
    out.push('\n');
}
