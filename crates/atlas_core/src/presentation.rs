//! crates/atlas_core/src/presentation.rs
//!
//! Renderable view models for the tool list, independent of any output surface.

use crate::domain::{Tool, ViewMode};
use crate::listing::ListSnapshot;
use crate::ports::GatewayError;
use crate::vote::{VotePhase, VoteView};
use uuid::Uuid;

pub const EMPTY_TITLE: &str = "No Records Found";
pub const EMPTY_HINT: &str = "Adjust filters to broaden your search.";
pub const LOADING_RECORDS: &str = "Loading Records...";
pub const END_OF_REGISTRY: &str = "End of Atlas Registry";

/// Compact vote count: `999`, `1.2K`, `10K`, `1.3M`.
pub fn format_count(n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }
    let thousands_tenths = (n * 10 + 500) / 1_000;
    if thousands_tenths < 10_000 {
        return with_unit(thousands_tenths, 'K');
    }
    with_unit((n * 10 + 500_000) / 1_000_000, 'M')
}

fn with_unit(tenths: u64, unit: char) -> String {
    match tenths % 10 {
        0 => format!("{}{unit}", tenths / 10),
        frac => format!("{}.{frac}{unit}", tenths / 10),
    }
}

//=========================================================================================
// Cards
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCardView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub categories: Vec<&'static str>,
    pub pricing: &'static str,
    /// "Open" or "Closed".
    pub license: &'static str,
    pub tags: Vec<String>,
    pub url: String,
    pub github: Option<String>,
    pub votes: String,
    pub has_voted: bool,
    /// The active search names this tool exactly, ignoring case.
    pub highlighted: bool,
    pub vote_delta: Option<&'static str>,
    pub vote_pending: bool,
}

impl ToolCardView {
    pub fn new(tool: &Tool, vote: &VoteView, search: &str) -> Self {
        Self {
            id: tool.id,
            name: tool.name.clone(),
            description: tool.description.clone(),
            categories: tool.categories.iter().map(|c| c.as_str()).collect(),
            pricing: tool.pricing.as_str(),
            license: tool.license().badge(),
            tags: tool.tags.clone(),
            url: tool.url.clone(),
            github: tool.github.clone(),
            votes: format_count(vote.count.into()),
            has_voted: vote.has_voted,
            highlighted: !search.is_empty() && tool.name.to_lowercase() == search.to_lowercase(),
            vote_delta: vote.delta.map(|d| d.label()),
            vote_pending: vote.phase == VotePhase::Pending,
        }
    }
}

//=========================================================================================
// List
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Footer {
    None,
    Pages {
        label: String,
        can_prev: bool,
        can_next: bool,
    },
    /// Visible while more feed pages exist; reaching it requests the next one.
    Sentinel { label: Option<&'static str> },
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    Loading,
    /// Offers a filter reset.
    Empty,
    Items {
        cards: Vec<ToolCardView>,
        footer: Footer,
    },
}

impl ListView {
    /// `snapshot` is `None` while the first read is still in flight.
    pub fn new(snapshot: Option<&ListSnapshot>, cards: Vec<ToolCardView>) -> Self {
        let Some(snapshot) = snapshot else {
            return ListView::Loading;
        };
        if cards.is_empty() {
            return ListView::Empty;
        }
        ListView::Items {
            footer: footer(snapshot),
            cards,
        }
    }
}

fn footer(snapshot: &ListSnapshot) -> Footer {
    match snapshot.mode {
        ViewMode::Paginated => match snapshot.nav {
            Some(nav) if nav.total_pages > 1 => Footer::Pages {
                label: format!(
                    "Page {} of {} | {} Records",
                    nav.page + 1,
                    nav.total_pages,
                    snapshot.total_count
                ),
                can_prev: nav.can_prev,
                can_next: nav.can_next,
            },
            _ => Footer::None,
        },
        ViewMode::Continuous if snapshot.has_next_page || snapshot.is_fetching_next_page => {
            Footer::Sentinel {
                label: snapshot.is_fetching_next_page.then_some(LOADING_RECORDS),
            }
        }
        ViewMode::Continuous => Footer::End,
    }
}

//=========================================================================================
// Notices
//=========================================================================================

/// A transient toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Error(m) => m,
        }
    }
}

impl From<&GatewayError> for Notice {
    fn from(e: &GatewayError) -> Self {
        Notice::Error(e.user_message())
    }
}
