//! crates/atlas_core/src/domain.rs
//!
//! Defines the pure, core data structures for the catalog.
//! These structs are independent of any wire or serialization format; the
//! gateway adapters map their own record types onto them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Catalog Enumerations
//=========================================================================================

/// The fixed set of tool categories a tool can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Ide,
    Cli,
    Web,
    Api,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Ide, Category::Cli, Category::Web, Category::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ide => "IDE",
            Category::Cli => "CLI",
            Category::Web => "Web",
            Category::Api => "API",
        }
    }

    /// Case-insensitive lookup of a category by its label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// Pricing classification of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pricing {
    #[default]
    Free,
    Freemium,
    Paid,
}

impl Pricing {
    pub const ALL: [Pricing; 3] = [Pricing::Free, Pricing::Freemium, Pricing::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pricing::Free => "Free",
            Pricing::Freemium => "Freemium",
            Pricing::Paid => "Paid",
        }
    }

    /// Case-insensitive lookup; the store keeps pricing in mixed case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// Whether a tool publishes its source. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum License {
    Open,
    Closed,
}

impl License {
    /// The label used on URLs and in the filter bar.
    pub fn as_str(&self) -> &'static str {
        match self {
            License::Open => "Open Source",
            License::Closed => "Closed Source",
        }
    }

    /// Short badge text shown on a card.
    pub fn badge(&self) -> &'static str {
        match self {
            License::Open => "Open",
            License::Closed => "Closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("Open Source") || s.eq_ignore_ascii_case("open") {
            Some(License::Open)
        } else if s.eq_ignore_ascii_case("Closed Source") || s.eq_ignore_ascii_case("closed") {
            Some(License::Closed)
        } else {
            None
        }
    }
}

/// Sort order for the tool listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    /// Descending vote count.
    #[default]
    Rank,
    /// Descending creation time.
    Newest,
    /// Ascending name.
    Name,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rank => "rank",
            SortKey::Newest => "newest",
            SortKey::Name => "name",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rank" => Some(SortKey::Rank),
            "newest" => Some(SortKey::Newest),
            "name" => Some(SortKey::Name),
            _ => None,
        }
    }
}

/// Pagination mode of the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    /// One bounded read per discrete page.
    #[default]
    Paginated,
    /// Pages accumulate into one growing list.
    Continuous,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Paginated => "paginated",
            ViewMode::Continuous => "continuous",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paginated" => Some(ViewMode::Paginated),
            "continuous" => Some(ViewMode::Continuous),
            _ => None,
        }
    }
}

/// Suggested free tags offered by the submission form's tag picker.
pub const SUGGESTED_TAGS: &[&str] = &[
    "agentic", "anthropic", "api", "assistant", "autocomplete", "automation", "autonomous",
    "aws", "builder", "byok", "cascade", "chat", "cloud-ide", "code-search", "codegen",
    "completion", "context", "deploy", "editor", "enterprise", "extension", "extensions",
    "frontend", "full-stack", "gemini", "generator", "git", "google", "indexing", "jetbrains",
    "local", "model", "models", "open-source", "performance", "planning", "privacy",
    "prototype", "router", "rust", "serve", "team", "teams", "terminal", "tools", "ui",
    "vscode", "vscode-fork", "webcontainers",
];

//=========================================================================================
// Entities
//=========================================================================================

/// A catalog entry. Read-only from the client's perspective.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub url: String,
    /// Source repository; its presence makes the tool open source.
    pub github: Option<String>,
    pub pricing: Pricing,
    pub categories: Vec<Category>,
    pub tags: Vec<String>,
    /// Maintained exclusively by the store.
    pub vote_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Tool {
    pub fn license(&self) -> License {
        if self.github.is_some() {
            License::Open
        } else {
            License::Closed
        }
    }
}

/// Existence record: this session has voted for this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vote {
    pub session_id: Uuid,
    pub tool_id: Uuid,
}

/// Result reported by the store after toggling a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    Added,
    Removed,
}

/// A validated tool proposal ready to be written to the moderation queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSuggestion {
    pub name: String,
    pub url: String,
    pub github: Option<String>,
    pub description: String,
    pub pricing: Pricing,
    pub categories: Vec<Category>,
    pub tags: Vec<String>,
}

/// A stored suggestion, attributed to the submitting session.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub submitted_by: Uuid,
    pub proposal: NewSuggestion,
}

/// One bounded slice of the listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolPage {
    pub tools: Vec<Tool>,
    pub total_count: u64,
}
