pub mod cache;
pub mod debounce;
pub mod domain;
pub mod listing;
pub mod memory;
pub mod ports;
pub mod presentation;
pub mod query;
pub mod quick_search;
pub mod suggestion;
pub mod tunables;
pub mod vote;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ReadCaches;
pub use domain::{Category, License, NewSuggestion, Pricing, SortKey, Tool, ToolPage, ViewMode, VoteStatus};
pub use listing::{ListSnapshot, NextPage, PageNav, SearchBox, ToolListController};
pub use memory::InMemoryGateway;
pub use ports::{GatewayError, GatewayResult, RowRange, ToolGateway, ToolQuery};
pub use query::{QueryEvent, QueryState, UrlState};
pub use quick_search::QuickSearch;
pub use suggestion::{SubmitError, SuggestionForm, ValidationError};
pub use tunables::Tunables;
pub use vote::{VoteCard, VoteController, VoteOutcome, VoteView};
