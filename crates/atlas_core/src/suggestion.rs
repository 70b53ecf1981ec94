//! crates/atlas_core/src/suggestion.rs
//!
//! The "suggest a tool" form: local edits, structural validation and submission.

use crate::domain::{Category, NewSuggestion, Pricing, SUGGESTED_TAGS};
use crate::ports::{GatewayError, ToolGateway};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{error, info};

pub const MIN_DESCRIPTION_CHARS: usize = 10;

pub const SUBMITTED_MESSAGE: &str = "Suggestion submitted! We'll review it soon.";

/// The first rule a form violates. `Display` is the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Tool name is required")]
    MissingName,
    #[error("Invalid website URL")]
    InvalidUrl,
    #[error("Invalid GitHub URL")]
    InvalidGithubUrl,
    #[error("Description must be at least 10 characters")]
    DescriptionTooShort,
    #[error("Select at least one category")]
    NoCategory,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#@]+([/?#]\S*)?$").ok())
        .as_ref()
}

/// Scheme, `://`, a non-empty host and an optional path, query or fragment.
pub fn is_well_formed_url(candidate: &str) -> bool {
    url_pattern().is_some_and(|re| re.is_match(candidate))
}

/// Suggested tags containing `query`, case-insensitively.
pub fn filtered_tags(query: &str) -> Vec<&'static str> {
    let needle = query.to_lowercase();
    SUGGESTED_TAGS
        .iter()
        .copied()
        .filter(|tag| tag.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestionForm {
    pub name: String,
    pub url: String,
    /// Empty means "no repository".
    pub github: String,
    pub description: String,
    pub pricing: Pricing,
    pub categories: Vec<Category>,
    pub tags: Vec<String>,
}

impl SuggestionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn set_github(&mut self, github: impl Into<String>) {
        self.github = github.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_pricing(&mut self, pricing: Pricing) {
        self.pricing = pricing;
    }

    pub fn toggle_category(&mut self, category: Category) {
        toggle(&mut self.categories, category);
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        toggle(&mut self.tags, tag.to_string());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Checks the rules in order and reports the first one violated.
    pub fn validate(&self) -> Result<NewSuggestion, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if !is_well_formed_url(&self.url) {
            return Err(ValidationError::InvalidUrl);
        }
        if !self.github.is_empty() && !is_well_formed_url(&self.github) {
            return Err(ValidationError::InvalidGithubUrl);
        }
        if self.description.chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionTooShort);
        }
        if self.categories.is_empty() {
            return Err(ValidationError::NoCategory);
        }

        Ok(NewSuggestion {
            name: self.name.clone(),
            url: self.url.clone(),
            github: (!self.github.is_empty()).then(|| self.github.clone()),
            description: self.description.clone(),
            pricing: self.pricing,
            categories: self.categories.clone(),
            tags: self.tags.clone(),
        })
    }

    /// Validates, then writes the proposal. The form is cleared only on success.
    pub async fn submit(&mut self, gateway: &dyn ToolGateway) -> Result<(), SubmitError> {
        let proposal = self.validate()?;
        match gateway.submit_suggestion(&proposal).await {
            Ok(()) => {
                info!(name = %proposal.name, "Suggestion submitted.");
                self.reset();
                Ok(())
            }
            Err(e) => {
                error!("Failed to submit suggestion: {}", e);
                Err(e.into())
            }
        }
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if let Some(pos) = items.iter().position(|i| *i == item) {
        items.remove(pos);
    } else {
        items.push(item);
    }
}
