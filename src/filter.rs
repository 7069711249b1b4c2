use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::{AutorunError, Result};
use crate::events::ChangeEvent;

/// Shell-style matching against the whole path: `*` crosses `/`, dotfiles are not special.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Include and exclude glob rules, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FilterConfig {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Reject patterns that do not compile. Matching never fails, so this is the only place
    /// a bad pattern surfaces as an error.
    pub fn validate(&self) -> Result<()> {
        for pattern in self.include.iter().chain(&self.exclude) {
            Pattern::new(pattern).map_err(|err| AutorunError::InvalidPattern {
                pattern: pattern.clone(),
                reason: err.msg.to_string(),
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum GlobPattern {
    Compiled(Pattern),
    /// A pattern that failed to compile only matches its own text.
    Literal(String),
}

impl GlobPattern {
    fn new(pattern: &str) -> Self {
        match Pattern::new(pattern) {
            Ok(compiled) => GlobPattern::Compiled(compiled),
            Err(_) => GlobPattern::Literal(pattern.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            GlobPattern::Compiled(pattern) => pattern.matches_with(path, MATCH_OPTIONS),
            GlobPattern::Literal(text) => text == path,
        }
    }
}

/// Decides which change events may trigger a command. Stateless once built.
#[derive(Debug, Clone)]
pub struct EventFilter {
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl EventFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            include: config.include.iter().map(|p| GlobPattern::new(p)).collect(),
            exclude: config.exclude.iter().map(|p| GlobPattern::new(p)).collect(),
        }
    }

    pub fn accept(&self, event: &ChangeEvent) -> bool {
        if event.is_directory {
            return false;
        }

        if !event.kind.is_actionable() {
            return false;
        }

        self.matches_path(&event.path_str())
    }

    /// Include rules gate first (when any exist); an exclude match always wins.
    pub fn matches_path(&self, path: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(path)) {
            return false;
        }

        !self.exclude.iter().any(|p| p.matches(path))
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
