pub mod serper;

pub use serper::SerperClient;

use async_trait::async_trait;

use crate::error::RelayError;

pub const SNIPPET_DELIMITER: &str = ", ";

/// Snippets returned by one search, in provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub snippets: Vec<String>,
}

impl SearchResults {
    /// True when no snippet carries any text.
    pub fn is_empty(&self) -> bool {
        self.snippets.iter().all(|s| s.trim().is_empty())
    }

    pub fn joined(&self) -> String {
        self.snippets.join(SNIPPET_DELIMITER)
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fails with [`RelayError::SearchUnavailable`] on transport, status or
    /// decoding errors.
    async fn search(&self, query: &str) -> Result<SearchResults, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_snippets_count_as_empty() {
        let results = SearchResults {
            snippets: vec!["".into(), "  ".into()],
        };
        assert!(results.is_empty());
        assert!(SearchResults::default().is_empty());

        let results = SearchResults {
            snippets: vec!["".into(), "Sunny".into()],
        };
        assert!(!results.is_empty());
    }
}
