//! Pair working set
//!
//! Holds the pairs currently subscribed to. The set is replaced wholesale
//! on each discovery refresh; readers never observe a partial update.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Pair working set
///
/// Seeded with the fallback list so consumers always see a non-empty set,
/// even before the first successful discovery refresh.
pub struct PairUniverse {
    pairs: RwLock<Arc<Vec<String>>>,
    fallback: Vec<String>,
}

impl PairUniverse {
    /// Create a universe seeded with the fallback list.
    pub fn new(fallback: Vec<String>) -> Self {
        let fallback: Vec<String> = fallback.into_iter().map(|p| p.to_uppercase()).collect();
        Self {
            pairs: RwLock::new(Arc::new(fallback.clone())),
            fallback,
        }
    }

    /// Current working set. The returned value is a consistent snapshot.
    pub fn pairs(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.pairs.read())
    }

    /// Replace the working set wholesale in one assignment.
    pub fn replace(&self, pairs: Vec<String>) {
        let count = pairs.len();
        *self.pairs.write() = Arc::new(pairs);
        debug!("working set replaced: {} pairs", count);
    }

    /// Number of pairs in the working set.
    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    /// Check if the working set is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.read().is_empty()
    }

    /// Check membership.
    pub fn contains(&self, pair: &str) -> bool {
        self.pairs.read().iter().any(|p| p == pair)
    }

    /// The static fallback list.
    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_fallback() {
        let universe = PairUniverse::new(vec!["btcusdt".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(universe.len(), 2);
        assert!(universe.contains("BTCUSDT"));
        assert!(universe.contains("ETHUSDT"));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let universe = PairUniverse::new(vec!["BTCUSDT".to_string()]);
        universe.replace(vec!["SOLUSDT".to_string(), "XRPUSDT".to_string()]);

        assert_eq!(universe.len(), 2);
        assert!(!universe.contains("BTCUSDT"));
        assert!(universe.contains("SOLUSDT"));
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let universe = PairUniverse::new(vec!["BTCUSDT".to_string()]);
        let snapshot = universe.pairs();

        universe.replace(vec!["ETHUSDT".to_string()]);

        // The old snapshot is untouched by the replacement
        assert_eq!(snapshot.as_slice(), ["BTCUSDT".to_string()]);
        assert_eq!(universe.pairs().as_slice(), ["ETHUSDT".to_string()]);
    }

    #[test]
    fn test_fallback_preserved() {
        let universe = PairUniverse::new(vec!["BTCUSDT".to_string()]);
        universe.replace(vec![]);
        assert!(universe.is_empty());
        assert_eq!(universe.fallback(), ["BTCUSDT".to_string()]);
    }
}
