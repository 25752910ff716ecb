use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

pub const MAX_RECENT: usize = 5;

/// Candidate numbers searched on this machine, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentSearches {
    entries: Vec<String>,
}

impl RecentSearches {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn record(&mut self, number: &str) {
        self.entries.retain(|entry| entry != number);
        self.entries.insert(0, number.to_string());
        self.entries.truncate(MAX_RECENT);
    }

    /// A missing or unreadable file yields an empty list.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(mut entries) => {
                entries.truncate(MAX_RECENT);
                Self { entries }
            }
            Err(err) => {
                warn!("Ignoring malformed search history {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string(&self.entries)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write search history {}", path.display()))
    }
}

pub fn default_history_path() -> PathBuf {
    PathBuf::from(".bac-results-history.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_first_without_duplicates() {
        let mut recent = RecentSearches::default();
        for number in ["1", "2", "3", "2"] {
            recent.record(number);
        }
        assert_eq!(recent.entries(), ["2", "3", "1"]);
    }

    #[test]
    fn bounded_to_five_entries() {
        let mut recent = RecentSearches::default();
        for number in 1..=7 {
            recent.record(&number.to_string());
        }
        assert_eq!(recent.entries(), ["7", "6", "5", "4", "3"]);
    }

    #[test]
    fn persists_round_trip_and_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        assert_eq!(RecentSearches::load(&path), RecentSearches::default());

        let mut recent = RecentSearches::default();
        recent.record("35733");
        recent.record("1000");
        recent.save(&path).unwrap();
        assert_eq!(RecentSearches::load(&path).entries(), ["1000", "35733"]);

        std::fs::write(&path, "{broken").unwrap();
        assert!(RecentSearches::load(&path).entries().is_empty());
    }
}
