use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "entry-dates.csv";

#[derive(Deserialize)]
struct EntryRow {
    sha: String,
    date: String,
}

/// Identity hash to entry date, loaded once per run.
#[derive(Debug, Default)]
pub struct EntryDates {
    dates: HashMap<String, String>,
}

impl EntryDates {
    /// Path used when none is configured: `entry-dates.csv` in the input directory.
    pub fn default_path(input_dir: &Path) -> PathBuf {
        input_dir.join(DEFAULT_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("Failed to open entry dates file: {}", path.display()))?;
        let mut dates = HashMap::new();
        for record in reader.deserialize::<EntryRow>() {
            let record = record.with_context(|| format!("Failed to read entry dates from {}", path.display()))?;
            dates.insert(record.sha, record.date);
        }
        info!("Loaded {} entry dates from {}", dates.len(), path.display());
        Ok(Self { dates })
    }

    pub fn lookup(&self, hash: &str) -> Option<&str> {
        self.dates.get(hash).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<(String, String)> for EntryDates {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { dates: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_hash_to_date_mapping() {
        let dir = TempDir::new().unwrap();
        let path = EntryDates::default_path(dir.path());
        fs::write(&path, "date,sha\n2020-03-13,abc123\n2020-04-01,def456\n").unwrap();

        let dates = EntryDates::load(&path).unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates.lookup("abc123"), Some("2020-03-13"));
        assert_eq!(dates.lookup("def456"), Some("2020-04-01"));
        assert_eq!(dates.lookup("missing"), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = EntryDates::load(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn builds_from_pairs() {
        let dates: EntryDates = vec![("h".to_string(), "2021-01-01".to_string())].into_iter().collect();
        assert_eq!(dates.lookup("h"), Some("2021-01-01"));
        assert!(!dates.is_empty());
    }
}
