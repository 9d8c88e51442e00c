//! Storage sinks. The pipeline calls `save` once per accepted article,
//! `complete` once with the aggregated citations, then `close`.

use anyhow::{bail, Result};
use std::path::Path;

use crate::article::{Article, Citation};

mod memory;
mod stream;
mod tabular;

pub use memory::MemorySink;
pub use stream::{StreamFormat, StreamSink};
pub use tabular::CsvSink;

pub trait Sink {
    fn save(&mut self, article: &Article) -> Result<()>;
    fn complete(&mut self, citations: &[Citation]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Opens the sink named by `url`: `json://dir`, `yaml://dir`, `memory://`,
/// or a directory (optionally `csv://dir`) for CSV tables.
pub fn create(url: &str) -> Result<Box<dyn Sink>> {
    if let Some(dir) = url.strip_prefix("json://") {
        return Ok(Box::new(StreamSink::create(Path::new(dir), StreamFormat::Json)?));
    }
    if let Some(dir) = url.strip_prefix("yaml://") {
        return Ok(Box::new(StreamSink::create(Path::new(dir), StreamFormat::Yaml)?));
    }
    if url.starts_with("memory://") {
        return Ok(Box::new(MemorySink::default()));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        bail!("Search-index sinks are not built in: {}", url);
    }
    let dir = url.strip_prefix("csv://").unwrap_or(url);
    Ok(Box::new(CsvSink::create(Path::new(dir))?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn url_scheme_selects_sink() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().display().to_string();

        assert!(create(&format!("json://{}/j", base)).is_ok());
        assert!(dir.path().join("j/articles.jsonl").exists());
        assert!(create(&format!("yaml://{}/y", base)).is_ok());
        assert!(dir.path().join("y/articles.yml").exists());
        assert!(create(&format!("csv://{}/c", base)).is_ok());
        assert!(dir.path().join("c/articles.csv").exists());
        assert!(create(&format!("{}/plain", base)).is_ok());
        assert!(dir.path().join("plain/sections.csv").exists());
        assert!(create("memory://").is_ok());
    }

    #[test]
    fn search_index_urls_are_rejected() {
        let err = create("http://localhost:9200").err().unwrap();
        assert!(err.to_string().contains("not built in"));
    }
}
