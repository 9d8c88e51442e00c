use anyhow::{anyhow, Context, Result};
use csv::Writer;
use log::{error, info, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::Sink;
use crate::article::{Article, Citation, ARTICLE_COLUMNS};

const TABLE_NAMES: [&str; 3] = ["articles", "sections", "citations"];

/// Writes `articles.csv`, `sections.csv` and `citations.csv` into one directory.
pub struct CsvSink {
    writers: HashMap<&'static str, Writer<File>>,
    output_dir: PathBuf,
    rows_written: HashMap<&'static str, usize>,
    closed: bool,
}

impl CsvSink {
    pub fn create(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir).with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let headers: HashMap<&str, Vec<&str>> = [
            ("articles", ARTICLE_COLUMNS.to_vec()),
            ("sections", vec!["article", "position", "name", "text", "label"]),
            ("citations", vec!["title", "mentions"]),
        ]
        .into_iter()
        .collect();

        let mut writers = HashMap::new();
        let mut rows_written = HashMap::new();
        for table_name in TABLE_NAMES {
            let file_path = output_dir.join(format!("{}.csv", table_name));
            let file = File::create(&file_path).with_context(|| format!("Failed to create {}", file_path.display()))?;
            let mut writer = Writer::from_writer(file);
            if let Some(header) = headers.get(table_name) {
                writer.write_record(header)?;
            } else {
                warn!("No headers defined for table: {}", table_name);
            }
            writer.flush()?;
            writers.insert(table_name, writer);
            rows_written.insert(table_name, 0);
        }

        Ok(Self { writers, output_dir: output_dir.to_path_buf(), rows_written, closed: false })
    }

    pub fn rows_written(&self, table_name: &str) -> usize {
        self.rows_written.get(table_name).copied().unwrap_or(0)
    }

    fn writer(&mut self, table_name: &str) -> Result<&mut Writer<File>> {
        self.writers.get_mut(table_name).ok_or_else(|| anyhow!("Writer for table '{}' not found", table_name))
    }

    fn increment_row_count(&mut self, table_name: &'static str, count: usize) {
        *self.rows_written.entry(table_name).or_insert(0) += count;
    }

    fn flush(&mut self) -> Result<()> {
        let mut flush_errors = Vec::new();
        for (name, writer) in self.writers.iter_mut() {
            if let Err(e) = writer.flush() {
                flush_errors.push(format!("Failed to flush file {}.csv: {}", name, e));
            }
        }
        if flush_errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Errors occurred during flush:\n - {}", flush_errors.join("\n - ")))
        }
    }
}

impl Sink for CsvSink {
    fn save(&mut self, article: &Article) -> Result<()> {
        self.writer("articles")?.write_record(article.columns())?;
        self.increment_row_count("articles", 1);

        let uid = article.uid().to_string();
        let writer = self.writer("sections")?;
        for (position, section) in article.sections.iter().enumerate() {
            let position = position.to_string();
            writer.write_record([
                uid.as_str(),
                position.as_str(),
                section.name.as_deref().unwrap_or(""),
                section.text.as_str(),
                section.label.as_deref().unwrap_or(""),
            ])?;
        }
        self.increment_row_count("sections", article.sections.len());

        let articles = self.rows_written("articles");
        if articles % 1000 == 0 {
            info!("Inserted {} articles", articles);
        }
        Ok(())
    }

    fn complete(&mut self, citations: &[Citation]) -> Result<()> {
        let writer = self.writer("citations")?;
        for citation in citations {
            let mentions = citation.mentions.to_string();
            writer.write_record([citation.title.as_str(), mentions.as_str()])?;
        }
        self.increment_row_count("citations", citations.len());
        self.flush()?;
        info!("Total articles inserted: {}", self.rows_written("articles"));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        info!("Closed CSV output in {}", self.output_dir.display());
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                error!("Error flushing CSV writers during cleanup: {}", e);
            }
        }
    }
}
