use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Sink;
use crate::article::{Article, Citation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// One JSON document per line.
    Json,
    /// `---`-separated YAML documents.
    Yaml,
}

impl StreamFormat {
    fn extension(self) -> &'static str {
        match self {
            StreamFormat::Json => "jsonl",
            StreamFormat::Yaml => "yml",
        }
    }
}

/// Document-stream sink writing `articles.<ext>` and `citations.<ext>`.
pub struct StreamSink {
    format: StreamFormat,
    articles: BufWriter<File>,
    citations: BufWriter<File>,
    rows: usize,
}

impl StreamSink {
    pub fn create(output_dir: &Path, format: StreamFormat) -> Result<Self> {
        fs::create_dir_all(output_dir).with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
        let open = |name: &str| -> Result<BufWriter<File>> {
            let path = output_dir.join(format!("{}.{}", name, format.extension()));
            let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self { format, articles: open("articles")?, citations: open("citations")?, rows: 0 })
    }

    fn write<T: Serialize>(format: StreamFormat, writer: &mut BufWriter<File>, value: &T) -> Result<()> {
        match format {
            StreamFormat::Json => {
                serde_json::to_writer(&mut *writer, value)?;
                writer.write_all(b"\n")?;
            }
            StreamFormat::Yaml => {
                writer.write_all(b"---\n")?;
                serde_yaml::to_writer(&mut *writer, value)?;
            }
        }
        Ok(())
    }
}

impl Sink for StreamSink {
    fn save(&mut self, article: &Article) -> Result<()> {
        Self::write(self.format, &mut self.articles, article).with_context(|| format!("Failed to write article '{}'", article.uid()))?;
        self.rows += 1;
        Ok(())
    }

    fn complete(&mut self, citations: &[Citation]) -> Result<()> {
        for citation in citations {
            Self::write(self.format, &mut self.citations, citation)?;
        }
        self.articles.flush()?;
        self.citations.flush()?;
        info!("Total articles inserted: {}", self.rows);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.articles.flush()?;
        self.citations.flush()?;
        Ok(())
    }
}
