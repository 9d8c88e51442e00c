use anyhow::{bail, Result};

use super::Sink;
use crate::article::{Article, Citation};

/// Keeps everything in memory. Used for dry runs (`memory://`) and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub articles: Vec<Article>,
    pub citations: Vec<Citation>,
    pub completed: bool,
    pub closed: bool,
}

impl MemorySink {
    pub fn uids(&self) -> Vec<&str> {
        self.articles.iter().map(Article::uid).collect()
    }
}

impl Sink for MemorySink {
    fn save(&mut self, article: &Article) -> Result<()> {
        if self.completed {
            bail!("save after complete");
        }
        self.articles.push(article.clone());
        Ok(())
    }

    fn complete(&mut self, citations: &[Citation]) -> Result<()> {
        if self.completed {
            bail!("complete called twice");
        }
        self.citations = citations.to_vec();
        self.completed = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
