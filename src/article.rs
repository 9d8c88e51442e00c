use chrono::NaiveDate;
use serde::Serialize;

use crate::section::Section;

/// Article metadata columns. `entry` is filled in only once the article is
/// accepted.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ArticleMetadata {
    pub id: String,
    pub source: String,
    pub published: Option<NaiveDate>,
    pub publication: String,
    pub authors: String,
    pub title: String,
    pub tags: Option<String>,
    pub design: Option<u32>,
    pub size: Option<String>,
    pub sample: Option<String>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub entry: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Article {
    #[serde(flatten)]
    pub metadata: ArticleMetadata,
    pub sections: Vec<Section>,
}

impl Article {
    pub fn uid(&self) -> &str {
        &self.metadata.id
    }

    pub fn tags(&self) -> Option<&str> {
        self.metadata.tags.as_deref()
    }

    /// Metadata as ordered text columns, for tabular sinks.
    pub fn columns(&self) -> [String; 13] {
        let m = &self.metadata;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        [
            m.id.clone(),
            m.source.clone(),
            m.published.map(|date| date.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            m.publication.clone(),
            m.authors.clone(),
            m.title.clone(),
            text(&m.tags),
            m.design.map(|design| design.to_string()).unwrap_or_default(),
            text(&m.size),
            text(&m.sample),
            text(&m.method),
            text(&m.reference),
            text(&m.entry),
        ]
    }
}

pub const ARTICLE_COLUMNS: [&str; 13] = [
    "id", "source", "published", "publication", "authors", "title", "tags", "design", "size", "sample", "method", "reference", "entry",
];

/// Per-row worker output, not yet checked against the run's dedup state.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub hash: String,
    pub article: Article,
    pub citations: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub mentions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_header_order() {
        let article = Article {
            metadata: ArticleMetadata {
                id: "abc".into(),
                published: NaiveDate::from_ymd_opt(2020, 4, 2),
                tags: Some("COVID-19".into()),
                design: Some(4),
                entry: Some("2020-04-10".into()),
                ..ArticleMetadata::default()
            },
            sections: Vec::new(),
        };
        let columns = article.columns();
        assert_eq!(columns.len(), ARTICLE_COLUMNS.len());
        assert_eq!(columns[0], "abc");
        assert_eq!(columns[2], "2020-04-02");
        assert_eq!(columns[6], "COVID-19");
        assert_eq!(columns[7], "4");
        assert_eq!(columns[12], "2020-04-10");
        assert_eq!(columns[11], "");
    }

    #[test]
    fn serializes_flat_with_sections() {
        let article = Article {
            metadata: ArticleMetadata { id: "x1".into(), ..ArticleMetadata::default() },
            sections: vec![Section::new(Some("TITLE".into()), "Hello.".into())],
        };
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["id"], "x1");
        assert_eq!(value["sections"][0]["name"], "TITLE");
        assert!(value["sections"][0]["label"].is_null());
    }
}
