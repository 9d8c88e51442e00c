//! Section extraction: title, abstract and companion full-text files into an
//! ordered list of sentence-level sections plus the cited titles.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::row::Row;
use crate::table;
use crate::text;

/// Known filler fragments. A section containing any of them is dropped.
pub const BOILERPLATE: &[&str] = &[
    "COVID-19 resource centre",
    "permission to make all its COVID",
    "WHO COVID database",
    "COVID-19 public health emergency response",
];

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Section {
    pub name: Option<String>,
    pub text: String,
    pub label: Option<String>,
}

impl Section {
    pub fn new(name: Option<String>, text: String) -> Self {
        Self { name, text, label: None }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct FullText {
    pub body_text: Vec<BodyText>,
    pub ref_entries: Map<String, Value>,
    pub bib_entries: Map<String, Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct BodyText {
    pub section: String,
    pub text: String,
}

impl FullText {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open full-text file: {}", path.display()))?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        serde_json::from_reader(BufReader::new(reader))
            .with_context(|| format!("Failed to parse full-text JSON from {}", path.display()))
    }

    fn sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();

        for body in &self.body_text {
            let heading = body.section.trim();
            let name = (!heading.is_empty()).then(|| body.section.to_uppercase());
            let cleaned = text::normalize(&body.text.replace('\n', " "));
            sections.extend(text::sentences(&cleaned).into_iter().map(|sentence| Section::new(name.clone(), sentence)));
        }

        for (name, entry) in &self.ref_entries {
            if let Some(html) = entry.get("html").and_then(Value::as_str).filter(|html| !html.is_empty()) {
                sections.extend(table::rows(html).into_iter().map(|row| Section::new(Some(name.clone()), row)));
            }
        }

        sections
    }

    fn citation_titles(&self) -> impl Iterator<Item = String> + '_ {
        self.bib_entries
            .values()
            .filter_map(|entry| entry.get("title").and_then(Value::as_str))
            .filter(|title| !title.trim().is_empty())
            .map(str::to_string)
    }
}

/// Builds the ordered sections and distinct citation titles for a row.
/// Unreadable companion files are logged and skipped.
pub fn extract(row: &Row, directory: &Path) -> (Vec<Section>, Vec<String>) {
    let mut sections = Vec::new();
    let mut citations = Vec::new();

    for (name, value) in [("TITLE", &row.title), ("ABSTRACT", &row.abstract_text)] {
        let value = value.as_str();
        if value.is_empty() {
            continue;
        }
        let stripped = value.strip_prefix('[').unwrap_or(value);
        let stripped = stripped.strip_suffix(']').unwrap_or(stripped);
        let cleaned = text::normalize(stripped);
        sections.extend(text::sentences(&cleaned).into_iter().map(|sentence| Section::new(Some(name.to_string()), sentence)));
    }

    for path in row.full_text_paths() {
        let article = directory.join(path);
        match FullText::load(&article) {
            Ok(full_text) => {
                sections.extend(full_text.sections());
                citations.extend(full_text.citation_titles());
            }
            Err(e) => warn!("Error processing text file {} for record '{}': {:#}", article.display(), row.cord_uid, e),
        }
    }

    filtered(sections, citations)
}

/// Drops repeated and boilerplate sections (first occurrence wins) and
/// deduplicates citation titles.
pub fn filtered(sections: Vec<Section>, citations: Vec<String>) -> (Vec<Section>, Vec<String>) {
    let mut seen = HashSet::new();
    let unique = sections
        .into_iter()
        .filter(|section| !BOILERPLATE.iter().any(|fragment| section.text.contains(*fragment)))
        .filter(|section| seen.insert(section.text.clone()))
        .collect();

    let citations: BTreeSet<String> = citations.into_iter().collect();
    (unique, citations.into_iter().collect())
}
