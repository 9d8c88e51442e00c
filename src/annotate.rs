//! Boundary to the linguistic annotation service.
//!
//! Only tagged records are annotated. Each pool worker owns its own client,
//! created the first time that worker needs one and kept for the rest of the
//! run.

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::section::Section;

/// A section paired with the tokens the service produced for it.
#[derive(Debug, Clone, Copy)]
pub struct TokenizedSection<'a> {
    pub name: Option<&'a str>,
    pub text: &'a str,
    pub tokens: &'a [String],
}

/// Document-level study fields plus one optional label per section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyDesign {
    pub design: Option<u32>,
    pub size: Option<String>,
    pub sample: Option<String>,
    pub method: Option<String>,
    pub labels: Vec<Option<String>>,
}

/// Call contract of the annotation service. Implementations must be
/// deterministic for a given input and model directory.
pub trait Annotator: Send + Sync {
    fn tokenize(&self, texts: &[&str]) -> Result<Vec<Vec<String>>>;
    fn classify_study(&self, sections: &[TokenizedSection<'_>], models: Option<&Path>) -> Result<StudyDesign>;
    /// Tokens-only label, used where `classify_study` gives none.
    fn label(&self, tokens: &[String]) -> Option<String>;
}

pub trait AnnotatorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Annotator>>;
}

impl<F> AnnotatorFactory for F
where
    F: Fn() -> Result<Box<dyn Annotator>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Annotator>> {
        self()
    }
}

/// One lazily created client per pool worker, plus a shared slot for callers
/// running outside the pool.
pub struct AnnotatorSlots {
    factory: Arc<dyn AnnotatorFactory>,
    slots: Vec<OnceLock<Box<dyn Annotator>>>,
}

impl AnnotatorSlots {
    pub fn new(factory: Arc<dyn AnnotatorFactory>, workers: usize) -> Self {
        let slots = (0..=workers).map(|_| OnceLock::new()).collect();
        Self { factory, slots }
    }

    pub fn get(&self) -> Result<&dyn Annotator> {
        let outside = self.slots.len() - 1;
        let index = rayon::current_thread_index().filter(|index| *index < outside).unwrap_or(outside);
        let slot = &self.slots[index];
        if let Some(annotator) = slot.get() {
            return Ok(annotator.as_ref());
        }

        let created = self.factory.create()?;
        debug!("Created annotation client for worker slot {}", index);
        Ok(slot.get_or_init(|| created).as_ref())
    }

    pub fn created(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }
}

/// Runs the service over `sections`, storing each section's label and
/// returning the study fields. Section order is unchanged.
pub fn annotate(annotator: &dyn Annotator, mut sections: Vec<Section>, models: Option<&Path>) -> Result<(Vec<Section>, StudyDesign)> {
    let texts: Vec<&str> = sections.iter().map(|section| section.text.as_str()).collect();
    let tokens = annotator.tokenize(&texts)?;
    if tokens.len() != sections.len() {
        bail!("annotation service returned tokens for {} of {} sections", tokens.len(), sections.len());
    }

    let study = {
        let tokenized: Vec<TokenizedSection<'_>> = sections
            .iter()
            .zip(&tokens)
            .map(|(section, tokens)| TokenizedSection { name: section.name.as_deref(), text: &section.text, tokens })
            .collect();
        annotator.classify_study(&tokenized, models)?
    };

    for (x, (section, tokens)) in sections.iter_mut().zip(&tokens).enumerate() {
        section.label = study.labels.get(x).cloned().flatten().or_else(|| annotator.label(tokens));
    }

    Ok((sections, study))
}

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\w+(?:['\-]\w+)*|[^\w\s]").expect("valid token pattern");
}

/// Local tokenizer used when no annotation service is wired in. It leaves
/// study fields and labels empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenAnnotator;

impl Annotator for TokenAnnotator {
    fn tokenize(&self, texts: &[&str]) -> Result<Vec<Vec<String>>> {
        Ok(texts
            .iter()
            .map(|text| TOKEN.find_iter(text).map(|token| token.as_str().to_lowercase()).collect())
            .collect())
    }

    fn classify_study(&self, sections: &[TokenizedSection<'_>], _models: Option<&Path>) -> Result<StudyDesign> {
        Ok(StudyDesign { labels: vec![None; sections.len()], ..StudyDesign::default() })
    }

    fn label(&self, _tokens: &[String]) -> Option<String> {
        None
    }
}
