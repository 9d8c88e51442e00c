//! Per-row work executed inside the pool. Nothing here touches run state.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use crate::annotate::{self, AnnotatorSlots, StudyDesign};
use crate::article::{Article, ArticleMetadata, Candidate};
use crate::error::EtlError;
use crate::row::Row;
use crate::section;
use crate::tags;

pub struct Transform {
    input_dir: PathBuf,
    models: Option<PathBuf>,
    annotators: AnnotatorSlots,
}

impl Transform {
    pub fn new(input_dir: PathBuf, models: Option<PathBuf>, annotators: AnnotatorSlots) -> Self {
        Self { input_dir, models, annotators }
    }

    pub fn annotators(&self) -> &AnnotatorSlots {
        &self.annotators
    }

    /// Turns a row into a candidate. A panic while processing is caught and
    /// reported as a row failure.
    pub fn process(&self, row: Row) -> Result<Candidate, EtlError> {
        let uid = row.cord_uid.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.build(row))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                Err(EtlError::RowFailed { uid, message })
            }
        }
    }

    fn build(&self, row: Row) -> Result<Candidate, EtlError> {
        let hash = row.identity_hash();
        let published = row.published();
        let (sections, citations) = section::extract(&row, &self.input_dir);
        let tags = tags::classify(&sections, published);

        let (sections, study, citations) = if tags.is_some() {
            let failed = |e: anyhow::Error| EtlError::RowFailed { uid: row.cord_uid.clone(), message: format!("annotation failed: {:#}", e) };
            let annotator = self.annotators.get().map_err(failed)?;
            let (sections, study) = annotate::annotate(annotator, sections, self.models.as_deref()).map_err(failed)?;
            (sections, study, citations)
        } else {
            (sections, StudyDesign::default(), Vec::new())
        };

        let reference = row.reference_url();
        let metadata = ArticleMetadata {
            id: row.cord_uid,
            source: row.source,
            published,
            publication: row.journal,
            authors: row.authors,
            title: row.title,
            tags,
            design: study.design,
            size: study.size,
            sample: study.sample,
            method: study.method,
            reference,
            entry: None,
        };

        Ok(Candidate { hash, article: Article { metadata, sections }, citations })
    }
}
