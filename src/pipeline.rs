//! Run orchestration.
//!
//! A producer thread reads the row stream, cuts it into batches and runs each
//! batch through the worker pool. Batches come back in submission order over
//! a bounded channel. The calling thread owns all run state: it applies the
//! dedup and tag filters, stamps entry dates, feeds the sink and tallies
//! citations.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::annotate::{Annotator, AnnotatorFactory, AnnotatorSlots, TokenAnnotator};
use crate::article::{Candidate, Citation};
use crate::entry_dates::EntryDates;
use crate::error::EtlError;
use crate::reader::RowStream;
use crate::row::Row;
use crate::sink::Sink;
use crate::transform::Transform;

pub const DEFAULT_BATCH_SIZE: usize = 100;
const CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub models: Option<PathBuf>,
    pub entry_dates: Option<PathBuf>,
    pub tagged_only: bool,
    /// 0 means one worker per CPU.
    pub threads: usize,
    pub batch_size: usize,
    pub progress: bool,
}

impl RunConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            models: None,
            entry_dates: None,
            tagged_only: false,
            threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: false,
        }
    }

    pub fn with_models(mut self, models: Option<PathBuf>) -> Self {
        self.models = models;
        self
    }

    pub fn with_entry_dates(mut self, entry_dates: Option<PathBuf>) -> Self {
        self.entry_dates = entry_dates;
        self
    }

    pub fn tagged_only(mut self, tagged_only: bool) -> Self {
        self.tagged_only = tagged_only;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn entry_dates_path(&self) -> PathBuf {
        self.entry_dates.clone().unwrap_or_else(|| EntryDates::default_path(&self.input_dir))
    }

    pub fn worker_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Streaming,
    Draining,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub accepted: usize,
    pub duplicate_ids: usize,
    pub duplicate_hashes: usize,
    pub untagged: usize,
    pub failed: usize,
    pub citations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    DuplicateId,
    DuplicateHash,
    Untagged,
}

/// Dedup keys and the citation tally of a single run.
#[derive(Debug, Default)]
pub struct RunState {
    ids: HashSet<String>,
    hashes: HashSet<String>,
    citations: HashMap<String, u64>,
}

impl RunState {
    pub fn decide(&self, candidate: &Candidate, tagged_only: bool) -> Decision {
        if self.ids.contains(candidate.article.uid()) {
            Decision::DuplicateId
        } else if self.hashes.contains(&candidate.hash) {
            Decision::DuplicateHash
        } else if tagged_only && candidate.article.tags().is_none() {
            Decision::Untagged
        } else {
            Decision::Accepted
        }
    }

    pub fn accept(&mut self, candidate: &Candidate) {
        for title in &candidate.citations {
            *self.citations.entry(title.clone()).or_insert(0) += 1;
        }
        self.ids.insert(candidate.article.uid().to_string());
        self.hashes.insert(candidate.hash.clone());
    }

    /// Distinct titles, most mentioned first, ties by title.
    pub fn citations(&self) -> Vec<Citation> {
        let mut citations: Vec<Citation> =
            self.citations.iter().map(|(title, mentions)| Citation { title: title.clone(), mentions: *mentions }).collect();
        citations.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.title.cmp(&b.title)));
        citations
    }
}

enum Message {
    Batch(Vec<Result<Candidate, EtlError>>),
    Failed(EtlError),
}

pub struct Pipeline {
    config: RunConfig,
    annotators: Arc<dyn AnnotatorFactory>,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        let annotators: Arc<dyn AnnotatorFactory> = Arc::new(|| -> Result<Box<dyn Annotator>> { Ok(Box::new(TokenAnnotator)) });
        Self { config, annotators }
    }

    pub fn with_annotator(mut self, factory: Arc<dyn AnnotatorFactory>) -> Self {
        self.annotators = factory;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Processes the whole row stream into `sink`. Any fatal error stops the
    /// run without calling `complete`; the sink is closed either way.
    pub fn run(&self, sink: &mut dyn Sink) -> Result<RunSummary> {
        let mut stage = Stage::Init;
        match self.execute(sink, &mut stage) {
            Ok(summary) => {
                sink.close().context("Failed to close sink")?;
                Ok(summary)
            }
            Err(e) => {
                transition(&mut stage, Stage::Failed);
                error!("Run failed: {:#}", e);
                if let Err(close_error) = sink.close() {
                    error!("Error closing sink after failure: {:#}", close_error);
                }
                Err(e)
            }
        }
    }

    fn execute(&self, sink: &mut dyn Sink, stage: &mut Stage) -> Result<RunSummary> {
        let config = &self.config;
        info!("Processing input directory: {}", config.input_dir.display());

        let rows = RowStream::open(&config.input_dir)?;
        let dates = EntryDates::load(&config.entry_dates_path())?;

        let workers = config.worker_count();
        let batch_size = config.batch_size.max(1);
        info!("Using {} worker threads, batch size {}", workers, batch_size);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("etl-worker-{}", i))
            .build()
            .context("Failed to build worker pool")?;
        let transform = Transform::new(
            config.input_dir.clone(),
            config.models.clone(),
            AnnotatorSlots::new(Arc::clone(&self.annotators), workers),
        );

        let progress = self.progress_bar();
        let mut state = RunState::default();
        let mut summary = RunSummary::default();

        transition(stage, Stage::Streaming);
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        thread::scope(|scope| -> Result<()> {
            let pool = &pool;
            let transform = &transform;
            let producer = scope.spawn(move || produce(rows, pool, transform, batch_size, sender));

            let consumed = self.consume(&receiver, sink, &dates, &mut state, &mut summary, &progress);
            drop(receiver);
            if producer.join().is_err() {
                return Err(anyhow!("Row producer thread panicked"));
            }
            consumed
        })?;

        transition(stage, Stage::Draining);
        debug!("Annotation clients created: {}", transform.annotators().created());
        let citations = state.citations();
        summary.citations = citations.len();
        sink.complete(&citations).context("Failed to complete sink")?;
        transition(stage, Stage::Complete);

        progress.finish_with_message(format!("{} accepted", summary.accepted));
        Ok(summary)
    }

    fn consume(
        &self,
        receiver: &Receiver<Message>,
        sink: &mut dyn Sink,
        dates: &EntryDates,
        state: &mut RunState,
        summary: &mut RunSummary,
        progress: &ProgressBar,
    ) -> Result<()> {
        for message in receiver {
            let outcomes = match message {
                Message::Batch(outcomes) => outcomes,
                Message::Failed(e) => return Err(e.into()),
            };

            for outcome in outcomes {
                summary.rows += 1;
                progress.inc(1);

                let mut candidate = match outcome {
                    Ok(candidate) => candidate,
                    Err(e) if !e.is_row_level() => return Err(e.into()),
                    Err(e) => {
                        warn!("Skipping row: {}", e);
                        summary.failed += 1;
                        continue;
                    }
                };

                match state.decide(&candidate, self.config.tagged_only) {
                    Decision::Accepted => {
                        let entry = dates.lookup(&candidate.hash).ok_or_else(|| EtlError::MissingEntryDate {
                            hash: candidate.hash.clone(),
                            uid: candidate.article.uid().to_string(),
                        })?;
                        candidate.article.metadata.entry = Some(entry.to_string());
                        sink.save(&candidate.article).with_context(|| format!("Failed to save article '{}'", candidate.article.uid()))?;
                        state.accept(&candidate);
                        summary.accepted += 1;
                        progress.set_message(format!("{} accepted", summary.accepted));
                    }
                    Decision::DuplicateId => {
                        debug!("Duplicate id {}", candidate.article.uid());
                        summary.duplicate_ids += 1;
                    }
                    Decision::DuplicateHash => {
                        debug!("Duplicate hash {} (record '{}')", candidate.hash, candidate.article.uid());
                        summary.duplicate_hashes += 1;
                    }
                    Decision::Untagged => summary.untagged += 1,
                }
            }
        }
        Ok(())
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {spinner} {pos} rows ({per_sec}) {msg}")
                .expect("Failed to set progress bar style"),
        );
        progress.enable_steady_tick(Duration::from_millis(200));
        progress
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    debug!("Stage {:?} -> {:?}", stage, next);
    *stage = next;
}

fn produce(rows: RowStream, pool: &ThreadPool, transform: &Transform, batch_size: usize, sender: Sender<Message>) {
    let mut batch: Vec<Result<Row, EtlError>> = Vec::with_capacity(batch_size);
    for record in rows {
        let record = match record {
            Err(e @ EtlError::RowStream { .. }) => {
                let _ = sender.send(Message::Failed(e));
                return;
            }
            other => other,
        };
        batch.push(record);
        if batch.len() >= batch_size && !dispatch(pool, transform, std::mem::take(&mut batch), &sender) {
            return;
        }
    }
    if !batch.is_empty() {
        dispatch(pool, transform, batch, &sender);
    }
}

/// Runs one batch on the pool and hands the results, in row order, to the
/// orchestrator. Returns false once the orchestrator has stopped listening.
fn dispatch(pool: &ThreadPool, transform: &Transform, batch: Vec<Result<Row, EtlError>>, sender: &Sender<Message>) -> bool {
    let outcomes: Vec<Result<Candidate, EtlError>> =
        pool.install(|| batch.into_par_iter().map(|record| record.and_then(|row| transform.process(row))).collect());
    sender.send(Message::Batch(outcomes)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{Article, ArticleMetadata};

    fn candidate(uid: &str, hash: &str, tags: Option<&str>, citations: &[&str]) -> Candidate {
        Candidate {
            hash: hash.into(),
            article: Article {
                metadata: ArticleMetadata { id: uid.into(), tags: tags.map(String::from), ..ArticleMetadata::default() },
                sections: Vec::new(),
            },
            citations: citations.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn decisions_check_id_before_hash() {
        let mut state = RunState::default();
        let first = candidate("u1", "h1", Some("COVID-19"), &[]);
        assert_eq!(state.decide(&first, false), Decision::Accepted);
        state.accept(&first);

        assert_eq!(state.decide(&candidate("u1", "h1", None, &[]), false), Decision::DuplicateId);
        assert_eq!(state.decide(&candidate("u2", "h1", None, &[]), false), Decision::DuplicateHash);
        assert_eq!(state.decide(&candidate("u2", "h2", None, &[]), false), Decision::Accepted);
        assert_eq!(state.decide(&candidate("u2", "h2", None, &[]), true), Decision::Untagged);
    }

    #[test]
    fn rejected_candidates_leave_no_trace() {
        let mut state = RunState::default();
        let first = candidate("u1", "h1", None, &["Shared"]);
        state.accept(&first);
        let rejected = candidate("u2", "h1", None, &["Ignored"]);
        assert_eq!(state.decide(&rejected, false), Decision::DuplicateHash);

        assert!(!state.ids.contains("u2"));
        assert_eq!(state.citations(), vec![Citation { title: "Shared".into(), mentions: 1 }]);
    }

    #[test]
    fn citations_sorted_by_mentions_then_title() {
        let mut state = RunState::default();
        state.accept(&candidate("u1", "h1", None, &["Beta", "Alpha", "Gamma"]));
        state.accept(&candidate("u2", "h2", None, &["Gamma", "Beta"]));
        state.accept(&candidate("u3", "h3", None, &["Gamma"]));

        let citations = state.citations();
        let order: Vec<(&str, u64)> = citations.iter().map(|c| (c.title.as_str(), c.mentions)).collect();
        assert_eq!(order, vec![("Gamma", 3), ("Beta", 2), ("Alpha", 1)]);
    }

    #[test]
    fn config_defaults() {
        let config = RunConfig::new("/data/cord19");
        assert!(!config.tagged_only);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.entry_dates_path(), PathBuf::from("/data/cord19/entry-dates.csv"));
        assert_eq!(config.worker_count(), num_cpus::get());
        assert_eq!(config.with_threads(3).worker_count(), 3);
    }
}
