/*!
 * Document orchestration.
 *
 * Runs a bounded pool of workers over the documents of a task that are not
 * yet translated according to the checkpoint. Each finished or failed
 * document is saved to the checkpoint store right away, so an interrupted
 * run resumes where it stopped. A document whose batches cannot be
 * translated is marked as failed without stopping the others.
 */

use futures::future::join_all;
use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::checkpoint::{build_record, sanitize, CheckpointStore};
use crate::documents::DocumentSource;
use crate::errors::TranslationError;
use crate::identity::TaskIdentity;
use crate::providers::BatchTranslator;

use super::fragment::SplitText;
use super::scheduler::{BatchScheduler, DocumentJob};

/// Runtime state of one document
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    /// Not started, or reset after cancellation
    Waiting,
    /// In progress with the completed fraction of its batches
    Running(f32),
    /// Translated and checkpointed
    Done,
    /// Failed after every retry and fallback
    Error(String),
}

impl DocumentState {
    /// Whether the document is finished for this identity
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Everything that describes one run
#[derive(Debug, Clone)]
pub struct TranslationTask {
    /// Fingerprint and the settings it was computed from
    pub identity: TaskIdentity,
    /// Rendered system prompt
    pub system_prompt: String,
    /// Target language label shown to the model
    pub target_label: String,
    /// Document ids in source order
    pub document_ids: Vec<String>,
}

/// State change of one document
#[derive(Debug)]
pub struct DocumentEvent<'a> {
    /// Document id
    pub document_id: &'a str,
    /// New state
    pub state: &'a DocumentState,
    /// Mean progress over all documents of the task
    pub overall: f32,
}

/// A document that could not be translated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Document id
    pub document_id: String,
    /// Error message
    pub message: String,
}

/// Outcome of a run that was not cancelled
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Checkpoint id of the task
    pub checkpoint_id: String,
    /// Translated content of every completed document
    pub translated: BTreeMap<String, String>,
    /// Final state per document, in source order
    pub states: Vec<(String, DocumentState)>,
    /// Documents that failed in this run
    pub failures: Vec<DocumentFailure>,
    /// Documents taken from the checkpoint instead of translated
    pub resumed: usize,
    /// Set when loading or saving the checkpoint failed
    pub persistence_warning: Option<String>,
}

impl RunReport {
    /// Number of completed documents
    pub fn done_count(&self) -> usize {
        self.states.iter().filter(|(_, s)| s.is_done()).count()
    }

    /// Whether every document is translated
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.done_count() == self.states.len()
    }
}

#[derive(Debug)]
struct Board {
    states: Vec<DocumentState>,
    progress: Vec<f32>,
}

impl Board {
    fn overall(&self) -> f32 {
        if self.progress.is_empty() {
            return 1.0;
        }
        self.progress.iter().sum::<f32>() / self.progress.len() as f32
    }
}

/// Shared state of one run, passed by reference to every worker
struct RunState {
    /// Completed documents, checkpointed after every change
    translated: Mutex<BTreeMap<String, String>>,
    /// Per-document states and progress
    board: Mutex<Board>,
    /// Failures of this run
    failures: Mutex<Vec<DocumentFailure>>,
    /// Indices of documents still to translate
    pending: Vec<usize>,
    /// Next unclaimed position in `pending`
    cursor: AtomicUsize,
    /// Last persistence problem
    persistence_warning: Mutex<Option<String>>,
    /// Serializes checkpoint saves so snapshots land in order
    save_lock: tokio::sync::Mutex<()>,
}

struct Run<'a> {
    task: &'a TranslationTask,
    source: &'a dyn DocumentSource,
    providers: &'a [Arc<dyn BatchTranslator>],
    on_event: &'a (dyn Fn(&DocumentEvent<'_>) + Send + Sync),
    cancel: &'a CancellationToken,
    state: RunState,
}

impl Run<'_> {
    fn update(&self, index: usize, state: DocumentState) {
        let overall = {
            let mut board = self.state.board.lock();
            match &state {
                DocumentState::Waiting => board.progress[index] = 0.0,
                DocumentState::Running(p) => board.progress[index] = p.clamp(0.0, 1.0),
                DocumentState::Done => board.progress[index] = 1.0,
                DocumentState::Error(_) => {}
            }
            board.states[index] = state.clone();
            board.overall()
        };

        (self.on_event)(&DocumentEvent {
            document_id: &self.task.document_ids[index],
            state: &state,
            overall,
        });
    }
}

/// Drives the translation of all documents of a task
pub struct DocumentOrchestrator {
    /// Per-document batch scheduler
    scheduler: BatchScheduler,
    /// Maximum documents in flight
    concurrency: usize,
    /// Checkpoint persistence
    store: Arc<dyn CheckpointStore>,
}

impl DocumentOrchestrator {
    /// Create a new orchestrator
    pub fn new(scheduler: BatchScheduler, concurrency: usize, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            scheduler,
            concurrency: concurrency.max(1),
            store,
        }
    }

    /// Create an orchestrator from the application config
    pub fn from_config(config: &Config, store: Arc<dyn CheckpointStore>) -> Self {
        Self::new(
            BatchScheduler::from_config(config),
            config.batching.document_concurrency,
            store,
        )
    }

    /// Translate every document of `task` not already in its checkpoint
    ///
    /// Returns `TranslationError::Cancelled` when `cancel` fires while
    /// documents are still pending; documents finished before that stay in
    /// the checkpoint. A signal arriving after the last document finished
    /// leaves the report intact.
    pub async fn run(
        &self,
        task: &TranslationTask,
        source: &dyn DocumentSource,
        providers: &[Arc<dyn BatchTranslator>],
        on_event: &(dyn Fn(&DocumentEvent<'_>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<RunReport, TranslationError> {
        if task.document_ids.is_empty() {
            return Err(TranslationError::Configuration("no documents found in source".to_string()));
        }
        if providers.is_empty() {
            return Err(TranslationError::Configuration("no translation provider configured".to_string()));
        }

        let checkpoint_id = &task.identity.checkpoint_id;
        let mut persistence_warning = None;
        let record = match self.store.get(checkpoint_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to load checkpoint {}: {:#}", checkpoint_id, e);
                persistence_warning = Some(format!("checkpoint not loaded: {:#}", e));
                None
            }
        };

        let prior = sanitize(record.as_ref(), &task.document_ids);
        let resumed = prior.len();
        let states: Vec<DocumentState> = task.document_ids.iter()
            .map(|id| if prior.contains_key(id) { DocumentState::Done } else { DocumentState::Waiting })
            .collect();
        let progress = states.iter().map(|s| if s.is_done() { 1.0 } else { 0.0 }).collect();
        let pending: Vec<usize> = states.iter().enumerate()
            .filter(|(_, s)| !s.is_done())
            .map(|(i, _)| i)
            .collect();

        if resumed > 0 {
            info!("Resuming {}: {}/{} documents already translated", checkpoint_id, resumed, task.document_ids.len());
        }

        let run = Run {
            task,
            source,
            providers,
            on_event,
            cancel,
            state: RunState {
                translated: Mutex::new(prior),
                board: Mutex::new(Board { states, progress }),
                failures: Mutex::new(Vec::new()),
                pending,
                cursor: AtomicUsize::new(0),
                persistence_warning: Mutex::new(persistence_warning),
                save_lock: tokio::sync::Mutex::new(()),
            },
        };

        let width = self.concurrency.min(run.state.pending.len());
        info!("Translating {} documents with {} workers", run.state.pending.len(), width);

        let outcomes = join_all((0..width).map(|_| self.run_worker(&run))).await;
        if outcomes.iter().any(|o| o.as_ref().is_err_and(|e| e.is_cancelled())) {
            info!("Run {} cancelled", checkpoint_id);
            return Err(TranslationError::Cancelled);
        }
        if let Some(Err(e)) = outcomes.into_iter().find(|o| o.is_err()) {
            return Err(e);
        }

        let RunState { translated, board, failures, persistence_warning, .. } = run.state;
        let board = board.into_inner();
        let failures = failures.into_inner();
        info!(
            "Run {} finished: {} done, {} failed",
            checkpoint_id,
            board.states.iter().filter(|s| s.is_done()).count(),
            failures.len()
        );

        Ok(RunReport {
            checkpoint_id: checkpoint_id.clone(),
            translated: translated.into_inner(),
            states: task.document_ids.iter().cloned().zip(board.states).collect(),
            failures,
            resumed,
            persistence_warning: persistence_warning.into_inner(),
        })
    }

    /// One worker: claim the next pending document until none are left
    async fn run_worker(&self, run: &Run<'_>) -> Result<(), TranslationError> {
        loop {
            let slot = run.state.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(&index) = run.state.pending.get(slot) else {
                return Ok(());
            };
            // A claimed document left untouched is abandoned work
            if run.cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }
            let document_id = &run.task.document_ids[index];

            run.update(index, DocumentState::Running(0.0));

            match self.translate_document(run, index).await {
                Ok(content) => {
                    run.state.translated.lock().insert(document_id.clone(), content);
                    run.update(index, DocumentState::Done);
                    info!("[{}] done", document_id);
                    self.save_checkpoint(run, "").await;
                }
                Err(e) if e.is_cancelled() => {
                    run.update(index, DocumentState::Waiting);
                    return Err(TranslationError::Cancelled);
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("[{}] translation failed, continuing with the next document: {}", document_id, message);
                    run.update(index, DocumentState::Error(message.clone()));
                    run.state.failures.lock().push(DocumentFailure {
                        document_id: document_id.clone(),
                        message: message.clone(),
                    });
                    self.save_checkpoint(run, &format!("file={}; error={}", document_id, message)).await;
                }
            }
        }
    }

    /// Translate one document and return its rebuilt content
    async fn translate_document(&self, run: &Run<'_>, index: usize) -> Result<String, TranslationError> {
        let document_id = &run.task.document_ids[index];
        let log_prefix = format!("[{}] ", document_id);

        let content = run.source.load(document_id)
            .map_err(|e| TranslationError::Document(format!("Failed to load {}: {:#}", document_id, e)))?;
        let fragments = run.source.extract_fragments(&content);
        let splits: Vec<SplitText<'_>> = fragments.iter().map(|f| SplitText::new(f)).collect();
        let texts: Vec<String> = splits.iter()
            .filter(|s| !s.is_blank())
            .map(|s| s.core.to_string())
            .collect();

        if texts.is_empty() {
            info!("{}nothing to translate", log_prefix);
            return Ok(content);
        }

        let job = DocumentJob {
            system_prompt: &run.task.system_prompt,
            target_language: &run.task.target_label,
            texts: &texts,
            log_prefix: &log_prefix,
        };
        let on_progress = |p: f32| run.update(index, DocumentState::Running(p));
        let translated = self.scheduler
            .translate_texts(run.providers, &job, &on_progress, run.cancel)
            .await?;

        let mut outputs = translated.into_iter();
        let rebuilt: Vec<String> = splits.iter()
            .map(|s| {
                if s.is_blank() {
                    s.reattach("")
                } else {
                    s.reattach(&outputs.next().unwrap_or_default())
                }
            })
            .collect();

        Ok(run.source.reinsert_fragments(&content, &rebuilt))
    }

    /// Persist the current result map, logging instead of failing
    async fn save_checkpoint(&self, run: &Run<'_>, last_error: &str) {
        let _guard = run.state.save_lock.lock().await;
        let snapshot = run.state.translated.lock().clone();
        let record = build_record(&run.task.identity, &run.task.document_ids, snapshot, last_error);

        if let Err(e) = self.store.put(&record).await {
            warn!("Failed to save checkpoint {}: {:#}", record.id, e);
            *run.state.persistence_warning.lock() = Some(format!("checkpoint not saved: {:#}", e));
        }
    }
}
