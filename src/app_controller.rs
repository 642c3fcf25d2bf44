use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::app_config::{render_system_prompt, Config};
use crate::checkpoint::{summary, CheckpointStore};
use crate::database::{DatabaseConnection, Repository};
use crate::documents::{output_dir_for, write_output, DocumentSource, TextDirectory};
use crate::errors::{AppError, TranslationError};
use crate::identity::{IdentityResolver, TaskIdentity};
use crate::language_utils::target_language_label;
use crate::providers::BatchTranslator;
use crate::translation::{DocumentEvent, DocumentOrchestrator, DocumentState, ProviderClient, RunReport, TranslationTask};

// @module: Application controller for document translation

/// How a directory run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every document was attempted and the output written
    Completed {
        /// Directory the output was written to
        output_dir: PathBuf,
        /// Per-document results
        report: RunReport,
    },
    /// The run was cancelled, completed documents stay checkpointed
    Cancelled,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Checkpoint persistence
    store: Arc<dyn CheckpointStore>,
    // @field: Primary provider first, then fallbacks
    providers: Vec<Arc<dyn BatchTranslator>>,
    // @field: Task identity resolver with its source hash cache
    resolver: IdentityResolver,
    // @field: Whether to draw a progress bar
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        config.validate()?;

        let providers = Self::build_providers(&config)?;
        let store = Self::open_store(&config)
            .map_err(|e| AppError::Config(format!("Failed to open checkpoint database: {:#}", e)))?;

        Ok(Self::with_parts(config, Arc::new(store), providers))
    }

    // @method: Create a controller from already built parts
    pub fn with_parts(
        config: Config,
        store: Arc<dyn CheckpointStore>,
        providers: Vec<Arc<dyn BatchTranslator>>,
    ) -> Self {
        Self {
            config,
            store,
            providers,
            resolver: IdentityResolver::new(),
            show_progress: false,
        }
    }

    /// Draw an indicatif progress bar during `run_directory`
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the primary client followed by the configured fallbacks
    pub fn build_providers(config: &Config) -> Result<Vec<Arc<dyn BatchTranslator>>, TranslationError> {
        let primary = config.translation.primary_settings()?;
        let fallbacks = config.translation.fallback_settings();

        info!(
            "Provider chain: {}",
            std::iter::once(&primary)
                .chain(fallbacks.iter())
                .map(|s| format!("{} ({})", s.name(), s.model))
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(std::iter::once(primary)
            .chain(fallbacks)
            .map(|settings| Arc::new(ProviderClient::new(settings)) as Arc<dyn BatchTranslator>)
            .collect())
    }

    /// Open the checkpoint database named in the config, or the default one
    pub fn open_store(config: &Config) -> anyhow::Result<Repository> {
        let db = match &config.checkpoint.database_path {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };
        Ok(Repository::new(db))
    }

    /// Resolve the identity of translating `source` with the current settings
    pub async fn resolve_identity(&self, source: &dyn DocumentSource) -> Result<TaskIdentity, TranslationError> {
        self.resolver
            .resolve(
                source,
                &self.config.target_language,
                &self.config.identity_model(),
                &self.config.system_prompt,
            )
            .await
    }

    /// Describe the task for `source`
    pub async fn prepare_task(&self, source: &dyn DocumentSource) -> Result<TranslationTask, TranslationError> {
        let document_ids = source.document_ids();
        if document_ids.is_empty() {
            return Err(TranslationError::Configuration(format!(
                "no documents found in {}",
                source.source_name()
            )));
        }

        let identity = self.resolve_identity(source).await?;
        let target_label = target_language_label(&self.config.target_language);
        let system_prompt = render_system_prompt(&self.config.system_prompt, &target_label);

        Ok(TranslationTask {
            identity,
            system_prompt,
            target_label,
            document_ids,
        })
    }

    /// Translate every pending document of `source`
    pub async fn translate(
        &self,
        source: &dyn DocumentSource,
        on_event: &(dyn Fn(&DocumentEvent<'_>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<RunReport, TranslationError> {
        let task = self.prepare_task(source).await?;
        info!(
            "Translating {} ({} documents) into {} with {}",
            task.identity.source_name,
            task.document_ids.len(),
            task.target_label,
            self.config.identity_model()
        );

        let orchestrator = DocumentOrchestrator::from_config(&self.config, Arc::clone(&self.store));
        orchestrator.run(&task, source, &self.providers, on_event, cancel).await
    }

    /// Translate a directory and write the result below `output_root`
    pub async fn run_directory(
        &self,
        input_dir: &Path,
        output_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AppError> {
        let start_time = Instant::now();
        let source = TextDirectory::open(input_dir)?;

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(1000);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {percent}% {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style.progress_chars("█▓▒░"));
            pb.set_message("Translating");
            pb
        } else {
            ProgressBar::hidden()
        };

        let pb = progress_bar.clone();
        let result = self
            .translate(
                &source,
                &move |event: &DocumentEvent<'_>| {
                    pb.set_position((event.overall * 1000.0).round() as u64);
                    let label = match event.state {
                        DocumentState::Waiting => "waiting".to_string(),
                        DocumentState::Running(p) => format!("{:.0}%", p * 100.0),
                        DocumentState::Done => "done".to_string(),
                        DocumentState::Error(_) => "error".to_string(),
                    };
                    pb.set_message(format!("{}: {}", event.document_id, label));
                },
                cancel,
            )
            .await;

        let report = match result {
            Ok(report) => report,
            Err(e) if e.is_cancelled() => {
                progress_bar.abandon_with_message("cancelled");
                warn!("Translation cancelled, finished documents are kept in the checkpoint");
                return Ok(RunOutcome::Cancelled);
            }
            Err(e) => {
                progress_bar.abandon_with_message("failed");
                return Err(e.into());
            }
        };
        progress_bar.finish_with_message("finished");

        let output_dir = output_dir_for(output_root, source.source_name(), &self.config.target_language);
        write_output(&source, &output_dir, &report.translated)
            .with_context(|| format!("Failed to write output to {:?}", output_dir))?;

        for failure in &report.failures {
            warn!("[{}] kept original content: {}", failure.document_id, failure.message);
        }
        if let Some(hint) = &report.persistence_warning {
            warn!("{}", hint);
        }
        info!(
            "Done in {:.1}s: {}/{} documents translated, {} failed, {} resumed from checkpoint",
            start_time.elapsed().as_secs_f64(),
            report.done_count(),
            report.states.len(),
            report.failures.len(),
            report.resumed
        );

        Ok(RunOutcome::Completed { output_dir, report })
    }

    /// Checkpoint summary for `source` under the current settings
    pub async fn checkpoint_status(&self, source: &dyn DocumentSource) -> Result<String, AppError> {
        let identity = self.resolve_identity(source).await?;
        let record = self.store.get(&identity.checkpoint_id).await?;
        Ok(summary(record.as_ref()))
    }

    /// Delete the checkpoint for `source` under the current settings
    pub async fn clear_checkpoint(&self, source: &dyn DocumentSource) -> Result<bool, AppError> {
        let identity = self.resolve_identity(source).await?;
        let removed = self.store.delete(&identity.checkpoint_id).await?;
        if removed {
            info!("Cleared checkpoint {}", identity.checkpoint_id);
        }
        Ok(removed)
    }
}
