/*!
 * # Chapterwise - resumable batch translation of multi-document sources
 *
 * Translates every document of a source (a directory of text, Markdown or
 * HTML files) with LLM providers, a few paragraphs per request.
 *
 * ## Features
 *
 * - Batches bounded by item count and character budget
 * - Tolerant parsing of model replies into JSON string arrays
 * - Two wire shapes: Gemini `generateContent` and OpenAI-compatible chat
 *   completions (Zhipu, Minimax, Kimi, OpenAI)
 * - Retries with exponential backoff and an ordered provider fallback chain
 * - Bounded concurrency for batches within a document and across documents
 * - SQLite checkpoints keyed by source and settings, saved after every document
 * - Cooperative cancellation
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `documents`: Document sources and output writing
 * - `identity`: Task fingerprints and the source hash cache
 * - `checkpoint`: Checkpoint store trait and resume helpers
 * - `database`: SQLite persistence of checkpoint records
 * - `providers`: Provider clients and the batch translator seam
 * - `translation`: Batching, parsing, scheduling and orchestration
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod checkpoint;
pub mod database;
pub mod documents;
pub mod errors;
pub mod file_utils;
pub mod identity;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome};
pub use checkpoint::CheckpointStore;
pub use documents::{DocumentSource, TextDirectory};
pub use errors::{AppError, ProviderError, TranslationError};
pub use identity::{IdentityResolver, TaskIdentity};
pub use providers::BatchTranslator;
pub use translation::{DocumentOrchestrator, RunReport, TranslationTask};
