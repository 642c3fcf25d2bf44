/*!
 * Batch translation pipeline.
 *
 * - `batch`: Splitting a document's texts into bounded batches
 * - `response`: Tolerant parsing of model replies into string arrays
 * - `caller`: One request per batch against a configured provider
 * - `fragment`: Whitespace handling around translated fragments
 * - `scheduler`: Concurrent batch dispatch with retry and fallback
 * - `orchestrator`: Concurrent, checkpointed translation of whole documents
 */

pub use self::batch::{batch_ranges, build_batches, BatchLimits};
pub use self::caller::{build_user_prompt, decode_reply, ProviderClient};
pub use self::fragment::SplitText;
pub use self::orchestrator::{
    DocumentEvent, DocumentFailure, DocumentOrchestrator, DocumentState, RunReport, TranslationTask,
};
pub use self::response::parse_json_array;
pub use self::scheduler::{BatchScheduler, DocumentJob, RetryPolicy};

pub mod batch;
pub mod caller;
pub mod fragment;
pub mod orchestrator;
pub mod response;
pub mod scheduler;
