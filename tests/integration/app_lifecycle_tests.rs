/*!
 * Full app lifecycle tests: controller, text directory and checkpoint database
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use chapterwise::app_config::Config;
use chapterwise::app_controller::{Controller, RunOutcome};
use chapterwise::checkpoint::CheckpointStore;
use chapterwise::database::Repository;
use chapterwise::documents::TextDirectory;
use chapterwise::providers::mock::MockTranslator;
use chapterwise::providers::BatchTranslator;
use crate::common::{create_temp_dir, create_test_file, test_config};

fn controller(store: &Arc<Repository>, mock: &MockTranslator) -> Controller {
    let store: Arc<dyn CheckpointStore> = store.clone();
    let providers: Vec<Arc<dyn BatchTranslator>> = vec![Arc::new(mock.clone())];
    Controller::with_parts(test_config(), store, providers)
}

fn create_book(root: &Path) -> Result<()> {
    create_test_file(root, "01-intro.txt", "Hello.\n\nWelcome.")?;
    create_test_file(root, "chapters/02.md", "# Title\n\nBody text.")?;
    create_test_file(root, "images/cover.jpg", "not really a jpeg")?;
    Ok(())
}

#[tokio::test]
async fn test_runDirectory_shouldWriteTranslatedCopy() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("novel");
    create_book(&input)?;

    let store = Arc::new(Repository::new_in_memory()?);
    let mock = MockTranslator::working();
    let outcome = controller(&store, &mock)
        .run_directory(&input, temp_dir.path(), &CancellationToken::new())
        .await?;

    let RunOutcome::Completed { output_dir, report } = outcome else {
        panic!("run should complete");
    };
    assert!(report.is_complete());
    assert_eq!(output_dir, temp_dir.path().join("novel.French"));
    assert_eq!(
        fs::read_to_string(output_dir.join("01-intro.txt"))?,
        "[French] Hello.\n\n[French] Welcome."
    );
    assert_eq!(
        fs::read_to_string(output_dir.join("chapters/02.md"))?,
        "[French] # Title\n\n[French] Body text."
    );
    assert_eq!(fs::read_to_string(output_dir.join("images/cover.jpg"))?, "not really a jpeg");
    assert_eq!(mock.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_runDirectory_twice_shouldResumeFromCheckpoint() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("novel");
    create_book(&input)?;
    let store = Arc::new(Repository::new_in_memory()?);

    controller(&store, &MockTranslator::working())
        .run_directory(&input, temp_dir.path(), &CancellationToken::new())
        .await?;

    let second = MockTranslator::working();
    let outcome = controller(&store, &second)
        .run_directory(&input, temp_dir.path(), &CancellationToken::new())
        .await?;

    match outcome {
        RunOutcome::Completed { report, .. } => assert_eq!(report.resumed, 2),
        RunOutcome::Cancelled => panic!("run should complete"),
    }
    assert_eq!(second.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_checkpointStatus_andClear_shouldFollowRuns() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("novel");
    create_book(&input)?;
    let store = Arc::new(Repository::new_in_memory()?);
    let app = controller(&store, &MockTranslator::working());
    let source = TextDirectory::open(&input)?;

    assert_eq!(app.checkpoint_status(&source).await?, "no checkpoint found");

    app.run_directory(&input, temp_dir.path(), &CancellationToken::new()).await?;
    let status = app.checkpoint_status(&source).await?;
    assert!(status.starts_with("checkpoint found: 2/2 completed"), "{}", status);

    assert!(app.clear_checkpoint(&source).await?);
    assert_eq!(app.checkpoint_status(&source).await?, "no checkpoint found");
    assert!(!app.clear_checkpoint(&source).await?);
    Ok(())
}

#[tokio::test]
async fn test_runDirectory_whenCancelled_shouldNotWriteOutput() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("novel");
    create_book(&input)?;
    let store = Arc::new(Repository::new_in_memory()?);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = controller(&store, &MockTranslator::working())
        .run_directory(&input, temp_dir.path(), &cancel)
        .await?;

    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert!(!temp_dir.path().join("novel.French").exists());
    Ok(())
}

#[tokio::test]
async fn test_prepareTask_shouldRenderPromptWithLanguageLabel() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("novel");
    create_book(&input)?;

    let mut config = test_config();
    config.target_language = "pt-br".to_string();
    config.system_prompt = "Translate into {targetLanguage}.".to_string();
    let app = Controller::with_parts(config, Arc::new(Repository::new_in_memory()?), Vec::new());

    let task = app.prepare_task(&TextDirectory::open(&input)?).await?;
    assert_eq!(task.target_label, "Portuguese (BR)");
    assert_eq!(task.system_prompt, "Translate into Portuguese (BR).");
    assert_eq!(task.identity.target_language, "pt-br");
    assert_eq!(task.identity.prompt_template, "Translate into {targetLanguage}.");
    assert_eq!(task.document_ids, vec!["01-intro.txt", "chapters/02.md"]);
    Ok(())
}

#[tokio::test]
async fn test_runDirectory_withEmptyDirectory_shouldFail() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let input = temp_dir.path().join("empty");
    create_test_file(&input, "notes.bin", "binary")?;
    let store = Arc::new(Repository::new_in_memory()?);

    let result = controller(&store, &MockTranslator::working())
        .run_directory(&input, temp_dir.path(), &CancellationToken::new())
        .await;
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_withConfig_shouldOpenConfiguredDatabase() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let mut config = test_config();
    config.checkpoint.database_path = Some(temp_dir.path().join("db").join("checkpoints.db"));

    let app = Controller::with_config(config)?;
    assert_eq!(app.config().target_language, "French");
    assert!(temp_dir.path().join("db").join("checkpoints.db").exists());
    Ok(())
}

#[test]
fn test_withConfig_withoutApiKey_shouldFail() {
    let mut config = Config::default();
    config.checkpoint.database_path = Some(std::env::temp_dir().join("chapterwise-unused.db"));
    assert!(Controller::with_config(config).is_err());
}
