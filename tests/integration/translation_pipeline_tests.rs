/*!
 * End-to-end tests of the document orchestrator with mock translators
 */

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use chapterwise::checkpoint::{build_record, CheckpointStore};
use chapterwise::errors::TranslationError;
use chapterwise::providers::mock::MockTranslator;
use chapterwise::providers::BatchTranslator;
use chapterwise::translation::{DocumentEvent, DocumentState};
use crate::common::{orchestrator, task_for, task_with_model, FlakyStore, MemorySource};

fn five_documents() -> MemorySource {
    MemorySource::new("book", &[
        ("d1", "Text 1."),
        ("d2", "Text 2."),
        ("d3", "Text 3.\n\nMore 3."),
        ("d4", "Text 4 POISON."),
        ("d5", "Text 5."),
    ])
}

fn chain(mock: &MockTranslator) -> Vec<Arc<dyn BatchTranslator>> {
    vec![Arc::new(mock.clone())]
}

fn translated(text: &str) -> String {
    MockTranslator::translate_text("French", text)
}

fn sent_texts(mock: &MockTranslator) -> Vec<String> {
    mock.batches().into_iter().flatten().collect()
}

#[tokio::test]
async fn test_run_withCheckpointAndPoisonedDocument_shouldFinishTheRest() {
    let source = five_documents();
    let task = task_for(&source).await;
    let store = Arc::new(FlakyStore::new());

    let prior = BTreeMap::from([
        ("d1".to_string(), "Texte 1.".to_string()),
        ("d2".to_string(), "Texte 2.".to_string()),
    ]);
    store.put(&build_record(&task.identity, &task.document_ids, prior, "")).await.unwrap();

    let mock = MockTranslator::poisoned("POISON");
    let report = orchestrator(2, 1, store.clone())
        .run(&task, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.resumed, 2);
    assert_eq!(report.done_count(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].document_id, "d4");
    assert!(matches!(report.states[3].1, DocumentState::Error(_)));
    assert_eq!(report.translated.len(), 4);
    assert_eq!(report.translated["d1"], "Texte 1.");
    assert_eq!(report.translated["d3"], format!("{}\n\n{}", translated("Text 3."), translated("More 3.")));
    assert!(!report.is_complete());

    let sent = sent_texts(&mock);
    assert!(!sent.iter().any(|t| t == "Text 1." || t == "Text 2."));

    let saved = store.get(&task.identity.checkpoint_id).await.unwrap().unwrap();
    assert_eq!(saved.completed_count(), 4);
    assert_eq!(saved.total_count(), 5);
    assert_eq!(store.put_count(), 1 + 3);
    assert!(store.saved().iter().any(|r| r.last_error.starts_with("file=d4; error=")));
}

#[tokio::test]
async fn test_run_withDocumentConcurrency_shouldBoundInFlightCalls() {
    let docs: Vec<(String, String)> = (0..6).map(|i| (format!("d{}", i), format!("Doc {}.", i))).collect();
    let refs: Vec<(&str, &str)> = docs.iter().map(|(id, c)| (id.as_str(), c.as_str())).collect();
    let source = MemorySource::new("book", &refs);
    let task = task_for(&source).await;

    let mock = MockTranslator::working().with_delay(Duration::from_millis(20));
    let report = orchestrator(2, 1, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(mock.call_count(), 6);
    assert!(mock.max_in_flight() <= 2, "saw {} concurrent calls", mock.max_in_flight());
}

#[tokio::test]
async fn test_run_withNestedConcurrency_shouldBoundByProduct() {
    let content = "a\n\nb\n\nc\n\nd\n\ne\n\nf\n\ng\n\nh";
    let source = MemorySource::new("book", &[("d1", content), ("d2", content), ("d3", content)]);
    let task = task_for(&source).await;

    let mock = MockTranslator::working().with_delay(Duration::from_millis(15));
    let report = orchestrator(2, 3, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert!(mock.max_in_flight() <= 6, "saw {} concurrent calls", mock.max_in_flight());
}

#[tokio::test]
async fn test_run_secondTime_shouldOnlyTranslateFailedDocuments() {
    let source = five_documents();
    let task = task_for(&source).await;
    let store = Arc::new(FlakyStore::new());

    let poisoned = MockTranslator::poisoned("POISON");
    let first = orchestrator(2, 1, store.clone())
        .run(&task, &source, &chain(&poisoned), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.failures.len(), 1);

    let working = MockTranslator::working();
    let second = orchestrator(2, 1, store.clone())
        .run(&task, &source, &chain(&working), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert!(second.is_complete());
    assert_eq!(second.resumed, 4);
    assert_eq!(sent_texts(&working), vec!["Text 4 POISON."]);
    assert_eq!(second.translated["d4"], translated("Text 4 POISON."));
}

#[tokio::test]
async fn test_run_withChangedModel_shouldStartFresh() {
    let source = MemorySource::new("book", &[("d1", "One."), ("d2", "Two.")]);
    let store = Arc::new(FlakyStore::new());

    let task = task_with_model(&source, "model-a").await;
    let mock = MockTranslator::working();
    orchestrator(1, 1, store.clone())
        .run(&task, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    let other = task_with_model(&source, "model-b").await;
    assert_ne!(other.identity.checkpoint_id, task.identity.checkpoint_id);
    let report = orchestrator(1, 1, store.clone())
        .run(&other, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.resumed, 0);
    assert_eq!(mock.call_count(), 4);
}

#[tokio::test]
async fn test_run_whenCancelled_shouldKeepFinishedDocumentsAndResume() {
    let source = MemorySource::new("book", &[("d1", "One."), ("d2", "Two."), ("d3", "Three.")]);
    let task = task_for(&source).await;
    let store = Arc::new(FlakyStore::new());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let on_event = move |event: &DocumentEvent<'_>| {
        if event.state.is_done() {
            trigger.cancel();
        }
    };

    let mock = MockTranslator::working().with_delay(Duration::from_millis(10));
    let result = orchestrator(1, 1, store.clone())
        .run(&task, &source, &chain(&mock), &on_event, &cancel)
        .await;
    assert!(matches!(result, Err(TranslationError::Cancelled)));

    let saved = store.get(&task.identity.checkpoint_id).await.unwrap().unwrap();
    assert_eq!(saved.translated_documents.keys().cloned().collect::<Vec<_>>(), vec!["d1".to_string()]);

    let resumed = MockTranslator::working();
    let report = orchestrator(1, 1, store.clone())
        .run(&task, &source, &chain(&resumed), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.resumed, 1);
    assert_eq!(sent_texts(&resumed), vec!["Two.", "Three."]);
}

#[tokio::test]
async fn test_run_whenCancelledAfterLastDocument_shouldReturnReport() {
    let source = MemorySource::new("book", &[("d1", "One."), ("d2", "Two.")]);
    let task = task_for(&source).await;
    let store = Arc::new(FlakyStore::new());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let on_event = move |event: &DocumentEvent<'_>| {
        if event.state.is_done() && event.overall >= 1.0 {
            trigger.cancel();
        }
    };

    let mock = MockTranslator::working();
    let report = orchestrator(2, 1, store.clone())
        .run(&task, &source, &chain(&mock), &on_event, &cancel)
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert!(report.is_complete());
    assert_eq!(report.translated.len(), 2);
    let saved = store.get(&task.identity.checkpoint_id).await.unwrap().unwrap();
    assert_eq!(saved.translated_documents.len(), 2);
}

#[tokio::test]
async fn test_run_withCancelDuringRequest_shouldResetDocumentToWaiting() {
    let source = MemorySource::new("book", &[("d1", "One.")]);
    let task = task_for(&source).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let events = Mutex::new(Vec::new());
    let mock = MockTranslator::working().with_delay(Duration::from_secs(30));
    let result = orchestrator(1, 1, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&mock), &|e: &DocumentEvent<'_>| events.lock().push(e.state.clone()), &cancel)
        .await;

    assert!(matches!(result, Err(TranslationError::Cancelled)));
    assert_eq!(events.into_inner().last(), Some(&DocumentState::Waiting));
}

#[tokio::test]
async fn test_run_withFailingStore_shouldStillTranslate() {
    let source = MemorySource::new("book", &[("d1", "One."), ("d2", "Two.")]);
    let task = task_for(&source).await;
    let store = Arc::new(FlakyStore::new().failing_get().failing_put());

    let report = orchestrator(2, 1, store.clone())
        .run(&task, &source, &chain(&MockTranslator::working()), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(store.put_count(), 2);
    let warning = report.persistence_warning.expect("persistence warning");
    assert!(warning.contains("simulated disk full"), "{}", warning);
}

#[tokio::test]
async fn test_run_withUnreadableDocument_shouldMarkOnlyThatOne() {
    let source = MemorySource::new("book", &[("d1", "One."), ("d2", "Two.")]).with_unreadable("d1");
    let task = task_for(&source).await;

    let report = orchestrator(2, 1, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&MockTranslator::working()), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.done_count(), 1);
    assert_eq!(report.failures[0].document_id, "d1");
    assert!(report.failures[0].message.contains("simulated read failure"));
}

#[tokio::test]
async fn test_run_shouldKeepWhitespaceAndBlankFragments() {
    let source = MemorySource::new("book", &[("d1", "\n\nHello\n\n  World  \n\n \n\nEnd")]);
    let task = task_for(&source).await;

    let mock = MockTranslator::working();
    let report = orchestrator(1, 1, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&mock), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.translated["d1"],
        format!("\n\n{}\n\n  {}  \n\n \n\n{}", translated("Hello"), translated("World"), translated("End"))
    );
    assert_eq!(sent_texts(&mock), vec!["Hello", "World", "End"]);
}

#[tokio::test]
async fn test_run_shouldEmitEventsUpToFullProgress() {
    let source = MemorySource::new("book", &[("d1", "a\n\nb\n\nc"), ("d2", "d")]);
    let task = task_for(&source).await;
    let events = Mutex::new(Vec::new());

    orchestrator(1, 1, Arc::new(FlakyStore::new()))
        .run(
            &task,
            &source,
            &chain(&MockTranslator::working()),
            &|e: &DocumentEvent<'_>| events.lock().push((e.document_id.to_string(), e.state.clone(), e.overall)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let events = events.into_inner();
    assert_eq!(events.first().map(|e| e.1.clone()), Some(DocumentState::Running(0.0)));
    assert!(events.iter().any(|e| e.0 == "d1" && e.1 == DocumentState::Running(0.5)));
    assert!(events.windows(2).all(|w| w[0].2 <= w[1].2));
    let last = events.last().unwrap();
    assert_eq!((last.0.as_str(), &last.1), ("d2", &DocumentState::Done));
    assert!((last.2 - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_run_withNoDocuments_shouldFail() {
    let source = MemorySource::new("empty", &[]);
    let task = task_for(&source).await;

    let result = orchestrator(1, 1, Arc::new(FlakyStore::new()))
        .run(&task, &source, &chain(&MockTranslator::working()), &|_: &DocumentEvent<'_>| {}, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(TranslationError::Configuration(_))));
}
