/*!
 * Tests for task identity resolution
 */

use anyhow::Result;

use chapterwise::documents::TextDirectory;
use chapterwise::errors::TranslationError;
use chapterwise::identity::{IdentityResolver, CHECKPOINT_PREFIX};
use crate::common::{create_temp_dir, create_test_file, MemorySource};

const PROMPT: &str = "Translate into {targetLanguage}.";

fn source(content: &str) -> MemorySource {
    MemorySource::new("book", &[("ch1.txt", content), ("ch2.txt", "Second chapter.")])
}

#[tokio::test]
async fn test_resolve_withSameInputs_shouldBeDeterministic() -> Result<()> {
    let a = IdentityResolver::new().resolve(&source("Hello."), "fr", "m", PROMPT).await?;
    let b = IdentityResolver::new().resolve(&source("Hello."), "fr", "m", PROMPT).await?;
    assert_eq!(a, b);
    assert!(a.checkpoint_id.starts_with(CHECKPOINT_PREFIX));
    assert_eq!(a.checkpoint_id, format!("{}{}:{}", CHECKPOINT_PREFIX, a.book_hash, a.profile_hash));
    assert_eq!(a.book_hash.len(), 64);
    Ok(())
}

#[tokio::test]
async fn test_resolve_withPaddedLanguage_shouldMatchTrimmed() -> Result<()> {
    let resolver = IdentityResolver::new();
    let plain = resolver.resolve(&source("Hello."), "French", "m", PROMPT).await?;
    let padded = resolver.resolve(&source("Hello."), " French\t", "m", PROMPT).await?;
    assert_eq!(padded.checkpoint_id, plain.checkpoint_id);
    assert_eq!(padded.target_language, "French");
    Ok(())
}

#[tokio::test]
async fn test_resolve_withChangedSettings_shouldChangeProfileOnly() -> Result<()> {
    let resolver = IdentityResolver::new();
    let base = resolver.resolve(&source("Hello."), "fr", "m", PROMPT).await?;

    for (lang, model, prompt) in [("de", "m", PROMPT), ("fr", "m2", PROMPT), ("fr", "m", "Other {targetLanguage}")] {
        let other = resolver.resolve(&source("Hello."), lang, model, prompt).await?;
        assert_eq!(other.book_hash, base.book_hash);
        assert_ne!(other.profile_hash, base.profile_hash);
        assert_ne!(other.checkpoint_id, base.checkpoint_id);
    }
    Ok(())
}

#[tokio::test]
async fn test_resolve_withChangedContent_shouldChangeBookHash() -> Result<()> {
    let a = IdentityResolver::new().resolve(&source("Hello."), "fr", "m", PROMPT).await?;
    let b = IdentityResolver::new().resolve(&source("Hallo."), "fr", "m", PROMPT).await?;
    assert_ne!(a.book_hash, b.book_hash);
    assert_eq!(a.profile_hash, b.profile_hash);
    Ok(())
}

#[tokio::test]
async fn test_resolve_withEmptyLanguage_shouldFail() {
    let result = IdentityResolver::new().resolve(&source("Hello."), "  ", "m", PROMPT).await;
    assert!(matches!(result, Err(TranslationError::Configuration(_))));
}

#[tokio::test]
async fn test_resolve_withEmptyPrompt_shouldFail() {
    let result = IdentityResolver::new().resolve(&source("Hello."), "fr", "m", "").await;
    assert!(matches!(result, Err(TranslationError::Configuration(_))));
}

#[tokio::test]
async fn test_resolve_twice_shouldHitSourceHashCache() -> Result<()> {
    let resolver = IdentityResolver::new();
    resolver.resolve(&source("Hello."), "fr", "m", PROMPT).await?;
    resolver.resolve(&source("Hello."), "de", "m", PROMPT).await?;

    let (hits, misses, _) = resolver.cache().stats();
    assert_eq!((hits, misses), (1, 1));
    assert_eq!(resolver.cache().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_resolve_withTextDirectory_shouldMatchAfterReopen() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let root = temp_dir.path().join("novel");
    create_test_file(&root, "01.txt", "First.\n\nSecond.")?;
    create_test_file(&root, "part/02.md", "Third.")?;

    let first = IdentityResolver::new().resolve(&TextDirectory::open(&root)?, "fr", "m", PROMPT).await?;
    let second = IdentityResolver::new().resolve(&TextDirectory::open(&root)?, "fr", "m", PROMPT).await?;
    assert_eq!(first.checkpoint_id, second.checkpoint_id);
    assert_eq!(first.source_name, "novel");

    create_test_file(&root, "01.txt", "First, edited.\n\nSecond.")?;
    let edited = IdentityResolver::new().resolve(&TextDirectory::open(&root)?, "fr", "m", PROMPT).await?;
    assert_ne!(edited.book_hash, first.book_hash);
    Ok(())
}
