/*!
 * Tests for the JSON-backed collaborators used by the CLI
 */

use anyhow::Result;
use locflow::collaborators::{
    ContentSource, InMemoryContentSource, InMemoryTranslatorDirectory, TranslatorDirectory,
};

use crate::common;

#[tokio::test]
async fn test_contentCatalog_fromJsonFile_shouldServeItems() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("content.json");
    std::fs::write(
        &path,
        r#"[
            { "id": "lesson-1", "text": "Count the apples", "language": "en", "domain": "education" },
            { "id": "lesson-2", "text": "Draw a circle", "language": "en" }
        ]"#,
    )?;

    let catalog = InMemoryContentSource::from_json_file(&path)?;
    let lesson = catalog.get_source_content("lesson-1").await?.unwrap();

    assert_eq!(lesson.text, "Count the apples");
    assert_eq!(lesson.domain.as_deref(), Some("education"));
    assert!(catalog.get_source_content("lesson-3").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_roster_saveJsonFile_shouldPersistWorkloads() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("translators.json");
    let roster = InMemoryTranslatorDirectory::with_translators(vec![
        common::translator("t1", &["en", "es"], 4.5, 0, 2),
        common::translator("t2", &["en", "fr"], 4.0, 1, 3),
    ]);

    roster.reserve_workload("t1").await?;
    roster.save_json_file(&path)?;
    let reloaded = InMemoryTranslatorDirectory::from_json_file(&path)?;

    assert_eq!(reloaded.get("t1").await?.unwrap().current_workload, 1);
    assert_eq!(reloaded.get("t2").await?.unwrap().current_workload, 1);
    assert_eq!(reloaded.list_available("en", "es").await?.len(), 1);
    Ok(())
}

#[test]
fn test_roster_fromJsonFile_missingFile_shouldFail() {
    assert!(InMemoryTranslatorDirectory::from_json_file("/nonexistent/translators.json").is_err());
}
