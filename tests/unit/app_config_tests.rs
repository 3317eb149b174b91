/*!
 * Tests for configuration loading
 */

use anyhow::Result;
use locflow::app_config::{AssignmentPolicy, Config, LogLevel, ProviderKind};

use crate::common;

#[test]
fn test_loadOrCreate_missingFile_shouldWriteDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.memory.fuzzy_limit, 5);
    assert_eq!(config.quality.pass_threshold, 80.0);
    assert_eq!(config.provider.provider_type, ProviderKind::Mock);
    config.validate()?;
    Ok(())
}

#[test]
fn test_loadOrCreate_existingFile_shouldReadIt() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{ "scheduler": { "policy": "performance" }, "workflow": { "auto_publish": false }, "log_level": "debug" }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.scheduler.policy, AssignmentPolicy::Performance);
    assert!(!config.workflow.auto_publish);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.memory.insert_threshold, 80.0);
    Ok(())
}

#[test]
fn test_loadOrCreate_malformedFile_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

#[test]
fn test_validate_zeroPageSize_shouldFail() {
    let mut config = Config::default();
    config.workflow.page_size = 0;

    assert!(config.validate().is_err());
}
