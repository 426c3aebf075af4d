//! Config load validation tests for ut-stats-config.
// crates/ut-stats-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and section validation.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tempfile::TempDir;
use ut_stats_config::AuditSinkType;
use ut_stats_config::ConfigError;
use ut_stats_config::StoreType;
use ut_stats_config::UtStatsConfig;
use ut_stats_core::IgnoreList;
use ut_stats_core::InstallId;

type TestResult = Result<(), String>;

const IGNORED: &str = "8d5c7f2a-3b1e-4c6d-9a0f-1e2d3c4b5a69";
const FROM_FILE: &str = "00000000-0000-4000-8000-000000000007";

fn assert_invalid(result: Result<UtStatsConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> Result<std::path::PathBuf, String> {
    let path = dir.path().join(name);
    std::fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(path)
}

fn validated(content: &str) -> Result<UtStatsConfig, ConfigError> {
    let mut config = UtStatsConfig::from_toml_str(content)?;
    config.validate()?;
    Ok(config)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(UtStatsConfig::load(Some(Path::new(&long_path))), "path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        UtStatsConfig::load(Some(Path::new(&long_component))),
        "path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(UtStatsConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(UtStatsConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_missing_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match UtStatsConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("expected missing file to fail".to_string()),
    }
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = validated("").map_err(|err| err.to_string())?;
    if config.store.store_type != StoreType::Memory {
        return Err("default store should be memory".to_string());
    }
    if config.audit.sink != AuditSinkType::Stderr {
        return Err("default audit sink should be stderr".to_string());
    }
    if config.aggregate_options().filter_ignored_everywhere {
        return Err("filter_ignored_everywhere should default to false".to_string());
    }
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    if addr.port() != 8080 {
        return Err(format!("unexpected default bind {addr}"));
    }
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    assert_invalid(validated("[server]\nbindd = \"127.0.0.1:1\"\n"), "config parse error")
}

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    assert_invalid(validated("[server]\nbind = \"not an address\"\n"), "invalid server.bind")
}

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    assert_invalid(validated("[server]\nmax_body_bytes = 0\n"), "server.max_body_bytes")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    assert_invalid(validated("[store]\ntype = \"sqlite\"\n"), "sqlite store requires path")
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    assert_invalid(
        validated("[store]\ntype = \"memory\"\npath = \"ut.sqlite\"\n"),
        "memory store must not set path",
    )
}

#[test]
fn sqlite_store_config_is_built() -> TestResult {
    let config = validated(
        "[store]\ntype = \"sqlite\"\npath = \"data/ut.sqlite\"\njournal_mode = \"delete\"\n\
         sync_mode = \"normal\"\nread_pool_size = 2\n",
    )
    .map_err(|err| err.to_string())?;
    let sqlite = config.store.sqlite_config().map_err(|err| err.to_string())?;
    if sqlite.read_pool_size != 2 || sqlite.journal_mode.pragma_value() != "delete" {
        return Err("unexpected sqlite config".to_string());
    }
    Ok(())
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    assert_invalid(validated("[audit]\nsink = \"file\"\n"), "file audit sink requires audit.path")
}

#[test]
fn inline_ignore_ids_are_validated() -> TestResult {
    assert_invalid(validated("[ignore_list]\nids = [\"not-a-uuid\"]\n"), "ignore_list.ids[0]")
}

#[test]
fn ignore_list_merges_inline_ids_and_relative_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write_file(&dir, "ignored.txt", &format!("# test devices\n\n{FROM_FILE}\n"))?;
    let config_path = write_file(
        &dir,
        "ut-stats.toml",
        &format!("[ignore_list]\nids = [\"{IGNORED}\"]\npath = \"ignored.txt\"\n"),
    )?;

    let config = UtStatsConfig::load(Some(&config_path)).map_err(|err| err.to_string())?;
    let list = config.ignore_list();
    for raw in [IGNORED, FROM_FILE] {
        let id = InstallId::parse(raw).map_err(|err| err.to_string())?;
        if !list.contains(&id) {
            return Err(format!("{raw} missing from ignore list"));
        }
    }
    if list.len() != 2 {
        return Err(format!("expected 2 ignored ids, got {}", list.len()));
    }
    Ok(())
}

#[test]
fn malformed_ignore_file_fails_closed() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write_file(&dir, "ignored.txt", "garbage\n")?;
    let config_path =
        write_file(&dir, "ut-stats.toml", "[ignore_list]\npath = \"ignored.txt\"\n")?;
    assert_invalid(UtStatsConfig::load(Some(&config_path)), "ignore list line 1")
}

#[test]
fn filter_everywhere_switch_is_read() -> TestResult {
    let config = validated("[stats]\nfilter_ignored_everywhere = true\n")
        .map_err(|err| err.to_string())?;
    if !config.aggregate_options().filter_ignored_everywhere {
        return Err("expected filter_ignored_everywhere".to_string());
    }
    Ok(())
}
