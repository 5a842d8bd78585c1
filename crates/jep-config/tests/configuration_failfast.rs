//! Failure-path coverage for [`jep_config::Config`] loading.
//!
//! Malformed configuration, wherever it originates, must fail loudly rather
//! than silently falling back to defaults (SPEC_FULL.md §1.3).

use std::ffi::OsString;
use std::fs;

use jep_config::Config;
use ortho_config::OrthoError;
use tempfile::TempDir;

#[test]
fn malformed_config_file_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config_path = temp_dir.path().join("jep.toml");
    fs::write(&config_path, "port_range_start = \"not a number\"\n").expect("write config");

    let args = vec![
        OsString::from("jepd"),
        OsString::from("--config-path"),
        config_path.clone().into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    match error.as_ref() {
        OrthoError::File { path, .. } => assert_eq!(path, &config_path),
        other => panic!("expected a file error, got {other:?}"),
    }
}

#[test]
fn missing_config_file_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let missing_path = temp_dir.path().join("absent.toml");

    let args = vec![
        OsString::from("jepd"),
        OsString::from("--config-path"),
        missing_path.clone().into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    match error.as_ref() {
        OrthoError::File { path, .. } => assert_eq!(path, &missing_path),
        other => panic!("expected a file error, got {other:?}"),
    }
}

#[test]
fn unknown_cli_flag_is_rejected() {
    let args = vec![OsString::from("jepd"), OsString::from("--not-a-real-flag")];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(
        !error.to_string().is_empty(),
        "expected a descriptive error message"
    );
}
