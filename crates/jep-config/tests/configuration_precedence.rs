//! Layering coverage for [`jep_config::Config`]: CLI flags beat environment
//! variables, which beat a configuration file, which beats built-in defaults
//! (SPEC_FULL.md §1.3).

use std::ffi::OsString;
use std::fs;

use jep_config::Config;
use rstest::rstest;
use tempfile::TempDir;

struct Harness {
    temp_dir: TempDir,
    cli_args: Vec<OsString>,
    env_overrides: Vec<(String, Option<OsString>)>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        Self {
            temp_dir,
            cli_args: vec![OsString::from("jepd")],
            env_overrides: Vec::new(),
        }
    }

    fn write_config_file(&mut self, log_filter: &str) {
        let path = self.temp_dir.path().join("jep.toml");
        fs::write(&path, format!("log_filter = \"{log_filter}\"\n")).expect("write config");
        self.cli_args.push(OsString::from("--config-path"));
        self.cli_args.push(path.into_os_string());
    }

    fn set_env(&mut self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Nightly currently marks environment mutation as unsafe while the API
        // stabilises; overrides are unwound in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides.push((key.to_string(), previous));
    }

    fn push_cli_arg(&mut self, arg: impl Into<OsString>) {
        self.cli_args.push(arg.into());
    }

    fn load(&self) -> Config {
        Config::load_from_iter(self.cli_args.clone()).expect("configuration must load")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        while let Some((key, value)) = self.env_overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[test]
fn defaults_apply_with_no_overrides_present() {
    let harness = Harness::new();
    let config = harness.load();
    assert_eq!(config, Config::default());
}

#[test]
fn a_configuration_file_overrides_the_built_in_default() {
    let mut harness = Harness::new();
    harness.write_config_file("debug");

    let config = harness.load();
    assert_eq!(config.log_filter(), "debug");
}

#[test]
fn an_environment_variable_overrides_the_configuration_file() {
    let mut harness = Harness::new();
    harness.write_config_file("debug");
    harness.set_env("JEP_LOG_FILTER", "warn");

    let config = harness.load();
    assert_eq!(config.log_filter(), "warn");
}

#[test]
fn a_cli_flag_overrides_the_environment_variable() {
    let mut harness = Harness::new();
    harness.write_config_file("debug");
    harness.set_env("JEP_LOG_FILTER", "warn");
    harness.push_cli_arg("--log-filter");
    harness.push_cli_arg("trace");

    let config = harness.load();
    assert_eq!(config.log_filter(), "trace");
}

#[rstest]
#[case("9500", 9500)]
#[case("1024", 1024)]
fn cli_flags_override_numeric_fields(#[case] raw: &str, #[case] expected: u16) {
    let mut harness = Harness::new();
    harness.push_cli_arg("--port-range-start");
    harness.push_cli_arg(raw);

    let config = harness.load();
    assert_eq!(config.port_range().start, expected);
}
