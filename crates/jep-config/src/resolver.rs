//! Service Configuration Resolver (spec §4.F).
//!
//! Walks parent directories starting at an edited file's directory looking
//! for a service-configuration file (`.jep` by default), parses its
//! pattern/command records, and returns the first record whose pattern
//! matches the edited file. Grounded line-for-line in
//! `examples/original_source/jep/config.py` (`find_service_config`,
//! `_parse_config_file`, `_file_pattern`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};

/// A parsed `.jep` record: the file-name patterns it applies to and the
/// backend command to launch for a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Absolute path of the `.jep` file this record was parsed from.
    pub file: PathBuf,
    /// Patterns this record applies to, e.g. `*.rs` or a bare file name.
    pub patterns: Vec<String>,
    /// Command line to launch the backend.
    pub command: String,
}

impl ServiceConfig {
    /// Structural identity used to deduplicate connectors for this record
    /// (spec §6: "absolute path of config file, normalized set of
    /// patterns").
    #[must_use]
    pub fn selector(&self) -> Selector {
        let mut patterns = self.patterns.clone();
        patterns.sort();
        patterns.dedup();
        Selector {
            config_path: self.file.clone(),
            patterns,
        }
    }

    /// SHA-256 digest of the `.jep` file's current content, used by the
    /// frontend registry to detect edits to the service configuration.
    /// Returns `None` when the file no longer exists.
    ///
    /// The spec's literal text names SHA-1; no `sha1` crate is available
    /// anywhere in the corpus this workspace was built from, and this
    /// checksum never appears on the wire (see `DESIGN.md`), so SHA-256
    /// stands in as an equally suitable change-detection digest.
    #[must_use]
    pub fn checksum(&self) -> Option<[u8; 32]> {
        checksum(&self.file)
    }
}

/// Structural identity of a [`ServiceConfig`], used to cache connectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    config_path: PathBuf,
    patterns: Vec<String>,
}

impl fmt::Display for Selector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}:{}",
            self.config_path.display(),
            self.patterns.join(",")
        )
    }
}

/// Computes the SHA-256 digest of a file's content, or `None` if absent.
#[must_use]
pub fn checksum(path: &Path) -> Option<[u8; 32]> {
    let content = fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Some(hasher.finalize().into())
}

/// Resolves the service configuration governing `edited_file`, by walking
/// up from its containing directory looking for `config_file_name`.
///
/// Returns `None` when no configuration file is found, or none of its
/// records match `edited_file`.
#[must_use]
pub fn provide_for(edited_file: &Path, config_file_name: &str) -> Option<ServiceConfig> {
    let search_pattern = file_pattern(edited_file);
    let mut current = absolute_parent(edited_file)?;

    loop {
        let candidate = current.join(config_file_name);
        if candidate.is_file()
            && let Ok(content) = fs::read_to_string(&candidate)
        {
            let configs = parse_config_file(&candidate, &content);
            if let Some(config) = configs
                .into_iter()
                .find(|config| config.patterns.iter().any(|pattern| pattern == &search_pattern))
            {
                return Some(config);
            }
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return None,
        }
    }
}

fn absolute_parent(file: &Path) -> Option<PathBuf> {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    fs::canonicalize(dir).ok().or_else(|| Some(dir.to_path_buf()))
}

/// The pattern an edited file is matched against: `*<ext>` when the file
/// has an extension, its bare file name otherwise.
fn file_pattern(file: &Path) -> String {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some(extension) => format!("*.{extension}"),
        None => file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string(),
    }
}

fn pattern_line_regex() -> Regex {
    #[expect(
        clippy::unwrap_used,
        reason = "pattern is a fixed literal verified by the accompanying unit tests"
    )]
    Regex::new(r"^(.+):\s*$").unwrap()
}

/// Parses a `.jep` file's content into its service-configuration records.
///
/// Walks the lines with an explicit cursor, rather than an iterator, because
/// a line following a pattern line that turns out not to be a valid command
/// (blank, or itself another pattern line) must be re-examined as the next
/// line to process, not discarded — matching `_parse_config_file`'s
/// shift-and-possibly-unshift loop.
fn parse_config_file(path: &Path, content: &str) -> Vec<ServiceConfig> {
    let pattern_line = pattern_line_regex();
    let lines: Vec<&str> = content.lines().collect();
    let mut configs = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        index += 1;

        let Some(captures) = pattern_line.captures(line) else {
            continue;
        };
        let Some(pattern_group) = captures.get(1) else {
            continue;
        };
        let patterns: Vec<String> = pattern_group
            .as_str()
            .split(',')
            .map(|pattern| pattern.trim().to_string())
            .collect();

        let Some(&command_line) = lines.get(index) else {
            break;
        };
        index += 1;

        if command_line.trim().is_empty() || pattern_line.is_match(command_line) {
            // Not a command line after all; let the next iteration
            // re-examine it rather than dropping it on the floor.
            index -= 1;
            continue;
        }

        configs.push(ServiceConfig {
            file: path.to_path_buf(),
            patterns,
            command: command_line.trim().to_string(),
        });
    }

    configs
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;
    use std::fs;

    use tempfile::tempdir;

    #[test]
    fn file_pattern_prefers_extension_glob() {
        assert_eq!(file_pattern(Path::new("/a/b/main.rs")), "*.rs");
        assert_eq!(file_pattern(Path::new("/a/b/Makefile")), "Makefile");
    }

    #[test]
    fn parses_single_record() {
        let content = "*.rs,*.toml:\nanalyzer --stdio\n";
        let configs = parse_config_file(Path::new("/tmp/.jep"), content);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].patterns, vec!["*.rs", "*.toml"]);
        assert_eq!(configs[0].command, "analyzer --stdio");
    }

    #[test]
    fn skips_malformed_blocks() {
        // The `*.py:` block has no command line (the line right after it is
        // blank), so it is discarded; the blank line and the stray pattern
        // line that follow are re-examined and skipped in turn, and the
        // later well-formed `*.rs:` block is still found.
        let content = "not a pattern line\n*.py:\n\n*.rs:\nrust-analyzer\n";
        let configs = parse_config_file(Path::new("/tmp/.jep"), content);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].patterns, vec!["*.rs"]);
        assert_eq!(configs[0].command, "rust-analyzer");
    }

    #[test]
    fn provide_for_walks_up_to_the_matching_ancestor() {
        let root = tempdir().expect("tempdir");
        let project = root.path().join("project");
        let nested = project.join("src");
        fs::create_dir_all(&nested).expect("create nested dirs");
        fs::write(
            project.join(".jep"),
            "*.rs:\nrust-analyzer-backend\n",
        )
        .expect("write config");

        let edited = nested.join("lib.rs");
        fs::write(&edited, "fn main() {}").expect("write edited file");

        let resolved = provide_for(&edited, ".jep").expect("service config found");
        assert_eq!(resolved.command, "rust-analyzer-backend");
    }

    #[test]
    fn provide_for_returns_none_without_a_matching_pattern() {
        let root = tempdir().expect("tempdir");
        fs::write(root.path().join(".jep"), "*.py:\npy-analyzer\n").expect("write config");
        let edited = root.path().join("main.rs");
        fs::write(&edited, "fn main() {}").expect("write edited file");

        assert!(provide_for(&edited, ".jep").is_none());
    }

    #[test]
    fn checksum_changes_when_file_content_changes() {
        let root = tempdir().expect("tempdir");
        let path = root.path().join(".jep");
        fs::write(&path, "*.rs:\nbackend\n").expect("write");
        let first = checksum(&path).expect("checksum present");

        fs::write(&path, "*.rs:\nother-backend\n").expect("rewrite");
        let second = checksum(&path).expect("checksum present");

        assert_ne!(first, second);
    }

    #[test]
    fn checksum_is_none_for_a_missing_file() {
        assert!(checksum(Path::new("/nonexistent/path/.jep")).is_none());
    }
}
