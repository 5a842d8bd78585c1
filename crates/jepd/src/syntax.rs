//! Static Syntax Registry (spec §4.E).
//!
//! Grounded in `examples/original_source/jep/syntax.py`'s
//! `StaticSyntaxProvider` for the lowercase-extension-index lookup idiom;
//! the `format` dimension has no counterpart in that original (it predates
//! `SyntaxFormatType`) and is added per spec §3/§4.E, following
//! `examples/original_source/test/test_syntax_.py`'s `SyntaxFileSet`/
//! `SyntaxFile` API (`add`, `add_syntax_file`, `remove`, `filtered`,
//! `normalized_extension`, lazily-read `definition`).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use jep_protocol::messages::SyntaxFormatType;

/// A single registered syntax definition file.
#[derive(Debug, Clone)]
pub struct SyntaxFile {
    /// Display name of the syntax definition.
    pub name: String,
    /// Path to the definition file on disk, read lazily.
    pub path: PathBuf,
    /// Format the definition file is written in.
    pub fileformat: SyntaxFormatType,
    /// File extensions (normalized lowercase, no leading dot) this
    /// definition applies to.
    pub extensions: Vec<String>,
    definition: OnceLock<String>,
}

impl PartialEq for SyntaxFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.path == other.path && self.extensions == other.extensions
    }
}

impl Eq for SyntaxFile {}

impl SyntaxFile {
    /// Builds a syntax file entry; `extensions` are normalized immediately.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        fileformat: SyntaxFormatType,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            fileformat,
            extensions: extensions
                .into_iter()
                .filter_map(|extension| Self::normalized_extension(&extension.into()))
                .collect(),
            definition: OnceLock::new(),
        }
    }

    /// Lowercases `extension` and strips a single leading `.`, if present.
    /// Returns `None` for an empty extension.
    #[must_use]
    pub fn normalized_extension(extension: &str) -> Option<String> {
        let trimmed = extension.strip_prefix('.').unwrap_or(extension);
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    /// The definition file's content, read from disk on first access and
    /// cached thereafter. Returns an empty string if the file cannot be
    /// read (logged as a warning).
    pub fn definition(&self) -> &str {
        self.definition.get_or_init(|| match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(
                    target: "jepd::syntax",
                    path = %self.path.display(),
                    %error,
                    "failed to read syntax definition file"
                );
                String::new()
            }
        })
    }
}

/// A registry of [`SyntaxFile`]s with an auxiliary extension index,
/// normalized to lowercase with any leading `.` stripped.
#[derive(Debug, Default)]
pub struct SyntaxFileSet {
    files: Vec<SyntaxFile>,
    extension_map: HashMap<String, usize>,
}

impl SyntaxFileSet {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered syntax files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` when no syntax files are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Extensions currently indexed, mapped to their owning file's name.
    #[must_use]
    pub fn extension_map(&self) -> HashMap<&str, &str> {
        self.extension_map
            .iter()
            .filter_map(|(extension, &index)| {
                self.files.get(index).map(|file| (extension.as_str(), file.name.as_str()))
            })
            .collect()
    }

    /// Registers `file`, indexing it under each of its extensions.
    pub fn add(&mut self, file: SyntaxFile) {
        let index = self.files.len();
        for extension in &file.extensions {
            self.extension_map.insert(extension.clone(), index);
        }
        self.files.push(file);
    }

    /// Builds and registers a [`SyntaxFile`] from its constituent fields,
    /// mirroring `jep_py.backend.Backend.register_static_syntax`.
    pub fn add_syntax_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        fileformat: SyntaxFormatType,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.add(SyntaxFile::new(name, path, fileformat, extensions));
    }

    /// Removes a previously registered file, identified by equality.
    pub fn remove(&mut self, file: &SyntaxFile) {
        let Some(index) = self.files.iter().position(|candidate| candidate == file) else {
            return;
        };
        self.files.remove(index);
        self.extension_map.retain(|_, stored_index| *stored_index != index);
        for stored_index in self.extension_map.values_mut() {
            if *stored_index > index {
                *stored_index -= 1;
            }
        }
    }

    /// Returns the syntax files matching `format`, filtered to
    /// `extensions` when non-empty (an empty list matches every file in the
    /// requested format).
    #[must_use]
    pub fn filtered(&self, format: SyntaxFormatType, extensions: &[String]) -> Vec<&SyntaxFile> {
        if extensions.is_empty() {
            return self
                .files
                .iter()
                .filter(|file| file.fileformat == format)
                .collect();
        }

        let wanted: HashSet<String> = extensions
            .iter()
            .filter_map(|extension| SyntaxFile::normalized_extension(extension))
            .collect();

        let mut seen = HashSet::new();
        let mut matched: Vec<&SyntaxFile> = wanted
            .iter()
            .filter_map(|extension| self.extension_map.get(extension).copied())
            .filter(|&index| seen.insert(index))
            .filter_map(|index| self.files.get(index))
            .filter(|file| file.fileformat == format)
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, extensions: &[&str]) -> SyntaxFile {
        SyntaxFile::new(name, format!("/defs/{name}"), SyntaxFormatType::Textmate, extensions)
    }

    #[test]
    fn normalized_extension_strips_dot_and_lowercases() {
        assert_eq!(SyntaxFile::normalized_extension(".Ext"), Some("ext".to_string()));
        assert_eq!(SyntaxFile::normalized_extension("EXT"), Some("ext".to_string()));
        assert_eq!(SyntaxFile::normalized_extension(""), None);
    }

    #[test]
    fn empty_set_has_no_extensions() {
        let set = SyntaxFileSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.extension_map().is_empty());
    }

    #[test]
    fn add_indexes_every_extension() {
        let mut set = SyntaxFileSet::new();
        set.add(file("alpha", &["A1", "A2"]));
        set.add(file("beta", &["B1"]));

        assert_eq!(set.len(), 2);
        assert_eq!(set.extension_map().get("a1"), Some(&"alpha"));
        assert_eq!(set.extension_map().get("a2"), Some(&"alpha"));
        assert_eq!(set.extension_map().get("b1"), Some(&"beta"));
    }

    #[test]
    fn remove_drops_its_extensions_only() {
        let mut set = SyntaxFileSet::new();
        set.add(file("alpha", &["a1", "a2"]));
        set.add(file("beta", &["b1"]));
        set.remove(&file("beta", &["b1"]));

        assert_eq!(set.len(), 1);
        assert_eq!(set.extension_map().len(), 2);
        assert!(set.extension_map().contains_key("a1"));
    }

    #[test]
    fn filtered_without_extensions_returns_every_file_in_format() {
        let mut set = SyntaxFileSet::new();
        set.add(file("alpha", &["a1"]));
        set.add(SyntaxFile::new(
            "vimfile",
            "/defs/vimfile",
            SyntaxFormatType::Vim,
            ["v1"],
        ));

        let matched = set.filtered(SyntaxFormatType::Textmate, &[]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "alpha");
    }

    #[test]
    fn filtered_intersects_requested_extensions_with_the_index() {
        let mut set = SyntaxFileSet::new();
        set.add(file("alpha", &["ext1a", "ext1b"]));
        set.add(file("beta", &["ext2a", "ext2b"]));
        set.add(SyntaxFile::new(
            "gamma",
            "/defs/gamma",
            SyntaxFormatType::Vim,
            ["ext3a", "ext3b"],
        ));

        let unmatched = set.filtered(
            SyntaxFormatType::Textmate,
            &["ext4".to_string(), "ext3a".to_string(), "ext3b".to_string()],
        );
        assert!(unmatched.is_empty());

        let mut matched = set.filtered(
            SyntaxFormatType::Textmate,
            &["ext4".to_string(), "ext1a".to_string(), "ext2b".to_string()],
        );
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].name, "alpha");
        assert_eq!(matched[1].name, "beta");
    }
}
