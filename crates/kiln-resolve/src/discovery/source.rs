//! Pluggable candidate sources.

use std::io;
use std::path::{Path, PathBuf};

use kiln_semver::{Version, VersionPredicate, VersionTerm};
use log::debug;
use walkdir::WalkDir;

use crate::config::ResolverConfig;
use crate::metadata::{Dependency, DependencyKind, ModMetadata};

/// What a source hands to the discoverer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Archive file or directory on disk
    Path(PathBuf),
    /// Synthesized mod with no content
    Builtin(ModMetadata),
}

/// One item yielded by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub kind: SourceKind,
    /// Whether the content needs remapping before use; inherited by nested mods
    pub remap_required: bool,
}

impl SourceItem {
    /// Create an item for a path
    pub fn path(path: impl Into<PathBuf>, remap_required: bool) -> Self {
        Self {
            kind: SourceKind::Path(path.into()),
            remap_required,
        }
    }

    /// Create an item for a builtin mod
    pub fn builtin(metadata: ModMetadata) -> Self {
        Self {
            kind: SourceKind::Builtin(metadata),
            remap_required: false,
        }
    }
}

/// A place candidates are discovered from
pub trait CandidateSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// List the items of this source
    fn collect(&self, config: &ResolverConfig) -> io::Result<Vec<SourceItem>>;
}

/// All archives and subdirectories directly inside a mods directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    name: String,
    path: PathBuf,
    remap_required: bool,
}

impl DirectorySource {
    /// Create a new directory source
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("directory ({})", path.display()),
            path,
            remap_required: false,
        }
    }

    /// Mark everything from this directory as needing remapping
    pub fn with_remap(mut self, remap_required: bool) -> Self {
        self.remap_required = remap_required;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

impl CandidateSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self, config: &ResolverConfig) -> io::Result<Vec<SourceItem>> {
        if !self.path.is_dir() {
            debug!("Mods directory {} does not exist", self.path.display());
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if is_hidden(path) {
                continue;
            }

            let is_archive = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| config.is_archive_extension(e));

            if entry.file_type().is_dir() || (entry.file_type().is_file() && is_archive) {
                items.push(SourceItem::path(path, self.remap_required));
            }
        }

        Ok(items)
    }
}

/// A fixed list of paths, such as classpath entries
#[derive(Debug, Clone, Default)]
pub struct ExplicitSource {
    items: Vec<SourceItem>,
}

impl ExplicitSource {
    /// Create a new empty explicit source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path
    pub fn with_path(mut self, path: impl Into<PathBuf>, remap_required: bool) -> Self {
        self.items.push(SourceItem::path(path, remap_required));
        self
    }
}

impl CandidateSource for ExplicitSource {
    fn name(&self) -> &str {
        "explicit"
    }

    fn collect(&self, _config: &ResolverConfig) -> io::Result<Vec<SourceItem>> {
        Ok(self.items.clone())
    }
}

/// Mods synthesized for the host application and its runtime
#[derive(Debug, Clone, Default)]
pub struct BuiltinSource {
    mods: Vec<ModMetadata>,
}

impl BuiltinSource {
    /// Create a new empty builtin source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a builtin mod
    pub fn with_mod(mut self, metadata: ModMetadata) -> Self {
        self.mods.push(metadata);
        self
    }

    /// Host and runtime mods, the host requiring at least `min_runtime`
    pub fn host(
        host_id: &str,
        host_version: Version,
        runtime_id: &str,
        runtime_version: Version,
        min_runtime: Option<Version>,
    ) -> Self {
        let mut host = ModMetadata::new(host_id, host_version);
        if let Some(min) = min_runtime {
            let predicate = VersionPredicate::from_terms(vec![VersionTerm::GreaterOrEqual(min)])
                .unwrap_or_else(|_| VersionPredicate::any());
            host = host.with_dependency(Dependency::new(DependencyKind::Depends, runtime_id, predicate));
        }

        Self::new()
            .with_mod(host)
            .with_mod(ModMetadata::new(runtime_id, runtime_version))
    }
}

impl CandidateSource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn collect(&self, _config: &ResolverConfig) -> io::Result<Vec<SourceItem>> {
        Ok(self.mods.iter().cloned().map(SourceItem::builtin).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_source_lists_archives_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.jar"), b"").unwrap();
        fs::write(dir.path().join("a.ZIP"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join(".hidden.jar"), b"").unwrap();
        fs::create_dir(dir.path().join("unpacked")).unwrap();
        fs::create_dir_all(dir.path().join("unpacked/deeper")).unwrap();

        let items = DirectorySource::new(dir.path())
            .collect(&ResolverConfig::default())
            .unwrap();

        let names: Vec<String> = items
            .iter()
            .map(|i| match &i.kind {
                SourceKind::Path(p) => p.file_name().unwrap().to_string_lossy().into_owned(),
                SourceKind::Builtin(_) => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["a.ZIP", "b.jar", "unpacked"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let source = DirectorySource::new("/definitely/not/here");
        assert!(source.collect(&ResolverConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_builtin_host() {
        let source = BuiltinSource::host(
            "host",
            Version::parse("1.20.1").unwrap(),
            "java",
            Version::parse("17").unwrap(),
            Some(Version::parse("17").unwrap()),
        );

        let items = source.collect(&ResolverConfig::default()).unwrap();
        assert_eq!(items.len(), 2);
        let SourceKind::Builtin(host) = &items[0].kind else {
            panic!("expected builtin");
        };
        assert_eq!(host.dependencies.len(), 1);
        assert_eq!(host.dependencies[0].target, "java");
        assert!(host.dependencies[0].matches(&Version::parse("21").unwrap()));
    }
}
