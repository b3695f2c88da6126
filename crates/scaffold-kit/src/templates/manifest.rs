//! Template manifest types and parsing

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Kind of filesystem object an entry produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    #[default]
    File,
}

/// One entry as declared in `template.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDecl {
    /// Path relative to the project root, `/`-separated
    pub path: String,

    #[serde(default)]
    pub kind: EntryKind,

    /// Bundle file holding the content (defaults to `path`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Inline content, used instead of a bundle file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,

    /// Substitute `{{ key }}` placeholders before writing
    #[serde(default)]
    pub render: bool,

    #[serde(default)]
    pub executable: bool,
}

impl EntryDecl {
    /// Bundle file to read the content from, or `None` for inline/directory entries
    pub fn source_file(&self) -> Option<&str> {
        match (self.kind, &self.literal) {
            (EntryKind::File, None) => Some(self.source.as_deref().unwrap_or(&self.path)),
            _ => None,
        }
    }
}

/// Template manifest (`template.yaml` at the bundle root)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    /// Display name of the template
    pub name: String,

    /// Description of what the template provides
    pub description: String,

    /// Semver version for CLI compatibility checking
    pub version: String,

    /// Ordered list of directories and files to produce
    pub entries: Vec<EntryDecl>,
}

impl TemplateManifest {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: TemplateManifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject manifests that could escape the project root or contradict themselves
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut files = HashSet::new();

        for entry in &self.entries {
            let path = Path::new(&entry.path);
            if !is_safe_relative(path) {
                anyhow::bail!("Entry path '{}' must be relative and stay inside the project", entry.path);
            }
            if !seen.insert(path.to_path_buf()) {
                anyhow::bail!("Entry '{}' is declared more than once", entry.path);
            }
            if entry.kind == EntryKind::Directory
                && (entry.literal.is_some() || entry.source.is_some() || entry.executable)
            {
                anyhow::bail!("Directory entry '{}' cannot carry content", entry.path);
            }
            if entry.literal.is_some() && entry.source.is_some() {
                anyhow::bail!("Entry '{}' sets both 'literal' and 'source'", entry.path);
            }
            if entry.kind == EntryKind::File {
                files.insert(path.to_path_buf());
            }
        }

        for entry in &self.entries {
            for ancestor in Path::new(&entry.path).ancestors().skip(1) {
                if files.contains(ancestor) {
                    anyhow::bail!(
                        "Entry '{}' is nested under file entry '{}'",
                        entry.path,
                        ancestor.display()
                    );
                }
            }
        }

        Ok(())
    }
}

/// Relative, non-empty, and free of `..`, root or prefix components
pub fn is_safe_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Content of a resolved entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Written byte-for-byte
    Literal(Vec<u8>),
    /// Rendered through a [`RenderContext`](super::render::RenderContext) first
    Template(String),
}

/// A manifest entry with its content loaded, ready to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub relative_path: PathBuf,
    pub kind: EntryKind,
    pub content: EntryContent,
    pub executable: bool,
}

impl ManifestEntry {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: path.into(),
            kind: EntryKind::Directory,
            content: EntryContent::Literal(Vec::new()),
            executable: false,
        }
    }

    pub fn file(path: impl Into<PathBuf>, content: EntryContent) -> Self {
        Self {
            relative_path: path.into(),
            kind: EntryKind::File,
            content,
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    /// Number of path components; directories are staged shallowest first
    pub fn depth(&self) -> usize {
        self.relative_path.components().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: Support Desk
description: Backend and web client
version: 0.1.0
entries:
  - path: server
    kind: directory
  - path: server/index.js
  - path: server/package.json
    render: true
  - path: .env.example
    literal: "PORT=3000\n"
  - path: scripts/dev.sh
    source: dev.sh
    executable: true
"#;

    #[test]
    fn test_parse_sample_manifest() {
        let manifest = TemplateManifest::from_yaml(SAMPLE).unwrap();
        assert_eq!(manifest.entries.len(), 5);
        assert_eq!(manifest.entries[0].kind, EntryKind::Directory);
        assert_eq!(manifest.entries[1].kind, EntryKind::File);
        assert!(manifest.entries[2].render);

        assert_eq!(manifest.entries[0].source_file(), None);
        assert_eq!(manifest.entries[1].source_file(), Some("server/index.js"));
        assert_eq!(manifest.entries[3].source_file(), None);
        assert_eq!(manifest.entries[4].source_file(), Some("dev.sh"));
    }

    fn manifest_with(entries: &str) -> Result<TemplateManifest> {
        TemplateManifest::from_yaml(&format!(
            "name: t\ndescription: d\nversion: 0.1.0\nentries:\n{}",
            entries
        ))
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(manifest_with("  - path: ../evil\n").is_err());
        assert!(manifest_with("  - path: /etc/passwd\n").is_err());
        assert!(manifest_with("  - path: a/../../b\n").is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_nesting() {
        assert!(manifest_with("  - path: a\n  - path: a\n").is_err());
        assert!(manifest_with("  - path: a\n  - path: a/b\n").is_err());
        assert!(manifest_with("  - path: a\n    kind: directory\n    literal: x\n").is_err());
    }

    #[test]
    fn test_safe_relative() {
        assert!(is_safe_relative(Path::new("src/main.js")));
        assert!(is_safe_relative(Path::new("./src")));
        assert!(!is_safe_relative(Path::new("")));
        assert!(!is_safe_relative(Path::new("../x")));
    }
}
