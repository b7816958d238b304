use std::path::{Path, PathBuf};

use crate::error::CorpusError;

pub const DEFAULT_IMAGES_DIR: &str = "images";
pub const DEFAULT_EXTENSION: &str = ".JPEG";

/// Where and what to enumerate.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    /// Directory holding one subdirectory per group.
    pub root: PathBuf,
    /// Subdirectory of each group holding the files. Empty means the group
    /// directory itself.
    pub images_dir: String,
    /// Accepted filename suffixes, matched case-sensitively.
    pub extensions: Vec<String>,
    /// Keep at most this many files per group.
    pub per_group_cap: Option<usize>,
}

impl CorpusLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            per_group_cap: None,
        }
    }

    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.per_group_cap = cap;
        self
    }

    pub fn with_extensions<S: Into<String>>(mut self, exts: impl IntoIterator<Item = S>) -> Self {
        self.extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_images_dir(mut self, dir: impl Into<String>) -> Self {
        self.images_dir = dir.into();
        self
    }

    fn accepts(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// One enumerated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub group_id: String,
    pub filename: String,
}

/// Lists directory entries sorted bytewise by name.
fn sorted_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>, CorpusError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| CorpusError::io(dir, e))? {
        let entry = entry.map_err(|e| CorpusError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        out.push((name, entry.path()));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Enumerates `root/<group_id>/<images_dir>/*<ext>`.
///
/// Groups come in name order, then files in name order, truncated to the
/// per-group cap after the extension filter. Non-directories under the root
/// and groups without an images directory are skipped; an empty group is
/// not an error. A missing root is.
pub fn enumerate(layout: &CorpusLayout) -> Result<Vec<Entry>, CorpusError> {
    if !layout.root.is_dir() {
        return Err(CorpusError::MissingRoot(layout.root.clone()));
    }

    let mut entries = Vec::new();
    let mut groups = 0;
    for (group_id, group_path) in sorted_dir(&layout.root)? {
        if !group_path.is_dir() {
            continue;
        }
        let images = if layout.images_dir.is_empty() {
            group_path
        } else {
            group_path.join(&layout.images_dir)
        };
        if !images.is_dir() {
            tracing::debug!(group = %group_id, "skipping group without images directory");
            continue;
        }

        let files = sorted_dir(&images)?
            .into_iter()
            .filter(|(name, path)| layout.accepts(name) && path.is_file())
            .take(layout.per_group_cap.unwrap_or(usize::MAX));

        groups += 1;
        for (filename, path) in files {
            entries.push(Entry {
                path,
                group_id: group_id.clone(),
                filename,
            });
        }
    }

    tracing::info!(
        root = %layout.root.display(),
        groups,
        items = entries.len(),
        "enumerated corpus"
    );
    Ok(entries)
}
