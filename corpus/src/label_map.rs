use std::collections::HashMap;
use std::path::Path;

use crate::error::CorpusError;

/// Maps group ids (e.g. WordNet ids such as `n01443537`) to labels.
///
/// Read-only after loading. Lookups for unknown groups fall back to the
/// group id itself.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    labels: HashMap<String, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `group_id<TAB>label` lines.
    ///
    /// Surrounding whitespace is trimmed and blank lines are skipped. A line
    /// without a tab is rejected. Later lines win for repeated group ids.
    pub fn parse(data: &str) -> Result<Self, CorpusError> {
        let mut labels = HashMap::new();
        for (i, raw) in data.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (group_id, label) =
                line.split_once('\t')
                    .ok_or_else(|| CorpusError::MalformedLabelLine {
                        line: i + 1,
                        content: line.to_string(),
                    })?;
            labels.insert(group_id.trim().to_string(), label.trim().to_string());
        }
        Ok(Self { labels })
    }

    /// Reads and parses a label file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        let map = Self::parse(&data)?;
        tracing::info!(path = %path.display(), labels = map.len(), "loaded label map");
        Ok(map)
    }

    /// Label for `group_id`, or `group_id` when unknown.
    pub fn resolve<'a>(&'a self, group_id: &'a str) -> &'a str {
        self.labels
            .get(group_id)
            .map(String::as_str)
            .unwrap_or(group_id)
    }

    pub fn get(&self, group_id: &str) -> Option<&str> {
        self.labels.get(group_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
