use serde::{Deserialize, Serialize};

/// Metadata for one indexed item. Its id is its position in the metadata
/// document, which equals the id its vector was inserted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub filename: String,
    pub path: String,
    pub label: String,
    #[serde(alias = "wnid")]
    pub group_id: String,
}

impl ItemRecord {
    /// Key unique across groups: `group_id/filename`.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.group_id, self.filename)
    }
}
