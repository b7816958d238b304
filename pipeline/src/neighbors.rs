use std::collections::{BTreeMap, HashSet};

use imgsim_corpus::ItemRecord;
use imgsim_vecstore::{VecError, VecIndex};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Item key -> neighbor keys, nearest first, self excluded.
///
/// Sorted so the persisted document is byte-stable across runs.
pub type NeighborList = BTreeMap<String, Vec<String>>;

/// How items are named in the neighbor list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborKey {
    /// Bare filename. Requires filenames to be unique across groups.
    #[default]
    Filename,
    /// `group_id/filename`.
    Qualified,
}

impl NeighborKey {
    pub fn key(self, item: &ItemRecord) -> String {
        match self {
            NeighborKey::Filename => item.filename.clone(),
            NeighborKey::Qualified => item.qualified_name(),
        }
    }
}

/// Queries the top `k` neighbors of every item.
///
/// `items[i]` must describe the vector inserted under id `i`. Each item is
/// queried for `k + 1` ids so that dropping itself still leaves `k`.
pub fn materialize<I: VecIndex + ?Sized>(
    index: &I,
    items: &[ItemRecord],
    k: usize,
    key: NeighborKey,
) -> Result<NeighborList, PipelineError> {
    if index.len() != items.len() {
        return Err(PipelineError::Misaligned {
            vectors: index.len(),
            items: items.len(),
        });
    }

    let keys: Vec<String> = items.iter().map(|item| key.key(item)).collect();
    let mut seen = HashSet::with_capacity(keys.len());
    for name in &keys {
        if !seen.insert(name.as_str()) {
            return Err(PipelineError::DuplicateKey(name.clone()));
        }
    }

    let mut out = NeighborList::new();
    for (i, own) in keys.iter().enumerate() {
        let matches = index
            .query(i as u32, k.saturating_add(1))
            .map_err(PipelineError::NeighborIndex)?;

        let mut list = Vec::with_capacity(k.min(keys.len()));
        for m in matches {
            let name = keys
                .get(m.id as usize)
                .ok_or(PipelineError::NeighborIndex(VecError::UnknownId(m.id)))?;
            if name == own {
                continue;
            }
            list.push(name.clone());
            if list.len() == k {
                break;
            }
        }
        out.insert(own.clone(), list);
    }

    tracing::info!(items = out.len(), k, "materialized neighbor lists");
    Ok(out)
}
