use std::io::Write;
use std::path::{Path, PathBuf};

use imgsim_corpus::ItemRecord;
use imgsim_vecstore::{save_forest, Forest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::PipelineError;
use crate::neighbors::NeighborList;

pub const INDEX_FILE: &str = "image_index.rpf";
pub const METADATA_FILE: &str = "metadata.json";
pub const NEIGHBORS_FILE: &str = "neighbors.json";

/// Locations of the three artifacts of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
    pub neighbors: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILE),
            metadata: dir.join(METADATA_FILE),
            neighbors: dir.join(NEIGHBORS_FILE),
        }
    }
}

fn persist_err(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::Persist {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn load_err(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::Load {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// A fully written temporary file next to its destination, not yet renamed
/// into place. Dropping it removes the temporary file.
struct Staged {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl Staged {
    fn new(path: &Path) -> Result<Self, PipelineError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|e| persist_err(path, e))?;
        Ok(Self {
            tmp,
            path: path.to_path_buf(),
        })
    }

    fn json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Self, PipelineError> {
        let mut staged = Self::new(path)?;
        serde_json::to_writer_pretty(&mut staged.tmp, value).map_err(|e| persist_err(path, e))?;
        staged.tmp.write_all(b"\n").map_err(|e| persist_err(path, e))?;
        staged.sync()?;
        Ok(staged)
    }

    fn index(path: &Path, index: &Forest) -> Result<Self, PipelineError> {
        let mut staged = Self::new(path)?;
        save_forest(index, staged.tmp.as_file_mut()).map_err(|e| persist_err(path, e))?;
        staged.sync()?;
        Ok(staged)
    }

    fn sync(&self) -> Result<(), PipelineError> {
        self.tmp
            .as_file()
            .sync_all()
            .map_err(|e| persist_err(&self.path, e))
    }

    fn persist(self) -> Result<(), PipelineError> {
        let path = self.path;
        self.tmp
            .persist(&path)
            .map_err(|e| persist_err(&path, e.error))?;
        Ok(())
    }
}

/// Writes `value` as pretty UTF-8 JSON. The file is written next to its
/// destination and renamed into place, so readers never see a partial file.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), PipelineError> {
    Staged::json(path.as_ref(), value)?.persist()
}

/// Writes the index, metadata and neighbor list. All three are fully written
/// to temporary files before any of them replaces an existing artifact, so a
/// failed write leaves the previous set untouched.
pub fn write_artifacts(
    paths: &ArtifactPaths,
    index: &Forest,
    items: &[ItemRecord],
    neighbors: &NeighborList,
) -> Result<(), PipelineError> {
    let staged_index = Staged::index(&paths.index, index)?;
    let staged_metadata = Staged::json(&paths.metadata, items)?;
    let staged_neighbors = Staged::json(&paths.neighbors, neighbors)?;

    staged_index.persist()?;
    tracing::info!(path = %paths.index.display(), "saved index");
    staged_metadata.persist()?;
    tracing::info!(path = %paths.metadata.display(), items = items.len(), "saved metadata");
    staged_neighbors.persist()?;
    tracing::info!(path = %paths.neighbors.display(), "saved neighbor lists");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let data = std::fs::read(path).map_err(|e| load_err(path, e))?;
    serde_json::from_slice(&data).map_err(|e| load_err(path, e))
}

pub fn load_metadata(path: impl AsRef<Path>) -> Result<Vec<ItemRecord>, PipelineError> {
    read_json(path.as_ref())
}

pub fn load_neighbors(path: impl AsRef<Path>) -> Result<NeighborList, PipelineError> {
    read_json(path.as_ref())
}

pub fn load_index(path: impl AsRef<Path>) -> Result<Forest, PipelineError> {
    let path = path.as_ref();
    Forest::load(path).map_err(|e| load_err(path, e))
}
