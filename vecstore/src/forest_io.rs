use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::VecError;
use crate::forest::{Forest, IndexConfig, Node};
use crate::metric::Metric;

const FOREST_MAGIC: [u8; 4] = [b'R', b'P', b'F', b'T'];
const FOREST_VERSION: u32 = 1;

const NODE_LEAF: u8 = 0;
const NODE_SPLIT: u8 = 1;

/// Save serializes a built forest to a writer in a compact binary format:
///
/// ```text
/// [4B magic "RPFT"] [4B version=1]
/// [1B metric] [4B dim] [4B leafSize] [8B seed]
/// [4B numSlots] then for each slot:
///   [1B active flag] If active: [dim x 4B float32 vector]
/// [4B numNodes] then for each node:
///   [1B tag=0] [4B len] [len x 4B ids]                     leaf
///   [1B tag=1] [dim x 4B normal] [4B offset] [4B left] [4B right]   split
/// [4B numRoots] [numRoots x 4B node index]
/// ```
///
/// All multi-byte values are little-endian.
pub fn save(f: &Forest, w: &mut dyn Write) -> Result<(), VecError> {
    if !f.built {
        return Err(VecError::NotBuilt);
    }
    let mut bw = BufWriter::new(w);
    let write_err = |e: std::io::Error| VecError::Io(e.to_string());

    // Header.
    bw.write_all(&FOREST_MAGIC).map_err(write_err)?;
    bw.write_all(&FOREST_VERSION.to_le_bytes()).map_err(write_err)?;

    // Config.
    bw.write_all(&[f.cfg.metric.tag()]).map_err(write_err)?;
    bw.write_all(&(f.cfg.dim as u32).to_le_bytes()).map_err(write_err)?;
    bw.write_all(&(f.cfg.leaf_size as u32).to_le_bytes()).map_err(write_err)?;
    bw.write_all(&f.cfg.seed.to_le_bytes()).map_err(write_err)?;

    // Vectors.
    bw.write_all(&(f.slots.len() as u32).to_le_bytes()).map_err(write_err)?;
    for slot in &f.slots {
        match slot {
            None => bw.write_all(&[0u8]).map_err(write_err)?,
            Some(v) => {
                bw.write_all(&[1u8]).map_err(write_err)?;
                for &x in v {
                    bw.write_all(&x.to_le_bytes()).map_err(write_err)?;
                }
            }
        }
    }

    // Trees.
    bw.write_all(&(f.nodes.len() as u32).to_le_bytes()).map_err(write_err)?;
    for node in &f.nodes {
        match node {
            Node::Leaf(ids) => {
                bw.write_all(&[NODE_LEAF]).map_err(write_err)?;
                bw.write_all(&(ids.len() as u32).to_le_bytes()).map_err(write_err)?;
                for &id in ids {
                    bw.write_all(&id.to_le_bytes()).map_err(write_err)?;
                }
            }
            Node::Split {
                normal,
                offset,
                left,
                right,
            } => {
                bw.write_all(&[NODE_SPLIT]).map_err(write_err)?;
                for &x in normal {
                    bw.write_all(&x.to_le_bytes()).map_err(write_err)?;
                }
                bw.write_all(&offset.to_le_bytes()).map_err(write_err)?;
                bw.write_all(&left.to_le_bytes()).map_err(write_err)?;
                bw.write_all(&right.to_le_bytes()).map_err(write_err)?;
            }
        }
    }

    bw.write_all(&(f.roots.len() as u32).to_le_bytes()).map_err(write_err)?;
    for &r in &f.roots {
        bw.write_all(&r.to_le_bytes()).map_err(write_err)?;
    }

    bw.flush().map_err(write_err)?;
    Ok(())
}

struct Reader<'a> {
    br: BufReader<&'a mut dyn Read>,
}

impl Reader<'_> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], VecError> {
        let mut buf = [0u8; N];
        self.br
            .read_exact(&mut buf)
            .map_err(|e| VecError::Io(e.to_string()))?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, VecError> {
        Ok(self.bytes::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, VecError> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }

    fn u64(&mut self) -> Result<u64, VecError> {
        Ok(u64::from_le_bytes(self.bytes()?))
    }

    fn f32(&mut self) -> Result<f32, VecError> {
        Ok(f32::from_le_bytes(self.bytes()?))
    }

    fn vector(&mut self, dim: usize) -> Result<Vec<f32>, VecError> {
        (0..dim).map(|_| self.f32()).collect()
    }
}

/// Load deserializes a forest written by [`save`]. The result is built and
/// ready for queries; further inserts are rejected.
///
/// Every stored reference (leaf ids, child and root indexes) is checked
/// against the file's own tables.
pub fn load(r: &mut dyn Read) -> Result<Forest, VecError> {
    let mut rd = Reader {
        br: BufReader::new(r),
    };

    // Magic.
    let magic: [u8; 4] = rd.bytes()?;
    if magic != FOREST_MAGIC {
        return Err(VecError::InvalidFormat(format!("invalid magic {magic:?}")));
    }

    // Version.
    let version = rd.u32()?;
    if version != FOREST_VERSION {
        return Err(VecError::InvalidFormat(format!(
            "unsupported version {version} (want {FOREST_VERSION})"
        )));
    }

    // Config.
    let tag = rd.u8()?;
    let metric = Metric::from_tag(tag)
        .ok_or_else(|| VecError::InvalidFormat(format!("unknown metric tag {tag}")))?;
    let dim = rd.u32()? as usize;
    if dim == 0 {
        return Err(VecError::InvalidFormat("invalid dimension 0".into()));
    }
    let leaf_size = rd.u32()? as usize;
    let seed = rd.u64()?;

    // Vectors.
    let num_slots = rd.u32()? as usize;
    let mut slots = Vec::with_capacity(num_slots);
    let mut count = 0;
    for _ in 0..num_slots {
        match rd.u8()? {
            0 => slots.push(None),
            1 => {
                slots.push(Some(rd.vector(dim)?));
                count += 1;
            }
            flag => {
                return Err(VecError::InvalidFormat(format!("invalid slot flag {flag}")));
            }
        }
    }

    // Trees.
    let num_nodes = rd.u32()? as usize;
    let check_node = |n: u32| -> Result<u32, VecError> {
        if n as usize >= num_nodes {
            return Err(VecError::InvalidFormat(format!(
                "node index {n} out of bounds (numNodes={num_nodes})"
            )));
        }
        Ok(n)
    };

    let check_child = |n: u32, parent: u32| -> Result<u32, VecError> {
        if n >= parent {
            return Err(VecError::InvalidFormat(format!(
                "node {parent} references child {n} that does not precede it"
            )));
        }
        Ok(n)
    };

    let mut nodes = Vec::with_capacity(num_nodes);
    for _ in 0..num_nodes {
        match rd.u8()? {
            NODE_LEAF => {
                let len = rd.u32()? as usize;
                let mut ids = Vec::with_capacity(len);
                for _ in 0..len {
                    let id = rd.u32()?;
                    if slots.get(id as usize).is_none_or(|s| s.is_none()) {
                        return Err(VecError::InvalidFormat(format!(
                            "leaf references missing item {id}"
                        )));
                    }
                    ids.push(id);
                }
                nodes.push(Node::Leaf(ids));
            }
            NODE_SPLIT => {
                let normal = rd.vector(dim)?;
                let offset = rd.f32()?;
                // Nodes are stored in post-order: children precede parents.
                let current = nodes.len() as u32;
                let left = check_child(rd.u32()?, current)?;
                let right = check_child(rd.u32()?, current)?;
                nodes.push(Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                });
            }
            tag => {
                return Err(VecError::InvalidFormat(format!("unknown node tag {tag}")));
            }
        }
    }

    let num_roots = rd.u32()? as usize;
    if num_roots == 0 {
        return Err(VecError::InvalidFormat("forest has no trees".into()));
    }
    let mut roots = Vec::with_capacity(num_roots);
    for _ in 0..num_roots {
        roots.push(check_node(rd.u32()?)?);
    }

    let cfg = IndexConfig::new(metric, dim)
        .with_forest_size(num_roots)
        .with_leaf_size(leaf_size)
        .with_seed(seed);
    let mut f = Forest::new(cfg)?;
    f.slots = slots;
    f.count = count;
    f.nodes = nodes;
    f.roots = roots;
    f.built = true;
    Ok(f)
}

impl Forest {
    /// Writes the built forest to `path`. The bytes go to a temporary file in
    /// the same directory which then replaces `path`, so an existing file is
    /// never left half-written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VecError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let io_err = |e: std::io::Error| VecError::Io(format!("{}: {e}", path.display()));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        save(self, tmp.as_file_mut())?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Reads a forest previously written with [`Forest::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Forest, VecError> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| VecError::Io(format!("{}: {e}", path.display())))?;
        load(&mut file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vecstore::VecIndex;

    fn new_test_forest(dim: usize) -> Forest {
        Forest::new(IndexConfig::new(Metric::Angular, dim).with_leaf_size(2)).unwrap()
    }

    fn sample_forest() -> Forest {
        let mut f = new_test_forest(4);
        f.insert(0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        f.insert(1, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        f.insert(3, &[0.0, 0.0, 1.0, 0.0]).unwrap();
        f.insert(4, &[0.7, 0.7, 0.0, 0.1]).unwrap();
        f.insert(5, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        f.build(3).unwrap();
        f
    }

    #[test]
    fn test_save_load() {
        let f = sample_forest();

        let mut buf = Vec::new();
        save(&f, &mut buf).unwrap();

        let f2 = load(&mut buf.as_slice()).unwrap();
        assert_eq!(f2.len(), f.len());
        assert_eq!(f2.n_trees(), 3);
        assert_eq!(f2.config().metric, Metric::Angular);
        assert!(f2.is_built());

        for id in [0, 1, 3, 4, 5] {
            assert_eq!(f.query(id, 5).unwrap(), f2.query(id, 5).unwrap());
        }
        assert!(matches!(f2.query(2, 1), Err(VecError::UnknownId(2))));
    }

    #[test]
    fn test_loaded_forest_rejects_insert() {
        let f = sample_forest();
        let mut buf = Vec::new();
        save(&f, &mut buf).unwrap();
        let mut f2 = load(&mut buf.as_slice()).unwrap();
        assert!(matches!(
            f2.insert(9, &[0.0, 0.0, 0.0, 1.0]),
            Err(VecError::InvalidState(_))
        ));
    }

    #[test]
    fn test_save_unbuilt() {
        let f = new_test_forest(4);
        let mut buf = Vec::new();
        assert!(matches!(save(&f, &mut buf), Err(VecError::NotBuilt)));
    }

    #[test]
    fn test_save_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.rpf");
        let f = sample_forest();
        f.save(&path).unwrap();
        // Overwrite in place.
        f.save(&path).unwrap();

        let f2 = Forest::load(&path).unwrap();
        assert_eq!(f.query(4, 3).unwrap(), f2.query(4, 3).unwrap());
        assert!(Forest::load(dir.path().join("missing.rpf")).is_err());
    }

    #[test]
    fn test_load_invalid_magic() {
        let bad = b"NOPE";
        assert!(matches!(
            load(&mut bad.as_slice()),
            Err(VecError::InvalidFormat(_))
        ));
    }

    fn header(buf: &mut Vec<u8>, dim: u32) {
        buf.extend_from_slice(&FOREST_MAGIC);
        buf.extend_from_slice(&FOREST_VERSION.to_le_bytes());
        buf.push(Metric::Angular.tag());
        buf.extend_from_slice(&dim.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&42u64.to_le_bytes());
        // One active slot.
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.push(1);
        for _ in 0..dim {
            buf.extend_from_slice(&1.0f32.to_le_bytes());
        }
    }

    fn split(buf: &mut Vec<u8>, dim: u32, left: u32, right: u32) {
        buf.push(NODE_SPLIT);
        for _ in 0..dim {
            buf.extend_from_slice(&0.0f32.to_le_bytes());
        }
        buf.extend_from_slice(&0.0f32.to_le_bytes());
        buf.extend_from_slice(&left.to_le_bytes());
        buf.extend_from_slice(&right.to_le_bytes());
    }

    #[test]
    fn test_load_rejects_self_referencing_split() {
        let mut buf = Vec::new();
        header(&mut buf, 2);
        buf.extend_from_slice(&1u32.to_le_bytes());
        split(&mut buf, 2, 0, 0);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            load(&mut buf.as_slice()),
            Err(VecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_rejects_forward_child() {
        let mut buf = Vec::new();
        header(&mut buf, 2);
        buf.extend_from_slice(&2u32.to_le_bytes());
        split(&mut buf, 2, 1, 1);
        buf.push(NODE_LEAF);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            load(&mut buf.as_slice()),
            Err(VecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_minimal_valid_file() {
        let mut buf = Vec::new();
        header(&mut buf, 2);
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.push(NODE_LEAF);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        split(&mut buf, 2, 0, 0);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());

        let f = load(&mut buf.as_slice()).unwrap();
        assert_eq!(f.query(0, 1).unwrap()[0].id, 0);
    }

    #[test]
    fn test_load_truncated() {
        let f = sample_forest();
        let mut buf = Vec::new();
        save(&f, &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(load(&mut buf.as_slice()).is_err());
    }
}
