use std::path::Path;

use crate::embed::{Embedder, ImageEmbedder};
use crate::error::EmbedError;

/// Default output size for text, matching small sentence-embedding models.
pub const HASH_TEXT_DIM: usize = 384;
/// Default output size for images, matching MobileNetV2 pooled features.
pub const HASH_IMAGE_DIM: usize = 1280;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const SHINGLE: usize = 4;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// HashEmbedder is a model-free embedder based on signed feature hashing.
///
/// Text is split into lowercase alphanumeric words and padded character
/// trigrams; image files are read as raw bytes and split into overlapping
/// 4-byte shingles. Each feature is hashed into one of `dim` buckets with a
/// hash-derived sign, and the result is L2-normalized.
///
/// Identical input always yields the identical vector. Texts sharing words
/// land close together; byte shingles only capture file-level similarity, so
/// image vectors stand in for a real feature extractor rather than replace it.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Panics if `dim` is zero.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "embed: HashEmbedder dim must be positive");
        Self { dim }
    }

    /// Embeds text synchronously. Text without any word, including the empty
    /// string, maps to the zero vector.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add(&mut v, fnv1a(word.as_bytes()), 1.0);

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for tri in padded.windows(3) {
                let s: String = tri.iter().collect();
                self.add(&mut v, fnv1a(s.as_bytes()), TRIGRAM_WEIGHT);
            }
        }
        normalize(&mut v);
        Ok(v)
    }

    /// Embeds raw file contents synchronously. Empty data is an error.
    pub fn embed_bytes(&self, data: &[u8]) -> Result<Vec<f32>, EmbedError> {
        if data.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let mut v = vec![0.0f32; self.dim];
        if data.len() < SHINGLE {
            self.add(&mut v, fnv1a(data), 1.0);
        } else {
            for w in data.windows(SHINGLE) {
                self.add(&mut v, fnv1a(w), 1.0);
            }
        }
        normalize(&mut v);
        Ok(v)
    }

    fn add(&self, v: &mut [f32], h: u64, weight: f32) {
        let h = mix(h);
        let bucket = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    data.iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// splitmix64 finalizer; spreads FNV's weak low bits.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= s;
        }
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_text(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        texts.iter().map(|t| self.embed_text(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[async_trait::async_trait]
impl ImageEmbedder for HashEmbedder {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let read_err = |reason: String| EmbedError::Read {
            path: path.display().to_string(),
            reason,
        };
        let data = tokio::fs::read(path).await.map_err(|e| read_err(e.to_string()))?;
        self.embed_bytes(&data).map_err(|e| match e {
            EmbedError::EmptyInput => read_err("empty file".into()),
            other => other,
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_text_deterministic() {
        let h = HashEmbedder::new(HASH_TEXT_DIM);
        let a = h.embed("hello").await.unwrap();
        let b = h.embed("hello").await.unwrap();
        assert_eq!(a.len(), HASH_TEXT_DIM);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_text_distinct() {
        let h = HashEmbedder::new(HASH_TEXT_DIM);
        let a = h.embed("first sentence").await.unwrap();
        let b = h.embed("something else entirely").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_text_similarity() {
        let h = HashEmbedder::new(HASH_TEXT_DIM);
        let cat = h.embed_text("a small grey cat").unwrap();
        let cats = h.embed_text("small grey cats").unwrap();
        let truck = h.embed_text("yellow fire truck").unwrap();
        assert!(cosine(&cat, &cats) > cosine(&cat, &truck));
    }

    #[test]
    fn test_unit_length() {
        let h = HashEmbedder::new(64);
        let v = h.embed_text("Unit Length please").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm {norm}");
    }

    #[tokio::test]
    async fn test_empty_text() {
        let h = HashEmbedder::new(16);
        assert_eq!(h.embed("").await.unwrap(), vec![0.0; 16]);
        assert_eq!(h.embed("  ").await.unwrap(), h.embed("").await.unwrap());
        assert!(matches!(h.embed_batch(&[]).await, Err(EmbedError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let h = HashEmbedder::new(32);
        let batch = h.embed_batch(&["one", "two"]).await.unwrap();
        assert_eq!(batch[0], h.embed("one").await.unwrap());
        assert_eq!(batch[1], h.embed("two").await.unwrap());
    }

    #[tokio::test]
    async fn test_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.JPEG");
        let b = dir.path().join("b.JPEG");
        std::fs::write(&a, b"\xff\xd8\xff\xe0 first image payload").unwrap();
        std::fs::write(&b, b"\xff\xd8\xff\xe0 second image payload!").unwrap();

        let h = HashEmbedder::new(HASH_IMAGE_DIM);
        let va = h.embed_image(&a).await.unwrap();
        assert_eq!(va.len(), HASH_IMAGE_DIM);
        assert_eq!(va, h.embed_image(&a).await.unwrap());
        assert_ne!(va, h.embed_image(&b).await.unwrap());

        let both = h.embed_images(&[a.as_path(), b.as_path()]).await.unwrap();
        assert_eq!(both[0], va);
    }

    #[tokio::test]
    async fn test_image_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.JPEG");
        std::fs::write(&empty, b"").unwrap();

        let h = HashEmbedder::new(8);
        assert!(matches!(
            h.embed_image(&empty).await,
            Err(EmbedError::Read { .. })
        ));
        assert!(matches!(
            h.embed_image(&dir.path().join("missing.JPEG")).await,
            Err(EmbedError::Read { .. })
        ));
    }
}
