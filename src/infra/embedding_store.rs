// ============================================================
// Layer 6 — Embedding Store (aligner + on-disk cache)
// ============================================================
// Produces the embedding matrix for a vocabulary, reusing a
// cached copy when one is available.
//
// Two cache modes:
//
//   ContentAddressed (default)
//     The artifact name carries a key derived from:
//       - every (token, id) pair of the vocabulary
//       - the embedding file path, size and mtime
//       - the vector dimension
//     The full key is also stored in the header and checked on
//     load, so a changed vocabulary or source can never reuse
//     a stale matrix. After a new artifact is written, older
//     `<stem>-<key>.<ext>` siblings are removed, so only the
//     latest key stays on disk.
//
//   Fixed
//     One artifact at exactly `cache_path`. If it exists it is
//     returned as-is, without looking at the vocabulary or the
//     embedding file. Delete it by hand after changing either.
//     A row count that no longer matches the vocabulary is
//     logged as a warning.
//
// Artifact layout:
//   magic "TCEM" (4) | version (1) | key_len u32 LE (4) | key
//   | bincode(EmbeddingMatrix) | xxh64 of everything before (8)
//
// An unreadable or corrupt artifact is logged and rebuilt; it
// never fails the run. Writes go to a temp file first and are
// renamed into place.
//
// Reference: Rust Book §9 (Error Handling)

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::UNIX_EPOCH,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data::embeddings::{align_embeddings, read_embedding_table, EmbeddingMatrix};
use crate::data::tokenizer::Vocabulary;
use crate::domain::errors::{PipelineError, PipelineResult};

const CACHE_MAGIC: [u8; 4] = *b"TCEM";
const CACHE_VERSION: u8 = 1;
// magic + version + key_len + checksum
const MIN_ARTIFACT_LEN: usize = 4 + 1 + 4 + 8;
const KEY_PREFIX_LEN: usize = 16;

/// How the cache artifact is located and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    ContentAddressed,
    Fixed,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content-addressed" => Ok(CacheMode::ContentAddressed),
            "fixed"             => Ok(CacheMode::Fixed),
            other => Err(format!("unknown cache mode '{other}' (expected content-addressed or fixed)")),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::ContentAddressed => f.write_str("content-addressed"),
            CacheMode::Fixed            => f.write_str("fixed"),
        }
    }
}

/// Result of looking for a cached matrix.
#[derive(Debug)]
enum CacheLookup {
    Hit(EmbeddingMatrix),
    Miss,
}

// ─── EmbeddingAligner ─────────────────────────────────────────────────────────
pub struct EmbeddingAligner {
    cache_path: PathBuf,
    mode:       CacheMode,
    dim:        usize,
}

impl EmbeddingAligner {
    pub fn new(cache_path: impl Into<PathBuf>, mode: CacheMode, dim: usize) -> Self {
        Self { cache_path: cache_path.into(), mode, dim }
    }

    /// Return the matrix for `vocabulary`, from cache when possible.
    pub fn load_or_build(
        &self,
        vocabulary:     &Vocabulary,
        embedding_path: &Path,
    ) -> PipelineResult<EmbeddingMatrix> {
        let (artifact, key) = match self.mode {
            CacheMode::Fixed => (self.cache_path.clone(), String::new()),
            CacheMode::ContentAddressed => {
                let key = cache_key(vocabulary, embedding_path, self.dim)?;
                (self.keyed_path(&key), key)
            }
        };

        match self.lookup(&artifact, &key) {
            Ok(CacheLookup::Hit(matrix)) => {
                if matrix.rows() != vocabulary.len() + 1 || matrix.dim() != self.dim {
                    tracing::warn!(
                        "Cached embedding matrix '{}' is {}x{} but the vocabulary needs {}x{}; \
                         delete the cache to rebuild it",
                        artifact.display(),
                        matrix.rows(),
                        matrix.dim(),
                        vocabulary.len() + 1,
                        self.dim
                    );
                }
                tracing::info!(
                    "Loaded embedding matrix {}x{} from cache '{}'",
                    matrix.rows(),
                    matrix.dim(),
                    artifact.display()
                );
                return Ok(matrix);
            }
            Ok(CacheLookup::Miss) => {
                tracing::info!("No usable embedding cache at '{}', building", artifact.display());
            }
            Err(e) => {
                tracing::warn!("Ignoring embedding cache: {e}; rebuilding");
            }
        }

        let table  = read_embedding_table(embedding_path, self.dim, vocabulary)?;
        let matrix = align_embeddings(vocabulary, &table, self.dim);
        tracing::info!(
            "Built embedding matrix {}x{} ({} of {} tokens have vectors)",
            matrix.rows(),
            matrix.dim(),
            matrix.covered_rows(),
            vocabulary.len()
        );

        // The cache only saves time; failing to write it is not fatal
        match write_artifact(&artifact, &key, &matrix) {
            Ok(()) if self.mode == CacheMode::ContentAddressed => self.prune_stale(&artifact),
            Ok(()) => {}
            Err(e) => tracing::warn!("Could not write embedding cache: {e}"),
        }
        Ok(matrix)
    }

    /// Remove keyed artifacts for this cache path other than `keep`.
    fn prune_stale(&self, keep: &Path) {
        let Some(dir) = keep.parent() else { return };
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let Ok(entries) = fs::read_dir(dir) else { return };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.file_name() == keep.file_name() || !self.is_keyed_artifact(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed stale embedding cache '{}'", path.display()),
                Err(e) => tracing::warn!("Could not remove stale cache '{}': {e}", path.display()),
            }
        }
    }

    /// Whether `path` is named like [`Self::keyed_path`] output.
    fn is_keyed_artifact(&self, path: &Path) -> bool {
        let (stem, ext) = self.stem_and_ext();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
        name.strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(ext))
            .and_then(|rest| rest.strip_suffix('.'))
            .map_or(false, |key| {
                key.len() == KEY_PREFIX_LEN && key.chars().all(|c| c.is_ascii_hexdigit())
            })
    }

    fn stem_and_ext(&self) -> (&str, &str) {
        let stem = self
            .cache_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("embedding");
        let ext = self
            .cache_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        (stem, ext)
    }

    /// Artifact path for a content key: `<stem>-<key prefix>.<ext>`.
    fn keyed_path(&self, key: &str) -> PathBuf {
        let (stem, ext) = self.stem_and_ext();
        let short = &key[..KEY_PREFIX_LEN.min(key.len())];
        self.cache_path.with_file_name(format!("{stem}-{short}.{ext}"))
    }

    fn lookup(&self, artifact: &Path, key: &str) -> PipelineResult<CacheLookup> {
        if !artifact.exists() {
            return Ok(CacheLookup::Miss);
        }
        let (stored_key, matrix) = read_artifact(artifact)?;
        if self.mode == CacheMode::ContentAddressed && stored_key != key {
            tracing::warn!(
                "Embedding cache '{}' holds key {}, expected {}",
                artifact.display(),
                stored_key,
                key
            );
            return Ok(CacheLookup::Miss);
        }
        Ok(CacheLookup::Hit(matrix))
    }
}

// ─── Cache key ────────────────────────────────────────────────────────────────
/// SHA-256 over the vocabulary, source path, source size/mtime and dim.
pub fn cache_key(vocabulary: &Vocabulary, embedding_path: &Path, dim: usize) -> PipelineResult<String> {
    let meta = fs::metadata(embedding_path).map_err(|e| PipelineError::EmbeddingFile {
        path:   embedding_path.to_path_buf(),
        line:   None,
        reason: format!("cannot stat: {e}"),
    })?;
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    for (token, id) in vocabulary.iter() {
        hasher.update(token.as_bytes());
        hasher.update([0u8]);
        hasher.update(id.to_le_bytes());
    }
    hasher.update(embedding_path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(meta.len().to_le_bytes());
    hasher.update(modified.to_le_bytes());
    hasher.update((dim as u64).to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ─── Artifact I/O ─────────────────────────────────────────────────────────────
fn cache_error(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::CacheIo { path: path.to_path_buf(), reason: reason.into() }
}

pub fn write_artifact(path: &Path, key: &str, matrix: &EmbeddingMatrix) -> PipelineResult<()> {
    let payload = bincode::serialize(matrix)
        .map_err(|e| cache_error(path, format!("serialisation failed: {e}")))?;

    let mut data = Vec::with_capacity(MIN_ARTIFACT_LEN + key.len() + payload.len());
    data.extend_from_slice(&CACHE_MAGIC);
    data.push(CACHE_VERSION);
    data.extend_from_slice(&(key.len() as u32).to_le_bytes());
    data.extend_from_slice(key.as_bytes());
    data.extend_from_slice(&payload);

    let checksum = xxhash_rust::xxh64::xxh64(&data, 0);
    data.extend_from_slice(&checksum.to_le_bytes());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| cache_error(path, e.to_string()))?;
    }
    let temp = path.with_extension("tmp");
    fs::write(&temp, &data).map_err(|e| cache_error(path, format!("write failed: {e}")))?;
    fs::rename(&temp, path).map_err(|e| cache_error(path, format!("rename failed: {e}")))?;

    tracing::debug!("Wrote embedding cache '{}' ({} bytes)", path.display(), data.len());
    Ok(())
}

pub fn read_artifact(path: &Path) -> PipelineResult<(String, EmbeddingMatrix)> {
    let data = fs::read(path).map_err(|e| cache_error(path, format!("read failed: {e}")))?;
    if data.len() < MIN_ARTIFACT_LEN {
        return Err(cache_error(path, "file too small"));
    }

    let checksum_offset = data.len() - 8;
    let stored = u64::from_le_bytes(
        data[checksum_offset..]
            .try_into()
            .map_err(|_| cache_error(path, "invalid checksum bytes"))?,
    );
    let computed = xxhash_rust::xxh64::xxh64(&data[..checksum_offset], 0);
    if stored != computed {
        return Err(cache_error(
            path,
            format!("checksum mismatch: stored={stored:#x}, computed={computed:#x}"),
        ));
    }

    if data[0..4] != CACHE_MAGIC {
        return Err(cache_error(path, "invalid magic bytes"));
    }
    if data[4] != CACHE_VERSION {
        return Err(cache_error(
            path,
            format!("unsupported version {} (expected {})", data[4], CACHE_VERSION),
        ));
    }

    let key_len = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| cache_error(path, "invalid key length bytes"))?,
    ) as usize;
    let key_end = 9usize
        .checked_add(key_len)
        .filter(|&end| end <= checksum_offset)
        .ok_or_else(|| cache_error(path, "key length exceeds file size"))?;
    let key = std::str::from_utf8(&data[9..key_end])
        .map_err(|_| cache_error(path, "key is not UTF-8"))?
        .to_string();

    let matrix: EmbeddingMatrix = bincode::deserialize(&data[key_end..checksum_offset])
        .map_err(|e| cache_error(path, format!("deserialisation failed: {e}")))?;
    if !matrix.is_consistent() {
        return Err(cache_error(path, "matrix shape does not match its buffer"));
    }
    Ok((key, matrix))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn write_vectors(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("vectors.txt");
        fs::write(&path, body).unwrap();
        path
    }

    fn sample_matrix() -> EmbeddingMatrix {
        let mut m = EmbeddingMatrix::zeros(3, DIM);
        m.set_row(1, &[0.5, -1.25, 3.0, 1e-7]);
        m.set_row(2, &[f32::MAX, f32::MIN_POSITIVE, -0.0, 42.0]);
        m
    }

    #[test]
    fn test_artifact_round_trip_is_exact() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("embedding.bin");
        let m    = sample_matrix();
        write_artifact(&path, "abc", &m).unwrap();
        let (key, back) = read_artifact(&path).unwrap();
        assert_eq!(key, "abc");
        assert_eq!(back, m);
        assert_eq!(back.as_slice(), m.as_slice());
    }

    #[test]
    fn test_corrupt_artifact_is_cache_error() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("embedding.bin");
        write_artifact(&path, "", &sample_matrix()).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&path, bytes).unwrap();
        assert!(matches!(read_artifact(&path), Err(PipelineError::CacheIo { .. })));
    }

    #[test]
    fn test_missing_cache_builds_and_persists() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0\n");
        let cache   = dir.path().join("embedding.bin");
        let aligner = EmbeddingAligner::new(&cache, CacheMode::Fixed, DIM);

        let vocab  = Vocabulary::from_ordered(["cat", "dog"]);
        let matrix = aligner.load_or_build(&vocab, &vectors).unwrap();
        assert_eq!(matrix.row(2), &[1.0, 0.0, 0.0, 0.0]);
        assert!(cache.exists());
    }

    #[test]
    fn test_fixed_cache_is_reused_without_reading_source() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0\n");
        let cache   = dir.path().join("embedding.bin");
        let aligner = EmbeddingAligner::new(&cache, CacheMode::Fixed, DIM);

        let first = aligner.load_or_build(&Vocabulary::from_ordered(["dog"]), &vectors).unwrap();

        // A different vocabulary and a missing source still return the cached matrix
        fs::remove_file(&vectors).unwrap();
        let other  = Vocabulary::from_ordered(["a", "b", "c"]);
        let second = aligner.load_or_build(&other, &vectors).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.rows(), 2);
    }

    #[test]
    fn test_corrupt_cache_triggers_rebuild() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0\n");
        let cache   = dir.path().join("embedding.bin");
        fs::write(&cache, b"definitely not a cache").unwrap();

        let aligner = EmbeddingAligner::new(&cache, CacheMode::Fixed, DIM);
        let vocab   = Vocabulary::from_ordered(["dog"]);
        let matrix  = aligner.load_or_build(&vocab, &vectors).unwrap();
        assert_eq!(matrix.row(1), &[1.0, 0.0, 0.0, 0.0]);

        // The rebuild replaced the corrupt file with a readable artifact
        let (_, cached) = read_artifact(&cache).unwrap();
        assert_eq!(cached, matrix);
    }

    #[test]
    fn test_content_addressed_cache_follows_vocabulary() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0\ncat 0 1 0 0\n");
        let cache   = dir.path().join("embedding.bin");
        let aligner = EmbeddingAligner::new(&cache, CacheMode::ContentAddressed, DIM);

        let small = aligner.load_or_build(&Vocabulary::from_ordered(["dog"]), &vectors).unwrap();
        let large = aligner.load_or_build(&Vocabulary::from_ordered(["dog", "cat"]), &vectors).unwrap();
        assert_eq!(small.rows(), 2);
        assert_eq!(large.rows(), 3);
        assert_eq!(large.row(2), &[0.0, 1.0, 0.0, 0.0]);

        // Only the latest key is kept, nothing at the bare cache path
        assert_eq!(keyed_artifacts(&dir), 1);
        assert!(!cache.exists());

        // Unrelated files next to the cache are left alone
        assert!(vectors.exists());
    }

    fn keyed_artifacts(dir: &TempDir) -> usize {
        fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("embedding-"))
            .count()
    }

    #[test]
    fn test_malformed_source_fails_without_writing_cache() {
        for mode in [CacheMode::Fixed, CacheMode::ContentAddressed] {
            let dir     = TempDir::new().unwrap();
            let vectors = write_vectors(&dir, "dog 1 0 0 0
cat 1 0 oops 0
");
            let cache   = dir.path().join("embedding.bin");
            let aligner = EmbeddingAligner::new(&cache, mode, DIM);

            let result = aligner.load_or_build(&Vocabulary::from_ordered(["dog", "cat"]), &vectors);
            match result {
                Err(PipelineError::EmbeddingFile { line, .. }) => assert_eq!(line, Some(2)),
                other => panic!("expected an embedding file error in {mode} mode, got {other:?}"),
            }
            assert!(!cache.exists());
            assert_eq!(keyed_artifacts(&dir), 0);
        }
    }

    #[test]
    fn test_stale_fixed_cache_with_wrong_shape_is_still_returned() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0
");
        let cache   = dir.path().join("embedding.bin");
        write_artifact(&cache, "", &sample_matrix()).unwrap();

        let aligner = EmbeddingAligner::new(&cache, CacheMode::Fixed, DIM);
        let vocab   = Vocabulary::from_ordered(["a", "b", "c", "d", "e"]);
        let matrix  = aligner.load_or_build(&vocab, &vectors).unwrap();
        assert_eq!(matrix, sample_matrix());
        assert_ne!(matrix.rows(), vocab.len() + 1);
    }

    #[test]
    fn test_keyed_artifact_names() {
        let dir     = TempDir::new().unwrap();
        let aligner = EmbeddingAligner::new(dir.path().join("embedding.bin"), CacheMode::ContentAddressed, DIM);
        assert!(aligner.is_keyed_artifact(Path::new("embedding-0123456789abcdef.bin")));
        assert!(!aligner.is_keyed_artifact(Path::new("embedding-0123456789abcdef.txt")));
        assert!(!aligner.is_keyed_artifact(Path::new("embedding-notakey.bin")));
        assert!(!aligner.is_keyed_artifact(Path::new("embedding.bin")));
    }

    #[test]
    fn test_cache_key_depends_on_vocabulary_and_dim() {
        let dir     = TempDir::new().unwrap();
        let vectors = write_vectors(&dir, "dog 1 0 0 0\n");
        let a = cache_key(&Vocabulary::from_ordered(["dog"]), &vectors, DIM).unwrap();
        let b = cache_key(&Vocabulary::from_ordered(["dog"]), &vectors, DIM).unwrap();
        let c = cache_key(&Vocabulary::from_ordered(["cat"]), &vectors, DIM).unwrap();
        let d = cache_key(&Vocabulary::from_ordered(["dog"]), &vectors, DIM + 1).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }
}
