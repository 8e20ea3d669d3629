//! The content-addressed cache directory: one file per commitment digest,
//! fanned out by hex prefix so no directory holds more entries than a
//! filesystem is comfortable with.
//!
//! Layout rooted at `self.root`:
//!   version                     -- contains "1.0\n"
//!   ab/cd/ef/01/abcdef01...      -- serialized sub-timestamp for commitment
//!                                   `abcdef01...`, keyed by its first four
//!                                   hex nibbles
//!
//! Writes go through a temp file in the same directory, then an atomic
//! rename, so a crash mid-write never leaves a half-written entry visible.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ots_core::ser::Reader;
use ots_core::timestamp::Timestamp;
use ots_core::upgrade::Cache;
use tracing::warn;

const VERSION_CONTENTS: &str = "1.0\n";

/// Commitments longer than this can't have been produced by any hash op
/// this crate knows about; treated as an unconditional cache miss rather
/// than an error, since [`Cache::get`]/[`Cache::put`] can't fail.
const MAX_COMMITMENT_LEN: usize = 64;

/// A filesystem-backed [`Cache`].
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Opens (creating if necessary) a cache directory at `root`, stamping
    /// it with a `version` file on first use.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let version_path = root.join("version");
        if !version_path.exists() {
            atomic_write(&root, &version_path, VERSION_CONTENTS.as_bytes())?;
        }
        Ok(FileCache { root })
    }

    fn entry_path(&self, commitment: &[u8]) -> Option<PathBuf> {
        if commitment.is_empty() || commitment.len() > MAX_COMMITMENT_LEN {
            return None;
        }
        let hex = hex::encode(commitment);
        let bytes: Vec<char> = hex.chars().collect();
        let mut path = self.root.clone();
        for chunk in bytes.chunks(1).take(4) {
            path.push(chunk.iter().collect::<String>());
        }
        path.push(&hex);
        Some(path)
    }
}

impl Cache for FileCache {
    fn get(&self, commitment: &[u8]) -> Option<Timestamp> {
        let path = self.entry_path(commitment)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache read failed");
                return None;
            }
        };
        let mut cursor: &[u8] = &bytes;
        let mut r = Reader::new(&mut cursor);
        match Timestamp::deserialize(&mut r, commitment.to_vec()) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry failed to parse");
                None
            }
        }
    }

    fn put(&mut self, commitment: &[u8], timestamp: &Timestamp) {
        let Some(path) = self.entry_path(commitment) else {
            return;
        };
        let bytes = match ots_core::ser::to_vec(|w| timestamp.serialize(w)) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "refusing to cache an unserializable timestamp");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "cache directory creation failed");
                return;
            }
        }
        if let Err(e) = atomic_write(path.parent().unwrap_or(&self.root), &path, &bytes) {
            warn!(path = %path.display(), error = %e, "cache write failed");
        }
    }
}

fn atomic_write(dir: &Path, dest: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    io::Write::write_all(&mut tmp, contents)?;
    tmp.persist(dest)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ots_core::notary::Attestation;

    #[test]
    fn miss_on_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        assert!(cache.get(&[0x11; 32]).is_none());
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();
        let commitment = vec![0xabu8; 32];
        let mut ts = Timestamp::new(commitment.clone());
        ts.add_attestation(Attestation::BitcoinBlockHeader { height: 42 });

        cache.put(&commitment, &ts);
        let fetched = cache.get(&commitment).unwrap();
        assert_eq!(fetched, ts);
    }

    #[test]
    fn version_file_is_written_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let _cache = FileCache::open(dir.path()).unwrap();
        let contents = fs::read_to_string(dir.path().join("version")).unwrap();
        assert_eq!(contents, "1.0\n");
    }

    #[test]
    fn oversized_commitment_is_an_unconditional_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();
        let huge = vec![0x01u8; MAX_COMMITMENT_LEN + 1];
        let ts = Timestamp::new(huge.clone());
        cache.put(&huge, &ts);
        assert!(cache.get(&huge).is_none());
    }

    #[test]
    fn fan_out_uses_four_levels_of_single_hex_nibbles() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let commitment = vec![0xabu8; 32];
        let path = cache.entry_path(&commitment).unwrap();
        let rel = path.strip_prefix(dir.path()).unwrap();
        let components: Vec<_> = rel.components().collect();
        assert_eq!(components.len(), 5);
    }
}
