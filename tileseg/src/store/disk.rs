//! File-system artifact store.
//!
//! File format (one file per artifact, named `tile_{row}_{col}_{STAGE}.bin`):
//! - header: three little-endian `u64` values `[MAGIC, width, height]`
//! - body: `width * height` little-endian `u32` labels in row-major order
//!
//! Any artifact found
//! in the directory when the store is opened belongs to an aborted run and is deleted.

use std::fs::{self, File};
use std::io::Write;
use std::mem::size_of;
use std::path::{Path, PathBuf};

use common::Buffer2;
use hashbrown::HashSet;
use parking_lot::Mutex;

use super::{Stage, TileKey, TileStore};
use crate::error::Error;

const MAGIC: u64 = u64::from_le_bytes(*b"TSLABEL1");
const HEADER_LEN: usize = 3 * size_of::<u64>();

/// Artifact store backed by a temporary directory.
#[derive(Debug)]
pub struct DiskTileStore {
    dir: PathBuf,
    /// The directory did not exist before this store created it.
    created_dir: bool,
    written: Mutex<HashSet<TileKey>>,
}

impl DiskTileStore {
    /// Open (creating if needed) `dir` and delete stale artifacts left there.
    pub fn open(dir: &Path) -> Result<Self, Error> {
        let created_dir = !dir.exists();
        fs::create_dir_all(dir).map_err(|source| Error::CreateTempDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if created_dir {
            tracing::info!(dir = %dir.display(), "Created temporary directory");
        } else {
            remove_stale_artifacts(dir)?;
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            created_dir,
            written: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn created_dir(&self) -> bool {
        self.created_dir
    }

    pub fn path_for(&self, key: TileKey) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

impl TileStore for DiskTileStore {
    fn write(&self, key: TileKey, labels: &Buffer2<u32>) -> Result<(), Error> {
        let path = self.path_for(key);
        let header = [MAGIC, labels.width() as u64, labels.height() as u64].map(u64::to_le);
        let body: Vec<u32> = labels.iter().map(|l| l.to_le()).collect();

        let write_err = |source: std::io::Error| Error::WriteArtifact {
            path: path.clone(),
            source,
        };
        let mut file = File::create(&path).map_err(write_err)?;
        file.write_all(bytemuck::cast_slice(&header[..]))
            .map_err(write_err)?;
        file.write_all(bytemuck::cast_slice(&body))
            .map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        self.written.lock().insert(key);
        Ok(())
    }

    fn read(&self, key: TileKey) -> Result<Buffer2<u32>, Error> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::MissingArtifact { key }
            } else {
                Error::ReadArtifact {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        decode(&path, &bytes)
    }

    fn remove(&self, key: TileKey) -> Result<(), Error> {
        let path = self.path_for(key);
        fs::remove_file(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::MissingArtifact { key }
            } else {
                Error::RemoveArtifact {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        self.written.lock().remove(&key);
        Ok(())
    }

    fn contains(&self, key: TileKey) -> bool {
        self.written.lock().contains(&key)
    }

    fn keys(&self) -> Vec<TileKey> {
        let mut keys: Vec<TileKey> = self.written.lock().iter().copied().collect();
        keys.sort();
        keys
    }

    /// Remove all artifacts, then the directory itself if this store created it.
    fn cleanup(&self) -> Result<(), Error> {
        for key in self.keys() {
            self.remove(key)?;
        }
        if self.created_dir {
            tracing::info!(
                dir = %self.dir.display(),
                "Removing temporary directory created by this run"
            );
            fs::remove_dir(&self.dir).map_err(|source| Error::RemoveArtifact {
                path: self.dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn file_name(key: TileKey) -> String {
    format!("tile_{}_{}_{}.bin", key.row, key.col, key.stage.tag())
}

/// Parse `tile_{row}_{col}_{STAGE}.bin`.
fn parse_file_name(name: &str) -> Option<TileKey> {
    let stem = name.strip_prefix("tile_")?.strip_suffix(".bin")?;
    let mut parts = stem.splitn(3, '_');
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    let stage = Stage::from_tag(parts.next()?)?;
    Some(TileKey::new(row, col, stage))
}

fn remove_stale_artifacts(dir: &Path) -> Result<(), Error> {
    let entries = fs::read_dir(dir).map_err(|source| Error::ReadArtifact {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut removed = 0usize;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(key) = name.to_str().and_then(parse_file_name) else {
            continue;
        };
        let path = entry.path();
        fs::remove_file(&path).map_err(|source| Error::RemoveArtifact {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(%key, "Removed stale artifact");
        removed += 1;
    }

    if removed > 0 {
        tracing::warn!(
            dir = %dir.display(),
            removed,
            "Removed artifacts left by an aborted run"
        );
    }
    Ok(())
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Buffer2<u32>, Error> {
    let corrupt = |reason: String| Error::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
    }
    let header: Vec<u64> = bytemuck::pod_collect_to_vec::<u8, u64>(&bytes[..HEADER_LEN])
        .into_iter()
        .map(u64::from_le)
        .collect();
    if header[0] != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    let width = header[1] as usize;
    let height = header[2] as usize;

    let body = &bytes[HEADER_LEN..];
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(size_of::<u32>()))
        .ok_or_else(|| corrupt(format!("dimensions {width}x{height} overflow")))?;
    if body.len() != expected {
        return Err(corrupt(format!(
            "expected {expected} label bytes for {width}x{height}, found {}",
            body.len()
        )));
    }

    let labels = bytemuck::pod_collect_to_vec::<u8, u32>(body)
        .into_iter()
        .map(u32::from_le)
        .collect();
    Ok(Buffer2::new(width, height, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = DiskTileStore::open(tmp.path()).unwrap();
        let key = TileKey::new(1, 2, Stage::Segmented);
        let tile = Buffer2::new(3, 2, vec![0, 5, 5, 7, 0, 4_000_000_000]);

        store.write(key, &tile).unwrap();
        assert!(store.path_for(key).exists());
        assert_eq!(store.read(key).unwrap(), tile);
        assert_eq!(store.keys(), vec![key]);
    }

    #[test]
    fn test_file_layout_is_little_endian() {
        let tmp = TempDir::new().unwrap();
        let store = DiskTileStore::open(tmp.path()).unwrap();
        let key = TileKey::new(0, 0, Stage::Final);
        store
            .write(key, &Buffer2::new(2, 1, vec![1, 0x0102_0304]))
            .unwrap();

        let bytes = fs::read(store.path_for(key)).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 8);
        assert_eq!(&bytes[..8], b"TSLABEL1");
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &1u64.to_le_bytes());
        assert_eq!(&bytes[HEADER_LEN..], &[1, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_file_name_parsing() {
        let key = TileKey::new(12, 3, Stage::Relabeled);
        assert_eq!(file_name(key), "tile_12_3_RELAB.bin");
        assert_eq!(parse_file_name("tile_12_3_RELAB.bin"), Some(key));
        assert_eq!(parse_file_name("tile_1_x_SEG.bin"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
    }

    #[test]
    fn test_remove_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let store = DiskTileStore::open(tmp.path()).unwrap();
        let key = TileKey::new(0, 0, Stage::Final);
        store.write(key, &Buffer2::new_filled(2, 2, 1u32)).unwrap();

        store.remove(key).unwrap();
        assert!(!store.path_for(key).exists());
        assert!(!store.contains(key));
        assert!(matches!(
            store.read(key),
            Err(Error::MissingArtifact { .. })
        ));
    }

    #[test]
    fn test_open_deletes_stale_artifacts_but_not_other_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("tile_0_0_SEG.bin"), b"leftover").unwrap();
        fs::write(tmp.path().join("readme.txt"), b"keep me").unwrap();

        let store = DiskTileStore::open(tmp.path()).unwrap();
        assert!(!tmp.path().join("tile_0_0_SEG.bin").exists());
        assert!(tmp.path().join("readme.txt").exists());
        assert!(store.keys().is_empty());
        assert!(!store.created_dir());
    }

    #[test]
    fn test_corrupt_artifact_detected() {
        let tmp = TempDir::new().unwrap();
        let store = DiskTileStore::open(tmp.path()).unwrap();
        let key = TileKey::new(0, 0, Stage::Segmented);
        store.write(key, &Buffer2::new_filled(4, 4, 9u32)).unwrap();

        // Truncate the label body.
        let path = store.path_for(key);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let err = store.read(key).unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { .. }));
        assert!(err.to_string().contains("expected 64 label bytes"));
    }

    #[test]
    fn test_cleanup_removes_created_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("run");
        let store = DiskTileStore::open(&dir).unwrap();
        assert!(store.created_dir());
        store
            .write(TileKey::new(0, 0, Stage::Final), &Buffer2::new_filled(1, 1, 1u32))
            .unwrap();

        store.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_keeps_preexisting_directory() {
        let tmp = TempDir::new().unwrap();
        let store = DiskTileStore::open(tmp.path()).unwrap();
        store
            .write(TileKey::new(0, 0, Stage::Final), &Buffer2::new_filled(1, 1, 1u32))
            .unwrap();

        store.cleanup().unwrap();
        assert!(tmp.path().exists());
        assert!(store.keys().is_empty());
    }
}
