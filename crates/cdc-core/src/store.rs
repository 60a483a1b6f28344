//! Flat content-addressed cache directory.
//!
//! `<root>/<digest>` exists only once its bytes have been verified: downloads
//! land in a private `<digest>.<random>.part` temp file in the same directory
//! and are renamed into place by `commit_verified`. Presence is always asked of
//! the filesystem, so several processes can share one cache root.

use crate::checksum::Digest;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Suffix of in-progress download files inside the cache root.
pub const TEMP_SUFFIX: &str = ".part";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create cache directory {}: {source}", path.display())]
    CreateRoot { path: PathBuf, source: io::Error },
    #[error("failed to create temp file for {digest} in {}: {source}", root.display())]
    Temp {
        digest: Digest,
        root: PathBuf,
        source: io::Error,
    },
    #[error("failed to commit {digest} to {}: {source}", path.display())]
    Commit {
        digest: Digest,
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to check cache entry {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },
    #[error("failed to list cache directory {}: {source}", path.display())]
    List { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the cache directory at `root`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|source| StoreError::CreateRoot {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final cache location for `digest`. No I/O.
    pub fn path_for(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.as_str())
    }

    /// True iff a regular file is committed for `digest`. Only a missing entry
    /// is a miss; any other stat failure is an error. Advisory under
    /// concurrency: another writer may commit right after this returns false.
    pub fn has(&self, digest: &Digest) -> Result<bool, StoreError> {
        let path = self.path_for(digest);
        match fs::metadata(&path) {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Stat { path, source }),
        }
    }

    /// Create an empty private temp file for a download of `digest`.
    /// The file is removed when the returned guard is dropped uncommitted.
    pub fn temp_file(&self, digest: &Digest) -> Result<TempPath, StoreError> {
        tempfile::Builder::new()
            .prefix(&format!("{}.", digest))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map(|f| f.into_temp_path())
            .map_err(|source| StoreError::Temp {
                digest: digest.clone(),
                root: self.root.clone(),
                source,
            })
    }

    /// Atomically rename a verified temp file to `<root>/<digest>`.
    ///
    /// The caller must already have checked the temp file's digest. If another
    /// writer committed the same digest first, the rename replaces it with
    /// byte-identical content.
    pub fn commit_verified(&self, temp: TempPath, digest: &Digest) -> Result<PathBuf, StoreError> {
        let path = self.path_for(digest);
        temp.persist(&path).map_err(|e| StoreError::Commit {
            digest: digest.clone(),
            path: path.clone(),
            source: e.error,
        })?;
        tracing::debug!(%digest, path = %path.display(), "committed to cache");
        Ok(path)
    }

    /// Digests of all committed cache files, sorted. Temp files and foreign names are ignored.
    pub fn entries(&self) -> Result<Vec<Digest>, StoreError> {
        let list_err = |source| StoreError::List {
            path: self.root.clone(),
            source,
        };
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            if !entry.file_type().map_err(list_err)?.is_file() {
                continue;
            }
            if let Some(d) = entry.file_name().to_str().and_then(|n| Digest::parse(n).ok()) {
                out.push(d);
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(data: &[u8]) -> Digest {
        Digest::of_bytes(data)
    }

    #[test]
    fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/cache");
        let store = CacheStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root);
    }

    #[test]
    fn path_for_is_flat() {
        let store = CacheStore {
            root: PathBuf::from("/var/cache/cdc"),
        };
        let d = digest_of(b"x");
        assert_eq!(store.path_for(&d), Path::new("/var/cache/cdc").join(d.as_str()));
    }

    #[test]
    fn has_requires_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let d = digest_of(b"data");
        assert!(!store.has(&d).unwrap());
        fs::create_dir(store.path_for(&d)).unwrap();
        assert!(!store.has(&d).unwrap(), "a directory is not a cache hit");
        fs::remove_dir(store.path_for(&d)).unwrap();
        fs::write(store.path_for(&d), b"data").unwrap();
        assert!(store.has(&d).unwrap());
    }

    #[test]
    fn has_reports_stat_errors_other_than_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("cache");
        fs::write(&not_a_dir, b"").unwrap();
        let store = CacheStore { root: not_a_dir };
        let err = store.has(&digest_of(b"x")).unwrap_err();
        assert!(matches!(err, StoreError::Stat { .. }));
    }

    #[test]
    fn temp_files_are_private_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let d = digest_of(b"data");
        let t1 = store.temp_file(&d).unwrap();
        let t2 = store.temp_file(&d).unwrap();
        assert_ne!(t1.to_path_buf(), t2.to_path_buf());
        let name = t1.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(d.as_str()));
        assert!(name.ends_with(TEMP_SUFFIX));
        let p1 = t1.to_path_buf();
        drop(t1);
        assert!(!p1.exists());
        assert!(!store.has(&d).unwrap());
        drop(t2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn commit_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let d = digest_of(b"payload");
        let temp = store.temp_file(&d).unwrap();
        fs::write(&temp, b"payload").unwrap();
        let temp_name = temp.to_path_buf();
        let path = store.commit_verified(temp, &d).unwrap();
        assert_eq!(path, store.path_for(&d));
        assert!(!temp_name.exists());
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(store.has(&d).unwrap());
    }

    #[test]
    fn second_commit_of_same_digest_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let d = digest_of(b"same");
        for _ in 0..2 {
            let temp = store.temp_file(&d).unwrap();
            fs::write(&temp, b"same").unwrap();
            store.commit_verified(temp, &d).unwrap();
        }
        assert_eq!(store.entries().unwrap(), vec![d]);
    }

    #[test]
    fn commit_fails_when_root_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let store = CacheStore::open(&root).unwrap();
        let d = digest_of(b"gone");
        let outside = dir.path().join("outside.part");
        fs::write(&outside, b"gone").unwrap();
        fs::remove_dir_all(&root).unwrap();
        let err = store
            .commit_verified(TempPath::from_path(&outside), &d)
            .unwrap_err();
        assert!(matches!(err, StoreError::Commit { .. }));
        assert!(err.to_string().contains(d.as_str()));
    }

    #[test]
    fn entries_skip_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let a = digest_of(b"a");
        let b = digest_of(b"b");
        fs::write(store.path_for(&a), b"a").unwrap();
        fs::write(store.path_for(&b), b"b").unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();
        let _pending = store.temp_file(&a).unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.entries().unwrap(), expected);
    }
}
