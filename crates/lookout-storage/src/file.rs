use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};

use crate::{validate_key, PostponeStorage, StorageError, StorageLimits};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

const ENTRY_SUFFIX: &str = ".entry";

/// One file per key under a directory shared by every process serving the
/// site. Writes go through a temp file and a rename; reads claim the entry by
/// renaming it away first, so only one reader can win.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    limits: StorageLimits,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, limits: StorageLimits) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, limits })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{digest}{ENTRY_SUFFIX}"))
    }

    fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified).unwrap_or(Duration::ZERO) >= self.limits.ttl
    }

    /// Removes expired entries, stale temp/claim files, and the oldest entries
    /// beyond `max_entries`. Returns the number of files removed.
    pub fn collect_garbage(&self) -> Result<usize, StorageError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut live = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(target: "lookout.storage", error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = match entry.metadata().and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                // Raced with a concurrent take or GC.
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            if name.ends_with(ENTRY_SUFFIX) && !self.is_expired(modified, now) {
                live.push((modified, entry.path()));
                continue;
            }
            let ours = name.ends_with(ENTRY_SUFFIX) || name.contains(".tmp.") || name.contains(".claim.");
            if ours && self.is_expired(modified, now) && remove_if_present(&entry.path())? {
                removed += 1;
            }
        }

        let max_entries = self.limits.max_entries.max(1);
        if live.len() > max_entries {
            live.sort();
            let excess = live.len() - max_entries;
            for (_, path) in live.into_iter().take(excess) {
                if remove_if_present(&path)? {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::debug!(target: "lookout.storage", removed, dir = %self.dir.display(), "collected postponed entries");
        }
        Ok(removed)
    }
}

impl PostponeStorage for FileStorage {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.entry_path(key);
        let (tmp_path, mut file) = open_unique_tmp_file(&path, &self.dir)?;

        let result = (|| -> io::Result<()> {
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);
            rename_overwrite(&tmp_path, &path)
        })();
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        if let Err(err) = self.collect_garbage() {
            tracing::warn!(target: "lookout.storage", error = %err, "postponed storage GC failed");
        }
        Ok(())
    }

    fn take_and_clear(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        let path = self.entry_path(key);
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut claim_name = path.file_name().unwrap_or_default().to_os_string();
        claim_name.push(format!(".claim.{}.{counter}", std::process::id()));
        let claim = self.dir.join(claim_name);

        match fs::rename(&path, &claim) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let result = (|| -> io::Result<(Vec<u8>, SystemTime)> {
            let modified = fs::metadata(&claim)?.modified()?;
            Ok((fs::read(&claim)?, modified))
        })();
        let _ = fs::remove_file(&claim);
        let (bytes, modified) = result?;

        if self.is_expired(modified, SystemTime::now()) {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn rename_overwrite(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 1024;
    let mut attempts = 0usize;

    loop {
        match fs::rename(tmp_path, dest) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists || dest.exists() => {
                // Windows `rename` does not replace; concurrent writers race on
                // the remove, so retry until this one lands.
                let _ = fs::remove_file(dest);
                attempts += 1;
                if attempts >= MAX_RENAME_ATTEMPTS {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn open_unique_tmp_file(dest: &Path, dir: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = dir.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
