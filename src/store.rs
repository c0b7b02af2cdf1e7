use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::{BaseDirs, UserDirs};
use serde::Serialize;
use tempfile::Builder;

use crate::error::SoundrawError;

const APP_DIR: &str = "soundraw-browser";
const PART_PREFIX: &str = ".soundraw-";
const PART_SUFFIX: &str = ".part";

#[derive(Debug, Clone)]
pub struct Store {
    scratch_root: Utf8PathBuf,
    export_root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub removed_files: usize,
    pub removed_bytes: u64,
}

impl Store {
    pub fn new() -> Result<Self, SoundrawError> {
        let base = BaseDirs::new().ok_or_else(|| {
            SoundrawError::Filesystem("unable to resolve home directory".to_string())
        })?;
        let scratch_root = to_utf8(base.home_dir().join(".cache").join(APP_DIR).join("samples"))?;

        let downloads = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
            .unwrap_or_else(|| base.home_dir().join("Downloads"));
        let export_root = to_utf8(downloads.join("Soundraw"))?;

        Ok(Self {
            scratch_root,
            export_root,
        })
    }

    pub fn new_with_paths(scratch_root: Utf8PathBuf, export_root: Utf8PathBuf) -> Self {
        Self {
            scratch_root,
            export_root,
        }
    }

    pub fn scratch_root(&self) -> &Utf8Path {
        &self.scratch_root
    }

    pub fn export_root(&self) -> &Utf8Path {
        &self.export_root
    }

    pub fn ensure_scratch_root(&self) -> Result<(), SoundrawError> {
        ensure_dir(&self.scratch_root)
    }

    pub fn ensure_export_root(&self) -> Result<(), SoundrawError> {
        ensure_dir(&self.export_root)
    }

    pub fn clear_scratch(&self) -> Result<ClearResult, SoundrawError> {
        let mut result = ClearResult {
            removed_files: 0,
            removed_bytes: 0,
        };
        if !self.scratch_root.as_std_path().exists() {
            return Ok(result);
        }
        let entries = fs::read_dir(self.scratch_root.as_std_path())
            .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
            let metadata = entry
                .metadata()
                .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
            // `.part` files belong to downloads still being written.
            let in_progress = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(PART_SUFFIX));
            if !metadata.is_file() || in_progress {
                continue;
            }
            fs::remove_file(entry.path())
                .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
            result.removed_files += 1;
            result.removed_bytes += metadata.len();
        }
        Ok(result)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SoundrawError> {
        let parent = path
            .parent()
            .ok_or_else(|| SoundrawError::Filesystem("invalid destination path".to_string()))?;
        ensure_dir(parent)?;
        let mut temp = Builder::new()
            .prefix(PART_PREFIX)
            .suffix(PART_SUFFIX)
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SoundrawError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn remove_file_if_exists(path: &Utf8Path) -> Result<bool, SoundrawError> {
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(SoundrawError::Filesystem(format!("remove {path}: {err}"))),
        }
    }
}

pub(crate) fn app_config_dir() -> Result<Utf8PathBuf, SoundrawError> {
    let base = BaseDirs::new().ok_or_else(|| {
        SoundrawError::Filesystem("unable to resolve config directory".to_string())
    })?;
    to_utf8(base.config_dir().join(APP_DIR))
}

fn ensure_dir(path: &Utf8Path) -> Result<(), SoundrawError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| SoundrawError::Filesystem(format!("create {path}: {err}")))
}

fn to_utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, SoundrawError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| SoundrawError::Filesystem(format!("non-utf8 path {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("nested").join("a.m4a");

        Store::write_bytes_atomic(&path, b"first").unwrap();
        Store::write_bytes_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"second");
        let leftovers = std::fs::read_dir(root.join("nested").as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn remove_missing_file_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        assert!(!Store::remove_file_if_exists(&root.join("nope.m4a")).unwrap());
    }
}
