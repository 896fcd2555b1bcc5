use crate::error::{Error, Result};
use crate::peers;
use crate::types::Endpoint;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Node configuration file on disk. Every operation re-reads the file; nothing
/// is cached between calls.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Configured peers. An unreadable file is reported as having none.
    pub fn read_peers(&self) -> Vec<Endpoint> {
        match fs::read_to_string(&self.path) {
            Ok(text) => peers::read_peers(&text),
            Err(e) => {
                warn!("Cannot read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Adds `new_peers` to the file, returning whether the text changed.
    pub fn add_peers(&self, new_peers: &[Endpoint]) -> Result<bool> {
        self.update(|text| peers::add_peers(text, new_peers))
    }

    /// Removes `to_remove` from the file, returning whether the text changed.
    pub fn remove_peers(&self, to_remove: &[Endpoint]) -> Result<bool> {
        self.update(|text| peers::remove_peers(text, to_remove))
    }

    fn update(&self, edit: impl FnOnce(&str) -> String) -> Result<bool> {
        let text = fs::read_to_string(&self.path).map_err(|source| Error::ConfigRead {
            path: self.path.clone(),
            source,
        })?;
        let updated = edit(&text);
        if updated == text {
            debug!("{} already up to date", self.path.display());
            return Ok(false);
        }
        self.write(&updated)?;
        info!("Updated {}", self.path.display());
        Ok(true)
    }

    /// Replaces the file through a synced temporary file in the same directory,
    /// keeping the original permissions.
    fn write(&self, text: &str) -> Result<()> {
        let write_err = |source| Error::ConfigWrite {
            path: self.path.clone(),
            source,
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));

        let result = (|| {
            let mut f = File::create(&tmp_path)?;
            f.write_all(text.as_bytes())?;
            f.sync_all()?;
            if let Ok(meta) = fs::metadata(&self.path) {
                fs::set_permissions(&tmp_path, meta.permissions())?;
            }
            fs::rename(&tmp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result.map_err(write_err)
    }
}
