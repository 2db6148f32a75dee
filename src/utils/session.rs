use crate::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Parent directory of all per-request working directories.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

/// One request's isolated working directory.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub dir: PathBuf,
}

impl SessionStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named session directory.
    pub fn create(&self) -> Result<Session> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        fs::create_dir(&dir)?;
        debug!("Created session directory {}", dir.display());
        Ok(Session { id, dir })
    }

    /// Locate a file produced by an earlier session. Only a well-formed
    /// session id and a bare file name are accepted; the file must exist.
    pub fn resolve(&self, sid: &str, file_name: &str) -> Option<PathBuf> {
        let id = Uuid::parse_str(sid).ok()?;
        if sanitize_file_name(file_name, "") != file_name {
            return None;
        }
        let path = self.root.join(id.to_string()).join(file_name);
        path.is_file().then_some(path)
    }
}

impl Session {
    /// Path inside the session for an uploaded file name.
    pub fn path_for(&self, upload_name: &str, fallback: &str) -> PathBuf {
        self.dir.join(sanitize_file_name(upload_name, fallback))
    }

    /// `"{sid}/{file_name}"`, the handle clients pass back for download.
    pub fn download_ref(&self, file_name: &str) -> String {
        format!("{}/{}", self.id, file_name)
    }
}

/// Reduce a client-supplied name to its last path component, dropping
/// control characters. Falls back when nothing usable is left.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let last = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
