//! Host filesystem contract
//!
//! Story content lives in read-only content storage; saved state lives in
//! writable user storage. Hosts expose both through [`StoryFs`], addressing
//! files by logical path: `content://...` for the content root, `user://...`
//! for the user root. How bare names are defaulted is the implementation's
//! policy; [`DiskFs`] sends them to the user root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix addressing the read-only content root.
pub const CONTENT_SCHEME: &str = "content://";

/// Prefix addressing the writable user root.
pub const USER_SCHEME: &str = "user://";

/// Synchronous host file access by logical path.
pub trait StoryFs {
    /// Read the full contents of a logical path
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Write bytes to a logical path in writable storage
    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Local-disk implementation with separate content and user roots.
pub struct DiskFs {
    content_root: PathBuf,
    user_root: PathBuf,
}

impl DiskFs {
    /// Create a filesystem over the given roots
    pub fn new(content_root: impl Into<PathBuf>, user_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            user_root: user_root.into(),
        }
    }

    fn resolve(&self, path: &str) -> (PathBuf, bool) {
        if let Some(rest) = path.strip_prefix(CONTENT_SCHEME) {
            (self.content_root.join(rest), false)
        } else if let Some(rest) = path.strip_prefix(USER_SCHEME) {
            (self.user_root.join(rest), true)
        } else {
            // Bare names default into writable user storage
            (self.user_root.join(path), true)
        }
    }
}

impl StoryFs for DiskFs {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let (resolved, _) = self.resolve(path);
        std::fs::read(resolved)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let (resolved, writable) = self.resolve(path);
        if !writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("content storage is read-only: {path}"),
            ));
        }
        if let Some(parent) = resolved.parent()
            && parent != Path::new("")
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(resolved, bytes)
    }
}

/// In-memory filesystem for tests and demos.
#[derive(Default)]
pub struct MemoryFs {
    files: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryFs {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a logical path, content and user schemes included
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(path.into(), bytes.into());
    }
}

impl StoryFs for MemoryFs {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("not found: {path}")))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        if path.starts_with(CONTENT_SCHEME) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("content storage is read-only: {path}"),
            ));
        }
        self.files
            .borrow_mut()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}
