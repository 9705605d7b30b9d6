//! File-content collaborator used by the scanner

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supplies the decoded text of a file identified by its label
pub trait FileReader: Send + Sync {
    fn read_text(&self, label: &str) -> io::Result<String>;
}

/// Reads labels from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsFileReader {
    root: Option<PathBuf>,
}

impl FsFileReader {
    /// Resolve labels relative to the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative labels against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, label: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(label),
            None => Path::new(label).to_path_buf(),
        }
    }
}

impl FileReader for FsFileReader {
    /// Non-UTF-8 content fails with `ErrorKind::InvalidData`
    fn read_text(&self, label: &str) -> io::Result<String> {
        fs::read_to_string(self.resolve(label))
    }
}
