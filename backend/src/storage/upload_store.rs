use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::filename::{allowed_extension, secure_filename};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No file selected")]
    EmptyFilename,
    #[error("Unsupported file type: {0}")]
    InvalidFormat(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat directory of uploaded scans, addressed by sanitised filename.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_size: usize) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_size })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Checks the client filename and returns the name the upload will be
    /// stored under.
    pub fn accept_filename(filename: &str) -> Result<String, StorageError> {
        if filename.is_empty() {
            return Err(StorageError::EmptyFilename);
        }
        if allowed_extension(filename).is_none() {
            return Err(StorageError::InvalidFormat(filename.to_string()));
        }
        let safe = secure_filename(filename);
        if safe.is_empty() || allowed_extension(&safe).is_none() {
            return Err(StorageError::InvalidFormat(filename.to_string()));
        }
        Ok(safe)
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), StorageError> {
        if image_data.len() > self.max_size {
            return Err(StorageError::FileTooLarge);
        }
        Ok(())
    }

    /// Writes `image_data` under `filename`, replacing any earlier upload of the same name.
    pub fn save(&self, filename: &str, image_data: &[u8]) -> Result<PathBuf, StorageError> {
        self.validate_image_size(image_data)?;
        let path = self.path_for(filename);
        fs::write(&path, image_data)?;
        Ok(path)
    }

    pub fn read(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path_for(filename)).map_err(|e| self.map_missing(filename, e))
    }

    pub fn delete(&self, filename: &str) -> Result<(), StorageError> {
        fs::remove_file(self.path_for(filename)).map_err(|e| self.map_missing(filename, e))
    }

    #[cfg(test)]
    pub fn exists(&self, filename: &str) -> bool {
        self.path_for(filename).is_file()
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(secure_filename(filename))
    }

    fn map_missing(&self, filename: &str, err: std::io::Error) -> StorageError {
        if err.kind() == ErrorKind::NotFound {
            StorageError::NotFound(filename.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}
