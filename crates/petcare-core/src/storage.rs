//! Object storage for record attachments.
//!
//! Uploads are all-or-nothing per operation: [`upload_all`] deletes every file
//! it already stored when a later upload fails.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use petcare_fhir::FileRef;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// A file submitted alongside a FHIR document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Where attachment bytes live.
pub trait ObjectStorage: Send + Sync {
    /// Store one file and describe where it went.
    fn upload(&self, upload: &Upload) -> Result<FileRef, StorageError>;

    /// Remove a stored file. Deleting a file that is already gone succeeds.
    fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Upload every file, or none of them.
pub fn upload_all(storage: &dyn ObjectStorage, uploads: &[Upload]) -> Result<Vec<FileRef>, StorageError> {
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match storage.upload(upload) {
            Ok(file) => stored.push(file),
            Err(e) => {
                warn!(file = %upload.file_name, error = %e, "upload failed, rolling back {} file(s)", stored.len());
                release_files(storage, &stored);
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Best-effort delete of stored files. Failures are logged and skipped.
pub fn release_files(storage: &dyn ObjectStorage, files: &[FileRef]) {
    for file in files {
        if let Err(e) = storage.delete(&file.url) {
            warn!(url = %file.url, error = %e, "failed to release stored file");
        }
    }
}

/// Stores files under a local directory and serves them as `{base_url}/files/{name}`.
///
/// File names are `{sha256 prefix}-{uuid}.{ext}`, so identical uploads never
/// overwrite one another.
pub struct DirectoryStorage {
    root: PathBuf,
    base_url: String,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_prefix(&self) -> String {
        format!("{}/files/", self.base_url)
    }

    fn stored_name(upload: &Upload) -> String {
        let digest = hex::encode(Sha256::digest(&upload.bytes));
        let stem = format!("{}-{}", &digest[..16], Uuid::new_v4().simple());
        match extension_of(&upload.file_name) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

impl ObjectStorage for DirectoryStorage {
    fn upload(&self, upload: &Upload) -> Result<FileRef, StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::Rejected(format!("'{}' is empty", upload.file_name)));
        }

        let name = Self::stored_name(upload);
        fs::write(self.root.join(&name), &upload.bytes)?;
        debug!(file = %upload.file_name, stored_as = %name, "stored attachment");

        Ok(FileRef::new(
            format!("{}{}", self.url_prefix(), name),
            upload.file_name.clone(),
            upload.mime_type.clone(),
        ))
    }

    fn delete(&self, url: &str) -> Result<(), StorageError> {
        let name = url
            .strip_prefix(&self.url_prefix())
            .filter(|n| !n.is_empty() && !n.contains('/') && !n.contains(".."))
            .ok_or_else(|| StorageError::Rejected(format!("'{url}' is not a stored file")))?;

        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
