//! Stored file references.

use serde::{Deserialize, Serialize};

use crate::wire::Attachment;

/// A file held by the object-storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    /// Public URL returned by storage
    pub url: String,
    /// File name as uploaded by the client
    pub original_name: String,
    /// MIME type (e.g., "image/jpeg", "application/pdf")
    pub mime_type: String,
}

impl FileRef {
    pub fn new(url: impl Into<String>, original_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn to_attachment(&self) -> Attachment {
        Attachment {
            url: Some(self.url.clone()),
            title: Some(self.original_name.clone()),
            content_type: Some(self.mime_type.clone()),
        }
    }

    pub fn from_attachment(attachment: &Attachment) -> Self {
        Self {
            url: attachment.url.clone().unwrap_or_default(),
            original_name: attachment.title.clone().unwrap_or_default(),
            mime_type: attachment.content_type.clone().unwrap_or_default(),
        }
    }
}
