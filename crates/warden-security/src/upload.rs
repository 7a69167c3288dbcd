//! File-upload validation
//!
//! Size ceiling, MIME allow-list, and dangerous-extension deny-list.
//! Returns every violation so the form layer can show them all at once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metadata of a file the client wants to upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Upload acceptance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum file size in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Accepted MIME types
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: HashSet<String>,

    /// File extensions rejected regardless of MIME type
    #[serde(default = "default_blocked_extensions")]
    pub blocked_extensions: HashSet<String>,
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_allowed_mime_types() -> HashSet<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "application/pdf",
        "text/csv",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_blocked_extensions() -> HashSet<String> {
    [
        "exe", "bat", "cmd", "com", "scr", "pif", "msi", "js", "jar", "vbs", "ps1", "sh", "php",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
            blocked_extensions: default_blocked_extensions(),
        }
    }
}

impl UploadPolicy {
    /// Validate a file against the policy, returning every violation.
    pub fn validate(&self, upload: &FileUpload) -> Vec<String> {
        let mut errors = Vec::new();

        if upload.size_bytes > self.max_bytes {
            errors.push(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_bytes
            ));
        }

        if !self.allowed_mime_types.contains(&upload.mime_type) {
            errors.push(format!("File type '{}' is not allowed", upload.mime_type));
        }

        if let Some(ext) = upload.name.rsplit('.').next() {
            if upload.name.contains('.') && self.blocked_extensions.contains(&ext.to_lowercase()) {
                errors.push(format!("File extension '.{}' is not allowed", ext));
            }
        }

        errors
    }
}
