//! Local-disk file uploads.
//!
//! Files are validated against a per-kind policy (mime allow-list + size
//! ceiling) before anything touches the database or the disk. Stored names
//! are generated; the client-supplied filename is never used.

use std::path::Path;

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub struct UploadPolicy {
    pub kind: &'static str,
    allowed: &'static [(&'static str, &'static str)],
    pub max_bytes: usize,
}

pub const RECEIPTS: UploadPolicy = UploadPolicy {
    kind: "receipts",
    allowed: &[("image/jpeg", "jpg"), ("image/png", "png"), ("application/pdf", "pdf")],
    max_bytes: 5 * 1024 * 1024,
};

pub const PRODUCT_IMAGES: UploadPolicy = UploadPolicy {
    kind: "products",
    allowed: &[("image/jpeg", "jpg"), ("image/png", "png"), ("image/webp", "webp")],
    max_bytes: 2 * 1024 * 1024,
};

pub const TICKET_ATTACHMENTS: UploadPolicy = UploadPolicy {
    kind: "tickets",
    allowed: &[("image/jpeg", "jpg"), ("image/png", "png"), ("application/pdf", "pdf")],
    max_bytes: 5 * 1024 * 1024,
};

const ALL_KINDS: &[&str] = &["receipts", "products", "tickets"];

impl UploadPolicy {
    /// Checks mime type and size, returning the extension to store under.
    pub fn check(&self, content_type: &str, size: usize) -> ApiResult<&'static str> {
        let ext = self
            .allowed
            .iter()
            .find(|(mime, _)| *mime == content_type)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| ApiError::bad_request(format!("unsupported file type: {content_type}")))?;
        if size > self.max_bytes {
            return Err(ApiError::bad_request(format!(
                "file too large: {size} bytes exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        if size == 0 {
            return Err(ApiError::bad_request("empty file"));
        }
        Ok(ext)
    }
}

/// Validates and writes an upload, returning its public serving path.
pub async fn store(
    root: &Path,
    policy: &UploadPolicy,
    content_type: &str,
    bytes: &[u8],
) -> ApiResult<String> {
    let ext = policy.check(content_type, bytes.len())?;
    let name = format!("{}.{ext}", Uuid::new_v4());
    let dir = root.join(policy.kind);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| anyhow::anyhow!("creating {}: {e}", dir.display()))?;
    let path = dir.join(&name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?;
    Ok(format!("/uploads/{}/{name}", policy.kind))
}

/// Creates the per-kind upload directories at startup.
pub async fn ensure_dirs(root: &Path) -> std::io::Result<()> {
    for kind in ALL_KINDS {
        tokio::fs::create_dir_all(root.join(kind)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_mime_and_maps_extension() {
        assert_eq!(RECEIPTS.check("image/png", 100).unwrap(), "png");
        assert_eq!(RECEIPTS.check("application/pdf", 100).unwrap(), "pdf");
    }

    #[test]
    fn rejects_disallowed_mime() {
        assert!(RECEIPTS.check("image/gif", 100).is_err());
        assert!(PRODUCT_IMAGES.check("application/pdf", 100).is_err());
    }

    #[test]
    fn rejects_oversized_and_empty_files() {
        assert!(RECEIPTS.check("image/png", 5 * 1024 * 1024 + 1).is_err());
        assert!(RECEIPTS.check("image/png", 0).is_err());
    }
}
