//! Filesystem attachment store.
//!
//! Stores uploaded file bytes as flat files in a single directory. The
//! stored name is generated here and recorded on the owning note row, which
//! is the only place linking a file back to a note:
//! `{unix-millis}-{6-char token}-{sanitized original filename}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use jotpad_core::{AttachmentStore, Error, Result};

/// Length of the random token embedded in stored names.
const TOKEN_LEN: usize = 6;

/// Reduce a client-supplied filename to a safe, flat path component.
///
/// Keeps only the final path component and drops `..` segments, so a hostile
/// original filename cannot escape the upload directory.
fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .replace("..", "");
    if name.is_empty() {
        "upload".to_string()
    } else {
        name
    }
}

/// Generate a fresh stored name for an upload.
///
/// The millisecond timestamp plus random token makes collisions practically
/// impossible without any coordination step.
pub fn generate_stored_name(original_filename: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        token,
        sanitize_filename(original_filename)
    )
}

/// Filesystem-backed `AttachmentStore`.
pub struct FilesystemStore {
    base_path: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at the given upload directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, stored_name: &str) -> PathBuf {
        self.base_path.join(stored_name)
    }

    /// Validate that the store can write, read, and delete files.
    ///
    /// Performs a full round-trip at startup to catch filesystem issues
    /// (permission errors, missing mounts) before the first upload does.
    pub async fn validate(&self) -> Result<()> {
        let test_file = self.base_path.join(".health-check");

        fs::create_dir_all(&self.base_path).await?;

        let data = b"attachment-store-health-check";
        fs::write(&test_file, data).await?;

        let read_back = fs::read(&test_file).await?;
        if read_back != data {
            return Err(Error::Attachment(format!(
                "read-back mismatch at {}",
                test_file.display()
            )));
        }

        fs::remove_file(&test_file).await?;
        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for FilesystemStore {
    async fn put(&self, original_filename: &str, data: &[u8]) -> Result<String> {
        let stored_name = generate_stored_name(original_filename);
        let full_path = self.full_path(&stored_name);
        debug!(
            subsystem = "storage",
            component = "attachments",
            op = "put",
            stored_name = %stored_name,
            size = data.len(),
            "Writing attachment"
        );

        fs::create_dir_all(&self.base_path).await?;

        // Atomic write: temp file + rename, so a crash never leaves a
        // half-written file under the final name.
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(stored_name)
    }

    async fn delete(&self, stored_name: &str) -> Result<()> {
        let full_path = self.full_path(stored_name);
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            // Already gone: a reclaim that finds nothing has succeeded.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                warn!(
                    subsystem = "storage",
                    component = "attachments",
                    op = "delete",
                    stored_name = %stored_name,
                    error = %err,
                    "Failed to delete attachment file"
                );
                Err(Error::Io(err))
            }
        }
    }

    async fn exists(&self, stored_name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(stored_name)).await?)
    }
}
