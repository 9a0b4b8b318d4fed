use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::handoff::HandoffStore;
use crate::types::{RowSet, TableName};

const SLOT_EXTENSION: &str = "json";

/// Handoff store writing one JSON file per table into a directory.
///
/// Slots survive process restarts. A slot is written to a temporary file first and renamed into
/// place, so readers never see a partially written slot.
#[derive(Debug, Clone)]
pub struct FileHandoffStore {
    directory: Arc<PathBuf>,
}

impl FileHandoffStore {
    /// Opens the store rooted at `directory`, creating the directory when missing.
    pub async fn open(directory: impl AsRef<Path>) -> EtlResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).await.map_err(|err| {
            etl_error!(
                ErrorKind::HandoffIoError,
                "Could not create the handoff directory",
                directory.display(),
                source: err
            )
        })?;

        Ok(Self {
            directory: Arc::new(directory),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn slot_path(&self, table: &TableName) -> PathBuf {
        self.directory
            .join(format!("{}.{SLOT_EXTENSION}", slot_file_stem(table)))
    }
}

/// File name stem of a table slot.
///
/// Bytes outside `[A-Za-z0-9_-]` are percent encoded, which keeps the mapping injective and the
/// schema separator out of the path.
fn slot_file_stem(table: &TableName) -> String {
    let mut stem = String::new();
    for byte in table.to_string().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }

    stem
}

impl HandoffStore for FileHandoffStore {
    async fn put(&self, table: &TableName, row_set: Arc<RowSet>) -> EtlResult<()> {
        let path = self.slot_path(table);
        let tmp_path = self
            .directory
            .join(format!(".{}.{}.tmp", slot_file_stem(table), Uuid::new_v4()));

        let bytes = serde_json::to_vec(row_set.as_ref()).map_err(|err| {
            etl_error!(
                ErrorKind::SerializationError,
                "Could not serialize the row set",
                table,
                source: err
            )
        })?;

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        debug!(%table, path = %path.display(), bytes = bytes.len(), "handoff slot written");

        Ok(())
    }

    async fn get(&self, table: &TableName) -> EtlResult<Option<Arc<RowSet>>> {
        let path = self.slot_path(table);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let row_set: RowSet = serde_json::from_slice(&bytes)?;

        Ok(Some(Arc::new(row_set)))
    }

    async fn clear(&self, table: &TableName) -> EtlResult<()> {
        match fs::remove_file(self.slot_path(table)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
