use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;

/// An error from one of the JSON file stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying failure.
        source: io::Error,
    },
    /// The file does not hold the expected JSON.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        /// The file being decoded.
        path: PathBuf,
        /// The underlying failure.
        source: serde_json::Error,
    },
    /// The value could not be encoded as JSON.
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        /// The file being written.
        path: PathBuf,
        /// The underlying failure.
        source: serde_json::Error,
    },
}

static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

/// Reads a JSON file, `None` if it does not exist.
pub async fn read_json<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_owned(),
            source,
        })
}

/// Writes a JSON file, creating parent directories as needed.
///
/// The content goes to a sibling temporary file first and is renamed
/// over the target, so readers never observe a partial file. Each write
/// gets its own temporary file; concurrent writers to the same target
/// still race, the last rename wins.
pub async fn write_json<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_owned(),
        source,
    };
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            path: path.to_owned(),
            source,
        })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = tmp_path(path);
    let written = match fs::write(&tmp, bytes).await {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(err) => Err(err),
    };
    if written.is_err() {
        fs::remove_file(&tmp).await.ok();
    }
    written.map_err(io_err)
}

fn tmp_path(path: &Path) -> PathBuf {
    let seq = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{seq}.tmp", process::id()));
    tmp.into()
}
