use crate::traits::{split_extension, ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Map a flat name to a path inside the base directory.
    fn key_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(StorageError::InvalidKey(
                "Storage name contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn available_name(&self, filename: &str) -> StorageResult<String> {
        let path = self.key_to_path(filename)?;
        if !fs::try_exists(&path).await? {
            return Ok(filename.to_string());
        }

        let (stem, ext) = split_extension(filename);
        let mut counter: u64 = 1;
        loop {
            let candidate = format!("{}_{}{}", stem, counter, ext);
            if !fs::try_exists(self.key_to_path(&candidate)?).await? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    async fn write_new(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        let start = std::time::Instant::now();

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => {
                return Err(StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let written = async {
            let bytes = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match written {
            Ok(bytes) => {
                tracing::info!(
                    path = %path.display(),
                    name = %name,
                    size_bytes = bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage write successful"
                );
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    tracing::error!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to remove partially written file"
                    );
                }
                Err(StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    async fn delete(&self, name: &str) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    name = %name,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, name: &str) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn download_stream(&self, name: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(name)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(path = %path_display, error = %e, "Local storage stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        self.key_to_path(name)
    }
}
