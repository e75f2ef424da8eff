use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Part size used for streamed S3 uploads (S3 requires at least 5 MB per part).
pub const PART_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No data provided")]
    NoData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),

    #[error("Storage write timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    fn backend<E: std::error::Error>(err: E) -> Self {
        StorageError::Backend(DisplayErrorContext(err).to_string())
    }
}

/// A named storage backend the webhook writes to. An existing object at the same key is
/// overwritten.
#[async_trait]
pub trait Disk: Send + Sync {
    fn name(&self) -> &str;

    async fn write_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<(), StorageError>;

    async fn write_bytes(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError>;
}

/// Reads until `buffer` is full or the reader is exhausted.
async fn fill_buffer<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    buffer: &mut [u8],
) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buffer.len() {
        let read = reader.read(&mut buffer[n..]).await?;
        if read == 0 {
            break;
        }
        n += read;
    }
    Ok(n)
}

pub struct S3Disk {
    client: Client,
    bucket: String,
}

impl S3Disk {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn upload_parts<'a>(
        &self,
        key: &str,
        upload_id: &str,
        mut buffer: Vec<u8>,
        mut filled: usize,
        reader: &mut (dyn AsyncRead + Unpin + Send + 'a),
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut part_number = 1;
        let mut completed_parts = Vec::new();

        while filled > 0 {
            let body = ByteStream::from(buffer[..filled].to_vec());
            let part = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(StorageError::backend)?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(part.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
            filled = fill_buffer(&mut *reader, &mut buffer).await?;
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl Disk for S3Disk {
    fn name(&self) -> &str {
        "s3"
    }

    async fn write_stream<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<(), StorageError> {
        let mut buffer = vec![0u8; PART_SIZE];
        let filled = fill_buffer(&mut reader, &mut buffer).await?;

        // Fits in one part: a plain PutObject.
        if filled < PART_SIZE {
            buffer.truncate(filled);
            return self.write_bytes(key, buffer).await;
        }

        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::backend)?;

        let upload_id = upload
            .upload_id()
            .ok_or_else(|| StorageError::Backend("No upload ID".to_string()))?
            .to_string();

        let parts = match self
            .upload_parts(key, &upload_id, buffer, filled, &mut *reader)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        DisplayErrorContext(abort_err)
                    );
                }
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(StorageError::backend)?;

        Ok(())
    }

    async fn write_bytes(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(StorageError::backend)?;
        Ok(())
    }
}

/// Writes objects as files below a root directory.
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a key to a file below the root. Keys that would escape it are refused.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || relative.file_name().is_none() {
            return Err(StorageError::Backend(format!(
                "Invalid key for local disk: {}",
                key
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn create_file(&self, key: &str) -> Result<tokio::fs::File, StorageError> {
        let target = self.resolve(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::File::create(&target).await?)
    }
}

#[async_trait]
impl Disk for LocalDisk {
    fn name(&self) -> &str {
        "fs"
    }

    async fn write_stream<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<(), StorageError> {
        let mut file = self.create_file(key).await?;
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn write_bytes(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        let mut file = self.create_file(key).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps objects in memory. Used by tests and the "memory" disk.
#[derive(Default)]
pub struct MemoryDisk {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, content: Vec<u8>) {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), content);
    }
}

#[async_trait]
impl Disk for MemoryDisk {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_stream<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<(), StorageError> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await?;
        self.insert(key, content);
        Ok(())
    }

    async fn write_bytes(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        self.insert(key, content);
        Ok(())
    }
}
