use crate::models::{IncomingPayload, StorageContent, StorageTarget};
use crate::services::storage::{Disk, StorageError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Text stored for a `dataString` value: strings verbatim, anything else as compact JSON.
pub fn string_content(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Performs the single storage write for a validated payload.
#[derive(Clone)]
pub struct StorageDispatcher {
    disk: Arc<dyn Disk>,
    timeout: Option<Duration>,
}

impl StorageDispatcher {
    pub fn new(disk: Arc<dyn Disk>, timeout: Option<Duration>) -> Self {
        Self { disk, timeout }
    }

    /// Picks what to write. An uploaded file takes precedence over `dataString`.
    pub fn resolve(&self, payload: IncomingPayload) -> Result<StorageTarget, StorageError> {
        let content = match (payload.data_file, payload.data_string) {
            (Some(file), data_string) => {
                if data_string.is_some() {
                    debug!(
                        "Both dataFile and dataString supplied for {}, storing the file",
                        payload.path
                    );
                }
                StorageContent::Stream(file)
            }
            (None, Some(value)) => StorageContent::Text(string_content(value)),
            (None, None) => return Err(StorageError::NoData),
        };

        Ok(StorageTarget {
            disk_name: self.disk.name().to_string(),
            path: payload.path,
            content,
        })
    }

    /// Resolves and writes the payload, returning the key it was stored under.
    pub async fn store(&self, payload: IncomingPayload) -> Result<String, StorageError> {
        let target = self.resolve(payload)?;
        let path = target.path.clone();

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.write(target))
                .await
                .map_err(|_| StorageError::Timeout(limit))??,
            None => self.write(target).await?,
        }

        Ok(path)
    }

    async fn write(&self, target: StorageTarget) -> Result<(), StorageError> {
        match target.content {
            StorageContent::Stream(file) => {
                let reader = file.open().await?;
                self.disk.write_stream(&target.path, Box::new(reader)).await?;
                info!(
                    "📦 Stored upload {:?} ({} bytes) at {}:{}",
                    file.client_name.as_deref().unwrap_or("unnamed"),
                    file.size,
                    target.disk_name,
                    target.path
                );
            }
            StorageContent::Text(text) => {
                let size = text.len();
                self.disk.write_bytes(&target.path, text.into_bytes()).await?;
                info!(
                    "📝 Stored {} bytes of text at {}:{}",
                    size, target.disk_name, target.path
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadedFile;
    use crate::services::storage::MemoryDisk;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncRead;

    fn dispatcher(disk: Arc<MemoryDisk>) -> StorageDispatcher {
        StorageDispatcher::new(disk, Some(Duration::from_secs(5)))
    }

    fn payload(path: &str, data_string: Option<Value>, file: Option<&[u8]>) -> IncomingPayload {
        let data_file = file.map(|content| {
            let mut tmp = NamedTempFile::new().unwrap();
            tmp.write_all(content).unwrap();
            UploadedFile::new(tmp, content.len() as u64, None)
        });
        IncomingPayload {
            path: path.to_string(),
            data_string,
            data_file,
        }
    }

    #[test]
    fn test_string_content() {
        assert_eq!(string_content(json!(" hello ")), " hello ");
        assert_eq!(string_content(json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(string_content(json!([1, "two"])), r#"[1,"two"]"#);
        assert_eq!(string_content(json!(42)), "42");
        assert_eq!(string_content(json!(true)), "true");
    }

    #[tokio::test]
    async fn test_stores_string_verbatim() {
        let disk = Arc::new(MemoryDisk::new());
        let path = dispatcher(disk.clone())
            .store(payload("logs/a.txt", Some(json!("hello\n")), None))
            .await
            .unwrap();
        assert_eq!(path, "logs/a.txt");
        assert_eq!(disk.get("logs/a.txt").unwrap(), b"hello\n");
    }

    #[tokio::test]
    async fn test_stores_json_value_as_text() {
        let disk = Arc::new(MemoryDisk::new());
        dispatcher(disk.clone())
            .store(payload("a.json", Some(json!({"a": 1})), None))
            .await
            .unwrap();
        assert_eq!(disk.get("a.json").unwrap(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_file_wins_over_string() {
        let disk = Arc::new(MemoryDisk::new());
        dispatcher(disk.clone())
            .store(payload(
                "both.bin",
                Some(json!("ignored")),
                Some(&[0u8, 255, 1, 254][..]),
            ))
            .await
            .unwrap();
        assert_eq!(disk.get("both.bin").unwrap(), [0, 255, 1, 254]);
    }

    #[tokio::test]
    async fn test_no_data_is_a_storage_error() {
        let disk = Arc::new(MemoryDisk::new());
        let err = dispatcher(disk.clone())
            .store(payload("empty", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NoData));
        assert_eq!(err.to_string(), "No data provided");
        assert!(disk.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_names_the_disk() {
        let disk = Arc::new(MemoryDisk::new());
        let target = dispatcher(disk)
            .resolve(payload("a.txt", Some(json!("x")), None))
            .unwrap();
        assert_eq!(target.disk_name, "memory");
        assert_eq!(target.path, "a.txt");
        assert!(matches!(target.content, StorageContent::Text(ref t) if t == "x"));
    }

    struct StalledDisk;

    #[async_trait]
    impl Disk for StalledDisk {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn write_stream<'a>(
            &self,
            _key: &str,
            _reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        ) -> Result<(), StorageError> {
            std::future::pending().await
        }

        async fn write_bytes(&self, _key: &str, _content: Vec<u8>) -> Result<(), StorageError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_write_is_bounded_by_timeout() {
        let dispatcher =
            StorageDispatcher::new(Arc::new(StalledDisk), Some(Duration::from_millis(20)));
        let err = dispatcher
            .store(payload("slow.txt", Some(json!("x")), None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));
    }
}
