use crate::config::{AppConfig, S3Config};
use crate::services::storage::{Disk, LocalDisk, MemoryDisk, S3Disk};
use anyhow::{Context, Result, bail};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the disk named by `DRIVE_DISK`.
pub async fn setup_storage(config: &AppConfig) -> Result<Arc<dyn Disk>> {
    match config.drive_disk.as_str() {
        "s3" => Ok(Arc::new(setup_s3(&config.s3).await?)),
        "fs" => {
            info!("📁 Local disk rooted at {}", config.fs_root);
            tokio::fs::create_dir_all(&config.fs_root)
                .await
                .with_context(|| format!("Failed to create disk root {}", config.fs_root))?;
            Ok(Arc::new(LocalDisk::new(&config.fs_root)))
        }
        "memory" => {
            warn!("🧠 Memory disk selected, stored data is lost on restart");
            Ok(Arc::new(MemoryDisk::new()))
        }
        other => bail!("Unknown DRIVE_DISK '{}', expected one of: s3, fs, memory", other),
    }
}

async fn setup_s3(s3: &S3Config) -> Result<S3Disk> {
    let bucket = s3
        .bucket
        .clone()
        .context("S3_BUCKET must be set when DRIVE_DISK=s3")?;

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        s3.endpoint.as_deref().unwrap_or("aws"),
        bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(s3.region.clone()));
    if let Some(endpoint) = &s3.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&s3.access_key_id, &s3.secret_access_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(s3.force_path_style)
        .build();

    let client = aws_sdk_s3::Client::from_conf(s3_config);

    match client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(e) => warn!(
            "🪣 Bucket '{}' is not reachable yet, writes will fail until it is: {}",
            bucket,
            aws_sdk_s3::error::DisplayErrorContext(e)
        ),
    }

    Ok(S3Disk::new(client, bucket))
}
