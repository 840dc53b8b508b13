//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the invoices directory exists, and the record data directory when
/// `data_dir_required` is set (file backend only).
pub async fn ensure_env(data_dir: &Path, invoices_dir: &Path, data_dir_required: bool) -> anyhow::Result<()> {
    if data_dir_required {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", data_dir.display()))?;
    }

    let existed = tokio::fs::metadata(invoices_dir).await.is_ok();
    match tokio::fs::create_dir_all(invoices_dir).await {
        Ok(()) if existed => info!(folder = %invoices_dir.display(), "invoices folder exists"),
        Ok(()) => info!(folder = %invoices_dir.display(), "created invoices folder"),
        // 发票目录在保存时还会再次创建，这里失败只记录
        Err(e) => warn!(folder = %invoices_dir.display(), error = %e, "failed to create invoices folder"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_env_creates_both_dirs() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("common_env_{}", uuid::Uuid::new_v4()));
        let data = root.join("data");
        let invoices = root.join("Invoices");

        ensure_env(&data, &invoices, true).await?;
        assert!(tokio::fs::metadata(&data).await?.is_dir());
        assert!(tokio::fs::metadata(&invoices).await?.is_dir());

        // second call is a no-op
        ensure_env(&data, &invoices, true).await?;

        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }

    #[tokio::test]
    async fn data_dir_skipped_when_not_required() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("common_env_{}", uuid::Uuid::new_v4()));
        let data = root.join("data");
        let invoices = root.join("Invoices");

        ensure_env(&data, &invoices, false).await?;
        assert!(tokio::fs::metadata(&data).await.is_err());
        assert!(tokio::fs::metadata(&invoices).await?.is_dir());

        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }
}
