//! Invoice PDF storage on local disk.
//!
//! Files live flat inside one directory and are addressed by their sanitized
//! name. Every read or write resolves the name against the canonical
//! directory first and refuses anything that would land outside it.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::names::{is_safe_file_name, sanitize_file_name};

const PDF_EXT: &str = ".pdf";

/// Browsers and PDF libraries are inconsistent about `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SavedInvoice {
    pub path: String,
    pub url: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InvoiceEntry {
    pub name: String,
    pub path: String,
    pub url: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderReport {
    pub invoices_folder: String,
    pub folder_exists: bool,
    pub pdf_count: usize,
    pub invoices: Vec<String>,
}

/// Strip an optional `data:...;base64,` prefix and embedded whitespace, then decode.
fn decode_pdf(data: &str) -> Result<Vec<u8>, ServiceError> {
    let payload = match data.trim_start().strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,").map(|(_, b64)| b64).unwrap_or(rest),
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| ServiceError::Validation(format!("pdfData is not valid base64: {e}")))
}

fn is_pdf_name(name: &str) -> bool {
    name.ends_with(PDF_EXT)
}

pub struct InvoiceStore {
    dir: PathBuf,
    url_prefix: String,
}

impl InvoiceStore {
    pub fn new<P: Into<PathBuf>>(dir: P, url_prefix: impl Into<String>) -> Self {
        Self { dir: dir.into(), url_prefix: url_prefix.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), name)
    }

    /// Create the directory if needed; true when it did not exist before.
    pub async fn ensure_folder(&self) -> Result<bool, ServiceError> {
        let existed = fs::metadata(&self.dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !existed {
            fs::create_dir_all(&self.dir).await?;
            info!(folder = %self.dir.display(), "created invoices folder");
        }
        Ok(!existed)
    }

    /// Map `name` to a path inside the canonical directory.
    ///
    /// `Ok(None)` means the directory itself does not exist.
    async fn resolve(&self, name: &str) -> Result<Option<PathBuf>, ServiceError> {
        if !is_safe_file_name(name) {
            return Err(ServiceError::Validation(format!("invalid file name `{name}`")));
        }
        let root = match fs::canonicalize(&self.dir).await {
            Ok(root) => root,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let path = root.join(name);
        if path.parent() != Some(root.as_path()) {
            return Err(ServiceError::Validation(format!("file name `{name}` escapes the invoices folder")));
        }
        if let Ok(meta) = fs::symlink_metadata(&path).await {
            if meta.file_type().is_symlink() {
                return Err(ServiceError::Validation(format!("refusing to follow symlink `{name}`")));
            }
        }
        Ok(Some(path))
    }

    /// Decode and write one invoice, overwriting any file with the same sanitized name.
    pub async fn save(&self, pdf_data: Option<&str>, file_name: Option<&str>) -> Result<SavedInvoice, ServiceError> {
        let (data, raw_name) = match (pdf_data.filter(|d| !d.is_empty()), file_name.filter(|n| !n.is_empty())) {
            (Some(data), Some(name)) => (data, name),
            _ => return Err(ServiceError::Validation("Missing pdfData or fileName".into())),
        };
        let name = sanitize_file_name(raw_name);
        if !is_safe_file_name(&name) {
            return Err(ServiceError::Validation(format!("invalid file name `{raw_name}`")));
        }
        let bytes = decode_pdf(data)?;

        fs::create_dir_all(&self.dir).await?;
        let path = self
            .resolve(&name)
            .await?
            .ok_or_else(|| ServiceError::Storage("invoices folder disappeared".into()))?;
        fs::write(&path, &bytes).await?;

        let saved = SavedInvoice {
            path: path.display().to_string(),
            url: self.url_for(&name),
            filename: name,
            size: bytes.len() as u64,
        };
        info!(event = "pdf_saved", file = %saved.filename, location = %saved.path, size = saved.size, "pdf saved");
        Ok(saved)
    }

    /// All `.pdf` files, newest first. Missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<InvoiceEntry>, ServiceError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut invoices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else { continue };
            if !is_pdf_name(&name) {
                continue;
            }
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                // removed between readdir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            // birth time is not available on every filesystem
            let created = meta.created().unwrap_or(modified);
            let url = self.url_for(&name);
            invoices.push(InvoiceEntry {
                path: url.clone(),
                url,
                size: meta.len(),
                created: DateTime::<Utc>::from(created),
                modified: DateTime::<Utc>::from(modified),
                name,
            });
        }
        invoices.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
        Ok(invoices)
    }

    /// Raw bytes of one invoice.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(name).await?.ok_or_else(|| ServiceError::not_found(name))?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServiceError::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove one invoice; false when there was nothing to remove.
    pub async fn delete(&self, name: &str) -> Result<bool, ServiceError> {
        let Some(path) = self.resolve(name).await? else { return Ok(false) };
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(event = "pdf_deleted", file = name, "invoice deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(file = name, error = %e, "invoice delete failed");
                Err(e.into())
            }
        }
    }

    pub async fn check_folder(&self) -> Result<FolderReport, ServiceError> {
        let exists = fs::metadata(&self.dir).await.map(|m| m.is_dir()).unwrap_or(false);
        let mut names = Vec::new();
        if exists {
            let mut entries = fs::read_dir(&self.dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Ok(name) = entry.file_name().into_string() {
                    if is_pdf_name(&name) {
                        names.push(name);
                    }
                }
            }
            names.sort();
        }
        Ok(FolderReport {
            invoices_folder: self.dir.display().to_string(),
            folder_exists: exists,
            pdf_count: names.len(),
            invoices: names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;
    use base64::engine::general_purpose::STANDARD;
    use std::time::Duration;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";

    fn store() -> InvoiceStore {
        InvoiceStore::new(temp_dir("invoices"), "/Invoices")
    }

    fn b64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn save_writes_bytes_and_reports_location() -> anyhow::Result<()> {
        let store = store();
        let saved = store.save(Some(&b64(PDF)), Some("INV-001 Ali.pdf")).await?;
        assert_eq!(saved.filename, "INV-001_Ali.pdf");
        assert_eq!(saved.url, "/Invoices/INV-001_Ali.pdf");
        assert_eq!(saved.size, PDF.len() as u64);
        assert_eq!(tokio::fs::read(&saved.path).await?, PDF);
        assert_eq!(store.read("INV-001_Ali.pdf").await?, PDF);

        // same name overwrites
        let again = store.save(Some(&b64(b"%PDF-2")), Some("INV-001 Ali.pdf")).await?;
        assert_eq!(again.size, 6);
        assert_eq!(store.list().await?.len(), 1);

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }

    #[tokio::test]
    async fn traversal_names_stay_inside_folder() -> anyhow::Result<()> {
        let store = store();
        let saved = store.save(Some(&b64(PDF)), Some("inv/../../etc")).await?;
        assert!(!saved.filename.contains('/'));
        assert!(!saved.filename.contains('\\'));

        let root = tokio::fs::canonicalize(store.dir()).await?;
        let written = tokio::fs::canonicalize(&saved.path).await?;
        assert_eq!(written.parent(), Some(root.as_path()));

        assert!(matches!(store.read("../etc").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.delete("..").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.save(Some(&b64(PDF)), Some("..")).await, Err(ServiceError::Validation(_))));

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_inside_folder_are_refused() -> anyhow::Result<()> {
        let store = store();
        store.ensure_folder().await?;
        let outside = temp_dir("outside");
        tokio::fs::create_dir_all(&outside).await?;
        let target = outside.join("secret.pdf");
        tokio::fs::write(&target, b"secret").await?;
        tokio::fs::symlink(&target, store.dir().join("x.pdf")).await?;

        assert!(matches!(store.read("x.pdf").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.delete("x.pdf").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.save(Some(&b64(PDF)), Some("x.pdf")).await, Err(ServiceError::Validation(_))));
        // the target was neither read through nor overwritten
        assert_eq!(tokio::fs::read(&target).await?, b"secret");

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        let _ = tokio::fs::remove_dir_all(&outside).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_without_writing() -> anyhow::Result<()> {
        let store = store();
        assert!(matches!(store.save(None, Some("a.pdf")).await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.save(Some(&b64(PDF)), None).await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.save(Some(""), Some("a.pdf")).await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.save(Some("@@not base64@@"), Some("a.pdf")).await, Err(ServiceError::Validation(_))));

        // nothing was written, not even the folder
        assert!(store.list().await?.is_empty());
        assert!(!store.check_folder().await?.folder_exists);
        Ok(())
    }

    #[tokio::test]
    async fn accepts_data_urls_and_unpadded_base64() -> anyhow::Result<()> {
        let store = store();
        let data_url = format!("data:application/pdf;filename=generated.pdf;base64,{}", b64(PDF));
        assert_eq!(store.save(Some(&data_url), Some("a.pdf")).await?.size, PDF.len() as u64);

        let unpadded = b64(b"%PDF-x").trim_end_matches('=').to_string();
        assert_eq!(store.save(Some(&unpadded), Some("b.pdf")).await?.size, 6);

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_skips_other_files() -> anyhow::Result<()> {
        let store = store();
        assert!(store.list().await?.is_empty());

        store.save(Some(&b64(PDF)), Some("a.pdf")).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.save(Some(&b64(PDF)), Some("b.pdf")).await?;
        tokio::fs::write(store.dir().join("notes.txt"), b"x").await?;

        let list = store.list().await?;
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
        assert_eq!(list[0].url, "/Invoices/b.pdf");
        assert_eq!(list[0].path, list[0].url);
        assert_eq!(list[0].size, PDF.len() as u64);

        let report = store.check_folder().await?;
        assert!(report.folder_exists);
        assert_eq!(report.pdf_count, 2);
        assert_eq!(report.invoices, vec!["a.pdf".to_string(), "b.pdf".to_string()]);

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }

    #[tokio::test]
    async fn read_and_delete_missing_files() -> anyhow::Result<()> {
        let store = store();
        // folder does not exist yet
        assert!(matches!(store.read("ghost.pdf").await, Err(ServiceError::NotFound(_))));
        assert!(!store.delete("ghost.pdf").await?);

        store.save(Some(&b64(PDF)), Some("real.pdf")).await?;
        assert!(matches!(store.read("ghost.pdf").await, Err(ServiceError::NotFound(_))));
        assert!(store.delete("real.pdf").await?);
        assert!(!store.delete("real.pdf").await?);
        assert!(store.list().await?.is_empty());

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }

    #[tokio::test]
    async fn ensure_folder_reports_creation_once() -> anyhow::Result<()> {
        let store = store();
        assert!(store.ensure_folder().await?);
        assert!(!store.ensure_folder().await?);
        let _ = tokio::fs::remove_dir_all(store.dir()).await;
        Ok(())
    }
}
