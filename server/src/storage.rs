use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Spreadsheet uploads.
pub const EXCEL_FOLDER: &str = "excels";
/// Profile pictures.
pub const AVATAR_FOLDER: &str = "avatars";

pub const SHEET_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".csv"];
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpeg", ".jpg", ".png", ".gif"];

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Join(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "Storage I/O error: {e}"),
            StorageError::Join(e) => write!(f, "Storage task failed: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// A file persisted by an [`UploadStore`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub stored_name: String,
    /// URL path the file is served under, e.g. `/uploads/excels/<name>`.
    pub public_path: String,
    pub size: u64,
}

/// Where uploaded bytes live. Selected once at startup.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persist `bytes` under `folder` with a generated name ending in `ext`.
    async fn put(&self, folder: &str, ext: &str, bytes: &[u8]) -> Result<StoredFile, StorageError>;

    /// Remove a previously stored file. Missing files are not an error.
    async fn remove(&self, folder: &str, stored_name: &str) -> Result<(), StorageError>;

    /// Total bytes of everything in the store.
    async fn total_bytes(&self) -> Result<u64, StorageError>;

    /// Bytes of files last modified on each of the `days` UTC days ending `today`,
    /// oldest first.
    async fn daily_bytes(
        &self,
        today: NaiveDate,
        days: u64,
    ) -> Result<Vec<(NaiveDate, u64)>, StorageError>;
}

/// Lower-cased extension of `filename` (with the dot) if it is in `allowed`.
pub fn allowed_extension(filename: &str, allowed: &[&str]) -> Option<String> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()
        .map(|e| format!(".{}", e.to_lowercase()))?;
    allowed.contains(&ext.as_str()).then_some(ext)
}

/// `<upload_root>/<folder>/<name>` on local disk, served statically under `/uploads`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, folder: &str, stored_name: &str) -> PathBuf {
        self.root.join(folder).join(stored_name)
    }
}

fn generate_name(ext: &str) -> String {
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        Uuid::now_v7().simple(),
        ext
    )
}

#[async_trait]
impl UploadStore for LocalStore {
    async fn put(&self, folder: &str, ext: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = generate_name(ext);
        tokio::fs::write(dir.join(&stored_name), bytes).await?;

        tracing::debug!(folder, stored_name = %stored_name, size = bytes.len(), "stored file");

        Ok(StoredFile {
            public_path: format!("/uploads/{folder}/{stored_name}"),
            stored_name,
            size: bytes.len() as u64,
        })
    }

    async fn remove(&self, folder: &str, stored_name: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_of(folder, stored_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn total_bytes(&self) -> Result<u64, StorageError> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| StorageError::Join(e.to_string()))??;
        Ok(files.iter().map(|(size, _)| size).sum())
    }

    async fn daily_bytes(
        &self,
        today: NaiveDate,
        days: u64,
    ) -> Result<Vec<(NaiveDate, u64)>, StorageError> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| StorageError::Join(e.to_string()))??;
        Ok(bucket_by_day(&files, today, days))
    }
}

/// Every regular file below `root` as `(size, mtime)`. A missing root is empty.
fn walk_files(root: &Path) -> Result<Vec<(u64, DateTime<Utc>)>, std::io::Error> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            // raced with a delete
            Err(_) => continue,
        };
        let mtime = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        out.push((meta.len(), mtime));
    }
    Ok(out)
}

fn bucket_by_day(
    files: &[(u64, DateTime<Utc>)],
    today: NaiveDate,
    days: u64,
) -> Vec<(NaiveDate, u64)> {
    let mut buckets: Vec<(NaiveDate, u64)> = (0..days)
        .rev()
        .filter_map(|i| today.checked_sub_days(Days::new(i)))
        .map(|d| (d, 0))
        .collect();
    for (size, mtime) in files {
        let day = mtime.date_naive();
        if let Some(bucket) = buckets.iter_mut().find(|(d, _)| *d == day) {
            bucket.1 += size;
        }
    }
    buckets
}
