use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use uuid::Uuid;

/// URL prefix under which stored files are served back.
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Where uploaded bytes live. The workflow code only ever sees URLs.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, bytes: Vec<u8>, key: &str) -> Result<String>;
    async fn delete(&self, url: &str) -> Result<()>;
    /// `None` when nothing is stored at the URL.
    async fn read(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

pub fn url_for_key(key: &str) -> String {
    format!("{}{}", PUBLIC_PREFIX, key)
}

/// Maps a public URL back to its key, refusing anything that could escape the store.
pub fn key_from_url(url: &str) -> Option<PathBuf> {
    url.strip_prefix(PUBLIC_PREFIX).and_then(sanitize_relative_path)
}

/// Accepts only plain relative paths: no `..`, no root, no empty or dot segments.
pub fn sanitize_relative_path(path: &str) -> Option<PathBuf> {
    if path.is_empty() || path.contains('\\') || path.contains('\0') {
        return None;
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return None;
    }

    let candidate = Path::new(path);
    if candidate.components().all(|c| matches!(c, Component::Normal(_))) {
        Some(candidate.to_path_buf())
    } else {
        None
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Reduces a client-supplied file name to a safe stem without extension.
pub fn sanitize_file_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned = unsafe_chars().replace_all(stem, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    let cleaned: String = cleaned.chars().take(64).collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `receipts/<student>-<unix-millis>-<nonce>-<stem>.<ext>`; unique per write.
pub fn receipt_key(
    student_id: i32,
    original_name: &str,
    extension: &str,
    now: DateTime<Utc>,
    nonce: Uuid,
) -> String {
    format!(
        "receipts/{}-{}-{}-{}.{}",
        student_id,
        now.timestamp_millis(),
        nonce.simple(),
        sanitize_file_stem(original_name),
        extension
    )
}

/// Local-disk store rooted at `UPLOAD_DIR`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for_url(&self, url: &str) -> Result<PathBuf> {
        let key = key_from_url(url).ok_or_else(|| anyhow!("refusing unsafe upload url {}", url))?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, bytes: Vec<u8>, key: &str) -> Result<String> {
        let relative = sanitize_relative_path(key).ok_or_else(|| anyhow!("refusing unsafe key {}", key))?;
        let path = self.root.join(relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        Ok(url_for_key(key))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let path = self.path_for_url(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    async fn read(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for_url(url)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}
