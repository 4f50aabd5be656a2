//! Object store for uploaded documents and photos.
//!
//! Two backends: an HTTP storage service (bucket API with public object URLs)
//! and a local directory served under a public base URL. Callers only ever
//! see the public URL of an object; removal takes that URL back.

use std::path::PathBuf;

use reqwest::multipart;
use reqwest::Url;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// HTTP bucket API: `POST {base}/storage/v1/object/{bucket}/{key}` to upload,
/// objects served from `{base}/storage/v1/object/public/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(base_url: &str, bucket: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("x-upsert", "false")
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }
        Ok(format!("{}{}", self.public_prefix(), key))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = url.strip_prefix(&self.public_prefix()) else {
            tracing::warn!(url, "Not an object of this bucket, nothing removed");
            return Ok(());
        };
        let response = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "prefixes": [key] }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Objects written below `root`, served as `{public_base}/{key}`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = url.strip_prefix(&format!("{}/", self.public_base)) else {
            tracing::warn!(url, "Not an object of this store, nothing removed");
            return Ok(());
        };
        if key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        match tokio::fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ObjectStore {
    Http(HttpStore),
    Local(LocalStore),
}

impl ObjectStore {
    /// Store an object and return its public URL.
    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let url = match self {
            ObjectStore::Http(store) => store.put(key, bytes, content_type).await?,
            ObjectStore::Local(store) => store.put(key, bytes).await?,
        };
        tracing::debug!(key, content_type, "Object stored");
        Ok(url)
    }

    /// Remove the object behind a public URL. Unknown URLs are left alone.
    pub async fn remove(&self, url: &str) -> Result<(), StorageError> {
        match self {
            ObjectStore::Http(store) => store.remove(url).await,
            ObjectStore::Local(store) => store.remove(url).await,
        }
    }
}

/// Content type guessed from a file name.
pub fn content_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// `{folder}/{uuid}-{name}`, with the name reduced to a safe character set.
pub fn object_key(folder: &str, file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let safe: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let safe = safe.trim_start_matches('.');
    let safe = if safe.is_empty() { "file" } else { safe };
    format!("{folder}/{}-{safe}", Uuid::new_v4())
}

/// Wrap an object URL in the embedded document viewer.
pub fn viewer_url(viewer_base: &str, object_url: &str) -> Result<String, StorageError> {
    let url = Url::parse_with_params(viewer_base, &[("url", object_url), ("embedded", "true")])
        .map_err(|e| StorageError::InvalidUrl(format!("{viewer_base}: {e}")))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_unique_and_safe() {
        let a = object_key("files", "../../etc/passwd");
        let b = object_key("files", "Care plan (v2).pdf");
        assert!(a.starts_with("files/"));
        assert!(a.ends_with("-passwd"));
        assert!(!a.contains(".."));
        assert!(b.ends_with("-Care_plan__v2_.pdf"));
        assert_ne!(object_key("files", "x.pdf"), object_key("files", "x.pdf"));
    }

    #[test]
    fn content_types_from_names() {
        assert_eq!(content_type_for("scan.png"), "image/png");
        assert_eq!(content_type_for("plan.pdf"), "application/pdf");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
        assert!(is_image("image/jpeg"));
        assert!(!is_image("application/pdf"));
    }

    #[test]
    fn viewer_url_encodes_object_url() {
        let wrapped = viewer_url("https://viewer.example.com/view", "https://cdn.example.com/a b.pdf").unwrap();
        assert!(wrapped.starts_with("https://viewer.example.com/view?url=https%3A%2F%2Fcdn.example.com%2Fa"));
        assert!(wrapped.ends_with("&embedded=true"));
        assert!(viewer_url("not a url", "x").is_err());
    }

    #[test]
    fn http_store_urls() {
        let store = HttpStore::new("https://store.example.com/", "care", "key");
        assert_eq!(
            store.object_url("files/x.pdf"),
            "https://store.example.com/storage/v1/object/care/files/x.pdf"
        );
        assert_eq!(
            store.public_prefix(),
            "https://store.example.com/storage/v1/object/public/care/"
        );
    }

    #[tokio::test]
    async fn local_store_put_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::Local(LocalStore::new(dir.path(), "http://localhost:8080/media/"));

        let url = store.put("files/a.txt", b"hello".to_vec(), "text/plain").await.unwrap();
        assert_eq!(url, "http://localhost:8080/media/files/a.txt");
        assert_eq!(std::fs::read(dir.path().join("files/a.txt")).unwrap(), b"hello");

        store.remove(&url).await.unwrap();
        assert!(!dir.path().join("files/a.txt").exists());
        // Second removal and foreign URLs are no-ops.
        store.remove(&url).await.unwrap();
        store.remove("https://elsewhere.example.com/x").await.unwrap();
    }
}
