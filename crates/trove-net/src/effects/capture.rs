//! Recording of fetched bodies for later replay through
//! [`MockTransport`](crate::MockTransport).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::error::ConfigError;

/// Environment variable naming the capture directory.
pub const CAPTURE_DIR_ENV: &str = "TROVE_NET_CAPTURE_DIR";

/// Manifest file kept inside the capture directory.
pub const CAPTURE_MANIFEST: &str = "mock-data.toml";

/// Longest escaped URL used as a file name prefix.
const MAX_NAME_LEN: usize = 180;

/// Writes each captured body to its own file and keeps a manifest mapping
/// each URL to its latest file.
#[derive(Debug, Clone)]
pub struct Capture {
    dir:      PathBuf,
    manifest: Arc<Mutex<()>>,
}

impl Capture {
    /// Create the directory (mode 0700 on unix) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|source| ConfigError::Read {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            manifest: Arc::new(Mutex::new(())),
        })
    }

    /// Capture into `$TROVE_NET_CAPTURE_DIR` when set. A directory that cannot
    /// be created disables capture with a warning.
    pub fn from_env() -> Option<Self> {
        let dir = std::env::var_os(CAPTURE_DIR_ENV)?;
        match Self::new(PathBuf::from(dir)) {
            Ok(capture) => Some(capture),
            Err(e) => {
                tracing::warn!("could not create capture directory: {e}");
                None
            }
        }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Store `body` and register it under `url`, replacing any earlier
    /// capture of the same URL. Returns the data file path.
    pub async fn record(&self, url: &str, body: &[u8]) -> io::Result<PathBuf> {
        let file_name = data_file_name(url);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, body).await?;

        let _guard = self.manifest.lock().await;
        let manifest_path = self.dir.join(CAPTURE_MANIFEST);
        let mut manifest = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(source) => toml::from_str::<toml::Table>(&source).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e),
        };

        let mut defaults = toml::Table::new();
        defaults.insert("version".to_string(), toml::Value::Integer(1));
        manifest
            .entry("default")
            .or_insert_with(|| toml::Value::Table(defaults));

        let mut entry = toml::Table::new();
        entry.insert("data".to_string(), toml::Value::String(file_name));
        manifest.insert(url.to_string(), toml::Value::Table(entry));

        let text = toml::to_string(&manifest).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let staging = self.dir.join(format!("{CAPTURE_MANIFEST}.tmp"));
        tokio::fs::write(&staging, text).await?;
        tokio::fs::rename(&staging, &manifest_path).await?;

        Ok(path)
    }
}

fn data_file_name(url: &str) -> String {
    let escaped = urlencoding::encode(url);
    let mut cut = escaped.len().min(MAX_NAME_LEN);
    while !escaped.is_char_boundary(cut) {
        cut -= 1;
    }
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    format!("{}-{micros}", &escaped[..cut])
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> { std::fs::create_dir_all(dir) }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_is_escaped() {
        let name = data_file_name("http://example.com/a b?c=d");
        assert!(name.starts_with("http%3A%2F%2Fexample.com%2Fa%20b%3Fc%3Dd-"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_file_name_is_bounded() {
        let url = format!("http://example.com/{}", "x".repeat(1000));
        let name = data_file_name(&url);
        assert!(name.len() < MAX_NAME_LEN + 32);
    }

    #[tokio::test]
    async fn test_record_writes_body_and_manifest() {
        let dir = tempdir().unwrap();
        let capture = Capture::new(dir.path().join("captures")).unwrap();

        let first = capture.record("http://example.com/one", b"first").await.unwrap();
        capture.record("http://example.com/two", b"second").await.unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), b"first");

        let manifest = std::fs::read_to_string(capture.dir().join(CAPTURE_MANIFEST)).unwrap();
        let table: toml::Table = toml::from_str(&manifest).unwrap();
        assert_eq!(table["default"]["version"].as_integer(), Some(1));
        assert!(table.contains_key("http://example.com/one"));
        assert!(table.contains_key("http://example.com/two"));
    }

    #[tokio::test]
    async fn test_record_same_url_replaces_entry() {
        let dir = tempdir().unwrap();
        let capture = Capture::new(dir.path()).unwrap();

        capture.record("http://example.com/feed", b"old").await.unwrap();
        let latest = capture.record("http://example.com/feed", b"new").await.unwrap();

        let manifest = std::fs::read_to_string(dir.path().join(CAPTURE_MANIFEST)).unwrap();
        let table: toml::Table = toml::from_str(&manifest).unwrap();
        assert_eq!(table.len(), 2);

        let data = table["http://example.com/feed"]["data"].as_str().unwrap();
        assert_eq!(dir.path().join(data), latest);
    }
}
