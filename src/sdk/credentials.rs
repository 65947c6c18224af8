//! Access token persistence.
//!
//! Tokens live in a plain text file, one `username<TAB>token` pair per
//! line. Usernames are case-insensitive and stored lower-cased. The file
//! and its parent directory are created on first use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default credentials file (`~/.bwapi/credentials.txt`).
pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bwapi")
        .join("credentials.txt")
}

/// Persists access tokens to disk.
///
/// # Example
///
/// ```
/// use bwapi::sdk::CredentialsStore;
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let store = CredentialsStore::new(dir.path().join("credentials.txt"));
///
/// store.set("User@Example.com", "token-1").await.unwrap();
/// assert_eq!(store.get("user@example.com").await.unwrap(), "token-1");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CredentialsStore {
    path: PathBuf,
}

impl Default for CredentialsStore {
    fn default() -> Self {
        Self::new(default_credentials_path())
    }
}

impl CredentialsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Token stored for `username`.
    pub async fn get(&self, username: &str) -> Result<String> {
        let mut credentials = self.read().await?;
        credentials.remove(&username.to_lowercase()).ok_or_else(|| {
            Error::CredentialsNotFound(format!(
                "no access token for {} in {}",
                username,
                self.path.display()
            ))
        })
    }

    /// Store `token` for `username`. Writing an unchanged token is a no-op.
    pub async fn set(&self, username: &str, token: &str) -> Result<()> {
        let key = username.to_lowercase();
        let mut credentials = self.read().await?;

        match credentials.get(&key) {
            Some(existing) if existing == token => return Ok(()),
            Some(_) => info!(
                "Overwriting access token for {} in {}",
                username,
                self.path.display()
            ),
            None => info!("Writing access token for user: {}", username),
        }

        credentials.insert(key, token.to_string());
        self.write(&credentials).await
    }

    /// Remove the token for `username`, if any.
    pub async fn remove(&self, username: &str) -> Result<()> {
        let key = username.to_lowercase();
        let mut credentials = self.read().await?;

        if credentials.remove(&key).is_some() {
            info!("Deleting access token for user: {}", username);
            self.write(&credentials).await?;
        }
        Ok(())
    }

    /// All stored `(username, token)` pairs.
    pub async fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self.read().await?.into_iter().collect())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.read().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn read(&self) -> Result<BTreeMap<String, String>> {
        self.ensure_file_exists().await?;
        let content = fs::read_to_string(&self.path).await?;
        Ok(parse_credentials(&content))
    }

    async fn write(&self, credentials: &BTreeMap<String, String>) -> Result<()> {
        self.ensure_file_exists().await?;
        let content = credentials
            .iter()
            .map(|(user, token)| format!("{}\t{}", user, token))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn ensure_file_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !fs::try_exists(parent).await? {
                debug!(
                    "Creating credentials store parent directory: {}",
                    parent.display()
                );
                let mut builder = fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                builder.mode(0o755);
                builder.create(parent).await?;
            }
        }

        if !fs::try_exists(&self.path).await? {
            debug!("Creating credentials store: {}", self.path.display());
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true);
            #[cfg(unix)]
            options.mode(0o600);
            options.open(&self.path).await?;
        }
        Ok(())
    }
}

/// Parse the credentials file, skipping lines that are not a user/token pair.
fn parse_credentials(content: &str) -> BTreeMap<String, String> {
    let mut credentials = BTreeMap::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [user, token] => {
                credentials.insert(user.to_lowercase(), token.to_string());
            }
            _ => warn!("Ignoring corrupted credentials line: \"{}\"", line),
        }
    }

    credentials
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ACCESS_TOKEN: &str = "00000000-0000-0000-0000-000000000000";

    fn store_in(dir: &TempDir) -> CredentialsStore {
        CredentialsStore::new(dir.path().join("nested").join("tokens.txt"))
    }

    #[tokio::test]
    async fn test_file_created_on_read() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.path().exists());

        let entries = store.entries().await.unwrap();

        assert!(entries.is_empty());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_file_created_on_write() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.path().exists());

        store.set("example@example.com", ACCESS_TOKEN).await.unwrap();

        assert!(store.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("example@example.com", ACCESS_TOKEN).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[tokio::test]
    async fn test_store_multiple_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.is_empty().await.unwrap());

        store
            .set("example@example.com", "10000000-0000-0000-0000-000000000000")
            .await
            .unwrap();
        store
            .set(
                "another-example@example.com",
                "20000000-0000-0000-0000-000000000000",
            )
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        store
            .set("example@example.com", "30000000-0000-0000-0000-000000000000")
            .await
            .unwrap();
        assert_eq!(
            store.get("example@example.com").await.unwrap(),
            "30000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            store.get("another-example@example.com").await.unwrap(),
            "20000000-0000-0000-0000-000000000000"
        );
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("example@example.com", ACCESS_TOKEN).await.unwrap();
        store.set("EXAMPLE@EXAMPLE.COM", ACCESS_TOKEN).await.unwrap();
        store.set("eXaMpLe@ExAmPlE.cOm", ACCESS_TOKEN).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.get("Example@Example.com").await.unwrap(), ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("example@example.com", ACCESS_TOKEN).await.unwrap();
        store.remove("EXAMPLE@example.com").await.unwrap();
        store.remove("nobody@example.com").await.unwrap();

        assert!(store.is_empty().await.unwrap());
        assert!(matches!(
            store.get("example@example.com").await,
            Err(Error::CredentialsNotFound(_))
        ));
    }

    #[test]
    fn test_corrupted_lines_are_skipped() {
        let parsed = parse_credentials(
            "user@example.com\ttoken-1\nthis line is corrupted\n\nOther@Example.com token-2",
        );

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["user@example.com"], "token-1");
        assert_eq!(parsed["other@example.com"], "token-2");
    }
}
