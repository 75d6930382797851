use crate::domain::ports::Storage;
use crate::utils::error::{Result, ServerError};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// 啟動時建立目錄
    pub fn ensure_base_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;
        Ok(())
    }

    /// Joins `path` onto the base directory. Absolute paths and `..` are refused.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.base_path.clone();
        let mut has_name = false;

        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    has_name = true;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    tracing::warn!("🚫 拒絕存取上傳目錄以外的路徑: {}", path);
                    return Err(ServerError::validation(format!(
                        "Path must stay inside the upload directory: {}",
                        path
                    )));
                }
            }
        }

        if !has_name {
            return Err(ServerError::validation("File path is empty"));
        }
        Ok(resolved)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<String> {
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        Ok(full_path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads"));

        let written = storage.write_file("lease.pdf", b"%PDF-1.7").await.unwrap();
        assert!(written.ends_with("lease.pdf"));
        assert!(std::path::Path::new(&written).exists());

        let data = storage.read_file("lease.pdf").await.unwrap();
        assert_eq!(data, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = storage.read_file("missing.pdf").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::ServerError::IoError(_)));
    }

    #[tokio::test]
    async fn test_paths_outside_base_are_refused() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, b"TOP-SECRET").unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads"));
        storage.ensure_base_dir().unwrap();

        let absolute = secret.to_string_lossy().into_owned();
        for path in [absolute.as_str(), "../secret.txt", "a/../../secret.txt", ""] {
            let err = storage.read_file(path).await.unwrap_err();
            assert!(
                matches!(err, crate::utils::error::ServerError::ValidationError { .. }),
                "{}: {:?}",
                path,
                err
            );
        }

        let err = storage.write_file("../escape.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::ServerError::ValidationError { .. }));
        assert!(!dir.path().join("escape.pdf").exists());
    }

    #[tokio::test]
    async fn test_nested_relative_paths_stay_inside() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("./cases/2024/lease.pdf", b"%PDF").await.unwrap();
        assert!(dir.path().join("cases/2024/lease.pdf").exists());
        assert_eq!(storage.read_file("cases/2024/lease.pdf").await.unwrap(), b"%PDF");
    }
}
