//! Local filesystem backend
//!
//! Documents are plain files in one directory. Writes go to a temporary
//! sibling first and are renamed into place, so a reader never observes a
//! partially written document.

use super::{StorageKind, StoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

fn document_path(dir: &str, file_name: &str) -> PathBuf {
    Path::new(dir).join(file_name)
}

fn backend_error(operation: &'static str, key: &str, source: std::io::Error) -> StoreError {
    StoreError::backend(StorageKind::Local, operation, key, source)
}

pub(super) async fn exists(dir: &str, file_name: &str) -> Result<bool, StoreError> {
    tokio::fs::try_exists(document_path(dir, file_name))
        .await
        .map_err(|e| backend_error("check", file_name, e))
}

pub(super) async fn write(dir: &str, file_name: &str, body: &[u8]) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| backend_error("create directory for", file_name, e))?;

    let target = document_path(dir, file_name);
    let staging = document_path(dir, &format!(".{file_name}.tmp"));
    debug!(path = %target.display(), size = body.len(), "Writing document");

    tokio::fs::write(&staging, body)
        .await
        .map_err(|e| backend_error("write", file_name, e))?;

    if let Err(e) = tokio::fs::rename(&staging, &target).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(backend_error("write", file_name, e));
    }

    Ok(())
}

pub(super) async fn read(dir: &str, file_name: &str) -> Result<Vec<u8>, StoreError> {
    match tokio::fs::read(document_path(dir, file_name)).await {
        Ok(body) => Ok(body),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
            key: file_name.to_string(),
        }),
        Err(e) => Err(backend_error("read", file_name, e)),
    }
}

pub(super) async fn delete(dir: &str, file_name: &str) -> Result<(), StoreError> {
    match tokio::fs::remove_file(document_path(dir, file_name)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
            key: file_name.to_string(),
        }),
        Err(e) => Err(backend_error("delete", file_name, e)),
    }
}

/// File names in the directory; a missing directory holds no documents
pub(super) async fn list(dir: &str) -> Result<Vec<String>, StoreError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(backend_error("list", dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| backend_error("list", dir, e))?
    {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_str(dir: &TempDir) -> String {
        dir.path().display().to_string()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir_str(&dir);

        assert!(!exists(&path, "aws-demo.yaml").await.unwrap());
        write(&path, "aws-demo.yaml", b"aws:\n  clustername: demo\n")
            .await
            .unwrap();
        assert!(exists(&path, "aws-demo.yaml").await.unwrap());

        let body = read(&path, "aws-demo.yaml").await.unwrap();
        assert_eq!(body, b"aws:\n  clustername: demo\n");

        delete(&path, "aws-demo.yaml").await.unwrap();
        assert!(!exists(&path, "aws-demo.yaml").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested/clusters").display().to_string();

        write(&nested, "aws-demo.yaml", b"aws: {}\n").await.unwrap();

        let names = list(&nested).await.unwrap();
        assert_eq!(names, vec!["aws-demo.yaml".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir_str(&dir);

        assert!(read(&path, "aws-nope.yaml").await.unwrap_err().is_not_found());
        assert!(delete(&path, "aws-nope.yaml").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist").display().to_string();
        assert!(list(&missing).await.unwrap().is_empty());
    }
}
