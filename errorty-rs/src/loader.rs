//! # Kind Loaders
//!
//! Asynchronous sources of additional error kinds. The registry never reads
//! the filesystem itself; it hands `error_overrides.path` to a [`KindLoader`].

use std::fmt;
use std::path::Path;
use async_trait::async_trait;
use serde::Deserialize;

use crate::kind::HttpErrorKind;
use crate::types::{Error, Result};

/// Supplies kind descriptors for a configured location
#[async_trait]
pub trait KindLoader: Send + Sync + fmt::Debug {
    async fn load(&self, path: &Path) -> Result<Vec<HttpErrorKind>>;
}

/// On-disk definition of a single kind
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KindDefinition {
    name: Option<String>,
    status_code: u16,
    default_message: Option<String>,
}

/// Reads every `*.json` file in a directory as one kind definition.
///
/// The kind name defaults to the file stem and the default message to the
/// kind name. Other files are skipped.
#[derive(Debug, Default, Clone)]
pub struct DirectoryKindLoader;

impl DirectoryKindLoader {
    pub fn new() -> Self {
        Self
    }

    fn parse(file_name: &str, stem: &str, contents: &str) -> Result<HttpErrorKind> {
        let definition: KindDefinition =
            serde_json::from_str(contents).map_err(|e| Error::InvalidKind {
                source_name: file_name.to_string(),
                reason: e.to_string(),
            })?;

        if !(100..=599).contains(&definition.status_code) {
            return Err(Error::InvalidKind {
                source_name: file_name.to_string(),
                reason: format!("status code {} is out of range", definition.status_code),
            });
        }

        let name = definition.name.unwrap_or_else(|| stem.to_string());
        let default_message = definition.default_message.unwrap_or_else(|| name.clone());
        Ok(HttpErrorKind::new(name, definition.status_code, default_message))
    }
}

#[async_trait]
impl KindLoader for DirectoryKindLoader {
    async fn load(&self, path: &Path) -> Result<Vec<HttpErrorKind>> {
        let load_error = |e: std::io::Error| Error::KindLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut dir = tokio::fs::read_dir(path).await.map_err(load_error)?;
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(load_error)? {
            let file_path = entry.path();
            if file_path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(file_path);
            }
        }
        files.sort();

        let mut kinds = Vec::with_capacity(files.len());
        for file_path in files {
            let contents = tokio::fs::read_to_string(&file_path).await.map_err(load_error)?;
            let file_name = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = file_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let kind = Self::parse(&file_name, &stem, &contents)?;
            tracing::debug!(kind = %kind.name, status = kind.status_code, file = %file_name, "Loaded error kind");
            kinds.push(kind);
        }

        Ok(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("PaymentDeclined.json"),
            r#"{"statusCode": 402, "defaultMessage": "Payment was declined"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("teapot.json"),
            r#"{"name": "Teapot", "statusCode": 418}"#,
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a kind").unwrap();

        let kinds = DirectoryKindLoader::new().load(dir.path()).await.unwrap();

        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].name, "PaymentDeclined");
        assert_eq!(kinds[0].default_message, "Payment was declined");
        assert_eq!(kinds[1].name, "Teapot");
        assert_eq!(kinds[1].status_code, 418);
        assert_eq!(kinds[1].default_message, "Teapot");
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = DirectoryKindLoader::new().load(&missing).await.unwrap_err();
        assert!(matches!(err, Error::KindLoad { .. }));
    }

    #[tokio::test]
    async fn test_malformed_definition() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Broken.json"), r#"{"statusCode": 9000}"#).unwrap();

        let err = DirectoryKindLoader::new().load(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKind { .. }));
    }

    #[test]
    fn test_empty_directory_from_blocking_caller() {
        let dir = tempfile::tempdir().unwrap();

        let kinds = tokio_test::block_on(DirectoryKindLoader::new().load(dir.path())).unwrap();
        assert!(kinds.is_empty());
    }
}
