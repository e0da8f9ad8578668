use crate::core::dom::{self, Selector};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Replaced,
    /// Nothing in the page matched the content selector.
    Missing,
}

/// The region of a page whose contents are swapped out on change.
#[async_trait]
pub trait ContentContainer: Send + Sync {
    async fn replace_contents(&self, fragment: &str) -> Result<Replacement, ContainerError>;
    async fn contents(&self) -> Option<String>;
}

#[derive(Clone, Default)]
pub struct MemoryContainer {
    inner: Arc<RwLock<String>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_contents(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.into())),
        }
    }
}

#[async_trait]
impl ContentContainer for MemoryContainer {
    async fn replace_contents(&self, fragment: &str) -> Result<Replacement, ContainerError> {
        let mut inner = self.inner.write().await;
        inner.clear();
        inner.push_str(fragment);
        Ok(Replacement::Replaced)
    }

    async fn contents(&self) -> Option<String> {
        Some(self.inner.read().await.clone())
    }
}

/// A whole HTML page kept in memory and mirrored to a file. Only the element
/// matched by the selector is rewritten.
pub struct DocumentContainer {
    page: RwLock<String>,
    selector: Selector,
    output: PathBuf,
}

impl DocumentContainer {
    pub fn new(page: String, selector: Selector, output: impl Into<PathBuf>) -> Self {
        Self {
            page: RwLock::new(page),
            selector,
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Writes the current page to the output file.
    pub async fn flush(&self) -> Result<(), ContainerError> {
        let page = self.page.read().await;
        write_page(&self.output, &page).await
    }
}

async fn write_page(path: &Path, page: &str) -> Result<(), ContainerError> {
    tokio::fs::write(path, page)
        .await
        .map_err(|source| ContainerError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl ContentContainer for DocumentContainer {
    async fn replace_contents(&self, fragment: &str) -> Result<Replacement, ContainerError> {
        let mut page = self.page.write().await;

        let Some(updated) = dom::replace_inner_html(&page, &self.selector, fragment) else {
            tracing::debug!(selector = %self.selector, "No element matches content selector");
            return Ok(Replacement::Missing);
        };

        write_page(&self.output, &updated).await?;
        *page = updated;

        tracing::debug!(path = ?self.output, bytes = fragment.len(), "Wrote preview page");
        Ok(Replacement::Replaced)
    }

    async fn contents(&self) -> Option<String> {
        let page = self.page.read().await;
        dom::inner_html(&page, &self.selector).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str =
        "<html><body><article class=\"markdown-body\"><p>old</p></article></body></html>";

    fn selector() -> Selector {
        "article.markdown-body".parse().unwrap()
    }

    #[tokio::test]
    async fn test_memory_container_replace() {
        let container = MemoryContainer::with_contents("<p>old</p>");

        let result = container.replace_contents("<p>hi</p>").await.unwrap();
        assert_eq!(result, Replacement::Replaced);
        assert_eq!(container.contents().await.as_deref(), Some("<p>hi</p>"));

        container.replace_contents("<p>hi</p>").await.unwrap();
        assert_eq!(container.contents().await.as_deref(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_memory_container_clones_share_state() {
        let container = MemoryContainer::new();
        let observer = container.clone();

        container.replace_contents("<h1>x</h1>").await.unwrap();
        assert_eq!(observer.contents().await.as_deref(), Some("<h1>x</h1>"));
    }

    #[tokio::test]
    async fn test_document_container_writes_page() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("preview.html");
        let container = DocumentContainer::new(PAGE.to_string(), selector(), &output);

        container.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), PAGE);

        let result = container.replace_contents("<p>hi</p>").await.unwrap();
        assert_eq!(result, Replacement::Replaced);
        assert_eq!(container.contents().await.as_deref(), Some("<p>hi</p>"));
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "<html><body><article class=\"markdown-body\"><p>hi</p></article></body></html>"
        );
    }

    #[tokio::test]
    async fn test_document_container_missing_element_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("preview.html");
        let container = DocumentContainer::new(
            "<html><body><main>x</main></body></html>".to_string(),
            selector(),
            &output,
        );

        let result = container.replace_contents("<p>hi</p>").await.unwrap();
        assert_eq!(result, Replacement::Missing);
        assert!(!output.exists());
        assert_eq!(container.contents().await, None);
    }

    #[tokio::test]
    async fn test_document_container_write_failure_keeps_page() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing-dir").join("preview.html");
        let container = DocumentContainer::new(PAGE.to_string(), selector(), &output);

        let err = container.replace_contents("<p>hi</p>").await.unwrap_err();
        assert!(matches!(err, ContainerError::Write { .. }));
        assert_eq!(container.contents().await.as_deref(), Some("<p>old</p>"));
    }
}
