//! Retrievers backed by precomputed ranked lists.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use rankfuse_core::{FusionError, RankedList, Result, Retriever};

/// A retriever that returns the same ranked list for every query.
///
/// Useful for replaying exported results from external search systems and
/// for comparing fusion methods offline.
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    name: String,
    list: RankedList,
}

impl StaticRetriever {
    /// Create a retriever over a fixed list.
    pub fn new(name: impl Into<String>, list: impl Into<RankedList>) -> Self {
        Self {
            name: name.into(),
            list: list.into(),
        }
    }

    /// Load a ranked list from a JSON array of documents.
    ///
    /// The retriever is named after the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let list: RankedList = serde_json::from_str(&content)?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                FusionError::configuration(format!("invalid input path: {}", path.display()))
            })?
            .to_string();

        debug!("Loaded {} documents for retriever '{}'", list.len(), name);

        Ok(Self { name, list })
    }

    /// The list this retriever serves.
    pub fn list(&self) -> &RankedList {
        &self.list
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<RankedList> {
        Ok(self.list.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankfuse_core::Document;
    use std::io::Write;

    #[tokio::test]
    async fn test_static_retriever_returns_list() {
        let retriever = StaticRetriever::new("fixed", vec![Document::new("a"), Document::new("b")]);
        let list = retriever.search("anything").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(retriever.name(), "fixed");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"[{{"content": "alpha", "metadata": {{"score": 3.1}}}}, {{"content": "beta"}}]"#
        )
        .unwrap();

        let retriever = StaticRetriever::from_file(&path).unwrap();
        assert_eq!(retriever.name(), "bm25");
        assert_eq!(retriever.list().len(), 2);
        assert_eq!(retriever.list().documents()[0].score(), Some(3.1));
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = StaticRetriever::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(missing.error_code(), "IO_ERROR");

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let broken = StaticRetriever::from_file(&path).unwrap_err();
        assert_eq!(broken.error_code(), "SERIALIZATION_ERROR");
    }
}
