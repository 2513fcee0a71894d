//! Tool catalog file (`[[tools]]` TOML)
//!
//! ```toml
//! [[tools]]
//! name = "CustomerProfileTool"
//! version = "1.0.0"
//! description = "Look up a customer profile by id"
//! scopes = ["crm"]
//!
//! [tools.input_schema.fields.customer_id]
//! type = "string"
//! required = true
//! ```
//!
//! Entries without an `embedding` are embedded from their name and
//! description when the catalog is materialized.

use conductor_application::ports::embedding::{EmbeddingError, EmbeddingPort};
use conductor_domain::{Embedding, Schema, Tool, ToolVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CatalogFileError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// One `[[tools]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileToolEntry {
    pub name: String,
    pub version: ToolVersion,
    #[serde(default)]
    pub description: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub input_schema: Schema,
    #[serde(default)]
    pub output_schema: Schema,
}

impl FileToolEntry {
    fn embedding_text(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.description)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub tools: Vec<FileToolEntry>,
}

impl CatalogFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self, CatalogFileError> {
        toml::from_str(content).map_err(|source| CatalogFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&content, path)?;
        debug!(path = %path.display(), tools = catalog.tools.len(), "Loaded tool catalog");
        Ok(catalog)
    }

    /// Turn the entries into tools, embedding those without a stored vector.
    pub async fn into_tools(self, embedder: &dyn EmbeddingPort) -> Result<Vec<Tool>, CatalogFileError> {
        let mut tools = Vec::with_capacity(self.tools.len());
        for entry in self.tools {
            let embedding = match &entry.embedding {
                Some(values) => Embedding::new(values.clone()),
                None => embedder.embed(&entry.embedding_text()).await?,
            };
            let mut tool = Tool::new(entry.name, entry.version, embedding)
                .with_description(entry.description)
                .with_input_schema(entry.input_schema)
                .with_output_schema(entry.output_schema);
            tool.scopes = entry.scopes;
            tool.endpoint = entry.endpoint;
            tools.push(tool);
        }
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use conductor_domain::FieldType;

    const CATALOG: &str = r#"
[[tools]]
name = "CustomerProfileTool"
version = "1.0.0"
description = "Look up a customer profile"
scopes = ["crm"]

[tools.input_schema.fields.customer_id]
type = "string"
required = true

[[tools]]
name = "LedgerTool"
version = "2.1.0"
scopes = ["finance"]
endpoint = "https://ledger.internal/invoke"
embedding = [0.0, 1.0, 0.0, 0.0]
"#;

    #[tokio::test]
    async fn test_parse_and_materialize() {
        let file = CatalogFile::parse(CATALOG, Path::new("catalog.toml")).unwrap();
        assert_eq!(file.tools.len(), 2);

        let tools = file.into_tools(&HashingEmbedder::new(4)).await.unwrap();
        let profile = &tools[0];
        assert_eq!(profile.version, ToolVersion::new(1, 0, 0));
        assert_eq!(profile.scopes, vec!["crm"]);
        assert_eq!(profile.embedding.dimension(), 4);
        let field = profile.input_schema.field("customer_id").unwrap();
        assert_eq!(field.field_type, FieldType::String);
        assert!(field.required);

        let ledger = &tools[1];
        assert_eq!(ledger.embedding.as_slice(), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(ledger.endpoint.as_deref(), Some("https://ledger.internal/invoke"));
    }

    #[test]
    fn test_bad_version_is_a_parse_error() {
        let err = CatalogFile::parse(
            "[[tools]]\nname = \"A\"\nversion = \"1.0\"\nscopes = [\"crm\"]\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogFileError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CatalogFile::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CatalogFileError::Io { .. }));
    }
}
